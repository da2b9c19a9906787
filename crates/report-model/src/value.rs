use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scalar cell value.
///
/// The enum uses an explicit `{type, value}` tagged layout so page
/// configuration and IPC payloads stay stable. Missing cells are represented
/// as [`Value::Null`], never omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Missing / unset value.
    Null,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Plain text.
    Text(String),
    /// A calendar date coming from source data.
    Date(NaiveDate),
    /// Boolean flag (e.g. eligibility indicators).
    Bool(bool),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Returns true if the value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns a canonical bit representation for numeric grouping.
    ///
    /// `0.0` and `-0.0` are treated as the same group item, and all NaN
    /// payloads are folded together so a table never grows multiple distinct
    /// "NaN" groups.
    fn canonical_number(n: f64) -> f64 {
        if n == 0.0 {
            return 0.0;
        }
        if n.is_nan() {
            return f64::NAN;
        }
        n
    }

    /// Converts this value into a typed key suitable for grouping and
    /// deterministic sorting.
    pub fn to_key(&self) -> Key {
        match self {
            Value::Null => Key::Null,
            Value::Number(n) => Key::Number(OrderedFloat(Self::canonical_number(*n))),
            Value::Text(s) => Key::Text(s.clone()),
            Value::Date(d) => Key::Date(*d),
            Value::Bool(b) => Key::Bool(*b),
        }
    }

    /// Display-oriented string for this value (not a stable serialization).
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.to_string(),
            Value::Bool(b) => {
                if *b {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Hashable, totally ordered form of [`Value`] used for group keys and pivot
/// headers.
///
/// Numbers are canonicalized on construction (see [`Value::to_key`]) so key
/// equality matches group-item identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Number(OrderedFloat<f64>),
    Date(NaiveDate),
    Text(String),
    Bool(bool),
    Null,
}

impl Key {
    fn kind_rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::Text(_) => 2,
            Key::Bool(_) => 3,
            Key::Null => 4,
        }
    }

    /// Converts the key back into the [`Value`] emitted when rendering group
    /// labels into an output table.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Null => Value::Null,
            Key::Number(n) => Value::Number(n.0),
            Key::Date(d) => Value::Date(*d),
            Key::Text(s) => Value::Text(s.clone()),
            Key::Bool(b) => Value::Bool(*b),
        }
    }

    /// Human-friendly label for this key, used for pivot column headers.
    ///
    /// Blank keys render as the literal `(blank)` label rather than an empty
    /// header.
    pub fn display_string(&self) -> String {
        match self {
            Key::Null => "(blank)".to_string(),
            other => other.to_value().display_string(),
        }
    }
}

fn cmp_text_case_insensitive(a: &str, b: &str) -> Ordering {
    // Compare using uppercased characters so ordering is case-insensitive,
    // with a deterministic case-sensitive tiebreak to keep the order total.
    let mut a_iter = a.chars().flat_map(|c| c.to_uppercase());
    let mut b_iter = b.chars().flat_map(|c| c.to_uppercase());
    loop {
        match (a_iter.next(), b_iter.next()) {
            (Some(ac), Some(bc)) => match ac.cmp(&bc) {
                Ordering::Equal => continue,
                ord => return ord,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // Fixed cross-type ordering (numbers, dates, text, booleans, blanks
        // last) so mixed-type group columns still sort deterministically.
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (Key::Number(a), Key::Number(b)) => a.cmp(b),
            (Key::Date(a), Key::Date(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => {
                let ord = cmp_text_case_insensitive(a, b);
                if ord != Ordering::Equal {
                    ord
                } else {
                    a.cmp(b)
                }
            }
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}
