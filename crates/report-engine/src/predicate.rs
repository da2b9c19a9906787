use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use report_model::{PipelineError, Table, Value};

/// Composable boolean expression over row values.
///
/// Null is never comparable: a null cell fails every comparison (so `NotIn`
/// excludes nulls from matching too; use [`Predicate::IsNull`] /
/// [`Predicate::NotNull`] for explicit null tests). Range bounds are
/// inclusive on both ends; a window whose start is after its end matches
/// nothing, by design.
///
/// Predicates are serde-serializable so page configuration can supply
/// exclusion lists and date windows as data rather than code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every row.
    True,
    Equals {
        column: String,
        value: Value,
    },
    /// Set membership (inclusion list).
    In {
        column: String,
        values: Vec<Value>,
    },
    /// Set non-membership (exclusion list). A null cell does not match.
    NotIn {
        column: String,
        values: Vec<Value>,
    },
    /// Inclusive numeric range.
    NumberBetween {
        column: String,
        min: f64,
        max: f64,
    },
    /// Inclusive calendar-date window (a reporting period).
    DateBetween {
        column: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    IsNull {
        column: String,
    },
    NotNull {
        column: String,
    },
    Not {
        inner: Box<Predicate>,
    },
    /// All sub-predicates must match (logical AND). Empty matches everything.
    All {
        preds: Vec<Predicate>,
    },
    /// Any sub-predicate may match (logical OR). Empty matches nothing.
    Any {
        preds: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::NotIn {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn date_window(column: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Predicate::DateBetween {
            column: column.into(),
            start,
            end,
        }
    }

    pub fn number_range(column: impl Into<String>, min: f64, max: f64) -> Self {
        Predicate::NumberBetween {
            column: column.into(),
            min,
            max,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Predicate::NotNull {
            column: column.into(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::All {
            preds: vec![self, other],
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Any {
            preds: vec![self, other],
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not {
            inner: Box::new(self),
        }
    }

    /// Columns this predicate reads, for up-front validation.
    pub(crate) fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::True => {}
            Predicate::Equals { column, .. }
            | Predicate::In { column, .. }
            | Predicate::NotIn { column, .. }
            | Predicate::NumberBetween { column, .. }
            | Predicate::DateBetween { column, .. }
            | Predicate::IsNull { column }
            | Predicate::NotNull { column } => out.push(column),
            Predicate::Not { inner } => inner.collect_columns(out),
            Predicate::All { preds } | Predicate::Any { preds } => {
                for pred in preds {
                    pred.collect_columns(out);
                }
            }
        }
    }

    pub(crate) fn validate(&self, stage: &'static str, table: &Table) -> Result<(), PipelineError> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        for column in columns {
            table.require_column(stage, column)?;
        }
        Ok(())
    }

    /// Evaluates the predicate against one row. Columns are assumed to have
    /// been validated; a missing column simply fails to match.
    pub(crate) fn matches(&self, table: &Table, row: &[Value]) -> bool {
        let cell = |column: &str| table.column_index(column).and_then(|idx| row.get(idx));
        match self {
            Predicate::True => true,
            Predicate::Equals { column, value } => {
                matches!(cell(column), Some(actual) if !actual.is_null() && !value.is_null() && actual == value)
            }
            Predicate::In { column, values } => match cell(column) {
                Some(actual) if !actual.is_null() => values.contains(actual),
                _ => false,
            },
            Predicate::NotIn { column, values } => match cell(column) {
                Some(actual) if !actual.is_null() => !values.contains(actual),
                _ => false,
            },
            Predicate::NumberBetween { column, min, max } => {
                match cell(column).and_then(|v| v.as_f64()) {
                    Some(n) => n >= *min && n <= *max,
                    None => false,
                }
            }
            Predicate::DateBetween { column, start, end } => {
                match cell(column).and_then(|v| v.as_date()) {
                    Some(d) => d >= *start && d <= *end,
                    None => false,
                }
            }
            Predicate::IsNull { column } => matches!(cell(column), Some(v) if v.is_null()),
            Predicate::NotNull { column } => matches!(cell(column), Some(v) if !v.is_null()),
            Predicate::Not { inner } => !inner.matches(table, row),
            Predicate::All { preds } => preds.iter().all(|p| p.matches(table, row)),
            Predicate::Any { preds } => preds.iter().any(|p| p.matches(table, row)),
        }
    }
}

/// Returns a new table with only the rows matching `predicate`; schema and
/// row order are unchanged. Referenced columns are validated before any row
/// is evaluated.
pub fn filter(table: &Table, predicate: &Predicate) -> Result<Table, PipelineError> {
    predicate.validate("filter", table)?;
    Ok(table.retain_rows(|row| predicate.matches(table, row)))
}
