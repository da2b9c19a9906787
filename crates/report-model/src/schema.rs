use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{PipelineError, Table, Value};

/// Target semantic type for a canonical column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    /// A number that must carry no fractional part (counts, minutes, flags).
    Integer,
    Date,
    Bool,
}

/// What to do with source columns the rename map does not mention.
///
/// There is no default on purpose: the historical report sources disagree on
/// which extra columns they carry, so each caller must decide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Pass unmapped columns through with their source names.
    Keep,
    /// Drop unmapped columns from the output.
    Drop,
}

/// Preferred order for ambiguous numeric dates like `01/02/2024`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// Month / day / year (e.g. `12/31/2024`).
    #[default]
    Mdy,
    /// Day / month / year (e.g. `31/12/2024`).
    Dmy,
    /// Year / month / day (e.g. `2024/12/31`).
    Ymd,
}

/// Declarative schema mapping for one source variant.
///
/// Centralizes the per-page ad hoc renaming/retyping the original reports
/// scattered everywhere: the same logical feed exists in half a dozen
/// historical shapes, and this is the single place where a shape is described.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizeSpec {
    /// Source column name → canonical column name.
    #[serde(default)]
    pub renames: HashMap<String, String>,
    /// Canonical column name → target type.
    #[serde(default)]
    pub types: HashMap<String, ColumnType>,
    pub unmapped: UnmappedPolicy,
    #[serde(default)]
    pub date_order: DateOrder,
}

impl NormalizeSpec {
    pub fn new(unmapped: UnmappedPolicy) -> Self {
        Self {
            renames: HashMap::new(),
            types: HashMap::new(),
            unmapped,
            date_order: DateOrder::default(),
        }
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn retype(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.types.insert(column.into(), column_type);
        self
    }

    pub fn date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }
}

/// Per-column count of values that could not be coerced and became null.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub coercion_failures: BTreeMap<String, usize>,
}

impl NormalizeReport {
    pub fn total_failures(&self) -> usize {
        self.coercion_failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.coercion_failures.is_empty()
    }
}

/// Renames and retypes `table` into the canonical schema described by `spec`.
///
/// A value that cannot be coerced to its declared type becomes [`Value::Null`]
/// and is counted in the report; a single bad cell never aborts the pipeline.
/// Renaming onto a name that already exists in the output is a
/// [`PipelineError::SchemaMismatch`], and declaring a type for a column the
/// output does not have is a [`PipelineError::UnknownColumn`].
pub fn normalize(
    table: &Table,
    spec: &NormalizeSpec,
) -> Result<(Table, NormalizeReport), PipelineError> {
    // Resolve the output schema first so schema errors surface before any
    // row work happens.
    let mut kept: Vec<(usize, String)> = Vec::new();
    for (idx, header) in table.headers().iter().enumerate() {
        match spec.renames.get(header) {
            Some(canonical) => kept.push((idx, canonical.clone())),
            None => match spec.unmapped {
                UnmappedPolicy::Keep => kept.push((idx, header.clone())),
                UnmappedPolicy::Drop => {}
            },
        }
    }

    let mut seen: HashMap<&str, ()> = HashMap::with_capacity(kept.len());
    for (_, canonical) in &kept {
        if seen.insert(canonical.as_str(), ()).is_some() {
            return Err(PipelineError::SchemaMismatch {
                context: "normalize".to_string(),
                column: canonical.clone(),
            });
        }
    }
    for typed in spec.types.keys() {
        if !seen.contains_key(typed.as_str()) {
            return Err(PipelineError::unknown_column("normalize", typed));
        }
    }

    let mut report = NormalizeReport::default();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let mut out_row: Vec<Value> = Vec::with_capacity(kept.len());
        for (src_idx, canonical) in &kept {
            let value = &row[*src_idx];
            match spec.types.get(canonical) {
                None => out_row.push(value.clone()),
                Some(target) => match coerce(value, *target, spec.date_order) {
                    Some(coerced) => out_row.push(coerced),
                    None => {
                        *report.coercion_failures.entry(canonical.clone()).or_insert(0) += 1;
                        out_row.push(Value::Null);
                    }
                },
            }
        }
        rows.push(out_row);
    }

    for (column, count) in &report.coercion_failures {
        log::warn!("normalize: {count} value(s) in column {column} coerced to null");
    }

    let headers = kept.into_iter().map(|(_, name)| name).collect();
    Ok((Table::new(headers, rows)?, report))
}

/// Coerces one value to the target type; `None` means the value is counted as
/// a coercion failure. Nulls pass through every target unchanged.
fn coerce(value: &Value, target: ColumnType, date_order: DateOrder) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }

    match target {
        ColumnType::Text => Some(Value::Text(value.display_string())),
        ColumnType::Number => parse_number(value).map(Value::Number),
        ColumnType::Integer => {
            let n = parse_number(value)?;
            if n.fract() == 0.0 {
                Some(Value::Number(n))
            } else {
                None
            }
        }
        ColumnType::Date => match value {
            Value::Date(d) => Some(Value::Date(*d)),
            Value::Text(s) => parse_date_lenient(s, date_order).map(Value::Date),
            _ => None,
        },
        ColumnType::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) if *n == 0.0 || *n == 1.0 => Some(Value::Bool(*n == 1.0)),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => {
            // Warehouse exports format currency with thousands separators and
            // a leading symbol; strip both before parsing.
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Lenient date parsing: a fixed candidate list plus the declared order for
/// ambiguous numeric forms. The value must resolve to a single valid calendar
/// date or the cell becomes null.
fn parse_date_lenient(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Timestamps keep only their date part (`2024-04-01 00:00:00`,
    // `2024-04-01T00:00:00`).
    let date_part = trimmed
        .split_once('T')
        .or_else(|| trimmed.split_once(' '))
        .map(|(head, _)| head)
        .unwrap_or(trimmed);

    let unambiguous = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d %B %Y", "%B %d, %Y"];
    for format in unambiguous {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }

    let ordered: &[&str] = match order {
        DateOrder::Mdy => &["%m/%d/%Y", "%m-%d-%Y"],
        DateOrder::Dmy => &["%d/%m/%Y", "%d-%m-%Y"],
        DateOrder::Ymd => &[],
    };
    for format in ordered {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw() -> Table {
        Table::new(
            vec![
                "Employee".to_string(),
                "Target2".to_string(),
                "Period".to_string(),
                "ind_eligibility".to_string(),
            ],
            vec![
                vec![
                    Value::from("Reyes"),
                    Value::from("1,540.50"),
                    Value::from("2024-04-01"),
                    Value::from(0.0),
                ],
                vec![
                    Value::from("Tan"),
                    Value::from("n/a"),
                    Value::from("04/15/2024 08:30:00"),
                    Value::from(1.0),
                ],
            ],
        )
        .unwrap()
    }

    fn spec() -> NormalizeSpec {
        NormalizeSpec::new(UnmappedPolicy::Keep)
            .rename("Employee", "EMPLOYEE")
            .rename("Target2", "TARGET")
            .rename("Period", "PERIOD")
            .rename("ind_eligibility", "INDIV_ELIGIBILITY")
            .retype("TARGET", ColumnType::Number)
            .retype("PERIOD", ColumnType::Date)
            .retype("INDIV_ELIGIBILITY", ColumnType::Bool)
    }

    #[test]
    fn renames_and_retypes_into_the_canonical_schema() {
        let (table, report) = normalize(&raw(), &spec()).unwrap();
        assert_eq!(
            table.headers(),
            ["EMPLOYEE", "TARGET", "PERIOD", "INDIV_ELIGIBILITY"]
        );
        assert_eq!(table.cell(0, "TARGET"), Some(&Value::Number(1540.5)));
        assert_eq!(
            table.cell(0, "PERIOD"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()))
        );
        assert_eq!(
            table.cell(1, "PERIOD"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()))
        );
        assert_eq!(table.cell(1, "INDIV_ELIGIBILITY"), Some(&Value::Bool(true)));

        // "n/a" is not a number: recovered as null and counted, never an error.
        assert_eq!(table.cell(1, "TARGET"), Some(&Value::Null));
        assert_eq!(report.coercion_failures.get("TARGET"), Some(&1));
        assert_eq!(report.total_failures(), 1);
    }

    #[test]
    fn drop_policy_removes_unmapped_columns() {
        let spec = NormalizeSpec::new(UnmappedPolicy::Drop)
            .rename("Employee", "EMPLOYEE")
            .rename("Period", "PERIOD");
        let (table, report) = normalize(&raw(), &spec).unwrap();
        assert_eq!(table.headers(), ["EMPLOYEE", "PERIOD"]);
        assert!(report.is_clean());
    }

    #[test]
    fn rename_collision_is_a_schema_mismatch() {
        let spec = NormalizeSpec::new(UnmappedPolicy::Keep).rename("Target2", "Period");
        let err = normalize(&raw(), &spec).unwrap_err();
        assert_eq!(
            err,
            PipelineError::SchemaMismatch {
                context: "normalize".to_string(),
                column: "Period".to_string()
            }
        );
    }

    #[test]
    fn typing_an_absent_column_fails_up_front() {
        let spec = NormalizeSpec::new(UnmappedPolicy::Keep).retype("RATE", ColumnType::Number);
        let err = normalize(&raw(), &spec).unwrap_err();
        assert_eq!(err, PipelineError::unknown_column("normalize", "RATE"));
    }

    #[test]
    fn ambiguous_numeric_dates_follow_the_declared_order() {
        assert_eq!(
            parse_date_lenient("01/02/2024", DateOrder::Mdy),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(
            parse_date_lenient("01/02/2024", DateOrder::Dmy),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(parse_date_lenient("01/02/2024", DateOrder::Ymd), None);
        // An impossible calendar date never "resolves".
        assert_eq!(parse_date_lenient("2024-02-31", DateOrder::Mdy), None);
    }

    #[test]
    fn integer_columns_reject_fractional_values() {
        assert_eq!(
            coerce(&Value::Number(3.0), ColumnType::Integer, DateOrder::Mdy),
            Some(Value::Number(3.0))
        );
        assert_eq!(
            coerce(&Value::Number(3.5), ColumnType::Integer, DateOrder::Mdy),
            None
        );
        assert_eq!(
            coerce(&Value::Null, ColumnType::Integer, DateOrder::Mdy),
            Some(Value::Null)
        );
    }

    #[test]
    fn spec_serde_round_trips() {
        let spec = spec();
        let json = serde_json::to_string(&spec).unwrap();
        let decoded: NormalizeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, spec);
    }
}
