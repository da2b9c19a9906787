use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use report_model::{PipelineError, Table, Value};

/// A named source plus the parameters restricting its raw read.
///
/// Params are an ordered map so the whole query doubles as a stable cache
/// key. For file-backed adapters a param whose name matches a source column
/// keeps only rows whose cell renders equal to the param value, the file
/// analogue of a fixed query predicate. Business-logic filtering does not
/// belong here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceQuery {
    pub source_id: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl SourceQuery {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// A named data source yielding raw tables.
///
/// Implementations must be safe to call concurrently; blocking until the
/// data arrives (or errors) is expected; wrap with
/// [`crate::TimeoutSource`] for a deadline.
pub trait DataSource {
    fn fetch(&self, query: &SourceQuery) -> Result<Table, PipelineError>;
}

/// Maps raw cell text to a scalar: numbers and ISO dates become typed values,
/// blanks become null, everything else stays text. Finer typing (ambiguous
/// date orders, currency strings) is the normalizer's job.
pub(crate) fn infer_scalar(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return Value::Number(n);
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Value::Date(d);
    }
    match trimmed {
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        _ => Value::Text(trimmed.to_string()),
    }
}

/// Applies query params as equality restrictions over matching columns.
///
/// A param that names no source column is a [`PipelineError::SchemaMismatch`]
/// so typos in page config fail loudly instead of silently returning the
/// whole table.
pub(crate) fn apply_params(table: Table, query: &SourceQuery) -> Result<Table, PipelineError> {
    if query.params.is_empty() {
        return Ok(table);
    }
    let mut restrictions: Vec<(usize, &str)> = Vec::with_capacity(query.params.len());
    for (name, value) in &query.params {
        let idx = table
            .column_index(name)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                context: query.source_id.clone(),
                column: name.clone(),
            })?;
        restrictions.push((idx, value));
    }
    Ok(table.retain_rows(|row| {
        restrictions
            .iter()
            .all(|(idx, value)| row[*idx].display_string() == **value)
    }))
}
