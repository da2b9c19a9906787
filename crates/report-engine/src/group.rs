use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use report_model::{Key, PipelineError, Table, Value};

/// Reduction applied to one source column per group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduce {
    /// Sum of numeric values; nulls and non-numbers are skipped.
    Sum,
    /// Count of non-null values.
    Count,
    /// Largest non-null value under the key ordering.
    Max,
    /// Smallest non-null value under the key ordering.
    Min,
    /// Mean of numeric values; nulls and non-numbers are skipped.
    Mean,
}

/// One declared output column of an aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub source: String,
    pub reduce: Reduce,
    pub output: String,
}

impl AggregateSpec {
    pub fn new(source: impl Into<String>, reduce: Reduce, output: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reduce,
            output: output.into(),
        }
    }

    pub fn sum(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(source, Reduce::Sum, output)
    }

    pub fn count(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(source, Reduce::Count, output)
    }

    pub fn max(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(source, Reduce::Max, output)
    }

    pub fn min(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(source, Reduce::Min, output)
    }

    pub fn mean(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(source, Reduce::Mean, output)
    }
}

/// Whether to append a synthetic all-partitions row after the groups.
///
/// Mirrors the manual `PROJECT = "Total"` concat the original pages repeated:
/// the label lands in the first group column, remaining group columns are
/// null, and each spec is reduced across the whole input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Totals {
    #[default]
    None,
    Append(String),
}

/// Running state for one spec within one partition.
#[derive(Clone, Debug, Default)]
struct Accumulator {
    sum: f64,
    numeric: usize,
    non_null: usize,
    max: Option<Key>,
    min: Option<Key>,
}

impl Accumulator {
    fn push(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.non_null += 1;
        if let Some(n) = value.as_f64() {
            self.sum += n;
            self.numeric += 1;
        }
        let key = value.to_key();
        match &self.max {
            Some(best) if *best >= key => {}
            _ => self.max = Some(key.clone()),
        }
        match &self.min {
            Some(best) if *best <= key => {}
            _ => self.min = Some(key),
        }
    }

    fn finish(&self, reduce: Reduce) -> Value {
        match reduce {
            Reduce::Sum => {
                if self.numeric == 0 {
                    Value::Null
                } else {
                    Value::Number(self.sum)
                }
            }
            Reduce::Count => Value::Number(self.non_null as f64),
            Reduce::Mean => {
                if self.numeric == 0 {
                    Value::Null
                } else {
                    Value::Number(self.sum / self.numeric as f64)
                }
            }
            Reduce::Max => self.max.as_ref().map(Key::to_value).unwrap_or(Value::Null),
            Reduce::Min => self.min.as_ref().map(Key::to_value).unwrap_or(Value::Null),
        }
    }
}

/// Groups `table` by the tuple of `group_columns` values and reduces each
/// spec per partition.
///
/// Null is its own group value, not an excluded row. Output rows are sorted
/// lexicographically by group key (an explicit determinism contract, not an
/// accident of map iteration) so downstream charts and tests are
/// reproducible. With no group columns the whole table is one partition and
/// a totals row would duplicate it, so `Totals::Append` is ignored there.
pub fn aggregate(
    table: &Table,
    group_columns: &[&str],
    specs: &[AggregateSpec],
    totals: Totals,
) -> Result<Table, PipelineError> {
    let mut group_indices = Vec::with_capacity(group_columns.len());
    for column in group_columns {
        group_indices.push(table.require_column("aggregate", column)?);
    }
    let mut spec_indices = Vec::with_capacity(specs.len());
    for spec in specs {
        spec_indices.push(table.require_column("aggregate", &spec.source)?);
    }

    let mut groups: BTreeMap<Vec<Key>, Vec<Accumulator>> = BTreeMap::new();
    let mut overall: Vec<Accumulator> = vec![Accumulator::default(); specs.len()];
    for row in table.rows() {
        let group_key: Vec<Key> = group_indices.iter().map(|&idx| row[idx].to_key()).collect();
        let accs = groups
            .entry(group_key)
            .or_insert_with(|| vec![Accumulator::default(); specs.len()]);
        for (acc_idx, &value_idx) in spec_indices.iter().enumerate() {
            accs[acc_idx].push(&row[value_idx]);
            overall[acc_idx].push(&row[value_idx]);
        }
    }

    let mut headers: Vec<String> = group_columns.iter().map(|c| c.to_string()).collect();
    headers.extend(specs.iter().map(|spec| spec.output.clone()));

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(groups.len() + 1);
    for (group_key, accs) in &groups {
        let mut row: Vec<Value> = group_key.iter().map(Key::to_value).collect();
        row.extend(specs.iter().zip(accs).map(|(spec, acc)| acc.finish(spec.reduce)));
        rows.push(row);
    }

    if let Totals::Append(label) = totals {
        if !group_columns.is_empty() {
            let mut row: Vec<Value> = Vec::with_capacity(headers.len());
            row.push(Value::Text(label));
            row.extend(std::iter::repeat(Value::Null).take(group_columns.len() - 1));
            row.extend(
                specs
                    .iter()
                    .zip(&overall)
                    .map(|(spec, acc)| acc.finish(spec.reduce)),
            );
            rows.push(row);
        }
    }

    Table::new(headers, rows)
}
