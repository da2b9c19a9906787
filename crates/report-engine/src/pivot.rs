use std::collections::BTreeMap;

use report_model::{Key, PipelineError, Table, Value};

/// Reshapes an aggregated long-format table into a wide matrix: one row per
/// distinct `row_key` value, one column per distinct `column_key` value,
/// cells taken from `value`.
///
/// Combinations absent from the input get `fill` (not null, so downstream
/// numeric formatting stays stable). Rows and columns are sorted by the key
/// ordering; column headers come from [`Key::display_string`], so a null
/// column key becomes a `(blank)` column.
///
/// Pivot never reduces: if more than one input row maps to the same
/// (row key, column key) pair the operation aborts with
/// [`PipelineError::AmbiguousCell`]; aggregate first.
pub fn pivot(
    table: &Table,
    row_key: &str,
    column_key: &str,
    value: &str,
    fill: Value,
) -> Result<Table, PipelineError> {
    let row_idx = table.require_column("pivot", row_key)?;
    let col_idx = table.require_column("pivot", column_key)?;
    let value_idx = table.require_column("pivot", value)?;

    let mut column_keys: BTreeMap<Key, ()> = BTreeMap::new();
    let mut cells: BTreeMap<Key, BTreeMap<Key, Value>> = BTreeMap::new();
    for row in table.rows() {
        let rk = row[row_idx].to_key();
        let ck = row[col_idx].to_key();
        column_keys.insert(ck.clone(), ());
        let row_cells = cells.entry(rk.clone()).or_default();
        if row_cells.insert(ck.clone(), row[value_idx].clone()).is_some() {
            let rows = table
                .rows()
                .iter()
                .filter(|r| r[row_idx].to_key() == rk && r[col_idx].to_key() == ck)
                .count();
            return Err(PipelineError::AmbiguousCell {
                row_key: rk.display_string(),
                column_key: ck.display_string(),
                rows,
            });
        }
    }

    let mut headers: Vec<String> = Vec::with_capacity(column_keys.len() + 1);
    headers.push(row_key.to_string());
    headers.extend(column_keys.keys().map(Key::display_string));

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(cells.len());
    for (rk, row_cells) in &cells {
        let mut out_row: Vec<Value> = Vec::with_capacity(headers.len());
        out_row.push(rk.to_value());
        for ck in column_keys.keys() {
            out_row.push(row_cells.get(ck).cloned().unwrap_or_else(|| fill.clone()));
        }
        rows.push(out_row);
    }

    Table::new(headers, rows)
}

/// Re-flattens a pivoted table back into long format: one output row per
/// (input row, non-id column), with the column header under `key_name` and
/// the cell under `value_name`.
pub fn melt(
    table: &Table,
    id_column: &str,
    key_name: &str,
    value_name: &str,
) -> Result<Table, PipelineError> {
    let id_idx = table.require_column("melt", id_column)?;

    let headers = vec![
        id_column.to_string(),
        key_name.to_string(),
        value_name.to_string(),
    ];
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row in table.rows() {
        for (col_idx, header) in table.headers().iter().enumerate() {
            if col_idx == id_idx {
                continue;
            }
            rows.push(vec![
                row[id_idx].clone(),
                Value::Text(header.clone()),
                row[col_idx].clone(),
            ]);
        }
    }
    Table::new(headers, rows)
}
