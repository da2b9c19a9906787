use std::collections::HashMap;

use crate::{PipelineError, Value};

/// Row-major table: a header row plus value rows sharing that schema.
///
/// Tables are immutable once built; every pipeline stage produces a new
/// `Table` rather than mutating its input. Row order is preserved across
/// stages that do not define their own ordering, so displays stay stable.
#[derive(Clone, Debug)]
pub struct Table {
    headers: Vec<String>,
    header_index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table, validating that headers are unique and every row has
    /// exactly one cell per declared column.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, PipelineError> {
        let mut header_index = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if header_index.insert(header.clone(), idx).is_some() {
                return Err(PipelineError::DuplicateColumn {
                    column: header.clone(),
                });
            }
        }

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(PipelineError::RaggedRow {
                    row: row_idx,
                    cells: row.len(),
                    columns: headers.len(),
                });
            }
        }

        Ok(Self {
            headers,
            header_index,
            rows,
        })
    }

    /// A table with the given schema and no rows.
    pub fn empty(headers: Vec<String>) -> Result<Self, PipelineError> {
        Self::new(headers, Vec::new())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.header_index.get(header).copied()
    }

    /// Resolves a column by name, reporting the failing stage on error.
    pub fn require_column(&self, stage: &'static str, header: &str) -> Result<usize, PipelineError> {
        self.column_index(header)
            .ok_or_else(|| PipelineError::unknown_column(stage, header))
    }

    pub fn cell(&self, row: usize, header: &str) -> Option<&Value> {
        let col = self.column_index(header)?;
        self.rows.get(row)?.get(col)
    }

    /// Returns a new table with `header` set to `values` (one per row).
    ///
    /// Overwrites the column if it already exists, otherwise appends it on
    /// the right. `values.len()` must equal the row count.
    pub fn with_column(
        &self,
        header: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<Self, PipelineError> {
        let header = header.into();
        if values.len() != self.rows.len() {
            return Err(PipelineError::RaggedRow {
                row: self.rows.len().min(values.len()),
                cells: values.len(),
                columns: self.rows.len(),
            });
        }

        let mut out = self.clone();
        match out.column_index(&header) {
            Some(col) => {
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                out.header_index.insert(header.clone(), out.headers.len());
                out.headers.push(header);
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(out)
    }

    /// Returns a new table keeping only the rows at `indices`, in order.
    pub(crate) fn take_rows(&self, indices: &[usize]) -> Self {
        let rows = indices
            .iter()
            .filter_map(|&idx| self.rows.get(idx).cloned())
            .collect();
        Self {
            headers: self.headers.clone(),
            header_index: self.header_index.clone(),
            rows,
        }
    }

    /// Keeps only the rows for which `keep` returns true; schema and row
    /// order are unchanged.
    pub fn retain_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Self {
        let indices: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| keep(row))
            .map(|(idx, _)| idx)
            .collect();
        self.take_rows(&indices)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        // The header index is derived from the headers; compare the schema
        // and the data.
        self.headers == other.headers && self.rows == other.rows
    }
}
