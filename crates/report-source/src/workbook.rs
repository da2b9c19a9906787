use std::collections::HashMap;
use std::path::PathBuf;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;

use crate::source::apply_params;
use crate::{DataSource, SourceQuery};
use report_model::{PipelineError, Table, Value};

/// Where one named source lives inside a spreadsheet file.
#[derive(Clone, Debug)]
pub struct WorkbookSheet {
    pub path: PathBuf,
    pub sheet: String,
    /// Rows above the header (title banners in the billing workbook).
    pub skip_rows: usize,
    /// Optional column subset: when set, only these columns are returned (in
    /// this order) and each must exist in the header.
    pub columns: Option<Vec<String>>,
}

impl WorkbookSheet {
    pub fn new(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.into(),
            skip_rows: 0,
            columns: None,
        }
    }

    pub fn skip_rows(mut self, rows: usize) -> Self {
        self.skip_rows = rows;
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Adapter for spreadsheet-backed sources (`Billing v3.0.xlsx` and friends).
///
/// The first non-skipped row is the header. Cells map to scalars: numbers
/// stay numbers, date cells become calendar dates, blank strings and error
/// cells become null.
#[derive(Clone, Debug, Default)]
pub struct WorkbookSource {
    sources: HashMap<String, WorkbookSheet>,
}

impl WorkbookSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, source_id: impl Into<String>, sheet: WorkbookSheet) -> Self {
        self.sources.insert(source_id.into(), sheet);
        self
    }
}

impl DataSource for WorkbookSource {
    fn fetch(&self, query: &SourceQuery) -> Result<Table, PipelineError> {
        let spec = self.sources.get(&query.source_id).ok_or_else(|| {
            PipelineError::source_unavailable(&query.source_id, "no such registered source")
        })?;

        let mut workbook = open_workbook_auto(&spec.path)
            .map_err(|e| PipelineError::source_unavailable(&query.source_id, e.to_string()))?;
        let range = workbook
            .worksheet_range(&spec.sheet)
            .map_err(|e| PipelineError::source_unavailable(&query.source_id, e.to_string()))?;

        let mut rows_iter = range.rows().skip(spec.skip_rows);
        let Some(header_row) = rows_iter.next() else {
            return Err(PipelineError::source_unavailable(
                &query.source_id,
                format!("sheet {} has no header row", spec.sheet),
            ));
        };
        let headers: Vec<String> = header_row.iter().map(header_text).collect();

        // Resolve the column subset against the sheet header before reading
        // data, so a renamed sheet fails with the missing column's name.
        let projection: Vec<usize> = match &spec.columns {
            Some(wanted) => {
                let mut indices = Vec::with_capacity(wanted.len());
                for name in wanted {
                    let idx = headers.iter().position(|h| h == name).ok_or_else(|| {
                        PipelineError::SchemaMismatch {
                            context: query.source_id.clone(),
                            column: name.clone(),
                        }
                    })?;
                    indices.push(idx);
                }
                indices
            }
            None => (0..headers.len()).collect(),
        };
        let out_headers: Vec<String> = projection.iter().map(|&idx| headers[idx].clone()).collect();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for row in rows_iter {
            let out_row: Vec<Value> = projection
                .iter()
                .map(|&idx| row.get(idx).map(map_cell).unwrap_or(Value::Null))
                .collect();
            rows.push(out_row);
        }

        apply_params(Table::new(out_headers, rows)?, query)
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Maps one spreadsheet cell to a pipeline scalar.
fn map_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::Text(trimmed.to_string())
            }
        }
        Data::DateTime(dt) => match date_from_serial(dt.as_f64()) {
            Some(date) => Value::Date(date),
            None => Value::Null,
        },
        Data::DateTimeIso(s) => match NaiveDate::parse_from_str(&s[..s.len().min(10)], "%Y-%m-%d")
        {
            Ok(date) => Value::Date(date),
            Err(_) => Value::Null,
        },
        // Durations and error cells carry nothing the pipeline can use.
        Data::DurationIso(_) | Data::Error(_) => Value::Null,
    }
}

/// Converts an Excel 1900-system serial number to a calendar date.
///
/// Day zero of the 1900 system is 1899-12-30 (the offset absorbs Excel's
/// phantom 1900-02-29 for every serial a report will actually contain).
fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}
