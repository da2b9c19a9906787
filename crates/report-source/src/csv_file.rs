use std::collections::HashMap;
use std::path::PathBuf;

use csv::ByteRecord;
use encoding_rs::WINDOWS_1252;

use crate::source::{apply_params, infer_scalar};
use crate::{DataSource, SourceQuery};
use report_model::{PipelineError, Table, Value};

#[derive(Clone, Debug)]
struct CsvSpec {
    path: PathBuf,
    /// Columns that must be present in the header, checked before any row is
    /// returned.
    expected_columns: Vec<String>,
}

/// File-backed adapter for warehouse CSV exports.
///
/// Each source id maps to one file. The first record is the header; fields
/// decode as UTF-8 with a Windows-1252 fallback, matching how the upstream
/// exports are produced. Short records are padded with nulls and long ones
/// truncated, so one malformed row never aborts a report.
#[derive(Clone, Debug, Default)]
pub struct CsvSource {
    sources: HashMap<String, CsvSpec>,
}

impl CsvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self, source_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.register_with_columns(source_id, path, Vec::<String>::new())
    }

    /// Registers a source that must expose the given columns.
    pub fn register_with_columns(
        mut self,
        source_id: impl Into<String>,
        path: impl Into<PathBuf>,
        expected_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.sources.insert(
            source_id.into(),
            CsvSpec {
                path: path.into(),
                expected_columns: expected_columns.into_iter().map(Into::into).collect(),
            },
        );
        self
    }
}

impl DataSource for CsvSource {
    fn fetch(&self, query: &SourceQuery) -> Result<Table, PipelineError> {
        let spec = self.sources.get(&query.source_id).ok_or_else(|| {
            PipelineError::source_unavailable(&query.source_id, "no such registered source")
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            // Accept rows with varying field counts; width is fixed up below.
            .flexible(true)
            .from_path(&spec.path)
            .map_err(|e| PipelineError::source_unavailable(&query.source_id, e.to_string()))?;

        let mut record = ByteRecord::new();
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|e| PipelineError::source_unavailable(&query.source_id, e.to_string()))?;
        if !more {
            return Err(PipelineError::source_unavailable(
                &query.source_id,
                "file has no header row",
            ));
        }
        let headers: Vec<String> = record.iter().map(decode_field).collect();
        for expected in &spec.expected_columns {
            if !headers.iter().any(|h| h == expected) {
                return Err(PipelineError::SchemaMismatch {
                    context: query.source_id.clone(),
                    column: expected.clone(),
                });
            }
        }

        let mut rows: Vec<Vec<Value>> = Vec::new();
        loop {
            let more = reader
                .read_byte_record(&mut record)
                .map_err(|e| PipelineError::source_unavailable(&query.source_id, e.to_string()))?;
            if !more {
                break;
            }
            let mut row: Vec<Value> = record
                .iter()
                .take(headers.len())
                .map(|field| infer_scalar(&decode_field(field)))
                .collect();
            if record.len() > headers.len() {
                log::warn!(
                    "source {}: row {} has {} fields, truncated to {} columns",
                    query.source_id,
                    rows.len() + 1,
                    record.len(),
                    headers.len()
                );
            }
            row.resize(headers.len(), Value::Null);
            rows.push(row);
        }

        apply_params(Table::new(headers, rows)?, query)
    }
}

/// Decodes one raw field: UTF-8 when valid, Windows-1252 otherwise.
fn decode_field(field: &[u8]) -> String {
    match std::str::from_utf8(field) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(field);
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn reads_header_and_typed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "sales.csv",
            b"PROJECT,PERIOD,BILLED\nAIFS,2024-04-01,120\n,2024-04-01,\n",
        );
        let source = CsvSource::new().register_with_columns(
            "sales",
            path,
            ["PROJECT", "PERIOD", "BILLED"],
        );

        let table = source.fetch(&SourceQuery::new("sales")).unwrap();
        assert_eq!(table.headers(), ["PROJECT", "PERIOD", "BILLED"]);
        assert_eq!(table.cell(0, "BILLED"), Some(&Value::Number(120.0)));
        assert_eq!(
            table.cell(0, "PERIOD"),
            Some(&Value::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
            ))
        );
        // Blank fields are explicit nulls, not omitted cells.
        assert_eq!(table.cell(1, "PROJECT"), Some(&Value::Null));
        assert_eq!(table.cell(1, "BILLED"), Some(&Value::Null));
    }

    #[test]
    fn missing_expected_column_is_a_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "sales.csv", b"PROJECT,PERIOD\nAIFS,2024-04-01\n");
        let source =
            CsvSource::new().register_with_columns("sales", path, ["PROJECT", "BILLED"]);

        let err = source.fetch(&SourceQuery::new("sales")).unwrap_err();
        assert_eq!(
            err,
            PipelineError::SchemaMismatch {
                context: "sales".to_string(),
                column: "BILLED".to_string()
            }
        );
    }

    #[test]
    fn params_restrict_rows_by_equality() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "invoice.csv",
            b"TX_TYPE,AMOUNT\nINV,10\nCM,4\nINV,6\n",
        );
        let source = CsvSource::new().register("invoice", path);

        let query = SourceQuery::new("invoice").with_param("TX_TYPE", "INV");
        let table = source.fetch(&query).unwrap();
        assert_eq!(table.row_count(), 2);

        let bad = SourceQuery::new("invoice").with_param("TXTYPE", "INV");
        let err = source.fetch(&bad).unwrap_err();
        assert_eq!(
            err,
            PipelineError::SchemaMismatch {
                context: "invoice".to_string(),
                column: "TXTYPE".to_string()
            }
        );
    }

    #[test]
    fn ragged_records_are_padded_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "eod.csv", b"A,B\n1\n2,3,4\n");
        let source = CsvSource::new().register("eod", path);

        let table = source.fetch(&SourceQuery::new("eod")).unwrap();
        assert_eq!(table.rows()[0], vec![Value::Number(1.0), Value::Null]);
        assert_eq!(table.rows()[1], vec![Value::Number(2.0), Value::Number(3.0)]);
    }

    #[test]
    fn unknown_source_and_missing_file_surface_as_unavailable() {
        let source = CsvSource::new();
        let err = source.fetch(&SourceQuery::new("nope")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));

        let source = CsvSource::new().register("gone", "/definitely/not/here.csv");
        let err = source.fetch(&SourceQuery::new("gone")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn non_utf8_fields_fall_back_to_windows_1252() {
        let dir = tempfile::tempdir().unwrap();
        // 0xF1 is "ñ" in Windows-1252 and invalid UTF-8.
        let path = write_file(&dir, "emp.csv", b"Employee\nMu\xF1oz\n");
        let source = CsvSource::new().register("emp", path);

        let table = source.fetch(&SourceQuery::new("emp")).unwrap();
        assert_eq!(table.cell(0, "Employee"), Some(&Value::Text("Muñoz".to_string())));
    }
}
