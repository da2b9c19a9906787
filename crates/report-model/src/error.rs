use thiserror::Error;

/// Shared error taxonomy for the report pipeline.
///
/// Abort-class errors carry enough context (source id, stage, column) to
/// diagnose a broken report without re-running it. Recoverable conditions are
/// deliberately absent: per-value coercion failures become nulls and are
/// counted (see `NormalizeReport`), and empty tables are a legitimate result
/// of filtering, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The underlying data source could not be reached or read.
    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// A column the caller declared as required is absent from the source,
    /// or a rename would collide with an existing column.
    #[error("{context}: expected column {column} is missing or conflicts")]
    SchemaMismatch { context: String, column: String },

    /// An operation referenced a column the table does not have.
    #[error("{stage}: unknown column {column}")]
    UnknownColumn { stage: &'static str, column: String },

    /// More than one input row mapped to the same pivot cell. Pivot never
    /// silently reduces duplicates; aggregate before pivoting.
    #[error(
        "pivot cell ({row_key}, {column_key}) is fed by {rows} input rows; \
         aggregate before pivoting"
    )]
    AmbiguousCell {
        row_key: String,
        column_key: String,
        rows: usize,
    },

    /// Two table columns share one name.
    #[error("duplicate column header: {column}")]
    DuplicateColumn { column: String },

    /// A row's cell count does not match the table's declared columns.
    #[error("row {row} has {cells} cells but table has {columns} columns")]
    RaggedRow {
        row: usize,
        cells: usize,
        columns: usize,
    },
}

impl PipelineError {
    pub fn unknown_column(stage: &'static str, column: impl Into<String>) -> Self {
        PipelineError::UnknownColumn {
            stage,
            column: column.into(),
        }
    }

    pub fn source_unavailable(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}
