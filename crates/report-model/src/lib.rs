//! `report-model` defines the core tabular data structures for the report
//! pipeline.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the pipeline operators (filter, aggregate, pivot, derive)
//! - data source adapters (warehouse exports, spreadsheet files)
//! - page/host layers via `serde` (JSON-safe config shapes)

mod error;
mod reference;
mod schema;
mod table;
mod value;

pub use error::PipelineError;
pub use reference::{ReferenceList, ReleaseTrack, TrackLabels};
pub use schema::{
    normalize, ColumnType, DateOrder, NormalizeReport, NormalizeSpec, UnmappedPolicy,
};
pub use table::Table;
pub use value::{Key, Value};
