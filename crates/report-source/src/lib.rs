//! `report-source` is the data boundary of the report pipeline: named
//! sources yielding raw [`report_model::Table`]s.
//!
//! Adapters return source-shaped tables; canonicalization belongs to the
//! schema normalizer, and business filtering to the row filter. The crate
//! also provides the session fetch cache ([`CachedSource`]) and an explicit
//! fetch deadline ([`TimeoutSource`]).

mod cache;
mod csv_file;
mod source;
mod timeout;
mod workbook;

pub use cache::{CachedSource, FetchStats};
pub use csv_file::CsvSource;
pub use source::{DataSource, SourceQuery};
pub use timeout::TimeoutSource;
pub use workbook::{WorkbookSheet, WorkbookSource};
