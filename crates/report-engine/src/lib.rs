//! `report-engine` implements the stateless Table→Table operators of the
//! report pipeline: row filtering, grouping/aggregation, pivot/melt, and
//! derived-metric computation.
//!
//! Every operator takes a [`report_model::Table`] by reference and returns a
//! new one; nothing here holds state across calls. A report composes these
//! per page: load → normalize → filter → aggregate → pivot → derive.

mod derive;
mod group;
mod pivot;
mod predicate;

pub use derive::{derive, Expr};
pub use group::{aggregate, AggregateSpec, Reduce, Totals};
pub use pivot::{melt, pivot};
pub use predicate::{filter, Predicate};
