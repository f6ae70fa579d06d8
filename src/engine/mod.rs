//! Record pipeline stages: merge uploads, normalize names, filter.

pub mod filter;
pub mod merge;
pub mod normalization;

pub use filter::{DateRange, FilterCriteria, filter_table};
pub use merge::{MergePolicy, MergedTable, merge_tables};
pub use normalization::{NormalizationOutput, NormalizeOptions, ResolutionStats, normalize_table};
