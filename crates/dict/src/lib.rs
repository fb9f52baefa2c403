// ABOUTME: Library entry point for dictionary-level tooling built on the markup engine.
// ABOUTME: Re-exports entry splitting, configuration, the tidy pipeline, and the merge engine.

pub mod config;
pub mod entry;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod style;

pub use crate::config::{MergeConfig, TidyConfig};
pub use crate::entry::{parse_entries, prune_redirects, split_entries, Entry, ENTRY_JOIN};
pub use crate::error::{DictError, Result};
pub use crate::merge::{merge_files, merge_sources, MergeSummary};
pub use crate::pipeline::{tidy_file, tidy_source, TidySummary};
pub use crate::style::StyleSheet;
