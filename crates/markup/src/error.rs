// ABOUTME: Error types for the markup engine.
// ABOUTME: Tokenizing and tidying never fail; only selector strings from configuration can be rejected.

use thiserror::Error;

/// Errors produced while parsing a selector string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The selector string was blank.
    #[error("selector is empty")]
    Empty,

    /// A class or id selector had nothing after its `.` or `#`.
    #[error("selector {0:?} names no class or id")]
    MissingValue(String),

    /// An attribute selector had no attribute name inside `[...]`.
    #[error("selector {0:?} names no attribute")]
    MissingAttribute(String),
}
