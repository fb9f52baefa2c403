// ABOUTME: Library entry point for the dictionary markup engine.
// ABOUTME: Re-exports the tokenizer, token stream, selectors, and tidy rules used by the dict crate.

//! Recovery-oriented markup handling for MDict source entries.
//!
//! An entry body is tokenized into a flat [`Dom`] whose hierarchy is expressed
//! through id ranges. [`Dom::tidy`] rewrites it according to [`TidyRules`], and
//! [`Dom::find`] selects subtrees with compact [`TagSelector`]s.
//!
//! ```
//! use mdtools_markup::{Dom, TagSelector, TidyRules};
//!
//! let rules = TidyRules::builder()
//!     .drop(TagSelector::parse("div.ad").unwrap())
//!     .build();
//! let mut dom = Dom::parse("word\n<p>text<div class=\"ad\">x</div>");
//! dom.tidy(&rules);
//! assert_eq!(dom.to_string(), "word\r\n<p>text</p>");
//! ```

pub mod attrs;
pub mod dom;
pub mod error;
pub mod selector;
pub mod tag;
pub mod text;
pub mod tidy;
pub mod tokenizer;

pub use crate::attrs::TagAttr;
pub use crate::dom::{Dom, IdAllocator, Selection, ID_STEP};
pub use crate::error::SelectorError;
pub use crate::selector::{SelectorKind, TagSelector, ValuePredicate};
pub use crate::tag::{Category, Tag};
pub use crate::tidy::{TidyReport, TidyRules, TidyRulesBuilder, DEFAULT_SELF_TERMINATING};
pub use crate::tokenizer::tokenize;
