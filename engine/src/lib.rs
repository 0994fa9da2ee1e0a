//! Dictionary-backed transformations of CIF documents.
//!
//! Every transformation takes a [`cif::Document`] and returns a new one
//! together with a [`ChangeLog`]; the input is never modified. All text
//! changes go through [`rewrite::apply`].

pub mod aliases;
pub mod change_log;
pub mod convert;
pub mod dictionary;
pub mod error;
pub mod prefixes;
pub mod rewrite;
pub mod rules;
pub mod validate;

pub use aliases::resolve_aliases;
pub use change_log::{Change, ChangeLog, TieBreak, Warning};
pub use convert::convert;
pub use dictionary::{
    CanonicalField, DictionarySet, DictionarySource, Fetch, FetchError, load, load_dictionaries,
    load_from_url, load_text,
};
pub use error::{ConversionError, DictionaryLoadError, RuleEvaluationError};
pub use rewrite::{EditOp, apply, rewrite};
pub use rules::{RuleFailure, RuleOutcome, RuleRun, RuleStatus, apply_rules};
pub use validate::{Issue, IssueKind, Validation, validate};
