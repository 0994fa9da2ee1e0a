use std::ops::Range;

use cif::ParseError;
use thiserror::Error;

/// A dictionary source could not be turned into field definitions.
#[derive(Debug, Error)]
pub enum DictionaryLoadError {
    #[error("cannot read {source_name}: {message}")]
    Unreadable { source_name: String, message: String },

    #[error("{source_name} is not valid CIF: {error}")]
    Syntax {
        source_name: String,
        #[source]
        error: ParseError,
    },

    #[error("{source_name} uses the {dialect} dictionary language, which is not supported")]
    Unsupported { source_name: String, dialect: String },

    #[error("{source_name} defines no fields")]
    Empty { source_name: String },

    #[error("fetching {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("no dictionary could be loaded ({failures} source(s) failed)")]
    NothingLoaded { failures: usize },
}

/// A set of edits could not be applied. The input document is untouched.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("edits at bytes {first:?} and {second:?} overlap")]
    Overlapping {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("edit span {span:?} lies outside the document ({len} bytes)")]
    OutOfBounds { span: Range<usize>, len: usize },

    #[error("edit span {span:?} does not address a recorded element")]
    Unaddressable { span: Range<usize> },

    #[error("edit span {span:?} cuts into protected text at {protected:?}")]
    CutsProtected {
        span: Range<usize>,
        protected: Range<usize>,
    },

    #[error("rewritten text no longer parses: {0}")]
    Reparse(#[source] ParseError),
}

/// A rule could not be evaluated. The run stops at the failing rule.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleEvaluationError {
    #[error("field {field} referenced by the expression is missing")]
    MissingOperand { field: String },

    #[error("field {field} has non-numeric value '{value}'")]
    NonNumeric { field: String, value: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("field {field} is a loop column; scalar rules cannot change it")]
    LoopedField { field: String },

    #[error("the document has no data block to apply rules to")]
    NoTargetBlock,

    #[error("rewrite failed: {message}")]
    Rewrite { message: String },
}

impl ConversionError {
    /// The span the error concerns, when there is one.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            ConversionError::Overlapping { second, .. } => Some(second.clone()),
            ConversionError::OutOfBounds { .. } => None,
            ConversionError::Unaddressable { span } => Some(span.clone()),
            ConversionError::CutsProtected { span, .. } => Some(span.clone()),
            // Points into the rewritten text, not the input.
            ConversionError::Reparse(_) => None,
        }
    }
}
