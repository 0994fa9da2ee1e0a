//! The field-rule source language.
//!
//! One rule per line:
//!
//! ```text
//! _diffrn.ambient_temperature 293 # room temperature
//! CHECK: _exptl_crystal.colour ?
//! DELETE: _journal.date_recd_electronic
//! EDIT: _computing.structure_refinement 'SHELXL-2019'
//! RENAME: _symmetry_cell_setting _space_group.crystal_system
//! CALCULATE: _diffrn.flux_density = _diffrn.flux_density / (_diffrn.total_exposure_time * 60)
//! APPEND: _publ_section.references "Ref A"
//! ```

pub mod expression;
mod parser;

use std::fmt;
use std::ops::Range;

pub use expression::{BinaryOperator, Expr};
pub use parser::parse_rules;

/// One declarative edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Report whether `field` is missing, matches `expected`, or differs.
    Check {
        field: String,
        expected: String,
        description: Option<String>,
    },
    Delete {
        field: String,
    },
    /// Replace the value of `field`, keeping its shape where possible.
    Edit {
        field: String,
        value: String,
    },
    Rename {
        from: String,
        to: String,
    },
    /// Evaluate `expression` and store the result in `field`.
    Calculate {
        field: String,
        expression: Expr,
    },
    /// Add a line to the text-block value of `field`.
    Append {
        field: String,
        text: String,
    },
}

/// A rule together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleLine {
    pub rule: Rule,
    pub span: Range<usize>,
    /// 1-based line number in the rule source.
    pub line: usize,
}

impl Rule {
    /// The field a rule acts on. RENAME reports its source name.
    pub fn field(&self) -> &str {
        match self {
            Rule::Check { field, .. }
            | Rule::Delete { field }
            | Rule::Edit { field, .. }
            | Rule::Calculate { field, .. }
            | Rule::Append { field, .. } => field,
            Rule::Rename { from, .. } => from,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Rule::Check { .. } => "CHECK",
            Rule::Delete { .. } => "DELETE",
            Rule::Edit { .. } => "EDIT",
            Rule::Rename { .. } => "RENAME",
            Rule::Calculate { .. } => "CALCULATE",
            Rule::Append { .. } => "APPEND",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Check {
                field, expected, ..
            } => write!(f, "CHECK: {} {}", field, expected),
            Rule::Delete { field } => write!(f, "DELETE: {}", field),
            Rule::Edit { field, value } => write!(f, "EDIT: {} {}", field, value),
            Rule::Rename { from, to } => write!(f, "RENAME: {} {}", from, to),
            Rule::Calculate { field, expression } => {
                write!(f, "CALCULATE: {} = {}", field, expression)
            }
            Rule::Append { field, text } => write!(f, "APPEND: {} {}", field, text),
        }
    }
}
