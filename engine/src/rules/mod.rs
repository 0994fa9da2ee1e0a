//! Applying field rules to a document.

pub mod evaluator;
mod executor;

use std::fmt;

use cif::Document;
use cif::rules::RuleLine;
use serde::Serialize;

use crate::change_log::ChangeLog;
use crate::error::RuleEvaluationError;

pub use executor::apply_rules;

/// The result of running a rule list.
#[derive(Debug, Clone)]
pub struct RuleRun {
    /// The document after the last rule that completed.
    pub document: Document,
    pub change_log: ChangeLog,
    /// One outcome per rule attempted, in order.
    pub outcomes: Vec<RuleOutcome>,
    /// Set when a rule failed and the run stopped there.
    pub failure: Option<RuleFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    /// Line of the rule in the rule source.
    pub line: usize,
    pub rule: String,
    pub field: String,
    #[serde(flatten)]
    pub status: RuleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleStatus {
    /// CHECK: the field is not in the document.
    Missing,
    /// CHECK: the field holds the expected value.
    MatchesDefault,
    /// CHECK: the field holds something else.
    Differs { value: String },
    /// CHECK: the field is a loop column and has no single value.
    InLoop,
    Deleted,
    Edited { old: String, new: String },
    Unchanged,
    Renamed { to: String },
    Calculated { value: String },
    Created { value: String },
    Appended,
    /// DELETE or RENAME of a field that is not present.
    Absent,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFailure {
    pub line: usize,
    pub rule: String,
    pub field: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: RuleEvaluationError,
}

fn serialize_display<S: serde::Serializer>(
    error: &RuleEvaluationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl RuleRun {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

impl RuleOutcome {
    fn new(line: &RuleLine, status: RuleStatus) -> Self {
        RuleOutcome {
            line: line.line,
            rule: line.rule.to_string(),
            field: line.rule.field().to_string(),
            status,
        }
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule on line {} ({}) failed: {}",
            self.line, self.rule, self.error
        )
    }
}
