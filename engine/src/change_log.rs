use std::fmt;

use serde::Serialize;

/// What a transformation did, plus everything it noticed along the way.
///
/// Line numbers refer to the document the transformation started from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeLog {
    pub changes: Vec<Change>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    Renamed {
        line: usize,
        from: String,
        to: String,
    },
    Deleted {
        line: usize,
        field: String,
    },
    Edited {
        line: usize,
        field: String,
        old: String,
        new: String,
    },
    Created {
        field: String,
        value: String,
    },
    Appended {
        field: String,
        text: String,
    },
    MarkerInserted {
        marker: String,
    },
    MarkerReplaced {
        from: String,
        to: String,
    },
    /// Several spellings of one canonical field were reduced to one.
    AliasResolved {
        line: usize,
        canonical: String,
        kept: String,
        discarded: Vec<String>,
        rule: TieBreak,
    },
}

/// Which tie-break decided an alias conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Exactly one occurrence held a real, non-default value.
    NonDefaultValue,
    /// The occurrence spelled in the block's dominant notation.
    DominantNotation,
    FirstOccurrence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub line: Option<usize>,
    pub field: Option<String>,
    pub message: String,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn warn(&mut self, line: Option<usize>, field: Option<&str>, message: impl Into<String>) {
        self.warnings.push(Warning {
            line,
            field: field.map(str::to_string),
            message: message.into(),
        });
    }

    /// Append another log after this one.
    pub fn extend(&mut self, other: ChangeLog) {
        self.changes.extend(other.changes);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.warnings.is_empty()
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::NonDefaultValue => write!(f, "only occurrence with a non-default value"),
            TieBreak::DominantNotation => write!(f, "matches the block's dominant notation"),
            TieBreak::FirstOccurrence => write!(f, "first occurrence"),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Renamed { line, from, to } => {
                write!(f, "line {}: renamed {} -> {}", line, from, to)
            }
            Change::Deleted { line, field } => write!(f, "line {}: deleted {}", line, field),
            Change::Edited {
                line,
                field,
                old,
                new,
            } => write!(f, "line {}: {} changed from '{}' to '{}'", line, field, old, new),
            Change::Created { field, value } => write!(f, "added {} = '{}'", field, value),
            Change::Appended { field, text } => write!(f, "appended '{}' to {}", text, field),
            Change::MarkerInserted { marker } => write!(f, "inserted version marker {}", marker),
            Change::MarkerReplaced { from, to } => {
                write!(f, "replaced version marker {} with {}", from, to)
            }
            Change::AliasResolved {
                line,
                canonical,
                kept,
                discarded,
                rule,
            } => write!(
                f,
                "line {}: kept {} for {}, removed {} ({})",
                line,
                kept,
                canonical,
                discarded.join(", "),
                rule
            ),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}", self.message)
    }
}
