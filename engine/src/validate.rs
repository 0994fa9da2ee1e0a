use std::collections::HashMap;
use std::fmt;

use cif::{Document, Notation, Value};
use serde::Serialize;
use tracing::debug;

use crate::convert::scope_label;
use crate::dictionary::{DictionarySet, ValueKind};
use crate::prefixes::{describe, registered_prefix};

/// Findings about the field names and values of a document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Validation {
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub line: usize,
    pub field: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueKind {
    /// The dictionary does not define this name.
    Unknown,
    /// Not in the dictionary, but under a registered local prefix.
    LocalPrefix { prefix: String },
    Deprecated { replacement: Option<String> },
    /// Written in the minority notation of its block.
    NotationMismatch { expected: String },
    /// The same name appears earlier in the same block.
    Duplicate { first_line: usize },
    NotInEnumeration { value: String },
    NotNumeric { value: String },
}

impl Validation {
    /// No issues beyond informational ones.
    pub fn is_clean(&self) -> bool {
        self.problems().next().is_none()
    }

    pub fn problems(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.kind.is_informational())
    }
}

impl IssueKind {
    /// Findings that describe a name without faulting it.
    pub fn is_informational(&self) -> bool {
        matches!(self, IssueKind::LocalPrefix { .. })
    }
}

/// Check every field name and value against `dictionary`. Read-only.
pub fn validate(document: &Document, dictionary: &DictionarySet) -> Validation {
    let mut issues = Vec::new();

    for scope in document.scopes() {
        let dominant = scope.dominant_notation();
        let names = scope.names();
        let mut first_seen: HashMap<&str, usize> = HashMap::new();

        for name in &names {
            let line = document.line_of(name.span.start);
            let mut push = |kind| {
                issues.push(Issue {
                    line,
                    field: name.name.to_string(),
                    kind,
                })
            };

            if let Some(&first_line) = first_seen.get(name.name) {
                push(IssueKind::Duplicate { first_line });
            } else {
                first_seen.insert(name.name, line);
            }

            if Notation::of(name.name) != dominant {
                push(IssueKind::NotationMismatch {
                    expected: dominant.to_string(),
                });
            }

            let Some(field) = dictionary.lookup(name.name) else {
                match registered_prefix(name.name) {
                    Some(prefix) => push(IssueKind::LocalPrefix {
                        prefix: prefix.to_string(),
                    }),
                    None => push(IssueKind::Unknown),
                }
                continue;
            };
            if field.is_deprecated_spelling(name.name) {
                let replacement = if field.retired {
                    None
                } else if field.deprecated_by.is_some() {
                    dictionary
                        .current_field(&field.canonical_id)
                        .filter(|current| !current.retired)
                        .map(|current| current.spelling_for(dominant).to_string())
                } else {
                    Some(field.spelling_for(dominant).to_string())
                };
                push(IssueKind::Deprecated { replacement });
            }
        }

        for field in scope.fields() {
            if let Some(def) = dictionary.lookup(&field.name) {
                if let Some(kind) = check_value(&field.value, &def.value_kind, &def.enumerated_values) {
                    issues.push(Issue {
                        line: document.line_of(field.value_span.start),
                        field: field.name.clone(),
                        kind,
                    });
                }
            }
        }
        for lp in scope.loops() {
            for (col, column) in lp.columns.iter().enumerate() {
                let Some(def) = dictionary.lookup(&column.name) else {
                    continue;
                };
                for row in &lp.rows {
                    let cell = &row[col];
                    if let Some(kind) = check_value(&cell.value, &def.value_kind, &def.enumerated_values) {
                        issues.push(Issue {
                            line: document.line_of(cell.span.start),
                            field: column.name.clone(),
                            kind,
                        });
                    }
                }
            }
        }

        debug!(scope = %scope_label(scope), issues = issues.len(), "Validated scope");
    }

    issues.sort_by_key(|i| i.line);
    Validation { issues }
}

fn check_value(
    value: &Value,
    kind: &ValueKind,
    enumeration: &Option<Vec<String>>,
) -> Option<IssueKind> {
    if value.is_placeholder() {
        return None;
    }
    let text = value.text();
    if let Some(allowed) = enumeration {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(text)) {
            return Some(IssueKind::NotInEnumeration {
                value: text.to_string(),
            });
        }
    }
    if *kind == ValueKind::Numeric && value.as_number().is_none() {
        return Some(IssueKind::NotNumeric {
            value: text.to_string(),
        });
    }
    None
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ", self.line, self.field)?;
        match &self.kind {
            IssueKind::Unknown => write!(f, "is not defined in the loaded dictionaries"),
            IssueKind::LocalPrefix { prefix } => match describe(prefix) {
                Some(owner) => write!(f, "uses the registered local prefix '{}' ({})", prefix, owner),
                None => write!(f, "uses the registered local prefix '{}'", prefix),
            },
            IssueKind::Deprecated {
                replacement: Some(replacement),
            } => write!(f, "is deprecated; use {}", replacement),
            IssueKind::Deprecated { replacement: None } => write!(f, "is deprecated"),
            IssueKind::NotationMismatch { expected } => {
                write!(f, "does not use the block's {} notation", expected)
            }
            IssueKind::Duplicate { first_line } => {
                write!(f, "is repeated (first on line {})", first_line)
            }
            IssueKind::NotInEnumeration { value } => {
                write!(f, "has value '{}', which is not one of the allowed values", value)
            }
            IssueKind::NotNumeric { value } => write!(f, "has non-numeric value '{}'", value),
        }
    }
}
