use cif::document::render::{Shape, render};
use cif::rules::{Rule, RuleLine};
use cif::{Block, Document, Field, Loop};
use tracing::{debug, info, warn};

use crate::change_log::{Change, ChangeLog};
use crate::dictionary::DictionarySet;
use crate::error::RuleEvaluationError;
use crate::rewrite::{EditOp, rewrite};
use crate::rules::evaluator::{evaluate, format_number};
use crate::rules::{RuleFailure, RuleOutcome, RuleRun, RuleStatus};

/// Apply `rules` in order to the first data block of `document`.
///
/// Each rule sees the result of the rules before it. When a rule fails the
/// run stops: the returned document is the one that rule started from, and
/// `failure` says which rule and field failed.
///
/// With a dictionary, a rule naming one spelling of a field also finds the
/// field written in another spelling.
pub fn apply_rules(
    document: &Document,
    rules: &[RuleLine],
    dictionary: Option<&DictionarySet>,
) -> RuleRun {
    let mut current = document.clone();
    let mut change_log = ChangeLog::new();
    let mut outcomes = Vec::new();

    for line in rules {
        debug!(rule = %line.rule, line = line.line, "Applying rule");
        let result = step(&current, &line.rule, dictionary).and_then(|planned| {
            let next = if planned.ops.is_empty() {
                None
            } else {
                let rewritten = rewrite(&current, &planned.ops).map_err(|e| {
                    RuleEvaluationError::Rewrite {
                        message: e.to_string(),
                    }
                })?;
                Some(rewritten)
            };
            Ok((planned, next))
        });

        match result {
            Ok((step, next)) => {
                if let Some(next) = next {
                    current = next;
                }
                change_log.extend(step.log);
                outcomes.push(RuleOutcome::new(line, step.status));
            }
            Err(error) => {
                warn!(rule = %line.rule, line = line.line, %error, "Rule failed; stopping");
                outcomes.push(RuleOutcome::new(
                    line,
                    RuleStatus::Failed {
                        message: error.to_string(),
                    },
                ));
                return RuleRun {
                    document: current,
                    change_log,
                    outcomes,
                    failure: Some(RuleFailure {
                        line: line.line,
                        rule: line.rule.to_string(),
                        field: line.rule.field().to_string(),
                        error,
                    }),
                };
            }
        }
    }

    info!(rules = rules.len(), changes = change_log.changes.len(), "Rules applied");
    RuleRun {
        document: current,
        change_log,
        outcomes,
        failure: None,
    }
}

/// What one rule does to the current document.
struct Step {
    ops: Vec<EditOp>,
    log: ChangeLog,
    status: RuleStatus,
}

impl Step {
    fn status(status: RuleStatus) -> Self {
        Step {
            ops: Vec::new(),
            log: ChangeLog::new(),
            status,
        }
    }
}

/// Where a rule's field sits in the block.
enum Located<'a> {
    Field(&'a Field),
    Column(&'a Loop, usize),
    Absent,
}

fn locate<'a>(block: &'a Block, name: &str, dictionary: Option<&DictionarySet>) -> Located<'a> {
    if let Some(field) = block.field(name) {
        return Located::Field(field);
    }
    if let Some(lp) = block.loop_with(name) {
        if let Some(col) = lp.column_index(name) {
            return Located::Column(lp, col);
        }
    }
    let Some(dictionary) = dictionary else {
        return Located::Absent;
    };
    let Some(wanted) = canonical(dictionary, name) else {
        return Located::Absent;
    };
    if let Some(field) = block
        .fields()
        .find(|f| canonical(dictionary, &f.name).as_deref() == Some(wanted.as_str()))
    {
        return Located::Field(field);
    }
    for lp in block.loops() {
        if let Some(col) = lp
            .columns
            .iter()
            .position(|c| canonical(dictionary, &c.name).as_deref() == Some(wanted.as_str()))
        {
            return Located::Column(lp, col);
        }
    }
    Located::Absent
}

/// Canonical ID at the end of the deprecation chain.
fn canonical(dictionary: &DictionarySet, name: &str) -> Option<String> {
    let field = dictionary.lookup(name)?;
    Some(
        dictionary
            .current_field(&field.canonical_id)
            .map(|f| f.canonical_id.clone())
            .unwrap_or_else(|| field.canonical_id.clone()),
    )
}

fn step(
    document: &Document,
    rule: &Rule,
    dictionary: Option<&DictionarySet>,
) -> Result<Step, RuleEvaluationError> {
    let block = document.first_data_block();

    if let Rule::Check {
        field, expected, ..
    } = rule
    {
        let located = block.map_or(Located::Absent, |b| locate(b, field, dictionary));
        let status = match located {
            Located::Field(f) if f.value.text() == expected.as_str() => RuleStatus::MatchesDefault,
            Located::Field(f) => RuleStatus::Differs {
                value: f.value.text().to_string(),
            },
            Located::Column(..) => RuleStatus::InLoop,
            Located::Absent => RuleStatus::Missing,
        };
        return Ok(Step::status(status));
    }

    let block = block.ok_or(RuleEvaluationError::NoTargetBlock)?;
    let looped = |name: &str| RuleEvaluationError::LoopedField {
        field: name.to_string(),
    };

    match rule {
        // Answered above without a block.
        Rule::Check { .. } => Ok(Step::status(RuleStatus::Unchanged)),

        Rule::Delete { field } => match locate(block, field, dictionary) {
            Located::Field(f) => {
                let mut log = ChangeLog::new();
                log.record(Change::Deleted {
                    line: document.line_of(f.name_span.start),
                    field: f.name.clone(),
                });
                Ok(Step {
                    ops: vec![EditOp::delete(document.removal_span(f.span()))],
                    log,
                    status: RuleStatus::Deleted,
                })
            }
            Located::Column(..) => Err(looped(field)),
            Located::Absent => Ok(Step::status(RuleStatus::Absent)),
        },

        Rule::Edit { field, value } => match locate(block, field, dictionary) {
            Located::Field(f) => {
                if f.value.text() == value.as_str() {
                    return Ok(Step::status(RuleStatus::Unchanged));
                }
                let mut log = ChangeLog::new();
                log.record(Change::Edited {
                    line: document.line_of(f.name_span.start),
                    field: f.name.clone(),
                    old: f.value.text().to_string(),
                    new: value.clone(),
                });
                let shape = if f.value.is_text_block() {
                    Shape::TextBlock
                } else {
                    Shape::Inline
                };
                Ok(Step {
                    ops: vec![replace_value(document, f, render(value, shape, f.value.quote()))],
                    log,
                    status: RuleStatus::Edited {
                        old: f.value.text().to_string(),
                        new: value.clone(),
                    },
                })
            }
            Located::Column(..) => Err(looped(field)),
            Located::Absent => Ok(create(block, field, value, Shape::Inline)),
        },

        Rule::Rename { from, to } => {
            let (old, name_span) = match locate(block, from, dictionary) {
                Located::Field(f) => (f.name.clone(), f.name_span.clone()),
                Located::Column(lp, col) => {
                    (lp.columns[col].name.clone(), lp.columns[col].span.clone())
                }
                Located::Absent => return Ok(Step::status(RuleStatus::Absent)),
            };
            if old == *to {
                return Ok(Step::status(RuleStatus::Unchanged));
            }
            let mut log = ChangeLog::new();
            if block.names().iter().any(|n| n.name == to.as_str()) {
                log.warn(
                    Some(document.line_of(name_span.start)),
                    Some(to.as_str()),
                    format!("renaming {} to {} duplicates an existing field", old, to),
                );
            }
            log.record(Change::Renamed {
                line: document.line_of(name_span.start),
                from: old,
                to: to.clone(),
            });
            Ok(Step {
                ops: vec![EditOp::replace(name_span, to.clone())],
                log,
                status: RuleStatus::Renamed { to: to.clone() },
            })
        }

        Rule::Calculate { field, expression } => {
            let operand = |name: &str| -> Result<f64, RuleEvaluationError> {
                match locate(block, name, dictionary) {
                    Located::Field(f) => f.value.as_number().ok_or_else(|| {
                        RuleEvaluationError::NonNumeric {
                            field: name.to_string(),
                            value: f.value.text().to_string(),
                        }
                    }),
                    Located::Column(..) => Err(looped(name)),
                    Located::Absent => Err(RuleEvaluationError::MissingOperand {
                        field: name.to_string(),
                    }),
                }
            };
            let value = format_number(evaluate(expression, &operand)?);

            match locate(block, field, dictionary) {
                Located::Field(f) => {
                    let mut log = ChangeLog::new();
                    log.record(Change::Edited {
                        line: document.line_of(f.name_span.start),
                        field: f.name.clone(),
                        old: f.value.text().to_string(),
                        new: value.clone(),
                    });
                    Ok(Step {
                        ops: vec![replace_value(document, f, render(&value, Shape::Inline, None))],
                        log,
                        status: RuleStatus::Calculated { value },
                    })
                }
                Located::Column(..) => Err(looped(field)),
                Located::Absent => Ok(create(block, field, &value, Shape::Inline)),
            }
        }

        Rule::Append { field, text } => match locate(block, field, dictionary) {
            Located::Field(f) => {
                let combined = if f.value.is_placeholder() || f.value.text().is_empty() {
                    text.clone()
                } else {
                    format!("{}\n{}", f.value.text(), text)
                };
                let mut log = ChangeLog::new();
                log.record(Change::Appended {
                    field: f.name.clone(),
                    text: text.clone(),
                });
                Ok(Step {
                    ops: vec![replace_value(document, f, render(&combined, Shape::TextBlock, None))],
                    log,
                    status: RuleStatus::Appended,
                })
            }
            Located::Column(..) => Err(looped(field)),
            Located::Absent => Ok(create(block, field, text, Shape::TextBlock)),
        },
    }
}

/// Replace a field's value span. A text block must start at column 0, so
/// one replacing an inline value moves to its own line, taking the
/// whitespace before the old value with it.
fn replace_value(document: &Document, field: &Field, rendered: String) -> EditOp {
    if !rendered.starts_with(';') {
        return EditOp::replace(field.value_span.clone(), rendered);
    }
    let bytes = document.source().as_bytes();
    let mut start = field.value_span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let replacement = if start == 0 || bytes[start - 1] == b'\n' {
        rendered
    } else {
        format!("\n{}", rendered)
    };
    EditOp::replace(start..field.value_span.end, replacement)
}

/// Insert a new field after the last entry of `block`.
fn create(block: &Block, name: &str, value: &str, shape: Shape) -> Step {
    let rendered = render(value, shape, None);
    let text = if rendered.starts_with(';') {
        format!("\n{}\n{}", name, rendered)
    } else {
        format!("\n{} {}", name, rendered)
    };
    let mut log = ChangeLog::new();
    log.record(Change::Created {
        field: name.to_string(),
        value: value.to_string(),
    });
    Step {
        ops: vec![EditOp::insert(block.insertion_point(), text)],
        log,
        status: RuleStatus::Created {
            value: value.to_string(),
        },
    }
}
