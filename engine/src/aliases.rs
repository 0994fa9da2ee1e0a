use std::collections::BTreeMap;

use cif::{Document, Field, Notation};
use tracing::{info, warn};

use crate::change_log::{Change, ChangeLog, TieBreak};
use crate::convert::scope_label;
use crate::dictionary::{CanonicalField, DictionarySet};
use crate::error::ConversionError;
use crate::rewrite::{EditOp, rewrite};

/// Reduce every set of fields that spell the same canonical field within one
/// block (or save frame) to a single field.
///
/// The survivor is chosen by, in order: the only occurrence whose value is
/// not the declared default or a placeholder; the occurrence written in the
/// block's dominant notation; the first occurrence. The other occurrences are
/// deleted together with their values, and the survivor is renamed to the
/// preferred spelling for the dominant notation.
///
/// Loop columns are never merged; a conflict that involves one is reported
/// as a warning and left alone.
pub fn resolve_aliases(
    document: &Document,
    dictionary: &DictionarySet,
) -> Result<(Document, ChangeLog), ConversionError> {
    let mut log = ChangeLog::new();
    let mut ops = Vec::new();

    for scope in document.scopes() {
        let dominant = scope.dominant_notation();

        // Canonical ID -> occurrences, in file order.
        let mut groups: BTreeMap<&str, Vec<&Field>> = BTreeMap::new();
        let mut looped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in scope.names() {
            let Some(canonical) = terminal(dictionary, name.name) else {
                continue;
            };
            if name.looped {
                looped.entry(&canonical.canonical_id).or_default().push(name.name);
            }
        }
        for field in scope.fields() {
            if let Some(canonical) = terminal(dictionary, &field.name) {
                groups.entry(&canonical.canonical_id).or_default().push(field);
            }
        }

        for (id, occurrences) in groups {
            let Some(canonical) = dictionary.get(id) else {
                continue;
            };
            if let Some(columns) = looped.get(id) {
                let line = document.line_of(occurrences[0].name_span.start);
                warn!(field = id, "Alias conflict involves a loop column; left unchanged");
                log.warn(
                    Some(line),
                    Some(occurrences[0].name.as_str()),
                    format!(
                        "{} also appears as loop column {} in {}; not merged",
                        occurrences[0].name,
                        columns.join(", "),
                        scope_label(scope)
                    ),
                );
                continue;
            }
            if occurrences.len() < 2 {
                continue;
            }

            let (keep, rule) = choose_survivor(canonical, &occurrences, dominant);
            let survivor = occurrences[keep];
            let spelling = canonical.spelling_for(dominant);

            let mut discarded = Vec::new();
            for (i, field) in occurrences.iter().enumerate() {
                if i == keep {
                    continue;
                }
                ops.push(EditOp::delete(document.removal_span(field.span())));
                log.record(Change::Deleted {
                    line: document.line_of(field.name_span.start),
                    field: field.name.clone(),
                });
                discarded.push(field.name.clone());
            }

            let line = document.line_of(survivor.name_span.start);
            if survivor.name != spelling {
                ops.push(EditOp::replace(survivor.name_span.clone(), spelling));
                log.record(Change::Renamed {
                    line,
                    from: survivor.name.clone(),
                    to: spelling.to_string(),
                });
            }

            info!(
                canonical = id,
                kept = %survivor.name,
                discarded = discarded.len(),
                rule = ?rule,
                "Resolved alias conflict"
            );
            log.record(Change::AliasResolved {
                line,
                canonical: id.to_string(),
                kept: spelling.to_string(),
                discarded,
                rule,
            });
        }
    }

    let resolved = rewrite(document, &ops)?;
    Ok((resolved, log))
}

/// The current definition for a spelling, following deprecations.
fn terminal<'d>(dictionary: &'d DictionarySet, name: &str) -> Option<&'d CanonicalField> {
    let field = dictionary.lookup(name)?;
    Some(dictionary.current_field(&field.canonical_id).unwrap_or(field))
}

/// Index of the occurrence to keep and the tie-break that picked it.
fn choose_survivor(
    canonical: &CanonicalField,
    occurrences: &[&Field],
    dominant: Notation,
) -> (usize, TieBreak) {
    let meaningful: Vec<usize> = (0..occurrences.len())
        .filter(|&i| !canonical.is_default_value(&occurrences[i].value))
        .collect();
    if meaningful.len() == 1 {
        return (meaningful[0], TieBreak::NonDefaultValue);
    }

    let candidates: Vec<usize> = if meaningful.is_empty() {
        (0..occurrences.len()).collect()
    } else {
        meaningful
    };
    let matching: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&i| Notation::of(&occurrences[i].name) == dominant)
        .collect();
    if !matching.is_empty() && matching.len() < candidates.len() {
        return (matching[0], TieBreak::DominantNotation);
    }
    (candidates[0], TieBreak::FirstOccurrence)
}
