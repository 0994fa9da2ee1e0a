use std::collections::BTreeMap;

use cif::parser::lexer::BYTE_ORDER_MARK;
use cif::{Document, Notation, Version};
use tracing::{debug, info, warn};

use crate::change_log::{Change, ChangeLog};
use crate::dictionary::DictionarySet;
use crate::error::ConversionError;
use crate::rewrite::{EditOp, rewrite};

/// Rewrite every field name and loop column in `document` to its preferred
/// spelling in `target`.
///
/// Deprecated fields are followed through their deprecation chain first.
/// Names the dictionary does not know are left alone and reported as
/// warnings. Values, loop data, comments, and text blocks are never edited.
/// The version marker is updated to match the target notation.
pub fn convert(
    document: &Document,
    dictionary: &DictionarySet,
    target: Notation,
) -> Result<(Document, ChangeLog), ConversionError> {
    let mut log = ChangeLog::new();
    let mut ops = Vec::new();

    for scope in document.scopes() {
        let mut written: BTreeMap<String, usize> = BTreeMap::new();

        for name in scope.names() {
            let line = document.line_of(name.span.start);
            let Some(field) = dictionary.lookup(name.name) else {
                warn!(field = name.name, line, "No dictionary mapping; left unchanged");
                log.warn(Some(line), Some(name.name), format!("no mapping for {}", name.name));
                *written.entry(name.name.to_string()).or_default() += 1;
                continue;
            };

            let current = match dictionary.current_field(&field.canonical_id) {
                Some(current) => current,
                None => {
                    let chain = dictionary.deprecation_chain(&field.canonical_id);
                    let missing = chain.last().map(String::as_str).unwrap_or_default();
                    log.warn(
                        Some(line),
                        Some(name.name),
                        format!(
                            "{} is replaced by {}, which the dictionary does not define",
                            name.name, missing
                        ),
                    );
                    field
                }
            };
            if current.retired {
                log.warn(
                    Some(line),
                    Some(name.name),
                    format!("{} is deprecated and has no replacement", name.name),
                );
            }

            let spelling = current.spelling_for(target);
            if Notation::of(spelling) != target {
                log.warn(
                    Some(line),
                    Some(name.name),
                    format!("{} has no {} spelling", current.canonical_id, target),
                );
            }

            if spelling != name.name {
                debug!(from = name.name, to = spelling, line, "Renaming field");
                ops.push(EditOp::replace(name.span.clone(), spelling));
                log.record(Change::Renamed {
                    line,
                    from: name.name.to_string(),
                    to: spelling.to_string(),
                });
            }
            *written.entry(spelling.to_string()).or_default() += 1;
        }

        for (name, count) in written {
            if count > 1 {
                let line = document.line_of(scope.header_span.start);
                log.warn(
                    Some(line),
                    Some(name.as_str()),
                    format!(
                        "{} appears {} times in {} after conversion; resolve aliases to merge them",
                        name,
                        count,
                        scope_label(scope)
                    ),
                );
            }
        }
    }

    let renamed = ops.len();
    if let Some(op) = marker_edit(document, target, &mut log) {
        ops.push(op);
    }

    let converted = rewrite(document, &ops)?;
    info!(
        target = %target,
        renamed,
        warnings = log.warnings.len(),
        "Conversion complete"
    );
    Ok((converted, log))
}

/// The edit that makes the version marker agree with `target`, if any.
fn marker_edit(document: &Document, target: Notation, log: &mut ChangeLog) -> Option<EditOp> {
    let version = document.version();
    let span = document.version_marker_span();
    match (target, version, span) {
        (Notation::Modern, Some(Version::Cif2), _) => None,
        (Notation::Modern, Some(Version::Cif1), Some(span)) => {
            log.record(Change::MarkerReplaced {
                from: document.source()[span.clone()].to_string(),
                to: Version::CIF2_MARKER.to_string(),
            });
            Some(EditOp::replace(span, Version::CIF2_MARKER))
        }
        (Notation::Modern, _, _) => {
            log.record(Change::MarkerInserted {
                marker: Version::CIF2_MARKER.to_string(),
            });
            // After a byte order mark, which must stay first.
            let at = if document.source().starts_with(BYTE_ORDER_MARK) {
                BYTE_ORDER_MARK.len_utf8()
            } else {
                0
            };
            Some(EditOp::insert(at, format!("{}\n", Version::CIF2_MARKER)))
        }
        (Notation::Legacy, Some(Version::Cif2), Some(span)) => {
            log.record(Change::MarkerReplaced {
                from: document.source()[span.clone()].to_string(),
                to: Version::CIF1_MARKER.to_string(),
            });
            Some(EditOp::replace(span, Version::CIF1_MARKER))
        }
        (Notation::Legacy, _, _) => None,
    }
}

pub(crate) fn scope_label(block: &cif::Block) -> String {
    match block.kind {
        cif::BlockKind::Data => format!("data_{}", block.name),
        cif::BlockKind::Save => format!("save_{}", block.name),
        cif::BlockKind::Global => "global_".to_string(),
    }
}
