//! Span-addressed text rewriting.
//!
//! Every edit names a byte range the parser recorded (a field name, a value,
//! a whole entry) or a zero-length insertion point. Nothing here searches the
//! text for names, so a name that also appears inside a text block or a
//! comment is never touched by an edit aimed at the real field.

use std::collections::HashSet;
use std::ops::Range;

use cif::{Document, Entry};

use crate::error::ConversionError;

/// Replace the bytes in `target` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOp {
    pub target: Range<usize>,
    pub replacement: String,
}

impl EditOp {
    pub fn replace(target: Range<usize>, replacement: impl Into<String>) -> Self {
        EditOp {
            target,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        EditOp {
            target: at..at,
            replacement: text.into(),
        }
    }

    pub fn delete(target: Range<usize>) -> Self {
        EditOp {
            target,
            replacement: String::new(),
        }
    }
}

/// Apply `ops` to the document's text.
///
/// Fails without producing text when an op lies outside the document, does
/// not address a recorded element, cuts a protected span in two, or overlaps
/// another op. Bytes outside the op targets are copied unchanged.
pub fn apply(document: &Document, ops: &[EditOp]) -> Result<String, ConversionError> {
    let source = document.source();
    let recorded = recorded_spans(document);

    for op in ops {
        let t = &op.target;
        let in_bounds = t.start <= t.end
            && t.end <= source.len()
            && source.is_char_boundary(t.start)
            && source.is_char_boundary(t.end);
        if !in_bounds {
            return Err(ConversionError::OutOfBounds {
                span: t.clone(),
                len: source.len(),
            });
        }
        check_addressable(document, &recorded, t)?;
        check_protected(document, t)?;
    }

    let mut sorted: Vec<&EditOp> = ops.iter().collect();
    sorted.sort_by_key(|op| (op.target.start, op.target.end));
    for pair in sorted.windows(2) {
        let (a, b) = (&pair[0].target, &pair[1].target);
        let same_point = a.is_empty() && b.is_empty() && a.start == b.start;
        if b.start < a.end || same_point {
            return Err(ConversionError::Overlapping {
                first: a.clone(),
                second: b.clone(),
            });
        }
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for op in sorted {
        out.push_str(&source[cursor..op.target.start]);
        out.push_str(&op.replacement);
        cursor = op.target.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

/// Apply `ops` and parse the result into a new Document.
pub fn rewrite(document: &Document, ops: &[EditOp]) -> Result<Document, ConversionError> {
    let text = apply(document, ops)?;
    cif::Parser::new(text, document.source_id)
        .parse()
        .map_err(ConversionError::Reparse)
}

fn check_addressable(
    document: &Document,
    recorded: &HashSet<(usize, usize)>,
    target: &Range<usize>,
) -> Result<(), ConversionError> {
    if target.is_empty() {
        return Ok(());
    }
    let text = &document.source()[target.clone()];
    let lead = text.len() - text.trim_start().len();
    let trail = text.len() - text.trim_end().len();
    let core = if lead == text.len() {
        (target.start, target.start)
    } else {
        (target.start + lead, target.end - trail)
    };
    if recorded.contains(&core) {
        Ok(())
    } else {
        Err(ConversionError::Unaddressable {
            span: target.clone(),
        })
    }
}

fn check_protected(document: &Document, target: &Range<usize>) -> Result<(), ConversionError> {
    for protected in document.protected_spans() {
        let cuts = if target.is_empty() {
            protected.start < target.start && target.start < protected.end
        } else {
            let intersects = protected.start < target.end && target.start < protected.end;
            let contains = target.start <= protected.start && protected.end <= target.end;
            intersects && !contains
        };
        if cuts {
            return Err(ConversionError::CutsProtected {
                span: target.clone(),
                protected: protected.clone(),
            });
        }
    }
    Ok(())
}

/// Every span the parser recorded, as `(start, end)` pairs.
fn recorded_spans(document: &Document) -> HashSet<(usize, usize)> {
    let mut spans = HashSet::new();
    let mut add = |span: &Range<usize>| {
        spans.insert((span.start, span.end));
    };
    for comment in &document.preamble {
        add(&comment.span);
    }
    for block in document.scopes() {
        add(&block.span);
        add(&block.header_span);
        if let Some(terminator) = &block.terminator {
            add(terminator);
        }
        for entry in &block.entries {
            add(&entry.span());
            match entry {
                Entry::Field(field) => {
                    add(&field.name_span);
                    add(&field.value_span);
                }
                Entry::Loop(lp) => {
                    add(&lp.keyword_span);
                    for column in &lp.columns {
                        add(&column.span);
                    }
                    for cell in lp.rows.iter().flatten() {
                        add(&cell.span);
                    }
                }
                Entry::Comment(_) | Entry::Frame(_) | Entry::Stop(_) => {}
            }
        }
    }
    spans
}
