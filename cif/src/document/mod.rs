pub mod notation;
pub mod render;
pub mod value;

use std::ops::Range;

pub use notation::{Format, Notation, Version};
pub use value::Value;

/// A parsed CIF file.
///
/// A Document owns the exact text it was parsed from and records the byte
/// span of every structural element, so it can always be serialized back to
/// that text unchanged. Documents are never mutated: every transformation
/// produces new text that is parsed into a new Document.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    /// Comments that appear before the first block header.
    pub preamble: Vec<Comment>,
    /// Top-level `data_` and `global_` blocks in file order.
    pub blocks: Vec<Block>,
    /// Spans the rewrite engine must copy verbatim.
    protected: Vec<Range<usize>>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Data,
    Save,
    Global,
}

/// A `data_` block, a `global_` block, or a `save_` frame nested in a block.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    /// The name following the `data_`/`save_` prefix. Empty for `global_`.
    pub name: String,
    pub header_span: Range<usize>,
    pub entries: Vec<Entry>,
    /// The closing `save_` of a frame.
    pub terminator: Option<Range<usize>>,
    pub span: Range<usize>,
}

/// One item inside a block, in file order.
#[derive(Debug, Clone)]
pub enum Entry {
    Field(Field),
    Loop(Loop),
    Comment(Comment),
    Frame(Block),
    /// A `stop_` line.
    Stop(Range<usize>),
}

/// A single `_name value` pair.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub name_span: Range<usize>,
    pub value: Value,
    pub value_span: Range<usize>,
}

/// A declared loop column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub span: Range<usize>,
}

/// A loop data value.
#[derive(Debug, Clone)]
pub struct Cell {
    pub value: Value,
    pub span: Range<usize>,
}

/// A `loop_` table. Every row has exactly one cell per column.
#[derive(Debug, Clone)]
pub struct Loop {
    pub keyword_span: Range<usize>,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: Range<usize>,
}

/// A field name token and where it sits.
#[derive(Debug, Clone, Copy)]
pub struct NameRef<'a> {
    pub name: &'a str,
    pub span: &'a Range<usize>,
    /// True for loop column declarations.
    pub looped: bool,
}

impl Field {
    /// From the first byte of the name to the last byte of the value.
    pub fn span(&self) -> Range<usize> {
        self.name_span.start..self.value_span.end
    }
}

impl Loop {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

impl Entry {
    pub fn span(&self) -> Range<usize> {
        match self {
            Entry::Field(field) => field.span(),
            Entry::Loop(lp) => lp.span.clone(),
            Entry::Comment(comment) => comment.span.clone(),
            Entry::Frame(frame) => frame.span.clone(),
            Entry::Stop(span) => span.clone(),
        }
    }
}

impl Block {
    /// Fields directly in this block (not in loops or nested frames).
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn loops(&self) -> impl Iterator<Item = &Loop> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Loop(l) => Some(l),
            _ => None,
        })
    }

    pub fn frames(&self) -> impl Iterator<Item = &Block> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Frame(b) => Some(b),
            _ => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|f| f.name == name)
    }

    /// The loop declaring `name` as a column, if any.
    pub fn loop_with(&self, name: &str) -> Option<&Loop> {
        self.loops().find(|l| l.column_index(name).is_some())
    }

    /// Field names and loop columns in this block, in file order.
    /// Nested frames are separate scopes and are not included.
    pub fn names(&self) -> Vec<NameRef<'_>> {
        let mut names = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Field(f) => names.push(NameRef {
                    name: &f.name,
                    span: &f.name_span,
                    looped: false,
                }),
                Entry::Loop(l) => {
                    for column in &l.columns {
                        names.push(NameRef {
                            name: &column.name,
                            span: &column.span,
                            looped: true,
                        });
                    }
                }
                _ => {}
            }
        }
        names
    }

    /// The notation most names in this block use. Ties go to modern.
    pub fn dominant_notation(&self) -> Notation {
        let (mut legacy, mut modern) = (0usize, 0usize);
        for name in self.names() {
            match Notation::of(name.name) {
                Notation::Legacy => legacy += 1,
                Notation::Modern => modern += 1,
            }
        }
        if legacy > modern {
            Notation::Legacy
        } else {
            Notation::Modern
        }
    }

    /// Offset just past the last entry (or the header when empty), before any
    /// frame terminator. New entries are inserted here.
    pub fn insertion_point(&self) -> usize {
        self.entries
            .last()
            .map(|e| e.span().end)
            .unwrap_or(self.header_span.end)
    }
}

impl Document {
    pub(crate) fn new(
        source: String,
        preamble: Vec<Comment>,
        blocks: Vec<Block>,
        protected: Vec<Range<usize>>,
        source_id: usize,
    ) -> Self {
        Document {
            source,
            preamble,
            blocks,
            protected,
            source_id,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Spans of comment bodies, text blocks, and quoted values.
    pub fn protected_spans(&self) -> &[Range<usize>] {
        &self.protected
    }

    /// Reassemble the text from the recorded structure.
    ///
    /// Each element's span is copied in order together with the whitespace
    /// between elements, so an unmodified document reproduces its input.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        let mut copy_to = |end: usize, out: &mut String| {
            if end > cursor {
                out.push_str(&self.source[cursor..end]);
                cursor = end;
            }
        };
        for comment in &self.preamble {
            copy_to(comment.span.end, &mut out);
        }
        for block in &self.blocks {
            for end in block_boundaries(block) {
                copy_to(end, &mut out);
            }
        }
        copy_to(self.source.len(), &mut out);
        out
    }

    /// The version declared by a marker comment before the first block.
    pub fn version(&self) -> Option<Version> {
        self.preamble
            .iter()
            .find_map(|c| Version::from_marker(&c.text))
    }

    /// Span of the version marker comment, if present.
    pub fn version_marker_span(&self) -> Option<Range<usize>> {
        self.preamble
            .iter()
            .find(|c| Version::from_marker(&c.text).is_some())
            .map(|c| c.span.clone())
    }

    /// Every block and save frame, depth-first in file order.
    pub fn scopes(&self) -> Vec<&Block> {
        fn walk<'a>(block: &'a Block, out: &mut Vec<&'a Block>) {
            out.push(block);
            for frame in block.frames() {
                walk(frame, out);
            }
        }
        let mut out = Vec::new();
        for block in &self.blocks {
            walk(block, &mut out);
        }
        out
    }

    /// Every field-name token in the document, in file order.
    pub fn names(&self) -> Vec<NameRef<'_>> {
        let mut names: Vec<NameRef<'_>> =
            self.scopes().into_iter().flat_map(|b| b.names()).collect();
        names.sort_by_key(|n| n.span.start);
        names
    }

    /// Legacy, modern, or mixed, judged from real field-name tokens only.
    pub fn detected_format(&self) -> Format {
        let names = self.names();
        let modern = names
            .iter()
            .filter(|n| Notation::of(n.name) == Notation::Modern)
            .count();
        let legacy = names.len() - modern;
        match (legacy, modern) {
            (0, 0) => Format::Unknown,
            (_, 0) => Format::Legacy,
            (0, _) => Format::Modern,
            _ => Format::Mixed,
        }
    }

    /// The first `data_` block, which field rules operate on.
    pub fn first_data_block(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind == BlockKind::Data)
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.source[..offset.min(self.source.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
            + 1
    }

    /// The span to remove when deleting `span` from the file: extended over
    /// the surrounding whitespace to whole lines when nothing else shares
    /// those lines. When something precedes `span` on its line, the
    /// whitespace before it goes too unless something also follows.
    pub fn removal_span(&self, span: Range<usize>) -> Range<usize> {
        let bytes = self.source.as_bytes();
        let mut start = span.start;
        while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        let at_line_start = start == 0 || bytes[start - 1] == b'\n';

        let mut end = span.end;
        while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
            end += 1;
        }
        let newline = if bytes[end..].starts_with(b"\r\n") {
            2
        } else if bytes[end..].starts_with(b"\n") {
            1
        } else {
            0
        };
        let at_line_end = end == bytes.len() || newline > 0;

        match (at_line_start, at_line_end) {
            (true, true) => {
                if newline > 0 {
                    start..end + newline
                } else if start > 0 {
                    // Last line without a trailing newline: take the newline before it.
                    let before = if bytes[..start].ends_with(b"\r\n") { 2 } else { 1 };
                    start - before..end
                } else {
                    start..end
                }
            }
            (true, false) | (false, true) => start..end,
            (false, false) => span.start..end,
        }
    }
}

/// End offsets of a block's elements in file order, for serialization.
fn block_boundaries(block: &Block) -> Vec<usize> {
    let mut ends = vec![block.header_span.end];
    for entry in &block.entries {
        match entry {
            Entry::Frame(frame) => ends.extend(block_boundaries(frame)),
            Entry::Loop(lp) => {
                ends.push(lp.keyword_span.end);
                ends.extend(lp.columns.iter().map(|c| c.span.end));
                ends.extend(lp.rows.iter().flatten().map(|cell| cell.span.end));
            }
            Entry::Field(field) => {
                ends.push(field.name_span.end);
                ends.push(field.value_span.end);
            }
            other => ends.push(other.span().end),
        }
    }
    if let Some(terminator) = &block.terminator {
        ends.push(terminator.end);
    }
    ends
}
