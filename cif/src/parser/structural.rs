use std::collections::HashSet;
use std::ops::Range;

use crate::document::{Block, BlockKind, Cell, Column, Comment, Entry, Field, Loop, Value};
use crate::parser::error::ParseError;
use crate::parser::lexer::{Lexer, Token, TokenKind};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub(crate) struct Parsed {
    pub preamble: Vec<Comment>,
    pub blocks: Vec<Block>,
    pub protected: Vec<Range<usize>>,
}

/// Parse CIF source text into top-level blocks.
pub(crate) fn parse_blocks(source: &str, file_id: usize) -> Result<Parsed, ParseError> {
    let tokens: Vec<Token> = Lexer::new(source, file_id).collect::<Result<_, _>>()?;

    let mut state = ParseState::new(file_id);
    state.process_tokens(&tokens)?;
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState {
    file_id: usize,
    preamble: Vec<Comment>,
    /// The open `data_` or `global_` block.
    block: Option<BlockBuilder>,
    /// The open save frame inside `block`.
    frame: Option<BlockBuilder>,
    blocks: Vec<Block>,
    protected: Vec<Range<usize>>,
    /// End of the last token folded into the tree.
    last_good: usize,
}

struct BlockBuilder {
    kind: BlockKind,
    name: String,
    header_span: Range<usize>,
    entries: Vec<Entry>,
}

impl BlockBuilder {
    fn new(kind: BlockKind, name: String, header_span: Range<usize>) -> Self {
        BlockBuilder {
            kind,
            name,
            header_span,
            entries: Vec::new(),
        }
    }

    fn into_block(self, terminator: Option<Range<usize>>) -> Block {
        let end = terminator
            .as_ref()
            .map(|t| t.end)
            .or_else(|| self.entries.last().map(|e| e.span().end))
            .unwrap_or(self.header_span.end);
        Block {
            span: self.header_span.start..end,
            kind: self.kind,
            name: self.name,
            header_span: self.header_span,
            entries: self.entries,
            terminator,
        }
    }
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            preamble: Vec::new(),
            block: None,
            frame: None,
            blocks: Vec::new(),
            protected: Vec::new(),
            last_good: 0,
        }
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(message, span, self.file_id).with_last_good(self.last_good)
    }

    /// The innermost open scope.
    fn scope(&mut self) -> Option<&mut BlockBuilder> {
        match self.frame {
            Some(ref mut frame) => Some(frame),
            None => self.block.as_mut(),
        }
    }

    fn process_tokens(&mut self, tokens: &[Token]) -> Result<(), ParseError> {
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];

            match &token.kind {
                TokenKind::DataHeader(name) => {
                    self.close_block(&token.span)?;
                    self.block = Some(BlockBuilder::new(
                        BlockKind::Data,
                        name.clone(),
                        token.span.clone(),
                    ));
                    i += 1;
                }

                TokenKind::GlobalHeader => {
                    self.close_block(&token.span)?;
                    self.block = Some(BlockBuilder::new(
                        BlockKind::Global,
                        String::new(),
                        token.span.clone(),
                    ));
                    i += 1;
                }

                TokenKind::SaveHeader(name) => {
                    if self.block.is_none() {
                        return Err(self.error(
                            format!("save frame `save_{}` outside a data block", name),
                            token.span.clone(),
                        ));
                    }
                    if let Some(open) = &self.frame {
                        return Err(self
                            .error("save frames cannot be nested", token.span.clone())
                            .with_note(format!(
                                "`save_{}` is still open; close it with `save_`",
                                open.name
                            )));
                    }
                    self.frame = Some(BlockBuilder::new(
                        BlockKind::Save,
                        name.clone(),
                        token.span.clone(),
                    ));
                    i += 1;
                }

                TokenKind::SaveEnd => {
                    let Some(frame) = self.frame.take() else {
                        return Err(self.error(
                            "`save_` terminator without an open save frame",
                            token.span.clone(),
                        ));
                    };
                    let frame = frame.into_block(Some(token.span.clone()));
                    if let Some(block) = self.block.as_mut() {
                        block.entries.push(Entry::Frame(frame));
                    }
                    i += 1;
                }

                TokenKind::Stop => {
                    let span = token.span.clone();
                    match self.scope() {
                        Some(scope) => scope.entries.push(Entry::Stop(span)),
                        None => return Err(self.error("`stop_` outside a block", span)),
                    }
                    i += 1;
                }

                TokenKind::Comment(text) => {
                    self.protected.push(token.span.clone());
                    let comment = Comment {
                        text: text.clone(),
                        span: token.span.clone(),
                    };
                    match self.scope() {
                        Some(scope) => scope.entries.push(Entry::Comment(comment)),
                        None => self.preamble.push(comment),
                    }
                    i += 1;
                }

                TokenKind::Tag(name) => {
                    i += 1;
                    let field = self.parse_field(name, &token.span, tokens, &mut i)?;
                    match self.scope() {
                        Some(scope) => scope.entries.push(Entry::Field(field)),
                        None => {
                            return Err(self
                                .error(
                                    format!("field `{}` appears before any data block", name),
                                    token.span.clone(),
                                )
                                .with_note("add a `data_` header above it"));
                        }
                    }
                }

                TokenKind::Loop => {
                    if self.block.is_none() {
                        return Err(
                            self.error("`loop_` appears before any data block", token.span.clone())
                        );
                    }
                    i += 1;
                    let lp = self.parse_loop(&token.span, tokens, &mut i)?;
                    if let Some(scope) = self.scope() {
                        scope.entries.push(Entry::Loop(lp));
                    }
                }

                TokenKind::Value(_) | TokenKind::Column(_) | TokenKind::LoopEnd => {
                    return Err(self.error("unexpected token", token.span.clone()));
                }
            }

            self.last_good = token.span.end.max(self.last_good);
        }

        Ok(())
    }

    /// A field name followed by its value. Comments between the two are kept
    /// as protected spans only.
    fn parse_field(
        &mut self,
        name: &str,
        name_span: &Range<usize>,
        tokens: &[Token],
        i: &mut usize,
    ) -> Result<Field, ParseError> {
        while let Some(Token {
            kind: TokenKind::Comment(_),
            span,
        }) = tokens.get(*i)
        {
            self.protected.push(span.clone());
            *i += 1;
        }

        match tokens.get(*i) {
            Some(Token {
                kind: TokenKind::Value(value),
                span,
            }) => {
                *i += 1;
                self.protect_value(value, span);
                self.last_good = span.end;
                Ok(Field {
                    name: name.to_string(),
                    name_span: name_span.clone(),
                    value: value.clone(),
                    value_span: span.clone(),
                })
            }
            _ => Err(self
                .error(format!("field `{}` has no value", name), name_span.clone())
                .with_note("use `?` for an unknown value or `.` for an inapplicable one")),
        }
    }

    /// Column declarations then values, up to the LoopEnd marker.
    fn parse_loop(
        &mut self,
        keyword_span: &Range<usize>,
        tokens: &[Token],
        i: &mut usize,
    ) -> Result<Loop, ParseError> {
        let mut columns: Vec<Column> = Vec::new();
        let mut seen = HashSet::new();
        let mut cells: Vec<Cell> = Vec::new();

        while let Some(token) = tokens.get(*i) {
            *i += 1;
            match &token.kind {
                TokenKind::Column(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(self.error(
                            format!("column `{}` is declared twice in this loop", name),
                            token.span.clone(),
                        ));
                    }
                    columns.push(Column {
                        name: name.clone(),
                        span: token.span.clone(),
                    });
                }
                TokenKind::Value(value) => {
                    self.protect_value(value, &token.span);
                    cells.push(Cell {
                        value: value.clone(),
                        span: token.span.clone(),
                    });
                }
                TokenKind::Comment(_) => self.protected.push(token.span.clone()),
                TokenKind::LoopEnd => break,
                _ => return Err(self.error("unexpected token inside loop", token.span.clone())),
            }
            self.last_good = token.span.end.max(self.last_good);
        }

        if columns.is_empty() {
            return Err(self.error("`loop_` has no column declarations", keyword_span.clone()));
        }
        if cells.is_empty() {
            return Err(self.error(
                "`loop_` declares columns but has no values",
                keyword_span.start..columns[columns.len() - 1].span.end,
            ));
        }

        let width = columns.len();
        let remainder = cells.len() % width;
        if remainder != 0 {
            let partial = &cells[cells.len() - remainder..];
            let span = partial[0].span.start..partial[partial.len() - 1].span.end;
            return Err(self
                .error(
                    format!(
                        "loop row has {} value{} but the loop declares {} columns",
                        remainder,
                        if remainder == 1 { "" } else { "s" },
                        width
                    ),
                    span,
                )
                .with_note(format!(
                    "the loop holds {} values, which is not a multiple of {}",
                    cells.len(),
                    width
                )));
        }

        let end = cells[cells.len() - 1].span.end;
        let mut rows = Vec::with_capacity(cells.len() / width);
        let mut iter = cells.into_iter();
        loop {
            let row: Vec<Cell> = iter.by_ref().take(width).collect();
            if row.is_empty() {
                break;
            }
            rows.push(row);
        }

        Ok(Loop {
            keyword_span: keyword_span.clone(),
            columns,
            rows,
            span: keyword_span.start..end,
        })
    }

    fn protect_value(&mut self, value: &Value, span: &Range<usize>) {
        if !matches!(value, Value::Bare(_)) {
            self.protected.push(span.clone());
        }
    }

    /// Close the open block (and reject an unclosed frame) before `next`.
    fn close_block(&mut self, next: &Range<usize>) -> Result<(), ParseError> {
        if let Some(frame) = &self.frame {
            return Err(self
                .error(
                    format!("save frame `save_{}` is not closed", frame.name),
                    frame.header_span.clone(),
                )
                .with_note(format!(
                    "a new block starts at byte {} before the closing `save_`",
                    next.start
                )));
        }
        if let Some(block) = self.block.take() {
            self.blocks.push(block.into_block(None));
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<Parsed, ParseError> {
        if let Some(frame) = &self.frame {
            return Err(self
                .error(
                    format!("save frame `save_{}` is not closed", frame.name),
                    frame.header_span.clone(),
                )
                .with_note("the file ends before the closing `save_`"));
        }
        if let Some(block) = self.block.take() {
            self.blocks.push(block.into_block(None));
        }
        self.protected.sort_by_key(|span| span.start);
        Ok(Parsed {
            preamble: self.preamble,
            blocks: self.blocks,
            protected: self.protected,
        })
    }
}
