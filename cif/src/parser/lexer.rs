use std::collections::VecDeque;
use std::ops::Range;

use crate::document::Value;
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `data_name`
    DataHeader(String),
    /// `save_name`
    SaveHeader(String),
    /// A bare `save_` closing a frame.
    SaveEnd,
    GlobalHeader,
    Stop,
    /// `loop_`
    Loop,
    /// A field name outside a loop header.
    Tag(String),
    /// A field name declared as a loop column.
    Column(String),
    Value(Value),
    /// Zero-width marker: the current loop's data phase is over.
    LoopEnd,
    /// A `#` comment, including the `#`.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

pub const BYTE_ORDER_MARK: char = '\u{feff}';

// ---------------------------------------------------------------------------
// Lexer state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    TopLevel,
    /// After `loop_`, while column names are being declared.
    InLoopHeader,
    /// Reading loop values.
    InLoopRow,
    /// Positioned on the `;` opening a text block.
    InTextBlock { in_loop: bool },
    /// Positioned on the first quote of a triple-quoted string.
    InTripleQuote { in_loop: bool },
}

/// Single forward pass over CIF text, yielding positioned tokens.
///
/// Text-block bodies, triple-quoted bodies, and comments are emitted as
/// single opaque tokens; nothing inside them is ever reported as a field name.
/// After the first error the lexer yields nothing further.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    file_id: usize,
    state: State,
    /// The previous significant token was a top-level field name.
    after_tag: bool,
    columns: usize,
    queued: VecDeque<Token>,
    last_good: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file_id: usize) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            file_id,
            state: State::TopLevel,
            after_tag: false,
            columns: 0,
            queued: VecDeque::new(),
            last_good: 0,
            done: false,
        }
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(message, span, self.file_id).with_last_good(self.last_good)
    }

    fn at_line_start(&self, pos: usize) -> bool {
        pos == 0
            || self.bytes[pos - 1] == b'\n'
            || (pos == BYTE_ORDER_MARK.len_utf8() && self.source.starts_with(BYTE_ORDER_MARK))
    }

    fn in_loop(&self) -> bool {
        matches!(self.state, State::InLoopHeader | State::InLoopRow)
    }

    /// Skip whitespace. Returns true if a whitespace-only line was crossed.
    fn skip_whitespace(&mut self) -> bool {
        // A leading byte order mark counts as whitespace.
        if self.pos == 0 && self.source.starts_with(BYTE_ORDER_MARK) {
            self.pos = BYTE_ORDER_MARK.len_utf8();
        }
        let mut line_blank = self.at_line_start(self.pos);
        let mut crossed_blank = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\n' => {
                    if line_blank {
                        crossed_blank = true;
                    }
                    line_blank = true;
                }
                b' ' | b'\t' | b'\r' => {}
                _ => break,
            }
            self.pos += 1;
        }
        crossed_blank
    }

    /// Leave the loop states, queueing a LoopEnd marker at `at`.
    fn end_loop(&mut self, at: usize) {
        if self.in_loop() {
            self.queued.push_back(Token {
                kind: TokenKind::LoopEnd,
                span: at..at,
            });
            self.state = State::TopLevel;
            self.columns = 0;
        }
    }

    /// A value is about to be emitted: check context and advance loop state.
    fn accept_value(&mut self, span: Range<usize>) -> Result<(), ParseError> {
        match self.state {
            State::InLoopHeader => {
                if self.columns == 0 {
                    return Err(self.error("loop_ has no column declarations", span));
                }
                self.state = State::InLoopRow;
            }
            State::InLoopRow => {}
            _ => {
                if !self.after_tag {
                    return Err(self.error("value is not preceded by a field name", span));
                }
            }
        }
        self.after_tag = false;
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, span: Range<usize>) {
        self.last_good = span.end;
        self.queued.push_back(Token { kind, span });
    }

    fn scan(&mut self) -> Result<(), ParseError> {
        match self.state {
            State::InTextBlock { in_loop } => return self.scan_text_block(in_loop),
            State::InTripleQuote { in_loop } => return self.scan_triple_quote(in_loop),
            _ => {}
        }

        let blank = self.skip_whitespace();
        if blank && self.state == State::InLoopRow {
            self.end_loop(self.pos);
            return Ok(());
        }

        if self.pos >= self.bytes.len() {
            self.end_loop(self.pos);
            self.done = true;
            return Ok(());
        }

        let start = self.pos;
        match self.bytes[start] {
            b'#' => {
                let end = self.line_end(start);
                let text = self.source[start..end].to_string();
                self.pos = end;
                self.push(TokenKind::Comment(text), start..end);
            }
            b';' if self.at_line_start(start) => {
                let in_loop = self.in_loop();
                if !in_loop && !self.after_tag {
                    return Err(self.error(
                        "text block is not preceded by a field name",
                        start..start + 1,
                    ));
                }
                self.state = State::InTextBlock { in_loop };
            }
            quote @ (b'\'' | b'"') => {
                if self.bytes[start..].starts_with(&[quote, quote, quote]) {
                    let in_loop = self.in_loop();
                    self.state = State::InTripleQuote { in_loop };
                } else {
                    self.scan_quoted(quote)?;
                }
            }
            _ => self.scan_word()?,
        }
        Ok(())
    }

    /// End of the line containing `pos`, excluding `\r\n`.
    fn line_end(&self, pos: usize) -> usize {
        let end = self.source[pos..]
            .find('\n')
            .map(|i| pos + i)
            .unwrap_or(self.bytes.len());
        if end > pos && self.bytes[end - 1] == b'\r' {
            end - 1
        } else {
            end
        }
    }

    fn scan_quoted(&mut self, quote: u8) -> Result<(), ParseError> {
        let start = self.pos;
        let mut i = start + 1;
        loop {
            if i >= self.bytes.len() || self.bytes[i] == b'\n' {
                return Err(self.error("unterminated quoted string", start..i));
            }
            // A quote only closes the string when whitespace follows it.
            if self.bytes[i] == quote
                && (i + 1 >= self.bytes.len() || self.bytes[i + 1].is_ascii_whitespace())
            {
                break;
            }
            i += 1;
        }
        let span = start..i + 1;
        self.accept_value(span.clone())?;
        let text = self.source[start + 1..i].to_string();
        self.pos = i + 1;
        self.push(
            TokenKind::Value(Value::Quoted {
                text,
                quote: quote as char,
            }),
            span,
        );
        Ok(())
    }

    fn scan_triple_quote(&mut self, in_loop: bool) -> Result<(), ParseError> {
        let start = self.pos;
        let quote = self.bytes[start];
        let delim = [quote, quote, quote];
        let body_start = start + 3;
        let close = self.bytes[body_start..]
            .windows(3)
            .position(|w| w == delim)
            .map(|i| body_start + i);
        let Some(close) = close else {
            return Err(self.error(
                "unterminated triple-quoted string",
                start..self.bytes.len(),
            ));
        };
        self.state = if in_loop {
            State::InLoopRow
        } else {
            State::TopLevel
        };
        let span = start..close + 3;
        self.accept_value(span.clone())?;
        let text = self.source[body_start..close].to_string();
        self.pos = close + 3;
        self.push(
            TokenKind::Value(Value::TripleQuoted {
                text,
                quote: quote as char,
            }),
            span,
        );
        Ok(())
    }

    /// Scan from the opening `;` to a line that is exactly `;`.
    fn scan_text_block(&mut self, in_loop: bool) -> Result<(), ParseError> {
        let start = self.pos;
        let mut line_start = match self.source[start..].find('\n') {
            Some(i) => start + i + 1,
            None => self.bytes.len(),
        };
        let close = loop {
            if line_start >= self.bytes.len() {
                return Err(self
                    .error("unterminated text block", start..self.bytes.len())
                    .with_note("a text block closes on a line holding only `;`"));
            }
            let end = self.line_end(line_start);
            if self.source[line_start..end].trim_end() == ";" {
                break line_start;
            }
            line_start = match self.source[line_start..].find('\n') {
                Some(i) => line_start + i + 1,
                None => self.bytes.len(),
            };
        };

        self.state = if in_loop {
            State::InLoopRow
        } else {
            State::TopLevel
        };
        let span = start..close + 1;
        self.accept_value(span.clone())?;

        // Body: after the opening `;` up to the line break before the closing `;`.
        let mut body = &self.source[start + 1..close];
        body = body.strip_suffix('\n').unwrap_or(body);
        body = body.strip_suffix('\r').unwrap_or(body);
        let first_line_end = body.find('\n').unwrap_or(body.len());
        if body[..first_line_end].trim().is_empty() {
            body = if first_line_end < body.len() {
                &body[first_line_end + 1..]
            } else {
                ""
            };
        }
        let text = body.to_string();
        self.pos = close + 1;
        self.push(TokenKind::Value(Value::TextBlock(text)), span);
        Ok(())
    }

    fn scan_word(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut end = start;
        while end < self.bytes.len() && !self.bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        self.pos = end;
        let word = &self.source[start..end];
        let lower = word.to_ascii_lowercase();
        let span = start..end;

        if lower.starts_with("data_") {
            let name = &word[5..];
            if name.is_empty() {
                return Err(self.error("data block header without a name", span));
            }
            self.end_loop(start);
            self.after_tag = false;
            self.push(TokenKind::DataHeader(name.to_string()), span);
        } else if lower.starts_with("save_") {
            let name = &word[5..];
            self.end_loop(start);
            self.after_tag = false;
            let kind = if name.is_empty() {
                TokenKind::SaveEnd
            } else {
                TokenKind::SaveHeader(name.to_string())
            };
            self.push(kind, span);
        } else if lower == "global_" {
            self.end_loop(start);
            self.after_tag = false;
            self.push(TokenKind::GlobalHeader, span);
        } else if lower == "stop_" {
            self.end_loop(start);
            self.after_tag = false;
            self.push(TokenKind::Stop, span);
        } else if lower == "loop_" {
            self.end_loop(start);
            self.after_tag = false;
            self.state = State::InLoopHeader;
            self.columns = 0;
            self.push(TokenKind::Loop, span);
        } else if word.starts_with('_') {
            match self.state {
                State::InLoopHeader => {
                    self.columns += 1;
                    self.push(TokenKind::Column(word.to_string()), span);
                }
                _ => {
                    self.end_loop(start);
                    self.after_tag = true;
                    self.push(TokenKind::Tag(word.to_string()), span);
                }
            }
        } else {
            self.accept_value(span.clone())?;
            self.push(TokenKind::Value(Value::Bare(word.to_string())), span);
        }
        Ok(())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.queued.pop_front() {
                return Some(Ok(token));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.scan() {
                self.done = true;
                self.queued.clear();
                return Some(Err(err));
            }
        }
    }
}
