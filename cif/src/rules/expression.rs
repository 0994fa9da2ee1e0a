use std::fmt;
use std::ops::Range;

use crate::parser::error::ParseError;

/// Arithmetic over numeric literals and field references.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// A reference to another field's numeric value.
    Field {
        name: String,
        span: Range<usize>,
    },
    Neg(Box<Expr>),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Sub => 1,
            BinaryOperator::Mul | BinaryOperator::Div => 2,
        }
    }
}

impl Expr {
    /// Every field referenced by the expression, in reading order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Field { name, .. } => out.push(name),
            Expr::Neg(inner) => inner.collect_fields(out),
            Expr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Field { name, .. } => write!(f, "{}", name),
            Expr::Neg(inner) => match inner.as_ref() {
                Expr::Binary { .. } => write!(f, "-({})", inner),
                _ => write!(f, "-{}", inner),
            },
            Expr::Binary { op, left, right } => {
                let wrap = |child: &Expr, strict: bool| match child {
                    Expr::Binary { op: inner, .. } => {
                        inner.precedence() < op.precedence()
                            || (strict && inner.precedence() == op.precedence())
                    }
                    _ => false,
                };
                let strict = matches!(op, BinaryOperator::Sub | BinaryOperator::Div);
                if wrap(left, false) {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                if wrap(right, strict) {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Field(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(
    text: &str,
    offset: usize,
    file_id: usize,
) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let single = match c {
            b'+' => Some(Token::Plus),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Star),
            b'/' => Some(Token::Slash),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((token, offset + i..offset + i + 1));
            i += 1;
            continue;
        }

        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'_' {
            i += 1;
            while i < bytes.len() {
                let b = bytes[i];
                let continues =
                    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'[' | b']');
                if !continues {
                    break;
                }
                i += 1;
            }
            tokens.push((Token::Field(text[start..i].to_string()), offset + start..offset + i));
        } else if c.is_ascii_digit() || c == b'.' {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // Exponent: 1.5e-3
            if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
                let mut j = i + 1;
                if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let literal = &text[start..i];
            let value = literal.parse::<f64>().map_err(|_| {
                ParseError::error(
                    format!("invalid number `{}`", literal),
                    offset + start..offset + i,
                    file_id,
                )
            })?;
            tokens.push((Token::Number(value), offset + start..offset + i));
        } else {
            let ch = text[i..].chars().next().unwrap_or('?');
            return Err(ParseError::error(
                format!("unexpected character `{}` in expression", ch),
                offset + i..offset + i + ch.len_utf8(),
                file_id,
            )
            .with_note("expressions use numbers, field names, `+ - * /` and parentheses"));
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

/// Parse an arithmetic expression. `offset` is the byte position of `text`
/// within the rule source, so spans point into that source.
///
/// `-` is always an operator: `_b-1` is `_b - 1`. Field names containing a
/// hyphen cannot be referenced from an expression.
pub fn parse_expression(text: &str, offset: usize, file_id: usize) -> Result<Expr, ParseError> {
    let tokens = tokenize(text, offset, file_id)?;
    let end = offset + text.len();
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        end,
        file_id,
    };
    if parser.tokens.is_empty() {
        return Err(ParseError::error("empty expression", offset..end, file_id));
    }
    let expr = parser.parse_expr(0)?;
    if let Some((_, span)) = parser.tokens.get(parser.pos) {
        return Err(ParseError::error(
            "unexpected tokens after expression",
            span.start..end,
            file_id,
        ));
    }
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    end: usize,
    file_id: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let span = self
            .tokens
            .get(self.pos)
            .map(|(_, s)| s.clone())
            .unwrap_or(self.end..self.end);
        ParseError::error(message, span, self.file_id)
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOperator::Add,
                Some(Token::Minus) => BinaryOperator::Sub,
                Some(Token::Star) => BinaryOperator::Mul,
                Some(Token::Slash) => BinaryOperator::Div,
                Some(Token::RParen) | None => break,
                Some(_) => return Err(self.error("expected an operator")),
            };
            let (l_bp, r_bp) = infix_bp(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(r_bp)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Field(name), span)) => Ok(Expr::Field { name, span }),
            Some((Token::Minus, _)) => {
                let inner = self.parse_expr(PREFIX_BP)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some((Token::Plus, _)) => self.parse_expr(PREFIX_BP),
            Some((Token::LParen, open)) => {
                let inner = self.parse_expr(0)?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    _ => Err(ParseError::error("unclosed parenthesis", open, self.file_id)),
                }
            }
            Some((_, span)) => Err(ParseError::error(
                "expected a number, field name, or `(`",
                span,
                self.file_id,
            )),
            None => Err(self.error("expression ends early")),
        }
    }
}

const PREFIX_BP: u8 = 5;

fn infix_bp(op: BinaryOperator) -> (u8, u8) {
    match op {
        BinaryOperator::Add | BinaryOperator::Sub => (1, 2),
        BinaryOperator::Mul | BinaryOperator::Div => (3, 4),
    }
}
