use std::fmt;

/// The value carried by a field or a loop cell.
///
/// The in-memory text is unquoted; the variant remembers the original
/// delimiter so that rendering a replacement can keep the existing shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An unquoted token, including the `?` and `.` placeholders.
    Bare(String),
    /// A single-line `'...'` or `"..."` string.
    Quoted { text: String, quote: char },
    /// A `;`-delimited multi-line text field. The text excludes the delimiter
    /// lines and keeps the original line wrapping.
    TextBlock(String),
    /// A `'''...'''` or `"""..."""` string.
    TripleQuoted { text: String, quote: char },
}

impl Value {
    pub fn text(&self) -> &str {
        match self {
            Value::Bare(text) => text,
            Value::Quoted { text, .. } => text,
            Value::TextBlock(text) => text,
            Value::TripleQuoted { text, .. } => text,
        }
    }

    /// `?` (unknown) and `.` (inapplicable) are placeholders, not data.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Bare(text) if text == "?" || text == ".")
    }

    pub fn is_text_block(&self) -> bool {
        matches!(self, Value::TextBlock(_))
    }

    /// The quote character of a single-line quoted value, if any.
    pub fn quote(&self) -> Option<char> {
        match self {
            Value::Quoted { quote, .. } => Some(*quote),
            _ => None,
        }
    }

    /// Read the value as a number, ignoring a trailing standard uncertainty
    /// such as the `(5)` in `1.234(5)`.
    pub fn as_number(&self) -> Option<f64> {
        if self.is_placeholder() || self.is_text_block() {
            return None;
        }
        parse_number(self.text())
    }
}

/// Parse CIF numeric text. Placeholders and non-finite spellings are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = match (text.find('('), text.ends_with(')')) {
        (Some(open), true) => {
            let digits = &text[open + 1..text.len() - 1];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            &text[..open]
        }
        _ => text,
    };
    let first = text.bytes().next()?;
    if !(first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bare(text) => write!(f, "{}", text),
            Value::Quoted { text, quote } => write!(f, "{}{}{}", quote, text, quote),
            Value::TextBlock(text) => write!(f, ";\n{}\n;", text),
            Value::TripleQuoted { text, quote } => {
                let delim = quote.to_string().repeat(3);
                write!(f, "{}{}{}", delim, text, delim)
            }
        }
    }
}
