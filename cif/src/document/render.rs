//! Rendering new values as CIF text.

/// The layout a rendered value should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single-line token, quoted only when required.
    Inline,
    /// A `;`-delimited text block.
    TextBlock,
}

/// Render `text` as a CIF value.
///
/// Text containing a line break always becomes a text block. `prefer_quote`
/// keeps an existing quote style when the text allows it.
pub fn render(text: &str, shape: Shape, prefer_quote: Option<char>) -> String {
    if shape == Shape::TextBlock || text.contains('\n') {
        return render_text_block(text);
    }

    if let Some(quote) = prefer_quote {
        if !text.contains(quote) {
            return format!("{}{}{}", quote, text, quote);
        }
    }

    if !needs_quoting(text) {
        return text.to_string();
    }

    for quote in ['\'', '"'] {
        if !text.contains(quote) {
            return format!("{}{}{}", quote, text, quote);
        }
    }
    for delim in ["\"\"\"", "'''"] {
        if !text.contains(delim) {
            return format!("{}{}{}", delim, text, delim);
        }
    }
    render_text_block(text)
}

/// Render as a text block: `;` on its own line, the text, then a closing `;`.
/// The rendered value starts at column 0 and ends on the closing `;`.
pub fn render_text_block(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let closes_early = text.split('\n').any(|line| line.trim_end() == ";");
    if closes_early {
        for delim in ["\"\"\"", "'''"] {
            if !text.contains(delim) {
                return format!("{}{}{}", delim, text, delim);
            }
        }
    }
    let mut out = String::with_capacity(text.len() + 4);
    out.push_str(";\n");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Both triple delimiters occur in the text; pad the terminator-like line.
        if line.trim_end() == ";" {
            out.push(' ');
        }
        out.push_str(line);
    }
    out.push_str("\n;");
    out
}

/// Whether a bare token would be misread.
pub fn needs_quoting(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    if text.chars().any(char::is_whitespace) {
        return true;
    }
    if matches!(
        text.as_bytes()[0],
        b'_' | b'#' | b'$' | b'\'' | b'"' | b';'
    ) {
        return true;
    }
    // List and table delimiters in CIF 2.0.
    if text.contains(['[', ']', '{', '}']) {
        return true;
    }
    let lower = text.to_ascii_lowercase();
    ["data_", "save_", "loop_", "global_", "stop_"]
        .iter()
        .any(|reserved| lower.starts_with(reserved))
}
