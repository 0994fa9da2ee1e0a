use std::collections::HashMap;
use std::ops::Range;

use crate::parser::error::ParseError;
use crate::rules::expression::parse_expression;
use crate::rules::{Rule, RuleLine};

const KEYWORDS: [&str; 6] = ["CHECK", "DELETE", "EDIT", "RENAME", "CALCULATE", "APPEND"];

/// Parse a rule source. Blank lines, `#` comment lines, and `//` lines are
/// skipped. A `# _field: text` comment line describes the CHECK rule for that
/// field.
pub fn parse_rules(source: &str, file_id: usize) -> Result<Vec<RuleLine>, ParseError> {
    let mut descriptions: HashMap<String, String> = HashMap::new();
    for (_, _, line) in lines(source) {
        let line = line.trim();
        if let Some(comment) = line.strip_prefix('#') {
            if let Some((field, text)) = comment.split_once(':') {
                let field = field.trim();
                if field.starts_with('_') && !field.contains(char::is_whitespace) {
                    descriptions.insert(field.to_string(), text.trim().to_string());
                }
            }
        }
    }

    let mut rules = Vec::new();
    for (number, start, raw) in lines(source) {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        let leading = raw.len() - raw.trim_start().len();
        let line = LineCursor {
            text: trimmed,
            offset: start + leading,
            file_id,
        };
        let mut rule = line.parse()?;
        if let Rule::Check {
            field, description, ..
        } = &mut rule
        {
            if description.is_none() {
                *description = descriptions.get(field.as_str()).cloned();
            }
        }
        rules.push(RuleLine {
            rule,
            span: start + leading..start + leading + trimmed.len(),
            line: number,
        });
    }
    Ok(rules)
}

/// `(1-based number, byte offset, text)` for each line, without line breaks.
fn lines(source: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    let mut offset = 0;
    source.split('\n').enumerate().map(move |(i, line)| {
        let start = offset;
        offset += line.len() + 1;
        (i + 1, start, line.strip_suffix('\r').unwrap_or(line))
    })
}

struct LineCursor<'a> {
    text: &'a str,
    /// Byte offset of `text` in the rule source.
    offset: usize,
    file_id: usize,
}

impl<'a> LineCursor<'a> {
    fn error(&self, message: impl Into<String>, within: Range<usize>) -> ParseError {
        ParseError::error(
            message,
            self.offset + within.start..self.offset + within.end,
            self.file_id,
        )
    }

    fn whole(&self) -> Range<usize> {
        0..self.text.len()
    }

    fn parse(&self) -> Result<Rule, ParseError> {
        let (keyword, body_start) = self.keyword()?;
        let (body, comment) = split_comment(&self.text[body_start..]);
        let body_end = body_start + body.trim_end().len();
        let body = body.trim_end();
        let lead = body.len() - body.trim_start().len();
        let body = body.trim_start();
        let body_start = body_start + lead;

        let (field, rest) = self.field_name(body, body_start)?;
        let rest_offset = body_start + body.len() - rest.len();

        match keyword {
            "CHECK" => {
                if rest.is_empty() {
                    return Err(self
                        .error(format!("`{}` has no expected value", field), body_start..body_end)
                        .with_note("write `?` to expect an unknown value"));
                }
                Ok(Rule::Check {
                    field: field.to_string(),
                    expected: unquote(rest).to_string(),
                    description: comment.map(str::to_string),
                })
            }
            "DELETE" => {
                if !rest.is_empty() {
                    return Err(self.error(
                        "DELETE takes only a field name",
                        rest_offset..rest_offset + rest.len(),
                    ));
                }
                Ok(Rule::Delete {
                    field: field.to_string(),
                })
            }
            "EDIT" => {
                if rest.is_empty() {
                    return Err(self.error(format!("EDIT of `{}` has no value", field), self.whole()));
                }
                Ok(Rule::Edit {
                    field: field.to_string(),
                    value: unquote(rest).to_string(),
                })
            }
            "RENAME" => {
                let (to, extra) = self.field_name(rest, rest_offset)?;
                if !extra.is_empty() {
                    return Err(self.error("RENAME takes exactly two field names", self.whole()));
                }
                Ok(Rule::Rename {
                    from: field.to_string(),
                    to: to.to_string(),
                })
            }
            "CALCULATE" => {
                let Some(expr_text) = rest.strip_prefix('=') else {
                    return Err(self
                        .error(
                            format!("CALCULATE of `{}` is missing `=`", field),
                            rest_offset..rest_offset + rest.len(),
                        )
                        .with_note("write `CALCULATE: _field = expression`"));
                };
                let expression =
                    parse_expression(expr_text, self.offset + rest_offset + 1, self.file_id)?;
                Ok(Rule::Calculate {
                    field: field.to_string(),
                    expression,
                })
            }
            "APPEND" => {
                if rest.is_empty() {
                    return Err(self.error(format!("APPEND to `{}` has no text", field), self.whole()));
                }
                Ok(Rule::Append {
                    field: field.to_string(),
                    text: unquote(rest).to_string(),
                })
            }
            _ => Err(self.error(format!("unknown directive `{}`", keyword), self.whole())),
        }
    }

    /// The directive keyword and where the body starts. A line with no
    /// `KEYWORD:` prefix is a CHECK.
    fn keyword(&self) -> Result<(&'static str, usize), ParseError> {
        if self.text.starts_with('_') {
            return Ok(("CHECK", 0));
        }
        if let Some((head, _)) = self.text.split_once(':') {
            let upper = head.trim().to_ascii_uppercase();
            if let Some(keyword) = KEYWORDS.iter().find(|k| **k == upper) {
                return Ok((*keyword, head.len() + 1));
            }
            if !head.contains(char::is_whitespace) {
                return Err(self
                    .error(format!("unknown directive `{}:`", head), 0..head.len() + 1)
                    .with_note(format!("expected one of {}", KEYWORDS.join(", "))));
            }
        }
        Err(self
            .error("expected a field name or a directive", self.whole())
            .with_note("field names start with `_`"))
    }

    /// Split off a leading field name. Returns the name and the trimmed rest.
    fn field_name<'t>(&self, text: &'t str, at: usize) -> Result<(&'t str, &'t str), ParseError> {
        let end = text.find(char::is_whitespace).unwrap_or(text.len());
        // CALCULATE may write `_field=expr` without spaces.
        let end = text[..end].find('=').unwrap_or(end);
        let name = &text[..end];
        if !name.starts_with('_') || name.len() < 2 {
            let message = match text.split_whitespace().next() {
                Some(found) => format!("expected a field name, found `{}`", found),
                None => "expected a field name".to_string(),
            };
            return Err(self.error(message, at..at + end));
        }
        Ok((name, text[end..].trim_start()))
    }
}

/// Split a trailing `# comment` that sits outside quotes and follows
/// whitespace.
fn split_comment(text: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut prev_space = true;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if (c == '\'' || c == '"') && prev_space => quote = Some(c),
            None if c == '#' && prev_space && i > 0 => {
                let comment = text[i + 1..].trim();
                return (&text[..i], (!comment.is_empty()).then_some(comment));
            }
            None => {}
        }
        prev_space = c.is_whitespace();
    }
    (text, None)
}

/// Strip one pair of matching quotes (single, double, or tripled).
fn unquote(text: &str) -> &str {
    for delim in ["'''", "\"\"\"", "'", "\""] {
        if text.len() >= 2 * delim.len() && text.starts_with(delim) && text.ends_with(delim) {
            return &text[delim.len()..text.len() - delim.len()];
        }
    }
    text
}
