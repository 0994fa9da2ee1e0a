pub mod error;
pub mod lexer;
mod structural;

pub use error::ParseError;

use crate::document::Document;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source text into a complete Document.
    pub fn parse(self) -> Result<Document, ParseError> {
        let parsed = structural::parse_blocks(&self.source, self.file_id)?;
        Ok(Document::new(
            self.source,
            parsed.preamble,
            parsed.blocks,
            parsed.protected,
            self.file_id,
        ))
    }
}
