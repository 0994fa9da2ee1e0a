pub mod document;
pub mod parser;
pub mod rules;

pub use document::{Block, BlockKind, Document, Entry, Field, Format, Loop, Notation, Value, Version};
pub use parser::{ParseError, Parser};

/// Parse CIF text into a Document. File ID 0 is used for diagnostics.
pub fn parse(source: &str) -> Result<Document, ParseError> {
    Parser::new(source.to_string(), 0).parse()
}

/// Reproduce the text of a Document.
pub fn serialize(document: &Document) -> String {
    document.serialize()
}
