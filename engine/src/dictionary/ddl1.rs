use cif::{Block, BlockKind, Document};

use crate::dictionary::{
    CanonicalField, ParsedDictionary, ValueKind, dictionary_metadata, tag_pairs, tag_text,
    tag_values,
};

/// Read a DDL1 dictionary: one data block per definition, naming one or more
/// legacy fields with `_name`.
pub(crate) fn read(document: &Document, source: &str) -> ParsedDictionary {
    let (title, version) =
        dictionary_metadata(document, &["_dictionary_name"], &["_dictionary_version"]);

    let fields = document
        .blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Data)
        .filter(|b| !b.name.eq_ignore_ascii_case("on_this_dictionary"))
        .flat_map(|b| read_block(b, source))
        .collect();

    ParsedDictionary {
        title,
        version,
        fields,
    }
}

fn read_block(block: &Block, source: &str) -> Vec<CanonicalField> {
    let names: Vec<String> = tag_values(block, "_name")
        .into_iter()
        .filter(|v| !v.is_placeholder())
        .map(|v| v.text().trim().to_string())
        .filter(|n| n.starts_with('_'))
        .collect();

    // A block naming several fields shares the rest of its attributes.
    let value_kind = tag_text(block, "_type")
        .map(|t| ValueKind::from_ddl1(&t))
        .unwrap_or(ValueKind::Unspecified);
    let category = tag_text(block, "_category");
    let description = tag_text(block, "_definition");
    let default_value = tag_text(block, "_enumeration_default");
    let enumeration: Vec<String> = tag_values(block, "_enumeration")
        .into_iter()
        .map(|v| v.text().trim().to_string())
        .collect();

    let replacement = tag_pairs(block, "_related_item", "_related_function")
        .into_iter()
        .find(|(_, function)| function.is_some_and(|f| f.text().trim().eq_ignore_ascii_case("replace")))
        .map(|(item, _)| item.text().trim().to_string());

    names
        .into_iter()
        .map(|name| {
            let mut field = CanonicalField::new(name.clone(), source);
            if name.contains('.') {
                field.modern_spelling = Some(name);
            } else {
                field.legacy_spelling = Some(name);
            }
            field.value_kind = value_kind.clone();
            field.category = category.clone();
            field.description = description.clone();
            field.default_value = default_value.clone();
            if !enumeration.is_empty() {
                field.enumerated_values = Some(enumeration.clone());
            }
            field.deprecated_by = replacement
                .clone()
                .filter(|r| *r != field.canonical_id);
            field
        })
        .collect()
}
