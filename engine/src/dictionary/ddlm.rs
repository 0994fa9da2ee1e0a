use cif::{Block, Document};

use crate::dictionary::{
    CanonicalField, ParsedDictionary, ValueKind, dictionary_metadata, tag_pairs, tag_text,
    tag_values,
};

/// Read a DDLm dictionary: one save frame per definition, keyed by
/// `_definition.id`.
pub(crate) fn read(document: &Document, source: &str) -> ParsedDictionary {
    let (title, version) =
        dictionary_metadata(document, &["_dictionary.title"], &["_dictionary.version"]);

    let fields = document
        .blocks
        .iter()
        .flat_map(|block| block.frames())
        .filter_map(|frame| read_definition(frame, source))
        .collect();

    ParsedDictionary {
        title,
        version,
        fields,
    }
}

fn read_definition(frame: &Block, source: &str) -> Option<CanonicalField> {
    let id = tag_text(frame, "_definition.id")?;
    // Category and head definitions describe groups, not data names.
    if let Some(scope) = tag_text(frame, "_definition.scope") {
        if !scope.eq_ignore_ascii_case("item") {
            return None;
        }
    }
    if !id.starts_with('_') {
        return None;
    }

    let mut field = CanonicalField::new(id.clone(), source);
    if id.contains('.') {
        field.modern_spelling = Some(id.clone());
    }

    for (alias, deprecation) in tag_pairs(frame, "_alias.definition_id", "_alias.deprecation_date") {
        if alias.is_placeholder() {
            continue;
        }
        let name = alias.text().trim().to_string();
        if name == id {
            continue;
        }
        if deprecation.is_some_and(|d| !d.is_placeholder()) {
            field.deprecated_aliases.insert(name.clone());
        }
        field.aliases.insert(name);
    }

    // The first current alias without a dot is the legacy spelling.
    field.legacy_spelling = field
        .aliases
        .iter()
        .filter(|a| !a.contains('.') && !field.deprecated_aliases.contains(*a))
        .min_by_key(|a| alias_order(frame, a))
        .cloned();
    if field.modern_spelling.is_none() {
        field.modern_spelling = field
            .aliases
            .iter()
            .filter(|a| a.contains('.') && !field.deprecated_aliases.contains(*a))
            .min_by_key(|a| alias_order(frame, a))
            .cloned();
    }

    let replaced_by = tag_values(frame, "_definition_replaced.by")
        .into_iter()
        .find(|v| !v.is_placeholder())
        .map(|v| v.text().trim().to_string());
    let replaced = replaced_by.is_some() || !tag_values(frame, "_definition_replaced.id").is_empty();
    match replaced_by {
        Some(successor) if successor != id => field.deprecated_by = Some(successor),
        _ if replaced => field.retired = true,
        _ => {}
    }

    field.value_kind = tag_text(frame, "_type.contents")
        .map(|c| ValueKind::from_ddlm(&c))
        .unwrap_or(ValueKind::Unspecified);
    field.category = tag_text(frame, "_name.category_id");
    field.description = tag_text(frame, "_description.text");
    field.default_value = tag_text(frame, "_enumeration.default");

    let states: Vec<String> = tag_values(frame, "_enumeration_set.state")
        .into_iter()
        .map(|v| v.text().trim().to_string())
        .collect();
    if !states.is_empty() {
        field.enumerated_values = Some(states);
    }

    Some(field)
}

/// Position of an alias in the frame, so "first" means first as written.
fn alias_order(frame: &Block, alias: &str) -> usize {
    tag_values(frame, "_alias.definition_id")
        .iter()
        .position(|v| v.text().trim() == alias)
        .unwrap_or(usize::MAX)
}
