//! Dictionary dialect detection.

use std::fmt;

use cif::{BlockKind, Document};
use serde::Serialize;

use crate::dictionary::tag_values;

/// The definition language a dictionary is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DictionaryFormat {
    Ddlm,
    Ddl1,
    /// Recognised so it can be rejected with a clear message.
    Ddl2,
    Unknown,
}

impl fmt::Display for DictionaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryFormat::Ddlm => write!(f, "DDLm"),
            DictionaryFormat::Ddl1 => write!(f, "DDL1"),
            DictionaryFormat::Ddl2 => write!(f, "DDL2"),
            DictionaryFormat::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Default)]
struct Scores {
    ddlm: u32,
    ddl1: u32,
    ddl2: u32,
}

/// Score each dialect by the tags and structure it uses; highest score wins.
/// A close call falls back to each dialect's defining tag.
pub fn detect_format(document: &Document) -> DictionaryFormat {
    let names: Vec<&str> = document.names().iter().map(|n| n.name).collect();
    let has = |tag: &str| names.iter().any(|n| n.eq_ignore_ascii_case(tag));
    let count = |tag: &str| names.iter().filter(|n| n.eq_ignore_ascii_case(tag)).count();

    let frames: Vec<&cif::Block> = document
        .scopes()
        .into_iter()
        .filter(|b| b.kind == BlockKind::Save)
        .collect();
    let has_data_blocks = document.blocks.iter().any(|b| b.kind == BlockKind::Data);

    let mut scores = Scores::default();

    for (tag, weight) in [
        ("_dictionary.title", 3),
        ("_definition.id", 5),
        ("_name.category_id", 2),
        ("_description.text", 2),
        ("_type.contents", 2),
        ("_alias.definition_id", 2),
        ("_dictionary.ddl_conformance", 3),
    ] {
        if has(tag) {
            scores.ddlm += weight;
        }
    }

    let on_this_dictionary = document
        .blocks
        .iter()
        .any(|b| b.name.eq_ignore_ascii_case("on_this_dictionary"));
    if on_this_dictionary {
        scores.ddl1 += 5;
    }
    for (tag, weight) in [
        ("_dictionary_name", 3),
        ("_dictionary_version", 1),
        ("_dictionary_update", 1),
    ] {
        if has(tag) {
            scores.ddl1 += weight;
        }
    }
    if has_data_blocks && frames.is_empty() {
        scores.ddl1 += 5;
    }
    if count("_name") > 5 {
        scores.ddl1 += 3;
    }
    let ddl1_types = document
        .blocks
        .iter()
        .flat_map(|b| tag_values(b, "_type"))
        .filter(|v| matches!(v.text().trim(), "char" | "numb" | "null"))
        .count();
    if ddl1_types > 5 {
        scores.ddl1 += 3;
    }
    if has("_related_item") && has("_related_function") {
        scores.ddl1 += 2;
    }

    if frames.iter().filter(|f| f.name.starts_with('_')).count() > 5 {
        scores.ddl2 += 5;
    }
    for (tag, weight) in [
        ("_item.name", 4),
        ("_item.category_id", 3),
        ("_item_description.description", 3),
        ("_item_type.code", 3),
        ("_item_aliases.alias_name", 2),
        ("_datablock.id", 2),
    ] {
        if has(tag) {
            scores.ddl2 += weight;
        }
    }

    let mut ranked = [
        (scores.ddlm, DictionaryFormat::Ddlm),
        (scores.ddl1, DictionaryFormat::Ddl1),
        (scores.ddl2, DictionaryFormat::Ddl2),
    ];
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    let (best, winner) = ranked[0];
    let runner_up = ranked[1].0;

    if best == 0 {
        return DictionaryFormat::Unknown;
    }
    // Within a factor of 1.5: decide by the defining tag instead.
    if runner_up > 0 && best * 2 < runner_up * 3 {
        if has("_definition.id") {
            return DictionaryFormat::Ddlm;
        }
        if has("_item.name") {
            return DictionaryFormat::Ddl2;
        }
        if on_this_dictionary {
            return DictionaryFormat::Ddl1;
        }
    }
    winner
}
