//! Field definitions loaded from dictionary files.
//!
//! A [`DictionarySet`] maps every known spelling of a field (modern name,
//! legacy name, historical aliases) to one [`CanonicalField`]. Sets are built
//! once and never mutated afterwards; loading again builds a fresh set.

mod ddl1;
mod ddlm;
mod fetch;
pub mod format;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use cif::{Block, Document, Entry, Notation, Value};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::DictionaryLoadError;

pub use fetch::{Fetch, FetchError, load_from_url};
pub use format::{DictionaryFormat, detect_format};

/// The kind of value a field holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Code,
    Name,
    Numeric,
    Date,
    Uri,
    /// Declared with a type this manager does not distinguish.
    Other(String),
    Unspecified,
}

impl ValueKind {
    /// Read a DDLm `_type.contents` value.
    pub fn from_ddlm(contents: &str) -> ValueKind {
        match contents.to_ascii_lowercase().as_str() {
            "text" => ValueKind::Text,
            "code" | "tag" | "symop" => ValueKind::Code,
            "name" => ValueKind::Name,
            "real" | "integer" | "count" | "index" | "imag" | "complex" | "dimension"
            | "range" => ValueKind::Numeric,
            "date" | "datetime" => ValueKind::Date,
            "uri" => ValueKind::Uri,
            _ => ValueKind::Other(contents.to_string()),
        }
    }

    /// Read a DDL1 `_type` value.
    pub fn from_ddl1(kind: &str) -> ValueKind {
        match kind.to_ascii_lowercase().as_str() {
            "numb" => ValueKind::Numeric,
            "char" => ValueKind::Text,
            "null" => ValueKind::Unspecified,
            _ => ValueKind::Other(kind.to_string()),
        }
    }
}

/// One field identity and everything known about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalField {
    pub canonical_id: String,
    pub legacy_spelling: Option<String>,
    pub modern_spelling: Option<String>,
    /// Every other spelling that resolves to this field.
    pub aliases: BTreeSet<String>,
    /// The subset of `aliases` marked deprecated by the dictionary.
    pub deprecated_aliases: BTreeSet<String>,
    /// The canonical ID that supersedes this field.
    pub deprecated_by: Option<String>,
    /// Superseded without a named successor.
    pub retired: bool,
    pub value_kind: ValueKind,
    pub enumerated_values: Option<Vec<String>>,
    pub default_value: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Name of the dictionary source that defined this field.
    pub source: String,
}

impl CanonicalField {
    pub(crate) fn new(canonical_id: impl Into<String>, source: &str) -> Self {
        CanonicalField {
            canonical_id: canonical_id.into(),
            legacy_spelling: None,
            modern_spelling: None,
            aliases: BTreeSet::new(),
            deprecated_aliases: BTreeSet::new(),
            deprecated_by: None,
            retired: false,
            value_kind: ValueKind::Unspecified,
            enumerated_values: None,
            default_value: None,
            category: None,
            description: None,
            source: source.to_string(),
        }
    }

    /// The canonical ID, both spellings, and every alias, without repeats.
    pub fn spellings(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        std::iter::once(self.canonical_id.as_str())
            .chain(self.modern_spelling.as_deref())
            .chain(self.legacy_spelling.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// The spelling to write for `notation`. Falls back to the other notation
    /// and finally the canonical ID when the dictionary knows no such spelling.
    pub fn spelling_for(&self, notation: Notation) -> &str {
        let (first, second) = match notation {
            Notation::Modern => (&self.modern_spelling, &self.legacy_spelling),
            Notation::Legacy => (&self.legacy_spelling, &self.modern_spelling),
        };
        first
            .as_deref()
            .or(second.as_deref())
            .unwrap_or(&self.canonical_id)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated_by.is_some() || self.retired
    }

    /// Whether `spelling` is a deprecated way to write this field.
    pub fn is_deprecated_spelling(&self, spelling: &str) -> bool {
        self.is_deprecated() || self.deprecated_aliases.contains(spelling)
    }

    /// Whether `value` is this field's declared default or a placeholder.
    pub fn is_default_value(&self, value: &Value) -> bool {
        value.is_placeholder() || self.default_value.as_deref() == Some(value.text())
    }
}

/// Where dictionary text comes from.
#[derive(Debug, Clone)]
pub enum DictionarySource {
    Path(PathBuf),
    Text { name: String, text: String },
}

impl DictionarySource {
    pub fn name(&self) -> String {
        match self {
            DictionarySource::Path(path) => path.display().to_string(),
            DictionarySource::Text { name, .. } => name.clone(),
        }
    }
}

impl From<&Path> for DictionarySource {
    fn from(path: &Path) -> Self {
        DictionarySource::Path(path.to_path_buf())
    }
}

/// Summary of one loaded source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub format: DictionaryFormat,
    pub title: Option<String>,
    pub version: Option<String>,
    pub field_count: usize,
}

/// A spelling that two definitions claimed. The later one won.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    pub spelling: String,
    pub replaced: String,
    pub winner: String,
    /// Source of the winning definition.
    pub source: String,
}

/// A source that failed to load while others succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub source: String,
    pub message: String,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.replaced == self.winner {
            write!(f, "{} redefined by {}", self.winner, self.source)
        } else {
            write!(
                f,
                "{} moved from {} to {} (defined in {})",
                self.spelling, self.replaced, self.winner, self.source
            )
        }
    }
}

/// A merged, read-only view over one or more dictionaries.
#[derive(Debug, Clone, Default)]
pub struct DictionarySet {
    fields: BTreeMap<String, CanonicalField>,
    /// Exact spelling to canonical ID.
    index: BTreeMap<String, String>,
    /// Lowercased spelling to canonical ID, for the case-insensitive fallback.
    folded: BTreeMap<String, String>,
    sources: Vec<SourceInfo>,
    conflicts: Vec<MergeConflict>,
    failures: Vec<LoadFailure>,
}

/// Load one dictionary source.
pub fn load(source: &DictionarySource) -> Result<DictionarySet, DictionaryLoadError> {
    let name = source.name();
    let text = match source {
        DictionarySource::Path(path) => {
            std::fs::read_to_string(path).map_err(|e| DictionaryLoadError::Unreadable {
                source_name: name.clone(),
                message: e.to_string(),
            })?
        }
        DictionarySource::Text { text, .. } => text.clone(),
    };
    load_text(&name, &text)
}

/// Load dictionary text. `name` identifies the source in diagnostics.
pub fn load_text(name: &str, text: &str) -> Result<DictionarySet, DictionaryLoadError> {
    let document = cif::parse(text).map_err(|error| DictionaryLoadError::Syntax {
        source_name: name.to_string(),
        error,
    })?;

    let format = detect_format(&document);
    let parsed = match format {
        DictionaryFormat::Ddlm => ddlm::read(&document, name),
        DictionaryFormat::Ddl1 => ddl1::read(&document, name),
        DictionaryFormat::Ddl2 | DictionaryFormat::Unknown => {
            return Err(DictionaryLoadError::Unsupported {
                source_name: name.to_string(),
                dialect: format.to_string(),
            });
        }
    };
    if parsed.fields.is_empty() {
        return Err(DictionaryLoadError::Empty {
            source_name: name.to_string(),
        });
    }

    let mut set = DictionarySet::default();
    set.sources.push(SourceInfo {
        name: name.to_string(),
        format,
        title: parsed.title,
        version: parsed.version,
        field_count: parsed.fields.len(),
    });
    for field in parsed.fields {
        set.insert(field);
    }
    set.rebuild_folded();
    info!(
        source = %name,
        format = %format,
        fields = set.fields.len(),
        "Loaded dictionary"
    );
    Ok(set)
}

/// Load and merge sources in precedence order (later wins).
///
/// A source that fails is recorded and skipped. The call fails only when
/// sources were given and none of them loaded.
pub fn load_dictionaries(sources: &[DictionarySource]) -> Result<DictionarySet, DictionaryLoadError> {
    let mut loaded = Vec::new();
    let mut failures = Vec::new();
    for source in sources {
        match load(source) {
            Ok(set) => loaded.push(set),
            Err(err) => {
                warn!(source = %source.name(), error = %err, "Dictionary failed to load");
                failures.push(LoadFailure {
                    source: source.name(),
                    message: err.to_string(),
                });
            }
        }
    }
    if loaded.is_empty() && !failures.is_empty() {
        return Err(DictionaryLoadError::NothingLoaded {
            failures: failures.len(),
        });
    }
    let mut merged = DictionarySet::merge(loaded);
    merged.failures.extend(failures);
    Ok(merged)
}

/// Output of a dialect reader.
pub(crate) struct ParsedDictionary {
    pub title: Option<String>,
    pub version: Option<String>,
    pub fields: Vec<CanonicalField>,
}

impl DictionarySet {
    /// Merge sets ordered by precedence, lowest first. Every spelling a later
    /// set takes over is recorded in [`DictionarySet::conflicts`].
    pub fn merge(sets: impl IntoIterator<Item = DictionarySet>) -> DictionarySet {
        let mut merged = DictionarySet::default();
        for set in sets {
            merged.sources.extend(set.sources);
            merged.conflicts.extend(set.conflicts);
            merged.failures.extend(set.failures);
            for (_, field) in set.fields {
                merged.insert(field);
            }
        }
        merged.rebuild_folded();
        merged
    }

    /// Add a definition; it wins every spelling it claims.
    fn insert(&mut self, field: CanonicalField) {
        let id = field.canonical_id.clone();

        if let Some(previous) = self.fields.remove(&id) {
            debug!(field = %id, source = %field.source, "Definition replaced");
            self.conflicts.push(MergeConflict {
                spelling: id.clone(),
                replaced: id.clone(),
                winner: id.clone(),
                source: field.source.clone(),
            });
            for spelling in previous.spellings() {
                if self.index.get(spelling) == Some(&id) {
                    self.index.remove(spelling);
                }
            }
        }

        for spelling in field.spellings() {
            if let Some(owner) = self.index.get(spelling).cloned() {
                if owner != id {
                    debug!(spelling, from = %owner, to = %id, "Spelling reassigned");
                    self.conflicts.push(MergeConflict {
                        spelling: spelling.to_string(),
                        replaced: owner.clone(),
                        winner: id.clone(),
                        source: field.source.clone(),
                    });
                    if let Some(loser) = self.fields.get_mut(&owner) {
                        loser.aliases.remove(spelling);
                        loser.deprecated_aliases.remove(spelling);
                        if loser.legacy_spelling.as_deref() == Some(spelling) {
                            loser.legacy_spelling = None;
                        }
                        if loser.modern_spelling.as_deref() == Some(spelling) {
                            loser.modern_spelling = None;
                        }
                    }
                }
            }
            self.index.insert(spelling.to_string(), id.clone());
        }

        self.fields.insert(id, field);
    }

    /// Lowercase index. Spellings that fold onto two different fields are
    /// left out so the fallback never guesses.
    fn rebuild_folded(&mut self) {
        let mut folded: BTreeMap<String, String> = BTreeMap::new();
        let mut ambiguous = HashSet::new();
        for (spelling, id) in &self.index {
            let key = spelling.to_lowercase();
            match folded.get(&key) {
                Some(existing) if existing != id => {
                    ambiguous.insert(key);
                }
                Some(_) => {}
                None => {
                    folded.insert(key, id.clone());
                }
            }
        }
        for key in ambiguous {
            folded.remove(&key);
        }
        self.folded = folded;
    }

    /// Exact, case-sensitive resolution of any known spelling.
    pub fn resolve(&self, name: &str) -> Option<&CanonicalField> {
        self.index.get(name).and_then(|id| self.fields.get(id))
    }

    /// Case-insensitive resolution. Only meant as a fallback after
    /// [`DictionarySet::resolve`] fails.
    pub fn resolve_ignoring_case(&self, name: &str) -> Option<&CanonicalField> {
        self.folded
            .get(&name.to_lowercase())
            .and_then(|id| self.fields.get(id))
    }

    /// Exact resolution, then the case-insensitive fallback.
    pub fn lookup(&self, name: &str) -> Option<&CanonicalField> {
        self.resolve(name).or_else(|| self.resolve_ignoring_case(name))
    }

    /// A field by canonical ID.
    pub fn get(&self, canonical_id: &str) -> Option<&CanonicalField> {
        self.fields.get(canonical_id)
    }

    pub fn preferred_spelling(&self, canonical_id: &str, notation: Notation) -> Option<&str> {
        self.get(canonical_id).map(|f| f.spelling_for(notation))
    }

    /// `canonical_id` followed by each successor, ending at a field that is
    /// not superseded. A successor unknown to this set ends the chain after
    /// it is listed. Cycles stop at the first repeat.
    pub fn deprecation_chain(&self, canonical_id: &str) -> Vec<String> {
        let mut chain = vec![canonical_id.to_string()];
        let mut seen: HashSet<String> = HashSet::from([canonical_id.to_string()]);
        let mut current = self.get(canonical_id);
        while let Some(field) = current {
            let Some(next) = &field.deprecated_by else {
                break;
            };
            // Successors may be written as any spelling.
            let next_id = self
                .resolve(next)
                .map(|f| f.canonical_id.clone())
                .unwrap_or_else(|| next.clone());
            if !seen.insert(next_id.clone()) {
                warn!(field = %canonical_id, "Deprecation chain has a cycle");
                break;
            }
            chain.push(next_id.clone());
            current = self.get(&next_id);
        }
        chain
    }

    /// The last entry of the deprecation chain, if it is a known field.
    pub fn current_field(&self, canonical_id: &str) -> Option<&CanonicalField> {
        self.deprecation_chain(canonical_id)
            .last()
            .and_then(|id| self.get(id))
    }

    pub fn fields(&self) -> impl Iterator<Item = &CanonicalField> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The sources that make up this set, in precedence order.
    pub fn info(&self) -> &[SourceInfo] {
        &self.sources
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by the dialect readers
// ---------------------------------------------------------------------------

/// Every value given for `tag` in `block`, from a single field or a loop
/// column. Tags are matched case-insensitively.
pub(crate) fn tag_values<'a>(block: &'a Block, tag: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for entry in &block.entries {
        match entry {
            Entry::Field(field) if field.name.eq_ignore_ascii_case(tag) => {
                out.push(&field.value)
            }
            Entry::Loop(lp) => {
                if let Some(col) = lp.columns.iter().position(|c| c.name.eq_ignore_ascii_case(tag)) {
                    out.extend(lp.rows.iter().map(|row| &row[col].value));
                }
            }
            _ => {}
        }
    }
    out
}

/// The first non-placeholder value for `tag`, as text.
pub(crate) fn tag_text(block: &Block, tag: &str) -> Option<String> {
    tag_values(block, tag)
        .into_iter()
        .find(|v| !v.is_placeholder())
        .map(|v| v.text().trim().to_string())
}

/// Paired values from two columns of the loop declaring `key`. A single
/// field `key` pairs with a single field `other`.
pub(crate) fn tag_pairs<'a>(
    block: &'a Block,
    key: &str,
    other: &str,
) -> Vec<(&'a Value, Option<&'a Value>)> {
    for entry in &block.entries {
        if let Entry::Loop(lp) = entry {
            let find = |tag: &str| lp.columns.iter().position(|c| c.name.eq_ignore_ascii_case(tag));
            if let Some(k) = find(key) {
                let o = find(other);
                return lp
                    .rows
                    .iter()
                    .map(|row| (&row[k].value, o.map(|o| &row[o].value)))
                    .collect();
            }
        }
    }
    let other_value = tag_values(block, other).into_iter().next();
    tag_values(block, key)
        .into_iter()
        .map(|v| (v, other_value))
        .collect()
}

/// Title and version from the first block that declares them.
pub(crate) fn dictionary_metadata(
    document: &Document,
    title_tags: &[&str],
    version_tags: &[&str],
) -> (Option<String>, Option<String>) {
    let find = |tags: &[&str]| {
        document
            .scopes()
            .into_iter()
            .find_map(|block| tags.iter().find_map(|tag| tag_text(block, tag)))
    };
    (find(title_tags), find(version_tags))
}
