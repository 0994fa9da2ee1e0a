//! IUCr registered prefixes for locally defined data names.
//!
//! A name like `_shelx_res_file` belongs to the `shelx` prefix: the first
//! segment after the leading underscore. Names under a registered prefix are
//! legitimate even when no loaded dictionary defines them.

/// Registered prefixes, lowercase, with the body that holds each.
pub const REGISTERED_PREFIXES: &[(&str, &str)] = &[
    ("ccdc", "Cambridge Crystallographic Data Centre"),
    ("ccp4", "Collaborative Computational Project No. 4"),
    ("cod", "Crystallography Open Database"),
    ("crystals", "CRYSTALS refinement program"),
    ("gsas", "GSAS powder refinement suite"),
    ("iucr", "International Union of Crystallography"),
    ("jana", "JANA refinement program"),
    ("olex2", "Olex2 structure solution and refinement"),
    ("oxdiff", "Rigaku Oxford Diffraction CrysAlisPro"),
    ("platon", "PLATON structure validation"),
    ("rcsb", "Research Collaboratory for Structural Bioinformatics"),
    ("shelx", "SHELX crystallographic software suite"),
    ("topos", "TOPOS topological analysis"),
    ("vrf", "checkCIF validation response forms"),
];

/// The prefix segment of a field name: `_shelx_res_file` gives `shelx`,
/// `_olex2.refine` gives `olex2`. Single-segment names have none.
pub fn prefix_of(name: &str) -> Option<&str> {
    let name = name.trim_start_matches('_');
    let category = match name.split_once('.') {
        Some((category, _)) => category,
        None => name.split_once('_')?.0,
    };
    let prefix = category.split('_').next()?;
    (!prefix.is_empty()).then_some(prefix)
}

/// The registered prefix `name` uses, in lowercase, if any.
pub fn registered_prefix(name: &str) -> Option<&'static str> {
    let prefix = prefix_of(name)?;
    REGISTERED_PREFIXES
        .iter()
        .map(|(registered, _)| *registered)
        .find(|registered| registered.eq_ignore_ascii_case(prefix))
}

/// What a registered prefix stands for.
pub fn describe(prefix: &str) -> Option<&'static str> {
    REGISTERED_PREFIXES
        .iter()
        .find(|(registered, _)| registered.eq_ignore_ascii_case(prefix))
        .map(|(_, description)| *description)
}
