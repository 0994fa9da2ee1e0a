mod common;

use cif_engine::{Change, ChangeLog, TieBreak, resolve_aliases};

use common::{core, parse};

fn resolve(source: &str) -> (String, ChangeLog) {
    let (document, log) = resolve_aliases(&parse(source), &core()).expect("resolution failed");
    (document.serialize(), log)
}

fn resolution(log: &ChangeLog) -> (&str, &[String], TieBreak) {
    log.changes
        .iter()
        .find_map(|c| match c {
            Change::AliasResolved {
                kept,
                discarded,
                rule,
                ..
            } => Some((kept.as_str(), discarded.as_slice(), *rule)),
            _ => None,
        })
        .expect("no alias resolution recorded")
}

#[test]
fn dominant_notation_breaks_a_tie_between_real_values() {
    let (output, log) = resolve("data_test\n_diffrn_source_type 'x'\n_diffrn_source.make 'y'\n");
    assert_eq!(output, "data_test\n_diffrn_source.make 'y'\n");
    let (kept, discarded, rule) = resolution(&log);
    assert_eq!(kept, "_diffrn_source.make");
    assert_eq!(discarded, ["_diffrn_source_type"]);
    assert_eq!(rule, TieBreak::DominantNotation);
}

#[test]
fn same_line_alias_leaves_no_trailing_space() {
    let (output, _) = resolve("data_test\n_diffrn_source.make 'y' _diffrn_source_type 'x'\n");
    assert_eq!(output, "data_test\n_diffrn_source.make 'y'\n");
}

#[test]
fn only_non_default_value_survives() {
    let source = "\
data_test
_cell_volume 1234.5
_diffrn_radiation.probe neutron
_diffrn_radiation_probe x-ray
_exptl_crystal_colour red
";
    let (output, log) = resolve(source);
    assert_eq!(
        output,
        "\
data_test
_cell_volume 1234.5
_diffrn_radiation_probe neutron
_exptl_crystal_colour red
"
    );
    let (kept, _, rule) = resolution(&log);
    assert_eq!(kept, "_diffrn_radiation_probe");
    assert_eq!(rule, TieBreak::NonDefaultValue);
    assert!(log.changes.contains(&Change::Renamed {
        line: 3,
        from: "_diffrn_radiation.probe".into(),
        to: "_diffrn_radiation_probe".into(),
    }));
}

#[test]
fn placeholders_lose_to_real_values() {
    let (output, log) = resolve("data_t\n_cell_volume ?\n_cell.volume 99\n");
    assert_eq!(output, "data_t\n_cell.volume 99\n");
    assert_eq!(resolution(&log).2, TieBreak::NonDefaultValue);
}

#[test]
fn first_occurrence_when_nothing_else_decides() {
    let (output, log) = resolve("data_t\n_cell_volume 1\n_cell_volume 2\n");
    assert_eq!(output, "data_t\n_cell_volume 1\n");
    assert_eq!(resolution(&log).2, TieBreak::FirstOccurrence);
}

#[test]
fn k_spellings_leave_one_field() {
    let source = "\
data_t
_diffrn_source_make 'a'
_diffrn_source_type 'b'
_diffrn_source.make 'c'
_cell_volume 10
";
    let (output, log) = resolve(source);
    assert_eq!(output, "data_t\n_diffrn_source_make 'a'\n_cell_volume 10\n");
    let deleted = log
        .changes
        .iter()
        .filter(|c| matches!(c, Change::Deleted { .. }))
        .count();
    assert_eq!(deleted, 2);
    let (_, discarded, rule) = resolution(&log);
    assert_eq!(discarded, ["_diffrn_source_type", "_diffrn_source.make"]);
    assert_eq!(rule, TieBreak::DominantNotation);
}

#[test]
fn text_block_values_go_with_their_field() {
    let source = "\
data_t
_publ_section_references
;
Ref A
;
_publ_section.references
;
Ref B
;
_cell.volume 1
";
    let (output, _) = resolve(source);
    assert_eq!(output, "data_t\n_publ_section.references\n;\nRef B\n;\n_cell.volume 1\n");
}

#[test]
fn loop_columns_are_not_merged() {
    let source = "data_t\n_cell_volume 10\nloop_\n_cell.volume\n1\n2\n";
    let (output, log) = resolve(source);
    assert_eq!(output, source);
    assert!(log.changes.is_empty());
    assert_eq!(log.warnings.len(), 1);
    assert_eq!(log.warnings[0].line, Some(2));
    assert!(log.warnings[0].message.contains("not merged"));
}

#[test]
fn scopes_are_resolved_separately() {
    let source = "data_t\n_cell_volume 1\nsave_f\n_cell.volume 2\nsave_\n";
    let (output, log) = resolve(source);
    assert_eq!(output, source);
    assert!(log.is_empty());
}

#[test]
fn deprecated_field_joins_its_successor() {
    let source = "data_t\n_diffrn_old_temperature ?\n_diffrn_ambient_temperature 293\n";
    let (output, _) = resolve(source);
    assert_eq!(output, "data_t\n_diffrn_ambient_temperature 293\n");
}

#[test]
fn resolving_twice_changes_nothing() {
    let (once, _) = resolve("data_test\n_diffrn_source_type 'x'\n_diffrn_source.make 'y'\n");
    let (twice, log) = resolve(&once);
    assert_eq!(once, twice);
    assert!(log.changes.is_empty());
}
