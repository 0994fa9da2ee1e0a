mod common;

use cif::Notation;
use cif_engine::{Change, ChangeLog, convert};

use common::{core, legacy, parse};

fn to(source: &str, target: Notation) -> (String, ChangeLog) {
    let (document, log) = convert(&parse(source), &core(), target).expect("conversion failed");
    (document.serialize(), log)
}

fn warnings(log: &ChangeLog) -> Vec<String> {
    log.warnings.iter().map(|w| w.to_string()).collect()
}

#[test]
fn text_block_contents_are_never_renamed() {
    let source = "\
data_test
_diffrn_ambient_temperature 293.15
_publ_section_references
;
Smith, A. reports _diffrn_ambient_temperature in the supplement.
;
";
    let (output, log) = to(source, Notation::Modern);
    assert_eq!(
        output,
        "\
#\\#CIF_2.0
data_test
_diffrn.ambient_temperature 293.15
_publ_section.references
;
Smith, A. reports _diffrn_ambient_temperature in the supplement.
;
"
    );
    assert!(log.warnings.is_empty(), "{:?}", warnings(&log));
    assert_eq!(
        log.changes,
        vec![
            Change::Renamed {
                line: 2,
                from: "_diffrn_ambient_temperature".into(),
                to: "_diffrn.ambient_temperature".into(),
            },
            Change::Renamed {
                line: 3,
                from: "_publ_section_references".into(),
                to: "_publ_section.references".into(),
            },
            Change::MarkerInserted {
                marker: "#\\#CIF_2.0".into(),
            },
        ]
    );
}

#[test]
fn comments_and_values_are_copied_verbatim() {
    let source = "\
data_test
# _cell_volume is refined below
_cell_volume   1234.5(3)   # _cell_volume again
_diffrn_source_make '_cell_volume'
";
    let (output, _) = to(source, Notation::Modern);
    assert_eq!(
        output,
        "\
#\\#CIF_2.0
data_test
# _cell_volume is refined below
_cell.volume   1234.5(3)   # _cell_volume again
_diffrn_source.make '_cell_volume'
"
    );
}

#[test]
fn to_legacy_renames_loop_columns_and_replaces_the_marker() {
    let source = "\
#\\#CIF_2.0
data_test
_diffrn.ambient_temperature 293.15
loop_
  _diffrn_radiation.probe
  x-ray
  neutron
";
    let (output, log) = to(source, Notation::Legacy);
    assert_eq!(
        output,
        "\
#\\#CIF_1.1
data_test
_diffrn_ambient_temperature 293.15
loop_
  _diffrn_radiation_probe
  x-ray
  neutron
"
    );
    assert!(log.changes.contains(&Change::MarkerReplaced {
        from: "#\\#CIF_2.0".into(),
        to: "#\\#CIF_1.1".into(),
    }));
}

#[test]
fn existing_modern_marker_is_kept() {
    let source = "#\\#CIF_2.0\ndata_t\n_cell.volume 10\n";
    let (output, log) = to(source, Notation::Modern);
    assert_eq!(output, source);
    assert!(log.changes.is_empty());
}

#[test]
fn legacy_marker_becomes_modern() {
    let (output, _) = to("#\\#CIF_1.1\ndata_t\n_cell_volume 10\n", Notation::Modern);
    assert_eq!(output, "#\\#CIF_2.0\ndata_t\n_cell.volume 10\n");
}

#[test]
fn inserted_marker_follows_a_byte_order_mark() {
    let (output, _) = to("\u{feff}data_t\n_cell_volume 10\n", Notation::Modern);
    assert_eq!(output, "\u{feff}#\\#CIF_2.0\ndata_t\n_cell.volume 10\n");
}

#[test]
fn legacy_output_without_a_marker_gets_none() {
    let (output, _) = to("data_t\n_cell.volume 10\n", Notation::Legacy);
    assert_eq!(output, "data_t\n_cell_volume 10\n");
}

#[test]
fn deprecated_fields_follow_their_chain() {
    let (output, log) = to("data_t\n_diffrn_old_temperature 290\n", Notation::Modern);
    assert_eq!(output, "#\\#CIF_2.0\ndata_t\n_diffrn.ambient_temperature 290\n");
    assert!(log.warnings.is_empty());
}

#[test]
fn deprecated_alias_becomes_the_current_spelling() {
    let (output, _) = to("data_t\n_diffrn_source_type 'sealed tube'\n", Notation::Legacy);
    assert_eq!(output, "data_t\n_diffrn_source_make 'sealed tube'\n");
}

#[test]
fn retired_fields_warn() {
    let (output, log) = to("data_t\n_symmetry_cell_setting monoclinic\n", Notation::Legacy);
    assert_eq!(output, "data_t\n_symmetry_cell_setting monoclinic\n");
    assert_eq!(
        warnings(&log),
        vec!["line 2: _symmetry_cell_setting is deprecated and has no replacement"]
    );
}

#[test]
fn unmapped_fields_are_left_alone() {
    let (output, log) = to("data_t\n_my_local_field 1\n", Notation::Modern);
    assert_eq!(output, "#\\#CIF_2.0\ndata_t\n_my_local_field 1\n");
    assert_eq!(log.warnings.len(), 1);
    assert_eq!(log.warnings[0].line, Some(2));
    assert_eq!(log.warnings[0].field.as_deref(), Some("_my_local_field"));
    assert_eq!(log.warnings[0].message, "no mapping for _my_local_field");
}

#[test]
fn case_insensitive_names_still_convert() {
    let (output, _) = to("data_t\n_CELL_VOLUME 10\n", Notation::Modern);
    assert_eq!(output, "#\\#CIF_2.0\ndata_t\n_cell.volume 10\n");
}

#[test]
fn missing_target_spelling_warns() {
    let (document, log) = convert(
        &parse("data_t\n_exptl_crystal_colour red\n"),
        &legacy(),
        Notation::Modern,
    )
    .expect("conversion failed");
    assert_eq!(document.serialize(), "#\\#CIF_2.0\ndata_t\n_exptl_crystal_colour red\n");
    assert_eq!(
        warnings(&log),
        vec!["line 2: _exptl_crystal_colour has no modern spelling"]
    );
}

#[test]
fn colliding_spellings_are_reported() {
    let (output, log) = to("data_t\n_cell_volume 10\n_cell.volume 10\n", Notation::Modern);
    assert_eq!(output, "#\\#CIF_2.0\ndata_t\n_cell.volume 10\n_cell.volume 10\n");
    assert_eq!(log.warnings.len(), 1);
    assert!(log.warnings[0].message.contains("appears 2 times in data_t"));
}

#[test]
fn save_frames_convert_too() {
    let source = "data_t\n_cell_volume 10\nsave_frame\n_diffrn_radiation_probe neutron\nsave_\n";
    let (output, _) = to(source, Notation::Modern);
    assert_eq!(
        output,
        "#\\#CIF_2.0\ndata_t\n_cell.volume 10\nsave_frame\n_diffrn_radiation.probe neutron\nsave_\n"
    );
}

#[test]
fn input_document_is_unchanged() {
    let document = parse("data_t\n_cell_volume 10\n");
    let before = document.source().to_string();
    let _ = convert(&document, &core(), Notation::Modern).expect("conversion failed");
    assert_eq!(document.source(), before);
}
