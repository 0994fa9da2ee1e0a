mod common;

use cif_engine::prefixes::{prefix_of, registered_prefix};
use cif_engine::{IssueKind, validate};

use common::{core, parse};

fn report(source: &str) -> Vec<String> {
    validate(&parse(source), &core())
        .issues
        .iter()
        .map(|i| i.to_string())
        .collect()
}

#[test]
fn field_name_problems() {
    let source = "\
data_test
_diffrn_ambient_temperature 293.15
_diffrn.ambient_temperature 290
_diffrn_source_type 'sealed tube'
_diffrn_radiation_probe protons
_cell_volume large
_unknown_thing 1
_shelx_res_file 'TITL x'
";
    assert_eq!(
        report(source),
        vec![
            "line 3: _diffrn.ambient_temperature does not use the block's legacy notation",
            "line 4: _diffrn_source_type is deprecated; use _diffrn_source_make",
            "line 5: _diffrn_radiation_probe has value 'protons', which is not one of the allowed values",
            "line 6: _cell_volume has non-numeric value 'large'",
            "line 7: _unknown_thing is not defined in the loaded dictionaries",
            "line 8: _shelx_res_file uses the registered local prefix 'shelx' (SHELX crystallographic software suite)",
        ]
    );
}

#[test]
fn clean_documents_have_no_issues() {
    let validation = validate(
        &parse("data_t\n_cell.volume 1234.5(3)\n_diffrn_radiation.probe Neutron\n_diffrn.ambient_temperature ?\n"),
        &core(),
    );
    assert!(validation.is_clean(), "{:?}", validation.issues);
}

#[test]
fn deprecated_fields_name_their_successor() {
    let validation = validate(&parse("data_t\n_diffrn_old_temperature 290\n"), &core());
    assert_eq!(
        validation.issues[0].kind,
        IssueKind::Deprecated {
            replacement: Some("_diffrn_ambient_temperature".into())
        }
    );

    let validation = validate(&parse("data_t\n_symmetry_cell_setting monoclinic\n"), &core());
    assert_eq!(
        validation.issues[0].kind,
        IssueKind::Deprecated { replacement: None }
    );
}

#[test]
fn repeated_names_are_reported() {
    let validation = validate(&parse("data_t\n_cell.volume 1\n_cell.volume 2\n"), &core());
    assert_eq!(validation.issues.len(), 1);
    assert_eq!(validation.issues[0].line, 3);
    assert_eq!(validation.issues[0].kind, IssueKind::Duplicate { first_line: 2 });
}

#[test]
fn loop_values_are_checked() {
    let source = "data_t\nloop_\n_diffrn_radiation.probe\nx-ray\nmuon\n";
    let validation = validate(&parse(source), &core());
    assert_eq!(validation.issues.len(), 1);
    assert_eq!(validation.issues[0].line, 5);
    assert_eq!(
        validation.issues[0].kind,
        IssueKind::NotInEnumeration {
            value: "muon".into()
        }
    );
}

#[test]
fn issues_serialize_with_their_kind() {
    let validation = validate(&parse("data_t\n_unknown_thing 1\n"), &core());
    let json = serde_json::to_value(&validation).expect("serialize");
    assert_eq!(json["issues"][0]["issue"], "unknown");
    assert_eq!(json["issues"][0]["line"], 2);
    assert_eq!(json["issues"][0]["field"], "_unknown_thing");
}

#[test]
fn registered_local_prefixes_are_not_unknown() {
    let validation = validate(
        &parse("data_t\n_cell.volume 10\n_olex2.refine_details x\n_SHELX_hkl_file y\n_shelxfoo_x 1\n"),
        &core(),
    );
    let kinds: Vec<_> = validation.issues.iter().map(|i| i.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            IssueKind::LocalPrefix {
                prefix: "olex2".into()
            },
            IssueKind::NotationMismatch {
                expected: "modern".into()
            },
            IssueKind::LocalPrefix {
                prefix: "shelx".into()
            },
            IssueKind::NotationMismatch {
                expected: "modern".into()
            },
            IssueKind::Unknown,
        ]
    );
    assert!(!validation.is_clean());
    assert_eq!(validation.problems().count(), 3);

    let local_only = validate(&parse("data_t\n_cell.volume 10\n_olex2.refine_details x\n"), &core());
    assert_eq!(local_only.issues.len(), 1);
    assert!(local_only.is_clean());
}

#[test]
fn prefixes_are_the_first_name_segment() {
    assert_eq!(prefix_of("_shelx_res_file"), Some("shelx"));
    assert_eq!(prefix_of("_olex2.refine_details"), Some("olex2"));
    assert_eq!(prefix_of("_ccdc_geom.bond_type"), Some("ccdc"));
    assert_eq!(prefix_of("_cell_length_a"), Some("cell"));
    assert_eq!(prefix_of("_single"), None);
    assert_eq!(registered_prefix("_Olex2_thing"), Some("olex2"));
    assert_eq!(registered_prefix("_cell_length_a"), None);
}
