mod common;

use cif::rules::parse_rules;
use cif_engine::rules::evaluator::{evaluate, format_number};
use cif_engine::{Change, DictionarySet, RuleEvaluationError, RuleRun, RuleStatus, apply_rules};

use common::{core, parse};

fn run(source: &str, rules: &str, dictionary: Option<&DictionarySet>) -> RuleRun {
    let rules = parse_rules(rules, 1).expect("rule parse failed");
    apply_rules(&parse(source), &rules, dictionary)
}

fn output(source: &str, rules: &str) -> String {
    let run = run(source, rules, None);
    assert!(run.succeeded(), "rule failed: {:?}", run.failure);
    run.document.serialize()
}

fn statuses(run: &RuleRun) -> Vec<RuleStatus> {
    run.outcomes.iter().map(|o| o.status.clone()).collect()
}

#[test]
fn append_builds_one_text_block() {
    let result = output(
        "data_test\n_journal_name_full 'Acta X'\n",
        "APPEND: _publ_section_references \"Ref A\"\nAPPEND: _publ_section_references \"Ref B\"\n",
    );
    assert_eq!(
        result,
        "data_test\n_journal_name_full 'Acta X'\n_publ_section_references\n;\nRef A\nRef B\n;\n"
    );
}

#[test]
fn append_to_an_inline_value_moves_it_into_a_text_block() {
    let result = output(
        "data_t\n_publ_section_references 'Ref A'\n",
        "APPEND: _publ_section_references 'Ref B'",
    );
    assert_eq!(result, "data_t\n_publ_section_references\n;\nRef A\nRef B\n;\n");
    assert!(parse(&result).first_data_block().is_some());

    let result = output("data_t\n_r\n   'Ref A'\n", "APPEND: _r 'Ref B'");
    assert_eq!(result, "data_t\n_r\n;\nRef A\nRef B\n;\n");
}

#[test]
fn calculate_uses_other_fields() {
    let source = "data_test\n_diffrn.flux_density 120.0\n_diffrn.total_exposure_time 2.0\n";
    let rules =
        "CALCULATE: _diffrn.flux_density = _diffrn.flux_density / (_diffrn.total_exposure_time * 60)";
    let run = run(source, rules, None);
    assert!(run.succeeded());
    assert_eq!(
        run.document.serialize(),
        "data_test\n_diffrn.flux_density 1.0\n_diffrn.total_exposure_time 2.0\n"
    );
    assert_eq!(
        statuses(&run),
        vec![RuleStatus::Calculated {
            value: "1.0".into()
        }]
    );
    assert_eq!(
        run.change_log.changes,
        vec![Change::Edited {
            line: 2,
            field: "_diffrn.flux_density".into(),
            old: "120.0".into(),
            new: "1.0".into(),
        }]
    );
}

#[test]
fn calculate_reads_standard_uncertainties_as_numbers() {
    let result = output("data_t\n_a 1.5(2)\n", "CALCULATE: _b = _a * 2");
    assert_eq!(result, "data_t\n_a 1.5(2)\n_b 3.0\n");
}

#[test]
fn rename_then_edit_sees_the_new_name() {
    let result = output(
        "data_t\n_symmetry_cell_setting monoclinic\n",
        "RENAME: _symmetry_cell_setting _space_group.crystal_system\n\
         EDIT: _space_group.crystal_system triclinic\n",
    );
    assert_eq!(result, "data_t\n_space_group.crystal_system triclinic\n");
}

#[test]
fn edit_keeps_the_value_shape() {
    let result = output(
        "data_t\n_a 'old value'\n_b\n;\nold text\n;\n",
        "EDIT: _a 'new value'\nEDIT: _b 'new text'",
    );
    assert_eq!(result, "data_t\n_a 'new value'\n_b\n;\nnew text\n;\n");
}

#[test]
fn edit_to_the_same_value_is_unchanged() {
    let run = run("data_t\n_a 5\n", "EDIT: _a 5", None);
    assert_eq!(statuses(&run), vec![RuleStatus::Unchanged]);
    assert!(run.change_log.changes.is_empty());
}

#[test]
fn edit_of_an_absent_field_creates_it() {
    let run = run("data_t\n_a 5\n", "EDIT: _b 'two words'", None);
    assert_eq!(run.document.serialize(), "data_t\n_a 5\n_b 'two words'\n");
    assert_eq!(
        statuses(&run),
        vec![RuleStatus::Created {
            value: "two words".into()
        }]
    );
}

#[test]
fn delete_removes_the_whole_line() {
    let run = run(
        "data_t\n_a 1\n_journal.date_recd_electronic 2020-01-01\n_b 2\n",
        "DELETE: _journal.date_recd_electronic\nDELETE: _not_here",
        None,
    );
    assert_eq!(run.document.serialize(), "data_t\n_a 1\n_b 2\n");
    assert_eq!(statuses(&run), vec![RuleStatus::Deleted, RuleStatus::Absent]);
}

#[test]
fn check_reports_without_editing() {
    let source = "data_t\n_a 5\n_b ?\nloop_\n_c\n1\n2\n";
    let run = run(source, "_a 5\n_b 7\n_z ?\nCHECK: _c 1\n", None);
    assert_eq!(run.document.serialize(), source);
    assert_eq!(
        statuses(&run),
        vec![
            RuleStatus::MatchesDefault,
            RuleStatus::Differs { value: "?".into() },
            RuleStatus::Missing,
            RuleStatus::InLoop,
        ]
    );
    assert_eq!(run.outcomes[2].line, 3);
    assert_eq!(run.outcomes[2].field, "_z");
}

#[test]
fn failure_stops_the_run() {
    let run = run(
        "data_t\n_a 1\n",
        "EDIT: _a x\nCALCULATE: _b = _missing * 2\nDELETE: _a\n",
        None,
    );
    assert!(!run.succeeded());
    // The document the failing rule started from.
    assert_eq!(run.document.serialize(), "data_t\n_a x\n");
    assert_eq!(run.outcomes.len(), 2);

    let failure = run.failure.expect("failure recorded");
    assert_eq!(failure.line, 2);
    assert_eq!(failure.field, "_b");
    assert_eq!(
        failure.error,
        RuleEvaluationError::MissingOperand {
            field: "_missing".into()
        }
    );
    assert!(failure.to_string().starts_with("rule on line 2 (CALCULATE: _b = _missing * 2) failed"));
}

#[test]
fn evaluation_errors() {
    let error = |source: &str, rules: &str| {
        run(source, rules, None)
            .failure
            .map(|f| f.error)
            .expect("expected a failure")
    };
    assert_eq!(
        error("data_t\n_a 0\n", "CALCULATE: _b = 1 / _a"),
        RuleEvaluationError::DivisionByZero
    );
    assert_eq!(
        error("data_t\n_a abc\n", "CALCULATE: _b = _a + 1"),
        RuleEvaluationError::NonNumeric {
            field: "_a".into(),
            value: "abc".into()
        }
    );
    assert_eq!(
        error("data_t\n_a ?\n", "CALCULATE: _b = _a + 1"),
        RuleEvaluationError::NonNumeric {
            field: "_a".into(),
            value: "?".into()
        }
    );
    assert_eq!(
        error("data_t\nloop_\n_c\n1\n2\n", "DELETE: _c"),
        RuleEvaluationError::LoopedField { field: "_c".into() }
    );
    assert_eq!(
        error("global_\n_a 1\n", "EDIT: _a 2"),
        RuleEvaluationError::NoTargetBlock
    );
}

#[test]
fn rules_apply_to_the_first_data_block_only() {
    let result = output("data_one\n_a 1\ndata_two\n_a 1\n", "EDIT: _a 2");
    assert_eq!(result, "data_one\n_a 2\ndata_two\n_a 1\n");
}

#[test]
fn dictionary_finds_other_spellings() {
    let dictionary = core();
    let with = run("data_t\n_cell_volume 100\n", "EDIT: _cell.volume 200", Some(&dictionary));
    assert_eq!(with.document.serialize(), "data_t\n_cell_volume 200\n");

    let without = run("data_t\n_cell_volume 100\n", "EDIT: _cell.volume 200", None);
    assert_eq!(
        without.document.serialize(),
        "data_t\n_cell_volume 100\n_cell.volume 200\n"
    );

    let calculated = run(
        "data_t\n_diffrn_flux_density 30\n_diffrn_total_exposure_time 0.5\n",
        "CALCULATE: _diffrn.flux_density = _diffrn.flux_density / (_diffrn.total_exposure_time * 60)",
        Some(&dictionary),
    );
    assert_eq!(
        calculated.document.serialize(),
        "data_t\n_diffrn_flux_density 1.0\n_diffrn_total_exposure_time 0.5\n"
    );
}

#[test]
fn rename_to_an_existing_name_warns() {
    let run = run("data_t\n_a 1\n_b 2\n", "RENAME: _a _b", None);
    assert_eq!(run.document.serialize(), "data_t\n_b 1\n_b 2\n");
    assert_eq!(run.change_log.warnings.len(), 1);
    assert!(run.change_log.warnings[0].message.contains("duplicates an existing field"));
}

#[test]
fn number_formatting() {
    assert_eq!(format_number(1.0), "1.0");
    assert_eq!(format_number(0.0125), "0.0125");
    assert_eq!(format_number(-3.5), "-3.5");
    assert_eq!(format_number(-0.0), "0.0");
    assert_eq!(format_number(1.0 / 3.0), "0.3333333333333333");
    assert_eq!(format_number(250.0), "250.0");
    assert_eq!(format_number(0.0001), "0.0001");
    assert_eq!(format_number(2.5e-5), "2.5e-5");
    assert_eq!(format_number(-1e21), "-1e21");
}

#[test]
fn calculate_keeps_tiny_and_huge_results() {
    let run = run("data_t\n_b 3e12\n", "CALCULATE: _a = 1 / _b", None);
    assert!(run.succeeded(), "{:?}", run.failure);
    let block = run.document.first_data_block().expect("data block");
    let a = block.field("_a").expect("_a created").value.as_number().expect("numeric");
    assert!((a * 3e12 - 1.0).abs() < 1e-12, "got {}", a);

    let result = output("data_t\n_b 1e20\n", "CALCULATE: _a = _b * 10");
    assert_eq!(result, "data_t\n_b 1e20\n_a 1e21\n");
}

#[test]
fn calculate_subtracts_without_spaces() {
    let result = output("data_t\n_b 5\n", "CALCULATE: _a = _b-1");
    assert_eq!(result, "data_t\n_b 5\n_a 4.0\n");
}

#[test]
fn overflowing_results_are_not_written() {
    let source = "data_t\n_b 1e308\n";
    let run = run(source, "CALCULATE: _a = _b * 10", None);
    assert_eq!(
        run.failure.map(|f| f.error),
        Some(RuleEvaluationError::NonFinite)
    );
    assert_eq!(run.document.serialize(), source);
}

#[test]
fn evaluate_with_custom_operands() {
    let expr = cif::rules::expression::parse_expression("_x * (2 + _y) - -1", 0, 0)
        .expect("expression parse failed");
    let operand = |name: &str| match name {
        "_x" => Ok(3.0),
        "_y" => Ok(4.0),
        other => Err(RuleEvaluationError::MissingOperand {
            field: other.to_string(),
        }),
    };
    assert_eq!(evaluate(&expr, &operand), Ok(19.0));
}
