use cif::rules::{BinaryOperator, Expr, Rule, parse_rules};

fn rules(source: &str) -> Vec<Rule> {
    parse_rules(source, 0)
        .expect("rule parse failed")
        .into_iter()
        .map(|l| l.rule)
        .collect()
}

fn one(source: &str) -> Rule {
    let mut all = rules(source);
    assert_eq!(all.len(), 1, "expected one rule from {:?}", source);
    all.remove(0)
}

fn error(source: &str) -> String {
    match parse_rules(source, 0) {
        Ok(r) => panic!("expected an error, got {:?}", r),
        Err(e) => e.message,
    }
}

#[test]
fn bare_line_is_a_check() {
    assert_eq!(
        one("_diffrn.ambient_temperature 293 # room temperature"),
        Rule::Check {
            field: "_diffrn.ambient_temperature".into(),
            expected: "293".into(),
            description: Some("room temperature".into()),
        }
    );
    assert_eq!(
        one("CHECK: _exptl_crystal.colour ?"),
        Rule::Check {
            field: "_exptl_crystal.colour".into(),
            expected: "?".into(),
            description: None,
        }
    );
}

#[test]
fn description_comment_lines_attach_to_checks() {
    let src = "# _cell.volume: unit cell volume in cubic angstroms\n_cell.volume ?\n";
    match one(src) {
        Rule::Check { description, .. } => {
            assert_eq!(description.as_deref(), Some("unit cell volume in cubic angstroms"))
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn blank_and_comment_lines_are_skipped() {
    let src = "\n# heading\n// note\n   \nDELETE: _a_b\n";
    let lines = parse_rules(src, 0).expect("rule parse failed");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].line, 5);
    assert_eq!(&src[lines[0].span.clone()], "DELETE: _a_b");
}

#[test]
fn directives() {
    let all = rules(
        "DELETE: _journal.date_recd_electronic\n\
         edit: _computing.structure_refinement 'SHELXL-2019'\n\
         RENAME: _symmetry_cell_setting _space_group.crystal_system\n\
         APPEND: _publ_section.references \"Ref A\"\n\
         APPEND: _publ_section.references '''it's \"quoted\"'''\n",
    );
    assert_eq!(
        all,
        vec![
            Rule::Delete {
                field: "_journal.date_recd_electronic".into()
            },
            Rule::Edit {
                field: "_computing.structure_refinement".into(),
                value: "SHELXL-2019".into()
            },
            Rule::Rename {
                from: "_symmetry_cell_setting".into(),
                to: "_space_group.crystal_system".into()
            },
            Rule::Append {
                field: "_publ_section.references".into(),
                text: "Ref A".into()
            },
            Rule::Append {
                field: "_publ_section.references".into(),
                text: "it's \"quoted\"".into()
            },
        ]
    );
}

#[test]
fn hash_inside_quotes_is_not_a_comment() {
    assert_eq!(
        one("EDIT: _a_b 'item #3' # why"),
        Rule::Edit {
            field: "_a_b".into(),
            value: "item #3".into()
        }
    );
}

#[test]
fn calculate_parses_with_precedence() {
    let rule = one(
        "CALCULATE: _diffrn.flux_density = _diffrn.flux_density / (_diffrn.total_exposure_time * 60)",
    );
    let Rule::Calculate { field, expression } = rule else {
        panic!("not a CALCULATE");
    };
    assert_eq!(field, "_diffrn.flux_density");
    assert_eq!(
        expression.fields(),
        vec!["_diffrn.flux_density", "_diffrn.total_exposure_time"]
    );
    match &expression {
        Expr::Binary { op, right, .. } => {
            assert_eq!(*op, BinaryOperator::Div);
            assert!(matches!(
                right.as_ref(),
                Expr::Binary {
                    op: BinaryOperator::Mul,
                    ..
                }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        expression.to_string(),
        "_diffrn.flux_density / (_diffrn.total_exposure_time * 60)"
    );
}

#[test]
fn calculate_operator_shapes() {
    let expr = |src: &str| match one(&format!("CALCULATE: _x = {}", src)) {
        Rule::Calculate { expression, .. } => expression.to_string(),
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(expr("1 + 2 * 3"), "1 + 2 * 3");
    assert_eq!(expr("(1 + 2) * 3"), "(1 + 2) * 3");
    assert_eq!(expr("1 - (2 - 3)"), "1 - (2 - 3)");
    assert_eq!(expr("1 - 2 - 3"), "1 - 2 - 3");
    assert_eq!(expr("-_a_b + 2.5e1"), "-_a_b + 25");
    assert_eq!(expr("_refine_ls_R_factor_all*100"), "_refine_ls_R_factor_all * 100");
    assert_eq!(expr("_a-_b"), "_a - _b");
    assert_eq!(expr("_b-1"), "_b - 1");
    assert_eq!(expr("_cell.length_a-_cell.length_b"), "_cell.length_a - _cell.length_b");
}

#[test]
fn calculate_without_spaces_around_equals() {
    match one("CALCULATE: _x=_y*2") {
        Rule::Calculate { field, expression } => {
            assert_eq!(field, "_x");
            assert_eq!(expression.to_string(), "_y * 2");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn malformed_rules() {
    assert!(error("_cell.volume").contains("no expected value"));
    assert!(error("DELETE: _a _b").contains("only a field name"));
    assert!(error("EDIT: _a").contains("has no value"));
    assert!(error("RENAME: _a").contains("expected a field name"));
    assert!(error("RENAME: _a _b _c").contains("exactly two"));
    assert!(error("CALCULATE: _a 1 + 2").contains("missing `=`"));
    assert!(error("CALCULATE: _a = ").contains("empty expression"));
    assert!(error("CALCULATE: _a = (1 + 2").contains("unclosed parenthesis"));
    assert!(error("CALCULATE: _a = 1 + 2)").contains("after expression"));
    assert!(error("CALCULATE: _a = 2 $ 3").contains("unexpected character"));
    assert!(error("APPEND: _a").contains("no text"));
    assert!(error("MOVE: _a _b").contains("unknown directive"));
    assert!(error("just some words").contains("expected a field name or a directive"));
}

#[test]
fn error_spans_point_into_the_source() {
    let src = "DELETE: _a\nCALCULATE: _b = _c $ 2\n";
    let err = parse_rules(src, 7).unwrap_err();
    assert_eq!(err.file_id, 7);
    assert_eq!(&src[err.span.clone()], "$");
}

#[test]
fn rule_display_round_trips_through_the_parser() {
    let src = "DELETE: _a_b\nRENAME: _a_b _a.b\nCALCULATE: _c = (_d + 1) / 2";
    for rule in rules(src) {
        assert_eq!(one(&rule.to_string()), rule);
    }
}
