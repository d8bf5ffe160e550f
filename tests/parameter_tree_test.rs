//! Integration tests for ParameterTree parsing and typed access.

use rstest::rstest;

use inigrid::domain::{ParamError, ParameterTree};

const HARNESS_INI: &str = r#"
# generated by the test harness
__name = poisson_yasp
__output_extension = out

[ yaspgrid ]
extension = 1.0 1.0     # unit square
cells = 4 4
periodic = 0 1
refinement = 2

[__CONVERGENCE_TEST]
NormType = L2
QuantityName = "mesh width"
"#;

#[test]
fn given_harness_ini_when_parsed_then_groups_and_meta_keys_available() {
    // Act
    let tree = ParameterTree::parse(HARNESS_INI).expect("parse");

    // Assert
    assert_eq!(tree.get_str("__name").unwrap(), "poisson_yasp");
    assert_eq!(tree.get::<Vec<f64>>("yaspgrid.extension").unwrap(), vec![1.0, 1.0]);
    assert_eq!(tree.get_vec::<usize>("yaspgrid.cells", 2).unwrap(), vec![4, 4]);
    assert_eq!(tree.get::<usize>("yaspgrid.refinement").unwrap(), 2);
    assert_eq!(
        tree.get_str("__CONVERGENCE_TEST.QuantityName").unwrap(),
        "mesh width"
    );
    assert!(tree.has_sub("yaspgrid"));
    assert_eq!(tree.sub("yaspgrid").get_str("cells").unwrap(), "4 4");
}

#[test]
fn given_missing_group_when_sub_then_empty_tree() {
    let tree = ParameterTree::parse(HARNESS_INI).unwrap();

    let ug = tree.sub("ug");

    assert!(ug.is_empty());
    assert!(matches!(ug.get_str("elements"), Err(ParamError::MissingKey { .. })));
}

#[rstest]
#[case("true", true)]
#[case("1", true)]
#[case("yes", true)]
#[case("false", false)]
#[case("0", false)]
#[case("off", false)]
fn given_boolean_spelling_when_read_then_parsed(#[case] raw: &str, #[case] expected: bool) {
    let tree = ParameterTree::parse(&format!("flag = {}\n", raw)).unwrap();

    assert_eq!(tree.get::<bool>("flag").unwrap(), expected);
}

#[test]
fn given_wrong_list_length_when_get_vec_then_invalid_value_names_expectation() {
    let tree = ParameterTree::parse("cells = 4 4 4\n").unwrap();

    let err = tree.get_vec::<usize>("cells", 2).unwrap_err();

    assert_eq!(
        err,
        ParamError::InvalidValue {
            key: "cells".to_string(),
            value: "4 4 4".to_string(),
            expected: "2 values".to_string(),
        }
    );
}

#[test]
fn given_later_assignment_when_parsed_then_last_value_wins() {
    let tree = ParameterTree::parse("[g]\nk = 1\n[g]\nk = 2\n").unwrap();

    assert_eq!(tree.get_str("g.k").unwrap(), "2");
}

#[test]
fn given_unterminated_group_header_when_parsed_then_syntax_error_with_line() {
    let err = ParameterTree::parse("a = 1\n[yaspgrid\n").unwrap_err();

    assert!(matches!(err, ParamError::Syntax { line: 2, .. }), "got {:?}", err);
}

#[test]
fn given_tree_when_reported_then_parse_reproduces_it() {
    // Arrange
    let tree = ParameterTree::parse(HARNESS_INI).unwrap();

    // Act
    let reparsed = ParameterTree::parse(&tree.report()).unwrap();

    // Assert
    assert_eq!(reparsed, tree);
    assert_eq!(reparsed.flatten().len(), 8);
}
