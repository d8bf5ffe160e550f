//! End-to-end tests driving the command handlers through parsed arguments.

use std::fs;

use clap::Parser;
use tempfile::TempDir;

use inigrid::cli::args::Cli;
use inigrid::cli::commands::execute_command;
use inigrid::domain::ParameterTree;
use inigrid::exitcode;
use inigrid::util::testing;

fn run(args: &[&str]) -> Result<(), inigrid::cli::CliError> {
    testing::init_test_setup();
    let cli = Cli::try_parse_from(args).expect("valid arguments");
    execute_command(&cli)
}

#[test]
fn given_structured_ini_when_construct_then_output_tree_records_grid() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let ini = temp.path().join("square.ini");
    let out = temp.path().join("square.out");
    fs::write(
        &ini,
        "backend = yasp:2\n[yaspgrid]\nextension = 1 1\ncells = 4 4\nrefinement = 2\n",
    )
    .unwrap();

    // Act
    run(&[
        "inigrid",
        "construct",
        ini.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ])
    .expect("construct");

    // Assert
    let recorded = ParameterTree::parse(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(recorded.get_str("grid.backend").unwrap(), "yasp:2");
    assert_eq!(recorded.get_str("grid.strategy").unwrap(), "structured");
    assert_eq!(recorded.get_str("grid.cells").unwrap(), "256");
    assert_eq!(recorded.get_str("grid.refinement").unwrap(), "2");
    assert_eq!(recorded.get_str("grid.dimension").unwrap(), "2");
}

#[test]
fn given_snapshot_flag_when_construct_then_restorable_snapshot_written() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let ini = temp.path().join("grid.ini");
    let snapshot = temp.path().join("grid.json");
    fs::write(&ini, "[yaspgrid]\nextension = 2 1\ncells = 2 1\n").unwrap();
    run(&[
        "inigrid",
        "construct",
        ini.to_str().unwrap(),
        "--backend",
        "yasp:2",
        "--output",
        temp.path().join("first.out").to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
    ])
    .expect("construct with snapshot");

    // Act
    let restore_ini = temp.path().join("restore.ini");
    fs::write(
        &restore_ini,
        format!("[yaspgrid]\nloadFromFile = {}\n", snapshot.display()),
    )
    .unwrap();
    let out = temp.path().join("restored.out");
    run(&[
        "inigrid",
        "construct",
        restore_ini.to_str().unwrap(),
        "--backend",
        "yasp:2",
        "--output",
        out.to_str().unwrap(),
    ])
    .expect("restore");

    // Assert
    let recorded = ParameterTree::parse(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(recorded.get_str("grid.strategy").unwrap(), "restore");
    assert_eq!(recorded.get_str("grid.cells").unwrap(), "2");
}

#[test]
fn given_alu_backend_when_construct_then_software_exit_code() {
    let temp = TempDir::new().unwrap();
    let ini = temp.path().join("alu.ini");
    fs::write(&ini, "[alugrid]\nupperright = 1 1\n").unwrap();

    let err = run(&[
        "inigrid",
        "construct",
        ini.to_str().unwrap(),
        "--backend",
        "alu:2",
        "--output",
        temp.path().join("alu.out").to_str().unwrap(),
    ])
    .unwrap_err();

    assert_eq!(err.exit_code(), exitcode::SOFTWARE);
    assert!(err.to_string().contains("not implemented"));
}

#[test]
fn given_missing_key_when_construct_then_config_exit_code_and_no_output() {
    let temp = TempDir::new().unwrap();
    let ini = temp.path().join("incomplete.ini");
    let out = temp.path().join("incomplete.out");
    fs::write(&ini, "[ug]\nelements = 2 2\n").unwrap();

    let err = run(&[
        "inigrid",
        "construct",
        ini.to_str().unwrap(),
        "--backend",
        "ug:2",
        "--output",
        out.to_str().unwrap(),
    ])
    .unwrap_err();

    assert_eq!(err.exit_code(), exitcode::CONFIG);
    assert!(err.to_string().contains("ug.upperright"));
    assert!(!out.exists());
}

#[test]
fn given_differing_trees_when_compare_then_mismatch_exit_code() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let actual = temp.path().join("actual.out");
    let reference = temp.path().join("reference.out");
    fs::write(&actual, "grid.cells = \"16\"\n").unwrap();
    fs::write(&reference, "grid.cells = \"17\"\n").unwrap();

    // Act
    let err = run(&[
        "inigrid",
        "compare",
        actual.to_str().unwrap(),
        reference.to_str().unwrap(),
    ])
    .unwrap_err();

    // Assert
    assert_eq!(err.exit_code(), exitcode::MISMATCH);
}

#[test]
fn given_tolerance_without_fuzzy_when_parsing_then_rejected() {
    let result = Cli::try_parse_from(["inigrid", "compare", "a", "b", "--relative", "0.1"]);

    assert!(result.is_err());
}
