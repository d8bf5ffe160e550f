//! Integration tests for Settings layered loading.
//!
//! These tests run without a global config (temp directories only), so they
//! exercise the local `.inigrid.toml` layer on top of compiled defaults.

use std::fs;

use tempfile::TempDir;

use inigrid::application::ApplicationError;
use inigrid::config::{local_config_path, Settings};
use inigrid::domain::{BackendKind, BackendTag, CompareMode};

#[test]
fn given_no_local_config_when_load_then_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.output_extension, "out");
    assert!(settings.default_backend.is_none());
}

#[test]
fn given_local_config_when_load_then_specified_fields_override_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        r#"
output_extension = "txt"
default_backend = "ug:2"

[compare]
relative = 1e-4
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(dir.path())).expect("load settings");

    // Assert
    assert_eq!(settings.output_extension, "txt");
    assert_eq!(
        settings.default_backend_tag().unwrap(),
        Some(BackendTag::new(BackendKind::Ug, 2))
    );
    assert_eq!(settings.compare.relative, 1e-4);
    assert_eq!(settings.compare.absolute, 1.5e-7);

    let options = settings.compare.options(CompareMode::Fuzzy);
    assert_eq!(options.mode, CompareMode::Fuzzy);
    assert_eq!(options.relative, 1e-4);
    assert!(options.exclude.is_empty());
}

#[test]
fn given_malformed_local_config_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(local_config_path(dir.path()), "output_extension = [unclosed").unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }), "got {:?}", err);
}

#[test]
fn given_negative_tolerance_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(
        local_config_path(dir.path()),
        "[compare]\nabsolute = -1.0\n",
    )
    .unwrap();

    let err = Settings::load(Some(dir.path())).unwrap_err();

    assert!(err.to_string().contains("must not be negative"));
}

#[test]
fn given_template_when_parsed_then_yields_defaults() {
    let template = Settings::template();

    let parsed: Settings = toml::from_str(&template).expect("template is valid TOML");

    assert_eq!(parsed, Settings::default());
}
