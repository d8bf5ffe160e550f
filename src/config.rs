//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/inigrid/inigrid.toml`
//! 3. Local config: `<ini_dir>/.inigrid.toml` (next to the parameter file)
//! 4. Environment variables: `INIGRID_*` prefix, `__` separating sections

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{BackendTag, CompareMode, CompareOptions};

/// Default tolerances for output tree comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompareSettings {
    pub relative: f64,
    pub absolute: f64,
    /// Magnitudes below this are treated as zero
    pub zero_threshold: f64,
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            relative: 1e-2,
            absolute: 1.5e-7,
            zero_threshold: 0.0,
        }
    }
}

impl CompareSettings {
    /// Comparison options seeded from these tolerances.
    pub fn options(&self, mode: CompareMode) -> CompareOptions {
        CompareOptions {
            mode,
            relative: self.relative,
            absolute: self.absolute,
            zero_threshold: self.zero_threshold,
            exclude: Vec::new(),
        }
    }
}

/// Raw compare settings for intermediate parsing (`None` → not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCompareSettings {
    pub relative: Option<f64>,
    pub absolute: Option<f64>,
    pub zero_threshold: Option<f64>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub output_extension: Option<String>,
    pub default_backend: Option<String>,
    pub compare: RawCompareSettings,
}

/// Unified configuration for inigrid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Extension of output trees when the parameters name none (default: "out")
    pub output_extension: String,
    /// Backend tag used when neither the command line nor the ini selects one
    pub default_backend: Option<String>,
    pub compare: CompareSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_extension: "out".to_string(),
            default_backend: None,
            compare: CompareSettings::default(),
        }
    }
}

/// Get the XDG config directory for inigrid.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "inigrid").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("inigrid.toml"))
}

/// Get the path to the local config file next to a parameter file.
pub fn local_config_path(ini_dir: &Path) -> PathBuf {
    ini_dir.join(".inigrid.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay config onto self: every specified field wins.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            output_extension: overlay
                .output_extension
                .clone()
                .unwrap_or_else(|| self.output_extension.clone()),
            default_backend: overlay
                .default_backend
                .clone()
                .or_else(|| self.default_backend.clone()),
            compare: CompareSettings {
                relative: overlay.compare.relative.unwrap_or(self.compare.relative),
                absolute: overlay.compare.absolute.unwrap_or(self.compare.absolute),
                zero_threshold: overlay
                    .compare
                    .zero_threshold
                    .unwrap_or(self.compare.zero_threshold),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `ini_dir` - Optional directory of the parameter file for local config
    pub fn load(ini_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(dir) = ini_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply INIGRID_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("INIGRID")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("output_extension") {
            settings.output_extension = val;
        }
        if let Ok(val) = config.get_string("default_backend") {
            settings.default_backend = Some(val);
        }
        if let Ok(val) = config.get_float("compare.relative") {
            settings.compare.relative = val;
        }
        if let Ok(val) = config.get_float("compare.absolute") {
            settings.compare.absolute = val;
        }
        if let Ok(val) = config.get_float("compare.zero_threshold") {
            settings.compare.zero_threshold = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.output_extension.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "output_extension must not be empty".to_string(),
            });
        }
        let c = &self.compare;
        if c.relative < 0.0 || c.absolute < 0.0 || c.zero_threshold < 0.0 {
            return Err(ApplicationError::Config {
                message: "compare tolerances must not be negative".to_string(),
            });
        }
        self.default_backend_tag()?;
        Ok(())
    }

    /// Parsed `default_backend`, if set.
    pub fn default_backend_tag(&self) -> Result<Option<BackendTag>, ApplicationError> {
        self.default_backend
            .as_deref()
            .map(|s| {
                s.parse::<BackendTag>().map_err(|e| ApplicationError::Config {
                    message: format!("default_backend: {}", e),
                })
            })
            .transpose()
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# inigrid configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/inigrid/inigrid.toml
#   Local:  .inigrid.toml next to the parameter file
#   Env:    INIGRID_* environment variables, e.g. INIGRID_COMPARE__RELATIVE=1e-3

# Extension of output trees when the parameters do not set __output_extension
# output_extension = "out"

# Backend used when neither --backend nor the parameter file selects one
# default_backend = "yasp:2"

[compare]
# relative = 1e-2
# absolute = 1.5e-7
# zero_threshold = 0.0
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BackendKind;

    #[test]
    fn given_defaults_when_created_then_match_harness_tolerances() {
        let settings = Settings::default();
        assert_eq!(settings.output_extension, "out");
        assert_eq!(settings.compare.relative, 1e-2);
        assert_eq!(settings.compare.absolute, 1.5e-7);
        assert!(settings.default_backend.is_none());
    }

    #[test]
    fn given_partial_overlay_when_merging_then_only_specified_fields_change() {
        let base = Settings::default();
        let overlay = RawSettings {
            output_extension: None,
            default_backend: Some("ug:3".to_string()),
            compare: RawCompareSettings {
                relative: Some(1e-4),
                ..RawCompareSettings::default()
            },
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.output_extension, "out");
        assert_eq!(merged.compare.relative, 1e-4);
        assert_eq!(merged.compare.absolute, 1.5e-7);
        assert_eq!(
            merged.default_backend_tag().unwrap(),
            Some(BackendTag::new(BackendKind::Ug, 3))
        );
    }

    #[test]
    fn given_bad_default_backend_when_validating_then_config_error() {
        let settings = Settings {
            default_backend: Some("yasp".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_settings_when_to_toml_then_round_trips() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
