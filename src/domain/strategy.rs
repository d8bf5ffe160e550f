//! Construction strategies and their presence checks
//!
//! A backend lists the strategies it supports in priority order. Each one is
//! probed with explicit key checks: a strategy whose keys are absent is
//! `NotApplicable`; a strategy whose keys are present but unusable is
//! `Failed` and stops the search.

use std::path::{Path, PathBuf};

use crate::domain::error::ConstructionError;
use crate::domain::grid::ElementShape;
use crate::domain::parameter_tree::ParameterTree;
use crate::domain::tag::BackendTag;

/// Keys requesting a snapshot restore, first match wins.
pub const SNAPSHOT_KEYS: [&str; 2] = ["loadFromFile", "restoreSnapshot"];

/// Keys requesting an import from an external mesh file.
pub const IMPORT_KEYS: [&str; 2] = ["importFile", "gmshFile"];

/// Format selector for imports.
pub const IMPORT_FORMAT_KEY: &str = "importFormat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    RestoreFromSnapshot,
    ImportFromFile,
    BuildStructured,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RestoreFromSnapshot => "restore",
            Self::ImportFromFile => "import",
            Self::BuildStructured => "structured",
        }
    }
}

/// External mesh formats understood by the import strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Gmsh,
}

impl ImportFormat {
    pub const NAMES: [&'static str; 1] = ["gmsh"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "gmsh" => Some(Self::Gmsh),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "msh" => Some(Self::Gmsh),
            _ => None,
        }
    }
}

/// Geometric extent of a structured domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainBounds {
    /// Box from the origin to the given upper-right corner
    Extension(Vec<f64>),
    /// Axis-aligned box between two corners
    Box { lower: Vec<f64>, upper: Vec<f64> },
    /// Monotone node coordinates per axis
    Coordinates(Vec<Vec<f64>>),
}

impl DomainBounds {
    pub fn dim(&self) -> usize {
        match self {
            Self::Extension(upper) => upper.len(),
            Self::Box { lower, .. } => lower.len(),
            Self::Coordinates(axes) => axes.len(),
        }
    }
}

/// Parameters of a structured build.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredParams {
    pub bounds: DomainBounds,
    pub cells: Vec<usize>,
    pub periodic: Vec<bool>,
    pub overlap: usize,
    /// Processes per axis; `None` selects the default layout
    pub partitioning: Option<Vec<usize>>,
    pub element_shape: Option<ElementShape>,
}

impl StructuredParams {
    pub fn new(bounds: DomainBounds, cells: Vec<usize>) -> Self {
        let dim = cells.len();
        Self {
            bounds,
            cells,
            periodic: vec![false; dim],
            overlap: 1,
            partitioning: None,
            element_shape: None,
        }
    }
}

/// One way of obtaining a grid.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructionStrategy {
    RestoreFromSnapshot { key: String, path: PathBuf },
    ImportFromFile {
        key: String,
        path: PathBuf,
        format: ImportFormat,
    },
    BuildStructured(StructuredParams),
}

impl ConstructionStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::RestoreFromSnapshot { .. } => StrategyKind::RestoreFromSnapshot,
            Self::ImportFromFile { .. } => StrategyKind::ImportFromFile,
            Self::BuildStructured(_) => StrategyKind::BuildStructured,
        }
    }
}

/// Result of probing one strategy.
#[derive(Debug)]
pub enum StrategyOutcome {
    Applicable(ConstructionStrategy),
    NotApplicable,
    Failed(ConstructionError),
}

impl StrategyOutcome {
    /// A strategy whose keys are present: applicable unless reading them failed.
    pub fn from_result(result: Result<ConstructionStrategy, ConstructionError>) -> Self {
        match result {
            Ok(strategy) => Self::Applicable(strategy),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Expand `~`, `$VAR` and `${VAR}` in a configured path.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Snapshot restore applies when one of [`SNAPSHOT_KEYS`] is present.
pub fn probe_snapshot(tag: BackendTag, group: &ParameterTree) -> StrategyOutcome {
    let Some(key) = SNAPSHOT_KEYS.iter().find(|k| group.has_key(k)) else {
        return StrategyOutcome::NotApplicable;
    };
    match group.get_str(key) {
        Ok(raw) if !raw.trim().is_empty() => StrategyOutcome::Applicable(
            ConstructionStrategy::RestoreFromSnapshot {
                key: tag.qualify(key),
                path: PathBuf::from(expand_env_vars(raw.trim())),
            },
        ),
        _ => StrategyOutcome::Failed(ConstructionError::BackendIo {
            tag,
            key: tag.qualify(key),
            path: PathBuf::new(),
            message: "empty snapshot path".to_string(),
        }),
    }
}

/// Import applies when one of [`IMPORT_KEYS`] is present. The format comes
/// from [`IMPORT_FORMAT_KEY`] or, failing that, the file extension.
pub fn probe_import(tag: BackendTag, group: &ParameterTree) -> StrategyOutcome {
    let Some(key) = IMPORT_KEYS.iter().find(|k| group.has_key(k)) else {
        return StrategyOutcome::NotApplicable;
    };
    let raw = group.get_str(key).unwrap_or_default().trim();
    if raw.is_empty() {
        return StrategyOutcome::Failed(ConstructionError::BackendIo {
            tag,
            key: tag.qualify(key),
            path: PathBuf::new(),
            message: "empty import path".to_string(),
        });
    }
    let path = PathBuf::from(expand_env_vars(raw));

    let format = if group.has_key(IMPORT_FORMAT_KEY) {
        let name = group.get_str(IMPORT_FORMAT_KEY).unwrap_or_default();
        match ImportFormat::from_name(name) {
            Some(format) => format,
            None => {
                return StrategyOutcome::Failed(ConstructionError::InvalidEnumValue {
                    tag,
                    key: tag.qualify(IMPORT_FORMAT_KEY),
                    value: name.to_string(),
                    allowed: ImportFormat::NAMES.join(", "),
                })
            }
        }
    } else if *key == "gmshFile" {
        ImportFormat::Gmsh
    } else {
        match ImportFormat::from_extension(&path) {
            Some(format) => format,
            None => {
                return StrategyOutcome::Failed(ConstructionError::BackendIo {
                    tag,
                    key: tag.qualify(key),
                    path,
                    message: format!(
                        "cannot infer the import format, set '{}'",
                        tag.qualify(IMPORT_FORMAT_KEY)
                    ),
                })
            }
        }
    };

    StrategyOutcome::Applicable(ConstructionStrategy::ImportFromFile {
        key: tag.qualify(key),
        path,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tag::BackendKind;

    fn ug() -> BackendTag {
        BackendTag::new(BackendKind::Ug, 2)
    }

    #[test]
    fn test_probe_snapshot_not_applicable_without_key() {
        let group = ParameterTree::parse("cells = 2 2\n").unwrap();
        assert!(matches!(
            probe_snapshot(ug(), &group),
            StrategyOutcome::NotApplicable
        ));
    }

    #[test]
    fn test_probe_import_infers_gmsh_from_extension() {
        let group = ParameterTree::parse("importFile = mesh.msh\n").unwrap();
        match probe_import(ug(), &group) {
            StrategyOutcome::Applicable(ConstructionStrategy::ImportFromFile {
                key,
                path,
                format,
            }) => {
                assert_eq!(key, "ug.importFile");
                assert_eq!(path, PathBuf::from("mesh.msh"));
                assert_eq!(format, ImportFormat::Gmsh);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_probe_import_unknown_format_fails_instead_of_falling_through() {
        let group = ParameterTree::parse("importFile = mesh.msh\nimportFormat = vtk\n").unwrap();
        assert!(matches!(
            probe_import(ug(), &group),
            StrategyOutcome::Failed(ConstructionError::InvalidEnumValue { .. })
        ));
    }
}
