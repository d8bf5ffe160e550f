//! Structured grid builder (`yasp`, `yasp-offset`, `yasp-tensor`)
//!
//! Keys live in the `yaspgrid` group. A snapshot key wins over everything
//! else and the restored grid is returned as stored; otherwise the domain is
//! built from bounds and cell counts, then the overlap policy and the global
//! refinement count are applied.

use tracing::{debug, info};

use super::{
    get_or, get_vec, get_vec_or, param_error, periodic_flags, read_source, refinement_rejected,
    rejected, BackendBuilder,
};
use crate::domain::grid::snapshot;
use crate::domain::strategy::{self, DomainBounds, StructuredParams};
use crate::domain::{
    BackendKind, BackendTag, ConstructionError, ConstructionResult, ConstructionStrategy, Grid,
    ParameterTree, StrategyKind, StrategyOutcome, StructuredGrid,
};
use crate::infrastructure::traits::FileSystem;

const STRATEGIES: &[StrategyKind] = &[
    StrategyKind::RestoreFromSnapshot,
    StrategyKind::BuildStructured,
];

/// Axis names of the `coordinates` subgroup.
const AXES: [&str; 3] = ["x", "y", "z"];

pub struct YaspBuilder {
    tag: BackendTag,
}

impl YaspBuilder {
    /// Builder for one of the structured kinds.
    pub fn new(tag: BackendTag) -> Self {
        debug_assert!(matches!(
            tag.kind,
            BackendKind::Yasp | BackendKind::YaspOffset | BackendKind::YaspTensor
        ));
        Self { tag }
    }

    fn structured_params(&self, group: &ParameterTree) -> ConstructionResult<StructuredParams> {
        let tag = self.tag;
        let (bounds, cells) = match tag.kind {
            BackendKind::YaspTensor if group.has_sub("coordinates") => {
                let axes = self.coordinate_axes(group)?;
                let cells = axes.iter().map(|a| a.len().saturating_sub(1)).collect();
                (DomainBounds::Coordinates(axes), cells)
            }
            BackendKind::YaspOffset | BackendKind::YaspTensor => {
                let lower = if group.has_key("lowerleft") {
                    get_vec(tag, group, "lowerleft")?
                } else {
                    get_vec_or(tag, group, "origin", 0.0)?
                };
                let upper = get_vec(tag, group, "upperright")?;
                let cells = get_vec(tag, group, "cells")?;
                (DomainBounds::Box { lower, upper }, cells)
            }
            _ => {
                let upper = get_vec(tag, group, "extension")?;
                let cells = get_vec(tag, group, "cells")?;
                (DomainBounds::Extension(upper), cells)
            }
        };

        let mut params = StructuredParams::new(bounds, cells);
        params.periodic = periodic_flags(tag, group)?;
        params.overlap = get_or(tag, group, "overlap", 1usize)?;
        if group.has_key("partitioning") {
            params.partitioning = Some(get_vec(tag, group, "partitioning")?);
        }
        Ok(params)
    }

    fn coordinate_axes(&self, group: &ParameterTree) -> ConstructionResult<Vec<Vec<f64>>> {
        let tag = self.tag;
        (0..tag.dim)
            .map(|axis| {
                let name = AXES.get(axis).ok_or_else(|| ConstructionError::InvalidParameter {
                    tag,
                    key: tag.qualify("coordinates"),
                    message: format!("no axis name for dimension {}", axis + 1),
                })?;
                group
                    .get::<Vec<f64>>(&format!("coordinates.{}", name))
                    .map_err(|e| param_error(tag, e))
            })
            .collect()
    }

    fn restore(
        &self,
        key: &str,
        path: &std::path::Path,
        fs: &dyn FileSystem,
    ) -> ConstructionResult<StructuredGrid> {
        let tag = self.tag;
        let io_error = |message: String| ConstructionError::BackendIo {
            tag,
            key: key.to_string(),
            path: path.to_path_buf(),
            message,
        };

        let content = read_source(fs, tag, key, path)?;
        let grid = snapshot::decode(&content).map_err(|e| io_error(e.to_string()))?;
        if grid.backend() != tag {
            return Err(io_error(format!(
                "snapshot holds a {} grid",
                grid.backend()
            )));
        }
        info!(
            "restored {} from {} (level {})",
            tag,
            path.display(),
            grid.refinement_level()
        );
        Ok(grid)
    }
}

impl BackendBuilder for YaspBuilder {
    fn tag(&self) -> BackendTag {
        self.tag
    }

    fn strategies(&self) -> &'static [StrategyKind] {
        STRATEGIES
    }

    fn probe(&self, kind: StrategyKind, group: &ParameterTree) -> StrategyOutcome {
        match kind {
            StrategyKind::RestoreFromSnapshot => strategy::probe_snapshot(self.tag, group),
            StrategyKind::BuildStructured => StrategyOutcome::from_result(
                self.structured_params(group)
                    .map(ConstructionStrategy::BuildStructured),
            ),
            StrategyKind::ImportFromFile => StrategyOutcome::NotApplicable,
        }
    }

    fn build(
        &self,
        strategy: &ConstructionStrategy,
        group: &ParameterTree,
        fs: &dyn FileSystem,
    ) -> ConstructionResult<Box<dyn Grid>> {
        let tag = self.tag;
        match strategy {
            ConstructionStrategy::RestoreFromSnapshot { key, path } => {
                Ok(Box::new(self.restore(key, path, fs)?))
            }
            ConstructionStrategy::BuildStructured(params) => {
                let mut grid = StructuredGrid::new(tag, params).map_err(|e| rejected(tag, e))?;

                let keep_overlap = get_or(tag, group, "keepPhysicalOverlap", true)?;
                let refinement = get_or(tag, group, "refinement", 0usize)?;
                grid.refine_options(keep_overlap);
                grid.global_refine(refinement)
                    .map_err(|e| refinement_rejected(tag, e))?;
                debug!(
                    "{}: {} cells after {} refinement(s)",
                    tag,
                    grid.cell_count(),
                    refinement
                );
                Ok(Box::new(grid))
            }
            ConstructionStrategy::ImportFromFile { key, .. } => {
                Err(ConstructionError::InvalidParameter {
                    tag,
                    key: key.clone(),
                    message: "structured grids cannot be imported".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_structured(kind: BackendKind, dim: usize, ini: &str) -> StrategyOutcome {
        let builder = YaspBuilder::new(BackendTag::new(kind, dim));
        let group = ParameterTree::parse(ini).unwrap();
        builder.probe(StrategyKind::BuildStructured, &group)
    }

    #[test]
    fn test_offset_defaults_origin_to_zero() {
        match probe_structured(BackendKind::YaspOffset, 2, "upperright = 2 1\ncells = 4 2\n") {
            StrategyOutcome::Applicable(ConstructionStrategy::BuildStructured(params)) => {
                assert_eq!(
                    params.bounds,
                    DomainBounds::Box {
                        lower: vec![0.0, 0.0],
                        upper: vec![2.0, 1.0]
                    }
                );
                assert_eq!(params.overlap, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_tensor_reads_coordinate_subgroup() {
        let ini = "coordinates.x = 0 1 3\ncoordinates.y = 0 2\n";
        match probe_structured(BackendKind::YaspTensor, 2, ini) {
            StrategyOutcome::Applicable(ConstructionStrategy::BuildStructured(params)) => {
                assert_eq!(params.cells, vec![2, 1]);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_missing_extension_fails_with_qualified_key() {
        match probe_structured(BackendKind::Yasp, 2, "cells = 4 4\n") {
            StrategyOutcome::Failed(ConstructionError::MissingRequiredKey { key, .. }) => {
                assert_eq!(key, "yaspgrid.extension");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_import_is_never_applicable() {
        let outcome = probe_structured(BackendKind::Yasp, 1, "importFile = a.msh\n");
        assert!(matches!(outcome, StrategyOutcome::Failed(_)));

        let builder = YaspBuilder::new(BackendTag::new(BackendKind::Yasp, 1));
        let group = ParameterTree::parse("importFile = a.msh\n").unwrap();
        assert!(matches!(
            builder.probe(StrategyKind::ImportFromFile, &group),
            StrategyOutcome::NotApplicable
        ));
    }
}
