//! Unstructured mesh builder (`ug`)
//!
//! Keys live in the `ug` group. An import key selects a mesh file; otherwise
//! a box is meshed with cubes or Kuhn simplices. Either way the mesh is then
//! load balanced and globally refined.

use tracing::{debug, info};

use super::{
    get_or, get_vec, get_vec_or, read_source, refinement_rejected, rejected, BackendBuilder,
};
use crate::domain::grid::gmsh;
use crate::domain::strategy::{self, DomainBounds, ImportFormat, StructuredParams};
use crate::domain::{
    BackendKind, BackendTag, ConstructionError, ConstructionResult, ConstructionStrategy,
    ElementShape, Grid, GridError, ParameterTree, StrategyKind, StrategyOutcome, UnstructuredMesh,
};
use crate::infrastructure::traits::FileSystem;

const STRATEGIES: &[StrategyKind] = &[StrategyKind::ImportFromFile, StrategyKind::BuildStructured];

const ELEMENT_TYPE_KEY: &str = "elementType";

pub struct UgBuilder {
    tag: BackendTag,
}

impl UgBuilder {
    pub fn new(dim: usize) -> Self {
        Self {
            tag: BackendTag::new(BackendKind::Ug, dim),
        }
    }

    fn structured_params(&self, group: &ParameterTree) -> ConstructionResult<StructuredParams> {
        let tag = self.tag;
        let lower = get_vec_or(tag, group, "lowerleft", 0.0)?;
        let upper = get_vec(tag, group, "upperright")?;
        let cells = if group.has_key("elements") {
            get_vec(tag, group, "elements")?
        } else if group.has_key("cells") {
            get_vec(tag, group, "cells")?
        } else {
            return Err(ConstructionError::MissingRequiredKey {
                tag,
                key: tag.qualify("elements"),
            });
        };

        let name: String = get_or(tag, group, ELEMENT_TYPE_KEY, "cube".to_string())?;
        let shape =
            ElementShape::from_name(&name).ok_or_else(|| ConstructionError::InvalidEnumValue {
                tag,
                key: tag.qualify(ELEMENT_TYPE_KEY),
                value: name.clone(),
                allowed: ElementShape::NAMES.join(", "),
            })?;

        let mut params = StructuredParams::new(DomainBounds::Box { lower, upper }, cells);
        params.element_shape = Some(shape);
        Ok(params)
    }

    fn import(
        &self,
        key: &str,
        path: &std::path::Path,
        format: ImportFormat,
        group: &ParameterTree,
        fs: &dyn FileSystem,
    ) -> ConstructionResult<UnstructuredMesh> {
        let tag = self.tag;
        let io_error = |message: String| ConstructionError::BackendIo {
            tag,
            key: key.to_string(),
            path: path.to_path_buf(),
            message,
        };

        let keep_boundary = get_or(tag, group, "boundarySegments", true)?;
        let verbose = get_or(tag, group, "verbose", false)?;
        let content = read_source(fs, tag, key, path)?;
        let mesh = match format {
            ImportFormat::Gmsh => {
                let parsed = gmsh::parse(&content).map_err(|e| io_error(e.to_string()))?;
                UnstructuredMesh::from_gmsh(tag, &parsed, keep_boundary)
                    .map_err(|e| io_error(e.to_string()))?
            }
        };

        if verbose {
            info!(
                "imported {}: {} vertices, {} elements, {} boundary segments",
                path.display(),
                mesh.vertex_count(),
                mesh.cell_count(),
                mesh.boundary_segments().len()
            );
        }
        Ok(mesh)
    }
}

impl BackendBuilder for UgBuilder {
    fn tag(&self) -> BackendTag {
        self.tag
    }

    fn strategies(&self) -> &'static [StrategyKind] {
        STRATEGIES
    }

    fn probe(&self, kind: StrategyKind, group: &ParameterTree) -> StrategyOutcome {
        match kind {
            StrategyKind::ImportFromFile => strategy::probe_import(self.tag, group),
            StrategyKind::BuildStructured => StrategyOutcome::from_result(
                self.structured_params(group)
                    .map(ConstructionStrategy::BuildStructured),
            ),
            StrategyKind::RestoreFromSnapshot => StrategyOutcome::NotApplicable,
        }
    }

    fn build(
        &self,
        strategy: &ConstructionStrategy,
        group: &ParameterTree,
        fs: &dyn FileSystem,
    ) -> ConstructionResult<Box<dyn Grid>> {
        let tag = self.tag;
        let mut mesh = match strategy {
            ConstructionStrategy::ImportFromFile { key, path, format } => {
                self.import(key, path, *format, group, fs)?
            }
            ConstructionStrategy::BuildStructured(params) => {
                let DomainBounds::Box { lower, upper } = &params.bounds else {
                    return Err(rejected(
                        tag,
                        GridError::InvalidParameters(
                            "unstructured meshes need a box domain".to_string(),
                        ),
                    ));
                };
                let shape = params.element_shape.unwrap_or(ElementShape::Cube);
                let keep_boundary = get_or(tag, group, "boundarySegments", true)?;
                UnstructuredMesh::structured(tag, lower, upper, &params.cells, shape, keep_boundary)
                    .map_err(|e| rejected(tag, e))?
            }
            ConstructionStrategy::RestoreFromSnapshot { key, .. } => {
                return Err(ConstructionError::InvalidParameter {
                    tag,
                    key: key.clone(),
                    message: "unstructured meshes cannot be restored from a snapshot".to_string(),
                })
            }
        };

        let parts = get_or(tag, group, "partitioning", 1usize)?;
        mesh.load_balance(parts)
            .map_err(|e| ConstructionError::InvalidParameter {
                tag,
                key: tag.qualify("partitioning"),
                message: e.to_string(),
            })?;
        let refinement = get_or(tag, group, "refinement", 0usize)?;
        mesh.global_refine(refinement)
            .map_err(|e| refinement_rejected(tag, e))?;
        debug!(
            "{}: {} elements in {} part(s) after {} refinement(s)",
            tag,
            mesh.cell_count(),
            parts,
            refinement
        );
        Ok(Box::new(mesh))
    }
}
