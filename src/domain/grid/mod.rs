//! Grid backends
//!
//! The factory only relies on what [`Grid`] exposes: size reporting plus the
//! concrete accessors for the two built-in implementations.

pub mod gmsh;
pub mod snapshot;
pub mod structured;
pub mod unstructured;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::tag::BackendTag;

pub use structured::{Coordinates, StructuredGrid};
pub use unstructured::{Element, UnstructuredMesh};

/// Most coordinates or elements a grid materializes along one axis or in total.
pub const MAX_STORED_ENTITIES: usize = u32::MAX as usize;

/// A constructed grid instance.
pub trait Grid: fmt::Debug + Send + Sync {
    /// Backend that produced this grid.
    fn backend(&self) -> BackendTag;

    /// World dimension.
    fn dimension(&self) -> usize {
        self.backend().dim
    }

    /// Number of leaf cells (codimension 0 entities).
    fn cell_count(&self) -> usize;

    /// Number of leaf vertices.
    fn vertex_count(&self) -> usize;

    /// Number of global refinements applied since construction.
    fn refinement_level(&self) -> usize;

    fn as_structured(&self) -> Option<&StructuredGrid> {
        None
    }

    fn as_unstructured(&self) -> Option<&UnstructuredMesh> {
        None
    }
}

/// Reference element of a mesh cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementShape {
    Simplex,
    Cube,
}

impl ElementShape {
    pub const NAMES: [&'static str; 2] = ["simplex", "cube"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "simplex" => Some(Self::Simplex),
            "cube" => Some(Self::Cube),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simplex => "simplex",
            Self::Cube => "cube",
        }
    }

    /// Corner count of the reference element of dimension `dim`.
    pub fn corner_count(&self, dim: usize) -> usize {
        match self {
            Self::Simplex => dim + 1,
            Self::Cube => 1 << dim,
        }
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
