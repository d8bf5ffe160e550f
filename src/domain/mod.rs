//! Domain layer: parameters, backend tags, strategies and grids
//!
//! This layer is independent of external concerns (no file I/O, no CLI, no config loading).

pub mod comparison;
pub mod error;
pub mod grid;
pub mod parameter_tree;
pub mod strategy;
pub mod tag;

pub use comparison::{
    compare_trees, CompareMode, CompareOptions, ComparisonReport, Difference, DifferenceKind,
};
pub use error::{ConstructionError, ConstructionResult, GridError, ParamError, RecorderError};
pub use grid::{ElementShape, Grid, StructuredGrid, UnstructuredMesh};
pub use parameter_tree::{FromParam, ParameterTree};
pub use strategy::{ConstructionStrategy, StrategyKind, StrategyOutcome};
pub use tag::{BackendKind, BackendTag, TagParseError};
