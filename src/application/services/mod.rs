//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the FileSystem boundary trait but are themselves
//! concrete structs, not traits.

mod comparison;
mod factory;
mod parameters;
mod recorder;

pub use comparison::ComparisonService;
pub use factory::{Construction, GridFactory};
pub use parameters::ParameterService;
pub use recorder::{
    OutputTree, NAME_KEY, NORM_TYPE_KEY, OUTPUT_EXTENSION_KEY, OUTPUT_NAME_KEY, QUANTITY_NAME_KEY,
};
