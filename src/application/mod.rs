//! Application layer: builders and services
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod builders;
pub mod error;
pub mod error_ext;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
