//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::{ConstructionError, ParamError, RecorderError};

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error("output trees differ in {count} key(s)")]
    Mismatch { count: usize },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
