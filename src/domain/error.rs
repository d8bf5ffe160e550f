//! Domain-level errors (no I/O orchestration)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::tag::BackendTag;

/// Errors raised by the parameter tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing key: {key}")]
    MissingKey { key: String },

    #[error("invalid value for {key}: '{value}' (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("invalid key: '{key}'")]
    InvalidKey { key: String },

    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Grid-level failures reported by the backends themselves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid grid parameters: {0}")]
    InvalidParameters(String),

    #[error("malformed mesh file (line {line}): {message}")]
    MalformedMesh { line: usize, message: String },

    #[error("snapshot rejected: {0}")]
    Snapshot(String),
}

/// Construction failures. None of them are retried and none yield a partial grid.
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("the grid factory for {tag} is not implemented")]
    UnsupportedBackend { tag: BackendTag },

    #[error("{tag}: missing required key '{key}'")]
    MissingRequiredKey { tag: BackendTag, key: String },

    #[error("{tag}: invalid value '{value}' for '{key}' (expected one of: {allowed})")]
    InvalidEnumValue {
        tag: BackendTag,
        key: String,
        value: String,
        allowed: String,
    },

    #[error("{tag}: invalid parameter '{key}': {message}")]
    InvalidParameter {
        tag: BackendTag,
        key: String,
        message: String,
    },

    #[error("{tag}: cannot use '{key}' = {path}: {message}")]
    BackendIo {
        tag: BackendTag,
        key: String,
        path: PathBuf,
        message: String,
    },
}

impl ConstructionError {
    /// Backend the failure belongs to.
    pub fn tag(&self) -> BackendTag {
        match self {
            Self::UnsupportedBackend { tag }
            | Self::MissingRequiredKey { tag, .. }
            | Self::InvalidEnumValue { tag, .. }
            | Self::InvalidParameter { tag, .. }
            | Self::BackendIo { tag, .. } => *tag,
        }
    }
}

/// Result type for grid construction.
pub type ConstructionResult<T> = Result<T, ConstructionError>;

/// Errors raised by the output tree recorder.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("output tree {destination} is closed, cannot {operation}")]
    UseAfterClose {
        destination: PathBuf,
        operation: &'static str,
    },

    #[error("mandatory parameter {key} is not set")]
    MissingMetaKey { key: String },

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("cannot write output tree {path}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
