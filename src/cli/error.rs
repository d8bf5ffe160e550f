//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::{ConstructionError, ParamError, RecorderError};
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Application(e) => application_exit_code(e),
            },
        }
    }
}

fn application_exit_code(e: &ApplicationError) -> i32 {
    match e {
        ApplicationError::Param(e) => param_exit_code(e),
        ApplicationError::Construction(e) => match e {
            ConstructionError::UnsupportedBackend { .. } => exitcode::SOFTWARE,
            ConstructionError::MissingRequiredKey { .. }
            | ConstructionError::InvalidEnumValue { .. }
            | ConstructionError::InvalidParameter { .. } => exitcode::CONFIG,
            ConstructionError::BackendIo { .. } => exitcode::IOERR,
        },
        ApplicationError::Recorder(e) => match e {
            RecorderError::UseAfterClose { .. } => exitcode::SOFTWARE,
            RecorderError::MissingMetaKey { .. } => exitcode::CONFIG,
            RecorderError::Param(e) => param_exit_code(e),
            RecorderError::Flush { .. } => exitcode::CANTCREAT,
        },
        ApplicationError::Mismatch { .. } => exitcode::MISMATCH,
        ApplicationError::Config { .. } => exitcode::CONFIG,
        ApplicationError::OperationFailed { source, .. } => {
            match source.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::NotFound => exitcode::NOINPUT,
                _ => exitcode::IOERR,
            }
        }
    }
}

fn param_exit_code(e: &ParamError) -> i32 {
    match e {
        ParamError::Syntax { .. } => exitcode::DATAERR,
        _ => exitcode::CONFIG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackendKind, BackendTag};

    fn construction(e: ConstructionError) -> CliError {
        ApplicationError::from(e).into()
    }

    #[test]
    fn given_unsupported_backend_when_exit_code_then_software() {
        let err = construction(ConstructionError::UnsupportedBackend {
            tag: BackendTag::new(BackendKind::Alu, 3),
        });
        assert_eq!(err.exit_code(), exitcode::SOFTWARE);
    }

    #[test]
    fn given_missing_key_when_exit_code_then_config() {
        let err = construction(ConstructionError::MissingRequiredKey {
            tag: BackendTag::new(BackendKind::Yasp, 2),
            key: "yaspgrid.cells".to_string(),
        });
        assert_eq!(err.exit_code(), exitcode::CONFIG);
        assert!(err.to_string().contains("yaspgrid.cells"));
    }

    #[test]
    fn given_missing_input_file_when_exit_code_then_noinput() {
        let err: CliError = ApplicationError::OperationFailed {
            context: "read parameter file: x.ini".to_string(),
            source: Box::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
        }
        .into();
        assert_eq!(err.exit_code(), exitcode::NOINPUT);
    }

    #[test]
    fn given_mismatch_when_exit_code_then_one() {
        let err: CliError = ApplicationError::Mismatch { count: 2 }.into();
        assert_eq!(err.exit_code(), exitcode::MISMATCH);
        assert_eq!(exitcode::MISMATCH, 1);
    }
}
