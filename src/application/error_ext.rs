//! Path context for I/O failures

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Converts `io::Result` into `ApplicationResult`, naming the action and path.
pub trait IoResultExt<T> {
    /// ```ignore
    /// let text = fs.read_to_string(ini).with_path_context("read parameter file", ini)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }
}
