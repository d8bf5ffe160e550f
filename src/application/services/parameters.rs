//! Parameter file loading

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::ParameterTree;
use crate::infrastructure::traits::FileSystem;

/// Reads INI parameter files through the filesystem boundary.
pub struct ParameterService {
    fs: Arc<dyn FileSystem>,
}

impl ParameterService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read and parse a parameter file.
    pub fn load(&self, path: &Path) -> ApplicationResult<ParameterTree> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read parameter file", path)?;
        let tree = ParameterTree::parse(&content)?;
        debug!("load: {} key(s) from {}", tree.keys().len(), path.display());
        Ok(tree)
    }
}
