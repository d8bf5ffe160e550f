//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{ComparisonService, GridFactory, ParameterService};
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding the settings, the filesystem boundary and the grid factory.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Grid factory with the built-in backends registered
    pub factory: Arc<GridFactory>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let factory = Arc::new(GridFactory::with_default_backends(fs.clone()));

        Self {
            settings,
            fs,
            factory,
        }
    }

    pub fn parameters(&self) -> ParameterService {
        ParameterService::new(self.fs.clone())
    }

    pub fn comparison(&self) -> ComparisonService {
        ComparisonService::new(self.fs.clone())
    }
}
