//! Grid factory service
//!
//! Dispatches a construction request to the builder registered for the tag
//! and walks that builder's strategies in priority order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::builders::{BackendBuilder, UgBuilder, YaspBuilder};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::grid::snapshot;
use crate::domain::{
    BackendKind, BackendTag, ConstructionError, ConstructionResult, Grid, ParameterTree,
    StrategyKind, StrategyOutcome, StructuredGrid,
};
use crate::infrastructure::traits::FileSystem;

/// A constructed grid together with the strategy that produced it.
#[derive(Debug, Clone)]
pub struct Construction {
    pub grid: Arc<dyn Grid>,
    pub strategy: StrategyKind,
}

/// Tag-keyed registry of backend builders.
pub struct GridFactory {
    fs: Arc<dyn FileSystem>,
    builders: BTreeMap<BackendTag, Box<dyn BackendBuilder>>,
}

impl GridFactory {
    /// Factory without any registered backend.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            builders: BTreeMap::new(),
        }
    }

    /// Factory with the built-in backends: the structured kinds in one to
    /// three dimensions and `ug` in two and three.
    pub fn with_default_backends(fs: Arc<dyn FileSystem>) -> Self {
        let mut factory = Self::new(fs);
        for dim in 1..=3 {
            for kind in [BackendKind::Yasp, BackendKind::YaspOffset, BackendKind::YaspTensor] {
                factory.register(Box::new(YaspBuilder::new(BackendTag::new(kind, dim))));
            }
        }
        for dim in 2..=3 {
            factory.register(Box::new(UgBuilder::new(dim)));
        }
        factory
    }

    /// Register a builder, replacing any previous one for the same tag.
    pub fn register(&mut self, builder: Box<dyn BackendBuilder>) {
        self.builders.insert(builder.tag(), builder);
    }

    pub fn supports(&self, tag: BackendTag) -> bool {
        self.builders.contains_key(&tag)
    }

    /// Registered tags, sorted.
    pub fn backends(&self) -> Vec<BackendTag> {
        self.builders.keys().copied().collect()
    }

    /// Build a grid for `tag` from the full parameter tree.
    pub fn construct(
        &self,
        params: &ParameterTree,
        tag: BackendTag,
    ) -> ConstructionResult<Arc<dyn Grid>> {
        self.construct_detailed(params, tag).map(|c| c.grid)
    }

    /// Like [`construct`](Self::construct), also reporting the strategy used.
    #[instrument(level = "debug", skip(self, params))]
    pub fn construct_detailed(
        &self,
        params: &ParameterTree,
        tag: BackendTag,
    ) -> ConstructionResult<Construction> {
        let builder = self
            .builders
            .get(&tag)
            .ok_or(ConstructionError::UnsupportedBackend { tag })?;
        let group = params.sub(tag.group());

        for &kind in builder.strategies() {
            match builder.probe(kind, group) {
                StrategyOutcome::Applicable(strategy) => {
                    debug!("strategy {} applies", kind.name());
                    let grid = builder.build(&strategy, group, self.fs.as_ref())?;
                    return Ok(Construction {
                        grid: Arc::from(grid),
                        strategy: kind,
                    });
                }
                StrategyOutcome::NotApplicable => {
                    debug!("strategy {} not applicable", kind.name());
                }
                StrategyOutcome::Failed(err) => return Err(err),
            }
        }

        // Every builder ends with a strategy that either applies or fails.
        Err(ConstructionError::MissingRequiredKey {
            tag,
            key: tag.group().to_string(),
        })
    }

    /// Write a snapshot that the restore strategy reads back.
    pub fn backup(&self, grid: &StructuredGrid, path: &Path) -> ApplicationResult<()> {
        let content = snapshot::encode(grid).map_err(|e| ApplicationError::OperationFailed {
            context: format!("encode snapshot for {}", grid.backend()),
            source: Box::new(e),
        })?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create snapshot directory", path)?;
        self.fs
            .write(path, &content)
            .with_path_context("write snapshot", path)?;
        debug!("backup: wrote {}", path.display());
        Ok(())
    }
}
