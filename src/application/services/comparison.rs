//! Output tree comparison service
//!
//! Loads two output trees and compares them with [`compare_trees`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::services::ParameterService;
use crate::application::ApplicationResult;
use crate::domain::{compare_trees, CompareOptions, ComparisonReport};
use crate::infrastructure::traits::FileSystem;

pub struct ComparisonService {
    params: ParameterService,
}

impl ComparisonService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            params: ParameterService::new(fs),
        }
    }

    /// Compare the tree at `actual` against the one at `reference`.
    pub fn compare(
        &self,
        actual: &Path,
        reference: &Path,
        options: &CompareOptions,
    ) -> ApplicationResult<ComparisonReport> {
        debug!(
            "compare: actual={} reference={} mode={:?}",
            actual.display(),
            reference.display(),
            options.mode
        );
        let actual_tree = self.params.load(actual)?;
        let reference_tree = self.params.load(reference)?;
        let report = compare_trees(&actual_tree, &reference_tree, options);
        info!(
            "compared {} key(s), {} difference(s)",
            report.compared,
            report.differences.len()
        );
        Ok(report)
    }
}
