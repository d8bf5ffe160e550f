//! Backend builders
//!
//! One [`BackendBuilder`] per backend tag. The factory asks a builder for its
//! strategy order, probes each strategy with presence checks and hands the
//! first applicable one back to the builder to execute.

mod ug;
mod yasp;

use std::path::Path;

use crate::domain::error::GridError;
use crate::domain::{
    BackendTag, ConstructionError, ConstructionResult, ConstructionStrategy, FromParam, Grid,
    ParamError, ParameterTree, StrategyKind, StrategyOutcome,
};
use crate::infrastructure::traits::FileSystem;

pub use ug::UgBuilder;
pub use yasp::YaspBuilder;

/// Specialization of the grid factory for one backend tag.
pub trait BackendBuilder: Send + Sync {
    fn tag(&self) -> BackendTag;

    /// Strategies in priority order.
    fn strategies(&self) -> &'static [StrategyKind];

    /// Presence check for one strategy against the backend's parameter group.
    fn probe(&self, kind: StrategyKind, group: &ParameterTree) -> StrategyOutcome;

    /// Execute a probed strategy, including the post-construction operations.
    fn build(
        &self,
        strategy: &ConstructionStrategy,
        group: &ParameterTree,
        fs: &dyn FileSystem,
    ) -> ConstructionResult<Box<dyn Grid>>;
}

/// Map a parameter lookup failure onto a construction error naming the
/// qualified key.
pub(crate) fn param_error(tag: BackendTag, err: ParamError) -> ConstructionError {
    match err {
        ParamError::MissingKey { key } => ConstructionError::MissingRequiredKey {
            tag,
            key: tag.qualify(&key),
        },
        ParamError::InvalidValue {
            key,
            value,
            expected,
        } => ConstructionError::InvalidParameter {
            tag,
            key: tag.qualify(&key),
            message: format!("'{}' is not {}", value, expected),
        },
        ParamError::InvalidKey { key } => ConstructionError::InvalidParameter {
            tag,
            key: tag.qualify(&key),
            message: "malformed key".to_string(),
        },
        ParamError::Syntax { line, message } => ConstructionError::InvalidParameter {
            tag,
            key: tag.group().to_string(),
            message: format!("line {}: {}", line, message),
        },
    }
}

/// Typed lookup with a default, failures mapped onto the backend.
pub(crate) fn get_or<T: FromParam>(
    tag: BackendTag,
    group: &ParameterTree,
    key: &str,
    default: T,
) -> ConstructionResult<T> {
    group.get_or(key, default).map_err(|e| param_error(tag, e))
}

/// Required list of exactly `dim` entries.
pub(crate) fn get_vec<T: FromParam>(
    tag: BackendTag,
    group: &ParameterTree,
    key: &str,
) -> ConstructionResult<Vec<T>> {
    group.get_vec(key, tag.dim).map_err(|e| param_error(tag, e))
}

/// Optional list of exactly `dim` entries, `default` when absent.
pub(crate) fn get_vec_or<T: FromParam + Clone>(
    tag: BackendTag,
    group: &ParameterTree,
    key: &str,
    default: T,
) -> ConstructionResult<Vec<T>> {
    if group.has_key(key) {
        get_vec(tag, group, key)
    } else {
        Ok(vec![default; tag.dim])
    }
}

/// Per-axis periodicity: either `dim` booleans or a single bit string whose
/// rightmost character is axis 0. Absent means no periodic axis.
pub(crate) fn periodic_flags(tag: BackendTag, group: &ParameterTree) -> ConstructionResult<Vec<bool>> {
    const KEY: &str = "periodic";
    if !group.has_key(KEY) {
        return Ok(vec![false; tag.dim]);
    }
    let raw = group.get_str(KEY).map_err(|e| param_error(tag, e))?;
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    if tokens.len() == tag.dim {
        if let Some(flags) = tokens
            .iter()
            .map(|t| bool::from_param(t))
            .collect::<Option<Vec<bool>>>()
        {
            return Ok(flags);
        }
    }
    if let [bits] = tokens.as_slice() {
        if bits.len() == tag.dim && bits.chars().all(|c| c == '0' || c == '1') {
            return Ok(bits.chars().rev().map(|c| c == '1').collect());
        }
    }
    Err(ConstructionError::InvalidParameter {
        tag,
        key: tag.qualify(KEY),
        message: format!(
            "'{}' is neither {} booleans nor a {}-bit string",
            raw, tag.dim, tag.dim
        ),
    })
}

/// Read a snapshot or mesh file, failures reported against the key naming it.
pub(crate) fn read_source(
    fs: &dyn FileSystem,
    tag: BackendTag,
    key: &str,
    path: &Path,
) -> ConstructionResult<String> {
    fs.read_to_string(path)
        .map_err(|e| ConstructionError::BackendIo {
            tag,
            key: key.to_string(),
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Refinement count the grid could not apply.
pub(crate) fn refinement_rejected(tag: BackendTag, err: GridError) -> ConstructionError {
    ConstructionError::InvalidParameter {
        tag,
        key: tag.qualify("refinement"),
        message: err.to_string(),
    }
}

/// Grid rejected the structured parameters.
pub(crate) fn rejected(tag: BackendTag, err: GridError) -> ConstructionError {
    ConstructionError::InvalidParameter {
        tag,
        key: tag.group().to_string(),
        message: err.to_string(),
    }
}
