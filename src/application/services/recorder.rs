//! Output tree: a prefix-scoped key/value recorder
//!
//! Values are collected in memory under dot-joined keys and written to the
//! destination once, on [`OutputTree::close`]. Dropping an open tree closes
//! it, so the output is persisted on every exit path including unwinding.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{ParamError, ParameterTree, RecorderError};
use crate::infrastructure::traits::FileSystem;

/// Meta keys naming the output file.
pub const OUTPUT_NAME_KEY: &str = "__output_name";
pub const NAME_KEY: &str = "__name";
pub const OUTPUT_EXTENSION_KEY: &str = "__output_extension";

/// Meta keys naming the convergence test quantities.
pub const NORM_TYPE_KEY: &str = "__CONVERGENCE_TEST.NormType";
pub const QUANTITY_NAME_KEY: &str = "__CONVERGENCE_TEST.QuantityName";

pub struct OutputTree {
    destination: PathBuf,
    fs: Arc<dyn FileSystem>,
    data: ParameterTree,
    prefix: Vec<String>,
    /// Parameters the tree was opened from, for the convergence meta keys
    params: Option<ParameterTree>,
    closed: bool,
}

impl OutputTree {
    /// Open an empty tree that will be written to `destination`.
    pub fn open(fs: Arc<dyn FileSystem>, destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        debug!("open: destination={}", destination.display());
        Self {
            destination,
            fs,
            data: ParameterTree::new(),
            prefix: Vec::new(),
            params: None,
            closed: false,
        }
    }

    /// Open a tree whose destination is named by the parameter meta keys.
    pub fn from_params(
        fs: Arc<dyn FileSystem>,
        params: &ParameterTree,
    ) -> Result<Self, RecorderError> {
        let destination = Self::destination_for(params, None)?;
        let mut tree = Self::open(fs, destination);
        tree.params = Some(params.clone());
        Ok(tree)
    }

    /// `<__output_name or __name>.<__output_extension>`. The extension falls
    /// back to `fallback_extension` when given.
    pub fn destination_for(
        params: &ParameterTree,
        fallback_extension: Option<&str>,
    ) -> Result<PathBuf, RecorderError> {
        let name = [OUTPUT_NAME_KEY, NAME_KEY]
            .iter()
            .find(|k| params.has_key(k))
            .map(|k| params.get_str(k))
            .transpose()?
            .ok_or_else(|| RecorderError::MissingMetaKey {
                key: NAME_KEY.to_string(),
            })?;
        let extension = match (params.has_key(OUTPUT_EXTENSION_KEY), fallback_extension) {
            (true, _) => params.get_str(OUTPUT_EXTENSION_KEY)?,
            (false, Some(ext)) => ext,
            (false, None) => {
                return Err(RecorderError::MissingMetaKey {
                    key: OUTPUT_EXTENSION_KEY.to_string(),
                })
            }
        };
        Ok(PathBuf::from(format!("{}.{}", name.trim(), extension.trim())))
    }

    /// Run `body` against a fresh tree and close it afterwards, whether the
    /// body succeeded or not. The body's error is reported in preference to a
    /// failed flush.
    pub fn scoped<T, E, F>(
        fs: Arc<dyn FileSystem>,
        destination: impl Into<PathBuf>,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut OutputTree) -> Result<T, E>,
        E: From<RecorderError>,
    {
        let mut tree = Self::open(fs, destination);
        let result = body(&mut tree);
        let closed = tree.close();
        match result {
            Ok(value) => closed.map(|_| value).map_err(E::from),
            Err(err) => {
                if let Err(flush) = closed {
                    warn!("output tree not written: {}", flush);
                }
                Err(err)
            }
        }
    }

    /// Store `value` under the current prefix.
    pub fn set<V: Display>(&mut self, key: &str, value: V) -> Result<(), RecorderError> {
        self.ensure_open("set")?;
        let full = self.qualify(key);
        self.data.set(&full, value.to_string())?;
        Ok(())
    }

    /// Store a list as space separated values.
    pub fn set_list<V: Display>(&mut self, key: &str, values: &[V]) -> Result<(), RecorderError> {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.set(key, joined)
    }

    /// Store the convergence test quantities under the keys the parameters
    /// name, ignoring the current prefix.
    pub fn set_convergence_data<N: Display, Q: Display>(
        &mut self,
        norm: N,
        quantity: Q,
    ) -> Result<(), RecorderError> {
        self.ensure_open("set convergence data")?;
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| RecorderError::MissingMetaKey {
                key: NORM_TYPE_KEY.to_string(),
            })?;
        let norm_key = meta_value(params, NORM_TYPE_KEY)?;
        let quantity_key = meta_value(params, QUANTITY_NAME_KEY)?;
        self.data.set(&norm_key, norm.to_string())?;
        self.data.set(&quantity_key, quantity.to_string())?;
        Ok(())
    }

    /// Append one or more dot separated segments to the prefix.
    pub fn push_prefix(&mut self, segment: &str) -> Result<(), RecorderError> {
        self.ensure_open("push a prefix")?;
        let segments = split_segments(segment)?;
        if segments.is_empty() {
            return Err(ParamError::InvalidKey {
                key: segment.to_string(),
            }
            .into());
        }
        self.prefix.extend(segments);
        Ok(())
    }

    /// Drop the last segment; a no-op at the root.
    pub fn pop_prefix(&mut self) -> Result<(), RecorderError> {
        self.ensure_open("pop a prefix")?;
        self.prefix.pop();
        Ok(())
    }

    /// Replace the prefix; an empty string returns to the root.
    pub fn set_prefix(&mut self, prefix: &str) -> Result<(), RecorderError> {
        self.ensure_open("set the prefix")?;
        self.prefix = split_segments(prefix)?;
        Ok(())
    }

    /// Current prefix, dot-joined.
    pub fn prefix(&self) -> String {
        self.prefix.join(".")
    }

    /// Recorded values by fully qualified key.
    pub fn entries(&self) -> std::collections::BTreeMap<String, String> {
        self.data.flatten()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Write the tree to its destination. Only the first call writes.
    pub fn close(&mut self) -> Result<(), RecorderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let flush_error = |source| RecorderError::Flush {
            path: self.destination.clone(),
            source,
        };
        self.fs
            .ensure_parent(&self.destination)
            .map_err(flush_error)?;
        self.fs
            .write(&self.destination, &self.data.report())
            .map_err(flush_error)?;
        debug!(
            "close: wrote {} key(s) to {}",
            self.data.keys().len(),
            self.destination.display()
        );
        Ok(())
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), RecorderError> {
        if self.closed {
            return Err(RecorderError::UseAfterClose {
                destination: self.destination.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn qualify(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix(), key)
        }
    }
}

impl Drop for OutputTree {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("output tree not written: {}", e);
        }
    }
}

fn meta_value(params: &ParameterTree, key: &str) -> Result<String, RecorderError> {
    match params.get_str(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(ParamError::MissingKey { .. }) => Err(RecorderError::MissingMetaKey {
            key: key.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Split a dotted prefix; empty input is the root, empty segments are invalid.
fn split_segments(prefix: &str) -> Result<Vec<String>, ParamError> {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('.')
        .map(|s| {
            let s = s.trim();
            if s.is_empty() {
                Err(ParamError::InvalidKey {
                    key: prefix.to_string(),
                })
            } else {
                Ok(s.to_string())
            }
        })
        .collect()
}
