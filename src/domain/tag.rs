//! Backend tags: which grid implementation a construction request targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Family of grid implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Equidistant structured grid anchored at the origin
    Yasp,
    /// Equidistant structured grid with arbitrary lower-left corner
    YaspOffset,
    /// Structured grid with per-axis coordinate arrays
    YaspTensor,
    /// Unstructured simplex/cube mesh
    Ug,
    /// Adaptive simplex mesh (recognized, not built in)
    Alu,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Yasp,
        BackendKind::YaspOffset,
        BackendKind::YaspTensor,
        BackendKind::Ug,
        BackendKind::Alu,
    ];

    /// Short name used in tags.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Yasp => "yasp",
            Self::YaspOffset => "yasp-offset",
            Self::YaspTensor => "yasp-tensor",
            Self::Ug => "ug",
            Self::Alu => "alu",
        }
    }

    /// Parameter group holding this backend's keys.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Yasp | Self::YaspOffset | Self::YaspTensor => "yaspgrid",
            Self::Ug => "ug",
            Self::Alu => "alugrid",
        }
    }

    /// Human-readable grid type name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Yasp => "YaspGrid",
            Self::YaspOffset => "YaspGrid<EquidistantOffset>",
            Self::YaspTensor => "YaspGrid<TensorProduct>",
            Self::Ug => "UGGrid",
            Self::Alu => "ALUGrid",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a backend tag from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid backend tag '{input}': {reason}")]
pub struct TagParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for BackendKind {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| TagParseError {
                input: s.to_string(),
                reason: format!(
                    "unknown kind, expected one of: {}",
                    Self::ALL.map(|k| k.name()).join(", ")
                ),
            })
    }
}

/// A backend kind at a fixed world dimension, rendered as `<kind>:<dim>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendTag {
    pub kind: BackendKind,
    pub dim: usize,
}

impl BackendTag {
    pub fn new(kind: BackendKind, dim: usize) -> Self {
        Self { kind, dim }
    }

    /// Parameter group holding this backend's keys.
    pub fn group(&self) -> &'static str {
        self.kind.group()
    }

    /// Fully qualified key for diagnostics, e.g. `yaspgrid.cells`.
    pub fn qualify(&self, key: &str) -> String {
        format!("{}.{}", self.group(), key)
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.dim)
    }
}

impl FromStr for BackendTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, dim) = s.trim().split_once(':').ok_or_else(|| TagParseError {
            input: s.to_string(),
            reason: "expected <kind>:<dim>".to_string(),
        })?;
        let dim = dim.parse::<usize>().map_err(|_| TagParseError {
            input: s.to_string(),
            reason: format!("dimension '{}' is not a number", dim),
        })?;
        if dim == 0 {
            return Err(TagParseError {
                input: s.to_string(),
                reason: "dimension must be positive".to_string(),
            });
        }
        Ok(Self::new(kind.parse()?, dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrips_through_display() {
        let tag: BackendTag = "yasp-tensor:3".parse().unwrap();
        assert_eq!(tag, BackendTag::new(BackendKind::YaspTensor, 3));
        assert_eq!(tag.to_string(), "yasp-tensor:3");
        assert_eq!(tag.group(), "yaspgrid");
    }

    #[test]
    fn test_tag_rejects_unknown_kind_and_bad_dimension() {
        assert!("spgrid:2".parse::<BackendTag>().is_err());
        assert!("yasp".parse::<BackendTag>().is_err());
        assert!("yasp:x".parse::<BackendTag>().is_err());
        assert!("ug:0".parse::<BackendTag>().is_err());
    }
}
