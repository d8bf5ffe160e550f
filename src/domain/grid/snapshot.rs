//! Snapshot format for structured grids
//!
//! A snapshot is a JSON document holding the serialized grid together with a
//! SHA-256 checksum of that payload. Restoring verifies the checksum, so a
//! truncated or edited file is rejected rather than half-loaded.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::GridError;
use crate::domain::grid::StructuredGrid;

const FORMAT: &str = "inigrid-snapshot";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    format: String,
    version: u32,
    checksum: String,
    grid: serde_json::Value,
}

fn checksum(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a grid into snapshot text.
pub fn encode(grid: &StructuredGrid) -> Result<String, GridError> {
    let payload =
        serde_json::to_value(grid).map_err(|e| GridError::Snapshot(e.to_string()))?;
    let document = SnapshotDocument {
        format: FORMAT.to_string(),
        version: VERSION,
        checksum: checksum(&payload),
        grid: payload,
    };
    serde_json::to_string_pretty(&document).map_err(|e| GridError::Snapshot(e.to_string()))
}

/// Parse snapshot text back into a grid.
pub fn decode(content: &str) -> Result<StructuredGrid, GridError> {
    let document: SnapshotDocument = serde_json::from_str(content)
        .map_err(|e| GridError::Snapshot(format!("not a snapshot document: {}", e)))?;
    if document.format != FORMAT {
        return Err(GridError::Snapshot(format!(
            "unexpected format '{}'",
            document.format
        )));
    }
    if document.version != VERSION {
        return Err(GridError::Snapshot(format!(
            "unsupported version {}",
            document.version
        )));
    }
    if checksum(&document.grid) != document.checksum {
        return Err(GridError::Snapshot("checksum mismatch".to_string()));
    }
    let grid: StructuredGrid =
        serde_json::from_value(document.grid).map_err(|e| GridError::Snapshot(e.to_string()))?;
    grid.validate()
        .map_err(|e| GridError::Snapshot(format!("inconsistent grid: {}", e)))?;
    Ok(grid)
}
