//! Error types for the on-disk index structures.
//!
//! Core operations only surface errors at the storage boundary. Query paths
//! degrade a missing partition or unit to "no data" instead of failing.

use crate::index::types::PartitionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Partition not found: {0}")]
    PartitionNotFound(PartitionId),

    #[error("Failed to persist unit {unit}: {source}")]
    Persist {
        unit: String,
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// True for errors that callers recover from by using an empty structure.
    pub fn is_not_found(&self) -> bool {
        match self {
            IndexError::PartitionNotFound(_) => true,
            IndexError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
