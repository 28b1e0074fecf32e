//! Error types surfaced by the vectord core.
//!
//! [`VectorError`] is the only error type returned by public APIs. The server
//! crate maps each kind onto an HTTP status; embedders can match on the kind
//! directly.
//!
//! Propagation policy: `batch_insert` absorbs per-record failures and reports
//! how many records made it in; every other mutation is all-or-nothing. A
//! decode failure during startup drops the one offending collection and the
//! rest keep loading.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, VectorError>;

/// All error kinds surfaced by the index, collection, and store layers.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Vector length does not match the collection's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured collection dimension.
        expected: usize,
        /// Length of the vector actually supplied.
        got: usize,
    },

    /// The external id is already mapped to a live record.
    #[error("id already exists: {0}")]
    DuplicateId(String),

    /// A collection or record was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A collection with this name already exists.
    #[error("collection already exists: {0}")]
    AlreadyExists(String),

    /// The collection is at its configured `max_elements` limit.
    #[error("capacity exceeded: collection is limited to {max} vectors")]
    CapacityExceeded {
        /// Configured capacity limit.
        max: usize,
    },

    /// A persisted file failed to decode or validate.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// Disk read or write failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorError {
    /// Not-found error for a collection name.
    pub fn collection_not_found(name: &str) -> Self {
        Self::NotFound(format!("collection '{name}'"))
    }

    /// Not-found error for an external vector id.
    pub fn id_not_found(id: &str) -> Self {
        Self::NotFound(format!("vector '{id}'"))
    }

    /// Returns true for the not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = VectorError::DimensionMismatch {
            expected: 128,
            got: 64,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 64");

        let err = VectorError::collection_not_found("docs");
        assert_eq!(err.to_string(), "collection 'docs' not found");
        assert!(err.is_not_found());

        let err = VectorError::DuplicateId("abc".into());
        assert_eq!(err.to_string(), "id already exists: abc");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_io_conversion() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/nonexistent/vectord/test/path")?)
        }
        assert!(matches!(read_missing(), Err(VectorError::Io(_))));
    }
}
