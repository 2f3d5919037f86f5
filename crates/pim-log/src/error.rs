//! Log errors

/// Failure to append to or verify the log
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Batch without records
    #[error("cannot append an empty batch")]
    EmptyBatch,

    /// Record could not be encoded for hashing
    #[error("failed to encode record: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Hash chain broken at `position`
    #[error("log integrity violated at position {position}")]
    IntegrityViolation {
        /// First entry whose hash does not match
        position: u64,
    },
}
