use crate::partial::ChunkId;
use thiserror::Error;

/// Result type for word counting operations
pub type Result<T> = std::result::Result<T, TopWordsError>;

/// Errors that can occur while counting and ranking words
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopWordsError {
    /// Job has already been started
    #[error("Job has already been started")]
    AlreadyStarted,

    /// A count would exceed the range of `u64`
    #[error("Count overflow while adding occurrences of {word:?}")]
    CountOverflow { word: String },

    /// The same chunk was offered to the aggregator twice
    #[error("Chunk {0} has already been merged")]
    DuplicateChunk(ChunkId),

    /// Finalization was requested before every expected chunk was merged
    #[error("Aggregation incomplete: merged {merged} of {expected} chunks")]
    Incomplete { merged: u64, expected: u64 },

    /// Input or merge channel closed while still in use
    #[error("Channel closed: {0}")]
    InputClosed(String),

    /// A mapper failed on a chunk
    #[error("Mapping chunk {chunk} failed: {reason}")]
    MapError { chunk: ChunkId, reason: String },

    /// Thread join error
    #[error("Thread join error: {0}")]
    ThreadError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
