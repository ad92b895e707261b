use thiserror::Error;

/// Why a submitted key did not get a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError<E> {
    /// The fetch for the key's window failed. Every key of the window gets
    /// a clone of the same error.
    #[error("batch fetch failed: {0}")]
    Fetch(#[source] E),
    /// The fetch succeeded but did not return one value per key.
    #[error("batch fetch returned {actual} results for {expected} keys")]
    ResultCount { expected: usize, actual: usize },
    /// The batcher was shut down before the key was submitted.
    #[error("batcher is shut down")]
    Closed,
    /// The window was abandoned, e.g. the fetch panicked.
    #[error("batch was dropped before it completed")]
    Dropped,
}
