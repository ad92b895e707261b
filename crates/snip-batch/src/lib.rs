//! Request coalescing.
//!
//! A [`Batcher`] collects keys submitted by many independent callers into
//! windows and resolves each window with one call to an injected fetch
//! function, handing every caller the result at its own position.

mod batcher;
mod config;
pub mod error;

pub use batcher::{BatchHandle, Batcher, FetchFuture};
pub use config::{BatcherConfig, DEFAULT_MAX_BATCH, DEFAULT_WAIT};
pub use error::BatchError;
