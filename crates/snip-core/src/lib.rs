//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the record model, the short code type and the
//! repository contracts shared by the storage backends and the service.

pub mod base62;
pub mod error;
pub mod record;
pub mod repository;
pub mod shortcode;

pub use error::{CoreError, Result, StorageError};
pub use record::{AddOutcome, DeleteOutcome, DeleteRequest, Stats, UrlRecord};
pub use repository::{ReadRepository, Repository};
pub use shortcode::ShortCode;
