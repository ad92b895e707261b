//! URL shortener service.
//!
//! [`ShortenerService`] ties a [`Generator`](snip_generator::Generator), a
//! [`Repository`](snip_core::Repository) and a delete [`Batcher`](snip_batch::Batcher)
//! together behind the [`Shortener`] trait.

pub mod error;
pub mod service;
pub mod shortener;
pub mod validate;

pub use error::{Result, ShortenerError};
pub use service::{ShortenerService, ShortenerSettings, DEFAULT_BASE_URL};
pub use shortener::{
    BatchShortenRequest, BatchShortenResponse, OwnerUrls, ShortenOutcome, Shortener,
};
