use crate::error::Result;
use async_trait::async_trait;
use snip_core::{AddOutcome, ShortCode, Stats, UrlRecord};

/// What `shorten` did with a url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    /// A new record was stored under this code.
    Created(ShortCode),
    /// The url was already stored; this is its existing code.
    Existing(ShortCode),
}

impl ShortenOutcome {
    pub fn code(&self) -> &ShortCode {
        match self {
            ShortenOutcome::Created(code) | ShortenOutcome::Existing(code) => code,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, ShortenOutcome::Existing(_))
    }
}

impl From<AddOutcome> for ShortenOutcome {
    fn from(value: AddOutcome) -> Self {
        match value {
            AddOutcome::Inserted(code) => ShortenOutcome::Created(code),
            AddOutcome::Duplicate(code) => ShortenOutcome::Existing(code),
        }
    }
}

/// One url of a batch, tagged with an id chosen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShortenRequest {
    pub correlation_id: String,
    pub original_url: String,
}

impl BatchShortenRequest {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// The result for one [`BatchShortenRequest`], carrying its correlation id.
#[derive(Debug, Clone)]
pub struct BatchShortenResponse {
    pub correlation_id: String,
    pub outcome: Result<ShortenOutcome>,
}

/// The urls an owner has shortened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerUrls {
    /// The owner has never stored a url.
    Empty,
    Urls(Vec<UrlRecord>),
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Stores `original_url` for `owner`, or finds the record already
    /// holding it.
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<ShortenOutcome>;

    /// Shortens many urls at once.
    ///
    /// Invalid urls fail individually and are never stored; the rest are
    /// written together. Responses keep the request order. A storage error
    /// fails the whole call.
    async fn shorten_batch(
        &self,
        requests: Vec<BatchShortenRequest>,
        owner: &str,
    ) -> Result<Vec<BatchShortenResponse>>;

    /// Resolves a code to its record.
    ///
    /// Fails with `NotFound` for an unknown code and `Gone` for a deleted one.
    async fn expand(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Lists every url first stored by `owner`, deleted ones included.
    async fn expand_user(&self, owner: &str) -> Result<OwnerUrls>;

    /// Queues the codes for deletion on behalf of `owner` and returns at once
    /// with the number queued. Codes `owner` does not own are skipped when
    /// the batch runs.
    async fn delete_batch(&self, codes: Vec<ShortCode>, owner: &str) -> usize;

    async fn stats(&self) -> Result<Stats>;

    async fn ping(&self) -> Result<()>;
}
