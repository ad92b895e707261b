use crate::error::Result;
use crate::record::{AddOutcome, DeleteOutcome, DeleteRequest, Stats, UrlRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// A read-only view of a repository.
///
/// This trait provides only the read operations from [`Repository`].
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record for a given short code.
    ///
    /// Returns `None` if the code does not exist. A tombstoned record is
    /// still returned, with `deleted` set.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Returns every record first submitted by `owner`, or an empty vec.
    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    /// Counts stored records and distinct owners.
    async fn stats(&self) -> Result<Stats>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;
}

/// The full storage contract.
///
/// Implementations keep the by-code, by-owner and by-url indices in step:
/// every method below is atomic with respect to every other method on the
/// same instance.
#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts `record` unless its URL is already stored.
    ///
    /// A known URL yields [`AddOutcome::Duplicate`] carrying the existing code
    /// and leaves every index untouched. Returns `Err(Conflict)` if the code is
    /// already held by a record for a different URL.
    async fn add(&self, record: UrlRecord) -> Result<AddOutcome>;

    /// Applies the [`add`](Repository::add) rule to every record as one unit.
    ///
    /// Outcomes are aligned with `records`. Any hard error discards the whole
    /// batch; duplicates do not.
    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>>;

    /// Tombstones each requested record whose owner matches the request.
    ///
    /// Unknown codes, owner mismatches and already deleted records are
    /// skipped silently and reported as `false` in the outcome.
    async fn delete_urls(&self, items: &[DeleteRequest]) -> Result<DeleteOutcome>;

    /// Releases resources held by the repository.
    async fn close(&self) -> Result<()>;

    /// Removes every record. Whole-store teardown only.
    async fn purge(&self) -> Result<()>;
}
