use crate::index::UrlIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, ReadRepository, Repository, Result, ShortCode, Stats,
    UrlRecord,
};
use tracing::trace;

/// In-memory implementation of the repository contract.
///
/// A single `RwLock` guards all three indices and is held for the whole of
/// every compound operation, so a record is either visible through every
/// index or through none. Sharded maps cannot give that guarantee across
/// more than one map.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<UrlIndex>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.index.read().get(code).cloned())
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.index.read().by_owner(owner))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.index.read().stats())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&self, record: UrlRecord) -> Result<AddOutcome> {
        trace!(code = %record.code, "adding record");
        self.index.write().insert(record)
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>> {
        trace!(size = records.len(), "adding record batch");
        self.index.write().insert_batch(records)
    }

    async fn delete_urls(&self, items: &[DeleteRequest]) -> Result<DeleteOutcome> {
        Ok(self.index.write().tombstone(items))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        self.index.write().clear();
        Ok(())
    }
}
