use crate::{FileRepository, InMemoryRepository, MySqlRepository};
use async_trait::async_trait;
use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, ReadRepository, Repository, Result, ShortCode, Stats,
    UrlRecord,
};

/// A storage backend chosen at runtime.
///
/// Lets one concrete service type sit on top of whichever repository the
/// configuration asks for.
#[derive(Debug)]
pub enum Backend {
    InMemory(InMemoryRepository),
    File(FileRepository),
    MySql(MySqlRepository),
}

impl Backend {
    fn inner(&self) -> &dyn Repository {
        match self {
            Backend::InMemory(repo) => repo,
            Backend::File(repo) => repo,
            Backend::MySql(repo) => repo,
        }
    }

    /// Short name of the active backend, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::InMemory(_) => "in-memory",
            Backend::File(_) => "file",
            Backend::MySql(_) => "mysql",
        }
    }
}

impl From<InMemoryRepository> for Backend {
    fn from(value: InMemoryRepository) -> Self {
        Backend::InMemory(value)
    }
}

impl From<FileRepository> for Backend {
    fn from(value: FileRepository) -> Self {
        Backend::File(value)
    }
}

impl From<MySqlRepository> for Backend {
    fn from(value: MySqlRepository) -> Self {
        Backend::MySql(value)
    }
}

#[async_trait]
impl ReadRepository for Backend {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        self.inner().get(code).await
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        self.inner().get_by_owner(owner).await
    }

    async fn stats(&self) -> Result<Stats> {
        self.inner().stats().await
    }

    async fn ping(&self) -> Result<()> {
        self.inner().ping().await
    }
}

#[async_trait]
impl Repository for Backend {
    async fn add(&self, record: UrlRecord) -> Result<AddOutcome> {
        self.inner().add(record).await
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>> {
        self.inner().add_batch(records).await
    }

    async fn delete_urls(&self, items: &[DeleteRequest]) -> Result<DeleteOutcome> {
        self.inner().delete_urls(items).await
    }

    async fn close(&self) -> Result<()> {
        self.inner().close().await
    }

    async fn purge(&self) -> Result<()> {
        self.inner().purge().await
    }
}
