use crate::index::UrlIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, ReadRepository, Repository, Result, ShortCode, Stats,
    StorageError, UrlRecord,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Configures a [`FileRepository`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct FileSettings {
    /// Snapshot file, one JSON record per line.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// How often the whole cache is written back to `path`.
    ///
    /// `Duration::ZERO` disables periodic snapshots; the file is then only
    /// written by [`FileRepository::snapshot`] and on close.
    #[builder(default = Duration::from_secs(60))]
    pub snapshot_interval: Duration,
}

struct Shared {
    path: PathBuf,
    index: RwLock<UrlIndex>,
    // Serializes snapshot writers; never held by the request path.
    write_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    // Set once the final snapshot after close has reached disk.
    flushed: AtomicBool,
}

impl Shared {
    async fn snapshot(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot().await
    }

    /// Writes the final snapshot unless one already succeeded. Returns
    /// whether this call wrote it.
    async fn flush(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.flushed.load(Ordering::Acquire) {
            return Ok(false);
        }
        self.write_snapshot().await?;
        self.flushed.store(true, Ordering::Release);
        Ok(true)
    }

    // Callers hold `write_lock`.
    async fn write_snapshot(&self) -> Result<usize> {
        let (buf, count) = {
            let index = self.index.read();
            encode_snapshot(&index)?
        };

        // Truncate and rewrite the whole set.
        tokio::fs::write(&self.path, buf).await?;
        debug!(path = %self.path.display(), records = count, "snapshot written");
        Ok(count)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

/// A file-backed repository.
///
/// All reads and writes are served from an in-process [`UrlIndex`] guarded
/// by one lock, exactly as [`InMemoryRepository`](crate::InMemoryRepository)
/// does. The cache is loaded from a newline-delimited JSON file on open and
/// written back whole on a fixed interval and on close. Records mutated after
/// the last snapshot are lost if the process dies before the next one.
pub struct FileRepository {
    shared: Arc<Shared>,
    shutdown: Arc<Notify>,
    snapshotter: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for FileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRepository")
            .field("path", &self.shared.path)
            .field("closed", &self.shared.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl FileRepository {
    /// Opens (or creates) the snapshot file, loads it and starts the periodic
    /// snapshot task. Must be called from within a tokio runtime.
    pub async fn open(settings: FileSettings) -> Result<Self> {
        let index = load_snapshot(&settings.path).await?;
        info!(
            path = %settings.path.display(),
            records = index.len(),
            "loaded url snapshot"
        );

        let shared = Arc::new(Shared {
            path: settings.path,
            index: RwLock::new(index),
            write_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            flushed: AtomicBool::new(false),
        });
        let shutdown = Arc::new(Notify::new());

        let snapshotter = if settings.snapshot_interval.is_zero() {
            None
        } else {
            Some(tokio::spawn(run_snapshots(
                Arc::clone(&shared),
                settings.snapshot_interval,
                Arc::clone(&shutdown),
            )))
        };

        Ok(Self {
            shared,
            shutdown,
            snapshotter: parking_lot::Mutex::new(snapshotter),
        })
    }

    /// Writes the current cache to disk now. Returns the number of records
    /// written.
    pub async fn snapshot(&self) -> Result<usize> {
        self.shared.snapshot().await
    }

    /// Returns the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    async fn stop_snapshotter(&self) {
        self.shutdown.notify_one();
        let handle = self.snapshotter.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "snapshot task ended abnormally");
            }
        }
    }
}

impl Drop for FileRepository {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn run_snapshots(shared: Arc<Shared>, every: Duration, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the file was just loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = shared.snapshot().await {
                    warn!(path = %shared.path.display(), error = %e, "periodic snapshot failed");
                }
            }
            _ = shutdown.notified() => {
                trace!(path = %shared.path.display(), "snapshot task stopping");
                break;
            }
        }
    }
}

async fn load_snapshot(path: &Path) -> Result<UrlIndex> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tokio::fs::write(path, b"").await?;
            return Ok(UrlIndex::new());
        }
        Err(e) => return Err(e.into()),
    };

    let records = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<UrlRecord>(line).map_err(|e| {
                StorageError::InvalidData(format!(
                    "{}:{}: invalid record: {e}",
                    path.display(),
                    n + 1
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    UrlIndex::from_records(records)
}

fn encode_snapshot(index: &UrlIndex) -> Result<(Vec<u8>, usize)> {
    let records = index.records();
    let mut buf = Vec::with_capacity(records.len() * 96);
    for record in &records {
        serde_json::to_writer(&mut buf, record)
            .map_err(|e| StorageError::InvalidData(format!("failed to encode record: {e}")))?;
        buf.push(b'\n');
    }
    Ok((buf, records.len()))
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.shared.index.read().get(code).cloned())
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.shared.index.read().by_owner(owner))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.shared.index.read().stats())
    }

    async fn ping(&self) -> Result<()> {
        tokio::fs::metadata(&self.shared.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn add(&self, record: UrlRecord) -> Result<AddOutcome> {
        self.shared.ensure_open()?;
        trace!(code = %record.code, "adding record");
        self.shared.index.write().insert(record)
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>> {
        self.shared.ensure_open()?;
        trace!(size = records.len(), "adding record batch");
        self.shared.index.write().insert_batch(records)
    }

    async fn delete_urls(&self, items: &[DeleteRequest]) -> Result<DeleteOutcome> {
        self.shared.ensure_open()?;
        Ok(self.shared.index.write().tombstone(items))
    }

    /// Stops the periodic task and writes a final snapshot.
    ///
    /// Writes are rejected from the first call on. If the final snapshot
    /// fails, the error is returned and the next call tries again.
    async fn close(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::Release);
        self.stop_snapshotter().await;
        if self.shared.flush().await? {
            info!(path = %self.shared.path.display(), "file repository closed");
        }
        Ok(())
    }

    /// Drops every record and deletes the snapshot file. The repository is
    /// closed afterwards.
    async fn purge(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::Release);
        self.stop_snapshotter().await;

        let _guard = self.shared.write_lock.lock().await;
        self.shared.index.write().clear();
        // Nothing left to write; a later close must not recreate the file.
        self.shared.flushed.store(true, Ordering::Release);
        match tokio::fs::remove_file(&self.shared.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
