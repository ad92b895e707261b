use crate::error::{Result, ShortenerError};
use crate::shortener::{
    BatchShortenRequest, BatchShortenResponse, OwnerUrls, ShortenOutcome, Shortener,
};
use crate::validate::validate_url;
use async_trait::async_trait;
use snip_batch::{BatchHandle, Batcher, BatcherConfig};
use snip_core::{DeleteRequest, Repository, ShortCode, Stats, StorageError, UrlRecord};
use snip_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

type DeleteBatcher = Batcher<DeleteRequest, usize, StorageError>;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Prefix of every short url handed out.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Windowing of queued deletes.
    #[builder(default)]
    pub delete_batch: BatcherConfig,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The [`Shortener`] over a repository and a code generator.
///
/// Codes are derived from the url alone, so shortening a known url returns
/// its existing code no matter who asks. Deletes are queued on a [`Batcher`]
/// and applied in windows through [`Repository::delete_urls`].
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    deleter: DeleteBatcher,
    base_url: String,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G, settings: ShortenerSettings) -> Self {
        let repository = Arc::new(repository);

        let repo = Arc::clone(&repository);
        let deleter = Batcher::new(settings.delete_batch, move |items: Vec<DeleteRequest>| {
            let repo = Arc::clone(&repo);
            async move {
                let outcome = repo.delete_urls(&items).await?;
                let counts = outcome.into_flags().into_iter().map(usize::from);
                Ok::<_, StorageError>(counts.collect::<Vec<usize>>())
            }
        });

        Self {
            repository,
            generator: Arc::new(generator),
            deleter,
            base_url: settings.base_url,
        }
    }

    /// The full short url for `code`.
    pub fn build_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    /// Applies every queued delete, then closes the repository.
    pub async fn shutdown(&self) -> Result<()> {
        self.deleter.shutdown().await;
        self.repository.close().await?;
        info!("shortener service stopped");
        Ok(())
    }

    fn record_for(&self, original_url: String, owner: &str) -> UrlRecord {
        let code = self.generator.generate(&original_url);
        UrlRecord::new(code, original_url, owner)
    }
}

/// Sums the per-item results of one `delete_batch` call once they arrive.
async fn collect_deletes(handles: Vec<BatchHandle<usize, StorageError>>, owner: String) {
    let queued = handles.len();
    let mut deleted = 0;
    for handle in handles {
        match handle.await {
            Ok(count) => deleted += count,
            Err(e) => warn!(owner = %owner, error = %e, "queued delete failed"),
        }
    }
    debug!(owner = %owner, queued, deleted, "delete batch applied");
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<ShortenOutcome> {
        validate_url(original_url)?;

        let record = self.record_for(original_url.to_string(), owner);
        let outcome = ShortenOutcome::from(self.repository.add(record).await?);
        debug!(code = %outcome.code(), existing = outcome.is_existing(), "shortened url");
        Ok(outcome)
    }

    async fn shorten_batch(
        &self,
        requests: Vec<BatchShortenRequest>,
        owner: &str,
    ) -> Result<Vec<BatchShortenResponse>> {
        let mut ids = Vec::with_capacity(requests.len());
        let mut rejected = Vec::with_capacity(requests.len());
        let mut records = Vec::new();

        for request in requests {
            ids.push(request.correlation_id);
            match validate_url(&request.original_url) {
                Ok(()) => {
                    records.push(self.record_for(request.original_url, owner));
                    rejected.push(None);
                }
                Err(e) => rejected.push(Some(e)),
            }
        }

        let stored = if records.is_empty() {
            Vec::new()
        } else {
            self.repository.add_batch(records).await?
        };
        debug!(size = ids.len(), stored = stored.len(), "shortened batch");

        let mut stored = stored.into_iter();
        let responses = ids
            .into_iter()
            .zip(rejected)
            .map(|(correlation_id, rejection)| {
                let outcome = match rejection {
                    Some(e) => Err(e),
                    None => stored.next().map(ShortenOutcome::from).ok_or_else(|| {
                        ShortenerError::Storage(StorageError::InvalidData(
                            "batch insert returned too few outcomes".to_string(),
                        ))
                    }),
                };
                BatchShortenResponse {
                    correlation_id,
                    outcome,
                }
            })
            .collect();

        Ok(responses)
    }

    async fn expand(&self, code: &ShortCode) -> Result<UrlRecord> {
        match self.repository.get(code).await? {
            None => Err(ShortenerError::NotFound(code.to_string())),
            Some(record) if record.deleted => Err(ShortenerError::Gone(code.to_string())),
            Some(record) => Ok(record),
        }
    }

    async fn expand_user(&self, owner: &str) -> Result<OwnerUrls> {
        let records = self.repository.get_by_owner(owner).await?;
        if records.is_empty() {
            return Ok(OwnerUrls::Empty);
        }
        Ok(OwnerUrls::Urls(records))
    }

    async fn delete_batch(&self, codes: Vec<ShortCode>, owner: &str) -> usize {
        let handles = self
            .deleter
            .submit_all(codes.into_iter().map(|code| DeleteRequest::new(code, owner)));
        let queued = handles.len();

        tokio::spawn(collect_deletes(handles, owner.to_string()));
        debug!(owner = %owner, queued, "queued deletes");
        queued
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.stats().await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.repository.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_generator::DigestGenerator;
    use snip_storage::{FileRepository, FileSettings, InMemoryRepository};
    use std::time::Duration;

    fn settings(max_batch: usize) -> ShortenerSettings {
        ShortenerSettings::builder()
            .base_url("https://sn.ip/")
            .delete_batch(
                BatcherConfig::builder()
                    .max_batch(max_batch)
                    .wait(Duration::from_millis(50))
                    .build(),
            )
            .build()
    }

    fn test_service() -> ShortenerService<InMemoryRepository, DigestGenerator> {
        ShortenerService::new(InMemoryRepository::new(), DigestGenerator::new(), settings(200))
    }

    #[tokio::test]
    async fn shorten_uses_content_code() {
        let service = test_service();

        let outcome = service.shorten("https://github.com/", "owner1").await.unwrap();

        assert_eq!(outcome, ShortenOutcome::Created(ShortCode::new_unchecked("vRveliyDLz8")));
        assert_eq!(
            service.build_url(outcome.code()),
            "https://sn.ip/vRveliyDLz8"
        );
    }

    #[tokio::test]
    async fn shorten_twice_returns_existing_code() {
        let service = test_service();

        let first = service.shorten("https://a.com", "owner1").await.unwrap();
        let second = service.shorten("https://a.com", "owner2").await.unwrap();

        assert!(!first.is_existing());
        assert_eq!(second, ShortenOutcome::Existing(first.code().clone()));
        assert_eq!(service.stats().await.unwrap(), Stats { urls: 1, users: 1 });
    }

    #[tokio::test]
    async fn shorten_rejects_invalid_url_before_storage() {
        let service = test_service();

        let err = service.shorten("ftp://a.com", "owner1").await.unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert_eq!(service.stats().await.unwrap(), Stats::default());
    }

    #[tokio::test]
    async fn expand_round_trips() {
        let service = test_service();
        let outcome = service.shorten("https://example.com", "owner1").await.unwrap();

        let record = service.expand(outcome.code()).await.unwrap();

        assert_eq!(record.original_url, "https://example.com");
        assert_eq!(record.owner, "owner1");
        assert!(!record.deleted);
    }

    #[tokio::test]
    async fn expand_unknown_is_not_found() {
        let service = test_service();
        let err = service
            .expand(&ShortCode::new_unchecked("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_code_is_gone() {
        let service = test_service();
        let code = service
            .shorten("https://a.com", "owner1")
            .await
            .unwrap()
            .code()
            .clone();

        assert_eq!(service.delete_batch(vec![code.clone()], "owner1").await, 1);
        service.shutdown().await.unwrap();

        let err = service.expand(&code).await.unwrap_err();
        assert!(matches!(err, ShortenerError::Gone(_)));
    }

    #[tokio::test]
    async fn delete_by_other_owner_is_ignored() {
        let service = test_service();
        let code = service
            .shorten("https://a.com", "owner1")
            .await
            .unwrap()
            .code()
            .clone();

        service.delete_batch(vec![code.clone()], "owner2").await;
        service.shutdown().await.unwrap();

        assert!(!service.expand(&code).await.unwrap().deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_applies_after_the_window() {
        let service = test_service();
        let code = service
            .shorten("https://a.com", "owner1")
            .await
            .unwrap()
            .code()
            .clone();

        service.delete_batch(vec![code.clone()], "owner1").await;
        // still queued
        assert!(service.expand(&code).await.is_ok());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            service.expand(&code).await,
            Err(ShortenerError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn deletes_from_many_calls_share_windows() {
        let service = ShortenerService::new(
            InMemoryRepository::new(),
            DigestGenerator::new(),
            settings(2),
        );
        let mut codes = Vec::new();
        for i in 0..5 {
            let outcome = service
                .shorten(&format!("https://example.com/{i}"), "owner1")
                .await
                .unwrap();
            codes.push(outcome.code().clone());
        }

        for code in &codes {
            service.delete_batch(vec![code.clone()], "owner1").await;
        }
        service.shutdown().await.unwrap();

        for code in &codes {
            assert!(service.expand(code).await.is_err());
        }
    }

    #[tokio::test]
    async fn shorten_batch_reports_each_item() {
        let service = test_service();
        service.shorten("https://old.com", "owner1").await.unwrap();

        let responses = service
            .shorten_batch(
                vec![
                    BatchShortenRequest::new("1", "https://new.com"),
                    BatchShortenRequest::new("2", "not a url"),
                    BatchShortenRequest::new("3", "https://old.com"),
                ],
                "owner1",
            )
            .await
            .unwrap();

        let ids: Vec<_> = responses.iter().map(|r| r.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(matches!(responses[0].outcome, Ok(ShortenOutcome::Created(_))));
        assert!(matches!(responses[1].outcome, Err(ShortenerError::InvalidUrl(_))));
        assert!(matches!(responses[2].outcome, Ok(ShortenOutcome::Existing(_))));
        assert_eq!(service.stats().await.unwrap().urls, 2);
    }

    #[tokio::test]
    async fn shorten_batch_of_only_invalid_urls_stores_nothing() {
        let service = test_service();

        let responses = service
            .shorten_batch(vec![BatchShortenRequest::new("a", "")], "owner1")
            .await
            .unwrap();

        assert_eq!(responses.len(), 1);
        assert!(responses[0].outcome.is_err());
        assert_eq!(service.stats().await.unwrap(), Stats::default());
    }

    #[tokio::test]
    async fn expand_user_distinguishes_empty() {
        let service = test_service();
        assert_eq!(service.expand_user("owner1").await.unwrap(), OwnerUrls::Empty);

        service.shorten("https://a.com", "owner1").await.unwrap();
        service.shorten("https://b.com", "owner1").await.unwrap();

        match service.expand_user("owner1").await.unwrap() {
            OwnerUrls::Urls(records) => assert_eq!(records.len(), 2),
            OwnerUrls::Empty => panic!("expected urls"),
        }
    }

    #[tokio::test]
    async fn code_collision_surfaces_as_conflict() {
        struct Constant;
        impl Generator for Constant {
            fn generate(&self, _content: &str) -> ShortCode {
                ShortCode::new_unchecked("same")
            }
        }

        let service = ShortenerService::new(InMemoryRepository::new(), Constant, settings(200));
        service.shorten("https://a.com", "owner1").await.unwrap();

        let err = service.shorten("https://b.com", "owner1").await.unwrap_err();
        assert!(matches!(err, ShortenerError::Conflict(_)));
    }

    #[tokio::test]
    async fn shutdown_persists_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let file_settings = || {
            FileSettings::builder()
                .path(dir.path().join("urls.json"))
                .snapshot_interval(Duration::ZERO)
                .build()
        };

        let service = ShortenerService::new(
            FileRepository::open(file_settings()).await.unwrap(),
            DigestGenerator::new(),
            settings(200),
        );
        let code = service
            .shorten("https://a.com", "owner1")
            .await
            .unwrap()
            .code()
            .clone();
        service.delete_batch(vec![code.clone()], "owner1").await;
        service.shutdown().await.unwrap();

        let reopened = ShortenerService::new(
            FileRepository::open(file_settings()).await.unwrap(),
            DigestGenerator::new(),
            settings(200),
        );
        assert!(matches!(
            reopened.expand(&code).await,
            Err(ShortenerError::Gone(_))
        ));
        reopened.ping().await.unwrap();
    }
}
