use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use snip_storage::{
    AddOutcome, DeleteRequest, MySqlRepository, ReadRepository, Repository, ShortCode, Stats,
    StorageError, UrlRecord,
};
use snip_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MysqlConfig::builder().build())
            .await
            .expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        let repo = MySqlRepository::new(pool);
        repo.migrate().await.expect("create schema");

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    // the image restarts mysqld once after initialising the data directory
    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

fn record(c: &str, url: &str, owner: &str) -> UrlRecord {
    UrlRecord::new(code(c), url, owner)
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn add_and_get_round_trip() {
    let fixture = Fixture::start().await;

    let outcome = fixture
        .repo
        .add(record("abc123", "https://example.com", "owner1"))
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Inserted(code("abc123")));

    let got = fixture.repo.get(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(got.original_url, "https://example.com");
    assert_eq!(got.owner, "owner1");
    assert!(!got.deleted);

    assert!(fixture.repo.get(&code("missing")).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn duplicate_url_resolves_to_existing_code() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .add(record("abc123", "https://example.com", "owner1"))
        .await
        .unwrap();
    let outcome = fixture
        .repo
        .add(record("abc123", "https://example.com", "owner2"))
        .await
        .unwrap();

    assert_eq!(outcome, AddOutcome::Duplicate(code("abc123")));
    assert!(fixture.repo.get_by_owner("owner2").await.unwrap().is_empty());
    assert_eq!(fixture.repo.stats().await.unwrap(), Stats { urls: 1, users: 1 });
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn code_held_by_other_url_conflicts() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .add(record("abc123", "https://a.com", "owner1"))
        .await
        .unwrap();
    let err = fixture
        .repo
        .add(record("abc123", "https://b.com", "owner1"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn failed_batch_is_rolled_back() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add(record("taken", "https://a.com", "owner1"))
        .await
        .unwrap();

    let err = fixture
        .repo
        .add_batch(vec![
            record("n1", "https://n1.com", "owner2"),
            record("taken", "https://other.com", "owner2"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
    assert!(fixture.repo.get(&code("n1")).await.unwrap().is_none());
    assert_eq!(fixture.repo.stats().await.unwrap(), Stats { urls: 1, users: 1 });
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn batch_reports_duplicates_per_item() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add(record("old", "https://old.com", "owner1"))
        .await
        .unwrap();

    let outcomes = fixture
        .repo
        .add_batch(vec![
            record("n1", "https://n1.com", "owner1"),
            record("other", "https://old.com", "owner1"),
        ])
        .await
        .unwrap();

    assert_eq!(
        outcomes,
        vec![
            AddOutcome::Inserted(code("n1")),
            AddOutcome::Duplicate(code("old")),
        ]
    );
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn delete_checks_owner_and_counts_once() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add_batch(vec![
            record("c1", "https://a.com", "owner1"),
            record("c2", "https://b.com", "owner1"),
        ])
        .await
        .unwrap();

    let outcome = fixture
        .repo
        .delete_urls(&[
            DeleteRequest::new(code("c1"), "owner1"),
            DeleteRequest::new(code("c2"), "owner2"),
            DeleteRequest::new(code("missing"), "owner1"),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.into_flags(), vec![true, false, false]);

    let again = fixture
        .repo
        .delete_urls(&[DeleteRequest::new(code("c1"), "owner1")])
        .await
        .unwrap();
    assert_eq!(again.mutated_count(), 0);

    assert!(fixture.repo.get(&code("c1")).await.unwrap().unwrap().deleted);
    assert!(!fixture.repo.get(&code("c2")).await.unwrap().unwrap().deleted);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn owner_listing_and_stats() {
    let fixture = Fixture::start().await;
    fixture
        .repo
        .add_batch(vec![
            record("c1", "https://a.com", "owner1"),
            record("c2", "https://b.com", "owner1"),
            record("c3", "https://c.com", "owner2"),
        ])
        .await
        .unwrap();

    let listed = fixture.repo.get_by_owner("owner1").await.unwrap();
    let codes: Vec<_> = listed.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["c1", "c2"]);
    assert_eq!(fixture.repo.stats().await.unwrap(), Stats { urls: 3, users: 2 });

    fixture.repo.ping().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn concurrent_batches_with_shared_urls_both_commit() {
    let fixture = Fixture::start().await;

    for round in 0..10 {
        // Each batch opens with an already stored url, so its read view is
        // taken before the other batch commits the shared ones.
        let seed_url = format!("https://seed.example/{round}");
        let seed = code(&format!("s{round}"));
        fixture
            .repo
            .add(UrlRecord::new(seed.clone(), seed_url.as_str(), "seeder"))
            .await
            .unwrap();

        let shared: Vec<String> = (0..5)
            .map(|i| format!("https://shared.example/{round}/{i}"))
            .collect();
        let batch = |side: &str| -> Vec<UrlRecord> {
            std::iter::once(record(&format!("{side}{round}s"), &seed_url, side))
                .chain(
                    shared
                        .iter()
                        .enumerate()
                        .map(|(i, url)| record(&format!("{side}{round}x{i}"), url, side)),
                )
                .collect()
        };

        let left = fixture.repo.clone();
        let right = fixture.repo.clone();
        let left_batch = batch("l");
        let right_batch = batch("r");
        let (left, right) = tokio::join!(
            tokio::spawn(async move { left.add_batch(left_batch).await }),
            tokio::spawn(async move { right.add_batch(right_batch).await }),
        );
        let left = left.unwrap().expect("left batch commits");
        let right = right.unwrap().expect("right batch commits");

        assert_eq!(left[0], AddOutcome::Duplicate(seed.clone()));
        assert_eq!(right[0], AddOutcome::Duplicate(seed.clone()));

        for (l, r) in left[1..].iter().zip(&right[1..]) {
            match (l, r) {
                (AddOutcome::Inserted(won), AddOutcome::Duplicate(existing))
                | (AddOutcome::Duplicate(existing), AddOutcome::Inserted(won)) => {
                    assert_eq!(won, existing);
                }
                other => panic!("expected one insert and one duplicate, got {other:?}"),
            }
        }

        for (i, url) in shared.iter().enumerate() {
            let got = fixture.repo.get(left[i + 1].code()).await.unwrap().unwrap();
            assert_eq!(&got.original_url, url);
        }
    }
}
