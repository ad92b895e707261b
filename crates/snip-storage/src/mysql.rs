use async_trait::async_trait;
use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, ReadRepository, Repository, Result, ShortCode, Stats,
    StorageError, UrlRecord,
};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlConnection, MySqlPool, Row};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

// Locking read: a plain SELECT inside the transaction would use the snapshot
// taken before a concurrent insert committed and miss the conflicting row.
const SELECT_CODE_BY_URL: &str = r#"
    SELECT short_code
    FROM short_urls
    WHERE original_url = ?
    LIMIT 1
    FOR SHARE
"#;

/// MySQL implementation of the repository contract.
///
/// Every mutating operation runs in a single transaction. The transaction is
/// rolled back when the returned future is dropped before it commits, so a
/// cancelled batch leaves no partial writes behind.
///
/// Uniqueness of `original_url` is enforced by the schema; an insert that
/// trips the constraint is resolved to the existing record's code inside the
/// same transaction.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("mysql schema ready");
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn decode_record(row: &MySqlRow) -> Result<UrlRecord> {
    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let code = ShortCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))?;

    Ok(UrlRecord {
        code,
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        owner: row.try_get("user_id").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

async fn insert_in_tx(conn: &mut MySqlConnection, record: &UrlRecord) -> Result<AddOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO short_urls (short_code, original_url, user_id, deleted)
        VALUES (?, ?, ?, FALSE)
        "#,
    )
    .bind(record.code.as_str())
    .bind(record.original_url.as_str())
    .bind(record.owner.as_str())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(AddOutcome::Inserted(record.code.clone())),
        Err(err) if is_unique_violation(&err) => {
            let existing = sqlx::query(SELECT_CODE_BY_URL)
                .bind(record.original_url.as_str())
                .fetch_optional(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;

            match existing {
                Some(row) => {
                    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
                    let code =
                        ShortCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))?;
                    Ok(AddOutcome::Duplicate(code))
                }
                // The url is new, so the primary key is what collided.
                None => Err(StorageError::Conflict(record.code.to_string())),
            }
        }
        Err(err) => Err(map_sqlx_error(err)),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, original_url, user_id, deleted
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn get_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, original_url, user_id, deleted
            FROM short_urls
            WHERE user_id = ?
            ORDER BY short_code
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(decode_record).collect()
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls, COUNT(DISTINCT user_id) AS users
            FROM short_urls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: urls.max(0) as u64,
            users: users.max(0) as u64,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn add(&self, record: UrlRecord) -> Result<AddOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let outcome = insert_in_tx(&mut tx, &record).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let mut outcomes = Vec::with_capacity(records.len());
        for record in &records {
            // An error drops `tx`, which rolls the whole batch back.
            outcomes.push(insert_in_tx(&mut tx, record).await?);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(size = outcomes.len(), "committed record batch");
        Ok(outcomes)
    }

    async fn delete_urls(&self, items: &[DeleteRequest]) -> Result<DeleteOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let mut flags = Vec::with_capacity(items.len());
        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE short_urls
                SET deleted = TRUE
                WHERE short_code = ?
                  AND user_id = ?
                  AND deleted = FALSE
                "#,
            )
            .bind(item.code.as_str())
            .bind(item.owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            flags.push(result.rows_affected() > 0);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(DeleteOutcome::new(flags))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS short_urls")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
