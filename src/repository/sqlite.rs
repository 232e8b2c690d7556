//! SQLite implementation of `ReviewRepository`.
//!
//! Reviews, replies, and appeals live in explicit relational tables rather
//! than JSON blobs, for type safety and queryability. The multi-statement
//! writes of the reply and appeal workflows run inside SQLite transactions.
//!
//! # Schema Versioning
//!
//! The database uses SQLite's `user_version` pragma to track schema versions.
//! When the schema changes, increment `SCHEMA_VERSION` and add a migration
//! function in `run_migrations`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{RepositoryError, ReviewRepository};
use crate::model::{
    Appeal, AppealId, AppealStatus, OrderId, Reply, Review, ReviewId, ReviewStatus, StoreId,
};

/// Current schema version. Increment when making schema changes.
///
/// When adding a new version:
/// 1. Increment this constant
/// 2. Add a migration function `migrate_v{N}_to_v{N+1}`
/// 3. Call it from `run_migrations`
const SCHEMA_VERSION: i32 = 1;

const REVIEW_COLUMNS: &str = "review_id, order_id, user_id, store_id, score, service_score, \
                              express_score, content, pic_info, video_info, anonymous, \
                              has_reply, status";

const APPEAL_COLUMNS: &str =
    "appeal_id, review_id, store_id, content, pic_info, video_info, status";

/// SQLite-backed review repository.
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// Every operation runs its synchronous rusqlite work under
/// `tokio::task::spawn_blocking` so the async runtime is never blocked.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and runs
    /// pending migrations for databases with an older schema.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for maximum durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();

        // Ensure parent directory exists (unless it's :memory: or empty path)
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";
        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        Self::configure(&conn, is_in_memory)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory repository (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Configure durability settings.
    ///
    /// WAL mode must be verified - SQLite can silently keep DELETE mode on
    /// some filesystems (e.g., network filesystems without shared memory
    /// support). In-memory databases report "memory" as the journal mode,
    /// which is fine since they are ephemeral by design.
    fn configure(conn: &Connection, is_in_memory: bool) -> Result<(), RepositoryError> {
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        Ok(())
    }

    /// Initialize the database schema and run any pending migrations.
    fn init_schema(conn: &Connection) -> Result<(), RepositoryError> {
        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| RepositoryError::storage("read schema version", e.to_string()))?;

        if current_version > SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "check schema version",
                format!(
                    "database schema version {} is newer than supported version {}",
                    current_version, SCHEMA_VERSION
                ),
            ));
        }

        if current_version < SCHEMA_VERSION {
            Self::run_migrations(conn, current_version)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;
        }

        Ok(())
    }

    /// Run migrations from `from_version` up to `SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), RepositoryError> {
        if from_version < 1 {
            Self::migrate_v0_to_v1(conn)?;
        }

        // Future migrations go here:
        // if from_version < 2 {
        //     Self::migrate_v1_to_v2(conn)?;
        // }

        Ok(())
    }

    /// Migration v0 -> v1: Create initial schema.
    fn migrate_v0_to_v1(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                review_id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                store_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                service_score INTEGER NOT NULL,
                express_score INTEGER NOT NULL,
                content TEXT NOT NULL,
                pic_info TEXT,
                video_info TEXT,
                anonymous INTEGER NOT NULL,
                has_reply INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL CHECK(status IN (
                    'Normal', 'AppealPending', 'Hidden'
                )),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS review_replies (
                reply_id INTEGER PRIMARY KEY,
                review_id INTEGER NOT NULL REFERENCES reviews(review_id),
                store_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                pic_info TEXT,
                video_info TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_replies_review
            ON review_replies(review_id);

            CREATE TABLE IF NOT EXISTS review_appeals (
                appeal_id INTEGER PRIMARY KEY,
                review_id INTEGER NOT NULL UNIQUE REFERENCES reviews(review_id),
                store_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                pic_info TEXT,
                video_info TEXT,
                status TEXT NOT NULL CHECK(status IN (
                    'Pending', 'Sustained', 'Rejected'
                )),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create initial schema (v0 -> v1)", e.to_string()))
    }

    /// Run a closure against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("mutex poisoned");
            f(&mut *conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

/// Intermediate struct for reading review rows from the database.
struct ReviewRow {
    review_id: i64,
    order_id: i64,
    user_id: i64,
    store_id: i64,
    score: i32,
    service_score: i32,
    express_score: i32,
    content: String,
    pic_info: Option<String>,
    video_info: Option<String>,
    anonymous: bool,
    has_reply: bool,
    status: String,
}

fn read_review_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        review_id: row.get(0)?,
        order_id: row.get(1)?,
        user_id: row.get(2)?,
        store_id: row.get(3)?,
        score: row.get(4)?,
        service_score: row.get(5)?,
        express_score: row.get(6)?,
        content: row.get(7)?,
        pic_info: row.get(8)?,
        video_info: row.get(9)?,
        anonymous: row.get(10)?,
        has_reply: row.get(11)?,
        status: row.get(12)?,
    })
}

fn row_to_review(row: ReviewRow) -> Result<Review, RepositoryError> {
    let status = ReviewStatus::parse(&row.status)
        .ok_or_else(|| RepositoryError::corruption("review status"))?;

    Ok(Review {
        review_id: ReviewId(row.review_id),
        order_id: OrderId(row.order_id),
        user_id: row.user_id,
        store_id: StoreId(row.store_id),
        score: row.score,
        service_score: row.service_score,
        express_score: row.express_score,
        content: row.content,
        pic_info: row.pic_info,
        video_info: row.video_info,
        anonymous: row.anonymous,
        has_reply: row.has_reply,
        status,
    })
}

/// Intermediate struct for reading appeal rows.
struct AppealRow {
    appeal_id: i64,
    review_id: i64,
    store_id: i64,
    content: String,
    pic_info: Option<String>,
    video_info: Option<String>,
    status: String,
}

fn read_appeal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppealRow> {
    Ok(AppealRow {
        appeal_id: row.get(0)?,
        review_id: row.get(1)?,
        store_id: row.get(2)?,
        content: row.get(3)?,
        pic_info: row.get(4)?,
        video_info: row.get(5)?,
        status: row.get(6)?,
    })
}

fn row_to_appeal(row: AppealRow) -> Result<Appeal, RepositoryError> {
    let status = AppealStatus::parse(&row.status)
        .ok_or_else(|| RepositoryError::corruption("appeal status"))?;

    Ok(Appeal {
        appeal_id: AppealId(row.appeal_id),
        review_id: ReviewId(row.review_id),
        store_id: StoreId(row.store_id),
        content: row.content,
        pic_info: row.pic_info,
        video_info: row.video_info,
        status,
    })
}

#[async_trait]
impl ReviewRepository for SqliteRepository {
    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError> {
        let review = review.clone();
        self.with_conn("save review", move |conn| {
            conn.execute(
                "INSERT INTO reviews (review_id, order_id, user_id, store_id, score, \
                 service_score, express_score, content, pic_info, video_info, anonymous, \
                 has_reply, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, \
                 datetime('now'), datetime('now'))",
                params![
                    review.review_id.0,
                    review.order_id.0,
                    review.user_id,
                    review.store_id.0,
                    review.score,
                    review.service_score,
                    review.express_score,
                    review.content,
                    review.pic_info,
                    review.video_info,
                    review.anonymous,
                    review.has_reply,
                    review.status.as_str(),
                ],
            )
            .map_err(|e| RepositoryError::storage("save review", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn reviews_by_order(&self, order_id: OrderId) -> Result<Vec<Review>, RepositoryError> {
        self.with_conn("query reviews by order", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM reviews WHERE order_id = ?1",
                    REVIEW_COLUMNS
                ))
                .map_err(|e| RepositoryError::storage("prepare order query", e.to_string()))?;

            let rows = stmt
                .query_map(params![order_id.0], read_review_row)
                .map_err(|e| RepositoryError::storage("query reviews by order", e.to_string()))?;

            let mut reviews = Vec::new();
            for row in rows {
                let row =
                    row.map_err(|e| RepositoryError::storage("read review row", e.to_string()))?;
                reviews.push(row_to_review(row)?);
            }
            Ok(reviews)
        })
        .await
    }

    async fn review_by_id(&self, review_id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        self.with_conn("get review", move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM reviews WHERE review_id = ?1",
                        REVIEW_COLUMNS
                    ),
                    params![review_id.0],
                    read_review_row,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get review", e.to_string()))?;

            row.map(row_to_review).transpose()
        })
        .await
    }

    async fn save_reply_and_mark_replied(&self, reply: &Reply) -> Result<(), RepositoryError> {
        let reply = reply.clone();
        self.with_conn("save reply", move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("begin reply transaction", e.to_string()))?;

            tx.execute(
                "INSERT INTO review_replies (reply_id, review_id, store_id, content, \
                 pic_info, video_info, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
                params![
                    reply.reply_id.0,
                    reply.review_id.0,
                    reply.store_id.0,
                    reply.content,
                    reply.pic_info,
                    reply.video_info,
                ],
            )
            .map_err(|e| RepositoryError::storage("insert reply", e.to_string()))?;

            let updated = tx
                .execute(
                    "UPDATE reviews SET has_reply = 1, updated_at = datetime('now')
                     WHERE review_id = ?1",
                    params![reply.review_id.0],
                )
                .map_err(|e| RepositoryError::storage("mark review replied", e.to_string()))?;

            // Review vanished between the caller's check and this write:
            // dropping the uncommitted transaction rolls the insert back.
            if updated == 0 {
                return Err(RepositoryError::not_found("review"));
            }

            tx.commit()
                .map_err(|e| RepositoryError::storage("commit reply transaction", e.to_string()))
        })
        .await
    }

    async fn update_pending_appeal(
        &self,
        review_id: ReviewId,
        content: &str,
        pic_info: Option<&str>,
        video_info: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let content = content.to_string();
        let pic_info = pic_info.map(str::to_string);
        let video_info = video_info.map(str::to_string);
        self.with_conn("update pending appeal", move |conn| {
            let affected = conn
                .execute(
                    "UPDATE review_appeals
                     SET content = ?2, pic_info = ?3, video_info = ?4,
                         updated_at = datetime('now')
                     WHERE review_id = ?1 AND status = 'Pending'",
                    params![review_id.0, content, pic_info, video_info],
                )
                .map_err(|e| RepositoryError::storage("update pending appeal", e.to_string()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn appeal_by_review(
        &self,
        review_id: ReviewId,
    ) -> Result<Option<Appeal>, RepositoryError> {
        self.with_conn("get appeal", move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM review_appeals WHERE review_id = ?1",
                        APPEAL_COLUMNS
                    ),
                    params![review_id.0],
                    read_appeal_row,
                )
                .optional()
                .map_err(|e| RepositoryError::storage("get appeal", e.to_string()))?;

            row.map(row_to_appeal).transpose()
        })
        .await
    }

    async fn save_appeal_and_mark_review(&self, appeal: &Appeal) -> Result<(), RepositoryError> {
        let appeal = appeal.clone();
        self.with_conn("save appeal", move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| RepositoryError::storage("begin appeal transaction", e.to_string()))?;

            tx.execute(
                "INSERT INTO review_appeals (appeal_id, review_id, store_id, content, \
                 pic_info, video_info, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'), datetime('now'))",
                params![
                    appeal.appeal_id.0,
                    appeal.review_id.0,
                    appeal.store_id.0,
                    appeal.content,
                    appeal.pic_info,
                    appeal.video_info,
                    appeal.status.as_str(),
                ],
            )
            .map_err(|e| RepositoryError::storage("insert appeal", e.to_string()))?;

            let updated = tx
                .execute(
                    "UPDATE reviews SET status = ?2, updated_at = datetime('now')
                     WHERE review_id = ?1",
                    params![appeal.review_id.0, ReviewStatus::AppealPending.as_str()],
                )
                .map_err(|e| RepositoryError::storage("mark review appealed", e.to_string()))?;

            if updated == 0 {
                return Err(RepositoryError::not_found("review"));
            }

            tx.commit()
                .map_err(|e| RepositoryError::storage("commit appeal transaction", e.to_string()))
        })
        .await
    }

    async fn close_appeal(
        &self,
        review_id: ReviewId,
        appeal_status: AppealStatus,
        review_status: ReviewStatus,
    ) -> Result<Option<AppealId>, RepositoryError> {
        self.with_conn("close appeal", move |conn| {
            let tx = conn.transaction().map_err(|e| {
                RepositoryError::storage("begin adjudication transaction", e.to_string())
            })?;

            let updated = tx
                .execute(
                    "UPDATE review_appeals
                     SET status = ?2, updated_at = datetime('now')
                     WHERE review_id = ?1 AND status = 'Pending'",
                    params![review_id.0, appeal_status.as_str()],
                )
                .map_err(|e| RepositoryError::storage("close appeal", e.to_string()))?;

            if updated == 0 {
                return Ok(None);
            }

            let appeal_id: i64 = tx
                .query_row(
                    "SELECT appeal_id FROM review_appeals WHERE review_id = ?1",
                    params![review_id.0],
                    |row| row.get(0),
                )
                .map_err(|e| RepositoryError::storage("read closed appeal id", e.to_string()))?;

            let review_updated = tx
                .execute(
                    "UPDATE reviews SET status = ?2, updated_at = datetime('now')
                     WHERE review_id = ?1",
                    params![review_id.0, review_status.as_str()],
                )
                .map_err(|e| RepositoryError::storage("update review status", e.to_string()))?;

            if review_updated == 0 {
                return Err(RepositoryError::not_found("review"));
            }

            tx.commit().map_err(|e| {
                RepositoryError::storage("commit adjudication transaction", e.to_string())
            })?;

            Ok(Some(AppealId(appeal_id)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReplyId;

    fn sample_review(review_id: i64, order_id: i64, store_id: i64) -> Review {
        Review {
            review_id: ReviewId(review_id),
            order_id: OrderId(order_id),
            user_id: 1,
            store_id: StoreId(store_id),
            score: 5,
            service_score: 4,
            express_score: 3,
            content: "prompt delivery, would order again".to_string(),
            pic_info: Some("pic-a,pic-b".to_string()),
            video_info: None,
            anonymous: true,
            has_reply: false,
            status: ReviewStatus::Normal,
        }
    }

    fn sample_appeal(appeal_id: i64, review_id: i64, store_id: i64) -> Appeal {
        Appeal {
            appeal_id: AppealId(appeal_id),
            review_id: ReviewId(review_id),
            store_id: StoreId(store_id),
            content: "review contains abusive language".to_string(),
            pic_info: None,
            video_info: None,
            status: AppealStatus::Pending,
        }
    }

    fn reply_count(repo: &SqliteRepository) -> i64 {
        let conn = repo.conn.lock().expect("mutex poisoned");
        conn.query_row("SELECT COUNT(*) FROM review_replies", [], |row| row.get(0))
            .expect("should count replies")
    }

    #[tokio::test]
    async fn test_new_in_memory_initializes_schema() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");

        let version: i32 = {
            let conn = repo.conn.lock().expect("mutex poisoned");
            conn.pragma_query_value(None, "user_version", |row| row.get(0))
                .expect("should read version")
        };
        assert_eq!(version, SCHEMA_VERSION);

        let reviews = repo
            .reviews_by_order(OrderId(1))
            .await
            .expect("should query");
        assert!(reviews.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_review_roundtrip() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        let review = sample_review(10, 100, 9);

        repo.save_review(&review).await.expect("should save");

        let loaded = repo
            .review_by_id(ReviewId(10))
            .await
            .expect("should get")
            .expect("review should exist");
        assert_eq!(loaded, review);

        let by_order = repo
            .reviews_by_order(OrderId(100))
            .await
            .expect("should query");
        assert_eq!(by_order, vec![review]);
    }

    #[tokio::test]
    async fn test_get_missing_review_returns_none() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        let loaded = repo.review_by_id(ReviewId(404)).await.expect("should get");
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_duplicate_order_rejected_by_schema() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");

        let err = repo
            .save_review(&sample_review(11, 100, 9))
            .await
            .expect_err("second review for the order should fail");
        assert!(matches!(err, RepositoryError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_reply_transaction_sets_flag() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");

        let reply = Reply {
            reply_id: ReplyId(20),
            review_id: ReviewId(10),
            store_id: StoreId(9),
            content: "thanks for the kind words".to_string(),
            pic_info: None,
            video_info: None,
        };
        repo.save_reply_and_mark_replied(&reply)
            .await
            .expect("should save reply");

        let review = repo
            .review_by_id(ReviewId(10))
            .await
            .expect("should get")
            .expect("review should exist");
        assert!(review.has_reply);
        assert_eq!(reply_count(&repo), 1);
    }

    #[tokio::test]
    async fn test_reply_transaction_rolls_back_when_review_missing() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");

        let reply = Reply {
            reply_id: ReplyId(20),
            review_id: ReviewId(999),
            store_id: StoreId(9),
            content: "orphaned".to_string(),
            pic_info: None,
            video_info: None,
        };
        let err = repo
            .save_reply_and_mark_replied(&reply)
            .await
            .expect_err("should fail");
        assert!(matches!(err, RepositoryError::NotFound { entity: "review" }));

        // The insert must not survive the aborted transaction.
        assert_eq!(reply_count(&repo), 0);
    }

    #[tokio::test]
    async fn test_appeal_insert_marks_review() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");

        repo.save_appeal_and_mark_review(&sample_appeal(30, 10, 9))
            .await
            .expect("should save appeal");

        let review = repo
            .review_by_id(ReviewId(10))
            .await
            .expect("should get")
            .expect("review should exist");
        assert_eq!(review.status, ReviewStatus::AppealPending);

        let appeal = repo
            .appeal_by_review(ReviewId(10))
            .await
            .expect("should get appeal")
            .expect("appeal should exist");
        assert_eq!(appeal.status, AppealStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_pending_appeal_only_touches_pending_rows() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");

        // No appeal yet: nothing to update.
        let affected = repo
            .update_pending_appeal(ReviewId(10), "edited", None, None)
            .await
            .expect("should update");
        assert_eq!(affected, 0);

        repo.save_appeal_and_mark_review(&sample_appeal(30, 10, 9))
            .await
            .expect("should save appeal");

        let affected = repo
            .update_pending_appeal(ReviewId(10), "edited", Some("pic"), None)
            .await
            .expect("should update");
        assert_eq!(affected, 1);

        let appeal = repo
            .appeal_by_review(ReviewId(10))
            .await
            .expect("should get appeal")
            .expect("appeal should exist");
        assert_eq!(appeal.content, "edited");
        assert_eq!(appeal.pic_info.as_deref(), Some("pic"));
        // In-place update never creates a second identifier.
        assert_eq!(appeal.appeal_id, AppealId(30));

        repo.close_appeal(ReviewId(10), AppealStatus::Rejected, ReviewStatus::Normal)
            .await
            .expect("should close");

        let affected = repo
            .update_pending_appeal(ReviewId(10), "too late", None, None)
            .await
            .expect("should update");
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_close_appeal_updates_both_rows() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");
        repo.save_appeal_and_mark_review(&sample_appeal(30, 10, 9))
            .await
            .expect("should save appeal");

        let closed = repo
            .close_appeal(ReviewId(10), AppealStatus::Sustained, ReviewStatus::Hidden)
            .await
            .expect("should close");
        assert_eq!(closed, Some(AppealId(30)));

        let review = repo
            .review_by_id(ReviewId(10))
            .await
            .expect("should get")
            .expect("review should exist");
        assert_eq!(review.status, ReviewStatus::Hidden);

        let appeal = repo
            .appeal_by_review(ReviewId(10))
            .await
            .expect("should get appeal")
            .expect("appeal should exist");
        assert_eq!(appeal.status, AppealStatus::Sustained);

        // Already closed: a second adjudication writes nothing.
        let closed_again = repo
            .close_appeal(ReviewId(10), AppealStatus::Rejected, ReviewStatus::Normal)
            .await
            .expect("should close");
        assert_eq!(closed_again, None);
        let review = repo
            .review_by_id(ReviewId(10))
            .await
            .expect("should get")
            .expect("review should exist");
        assert_eq!(review.status, ReviewStatus::Hidden);
    }

    #[tokio::test]
    async fn test_close_appeal_without_appeal_returns_none() {
        let repo = SqliteRepository::new_in_memory().expect("should create in-memory db");
        repo.save_review(&sample_review(10, 100, 9))
            .await
            .expect("should save");

        let closed = repo
            .close_appeal(ReviewId(10), AppealStatus::Sustained, ReviewStatus::Hidden)
            .await
            .expect("should close");
        assert_eq!(closed, None);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        // Opening the same database twice should not fail
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("review_test_idempotent_{}.db", std::process::id()));

        {
            let _repo = SqliteRepository::new(&db_path).expect("first open should succeed");
        }
        {
            let _repo = SqliteRepository::new(&db_path).expect("second open should succeed");
        }

        std::fs::remove_file(&db_path).ok();
    }

    #[test]
    fn test_rejects_newer_schema_version() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("review_test_version_{}.db", std::process::id()));

        {
            let conn = Connection::open(&db_path).expect("should open");
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .expect("should set version");
        }

        match SqliteRepository::new(&db_path) {
            Ok(_) => panic!("should reject newer schema version"),
            Err(e) => assert!(e.to_string().contains("newer than supported")),
        }

        std::fs::remove_file(&db_path).ok();
    }
}
