//! Repository abstraction for review persistence.
//!
//! This module defines the `ReviewRepository` trait that abstracts storage
//! operations for reviews, replies, and appeals. Implementations can provide
//! different backends (in-memory, SQLite).

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Appeal, AppealId, AppealStatus, OrderId, Reply, Review, ReviewId, ReviewStatus};

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store failed; not locally recoverable.
    #[error("storage failure during {operation}: {detail}")]
    Storage { operation: String, detail: String },

    /// A row a transactional write depends on is gone.
    #[error("{entity} row not found")]
    NotFound { entity: &'static str },

    /// A persisted value could not be interpreted.
    #[error("corrupt stored data: {what}")]
    Corruption { what: &'static str },
}

impl RepositoryError {
    pub fn storage(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption { what }
    }
}

/// Repository trait for persisting reviews and their dependent entities.
///
/// The service layer owns every business rule; implementations of this trait
/// only execute reads, writes, and the two multi-statement transactions the
/// reply and appeal workflows require.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Persist a freshly created review.
    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError>;

    /// All reviews recorded for an order. The duplicate-order rule means
    /// this returns at most one element in practice.
    async fn reviews_by_order(&self, order_id: OrderId) -> Result<Vec<Review>, RepositoryError>;

    /// Look up one review, returning `None` if absent.
    async fn review_by_id(&self, review_id: ReviewId) -> Result<Option<Review>, RepositoryError>;

    /// Atomically insert a reply and set the parent review's has-reply flag.
    ///
    /// Fails with `RepositoryError::NotFound` (and persists nothing) when the
    /// review vanished between the caller's check and this write.
    async fn save_reply_and_mark_replied(&self, reply: &Reply) -> Result<(), RepositoryError>;

    /// Update content and attachments of a still-pending appeal in place.
    ///
    /// Returns the number of rows affected: 0 means there is no pending
    /// appeal for this review (either none at all, or one already closed).
    async fn update_pending_appeal(
        &self,
        review_id: ReviewId,
        content: &str,
        pic_info: Option<&str>,
        video_info: Option<&str>,
    ) -> Result<u64, RepositoryError>;

    /// Look up the appeal for a review, returning `None` if absent.
    async fn appeal_by_review(&self, review_id: ReviewId)
        -> Result<Option<Appeal>, RepositoryError>;

    /// Atomically insert a first-time appeal and move the parent review to
    /// appeal-pending status.
    ///
    /// Fails with `RepositoryError::NotFound` (and persists nothing) when the
    /// review vanished concurrently.
    async fn save_appeal_and_mark_review(&self, appeal: &Appeal) -> Result<(), RepositoryError>;

    /// Atomically record an operator decision: set the pending appeal to the
    /// given terminal status and the parent review to the given status.
    ///
    /// Returns the appeal id, or `None` when no pending appeal exists for
    /// the review (nothing is written in that case).
    async fn close_appeal(
        &self,
        review_id: ReviewId,
        appeal_status: AppealStatus,
        review_status: ReviewStatus,
    ) -> Result<Option<AppealId>, RepositoryError>;
}
