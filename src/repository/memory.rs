//! In-memory implementation of `ReviewRepository`.
//!
//! All state is held in `RwLock`-protected maps and lost on restart. Used by
//! unit and API tests; multi-map writes take every lock they need up front
//! (always reviews, then replies, then appeals) so each operation is atomic
//! from the point of view of other tasks.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RepositoryError, ReviewRepository};
use crate::model::{
    Appeal, AppealId, AppealStatus, OrderId, Reply, ReplyId, Review, ReviewId, ReviewStatus,
};

/// In-memory review repository.
pub struct InMemoryRepository {
    // Fields are crate-visible so unit tests can inspect row counts directly.
    pub(crate) reviews: RwLock<HashMap<ReviewId, Review>>,
    pub(crate) replies: RwLock<HashMap<ReplyId, Reply>>,
    /// One appeal per review, keyed by the parent review id.
    pub(crate) appeals: RwLock<HashMap<ReviewId, Appeal>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            reviews: RwLock::new(HashMap::new()),
            replies: RwLock::new(HashMap::new()),
            appeals: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewRepository for InMemoryRepository {
    async fn save_review(&self, review: &Review) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        reviews.insert(review.review_id, review.clone());
        Ok(())
    }

    async fn reviews_by_order(&self, order_id: OrderId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn review_by_id(&self, review_id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let reviews = self.reviews.read().await;
        Ok(reviews.get(&review_id).cloned())
    }

    async fn save_reply_and_mark_replied(&self, reply: &Reply) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        let mut replies = self.replies.write().await;

        let review = reviews
            .get_mut(&reply.review_id)
            .ok_or_else(|| RepositoryError::not_found("review"))?;

        review.has_reply = true;
        replies.insert(reply.reply_id, reply.clone());
        Ok(())
    }

    async fn update_pending_appeal(
        &self,
        review_id: ReviewId,
        content: &str,
        pic_info: Option<&str>,
        video_info: Option<&str>,
    ) -> Result<u64, RepositoryError> {
        let mut appeals = self.appeals.write().await;
        match appeals.get_mut(&review_id) {
            Some(appeal) if appeal.status == AppealStatus::Pending => {
                appeal.content = content.to_string();
                appeal.pic_info = pic_info.map(str::to_string);
                appeal.video_info = video_info.map(str::to_string);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn appeal_by_review(
        &self,
        review_id: ReviewId,
    ) -> Result<Option<Appeal>, RepositoryError> {
        let appeals = self.appeals.read().await;
        Ok(appeals.get(&review_id).cloned())
    }

    async fn save_appeal_and_mark_review(&self, appeal: &Appeal) -> Result<(), RepositoryError> {
        let mut reviews = self.reviews.write().await;
        let mut appeals = self.appeals.write().await;

        let review = reviews
            .get_mut(&appeal.review_id)
            .ok_or_else(|| RepositoryError::not_found("review"))?;

        review.status = ReviewStatus::AppealPending;
        appeals.insert(appeal.review_id, appeal.clone());
        Ok(())
    }

    async fn close_appeal(
        &self,
        review_id: ReviewId,
        appeal_status: AppealStatus,
        review_status: ReviewStatus,
    ) -> Result<Option<AppealId>, RepositoryError> {
        let mut reviews = self.reviews.write().await;
        let mut appeals = self.appeals.write().await;

        let appeal = match appeals.get_mut(&review_id) {
            Some(appeal) if appeal.status == AppealStatus::Pending => appeal,
            _ => return Ok(None),
        };

        let review = reviews
            .get_mut(&review_id)
            .ok_or_else(|| RepositoryError::not_found("review"))?;

        appeal.status = appeal_status;
        review.status = review_status;
        Ok(Some(appeal.appeal_id))
    }
}
