//! Business rules for the review lifecycle.
//!
//! `ReviewService` is the only place authorization, idempotency, and
//! state-transition rules live. It orchestrates the repository but performs
//! no local recovery or retry: every storage failure is wrapped in
//! `ServiceError::Database` and surfaced to the caller unchanged.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::id::IdGenerator;
use crate::model::{
    Appeal, AppealDecision, AppealId, AppealStatus, NewAppeal, NewReply, NewReview, OrderId, Reply,
    ReplyId, Review, ReviewId, ReviewStatus, StoreId,
};
use crate::repository::{RepositoryError, ReviewRepository};

/// Errors produced by the review workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("storage failure: {0}")]
    Database(#[from] RepositoryError),

    #[error("order {0} already has a review")]
    OrderAlreadyReviewed(OrderId),

    #[error("review {0} not found")]
    ReviewNotFound(ReviewId),

    #[error("store {acting} cannot act on a review owned by store {owner}")]
    StoreMismatch { acting: StoreId, owner: StoreId },

    #[error("review {0} already has a reply")]
    ReplyAlreadyExists(ReviewId),

    #[error("appeal for review {0} has already been adjudicated")]
    AppealAlreadyClosed(ReviewId),

    #[error("no appeal exists for review {0}")]
    AppealNotFound(ReviewId),
}

impl ServiceError {
    /// Stable machine-readable discriminant for API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Database(_) => "DATABASE_FAILURE",
            ServiceError::OrderAlreadyReviewed(_) => "ORDER_ALREADY_REVIEWED",
            ServiceError::ReviewNotFound(_) => "REVIEW_NOT_FOUND",
            ServiceError::StoreMismatch { .. } => "STORE_MISMATCH",
            ServiceError::ReplyAlreadyExists(_) => "REPLY_ALREADY_EXISTS",
            ServiceError::AppealAlreadyClosed(_) => "APPEAL_ALREADY_CLOSED",
            ServiceError::AppealNotFound(_) => "APPEAL_NOT_FOUND",
        }
    }
}

/// The review usecase layer.
pub struct ReviewService {
    repo: Arc<dyn ReviewRepository>,
    ids: IdGenerator,
}

impl ReviewService {
    pub fn new(repo: Arc<dyn ReviewRepository>, ids: IdGenerator) -> Self {
        Self { repo, ids }
    }

    /// Create a review for an order.
    ///
    /// At most one review may exist per order; a second submission fails
    /// with `OrderAlreadyReviewed`.
    pub async fn create_review(&self, new: NewReview) -> Result<Review, ServiceError> {
        info!(order_id = %new.order_id, store_id = %new.store_id, "creating review");

        let existing = self.repo.reviews_by_order(new.order_id).await?;
        if !existing.is_empty() {
            warn!(order_id = %new.order_id, "order already reviewed");
            return Err(ServiceError::OrderAlreadyReviewed(new.order_id));
        }

        let review = Review {
            review_id: ReviewId(self.ids.next()),
            order_id: new.order_id,
            user_id: new.user_id,
            store_id: new.store_id,
            score: new.score,
            service_score: new.service_score,
            express_score: new.express_score,
            content: new.content,
            pic_info: new.pic_info,
            video_info: new.video_info,
            anonymous: new.anonymous,
            has_reply: false,
            status: ReviewStatus::Normal,
        };

        self.repo.save_review(&review).await?;
        info!(review_id = %review.review_id, "review created");
        Ok(review)
    }

    /// Look up a review by id.
    pub async fn get_review(&self, review_id: ReviewId) -> Result<Review, ServiceError> {
        self.repo
            .review_by_id(review_id)
            .await?
            .ok_or(ServiceError::ReviewNotFound(review_id))
    }

    /// Record a merchant's reply to a review.
    ///
    /// Only the owning store may reply, and only once: the review's
    /// has-reply flag makes a second reply fail with `ReplyAlreadyExists`.
    pub async fn reply_review(&self, new: NewReply) -> Result<ReplyId, ServiceError> {
        info!(review_id = %new.review_id, store_id = %new.store_id, "replying to review");

        let review = self.fetch_owned_review(new.review_id, new.store_id).await?;

        if review.has_reply {
            warn!(review_id = %new.review_id, "review already replied");
            return Err(ServiceError::ReplyAlreadyExists(new.review_id));
        }

        let reply = Reply {
            reply_id: ReplyId(self.ids.next()),
            review_id: new.review_id,
            store_id: new.store_id,
            content: new.content,
            pic_info: new.pic_info,
            video_info: new.video_info,
        };

        match self.repo.save_reply_and_mark_replied(&reply).await {
            Ok(()) => {
                info!(reply_id = %reply.reply_id, "reply recorded");
                Ok(reply.reply_id)
            }
            // The review vanished between the check above and the
            // transactional write.
            Err(RepositoryError::NotFound { .. }) => {
                Err(ServiceError::ReviewNotFound(new.review_id))
            }
            Err(e) => Err(ServiceError::Database(e)),
        }
    }

    /// File or refresh a merchant's appeal against a review.
    ///
    /// A still-pending appeal is updated in place (re-appeal); the first
    /// appeal creates the row and moves the review to appeal-pending. An
    /// appeal that has already been adjudicated cannot be reopened.
    pub async fn appeal_review(&self, new: NewAppeal) -> Result<ReviewId, ServiceError> {
        info!(review_id = %new.review_id, store_id = %new.store_id, "appealing review");

        self.fetch_owned_review(new.review_id, new.store_id).await?;

        let affected = self
            .repo
            .update_pending_appeal(
                new.review_id,
                &new.content,
                new.pic_info.as_deref(),
                new.video_info.as_deref(),
            )
            .await?;
        if affected > 0 {
            info!(review_id = %new.review_id, "pending appeal updated in place");
            return Ok(new.review_id);
        }

        // No pending row was touched: either the appeal is already closed,
        // or this is the first appeal for the review.
        if let Some(appeal) = self.repo.appeal_by_review(new.review_id).await? {
            debug_assert!(appeal.status.is_closed());
            warn!(review_id = %new.review_id, "appeal already adjudicated");
            return Err(ServiceError::AppealAlreadyClosed(new.review_id));
        }

        let appeal = Appeal {
            appeal_id: AppealId(self.ids.next()),
            review_id: new.review_id,
            store_id: new.store_id,
            content: new.content,
            pic_info: new.pic_info,
            video_info: new.video_info,
            status: AppealStatus::Pending,
        };

        match self.repo.save_appeal_and_mark_review(&appeal).await {
            Ok(()) => {
                info!(appeal_id = %appeal.appeal_id, "appeal filed");
                Ok(new.review_id)
            }
            Err(RepositoryError::NotFound { .. }) => {
                Err(ServiceError::ReviewNotFound(new.review_id))
            }
            Err(e) => Err(ServiceError::Database(e)),
        }
    }

    /// Apply an operator's decision to a pending appeal.
    ///
    /// Sustaining hides the review; rejecting restores it to normal. Both
    /// the appeal and review rows change in one transaction.
    pub async fn adjudicate_appeal(
        &self,
        review_id: ReviewId,
        decision: AppealDecision,
    ) -> Result<AppealId, ServiceError> {
        info!(review_id = %review_id, ?decision, "adjudicating appeal");

        let (appeal_status, review_status) = match decision {
            AppealDecision::Sustain => (AppealStatus::Sustained, ReviewStatus::Hidden),
            AppealDecision::Reject => (AppealStatus::Rejected, ReviewStatus::Normal),
        };

        if let Some(appeal_id) = self
            .repo
            .close_appeal(review_id, appeal_status, review_status)
            .await?
        {
            info!(appeal_id = %appeal_id, "appeal adjudicated");
            return Ok(appeal_id);
        }

        // Nothing pending: distinguish "never appealed" from "already ruled".
        match self.repo.appeal_by_review(review_id).await? {
            Some(_) => Err(ServiceError::AppealAlreadyClosed(review_id)),
            None => Err(ServiceError::AppealNotFound(review_id)),
        }
    }

    /// Fetch a review and verify the acting store owns it.
    ///
    /// The ownership check is the horizontal-privilege-escalation guard:
    /// store A must not reply to or appeal store B's reviews.
    async fn fetch_owned_review(
        &self,
        review_id: ReviewId,
        acting: StoreId,
    ) -> Result<Review, ServiceError> {
        let review = self
            .repo
            .review_by_id(review_id)
            .await?
            .ok_or(ServiceError::ReviewNotFound(review_id))?;

        if review.store_id != acting {
            warn!(
                review_id = %review_id,
                owner = %review.store_id,
                acting = %acting,
                "store mismatch"
            );
            return Err(ServiceError::StoreMismatch {
                acting,
                owner: review.store_id,
            });
        }

        Ok(review)
    }
}
