//! Domain records for reviews, replies, and appeals.
//!
//! Identifiers are newtypes over `i64` to keep review, order, and store ids
//! from being mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for a review's unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub i64);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReviewId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Newtype for the order a review evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Newtype for the store (merchant) a review belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub i64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StoreId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Newtype for a merchant reply's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyId(pub i64);

impl fmt::Display for ReplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReplyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Newtype for an appeal's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppealId(pub i64);

impl fmt::Display for AppealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AppealId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    /// Visible, no appeal in flight. The state every review starts in.
    Normal,
    /// A merchant appeal is awaiting adjudication.
    AppealPending,
    /// An operator sustained an appeal and took the review down.
    Hidden,
}

impl ReviewStatus {
    /// Stable text discriminant used by the storage layer.
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Normal => "Normal",
            ReviewStatus::AppealPending => "AppealPending",
            ReviewStatus::Hidden => "Hidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Normal" => Some(ReviewStatus::Normal),
            "AppealPending" => Some(ReviewStatus::AppealPending),
            "Hidden" => Some(ReviewStatus::Hidden),
            _ => None,
        }
    }
}

/// Lifecycle status of an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppealStatus {
    /// Filed and awaiting an operator decision.
    Pending,
    /// Operator agreed with the merchant; terminal.
    Sustained,
    /// Operator rejected the appeal; terminal.
    Rejected,
}

impl AppealStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppealStatus::Pending => "Pending",
            AppealStatus::Sustained => "Sustained",
            AppealStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(AppealStatus::Pending),
            "Sustained" => Some(AppealStatus::Sustained),
            "Rejected" => Some(AppealStatus::Rejected),
            _ => None,
        }
    }

    /// Whether an operator has already ruled on this appeal.
    pub fn is_closed(self) -> bool {
        !matches!(self, AppealStatus::Pending)
    }
}

/// An operator's ruling on an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppealDecision {
    /// Agree with the merchant: the appeal is sustained and the review hidden.
    Sustain,
    /// Disagree: the appeal is rejected and the review restored to normal.
    Reject,
}

/// A customer's evaluation of one completed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub review_id: ReviewId,
    pub order_id: OrderId,
    pub user_id: i64,
    pub store_id: StoreId,
    pub score: i32,
    pub service_score: i32,
    pub express_score: i32,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
    pub anonymous: bool,
    pub has_reply: bool,
    pub status: ReviewStatus,
}

/// A merchant's single response to a review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub reply_id: ReplyId,
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
}

/// A merchant's contest of a review, at most one row per review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub appeal_id: AppealId,
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
    pub status: AppealStatus,
}

/// Candidate review as submitted by a customer; the service assigns the id
/// and initial flags.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub order_id: OrderId,
    pub user_id: i64,
    pub store_id: StoreId,
    pub score: i32,
    pub service_score: i32,
    pub express_score: i32,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
    pub anonymous: bool,
}

/// Merchant input for replying to a review.
#[derive(Debug, Clone)]
pub struct NewReply {
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
}

/// Merchant input for appealing a review.
#[derive(Debug, Clone)]
pub struct NewAppeal {
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    pub pic_info: Option<String>,
    pub video_info: Option<String>,
}
