//! Request adapter: HTTP surface for the review workflows.
//!
//! Handlers translate JSON requests into domain records and service calls,
//! and map `ServiceError` kinds onto HTTP statuses. No other error
//! translation happens here; the service's error is passed through.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::model::{
    AppealDecision, NewAppeal, NewReply, NewReview, OrderId, Review, ReviewId, StoreId,
};
use crate::service::ServiceError;
use crate::AppState;

/// Request id attached to every request's extensions for log correlation.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub user_id: i64,
    pub order_id: i64,
    pub store_id: i64,
    pub score: i32,
    pub service_score: i32,
    pub express_score: i32,
    pub content: String,
    #[serde(default)]
    pub pic_info: Option<String>,
    #[serde(default)]
    pub video_info: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyReviewRequest {
    pub store_id: i64,
    pub content: String,
    #[serde(default)]
    pub pic_info: Option<String>,
    #[serde(default)]
    pub video_info: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealReviewRequest {
    pub store_id: i64,
    pub content: String,
    #[serde(default)]
    pub pic_info: Option<String>,
    #[serde(default)]
    pub video_info: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppealDecisionRequest {
    pub decision: AppealDecision,
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::OrderAlreadyReviewed(_)
            | ServiceError::ReplyAlreadyExists(_)
            | ServiceError::AppealAlreadyClosed(_) => StatusCode::CONFLICT,
            ServiceError::ReviewNotFound(_) | ServiceError::AppealNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::StoreMismatch { .. } => StatusCode::FORBIDDEN,
        };

        // Storage detail stays in the logs, not in the response body.
        let message = match &self {
            ServiceError::Database(e) => {
                error!("storage failure: {}", e);
                "internal storage failure".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: self.kind(),
                message,
            }),
        )
            .into_response()
    }
}

/// Build the full application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/reviews", post(create_review))
        .route("/api/v1/reviews/:review_id", get(get_review))
        .route("/api/v1/reviews/:review_id/reply", post(reply_review))
        .route("/api/v1/reviews/:review_id/appeal", post(appeal_review))
        .route(
            "/api/v1/reviews/:review_id/appeal/decision",
            post(decide_appeal),
        )
        .layer(middleware::from_fn(attach_request_id))
        .with_state(state)
}

/// Generate a request id, stash it in request extensions, and echo it back
/// in the response headers.
async fn attach_request_id(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "review-server"
    }))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ServiceError> {
    let review = state
        .service
        .create_review(NewReview {
            order_id: OrderId(req.order_id),
            user_id: req.user_id,
            store_id: StoreId(req.store_id),
            score: req.score,
            service_score: req.service_score,
            express_score: req.express_score,
            content: req.content,
            pic_info: req.pic_info,
            video_info: req.video_info,
            anonymous: req.anonymous,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IdResponse {
            id: review.review_id.0,
        }),
    ))
}

async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<i64>,
) -> Result<Json<Review>, ServiceError> {
    let review = state.service.get_review(ReviewId(review_id)).await?;
    Ok(Json(review))
}

async fn reply_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<i64>,
    Json(req): Json<ReplyReviewRequest>,
) -> Result<Json<IdResponse>, ServiceError> {
    let reply_id = state
        .service
        .reply_review(NewReply {
            review_id: ReviewId(review_id),
            store_id: StoreId(req.store_id),
            content: req.content,
            pic_info: req.pic_info,
            video_info: req.video_info,
        })
        .await?;

    Ok(Json(IdResponse { id: reply_id.0 }))
}

async fn appeal_review(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<i64>,
    Json(req): Json<AppealReviewRequest>,
) -> Result<Json<IdResponse>, ServiceError> {
    let review_id = state
        .service
        .appeal_review(NewAppeal {
            review_id: ReviewId(review_id),
            store_id: StoreId(req.store_id),
            content: req.content,
            pic_info: req.pic_info,
            video_info: req.video_info,
        })
        .await?;

    Ok(Json(IdResponse { id: review_id.0 }))
}

async fn decide_appeal(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<i64>,
    Json(req): Json<AppealDecisionRequest>,
) -> Result<Json<IdResponse>, ServiceError> {
    let appeal_id = state
        .service
        .adjudicate_appeal(ReviewId(review_id), req.decision)
        .await?;

    Ok(Json(IdResponse { id: appeal_id.0 }))
}
