//! Earning hooks: the fire-and-forget award endpoint and the preview hint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use yaks_core::{PostId, TopicId, UserId};

use crate::auth::{AuthUser, ServiceAuth};
use crate::earning::CanEarn;
use crate::error::ApiError;
use crate::state::AppState;

/// Award request, sent by the forum's business-event hooks (post created,
/// liked, solution accepted, ...).
#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    /// The user performing the action.
    pub user_id: String,
    /// The action key, e.g. `post_created`.
    pub action_key: String,
    /// Related post, when the action has one.
    pub post_id: Option<i64>,
    /// Related topic, when the action has one.
    pub topic_id: Option<i64>,
}

/// Award response.
#[derive(Debug, Serialize)]
pub struct AwardResponse {
    /// Whether Yaks were awarded. Denials are normal, not errors.
    pub awarded: bool,
}

/// Evaluate an earning rule for a user action and credit on success.
pub async fn award(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<AwardRequest>,
) -> Result<Json<AwardResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid user id".into()))?;

    let awarded = state
        .earning
        .award(
            user_id,
            &body.action_key,
            body.post_id.map(PostId),
            body.topic_id.map(TopicId),
        )
        .await;

    Ok(Json(AwardResponse { awarded }))
}

/// Preview query parameters.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// The action key to preview.
    pub action_key: String,
}

/// Read-only earning preview for UI hints.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<PreviewQuery>,
) -> Json<CanEarn> {
    Json(state.earning.can_earn(auth.user_id, &query.action_key).await)
}
