// Profile browsing and the follow-request workflow.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, OptionalUser};
use crate::models::FollowStatus;
use crate::pagination::{Page, PageParams};
use crate::services::follow::{self, ProfileSummary};

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
}

impl ListQuery {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

async fn list_profiles(
    OptionalUser(user): OptionalUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<ProfileSummary>>> {
    let viewer = user.as_ref().map(|u| &u.profile);
    let page = follow::list_profiles(&state.db, viewer, query.page_params()).await?;
    Ok(Json(page))
}

async fn retrieve_profile(
    OptionalUser(user): OptionalUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let (profile, email) = follow::get_profile_with_email(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let viewer = user.as_ref().map(|u| &u.profile);
    let full_name = profile.full_name(&email);

    if !follow::can_view_profile(&state.db, viewer, &profile).await? {
        // Restricted card: enough to decide whether to send a request.
        return Ok(Json(json!({
            "id": profile.id,
            "full_name": full_name,
            "is_private": profile.is_private,
        })));
    }

    let follow_status = match viewer {
        Some(me) if me.id != profile.id => {
            follow::follow_status(&state.db, me.id, profile.id).await?
        }
        _ => None,
    };

    Ok(Json(json!({
        "id": profile.id,
        "full_name": full_name,
        "bio": profile.bio,
        "date_of_birth": profile.date_of_birth,
        "location": profile.location,
        "gender": profile.gender,
        "is_private": profile.is_private,
        "followers_count": profile.followers_count,
        "following_count": profile.following_count,
        "posts_count": profile.posts_count,
        "created": profile.created,
        "follow_status": follow_status,
    })))
}

async fn follow_profile(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let outcome = follow::follow(&state.db, &user.profile, id).await?;

    let (code, detail) = match outcome.status {
        FollowStatus::Pending => (
            StatusCode::ACCEPTED,
            "Request to follow was sent (pending).",
        ),
        FollowStatus::Accepted => (StatusCode::CREATED, "Now following (accepted)."),
    };

    Ok((
        code,
        Json(json!({"detail": detail, "status": outcome.status})),
    ))
}

async fn unfollow_profile(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let deleted = follow::unfollow(&state.db, &user.profile, id).await?;
    let detail = if deleted {
        "Unfollowed."
    } else {
        "Follow does not exist."
    };
    Ok(Json(json!({"detail": detail})))
}

async fn my_pending_requests(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    let requests = follow::pending_requests(&state.db, &user.profile).await?;
    Ok(Json(json!({"results": requests})))
}

async fn accept_request(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(follower_id): Path<i64>,
) -> AppResult<Json<Value>> {
    follow::accept_request(&state.db, &user.profile, follower_id).await?;
    Ok(Json(json!({
        "detail": "Request accepted (accepted).",
        "follower_id": follower_id,
        "status": FollowStatus::Accepted,
    })))
}

async fn reject_request(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(follower_id): Path<i64>,
) -> AppResult<Json<Value>> {
    follow::reject_request(&state.db, &user.profile, follower_id).await?;
    Ok(Json(json!({
        "detail": "Request rejected and removed.",
        "follower_id": follower_id,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_profiles))
        .route("/{id}", get(retrieve_profile))
        .route("/{id}/follow", post(follow_profile))
        .route("/{id}/unfollow", post(unfollow_profile))
        .route("/my/pending-requests", get(my_pending_requests))
        .route("/requests/{follower_id}/accept", post(accept_request))
        .route("/requests/{follower_id}/reject", post(reject_request))
}
