// Comment endpoints: listing, threads, and author-only edits.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::pagination::{Page, PageParams};
use crate::services::comments::{self, CommentInput, CommentView};

#[derive(Debug, Deserialize)]
struct CommentListQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    post: Option<i64>,
    #[serde(default)]
    parent: Option<i64>,
    #[serde(default)]
    ordering: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentUpdateInput {
    content: String,
}

async fn list_comments(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> AppResult<Json<Page<CommentView>>> {
    let params = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    let page = comments::list_comments(
        &state.db,
        &user.profile,
        query.post,
        query.parent,
        query.ordering.as_deref(),
        params,
    )
    .await?;
    Ok(Json(page))
}

async fn create_comment(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<CommentInput>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let view = comments::create_comment(&state.db, &user.profile, input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn retrieve_comment(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CommentView>> {
    let view = comments::get_comment_view(&state.db, &user.profile, id).await?;
    Ok(Json(view))
}

async fn update_comment(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CommentUpdateInput>,
) -> AppResult<Json<CommentView>> {
    let view = comments::update_comment(&state.db, &user.profile, id, &input.content).await?;
    Ok(Json(view))
}

async fn delete_comment(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    comments::delete_comment(&state.db, &user.profile, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn children(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let views = comments::children(&state.db, &user.profile, id).await?;
    Ok(Json(json!({"results": views})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/{id}",
            get(retrieve_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
        .route("/{id}/children", get(children))
}
