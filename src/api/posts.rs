// Post endpoints: CRUD, the caller's own listings, tag filtering, likes and
// recommendations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::PostStatus;
use crate::pagination::{Page, PageParams};
use crate::services::posts::{
    self, LikeStatus, PostDetail, PostInput, PostSummary, PostUpdate, TagMode,
};
use crate::services::recommendation::{self, RecommendedPost};

#[derive(Debug, Deserialize)]
struct PostListQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    author: Option<i64>,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    ordering: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MyPostsQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TagFilterInput {
    tags: String,
    #[serde(default)]
    mode: TagMode,
}

fn page_params(page: Option<i64>, page_size: Option<i64>) -> PageParams {
    PageParams { page, page_size }
}

async fn list_posts(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> AppResult<Json<Page<PostSummary>>> {
    let page = posts::list_posts(
        &state.db,
        &user.profile,
        query.author,
        query.search.as_deref(),
        query.ordering.as_deref(),
        page_params(query.page, query.page_size),
    )
    .await?;
    Ok(Json(page))
}

async fn create_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(input): Json<PostInput>,
) -> AppResult<(StatusCode, Json<PostDetail>)> {
    let detail = posts::create_post(&state.db, &state.scheduler, &user.profile, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn my_posts(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<MyPostsQuery>,
) -> AppResult<Json<Page<PostSummary>>> {
    let status = query.status.as_deref().map(PostStatus::parse).transpose()?;
    let page = posts::my_posts(
        &state.db,
        &user.profile,
        status,
        page_params(query.page, query.page_size),
    )
    .await?;
    Ok(Json(page))
}

async fn posts_by_tag(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Json(input): Json<TagFilterInput>,
) -> AppResult<Json<Page<PostSummary>>> {
    let tags = posts::parse_tag_filter(&input.tags);
    let page = posts::posts_by_tag(
        &state.db,
        &user.profile,
        &tags,
        input.mode,
        page_params(query.page, query.page_size),
    )
    .await?;
    Ok(Json(page))
}

async fn liked_by_me(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<PostSummary>>> {
    let page = posts::liked_by_me(
        &state.db,
        &user.profile,
        page_params(query.page, query.page_size),
    )
    .await?;
    Ok(Json(page))
}

async fn recommended(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<RecommendedPost>>> {
    let page = recommendation::recommended(
        &state.db,
        &user.profile,
        page_params(query.page, query.page_size),
    )
    .await?;
    Ok(Json(page))
}

async fn retrieve_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetail>> {
    let detail = posts::get_post_detail(&state.db, &user.profile, id).await?;
    Ok(Json(detail))
}

async fn update_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<PostUpdate>,
) -> AppResult<Json<PostDetail>> {
    let detail = posts::update_post(&state.db, &state.scheduler, &user.profile, id, input).await?;
    Ok(Json(detail))
}

async fn delete_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    posts::delete_post(&state.db, &state.scheduler, &user.profile, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_status(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<LikeStatus>> {
    Ok(Json(posts::like_status(&state.db, &user.profile, id).await?))
}

async fn like_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<LikeStatus>> {
    Ok(Json(posts::like_post(&state.db, &user.profile, id).await?))
}

async fn unlike_post(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<LikeStatus>> {
    Ok(Json(posts::unlike_post(&state.db, &user.profile, id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/my", get(my_posts))
        .route("/by_tag", post(posts_by_tag))
        .route("/liked_by_me", get(liked_by_me))
        .route("/recommended", get(recommended))
        .route(
            "/{id}",
            get(retrieve_post)
                .put(update_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .route(
            "/{id}/like",
            get(like_status).put(like_post).delete(unlike_post),
        )
}
