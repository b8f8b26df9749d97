// Posts: CRUD with draft/scheduled/published transitions, hashtag-derived
// tags, likes, and the visibility-scoped list queries.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{display_name, Post, PostStatus, Profile};
use crate::pagination::{Page, PageParams};
use crate::scheduler::PostScheduler;
use crate::services::{follow, is_unique_violation};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 5000;

static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w])#([\w-]{1,50})").expect("hashtag regex"));

static TAG_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s]+").expect("tag split regex"));

/// Visibility condition for published posts, relative to a viewer bound
/// twice (author check, accepted-edge check). Assumes `posts p` joined with
/// `profiles pr ON pr.id = p.author_id`.
const VISIBLE_AUTHOR_SQL: &str = "(p.author_id = ? OR pr.is_private = 0 OR EXISTS (
    SELECT 1 FROM follows f
    WHERE f.follower_id = ? AND f.following_id = p.author_id AND f.status = 'accepted'))";

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub scheduled_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub scheduled_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub author_full_name: String,
    pub content: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub scheduled_at: Option<i64>,
    pub published_at: Option<i64>,
    pub created: i64,
    pub updated: i64,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub author_full_name: String,
    pub status: PostStatus,
    pub created: i64,
    pub published_at: Option<i64>,
    pub liked_by_me: bool,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    All,
    Any,
}

impl Default for TagMode {
    fn default() -> Self {
        TagMode::All
    }
}

/// Hashtags extracted from post content, lowercased, first-seen order.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in HASHTAG_RE.captures_iter(content) {
        let name = cap[1].to_lowercase();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Normalize a comma/space separated tag filter: lowercase, dedup,
/// first-seen order.
pub fn parse_tag_filter(raw: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for part in TAG_SPLIT_RE.split(raw) {
        let name = part.trim().to_lowercase();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Can the viewer see this author's published content?
async fn author_visible_to(db: &Database, me: &Profile, author_id: i64) -> AppResult<bool> {
    if me.id == author_id {
        return Ok(true);
    }
    let author = db
        .get_profile(author_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Author profile not found".to_string()))?;
    follow::can_view_profile(db, Some(me), &author).await
}

/// Resolve a post the viewer is allowed to see: the owner sees any status,
/// everyone else sees published posts of visible authors. Anything short of
/// that is a 404 so existence is not leaked.
pub async fn resolve_visible_post(db: &Database, me: &Profile, post_id: i64) -> AppResult<Post> {
    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.author_id == me.id {
        return Ok(post);
    }
    if post.status == PostStatus::Published && author_visible_to(db, me, post.author_id).await? {
        return Ok(post);
    }
    Err(AppError::NotFound("Post not found".to_string()))
}

fn validate_title_content(title: &str, content: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title cannot be empty.".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters.",
            MAX_TITLE_LEN
        )));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(AppError::Validation(format!(
            "Content must be at most {} characters.",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

pub async fn create_post(
    db: &Database,
    scheduler: &Arc<PostScheduler>,
    me: &Profile,
    input: PostInput,
) -> AppResult<PostDetail> {
    validate_title_content(&input.title, &input.content)?;

    let status = input.status.unwrap_or(PostStatus::Draft);
    let now = Utc::now().timestamp();

    let scheduled_at = match status {
        PostStatus::Scheduled => {
            let at = input.scheduled_at.ok_or_else(|| {
                AppError::Validation(
                    "scheduled_at: This field is required for scheduled posts.".to_string(),
                )
            })?;
            if at <= now {
                return Err(AppError::Validation(
                    "scheduled_at: Must be in the future.".to_string(),
                ));
            }
            Some(at)
        }
        _ => None,
    };
    let published_at = (status == PostStatus::Published).then_some(now);

    let mut tx = db.begin_transaction().await?;

    let insert = sqlx::query(
        "INSERT INTO posts (author_id, title, content, status, scheduled_at, published_at,
                            created, updated)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(me.id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(status.as_str())
    .bind(scheduled_at)
    .bind(published_at)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    let post_id = match insert {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Validation(
                "You already have a post with this title.".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    sqlx::query("UPDATE profiles SET posts_count = posts_count + 1 WHERE id = ?")
        .bind(me.id)
        .execute(&mut *tx)
        .await?;

    let tags = extract_tags(&input.content);
    set_post_tags(&mut tx, post_id, &tags).await?;

    tx.commit().await?;

    // Timer registration happens only after the row is committed, so the
    // fired job always observes the scheduled state.
    if let Some(at) = scheduled_at {
        scheduler.schedule(post_id, at).await;
    }

    get_own_post_detail(db, me, post_id).await
}

pub async fn update_post(
    db: &Database,
    scheduler: &Arc<PostScheduler>,
    me: &Profile,
    post_id: i64,
    input: PostUpdate,
) -> AppResult<PostDetail> {
    let post = resolve_owned_post(db, me, post_id).await?;
    let now = Utc::now().timestamp();

    if post.status == PostStatus::Published {
        if matches!(input.status, Some(s) if s != PostStatus::Published) {
            return Err(AppError::Validation(
                "status: Published post can't change status.".to_string(),
            ));
        }
        if input.scheduled_at.is_some() {
            return Err(AppError::Validation(
                "scheduled_at: Published post can't be scheduled.".to_string(),
            ));
        }
    }

    let new_title = input.title.as_deref().unwrap_or(&post.title);
    let new_content = input.content.as_deref().unwrap_or(&post.content);
    validate_title_content(new_title, new_content)?;

    let new_status = input.status.unwrap_or(post.status);

    let new_scheduled_at = match new_status {
        PostStatus::Scheduled => {
            let at = input.scheduled_at.or(post.scheduled_at).ok_or_else(|| {
                AppError::Validation(
                    "scheduled_at: This field is required for scheduled posts.".to_string(),
                )
            })?;
            if at <= now {
                return Err(AppError::Validation(
                    "scheduled_at: Must be in the future.".to_string(),
                ));
            }
            Some(at)
        }
        _ => None,
    };

    let new_published_at = match (post.status, new_status) {
        (PostStatus::Published, _) => post.published_at,
        (_, PostStatus::Published) => Some(now),
        _ => None,
    };

    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query(
        "UPDATE posts
         SET title = ?, content = ?, status = ?, scheduled_at = ?, published_at = ?, updated = ?
         WHERE id = ?",
    )
    .bind(new_title)
    .bind(new_content)
    .bind(new_status.as_str())
    .bind(new_scheduled_at)
    .bind(new_published_at)
    .bind(now)
    .bind(post_id)
    .execute(&mut *tx)
    .await;

    if let Err(e) = result {
        if is_unique_violation(&e) {
            return Err(AppError::Validation(
                "You already have a post with this title.".to_string(),
            ));
        }
        return Err(e.into());
    }

    if input.content.is_some() {
        let tags = extract_tags(new_content);
        set_post_tags(&mut tx, post_id, &tags).await?;
    }

    tx.commit().await?;

    // Reschedule cancels-then-creates: arming the new timer aborts the old
    // one; leaving the scheduled state just cancels.
    match (post.status, new_status) {
        (_, PostStatus::Scheduled) => {
            if let Some(at) = new_scheduled_at {
                scheduler.schedule(post_id, at).await;
            }
        }
        (PostStatus::Scheduled, _) => scheduler.cancel(post_id).await,
        _ => {}
    }

    get_own_post_detail(db, me, post_id).await
}

pub async fn delete_post(
    db: &Database,
    scheduler: &Arc<PostScheduler>,
    me: &Profile,
    post_id: i64,
) -> AppResult<()> {
    let post = resolve_owned_post(db, me, post_id).await?;

    let mut tx = db.begin_transaction().await?;

    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE profiles SET posts_count = MAX(posts_count - 1, 0) WHERE id = ?")
        .bind(me.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if post.status == PostStatus::Scheduled {
        scheduler.cancel(post_id).await;
    }
    Ok(())
}

/// Owner-only resolution: 403 when the post is visible but not mine, 404
/// when it is not visible at all.
async fn resolve_owned_post(db: &Database, me: &Profile, post_id: i64) -> AppResult<Post> {
    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.author_id == me.id {
        return Ok(post);
    }
    if post.status == PostStatus::Published && author_visible_to(db, me, post.author_id).await? {
        return Err(AppError::Forbidden(
            "You can only modify your own posts.".to_string(),
        ));
    }
    Err(AppError::NotFound("Post not found".to_string()))
}

pub async fn get_post_detail(db: &Database, me: &Profile, post_id: i64) -> AppResult<PostDetail> {
    let post = resolve_visible_post(db, me, post_id).await?;
    post_to_detail(db, post).await
}

async fn get_own_post_detail(db: &Database, me: &Profile, post_id: i64) -> AppResult<PostDetail> {
    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
    debug_assert_eq!(post.author_id, me.id);
    post_to_detail(db, post).await
}

async fn post_to_detail(db: &Database, post: Post) -> AppResult<PostDetail> {
    let tags = post_tag_names(db, post.id).await?;
    let author = follow::get_profile_with_email(db, post.author_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Author profile not found".to_string()))?;

    Ok(PostDetail {
        id: post.id,
        title: post.title,
        author_full_name: author.0.full_name(&author.1),
        content: post.content,
        tags,
        status: post.status,
        scheduled_at: post.scheduled_at,
        published_at: post.published_at,
        created: post.created,
        updated: post.updated,
        likes_count: post.likes_count,
        comments_count: post.comments_count,
    })
}

pub async fn post_tag_names(db: &Database, post_id: i64) -> AppResult<Vec<String>> {
    let rows = sqlx::query(
        "SELECT t.name FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?
         ORDER BY t.name",
    )
    .bind(post_id)
    .fetch_all(&db.pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get("name")).collect())
}

/// Replace a post's tag links with the given names, upserting into `tags`.
async fn set_post_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: i64,
    names: &[String],
) -> AppResult<()> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    for name in names {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id)
             SELECT ?, id FROM tags WHERE name = ?",
        )
        .bind(post_id)
        .bind(name)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn order_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("created_at") => "p.created ASC",
        Some("-created_at") => "p.created DESC",
        Some("published_at") => "p.published_at ASC",
        Some("-published_at") => "p.published_at DESC",
        _ => "p.published_at DESC, p.created DESC",
    }
}

fn map_summary(row: &sqlx::sqlite::SqliteRow) -> AppResult<PostSummary> {
    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");
    let email: String = row.get("email");
    Ok(PostSummary {
        id: row.get("id"),
        title: row.get("title"),
        author_full_name: display_name(&first_name, &last_name, &email),
        status: PostStatus::parse(row.get::<String, _>("status").as_str())?,
        created: row.get("created"),
        published_at: row.get("published_at"),
        liked_by_me: row.get("liked_by_me"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
    })
}

const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.status, p.created, p.published_at,
        p.likes_count, p.comments_count, pr.first_name, pr.last_name, a.email,
        EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.profile_id = ?) AS liked_by_me
 FROM posts p
 JOIN profiles pr ON pr.id = p.author_id
 JOIN accounts a ON a.id = pr.account_id";

const SUMMARY_COUNT: &str = "SELECT COUNT(*)
 FROM posts p
 JOIN profiles pr ON pr.id = p.author_id";

/// Accessible published posts, with optional author/search filters.
pub async fn list_posts(
    db: &Database,
    me: &Profile,
    author: Option<i64>,
    search: Option<&str>,
    ordering: Option<&str>,
    params: PageParams,
) -> AppResult<Page<PostSummary>> {
    let mut where_sql = format!(" WHERE p.status = 'published' AND {}", VISIBLE_AUTHOR_SQL);
    if author.is_some() {
        where_sql.push_str(" AND p.author_id = ?");
    }
    if search.is_some() {
        where_sql.push_str(
            " AND (p.title LIKE ? OR p.content LIKE ? OR EXISTS (
                 SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id
                 WHERE pt.post_id = p.id AND t.name LIKE ?))",
        );
    }

    let pattern = search.map(|s| format!("%{}%", s));

    let count_sql = format!("{}{}", SUMMARY_COUNT, where_sql);
    let mut count_query = sqlx::query(&count_sql).bind(me.id).bind(me.id);
    if let Some(a) = author {
        count_query = count_query.bind(a);
    }
    if let Some(p) = &pattern {
        count_query = count_query.bind(p).bind(p).bind(p);
    }
    let count: i64 = count_query.fetch_one(&db.pool).await?.get(0);

    let select_sql = format!(
        "{}{} ORDER BY {} LIMIT ? OFFSET ?",
        SUMMARY_SELECT,
        where_sql,
        order_clause(ordering)
    );
    let mut query = sqlx::query(&select_sql).bind(me.id).bind(me.id).bind(me.id);
    if let Some(a) = author {
        query = query.bind(a);
    }
    if let Some(p) = &pattern {
        query = query.bind(p).bind(p).bind(p);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let results = rows
        .iter()
        .map(map_summary)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page::new(count, params, results))
}

/// The caller's own posts, any status, newest first.
pub async fn my_posts(
    db: &Database,
    me: &Profile,
    status: Option<PostStatus>,
    params: PageParams,
) -> AppResult<Page<PostSummary>> {
    let mut where_sql = String::from(" WHERE p.author_id = ?");
    if status.is_some() {
        where_sql.push_str(" AND p.status = ?");
    }

    let count_sql = format!("{}{}", SUMMARY_COUNT, where_sql);
    let mut count_query = sqlx::query(&count_sql).bind(me.id);
    if let Some(s) = status {
        count_query = count_query.bind(s.as_str());
    }
    let count: i64 = count_query.fetch_one(&db.pool).await?.get(0);

    let select_sql = format!(
        "{}{} ORDER BY p.created DESC LIMIT ? OFFSET ?",
        SUMMARY_SELECT, where_sql
    );
    let mut query = sqlx::query(&select_sql).bind(me.id).bind(me.id);
    if let Some(s) = status {
        query = query.bind(s.as_str());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let results = rows
        .iter()
        .map(map_summary)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page::new(count, params, results))
}

/// Accessible published posts matching the tag filter. `All` requires every
/// tag; `Any` requires at least one.
pub async fn posts_by_tag(
    db: &Database,
    me: &Profile,
    tags: &[String],
    mode: TagMode,
    params: PageParams,
) -> AppResult<Page<PostSummary>> {
    if tags.is_empty() {
        return Err(AppError::Validation(
            "tags: At least one tag is required.".to_string(),
        ));
    }

    let placeholders = vec!["?"; tags.len()].join(", ");
    let tag_cond = match mode {
        TagMode::All => format!(
            " AND p.id IN (SELECT pt.post_id FROM post_tags pt
                JOIN tags t ON t.id = pt.tag_id
                WHERE t.name IN ({})
                GROUP BY pt.post_id
                HAVING COUNT(DISTINCT t.name) = ?)",
            placeholders
        ),
        TagMode::Any => format!(
            " AND EXISTS (SELECT 1 FROM post_tags pt
                JOIN tags t ON t.id = pt.tag_id
                WHERE pt.post_id = p.id AND t.name IN ({}))",
            placeholders
        ),
    };

    let where_sql = format!(
        " WHERE p.status = 'published' AND {}{}",
        VISIBLE_AUTHOR_SQL, tag_cond
    );

    let count_sql = format!("{}{}", SUMMARY_COUNT, where_sql);
    let mut count_query = sqlx::query(&count_sql).bind(me.id).bind(me.id);
    for tag in tags {
        count_query = count_query.bind(tag);
    }
    if mode == TagMode::All {
        count_query = count_query.bind(tags.len() as i64);
    }
    let count: i64 = count_query.fetch_one(&db.pool).await?.get(0);

    let select_sql = format!(
        "{}{} ORDER BY p.published_at DESC, p.created DESC LIMIT ? OFFSET ?",
        SUMMARY_SELECT, where_sql
    );
    let mut query = sqlx::query(&select_sql).bind(me.id).bind(me.id).bind(me.id);
    for tag in tags {
        query = query.bind(tag);
    }
    if mode == TagMode::All {
        query = query.bind(tags.len() as i64);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let results = rows
        .iter()
        .map(map_summary)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page::new(count, params, results))
}

/// Accessible published posts the caller has liked.
pub async fn liked_by_me(
    db: &Database,
    me: &Profile,
    params: PageParams,
) -> AppResult<Page<PostSummary>> {
    let where_sql = format!(
        " WHERE p.status = 'published' AND {} AND EXISTS (
             SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.profile_id = ?)",
        VISIBLE_AUTHOR_SQL
    );

    let count_sql = format!("{}{}", SUMMARY_COUNT, where_sql);
    let count: i64 = sqlx::query(&count_sql)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .fetch_one(&db.pool)
        .await?
        .get(0);

    let select_sql = format!(
        "{}{} ORDER BY p.published_at DESC, p.created DESC LIMIT ? OFFSET ?",
        SUMMARY_SELECT, where_sql
    );
    let rows = sqlx::query(&select_sql)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let results = rows
        .iter()
        .map(map_summary)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page::new(count, params, results))
}

pub async fn like_status(db: &Database, me: &Profile, post_id: i64) -> AppResult<LikeStatus> {
    let post = resolve_visible_post(db, me, post_id).await?;

    let liked: bool = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM likes WHERE post_id = ? AND profile_id = ?)",
    )
    .bind(post.id)
    .bind(me.id)
    .fetch_one(&db.pool)
    .await?
    .get(0);

    Ok(LikeStatus {
        liked,
        likes_count: post.likes_count,
    })
}

/// Idempotent like: a repeat is a no-op and the counter moves only when the
/// row is actually inserted.
pub async fn like_post(db: &Database, me: &Profile, post_id: i64) -> AppResult<LikeStatus> {
    let post = resolve_visible_post(db, me, post_id).await?;
    let now = Utc::now().timestamp();

    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query(
        "INSERT OR IGNORE INTO likes (post_id, profile_id, created) VALUES (?, ?, ?)",
    )
    .bind(post.id)
    .bind(me.id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() > 0 {
        sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let likes_count = current_likes_count(db, post.id).await?;
    Ok(LikeStatus {
        liked: true,
        likes_count,
    })
}

/// Idempotent unlike.
pub async fn unlike_post(db: &Database, me: &Profile, post_id: i64) -> AppResult<LikeStatus> {
    let post = resolve_visible_post(db, me, post_id).await?;

    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query("DELETE FROM likes WHERE post_id = ? AND profile_id = ?")
        .bind(post.id)
        .bind(me.id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() > 0 {
        sqlx::query("UPDATE posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?")
            .bind(post.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let likes_count = current_likes_count(db, post.id).await?;
    Ok(LikeStatus {
        liked: false,
        likes_count,
    })
}

async fn current_likes_count(db: &Database, post_id: i64) -> AppResult<i64> {
    let row = sqlx::query("SELECT likes_count FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_one(&db.pool)
        .await?;
    Ok(row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags("Learning #Rust and #go-lang today. Not#this one. ##meta");
        assert_eq!(tags, vec!["rust", "go-lang", "meta"]);
    }

    #[test]
    fn test_extract_tags_dedup() {
        let tags = extract_tags("#go #GO #Go");
        assert_eq!(tags, vec!["go"]);
    }

    #[test]
    fn test_parse_tag_filter() {
        let tags = parse_tag_filter("Go, rust  go\nasync");
        assert_eq!(tags, vec!["go", "rust", "async"]);
    }
}
