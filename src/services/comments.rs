// Threaded comments with soft deletion. A deleted comment stays in the
// table but drops out of every read path; counters follow the live set.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::database::{map_comment, Database, COMMENT_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::models::{display_name, Comment, Profile};
use crate::pagination::{Page, PageParams};
use crate::services::posts;

pub const MAX_COMMENT_LEN: usize = 2000;

/// Minimum gap between two comments by the same author.
const THROTTLE_SECONDS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    pub post_id: i64,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_full_name: String,
    pub content: String,
    pub parent_id: Option<i64>,
    pub is_deleted: bool,
    pub created: i64,
    pub updated: i64,
    pub children_count: i64,
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(
            "Comment content cannot be empty.".to_string(),
        ));
    }
    if content.len() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "Comment must be at most {} characters.",
            MAX_COMMENT_LEN
        )));
    }
    Ok(())
}

pub async fn create_comment(
    db: &Database,
    me: &Profile,
    input: CommentInput,
) -> AppResult<CommentView> {
    validate_content(&input.content)?;

    // Commenting requires the same access as viewing the post, but a denied
    // post is a 403 here because the caller named it explicitly.
    match posts::resolve_visible_post(db, me, input.post_id).await {
        Ok(_) => {}
        Err(AppError::NotFound(_)) => {
            return Err(AppError::Forbidden(
                "You do not have access to this post.".to_string(),
            ));
        }
        Err(e) => return Err(e),
    }

    let now = Utc::now().timestamp();

    let throttled: bool = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM comments WHERE author_id = ? AND created >= ?)",
    )
    .bind(me.id)
    .bind(now - THROTTLE_SECONDS)
    .fetch_one(&db.pool)
    .await?
    .get(0);

    if throttled {
        return Err(AppError::Validation(
            "You are commenting too quickly.".to_string(),
        ));
    }

    if let Some(parent_id) = input.parent_id {
        let parent = db
            .get_comment(parent_id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| AppError::Validation("Parent comment not found.".to_string()))?;

        if parent.post_id != input.post_id {
            return Err(AppError::Validation(
                "Parent comment must belong to the same post.".to_string(),
            ));
        }
        // One nesting level: replies attach to top-level comments only.
        if parent.parent_id.is_some() {
            return Err(AppError::Validation(
                "Parent comment must be a top-level comment.".to_string(),
            ));
        }
    }

    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, content, parent_id, is_deleted, created, updated)
         VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(input.post_id)
    .bind(me.id)
    .bind(&input.content)
    .bind(input.parent_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let comment_id = result.last_insert_rowid();

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(input.post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    get_comment_view(db, me, comment_id).await
}

/// A live comment on a post the viewer can see.
pub async fn get_comment_view(
    db: &Database,
    me: &Profile,
    comment_id: i64,
) -> AppResult<CommentView> {
    let comment = resolve_live_comment(db, me, comment_id).await?;
    comment_to_view(db, comment).await
}

async fn resolve_live_comment(db: &Database, me: &Profile, comment_id: i64) -> AppResult<Comment> {
    let comment = db
        .get_comment(comment_id)
        .await?
        .filter(|c| !c.is_deleted)
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    // Resolving the post applies the author-visibility rule.
    posts::resolve_visible_post(db, me, comment.post_id).await?;
    Ok(comment)
}

async fn comment_to_view(db: &Database, comment: Comment) -> AppResult<CommentView> {
    let row = sqlx::query(
        "SELECT p.first_name, p.last_name, a.email,
                (SELECT COUNT(*) FROM comments ch
                 WHERE ch.parent_id = ? AND ch.is_deleted = 0) AS children_count
         FROM profiles p
         JOIN accounts a ON a.id = p.account_id
         WHERE p.id = ?",
    )
    .bind(comment.id)
    .bind(comment.author_id)
    .fetch_one(&db.pool)
    .await?;

    let first_name: String = row.get("first_name");
    let last_name: String = row.get("last_name");
    let email: String = row.get("email");

    Ok(CommentView {
        id: comment.id,
        post_id: comment.post_id,
        author_full_name: display_name(&first_name, &last_name, &email),
        content: comment.content,
        parent_id: comment.parent_id,
        is_deleted: comment.is_deleted,
        created: comment.created,
        updated: comment.updated,
        children_count: row.get("children_count"),
    })
}

fn order_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("created_at") => "c.created ASC",
        Some("-created_at") => "c.created DESC",
        Some("updated_at") => "c.updated ASC",
        Some("-updated_at") => "c.updated DESC",
        _ => "c.created DESC",
    }
}

/// Live comments on posts the viewer can see, filterable by post and parent.
pub async fn list_comments(
    db: &Database,
    me: &Profile,
    post: Option<i64>,
    parent: Option<i64>,
    ordering: Option<&str>,
    params: PageParams,
) -> AppResult<Page<CommentView>> {
    // Mirrors resolve_visible_post: owners see comments on their own posts
    // in any status, everyone else only on published posts of visible authors.
    let mut where_sql = String::from(
        " WHERE c.is_deleted = 0 AND (p.author_id = ? OR (p.status = 'published' AND (pr.is_private = 0 OR EXISTS (
             SELECT 1 FROM follows f
             WHERE f.follower_id = ? AND f.following_id = p.author_id AND f.status = 'accepted'))))",
    );
    if post.is_some() {
        where_sql.push_str(" AND c.post_id = ?");
    }
    if parent.is_some() {
        where_sql.push_str(" AND c.parent_id = ?");
    }

    let from_sql = "
 FROM comments c
 JOIN posts p ON p.id = c.post_id
 JOIN profiles pr ON pr.id = p.author_id";

    let count_sql = format!("SELECT COUNT(*){}{}", from_sql, where_sql);
    let mut count_query = sqlx::query(&count_sql).bind(me.id).bind(me.id);
    if let Some(post_id) = post {
        count_query = count_query.bind(post_id);
    }
    if let Some(parent_id) = parent {
        count_query = count_query.bind(parent_id);
    }
    let count: i64 = count_query.fetch_one(&db.pool).await?.get(0);

    let select_sql = format!(
        "SELECT c.id, c.post_id, c.author_id, c.content, c.parent_id, c.is_deleted,
                c.created, c.updated, au.first_name, au.last_name, aa.email,
                (SELECT COUNT(*) FROM comments ch
                 WHERE ch.parent_id = c.id AND ch.is_deleted = 0) AS children_count
         {} JOIN profiles au ON au.id = c.author_id
            JOIN accounts aa ON aa.id = au.account_id
         {} ORDER BY {} LIMIT ? OFFSET ?",
        from_sql,
        where_sql,
        order_clause(ordering)
    );
    let mut query = sqlx::query(&select_sql).bind(me.id).bind(me.id);
    if let Some(post_id) = post {
        query = query.bind(post_id);
    }
    if let Some(parent_id) = parent {
        query = query.bind(parent_id);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let mut results = Vec::new();
    for row in &rows {
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let email: String = row.get("email");
        results.push(CommentView {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_full_name: display_name(&first_name, &last_name, &email),
            content: row.get("content"),
            parent_id: row.get("parent_id"),
            is_deleted: row.get("is_deleted"),
            created: row.get("created"),
            updated: row.get("updated"),
            children_count: row.get("children_count"),
        });
    }

    Ok(Page::new(count, params, results))
}

pub async fn update_comment(
    db: &Database,
    me: &Profile,
    comment_id: i64,
    content: &str,
) -> AppResult<CommentView> {
    validate_content(content)?;

    let comment = resolve_live_comment(db, me, comment_id).await?;
    if comment.author_id != me.id {
        return Err(AppError::Forbidden(
            "You can only edit your own comments.".to_string(),
        ));
    }

    let now = Utc::now().timestamp();
    sqlx::query("UPDATE comments SET content = ?, updated = ? WHERE id = ?")
        .bind(content)
        .bind(now)
        .bind(comment_id)
        .execute(&db.pool)
        .await?;

    get_comment_view(db, me, comment_id).await
}

/// Soft delete: the row is kept, hidden from reads, and the post's counter
/// decremented once.
pub async fn delete_comment(db: &Database, me: &Profile, comment_id: i64) -> AppResult<()> {
    let comment = resolve_live_comment(db, me, comment_id).await?;
    if comment.author_id != me.id {
        return Err(AppError::Forbidden(
            "You can only delete your own comments.".to_string(),
        ));
    }

    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query("UPDATE comments SET is_deleted = 1 WHERE id = ? AND is_deleted = 0")
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() > 0 {
        sqlx::query("UPDATE posts SET comments_count = MAX(comments_count - 1, 0) WHERE id = ?")
            .bind(comment.post_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Live direct children of a comment, oldest first.
pub async fn children(
    db: &Database,
    me: &Profile,
    comment_id: i64,
) -> AppResult<Vec<CommentView>> {
    // Ensures the parent is live and its post visible.
    resolve_live_comment(db, me, comment_id).await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM comments WHERE parent_id = ? AND is_deleted = 0 ORDER BY created ASC",
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .fetch_all(&db.pool)
    .await?;

    let mut views = Vec::new();
    for row in rows {
        let comment = map_comment(&row);
        views.push(comment_to_view(db, comment).await?);
    }
    Ok(views)
}
