// Tag-overlap recommendations: the tags of everything the caller liked or
// commented on, matched against the visible published posts of others.

use serde::Serialize;
use sqlx::Row;

use crate::database::Database;
use crate::error::AppResult;
use crate::models::{display_name, PostStatus, Profile};
use crate::pagination::{Page, PageParams};

#[derive(Debug, Serialize)]
pub struct RecommendedPost {
    pub id: i64,
    pub title: String,
    pub author_full_name: String,
    pub status: PostStatus,
    pub created: i64,
    pub published_at: Option<i64>,
    pub liked_by_me: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub tag_overlap: i64,
}

const MY_TAGS_CTE: &str = "WITH my_tags AS (
    SELECT DISTINCT pt.tag_id
    FROM post_tags pt
    JOIN posts sp ON sp.id = pt.post_id
    WHERE sp.status = 'published' AND (
        EXISTS (SELECT 1 FROM likes l WHERE l.post_id = sp.id AND l.profile_id = ?)
        OR EXISTS (SELECT 1 FROM comments c WHERE c.post_id = sp.id AND c.author_id = ?)
    )
)";

const OVERLAP_EXPR: &str = "(SELECT COUNT(*) FROM post_tags pt
    WHERE pt.post_id = p.id AND pt.tag_id IN (SELECT tag_id FROM my_tags))";

/// Visible published posts by other authors, ranked by how many tags they
/// share with the caller's liked/commented posts; ties broken by recency.
pub async fn recommended(
    db: &Database,
    me: &Profile,
    params: PageParams,
) -> AppResult<Page<RecommendedPost>> {
    let where_sql = format!(
        "WHERE p.status = 'published'
           AND p.author_id <> ?
           AND (p.author_id = ? OR pr.is_private = 0 OR EXISTS (
                SELECT 1 FROM follows f
                WHERE f.follower_id = ? AND f.following_id = p.author_id
                  AND f.status = 'accepted'))
           AND {} > 0",
        OVERLAP_EXPR
    );

    let count_sql = format!(
        "{} SELECT COUNT(*)
         FROM posts p
         JOIN profiles pr ON pr.id = p.author_id
         {}",
        MY_TAGS_CTE, where_sql
    );
    let count: i64 = sqlx::query(&count_sql)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .fetch_one(&db.pool)
        .await?
        .get(0);

    let select_sql = format!(
        "{} SELECT p.id, p.title, p.status, p.created, p.published_at,
                   p.likes_count, p.comments_count,
                   pr.first_name, pr.last_name, a.email,
                   EXISTS (SELECT 1 FROM likes l
                           WHERE l.post_id = p.id AND l.profile_id = ?) AS liked_by_me,
                   {} AS tag_overlap
         FROM posts p
         JOIN profiles pr ON pr.id = p.author_id
         JOIN accounts a ON a.id = pr.account_id
         {}
         ORDER BY tag_overlap DESC, COALESCE(p.published_at, p.created) DESC
         LIMIT ? OFFSET ?",
        MY_TAGS_CTE, OVERLAP_EXPR, where_sql
    );

    let rows = sqlx::query(&select_sql)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(me.id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&db.pool)
        .await?;

    let mut results = Vec::new();
    for row in rows {
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let email: String = row.get("email");
        results.push(RecommendedPost {
            id: row.get("id"),
            title: row.get("title"),
            author_full_name: display_name(&first_name, &last_name, &email),
            status: PostStatus::parse(row.get::<String, _>("status").as_str())?,
            created: row.get("created"),
            published_at: row.get("published_at"),
            liked_by_me: row.get("liked_by_me"),
            likes_count: row.get("likes_count"),
            comments_count: row.get("comments_count"),
            tag_overlap: row.get("tag_overlap"),
        });
    }

    Ok(Page::new(count, params, results))
}
