// Follow graph: a directed edge per ordered profile pair with a
// pending/accepted state. Rejection and unfollow delete the edge, so `none`
// is always the absence of a row.

use chrono::Utc;
use serde::Serialize;
use sqlx::Row;

use crate::database::{map_profile, Database, PROFILE_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::models::{display_name, FollowStatus, Profile};
use crate::pagination::{Page, PageParams};
use crate::services::is_unique_violation;

#[derive(Debug, Clone, Copy)]
pub struct FollowOutcome {
    pub status: FollowStatus,
}

/// Create the edge: pending toward private targets, accepted toward public
/// ones. An edge in any existing state is a duplicate and is rejected.
pub async fn follow(db: &Database, me: &Profile, target_id: i64) -> AppResult<FollowOutcome> {
    if me.id == target_id {
        return Err(AppError::BadRequest("Cannot follow yourself.".to_string()));
    }

    let target = db
        .get_profile(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let status = if target.is_private {
        FollowStatus::Pending
    } else {
        FollowStatus::Accepted
    };

    let now = Utc::now().timestamp();
    let mut tx = db.begin_transaction().await?;

    let insert = sqlx::query(
        "INSERT INTO follows (follower_id, following_id, status, created) VALUES (?, ?, ?, ?)",
    )
    .bind(me.id)
    .bind(target.id)
    .bind(status.as_str())
    .bind(now)
    .execute(&mut *tx)
    .await;

    if let Err(e) = insert {
        if is_unique_violation(&e) {
            return Err(AppError::BadRequest(
                "Follow request already exists.".to_string(),
            ));
        }
        return Err(e.into());
    }

    if status == FollowStatus::Accepted {
        bump_counters(&mut tx, me.id, target.id, 1).await?;
    }

    tx.commit().await?;
    Ok(FollowOutcome { status })
}

/// Delete the edge from any state. Returns whether an edge existed.
pub async fn unfollow(db: &Database, me: &Profile, target_id: i64) -> AppResult<bool> {
    if me.id == target_id {
        return Err(AppError::BadRequest("Cannot unfollow yourself.".to_string()));
    }

    // 404 for a missing target, same as follow.
    db.get_profile(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let mut tx = db.begin_transaction().await?;

    let row = sqlx::query("SELECT status FROM follows WHERE follower_id = ? AND following_id = ?")
        .bind(me.id)
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        return Ok(false);
    };
    let was_accepted = row.get::<String, _>("status") == FollowStatus::Accepted.as_str();

    sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
        .bind(me.id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

    if was_accepted {
        bump_counters(&mut tx, me.id, target_id, -1).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Accept a pending request addressed to me. Valid only from `pending`.
pub async fn accept_request(db: &Database, me: &Profile, follower_id: i64) -> AppResult<()> {
    let mut tx = db.begin_transaction().await?;

    let result = sqlx::query(
        "UPDATE follows SET status = 'accepted'
         WHERE follower_id = ? AND following_id = ? AND status = 'pending'",
    )
    .bind(follower_id)
    .bind(me.id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Request not found or it is not in status pending.".to_string(),
        ));
    }

    bump_counters(&mut tx, follower_id, me.id, 1).await?;
    tx.commit().await?;
    Ok(())
}

/// Reject a pending request addressed to me: the edge is deleted, so a later
/// follow starts over from `none`.
pub async fn reject_request(db: &Database, me: &Profile, follower_id: i64) -> AppResult<()> {
    let result = sqlx::query(
        "DELETE FROM follows WHERE follower_id = ? AND following_id = ? AND status = 'pending'",
    )
    .bind(follower_id)
    .bind(me.id)
    .execute(&db.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Request not found or it is not in status pending.".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PendingRequest {
    pub follower_id: i64,
    pub full_name: String,
    pub requested_at: i64,
    pub status: FollowStatus,
}

/// Incoming requests waiting for my decision, newest first.
pub async fn pending_requests(db: &Database, me: &Profile) -> AppResult<Vec<PendingRequest>> {
    let rows = sqlx::query(
        "SELECT f.follower_id, f.created, p.first_name, p.last_name, a.email
         FROM follows f
         JOIN profiles p ON p.id = f.follower_id
         JOIN accounts a ON a.id = p.account_id
         WHERE f.following_id = ? AND f.status = 'pending'
         ORDER BY f.created DESC",
    )
    .bind(me.id)
    .fetch_all(&db.pool)
    .await?;

    let mut requests = Vec::new();
    for row in rows {
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let email: String = row.get("email");
        requests.push(PendingRequest {
            follower_id: row.get("follower_id"),
            full_name: display_name(&first_name, &last_name, &email),
            requested_at: row.get("created"),
            status: FollowStatus::Pending,
        });
    }
    Ok(requests)
}

pub async fn follow_status(
    db: &Database,
    follower_id: i64,
    following_id: i64,
) -> AppResult<Option<FollowStatus>> {
    let edge = db.get_follow(follower_id, following_id).await?;
    Ok(edge.map(|e| e.status))
}

pub async fn has_accepted_edge(
    db: &Database,
    follower_id: i64,
    following_id: i64,
) -> AppResult<bool> {
    Ok(follow_status(db, follower_id, following_id).await? == Some(FollowStatus::Accepted))
}

/// Privacy rule consumed by profile detail and all content visibility:
/// public profiles are open; private ones require ownership or an accepted
/// edge from the viewer.
pub async fn can_view_profile(
    db: &Database,
    viewer: Option<&Profile>,
    target: &Profile,
) -> AppResult<bool> {
    if !target.is_private {
        return Ok(true);
    }
    let Some(viewer) = viewer else {
        return Ok(false);
    };
    if viewer.id == target.id {
        return Ok(true);
    }
    has_accepted_edge(db, viewer.id, target.id).await
}

#[derive(Debug, Serialize)]
pub struct ProfileSummary {
    pub id: i64,
    pub full_name: String,
    pub is_private: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub follow_status: Option<FollowStatus>,
}

/// Every profile except the viewer's own, annotated with the viewer's edge
/// state toward each.
pub async fn list_profiles(
    db: &Database,
    viewer: Option<&Profile>,
    params: PageParams,
) -> AppResult<Page<ProfileSummary>> {
    let me_id = viewer.map(|p| p.id).unwrap_or(-1);

    let count: i64 = sqlx::query("SELECT COUNT(*) FROM profiles WHERE id <> ?")
        .bind(me_id)
        .fetch_one(&db.pool)
        .await?
        .get(0);

    let rows = sqlx::query(
        "SELECT p.id, p.first_name, p.last_name, p.is_private,
                p.followers_count, p.following_count, a.email,
                (SELECT f.status FROM follows f
                 WHERE f.follower_id = ? AND f.following_id = p.id) AS follow_status
         FROM profiles p
         JOIN accounts a ON a.id = p.account_id
         WHERE p.id <> ?
         ORDER BY p.created DESC
         LIMIT ? OFFSET ?",
    )
    .bind(me_id)
    .bind(me_id)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&db.pool)
    .await?;

    let mut results = Vec::new();
    for row in rows {
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        let email: String = row.get("email");
        let follow_status = row
            .get::<Option<String>, _>("follow_status")
            .map(|s| FollowStatus::parse(&s))
            .transpose()?;
        results.push(ProfileSummary {
            id: row.get("id"),
            full_name: display_name(&first_name, &last_name, &email),
            is_private: row.get("is_private"),
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
            follow_status,
        });
    }

    Ok(Page::new(count, params, results))
}

/// Profile together with its account email, for name rendering.
pub async fn get_profile_with_email(db: &Database, id: i64) -> AppResult<Option<(Profile, String)>> {
    let row = sqlx::query(&format!(
        "SELECT {}, (SELECT email FROM accounts WHERE accounts.id = profiles.account_id) AS email
         FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&db.pool)
    .await?;

    match row {
        Some(r) => {
            let profile = map_profile(&r)?;
            let email: String = r.get("email");
            Ok(Some((profile, email)))
        }
        None => Ok(None),
    }
}

async fn bump_counters(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    follower_id: i64,
    following_id: i64,
    delta: i64,
) -> AppResult<()> {
    if delta > 0 {
        sqlx::query("UPDATE profiles SET following_count = following_count + 1 WHERE id = ?")
            .bind(follower_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("UPDATE profiles SET followers_count = followers_count + 1 WHERE id = ?")
            .bind(following_id)
            .execute(&mut **tx)
            .await?;
    } else {
        sqlx::query("UPDATE profiles SET following_count = MAX(following_count - 1, 0) WHERE id = ?")
            .bind(follower_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("UPDATE profiles SET followers_count = MAX(followers_count - 1, 0) WHERE id = ?")
            .bind(following_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
