// Deferred post publication. Each scheduled post owns at most one one-shot
// timer; rescheduling aborts the previous timer before arming the next, and
// the fired job only publishes through a guarded UPDATE, so a timer racing a
// manual edit can never double-publish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::Row;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::database::Database;
use crate::error::AppResult;

pub struct PostScheduler {
    db: Arc<Database>,
    timers: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
}

impl PostScheduler {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self {
            db,
            timers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Arm the one-shot timer for a post, replacing any previous timer.
    /// The stale-entry case (a fired timer removing a successor's map slot)
    /// is tolerated: correctness rests on the publish guard, not the map.
    pub async fn schedule(&self, post_id: i64, publish_at: i64) {
        let db = self.db.clone();
        let timers = Arc::clone(&self.timers);

        let handle = tokio::spawn(async move {
            let now = Utc::now().timestamp();
            let delay = (publish_at - now).max(0) as u64;
            tokio::time::sleep(Duration::from_secs(delay)).await;

            match publish_due(&db, post_id).await {
                Ok(true) => info!("Published scheduled post {}", post_id),
                Ok(false) => info!(
                    "Skipped publishing post {}: no longer scheduled for now",
                    post_id
                ),
                Err(e) => error!("Deferred publish of post {} failed: {}", post_id, e),
            }

            timers.lock().await.remove(&post_id);
        });

        let mut timers = self.timers.lock().await;
        if let Some(old) = timers.insert(post_id, handle) {
            old.abort();
        }
    }

    /// Drop the timer for a post, if one is armed.
    pub async fn cancel(&self, post_id: i64) {
        if let Some(handle) = self.timers.lock().await.remove(&post_id) {
            handle.abort();
        }
    }

    pub async fn active_timers(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Re-arm timers for every post still in `scheduled` after a restart.
    /// Overdue posts get a zero-delay timer and publish immediately.
    pub async fn recover(&self) -> AppResult<usize> {
        let rows = sqlx::query("SELECT id, scheduled_at FROM posts WHERE status = 'scheduled'")
            .fetch_all(&self.db.pool)
            .await?;

        let count = rows.len();
        for row in rows {
            let post_id: i64 = row.get("id");
            let scheduled_at: i64 = row.get("scheduled_at");
            self.schedule(post_id, scheduled_at).await;
        }

        if count > 0 {
            info!("Recovered {} scheduled post timers", count);
        }
        Ok(count)
    }
}

/// Publish a post if, and only if, it is still scheduled and due. Returns
/// whether the transition happened; a lost race is not an error.
pub async fn publish_due(db: &Database, post_id: i64) -> AppResult<bool> {
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        "UPDATE posts
         SET status = 'published', published_at = ?, scheduled_at = NULL, updated = ?
         WHERE id = ? AND status = 'scheduled' AND scheduled_at <= ?",
    )
    .bind(now)
    .bind(now)
    .bind(post_id)
    .bind(now)
    .execute(&db.pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
