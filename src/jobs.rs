// Row-creation triggered background work. Profile provisioning runs off the
// request path so registration returns as soon as the account row commits.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::database::Database;
use crate::error::AppResult;

/// Idempotent get-or-create of the profile backing an account.
/// Returns whether a new row was created.
pub async fn provision_profile(db: &Database, account_id: i64) -> AppResult<bool> {
    let now = Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT OR IGNORE INTO profiles (account_id, created, updated) VALUES (?, ?, ?)",
    )
    .bind(account_id)
    .bind(now)
    .bind(now)
    .execute(&db.pool)
    .await?;

    let created = result.rows_affected() > 0;
    if created {
        info!("Created profile for account {}", account_id);
    } else {
        info!("Profile already exists for account {}", account_id);
    }
    Ok(created)
}

/// Fire-and-forget provisioning task spawned right after registration.
pub fn spawn_profile_provisioning(db: Arc<Database>, account_id: i64) {
    tokio::spawn(async move {
        if let Err(e) = provision_profile(&db, account_id).await {
            error!("Failed to create profile for account {}: {}", account_id, e);
        }
    });
}
