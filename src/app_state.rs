use std::sync::Arc;

use crate::{config::Config, database::Database, scheduler::PostScheduler, security::AuthService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthService>,
    pub scheduler: Arc<PostScheduler>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database =
            Database::connect(&config.database.url, config.database.max_connections).await?;
        database.init().await?;
        let db = Arc::new(database);

        let auth = Arc::new(AuthService::new(config.auth.clone()));
        let scheduler = PostScheduler::new(db.clone());

        Ok(Self {
            db,
            auth,
            scheduler,
            config,
        })
    }
}
