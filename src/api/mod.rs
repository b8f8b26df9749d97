// HTTP surface: one router per resource group, nested under /api/v1.

use axum::Router;

use crate::app_state::AppState;

pub mod accounts;
pub mod comments;
pub mod posts;
pub mod profiles;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/users", accounts::router())
        .nest("/profiles", profiles::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
}
