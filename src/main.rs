// Linkfeed Server - social networking backend

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use linkfeed::{api::api_router, app_state::AppState, config::Config, security};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Re-arm publication timers left over from a previous run
    app_state.scheduler.recover().await?;

    // Sweep expired refresh tokens hourly
    security::start_token_cleanup_worker(app_state.db.clone(), Duration::from_secs(3600));

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    println!("🚀 Linkfeed server starting on http://{}", addr);
    println!("📋 API overview:");
    println!("  POST   /api/v1/users/register                    - Create account");
    println!("  POST   /api/v1/users/token                       - Obtain JWT pair");
    println!("  GET    /api/v1/profiles                          - Browse profiles");
    println!("  POST   /api/v1/profiles/{{id}}/follow              - Send follow request");
    println!("  GET    /api/v1/posts                             - Accessible published posts");
    println!("  POST   /api/v1/posts                             - Create draft/scheduled/published post");
    println!("  GET    /api/v1/posts/recommended                 - Tag-overlap recommendations");
    println!("  GET    /api/v1/comments?post={{id}}                - Comments on a post");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
