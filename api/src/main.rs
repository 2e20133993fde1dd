mod admin;
mod auth;
mod comments;
mod config;
mod db;
mod error;
mod ideas;
mod profiles;
mod votes;


use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Identity
        .route("/api/auth/me", get(auth::me))
        .route("/api/profile", put(profiles::update_own_profile))
        // Ideas
        .route(
            "/api/ideas",
            get(ideas::list_ideas).post(ideas::create_idea),
        )
        .route("/api/my/ideas", get(ideas::my_ideas))
        .route(
            "/api/ideas/{id}",
            get(ideas::get_idea)
                .put(ideas::edit_idea)
                .delete(ideas::remove_idea),
        )
        // Votes
        .route(
            "/api/ideas/{id}/vote",
            get(votes::get_vote).post(votes::post_vote),
        )
        // Comments
        .route(
            "/api/ideas/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/api/comments/{id}", delete(comments::remove_comment))
        // Admin
        .route("/api/admin/stats", get(admin::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ideaboard_api=debug,tower_http=info")),
        )
        .init();

    let settings = Settings::load().context("loading settings")?;

    let pool = db::open_pool(&settings.database_url).context("opening database pool")?;
    db::run_migrations(&pool).context("running migrations")?;

    let cors = CorsLayer::new()
        .allow_origin(
            settings
                .cors_origin
                .parse::<axum::http::HeaderValue>()
                .context("invalid CORS_ORIGIN")?,
        )
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let bind_addr = settings.bind_addr.clone();
    let state = AppState {
        db: pool,
        settings: Arc::new(settings),
    };
    let app = router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
