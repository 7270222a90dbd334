use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use dotenvy::dotenv;
use tracing::{info, warn};

use bugtrack::api::{RateLimitConfig, create_router_with_rate_limit};
use bugtrack::app::{AppState, Repositories};
use bugtrack::infra::observability::{init_metrics_handle, init_tracing};
use bugtrack::infra::{LocalFileStore, PostgresClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let db = Arc::new(
        PostgresClient::with_defaults(&database_url)
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    db.run_migrations()
        .await
        .context("failed to run database migrations")?;

    let files = Arc::new(LocalFileStore::from_env());
    info!(upload_dir = %files.root().display(), "attachment storage ready");

    // One pooled client backs every repository slot.
    let repos = Repositories {
        users: db.clone(),
        projects: db.clone(),
        members: db.clone(),
        bugs: db.clone(),
        comments: db.clone(),
        history: db.clone(),
        attachments: db.clone(),
    };
    let state = AppState::new(repos, files);

    let mut router = create_router_with_rate_limit(state, RateLimitConfig::from_env());

    // Prometheus scrape endpoint lives outside /api so it skips the CORS
    // and rate-limit stack.
    match init_metrics_handle() {
        Some(handle) => {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = Arc::clone(&handle);
                    async move { handle.render() }
                }),
            );
        }
        None => warn!("metrics recorder not installed; /metrics disabled"),
    }

    let port: u16 = env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "server starting");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
