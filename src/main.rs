use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    fetcher::HttpFetcher,
    job_queue::{JobQueue, JobWorker},
    notifier::Notifier,
    preview_processor::PreviewProcessor,
    preview_repository::PreviewRepository,
    preview_service::PreviewService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting og-preview with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url, 5).await?);

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Wire core services ---
    let repo = PreviewRepository::new(db.clone());
    let notifier = Notifier::new();
    let (queue, receiver) = JobQueue::new();
    let scheduler = Arc::new(queue);
    let fetcher = Arc::new(HttpFetcher::new().context("building HTTP client")?);

    let processor = PreviewProcessor::new(
        repo.clone(),
        fetcher,
        notifier.clone(),
        scheduler.clone(),
    );
    tokio::spawn(JobWorker::new(receiver, Arc::new(processor), cfg.workers).run());

    let service = PreviewService::new(repo, notifier, scheduler);
    service.recover_incomplete().await?;

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
