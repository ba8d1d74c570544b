//! Gateway bootstrap: storage, bucket, signer, router, listener.

use crate::{
    config::AppConfig,
    db,
    routes::routes,
    services::{signing::UrlSigner, storage_service::StorageService},
    state::AppState,
};
use anyhow::{Context, Result};
use axum::Router;
use sqlx::SqlitePool;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::{fs, net::TcpListener};

/// Assemble the application state for an already-migrated pool and make sure
/// the configured bucket exists.
pub async fn build_state(cfg: &AppConfig, pool: SqlitePool) -> Result<AppState> {
    let storage = StorageService::new(Arc::new(pool), cfg.storage_dir.clone());
    storage.ensure_bucket(&cfg.bucket, &cfg.region).await?;

    let signer = UrlSigner::new(
        cfg.signing_secret.expose(),
        &cfg.public_url,
        cfg.url_ttl_secs,
    )
    .context("building URL signer")?;
    Ok(AppState::new(storage, signer, cfg.bucket.clone()))
}

pub fn app(state: AppState) -> Router {
    routes::routes().with_state(state)
}

/// Run the gateway until the process is stopped. With `migrate` set, return
/// once the schema is applied.
pub async fn run(cfg: AppConfig, migrate: bool) -> Result<()> {
    tracing::info!("Starting object-drive gateway with config: {:?}", cfg);
    if cfg.signing_secret_generated {
        tracing::warn!(
            "No signing secret configured; signed URLs will not survive a restart. \
             Set OBJECT_DRIVE_SIGNING_SECRET."
        );
    }

    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir).await?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    let pool = db::connect(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    let state = build_state(&cfg, pool).await?;
    let app = app(state);

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
