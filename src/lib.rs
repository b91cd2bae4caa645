//! SentinelAI -- per-source traffic anomaly detection.
//!
//! Inbound requests are recorded as traffic events, bucketed into one-minute
//! windows per source address, and judged by a rate threshold and a trained
//! scoring artifact. Flagged windows become alerts or explanations.

pub mod api;
pub mod config;
pub mod detect;
pub mod model;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SentinelConfig;
use crate::detect::DetectionEngine;
use crate::model::ArtifactFile;
use crate::storage::SqliteStore;

/// Build a detection engine over the configured SQLite store and artifact.
pub fn open_engine(config: &SentinelConfig) -> Result<DetectionEngine> {
    let db_path = config.storage.db_path.to_string_lossy();
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(&db_path)
        .with_context(|| format!("failed to open database {}", db_path))?;

    Ok(DetectionEngine::with_config(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(
            ArtifactFile::new(config.model.artifact_path.clone())
                .with_label_threshold(config.detection.threshold),
        ),
        &config.detection,
    ))
}

/// Start the SentinelAI API server.
pub async fn serve(config: &SentinelConfig) -> Result<()> {
    let engine = open_engine(config)?;

    let mut state = api::state::AppState::new(engine);
    state.trust_forwarded_for = config.server.trust_forwarded_for;
    let app = api::router(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    tracing::info!(%addr, "SentinelAI listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
