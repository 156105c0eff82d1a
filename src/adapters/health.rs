use crate::utils::error::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::net::TcpListener;

/// Bot 執行狀態，polling 迴圈與 health endpoint 共用
#[derive(Debug)]
pub struct HealthState {
    started_at: DateTime<Utc>,
    started: Instant,
    updates_processed: AtomicU64,
    bot_username: RwLock<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub bot_username: Option<String>,
    pub started_at: String,
    pub uptime_secs: u64,
    pub updates_processed: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            updates_processed: AtomicU64::new(0),
            bot_username: RwLock::new(None),
        }
    }

    pub fn record_update(&self) {
        self.updates_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_bot_username(&self, username: Option<String>) {
        if let Ok(mut slot) = self.bot_username.write() {
            *slot = username;
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            bot_username: self.bot_username.read().ok().and_then(|u| u.clone()),
            started_at: self.started_at.to_rfc3339(),
            uptime_secs: self.started.elapsed().as_secs(),
            updates_processed: self.updates_processed.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

async fn root() -> &'static str {
    "OK"
}

async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthReport> {
    Json(state.report())
}

pub fn health_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(state)
}

pub async fn serve_health<F>(listener: TcpListener, state: Arc<HealthState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("🩺 Health endpoint listening on http://{}", addr);
    }
    axum::serve(listener, health_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
