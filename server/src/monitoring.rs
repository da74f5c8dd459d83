//! Modulo per il monitoraggio del processo server
//!
//! Campiona CPU e memoria **del processo corrente** con `sysinfo` e li combina
//! con lo stato volatile (utenti online, stanze attive). Usato dall'endpoint
//! `/health` e da un task in background che logga le statistiche a intervalli.

use crate::core::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time;
use tracing::{info, instrument, warn};

/// Statistiche del processo raccolte in un dato momento
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cpu_percentage: f32,
    pub memory_usage_mb: f64,
}

impl ProcessStats {
    /// Formatta le statistiche come stringa per il logging
    pub fn format_for_log(&self) -> String {
        format!(
            "[{}] CPU Usage: {:.2}% | Memory: {:.2} MB",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.cpu_percentage,
            self.memory_usage_mb
        )
    }
}

/// Due letture a distanza di `MINIMUM_CPU_UPDATE_INTERVAL`: la prima serve solo
/// da riferimento per il calcolo della CPU.
pub async fn sample_process() -> Option<ProcessStats> {
    let pid = Pid::from_u32(std::process::id());
    let mut sys = System::new();

    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    sys.process(pid).map(|process| ProcessStats {
        timestamp: chrono::Utc::now(),
        cpu_percentage: process.cpu_usage(),
        memory_usage_mb: process.memory() as f64 / (1024.0 * 1024.0),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub online_users: usize,
    pub active_rooms: usize,
    pub typing_rooms: usize,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessStats>,
}

/// GET /health - 200 se il database risponde, 503 altrimenti
#[instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    if !database_ok {
        warn!("Database unreachable");
    }

    let report = HealthReport {
        status: if database_ok { "ok" } else { "degraded" },
        uptime_secs: state.started_at.elapsed().as_secs(),
        online_users: state.presence.online_count(),
        active_rooms: state.rooms.room_count(),
        typing_rooms: state.typing.active_rooms(),
        database: if database_ok { "reachable" } else { "unreachable" },
        process: sample_process().await,
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Task di monitoraggio che gira in background e logga ogni `interval_secs` secondi
pub async fn start_stats_monitoring(state: Arc<AppState>, interval_secs: u64) {
    info!("Starting process monitoring with interval: {} seconds", interval_secs);

    let mut interval = time::interval(Duration::from_secs(interval_secs));
    // Salta il primo tick che avviene immediatamente
    interval.tick().await;

    loop {
        interval.tick().await;

        let online = state.presence.online_count();
        let rooms = state.rooms.room_count();
        match sample_process().await {
            Some(stats) => info!(online, rooms, "{}", stats.format_for_log()),
            None => info!(online, rooms, "Process stats unavailable"),
        }
    }
}
