use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;

use crate::message::HealthResponse;

/// Liveness check for uptime monitors.
pub async fn health_handler() -> Json<HealthResponse> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default();
    Json(HealthResponse { ok: true, ts })
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
