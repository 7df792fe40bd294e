// src/handlers/health.rs
use chrono::Utc;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::services::scheduler::RefreshScheduler;

pub async fn health() -> Result<Json, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

pub async fn scheduler_status(scheduler: Arc<RefreshScheduler>) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&scheduler.status(Utc::now()).await))
}
