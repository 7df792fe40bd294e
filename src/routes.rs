// src/routes.rs
use std::collections::HashMap;
use std::sync::Arc;
use warp::reject::Rejection;
use crate::handlers::{health::health, health::scheduler_status, metrics::get_metrics, metrics::refresh_metrics};
use crate::services::resolver::TieredResolver;
use crate::services::scheduler::RefreshScheduler;
use log::{error, info};

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use crate::handlers::error::ApiError;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query string".to_string();
    } else {
        error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    resolver: Arc<TieredResolver>,
    scheduler: Arc<RefreshScheduler>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let resolver_filter = warp::any().map(move || resolver.clone());
    let scheduler_filter = warp::any().map(move || scheduler.clone());

    let health_route = warp::path::end()
        .and(warp::get())
        .and_then(health);

    let metrics_route = warp::path!("api" / "v1" / "metrics")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(resolver_filter.clone())
        .and_then(get_metrics);

    let refresh_route = warp::path!("api" / "v1" / "metrics" / "refresh")
        .and(warp::post())
        .and(scheduler_filter.clone())
        .and_then(refresh_metrics);

    let status_route = warp::path!("api" / "v1" / "status")
        .and(warp::get())
        .and(scheduler_filter.clone())
        .and_then(scheduler_status);

    info!("All routes configured successfully.");

    health_route
        .or(metrics_route)
        .or(refresh_route)
        .or(status_route)
        .recover(handle_rejection)
}
