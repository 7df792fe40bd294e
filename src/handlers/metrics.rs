// src/handlers/metrics.rs
use chrono::Utc;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::AssetId;
use crate::services::resolver::TieredResolver;
use crate::services::scheduler::RefreshScheduler;

/// Parses `assets=Gold,Bitcoin`. Missing or blank means every asset.
pub fn parse_assets(raw: Option<&str>) -> Result<Vec<AssetId>, ApiError> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(AssetId::ALL.to_vec()),
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| name.parse::<AssetId>().map_err(ApiError::bad_request))
        .collect()
}

pub async fn get_metrics(
    query: HashMap<String, String>,
    resolver: Arc<TieredResolver>,
) -> Result<Json, Rejection> {
    let assets = parse_assets(query.get("assets").map(String::as_str)).map_err(|e| {
        warn!("Rejected metrics request: {}", e);
        warp::reject::custom(e)
    })?;

    info!("Resolving metrics for {:?}", assets);
    let resolution = resolver.resolve(&assets).await;

    Ok(warp::reply::json(&serde_json::json!({
        "metrics": resolution.metrics,
        "source_mix": resolution.source_mix,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

pub async fn refresh_metrics(scheduler: Arc<RefreshScheduler>) -> Result<Json, Rejection> {
    let summary = scheduler.run_refresh("manual").await;
    Ok(warp::reply::json(&summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    #[test]
    fn blank_or_missing_means_all_assets() {
        assert_eq!(parse_assets(None).unwrap(), AssetId::ALL.to_vec());
        assert_eq!(parse_assets(Some("  ")).unwrap(), AssetId::ALL.to_vec());
    }

    #[test]
    fn names_are_trimmed_and_case_insensitive() {
        assert_eq!(
            parse_assets(Some("gold, Bitcoin,")).unwrap(),
            vec![AssetId::Gold, AssetId::Bitcoin]
        );
    }

    #[test]
    fn unknown_asset_is_a_bad_request() {
        let err = parse_assets(Some("Gold,Silver")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Silver"));
    }
}
