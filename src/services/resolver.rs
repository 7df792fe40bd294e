// src/services/resolver.rs
//
// Walks the tier chain for each asset: primary dataset, fresh cache,
// live fetch, then the defaults table. Always yields a record.
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cache_store::CacheStore;
use super::calculations::MetricsCalculator;
use super::defaults::DefaultsTable;
use super::price_history::{HistoryWindow, LiveDataProvider, LiveHistory, PrimaryDataset};
use crate::error::DataError;
use crate::models::{AssetId, DataSource, MetricsRecord, Resolution, SourceMix};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub max_cache_age: Duration,
    pub history_windows: Vec<HistoryWindow>,
    pub min_live_points: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            max_cache_age: Duration::hours(24),
            history_windows: HistoryWindow::DEFAULT_CANDIDATES.to_vec(),
            min_live_points: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed {
        current_price: f64,
        data_points: usize,
        window: String,
    },
    Failed {
        reason: String,
    },
}

/// Result of a forced refresh across a set of assets.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: BTreeMap<AssetId, RefreshOutcome>,
}

impl RefreshSummary {
    pub fn refreshed_count(&self) -> usize {
        self.results
            .values()
            .filter(|o| matches!(o, RefreshOutcome::Refreshed { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.refreshed_count()
    }

    /// A refresh counts as successful when at least one asset was refreshed.
    pub fn is_success(&self) -> bool {
        self.refreshed_count() > 0
    }
}

pub struct TieredResolver {
    dataset: Arc<dyn PrimaryDataset>,
    cache: Arc<dyn CacheStore>,
    live: Arc<dyn LiveDataProvider>,
    calculator: MetricsCalculator,
    defaults: DefaultsTable,
    settings: ResolverSettings,
}

impl TieredResolver {
    pub fn new(
        dataset: Arc<dyn PrimaryDataset>,
        cache: Arc<dyn CacheStore>,
        live: Arc<dyn LiveDataProvider>,
        calculator: MetricsCalculator,
        settings: ResolverSettings,
    ) -> Self {
        TieredResolver {
            dataset,
            cache,
            live,
            calculator,
            defaults: DefaultsTable,
            settings,
        }
    }

    /// Resolves every requested asset concurrently. Duplicates are resolved once.
    pub async fn resolve(&self, assets: &[AssetId]) -> Resolution {
        let mut unique = assets.to_vec();
        unique.sort();
        unique.dedup();

        let records = join_all(unique.iter().map(|&asset| self.resolve_asset(asset))).await;

        let mut source_mix = SourceMix::default();
        let mut metrics = BTreeMap::new();
        for record in records {
            source_mix.record(record.data_source);
            metrics.insert(record.asset_id, record);
        }

        info!("Resolved {} assets ({})", metrics.len(), source_mix);
        Resolution { metrics, source_mix }
    }

    pub async fn resolve_asset(&self, asset: AssetId) -> MetricsRecord {
        if let Some(record) = self.from_primary(asset).await {
            return record;
        }
        if let Some(record) = self.from_cache(asset).await {
            return record;
        }
        match self.live_fetch(asset).await {
            Ok((record, _)) => return record,
            Err(e) => warn!("{}: live_fetch tier unavailable: {}", asset, e),
        }

        info!("{}: serving default record", asset);
        self.defaults.get(asset)
    }

    /// Bypasses the dataset and cache tiers and re-fetches every asset live.
    pub async fn force_refresh(&self, assets: &[AssetId]) -> RefreshSummary {
        let started_at = Utc::now();
        info!("Forcing live refresh for {} assets", assets.len());

        let outcomes = join_all(assets.iter().map(|&asset| async move {
            let outcome = match self.live_fetch(asset).await {
                Ok((record, history)) => RefreshOutcome::Refreshed {
                    current_price: record.current_price,
                    data_points: history.series.len(),
                    window: history.window.to_string(),
                },
                Err(e) => {
                    error!("{}: forced refresh failed: {}", asset, e);
                    RefreshOutcome::Failed { reason: e.to_string() }
                }
            };
            (asset, outcome)
        }))
        .await;

        let summary = RefreshSummary {
            started_at,
            finished_at: Utc::now(),
            results: outcomes.into_iter().collect(),
        };
        info!(
            "Forced refresh finished: {} refreshed, {} failed",
            summary.refreshed_count(),
            summary.failed_count()
        );
        summary
    }

    async fn from_primary(&self, asset: AssetId) -> Option<MetricsRecord> {
        let dataset = self.dataset.clone();
        let result = tokio::task::spawn_blocking(move || dataset.series(asset))
            .await
            .map_err(|e| DataError::Worker(e.to_string()))
            .and_then(|r| r);

        match result {
            Ok(Some(series)) => {
                info!("{}: using primary_dataset ({} points)", asset, series.len());
                Some(self.calculator.compute(&series, DataSource::PrimaryDataset))
            }
            Ok(None) => {
                info!("{}: no primary_dataset history", asset);
                None
            }
            Err(e) => {
                warn!("{}: primary_dataset tier unavailable: {}", asset, e);
                None
            }
        }
    }

    async fn from_cache(&self, asset: AssetId) -> Option<MetricsRecord> {
        let entry = match self.cache.get(asset).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("{}: cache tier unavailable: {}", asset, e);
                return None;
            }
        };

        let now = Utc::now();
        if !entry.is_fresh(self.settings.max_cache_age, now) {
            info!(
                "{}: cache entry is stale ({}h old)",
                asset,
                entry.age(now).num_hours()
            );
            return None;
        }

        info!("{}: using cache written at {}", asset, entry.last_update());
        let mut record = entry.record;
        record.data_source = DataSource::Cache;
        Some(record)
    }

    /// Fetches, computes and writes the result back to the cache. A failed write is only logged.
    async fn live_fetch(&self, asset: AssetId) -> Result<(MetricsRecord, LiveHistory), DataError> {
        let history = self
            .live
            .fetch_longest(asset, &self.settings.history_windows, self.settings.min_live_points)
            .await?;

        let record = self.calculator.compute(&history.series, DataSource::LiveFetch);
        match self.cache.put(asset, &record).await {
            Ok(()) => info!("{}: cached live_fetch result", asset),
            Err(e) => error!("{}: failed to write cache: {}", asset, e),
        }
        Ok((record, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcomes: Vec<(AssetId, RefreshOutcome)>) -> RefreshSummary {
        RefreshSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: outcomes.into_iter().collect(),
        }
    }

    #[test]
    fn summary_succeeds_with_one_refreshed_asset() {
        let s = summary(vec![
            (AssetId::Gold, RefreshOutcome::Refreshed { current_price: 1.0, data_points: 60, window: "max".into() }),
            (AssetId::Reits, RefreshOutcome::Failed { reason: "timeout".into() }),
        ]);
        assert!(s.is_success());
        assert_eq!(s.refreshed_count(), 1);
        assert_eq!(s.failed_count(), 1);

        let all_failed = summary(vec![(AssetId::Gold, RefreshOutcome::Failed { reason: "x".into() })]);
        assert!(!all_failed.is_success());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(RefreshOutcome::Failed { reason: "boom".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "boom"}));
    }

    #[test]
    fn default_settings() {
        let settings = ResolverSettings::default();
        assert_eq!(settings.max_cache_age, Duration::hours(24));
        assert_eq!(settings.min_live_points, 50);
        assert_eq!(settings.history_windows.first(), Some(&HistoryWindow::Max));
    }
}
