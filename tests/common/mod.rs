// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use portfolio_metrics::error::DataError;
use portfolio_metrics::models::{AssetId, DataSource, MetricsRecord, PricePoint, PriceSeries};
use portfolio_metrics::services::cache_store::CacheStore;
use portfolio_metrics::services::calculations::MetricsCalculator;
use portfolio_metrics::services::defaults::DefaultsTable;
use portfolio_metrics::services::price_history::{HistoryWindow, LiveDataProvider, PrimaryDataset};
use portfolio_metrics::services::resolver::{ResolverSettings, TieredResolver};

/// Daily series of `len` points ending at `last_price`, rising 0.05% a day.
pub fn series(asset: AssetId, len: usize, last_price: f64) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap();
    let points = (0..len)
        .map(|i| {
            let steps_from_end = (len - 1 - i) as i32;
            PricePoint {
                date: start + Duration::days(i as i64),
                price: last_price / 1.0005f64.powi(steps_from_end),
            }
        })
        .collect();
    PriceSeries::new(asset, points).unwrap()
}

#[derive(Default)]
pub struct StaticDataset {
    series: HashMap<AssetId, PriceSeries>,
}

impl StaticDataset {
    pub fn with(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.asset(), series);
        self
    }
}

impl PrimaryDataset for StaticDataset {
    fn series(&self, asset: AssetId) -> Result<Option<PriceSeries>, DataError> {
        Ok(self.series.get(&asset).cloned())
    }
}

pub struct MissingDataset;

impl PrimaryDataset for MissingDataset {
    fn series(&self, _asset: AssetId) -> Result<Option<PriceSeries>, DataError> {
        Err(DataError::DatasetUnavailable("historical_data.csv does not exist".into()))
    }
}

/// Live provider serving fixed series and counting requests.
#[derive(Default)]
pub struct StubProvider {
    series: HashMap<AssetId, PriceSeries>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn with(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.asset(), series);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveDataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch_window(&self, asset: AssetId, _window: HistoryWindow) -> Result<Option<PriceSeries>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.series.get(&asset).cloned())
    }
}

pub struct FailingProvider;

#[async_trait]
impl LiveDataProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch_window(&self, asset: AssetId, _window: HistoryWindow) -> Result<Option<PriceSeries>, DataError> {
        Err(DataError::SymbolNotFound(asset.default_symbol().to_string()))
    }
}

pub fn resolver(
    dataset: impl PrimaryDataset + 'static,
    cache: Arc<dyn CacheStore>,
    live: Arc<dyn LiveDataProvider>,
) -> TieredResolver {
    TieredResolver::new(
        Arc::new(dataset),
        cache,
        live,
        MetricsCalculator::default(),
        ResolverSettings::default(),
    )
}

/// A record as a previous live fetch would have stored it, `age` ago.
pub fn cached_record(asset: AssetId, price: f64, age: Duration) -> MetricsRecord {
    let mut record = DefaultsTable.get_at(asset, Utc::now() - age);
    record.current_price = price;
    record.current_stats.current_price = price;
    record.data_source = DataSource::LiveFetch;
    record
}

/// Percent strings plus a two-decimal Sharpe; no placeholders.
pub fn assert_fully_populated(record: &MetricsRecord) {
    let r = &record.historical_returns;
    for value in [&r.one_month, &r.three_months, &r.six_months, &r.one_year, &r.five_years, &r.ten_years] {
        assert!(value.ends_with('%'), "{}: bad return '{}'", record.asset_id, value);
    }
    let risk = &record.risk_metrics;
    for value in [&risk.volatility, &risk.max_drawdown, &risk.var_95, &record.current_stats.avg_annual_return] {
        assert!(value.ends_with('%'), "{}: bad metric '{}'", record.asset_id, value);
    }
    assert!(risk.sharpe_ratio.parse::<f64>().is_ok(), "bad sharpe '{}'", risk.sharpe_ratio);
    assert!(record.current_price.is_finite() && record.current_price > 0.0);
}
