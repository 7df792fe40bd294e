// src/models.rs
use serde::{Serialize, Deserialize};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SeriesError;

/// The closed set of tracked asset classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetId {
    Equities,
    Gold,
    Bitcoin,
    #[serde(rename = "REITs")]
    Reits,
}

impl AssetId {
    pub const ALL: [AssetId; 4] = [AssetId::Equities, AssetId::Gold, AssetId::Bitcoin, AssetId::Reits];

    pub fn name(&self) -> &'static str {
        match self {
            AssetId::Equities => "Equities",
            AssetId::Gold => "Gold",
            AssetId::Bitcoin => "Bitcoin",
            AssetId::Reits => "REITs",
        }
    }

    /// Yahoo Finance ticker used when no override is configured.
    pub fn default_symbol(&self) -> &'static str {
        match self {
            AssetId::Equities => "^NSEI",       // NIFTY 50
            AssetId::Gold => "GC=F",            // Gold futures
            AssetId::Bitcoin => "BTC-USD",
            AssetId::Reits => "MINDSPACE.NS",   // Mindspace REIT
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AssetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AssetId::ALL
            .into_iter()
            .find(|asset| asset.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown asset '{}'", wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Daily closes for one asset, strictly increasing by date and never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    asset: AssetId,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(asset: AssetId, mut points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        points.retain(|p| p.price.is_finite() && p.price > 0.0);
        // Stable sort keeps input order within a date, so dedup below keeps the last observation.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        if deduped.is_empty() {
            return Err(SeriesError::Empty(asset));
        }
        Ok(Self { asset, points: deduped })
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> &PricePoint {
        &self.points[0]
    }

    pub fn last(&self) -> &PricePoint {
        &self.points[self.points.len() - 1]
    }
}

/// Tier that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    PrimaryDataset,
    Cache,
    LiveFetch,
    Default,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [
        DataSource::PrimaryDataset,
        DataSource::Cache,
        DataSource::LiveFetch,
        DataSource::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::PrimaryDataset => "primary_dataset",
            DataSource::Cache => "cache",
            DataSource::LiveFetch => "live_fetch",
            DataSource::Default => "default",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Return horizons, measured in trading days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    FiveYears,
    TenYears,
}

pub const TRADING_DAYS_PER_YEAR: usize = 252;

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::OneYear,
        Horizon::FiveYears,
        Horizon::TenYears,
    ];

    pub fn trading_days(&self) -> usize {
        match self {
            Horizon::OneMonth => 21,
            Horizon::ThreeMonths => 63,
            Horizon::SixMonths => 126,
            Horizon::OneYear => TRADING_DAYS_PER_YEAR,
            Horizon::FiveYears => TRADING_DAYS_PER_YEAR * 5,
            Horizon::TenYears => TRADING_DAYS_PER_YEAR * 10,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Horizon::OneMonth => "1_month",
            Horizon::ThreeMonths => "3_months",
            Horizon::SixMonths => "6_months",
            Horizon::OneYear => "1_year",
            Horizon::FiveYears => "5_years_avg",
            Horizon::TenYears => "10_years_avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReturns {
    #[serde(rename = "1_month")]
    pub one_month: String,
    #[serde(rename = "3_months")]
    pub three_months: String,
    #[serde(rename = "6_months")]
    pub six_months: String,
    #[serde(rename = "1_year")]
    pub one_year: String,
    #[serde(rename = "5_years_avg")]
    pub five_years: String,
    #[serde(rename = "10_years_avg")]
    pub ten_years: String,
}

impl HistoricalReturns {
    pub fn get(&self, horizon: Horizon) -> &str {
        match horizon {
            Horizon::OneMonth => &self.one_month,
            Horizon::ThreeMonths => &self.three_months,
            Horizon::SixMonths => &self.six_months,
            Horizon::OneYear => &self.one_year,
            Horizon::FiveYears => &self.five_years,
            Horizon::TenYears => &self.ten_years,
        }
    }

    /// Builds the table from a per-horizon lookup.
    pub fn from_fn(mut f: impl FnMut(Horizon) -> String) -> Self {
        HistoricalReturns {
            one_month: f(Horizon::OneMonth),
            three_months: f(Horizon::ThreeMonths),
            six_months: f(Horizon::SixMonths),
            one_year: f(Horizon::OneYear),
            five_years: f(Horizon::FiveYears),
            ten_years: f(Horizon::TenYears),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub volatility: String,
    pub max_drawdown: String,
    pub sharpe_ratio: String,
    pub var_95: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStats {
    pub current_price: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub avg_annual_return: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub data_points: usize,
    pub data_start: NaiveDate,
    pub data_end: NaiveDate,
    pub years_of_data: f64,
    pub completeness: f64,
}

/// Fully populated metrics for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub asset_id: AssetId,
    pub current_price: f64,
    pub last_update: DateTime<Utc>,
    pub data_source: DataSource,
    pub historical_returns: HistoricalReturns,
    pub risk_metrics: RiskMetrics,
    pub current_stats: CurrentStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
}

/// Per-tier hit counts for one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SourceMix(BTreeMap<DataSource, usize>);

impl SourceMix {
    pub fn record(&mut self, source: DataSource) {
        *self.0.entry(source).or_insert(0) += 1;
    }

    pub fn count(&self, source: DataSource) -> usize {
        self.0.get(&source).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

impl Default for SourceMix {
    fn default() -> Self {
        SourceMix(DataSource::ALL.into_iter().map(|s| (s, 0)).collect())
    }
}

impl fmt::Display for SourceMix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(s, n)| format!("{}={}", s, n)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub metrics: BTreeMap<AssetId, MetricsRecord>,
    pub source_mix: SourceMix,
}
