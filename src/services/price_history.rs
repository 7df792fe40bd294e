// src/services/price_history.rs
//
// Sources of raw price history: the bulk CSV dataset and a live provider.
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::Reader;
use log::{debug, info, warn};
use std::fmt;
use std::path::PathBuf;

use crate::error::DataError;
use crate::models::{AssetId, PricePoint, PriceSeries};

/// Bulk tabular history. `Ok(None)` means the asset is absent or has no usable rows.
pub trait PrimaryDataset: Send + Sync {
    fn series(&self, asset: AssetId) -> Result<Option<PriceSeries>, DataError>;
}

/// History windows a live provider can be asked for, longest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWindow {
    Max,
    TenYears,
    FiveYears,
    TwoYears,
    OneYear,
}

impl HistoryWindow {
    pub const DEFAULT_CANDIDATES: [HistoryWindow; 5] = [
        HistoryWindow::Max,
        HistoryWindow::TenYears,
        HistoryWindow::FiveYears,
        HistoryWindow::TwoYears,
        HistoryWindow::OneYear,
    ];

    pub fn as_range(&self) -> &'static str {
        match self {
            HistoryWindow::Max => "max",
            HistoryWindow::TenYears => "10y",
            HistoryWindow::FiveYears => "5y",
            HistoryWindow::TwoYears => "2y",
            HistoryWindow::OneYear => "1y",
        }
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_range())
    }
}

#[derive(Debug, Clone)]
pub struct LiveHistory {
    pub series: PriceSeries,
    pub window: HistoryWindow,
}

#[async_trait]
pub trait LiveDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One request for one window. `Ok(None)` means the provider had nothing for it.
    async fn fetch_window(&self, asset: AssetId, window: HistoryWindow) -> Result<Option<PriceSeries>, DataError>;

    /// Tries `windows` in order and returns the first series with at least `min_points` points.
    async fn fetch_longest(
        &self,
        asset: AssetId,
        windows: &[HistoryWindow],
        min_points: usize,
    ) -> Result<LiveHistory, DataError> {
        let mut last_problem = String::from("no windows attempted");

        for &window in windows {
            match self.fetch_window(asset, window).await {
                Ok(Some(series)) if series.len() >= min_points => {
                    info!("Fetched {} points for {} from {} ({})", series.len(), asset, self.name(), window);
                    return Ok(LiveHistory { series, window });
                }
                Ok(Some(series)) => {
                    debug!("{} window {} for {} too short ({} points)", self.name(), window, asset, series.len());
                    last_problem = format!("window {} returned only {} points", window, series.len());
                }
                Ok(None) => {
                    debug!("{} window {} for {} returned nothing", self.name(), window, asset);
                    last_problem = format!("window {} returned nothing", window);
                }
                Err(e) => {
                    warn!("{} window {} for {} failed: {}", self.name(), window, asset, e);
                    last_problem = format!("window {} failed: {}", window, e);
                }
            }
        }

        Err(DataError::NoUsableHistory { asset, reason: last_problem })
    }
}

/// Wide CSV: a date column followed by one price column per asset.
pub struct CsvDataset {
    path: PathBuf,
}

impl CsvDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvDataset { path: path.into() }
    }
}

impl PrimaryDataset for CsvDataset {
    fn series(&self, asset: AssetId) -> Result<Option<PriceSeries>, DataError> {
        if !self.path.exists() {
            return Err(DataError::DatasetUnavailable(format!("{} does not exist", self.path.display())));
        }

        let mut rdr = Reader::from_path(&self.path)?;
        let headers = rdr.headers()?.clone();
        let column = match headers.iter().skip(1).position(|h| h.trim() == asset.name()) {
            Some(idx) => idx + 1,
            None => {
                debug!("No '{}' column in {}", asset, self.path.display());
                return Ok(None);
            }
        };

        let mut points = Vec::new();
        for record in rdr.records() {
            let row = record?;
            let date = match row.get(0).and_then(parse_date_cell) {
                Some(date) => date,
                None => continue,
            };
            let price = match row.get(column).map(str::trim).filter(|c| !c.is_empty()) {
                Some(cell) => match cell.parse::<f64>() {
                    Ok(price) => price,
                    Err(_) => continue,
                },
                None => continue,
            };
            points.push(PricePoint { date, price });
        }

        Ok(PriceSeries::new(asset, points).ok())
    }
}

/// Accepts `YYYY-MM-DD` with an optional trailing time part.
fn parse_date_cell(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    let date_part = cell.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
