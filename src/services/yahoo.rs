// src/services/yahoo.rs
use async_trait::async_trait;
use chrono::DateTime;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::price_history::{HistoryWindow, LiveDataProvider};
use crate::error::DataError;
use crate::models::{AssetId, PricePoint, PriceSeries};

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Daily closes from Yahoo's v8 chart endpoint.
pub struct YahooProvider {
    client: Client,
    base_url: String,
    symbols: HashMap<AssetId, String>,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(timeout)
            .build()?;

        Ok(YahooProvider {
            client,
            base_url: CHART_BASE_URL.to_string(),
            symbols: HashMap::new(),
        })
    }

    /// Replaces the default ticker for the given assets.
    pub fn with_symbols(mut self, overrides: HashMap<AssetId, String>) -> Self {
        self.symbols.extend(overrides);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn symbol_for(&self, asset: AssetId) -> &str {
        self.symbols
            .get(&asset)
            .map(String::as_str)
            .unwrap_or_else(|| asset.default_symbol())
    }

    fn chart_url(&self, symbol: &str, window: HistoryWindow) -> String {
        format!(
            "{}/{}?range={}&interval=1d",
            self.base_url,
            encode_symbol(symbol),
            window.as_range()
        )
    }
}

fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E").replace('=', "%3D")
}

fn parse_chart(asset: AssetId, symbol: &str, resp: ChartResponse) -> Result<Option<PriceSeries>, DataError> {
    let result = match resp.chart.result {
        Some(result) => result,
        None => {
            return Err(match resp.chart.error {
                Some(err) if err.code == "Not Found" => DataError::SymbolNotFound(symbol.to_string()),
                Some(err) => DataError::ResponseFormat(format!("{}: {}", err.code, err.description)),
                None => DataError::ResponseFormat("empty result with no error".into()),
            });
        }
    };

    let data = match result.into_iter().next() {
        Some(data) => data,
        None => return Ok(None),
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points: Vec<PricePoint> = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            close.map(|price| PricePoint { date, price })
        })
        .collect();

    Ok(PriceSeries::new(asset, points).ok())
}

#[async_trait]
impl LiveDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_window(&self, asset: AssetId, window: HistoryWindow) -> Result<Option<PriceSeries>, DataError> {
        let symbol = self.symbol_for(asset);
        let url = self.chart_url(symbol, window);
        info!("Fetching {} history for {} from URL: {}", window, asset, url);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Status { symbol: symbol.to_string(), status: status.as_u16() });
        }

        let chart: ChartResponse = resp
            .json()
            .await
            .map_err(|e| DataError::ResponseFormat(format!("failed to parse chart for {}: {}", symbol, e)))?;
        let series = parse_chart(asset, symbol, chart)?;
        debug!("{} ({}) {}: {} points", asset, symbol, window, series.as_ref().map_or(0, |s| s.len()));
        Ok(series)
    }
}
