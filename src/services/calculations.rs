// src/services/calculations.rs
//
// Turns a price series into a fully populated MetricsRecord. Every metric has
// a minimum-sample gate; below it the metric's fixed fallback is reported.
use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;

use crate::models::{
    CurrentStats, DataQuality, DataSource, HistoricalReturns, Horizon, MetricsRecord, PriceSeries,
    RiskMetrics, TRADING_DAYS_PER_YEAR,
};

pub const VOLATILITY_FALLBACK: &str = "18.0%";
pub const MAX_DRAWDOWN_FALLBACK: &str = "-22.0%";
pub const SHARPE_FALLBACK: &str = "0.85";
pub const VAR_95_FALLBACK: &str = "-2.3%";
pub const AVG_ANNUAL_RETURN_FALLBACK: &str = "10.0%";

/// Fixed return reported when a horizon cannot be observed or extrapolated.
pub fn horizon_fallback(horizon: Horizon) -> &'static str {
    match horizon {
        Horizon::OneMonth => "1.5%",
        Horizon::ThreeMonths => "4.2%",
        Horizon::SixMonths => "8.5%",
        Horizon::OneYear => "12.0%",
        Horizon::FiveYears => "10.0%",
        Horizon::TenYears => "9.0%",
    }
}

const MIN_POINTS_FOR_OBSERVED_RETURN: usize = 30;
const MIN_POINTS_FOR_RISK: usize = 30;
const MIN_RETURNS_FOR_RISK: usize = 20;
const MIN_POINTS_FOR_SHARPE: usize = 100;
const MIN_RETURNS_FOR_SHARPE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: need {required} {what}, have {available}")]
pub struct InsufficientData {
    pub what: &'static str,
    pub required: usize,
    pub available: usize,
}

fn require(what: &'static str, required: usize, available: usize) -> Result<(), InsufficientData> {
    if available < required {
        Err(InsufficientData { what, required, available })
    } else {
        Ok(())
    }
}

/// Linear extrapolation of short histories onto longer horizons.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrapolationPolicy {
    pub min_points: usize,
    /// Horizons longer than this many days are scaled by `dampening_days / h`.
    pub dampening_days: usize,
    pub floor: f64,
    pub cap: f64,
}

impl Default for ExtrapolationPolicy {
    fn default() -> Self {
        ExtrapolationPolicy {
            min_points: 10,
            dampening_days: 30,
            floor: -0.80,
            cap: 2.00,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorSettings {
    pub risk_free_rate: f64,
    pub extrapolation: ExtrapolationPolicy,
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        CalculatorSettings {
            risk_free_rate: 0.06,
            extrapolation: ExtrapolationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnEstimate {
    Observed(f64),
    Extrapolated(f64),
}

impl ReturnEstimate {
    pub fn value(&self) -> f64 {
        match self {
            ReturnEstimate::Observed(v) | ReturnEstimate::Extrapolated(v) => *v,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    settings: CalculatorSettings,
}

impl MetricsCalculator {
    pub fn new(settings: CalculatorSettings) -> Self {
        MetricsCalculator { settings }
    }

    pub fn compute(&self, series: &PriceSeries, source: DataSource) -> MetricsRecord {
        self.compute_at(series, source, Utc::now())
    }

    /// Same as `compute` with an explicit computation timestamp.
    pub fn compute_at(&self, series: &PriceSeries, source: DataSource, computed_at: DateTime<Utc>) -> MetricsRecord {
        let prices = series.prices();
        let returns = daily_returns(&prices);
        let current_price = series.last().price;

        let historical_returns = HistoricalReturns::from_fn(|h| {
            match self.horizon_return(&prices, h.trading_days()) {
                Ok(estimate) => format_pct(estimate.value()),
                Err(e) => {
                    debug!("{} {} return falls back: {}", series.asset(), h.key(), e);
                    horizon_fallback(h).to_string()
                }
            }
        });

        let avg_annual_return = self
            .horizon_return(&prices, Horizon::FiveYears.trading_days())
            .or_else(|_| self.horizon_return(&prices, Horizon::OneYear.trading_days()))
            .map(|e| format_pct(e.value()))
            .unwrap_or_else(|_| AVG_ANNUAL_RETURN_FALLBACK.to_string());

        let asset = series.asset();
        let or_fallback = |metric: &str, result: Result<String, InsufficientData>, fallback: &str| {
            result.unwrap_or_else(|e| {
                debug!("{} {} falls back: {}", asset, metric, e);
                fallback.to_string()
            })
        };
        let risk_metrics = RiskMetrics {
            volatility: or_fallback("volatility", volatility(&prices, &returns).map(format_pct), VOLATILITY_FALLBACK),
            max_drawdown: or_fallback("max_drawdown", max_drawdown(&prices).map(format_pct), MAX_DRAWDOWN_FALLBACK),
            sharpe_ratio: or_fallback(
                "sharpe_ratio",
                self.sharpe_ratio(&prices, &returns).map(|v| format!("{:.2}", v)),
                SHARPE_FALLBACK,
            ),
            var_95: or_fallback("var_95", value_at_risk_95(&prices, &returns).map(format_pct), VAR_95_FALLBACK),
        };

        let points = series.len();
        MetricsRecord {
            asset_id: series.asset(),
            current_price,
            last_update: computed_at,
            data_source: source,
            historical_returns,
            risk_metrics,
            current_stats: CurrentStats {
                current_price,
                sma_50: simple_moving_average(&prices, 50),
                sma_200: simple_moving_average(&prices, 200),
                avg_annual_return,
            },
            data_quality: Some(DataQuality {
                data_points: points,
                data_start: series.first().date,
                data_end: series.last().date,
                years_of_data: points as f64 / TRADING_DAYS_PER_YEAR as f64,
                completeness: (points as f64 / (TRADING_DAYS_PER_YEAR * 10) as f64).min(1.0),
            }),
        }
    }

    /// Return over the last `days` trading days, as a fraction.
    ///
    /// Periods longer than a year are annualized. Short histories are
    /// extrapolated linearly from the whole available span.
    pub fn horizon_return(&self, prices: &[f64], days: usize) -> Result<ReturnEstimate, InsufficientData> {
        let n = prices.len();
        if n >= (days + 1).max(MIN_POINTS_FOR_OBSERVED_RETURN) {
            let start = prices[n - 1 - days];
            let end = prices[n - 1];
            if days <= TRADING_DAYS_PER_YEAR {
                return Ok(ReturnEstimate::Observed(end / start - 1.0));
            }
            let years = days as f64 / TRADING_DAYS_PER_YEAR as f64;
            return Ok(ReturnEstimate::Observed(calculate_cagr(start, end, years)));
        }

        let policy = &self.settings.extrapolation;
        require("price points for extrapolation", policy.min_points.max(2), n)?;

        let total_return = prices[n - 1] / prices[0] - 1.0;
        let daily_return = total_return / (n - 1) as f64;
        let dampening = if days > policy.dampening_days {
            (policy.dampening_days as f64 / days as f64).min(1.0)
        } else {
            1.0
        };
        let estimate = (daily_return * days as f64 * dampening).max(policy.floor).min(policy.cap);
        Ok(ReturnEstimate::Extrapolated(estimate))
    }

    /// Annualized excess return over annualized volatility.
    pub fn sharpe_ratio(&self, prices: &[f64], returns: &[f64]) -> Result<f64, InsufficientData> {
        require("price points for sharpe", MIN_POINTS_FOR_SHARPE, prices.len())?;
        require("daily returns for sharpe", MIN_RETURNS_FOR_SHARPE, returns.len())?;

        let annual_vol = population_std(returns) * annualization_factor();
        if annual_vol == 0.0 {
            return Err(InsufficientData { what: "non-zero volatility", required: 1, available: 0 });
        }
        let excess = calculate_average(returns) * TRADING_DAYS_PER_YEAR as f64 - self.settings.risk_free_rate;
        Ok(excess / annual_vol)
    }
}

fn annualization_factor() -> f64 {
    (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

pub fn format_pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

pub fn calculate_cagr(start_value: f64, end_value: f64, years: f64) -> f64 {
    if start_value <= 0.0 || end_value <= 0.0 || years <= 0.0 {
        0.0
    } else {
        (end_value / start_value).powf(1.0 / years) - 1.0
    }
}

fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = calculate_average(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Simple daily percentage changes.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized volatility of daily returns, as a fraction.
pub fn volatility(prices: &[f64], returns: &[f64]) -> Result<f64, InsufficientData> {
    require("price points for volatility", MIN_POINTS_FOR_RISK, prices.len())?;
    require("daily returns for volatility", MIN_RETURNS_FOR_RISK, returns.len())?;
    Ok(population_std(returns) * annualization_factor())
}

/// Deepest fall from a running peak, as a non-positive fraction.
pub fn max_drawdown(prices: &[f64]) -> Result<f64, InsufficientData> {
    require("price points for drawdown", MIN_POINTS_FOR_RISK, prices.len())?;

    let mut running_max = f64::MIN;
    let mut worst = 0.0_f64;
    for &price in prices {
        running_max = running_max.max(price);
        worst = worst.min((price - running_max) / running_max);
    }
    Ok(worst)
}

/// Historical 95% VaR: the 5th percentile of daily returns.
pub fn value_at_risk_95(prices: &[f64], returns: &[f64]) -> Result<f64, InsufficientData> {
    require("price points for VaR", MIN_POINTS_FOR_RISK, prices.len())?;
    require("daily returns for VaR", MIN_RETURNS_FOR_RISK, returns.len())?;
    Ok(quantile(returns, 0.05))
}

/// Linear-interpolation quantile. `values` must be non-empty.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Trailing mean of the last `window` prices, or the latest price when the series is shorter.
pub fn simple_moving_average(prices: &[f64], window: usize) -> f64 {
    let n = prices.len();
    if window == 0 || n < window {
        return prices.last().copied().unwrap_or(0.0);
    }
    calculate_average(&prices[n - window..])
}
