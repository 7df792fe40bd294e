// src/config.rs
use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use log::warn;
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::models::AssetId;
use crate::services::cache_store::FileCacheStore;
use crate::services::calculations::{CalculatorSettings, ExtrapolationPolicy, MetricsCalculator};
use crate::services::price_history::CsvDataset;
use crate::services::resolver::{ResolverSettings, TieredResolver};
use crate::services::scheduler::{DEFAULT_BACKUP_CRON, DEFAULT_DAILY_CRON};
use crate::services::yahoo::YahooProvider;

const DEFAULT_CACHE_MAX_AGE_HOURS: i64 = 24;
const DEFAULT_BACKUP_SKIP_HOURS: i64 = 18;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub historical_csv_path: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_max_age_hours: i64,
    pub risk_free_rate: f64,
    pub extrapolation: ExtrapolationPolicy,
    pub live_fetch_timeout_secs: u64,
    pub live_min_points: usize,
    pub local_tz: Tz,
    pub refresh_cron: String,
    pub backup_refresh_cron: String,
    pub backup_skip_hours: i64,
    pub refresh_on_startup: bool,
    pub symbol_overrides: HashMap<AssetId, String>,
}

impl AppConfig {
    /// Reads settings from the process environment (call `dotenv().ok()` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ExtrapolationPolicy::default();

        let mut symbol_overrides = HashMap::new();
        for asset in AssetId::ALL {
            let key = format!("SYMBOL_{}", asset.name().to_uppercase());
            if let Some(symbol) = lookup(&key).filter(|s| !s.trim().is_empty()) {
                symbol_overrides.insert(asset, symbol.trim().to_string());
            }
        }

        AppConfig {
            port: parse_or(&lookup, "PORT", 3030),
            historical_csv_path: PathBuf::from(string_or(&lookup, "HISTORICAL_CSV_PATH", "data/historical_data.csv")),
            cache_dir: PathBuf::from(string_or(&lookup, "METRICS_CACHE_DIR", "data/cache")),
            cache_max_age_hours: parse_or(&lookup, "CACHE_MAX_AGE_HOURS", DEFAULT_CACHE_MAX_AGE_HOURS),
            risk_free_rate: parse_or(&lookup, "RISK_FREE_RATE", CalculatorSettings::default().risk_free_rate),
            extrapolation: ExtrapolationPolicy {
                min_points: parse_or(&lookup, "EXTRAPOLATION_MIN_POINTS", defaults.min_points),
                dampening_days: parse_or(&lookup, "EXTRAPOLATION_DAMPENING_DAYS", defaults.dampening_days),
                floor: parse_or(&lookup, "EXTRAPOLATION_FLOOR", defaults.floor),
                cap: parse_or(&lookup, "EXTRAPOLATION_CAP", defaults.cap),
            },
            live_fetch_timeout_secs: parse_or(&lookup, "LIVE_FETCH_TIMEOUT_SECS", 15),
            live_min_points: parse_or(&lookup, "LIVE_MIN_POINTS", 50),
            local_tz: parse_or(&lookup, "CACHE_LOCAL_TZ", chrono_tz::Asia::Kolkata),
            refresh_cron: string_or(&lookup, "REFRESH_CRON", DEFAULT_DAILY_CRON),
            backup_refresh_cron: string_or(&lookup, "BACKUP_REFRESH_CRON", DEFAULT_BACKUP_CRON),
            backup_skip_hours: parse_or(&lookup, "BACKUP_SKIP_HOURS", DEFAULT_BACKUP_SKIP_HOURS),
            refresh_on_startup: parse_or(&lookup, "REFRESH_ON_STARTUP", true),
            symbol_overrides,
        }
    }

    pub fn calculator_settings(&self) -> CalculatorSettings {
        CalculatorSettings {
            risk_free_rate: self.risk_free_rate,
            extrapolation: self.extrapolation.clone(),
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            max_cache_age: hours_or("CACHE_MAX_AGE_HOURS", self.cache_max_age_hours, DEFAULT_CACHE_MAX_AGE_HOURS),
            min_live_points: self.live_min_points,
            ..ResolverSettings::default()
        }
    }

    pub fn backup_skip(&self) -> Duration {
        hours_or("BACKUP_SKIP_HOURS", self.backup_skip_hours, DEFAULT_BACKUP_SKIP_HOURS)
    }

    /// Wires the CSV dataset, file cache and Yahoo provider into a resolver.
    pub fn build_resolver(&self) -> Result<TieredResolver> {
        let live = YahooProvider::new(std::time::Duration::from_secs(self.live_fetch_timeout_secs))
            .context("failed to build live data client")?
            .with_symbols(self.symbol_overrides.clone());

        Ok(TieredResolver::new(
            Arc::new(CsvDataset::new(&self.historical_csv_path)),
            Arc::new(FileCacheStore::new(&self.cache_dir, self.local_tz)),
            Arc::new(live),
            MetricsCalculator::new(self.calculator_settings()),
            self.resolver_settings(),
        ))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Invalid {} '{}' ({}), defaulting to {}", key, raw, e, default);
                default
            }
        },
        None => {
            warn!("{} not set, defaulting to {}", key, default);
            default
        }
    }
}

/// Hours as a `Duration`, or the default when the value is out of range.
fn hours_or(key: &str, hours: i64, default: i64) -> Duration {
    match Duration::try_hours(hours) {
        Some(duration) => duration,
        None => {
            warn!("{} of {} hours is out of range, defaulting to {}", key, hours, default);
            Duration::hours(default)
        }
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| {
        warn!("{} not set, defaulting to {}", key, default);
        default.to_string()
    })
}
