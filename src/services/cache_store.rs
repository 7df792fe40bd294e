// src/services/cache_store.rs
//
// Durable per-asset metrics records. One JSON file per asset, replaced
// wholesale on every write.
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::models::{AssetId, CurrentStats, DataQuality, DataSource, HistoricalReturns, MetricsRecord, RiskMetrics};

/// A record read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub record: MetricsRecord,
    /// Tier that originally produced the record (`cache` when the stored file did not say).
    pub stored_source: DataSource,
}

impl CacheEntry {
    pub fn last_update(&self) -> DateTime<Utc> {
        self.record.last_update
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.record.last_update
    }

    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        is_fresh(self, max_age, now)
    }

    /// Parses a stored record, defaulting the fields older writers may have left out.
    pub fn from_json(asset: AssetId, json: &str, local_tz: Tz) -> Result<Self, CacheError> {
        let stored: StoredRecord = serde_json::from_str(json)?;

        let asset_id = stored.asset_id.unwrap_or(asset);
        if asset_id != asset {
            return Err(CacheError::AssetMismatch { expected: asset, found: asset_id });
        }

        let stored_source = match stored.data_source.as_deref() {
            Some(tag) => match serde_json::from_value::<DataSource>(serde_json::Value::String(tag.to_string())) {
                Ok(source) => source,
                Err(_) => {
                    debug!("Unrecognised data_source '{}' in {} cache entry, treating as cache", tag, asset);
                    DataSource::Cache
                }
            },
            None => DataSource::Cache,
        };

        let data_quality = stored
            .data_quality
            .and_then(|v| serde_json::from_value::<DataQuality>(v).ok());

        Ok(CacheEntry {
            record: MetricsRecord {
                asset_id,
                current_price: stored.current_price,
                last_update: parse_timestamp(&stored.last_update, local_tz)?,
                data_source: stored_source,
                historical_returns: stored.historical_returns,
                risk_metrics: stored.risk_metrics,
                current_stats: stored.current_stats,
                data_quality,
            },
            stored_source,
        })
    }
}

/// On-disk shape; looser than `MetricsRecord` so older entries still load.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default, alias = "asset_name")]
    asset_id: Option<AssetId>,
    current_price: f64,
    last_update: String,
    #[serde(default)]
    data_source: Option<String>,
    historical_returns: HistoricalReturns,
    risk_metrics: RiskMetrics,
    current_stats: CurrentStats,
    #[serde(default)]
    data_quality: Option<serde_json::Value>,
}

/// True while the entry is younger than `max_age`.
pub fn is_fresh(entry: &CacheEntry, max_age: Duration, now: DateTime<Utc>) -> bool {
    entry.age(now) < max_age
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Accepts RFC 3339 / offset-qualified timestamps and naive ISO-8601 ones.
/// Naive timestamps are read in `local_tz`.
pub fn parse_timestamp(raw: &str, local_tz: Tz) -> Result<DateTime<Utc>, CacheError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| CacheError::Timestamp(raw.to_string()));
        }
    }

    Err(CacheError::Timestamp(raw.to_string()))
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, asset: AssetId) -> Result<Option<CacheEntry>, CacheError>;

    /// Replaces the asset's entry with `record`.
    async fn put(&self, asset: AssetId, record: &MetricsRecord) -> Result<(), CacheError>;

    /// Every readable entry, for diagnostics.
    async fn entries(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for asset in AssetId::ALL {
            match self.get(asset).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache entry for {}: {}", asset, e),
            }
        }
        entries
    }
}

fn check_asset(asset: AssetId, record: &MetricsRecord) -> Result<(), CacheError> {
    if record.asset_id != asset {
        return Err(CacheError::AssetMismatch { expected: asset, found: record.asset_id });
    }
    Ok(())
}

/// JSON files under one directory, written via temp file + rename.
pub struct FileCacheStore {
    dir: PathBuf,
    local_tz: Tz,
    write_seq: AtomicU64,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>, local_tz: Tz) -> Self {
        FileCacheStore {
            dir: dir.into(),
            local_tz,
            write_seq: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, asset: AssetId) -> PathBuf {
        self.dir.join(format!("{}.json", asset.name()))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, asset: AssetId) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(asset);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        CacheEntry::from_json(asset, &contents, self.local_tz).map(Some)
    }

    async fn put(&self, asset: AssetId, record: &MetricsRecord) -> Result<(), CacheError> {
        check_asset(asset, record)?;
        fs::create_dir_all(&self.dir).await?;

        let json = serde_json::to_string_pretty(record)?;
        let path = self.path_for(asset);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp_path = self.dir.join(format!("{}.{}-{}.json.tmp", asset.name(), std::process::id(), seq));

        let written = match fs::write(&tmp_path, json).await {
            Ok(()) => fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!("Wrote cache entry for {} to {}", asset, path.display());
        Ok(())
    }
}

/// In-process store with the same semantics as `FileCacheStore`.
#[derive(Default)]
pub struct MemoryCacheStore {
    records: RwLock<HashMap<AssetId, MetricsRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, asset: AssetId) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.records.read().await.get(&asset).map(|record| CacheEntry {
            record: record.clone(),
            stored_source: record.data_source,
        }))
    }

    async fn put(&self, asset: AssetId, record: &MetricsRecord) -> Result<(), CacheError> {
        check_asset(asset, record)?;
        self.records.write().await.insert(asset, record.clone());
        Ok(())
    }
}
