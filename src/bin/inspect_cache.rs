use anyhow::Result;
use chrono::Utc;
use dotenv::dotenv;
use log::{info, warn};
use portfolio_metrics::config::AppConfig;
use portfolio_metrics::services::cache_store::{CacheStore, FileCacheStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    let store = FileCacheStore::new(&config.cache_dir, config.local_tz);
    let max_age = config.resolver_settings().max_cache_age;

    info!("Inspecting cache in {}", store.dir().display());
    let entries = store.entries().await;
    if entries.is_empty() {
        warn!("No readable cache entries found");
        return Ok(());
    }

    let now = Utc::now();
    for entry in &entries {
        let age = entry.age(now);
        info!(
            "{}: price {:.2}, source {}, updated {} ({}h {}m ago), {}",
            entry.record.asset_id,
            entry.record.current_price,
            entry.stored_source,
            entry.last_update(),
            age.num_hours(),
            age.num_minutes() % 60,
            if entry.is_fresh(max_age, now) { "fresh" } else { "stale" }
        );
    }
    Ok(())
}
