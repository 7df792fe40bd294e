mod common;

use chrono::{Duration, Utc};
use std::sync::Arc;

use common::{
    assert_fully_populated, cached_record, resolver, series, FailingProvider, MissingDataset, StaticDataset,
    StubProvider,
};
use portfolio_metrics::models::{AssetId, DataSource};
use portfolio_metrics::services::cache_store::{CacheStore, FileCacheStore, MemoryCacheStore};
use portfolio_metrics::services::defaults::DefaultsTable;
use portfolio_metrics::services::resolver::RefreshOutcome;

#[tokio::test]
async fn primary_dataset_wins_when_history_is_present() {
    let dataset = StaticDataset::default().with(series(AssetId::Gold, 3000, 3691.80));
    let live = Arc::new(StubProvider::default());
    let resolver = resolver(dataset, Arc::new(MemoryCacheStore::new()), live.clone());

    let record = resolver.resolve_asset(AssetId::Gold).await;

    assert_eq!(record.data_source, DataSource::PrimaryDataset);
    assert_eq!(record.current_price, 3691.80);
    assert_eq!(record.data_quality.as_ref().map(|q| q.data_points), Some(3000));
    assert_fully_populated(&record);
    assert_eq!(live.calls(), 0);
}

#[tokio::test]
async fn primary_dataset_beats_a_fresh_cache() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Gold, &cached_record(AssetId::Gold, 1.0, Duration::minutes(5)))
        .await
        .unwrap();
    let dataset = StaticDataset::default().with(series(AssetId::Gold, 300, 3691.80));
    let resolver = resolver(dataset, cache, Arc::new(StubProvider::default()));

    let record = resolver.resolve_asset(AssetId::Gold).await;
    assert_eq!(record.data_source, DataSource::PrimaryDataset);
    assert_eq!(record.current_price, 3691.80);
}

#[tokio::test]
async fn fresh_cache_is_served_without_live_fetch() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Bitcoin, &cached_record(AssetId::Bitcoin, 112318.35, Duration::hours(2)))
        .await
        .unwrap();
    let live = Arc::new(StubProvider::default().with(series(AssetId::Bitcoin, 400, 1.0)));
    let resolver = resolver(StaticDataset::default(), cache, live.clone());

    let record = resolver.resolve_asset(AssetId::Bitcoin).await;

    assert_eq!(record.data_source, DataSource::Cache);
    assert_eq!(record.current_price, 112318.35);
    assert_eq!(live.calls(), 0);
}

#[tokio::test]
async fn cache_one_minute_old_is_fresh() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Reits, &cached_record(AssetId::Reits, 402.5, Duration::minutes(1)))
        .await
        .unwrap();
    let resolver = resolver(MissingDataset, cache, Arc::new(FailingProvider));

    let record = resolver.resolve_asset(AssetId::Reits).await;
    assert_eq!(record.data_source, DataSource::Cache);
    assert_eq!(record.current_price, 402.5);
}

#[tokio::test]
async fn stale_cache_is_replaced_by_live_fetch() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Bitcoin, &cached_record(AssetId::Bitcoin, 1.0, Duration::hours(25)))
        .await
        .unwrap();
    let live = Arc::new(StubProvider::default().with(series(AssetId::Bitcoin, 400, 98000.0)));
    let resolver = resolver(StaticDataset::default(), cache.clone(), live.clone());

    let record = resolver.resolve_asset(AssetId::Bitcoin).await;

    assert_eq!(record.data_source, DataSource::LiveFetch);
    assert_eq!(record.current_price, 98000.0);
    assert_eq!(live.calls(), 1);
    assert_fully_populated(&record);

    let stored = cache.get(AssetId::Bitcoin).await.unwrap().unwrap();
    assert_eq!(stored.record.current_price, 98000.0);
    assert!(stored.is_fresh(Duration::hours(24), Utc::now()));
}

#[tokio::test]
async fn stale_cache_is_never_served_even_when_live_fails() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Gold, &cached_record(AssetId::Gold, 1.0, Duration::hours(30)))
        .await
        .unwrap();
    let resolver = resolver(MissingDataset, cache, Arc::new(FailingProvider));

    let record = resolver.resolve_asset(AssetId::Gold).await;
    assert_eq!(record.data_source, DataSource::Default);
    assert_eq!(record.current_price, 65_000.0);
}

#[tokio::test]
async fn all_tiers_empty_yields_the_defaults_row() {
    let resolver = resolver(
        StaticDataset::default(),
        Arc::new(MemoryCacheStore::new()),
        Arc::new(StubProvider::default()),
    );

    for asset in AssetId::ALL {
        let record = resolver.resolve_asset(asset).await;
        let expected = DefaultsTable.get_at(asset, record.last_update);
        assert_eq!(record, expected);
    }
}

#[tokio::test]
async fn short_live_history_is_treated_as_unavailable() {
    let live = Arc::new(StubProvider::default().with(series(AssetId::Equities, 20, 24_500.0)));
    let resolver = resolver(StaticDataset::default(), Arc::new(MemoryCacheStore::new()), live.clone());

    let record = resolver.resolve_asset(AssetId::Equities).await;

    assert_eq!(record.data_source, DataSource::Default);
    assert_eq!(live.calls(), 5);
}

#[tokio::test]
async fn resolve_reports_source_mix_for_every_tier() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Bitcoin, &cached_record(AssetId::Bitcoin, 112318.35, Duration::hours(2)))
        .await
        .unwrap();
    let dataset = StaticDataset::default().with(series(AssetId::Gold, 3000, 3691.80));
    let live = Arc::new(StubProvider::default().with(series(AssetId::Reits, 300, 402.5)));
    let resolver = resolver(dataset, cache, live);

    let resolution = resolver.resolve(&AssetId::ALL).await;

    assert_eq!(resolution.metrics.len(), 4);
    assert_eq!(resolution.source_mix.count(DataSource::PrimaryDataset), 1);
    assert_eq!(resolution.source_mix.count(DataSource::Cache), 1);
    assert_eq!(resolution.source_mix.count(DataSource::LiveFetch), 1);
    assert_eq!(resolution.source_mix.count(DataSource::Default), 1);
    assert_eq!(resolution.metrics[&AssetId::Equities].data_source, DataSource::Default);
    for record in resolution.metrics.values() {
        assert_fully_populated(record);
    }
}

#[tokio::test]
async fn duplicate_assets_are_resolved_once() {
    let resolver = resolver(
        StaticDataset::default().with(series(AssetId::Gold, 100, 10.0)),
        Arc::new(MemoryCacheStore::new()),
        Arc::new(FailingProvider),
    );

    let resolution = resolver.resolve(&[AssetId::Gold, AssetId::Gold]).await;
    assert_eq!(resolution.metrics.len(), 1);
    assert_eq!(resolution.source_mix.total(), 1);
    assert_eq!(resolution.source_mix.count(DataSource::Cache), 0);
}

#[tokio::test]
async fn force_refresh_bypasses_a_fresh_cache() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .put(AssetId::Bitcoin, &cached_record(AssetId::Bitcoin, 112318.35, Duration::minutes(10)))
        .await
        .unwrap();
    let dataset = StaticDataset::default().with(series(AssetId::Bitcoin, 3000, 1.0));
    let live = Arc::new(StubProvider::default().with(series(AssetId::Bitcoin, 400, 98000.0)));
    let resolver = resolver(dataset, cache.clone(), live.clone());

    let summary = resolver.force_refresh(&[AssetId::Bitcoin, AssetId::Gold]).await;

    assert_eq!(live.calls(), 1 + 5);
    assert!(summary.is_success());
    assert_eq!(summary.refreshed_count(), 1);
    assert!(matches!(
        summary.results[&AssetId::Bitcoin],
        RefreshOutcome::Refreshed { data_points: 400, .. }
    ));
    assert!(matches!(summary.results[&AssetId::Gold], RefreshOutcome::Failed { .. }));
    assert!(summary.finished_at >= summary.started_at);

    let stored = cache.get(AssetId::Bitcoin).await.unwrap().unwrap();
    assert_eq!(stored.record.current_price, 98000.0);
    assert_eq!(stored.stored_source, DataSource::LiveFetch);
}

#[tokio::test]
async fn live_result_survives_a_failing_cache_write() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("cache");
    std::fs::write(&blocker, "not a directory").unwrap();
    let cache = Arc::new(FileCacheStore::new(&blocker, chrono_tz::Asia::Kolkata));
    let live = Arc::new(StubProvider::default().with(series(AssetId::Gold, 80, 2400.0)));
    let resolver = resolver(MissingDataset, cache, live);

    let record = resolver.resolve_asset(AssetId::Gold).await;
    assert_eq!(record.data_source, DataSource::LiveFetch);
    assert_eq!(record.current_price, 2400.0);
}

#[tokio::test]
async fn file_cache_written_by_live_fetch_is_read_back_as_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(FileCacheStore::new(dir.path(), chrono_tz::Asia::Kolkata));

    let live = Arc::new(StubProvider::default().with(series(AssetId::Reits, 300, 402.5)));
    let first = resolver(MissingDataset, cache.clone(), live.clone());
    assert_eq!(first.resolve_asset(AssetId::Reits).await.data_source, DataSource::LiveFetch);

    let second = resolver(MissingDataset, cache, Arc::new(FailingProvider));
    let record = second.resolve_asset(AssetId::Reits).await;
    assert_eq!(record.data_source, DataSource::Cache);
    assert_eq!(record.current_price, 402.5);
    assert!(dir.path().join("REITs.json").exists());
}

#[tokio::test]
async fn force_refresh_overwrites_every_fresh_entry() {
    let cache = Arc::new(MemoryCacheStore::new());
    let mut live = StubProvider::default();
    for (i, asset) in AssetId::ALL.into_iter().enumerate() {
        cache
            .put(asset, &cached_record(asset, 1.0, Duration::minutes(10)))
            .await
            .unwrap();
        live = live.with(series(asset, 300, 1000.0 * (i + 1) as f64));
    }
    let live = Arc::new(live);
    let resolver = resolver(StaticDataset::default(), cache.clone(), live.clone());

    let summary = resolver.force_refresh(&AssetId::ALL).await;

    assert_eq!(live.calls(), 4);
    assert_eq!(summary.refreshed_count(), 4);
    for (i, asset) in AssetId::ALL.into_iter().enumerate() {
        let expected = 1000.0 * (i + 1) as f64;
        assert!(matches!(
            summary.results[&asset],
            RefreshOutcome::Refreshed { current_price, .. } if current_price == expected
        ));
        let stored = cache.get(asset).await.unwrap().unwrap();
        assert_eq!(stored.record.current_price, expected);
        assert_eq!(stored.stored_source, DataSource::LiveFetch);
        assert!(stored.record.data_quality.is_some());
    }
}
