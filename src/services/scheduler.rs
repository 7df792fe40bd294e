// src/services/scheduler.rs
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use log::{error, info, warn};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::resolver::{RefreshSummary, TieredResolver};
use crate::models::AssetId;

pub const DEFAULT_DAILY_CRON: &str = "0 30 20 * * *";
pub const DEFAULT_BACKUP_CRON: &str = "0 30 8 * * *";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub name: &'static str,
    pub cron: String,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub backup_skip_hours: i64,
    pub jobs: Vec<JobStatus>,
}

/// Runs forced refreshes on a daily schedule, with a backup run that is
/// skipped when a recent refresh already succeeded.
pub struct RefreshScheduler {
    resolver: Arc<TieredResolver>,
    daily_cron: String,
    backup_cron: String,
    backup_skip: Duration,
    last_success: RwLock<Option<DateTime<Utc>>>,
    running: RwLock<bool>,
}

impl RefreshScheduler {
    pub fn new(resolver: Arc<TieredResolver>, backup_skip: Duration) -> Self {
        RefreshScheduler {
            resolver,
            daily_cron: DEFAULT_DAILY_CRON.to_string(),
            backup_cron: DEFAULT_BACKUP_CRON.to_string(),
            backup_skip,
            last_success: RwLock::new(None),
            running: RwLock::new(false),
        }
    }

    /// Cron expressions are six-field (with seconds) and evaluated in UTC.
    pub fn with_cron(mut self, daily_cron: &str, backup_cron: &str) -> Self {
        self.daily_cron = daily_cron.to_string();
        self.backup_cron = backup_cron.to_string();
        self
    }

    pub async fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read().await
    }

    pub async fn run_refresh(&self, trigger: &str) -> RefreshSummary {
        info!("Starting {} metrics refresh", trigger);
        let summary = self.resolver.force_refresh(&AssetId::ALL).await;

        if summary.is_success() {
            *self.last_success.write().await = Some(summary.finished_at);
            info!(
                "{} refresh succeeded ({}/{} assets)",
                trigger,
                summary.refreshed_count(),
                summary.results.len()
            );
        } else {
            error!("{} refresh failed for every asset", trigger);
        }
        summary
    }

    /// Returns `None` when the backup run was skipped.
    pub async fn run_backup(&self) -> Option<RefreshSummary> {
        let last = self.last_success().await;
        if !should_run_backup(last, Utc::now(), self.backup_skip) {
            info!("Skipping backup refresh, last success at {:?}", last);
            return None;
        }
        Some(self.run_refresh("backup").await)
    }

    pub async fn status(&self, now: DateTime<Utc>) -> SchedulerStatus {
        SchedulerStatus {
            running: *self.running.read().await,
            last_success: self.last_success().await,
            backup_skip_hours: self.backup_skip.num_hours(),
            jobs: vec![
                JobStatus { name: "daily_refresh", cron: self.daily_cron.clone(), next_run: next_run(&self.daily_cron, now) },
                JobStatus { name: "backup_refresh", cron: self.backup_cron.clone(), next_run: next_run(&self.backup_cron, now) },
            ],
        }
    }

    /// Registers the daily and backup jobs and starts the scheduler.
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler> {
        let sched = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("failed to create scheduler: {:?}", e))?;

        let daily = self.clone();
        let daily_job = Job::new_async(self.daily_cron.as_str(), move |_uuid, _l| {
            let this = daily.clone();
            Box::pin(async move {
                this.run_refresh("daily").await;
            })
        })
        .map_err(|e| anyhow!("invalid daily cron '{}': {:?}", self.daily_cron, e))?;

        let backup = self.clone();
        let backup_job = Job::new_async(self.backup_cron.as_str(), move |_uuid, _l| {
            let this = backup.clone();
            Box::pin(async move {
                this.run_backup().await;
            })
        })
        .map_err(|e| anyhow!("invalid backup cron '{}': {:?}", self.backup_cron, e))?;

        sched.add(daily_job).await.map_err(|e| anyhow!("failed to add daily job: {:?}", e))?;
        sched.add(backup_job).await.map_err(|e| anyhow!("failed to add backup job: {:?}", e))?;
        sched.start().await.map_err(|e| anyhow!("failed to start scheduler: {:?}", e))?;
        *self.running.write().await = true;

        info!("Refresh scheduler started (daily '{}', backup '{}')", self.daily_cron, self.backup_cron);
        Ok(sched)
    }
}

pub fn should_run_backup(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>, skip_window: Duration) -> bool {
    match last_success {
        Some(at) => now - at >= skip_window,
        None => true,
    }
}

/// Next firing strictly after `now`, or `None` for an unparseable expression.
pub fn next_run(cron: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match Schedule::from_str(cron) {
        Ok(schedule) => schedule.after(&now).next(),
        Err(e) => {
            warn!("Invalid cron expression '{}': {}", cron, e);
            None
        }
    }
}
