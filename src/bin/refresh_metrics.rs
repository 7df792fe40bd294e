use anyhow::Result;
use dotenv::dotenv;
use log::{error, info};
use portfolio_metrics::config::AppConfig;
use portfolio_metrics::models::AssetId;
use portfolio_metrics::services::resolver::RefreshOutcome;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    let resolver = config.build_resolver()?;

    info!("Forcing live refresh for all assets...");
    let summary = resolver.force_refresh(&AssetId::ALL).await;

    for (asset, outcome) in &summary.results {
        match outcome {
            RefreshOutcome::Refreshed { current_price, data_points, window } => {
                info!("{}: refreshed at {:.2} ({} points, window {})", asset, current_price, data_points, window);
            }
            RefreshOutcome::Failed { reason } => {
                error!("{}: failed: {}", asset, reason);
            }
        }
    }

    info!(
        "Done in {}s: {} refreshed, {} failed",
        (summary.finished_at - summary.started_at).num_seconds(),
        summary.refreshed_count(),
        summary.failed_count()
    );

    if !summary.is_success() {
        anyhow::bail!("no asset could be refreshed");
    }
    Ok(())
}
