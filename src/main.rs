use anyhow::Result;
use dotenv::dotenv;
use log::{error, info};
use portfolio_metrics::config::AppConfig;
use portfolio_metrics::routes;
use portfolio_metrics::services::scheduler::RefreshScheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env();
    info!("Using PORT: {}", config.port);
    info!(
        "Primary dataset: {}, cache dir: {}",
        config.historical_csv_path.display(),
        config.cache_dir.display()
    );

    let resolver = Arc::new(config.build_resolver()?);
    let scheduler = Arc::new(
        RefreshScheduler::new(resolver.clone(), config.backup_skip())
            .with_cron(&config.refresh_cron, &config.backup_refresh_cron),
    );

    // Keep the handle alive for the lifetime of the server.
    let _jobs = scheduler.clone().start().await?;

    if config.refresh_on_startup {
        let startup = scheduler.clone();
        tokio::spawn(async move {
            let summary = startup.run_refresh("startup").await;
            if !summary.is_success() {
                error!("Startup refresh did not refresh any asset");
            }
        });
    }

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(resolver, scheduler).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
