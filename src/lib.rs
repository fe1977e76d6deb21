pub mod api;
pub mod config;
pub mod downloader;

use std::sync::Arc;

use anyhow::Context;

use api::AppState;
use config::{provision_cookies, Config};
use downloader::extractors::YtDlpEngine;
use downloader::{Downloader, JobWorkspace, ProfileCatalog, StrategySelector};

/// Wire the downloader together and serve the HTTP API.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let download_dir = config.download_dir();
    tokio::fs::create_dir_all(&download_dir)
        .await
        .with_context(|| format!("creating {}", download_dir.display()))?;
    let download_dir = download_dir.canonicalize()?;
    tracing::info!(dir = %download_dir.display(), "download directory ready");

    let cookies = provision_cookies(config.cookies.as_deref(), &config.cookie_file)?;
    let profiles = Arc::new(ProfileCatalog::standard(cookies.as_deref()));
    let order: Vec<String> = profiles.ordered().iter().map(|p| p.identity_tag()).collect();
    tracing::info!(
        profiles = ?order,
        broad = %profiles.broad().identity_tag(),
        "retrieval profiles"
    );

    let engine = Arc::new(YtDlpEngine::new(config.engine_command(), config.engine_settings()));
    let selector = StrategySelector::new(engine, profiles);
    let workspace = JobWorkspace::new(download_dir.clone(), config.locate_policy());
    let downloader = Arc::new(Downloader::new(selector, workspace, config.output_formats()));

    let state = AppState {
        downloader,
        delivery: config.delivery,
        link_retention: config.link_retention(),
        download_dir,
    };

    api::serve(&config.bind, config.port, state).await
}
