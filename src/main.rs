use anyhow::Result;
use reqwest::Client;
use sodscraper::{batch, config::Config, fetch::HttpSource};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) config ───────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(
        start = cfg.start_year,
        end = cfg.end_year,
        workers = cfg.workers,
        dir = %cfg.sod_dir.display(),
        "sod fetch"
    );

    // ─── 3) fetch every missing year ─────────────────────────────────
    let source = Arc::new(HttpSource::new(Client::new(), &cfg));
    let summary = batch::run(source, &cfg).await?;

    if !summary.failed.is_empty() {
        error!(years = ?summary.failed, "some years failed");
    }
    info!(
        written = ?summary.written,
        unavailable = ?summary.unavailable,
        "all done"
    );
    Ok(())
}
