use anyhow::Result;
use sodscraper::{config::Config, report};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── init tracing ─────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).init();

    let cfg = Config::from_env()?;
    info!(dir = %cfg.sod_dir.display(), figs = %cfg.figs_dir.display(), "sod report");

    let summary = report::run(&cfg)?;
    info!(
        rows = summary.rows,
        counties = summary.counties,
        institutions = summary.institutions,
        "all done"
    );
    for chart in &summary.charts {
        info!("wrote {}", chart.display());
    }
    Ok(())
}
