// src/batch.rs

use anyhow::{Context, Result};
use std::{collections::BTreeSet, fs, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    fetch::{fetch_year, ArchiveSource, FetchOutcome},
    store,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub dispatched: Vec<u16>,
    pub written: Vec<u16>,
    pub unavailable: Vec<u16>,
    pub failed: Vec<u16>,
}

/// Years in the configured range whose output file is missing or empty.
pub fn pending_years(cfg: &Config) -> Vec<u16> {
    cfg.years()
        .filter(|&year| {
            let done = store::is_nonempty(&cfg.output_path(year));
            if done {
                debug!(year, "skipping (already fetched)");
            }
            !done
        })
        .collect()
}

pub fn prepare_dirs(cfg: &Config) -> Result<()> {
    fs::create_dir_all(&cfg.sod_dir)
        .with_context(|| format!("creating {}", cfg.sod_dir.display()))
}

/// Fetch every pending year, at most `cfg.workers` at a time, and wait for all of them.
///
/// A year that fails is logged and counted; the rest of the batch carries on.
pub async fn run<S: ArchiveSource>(source: Arc<S>, cfg: &Config) -> Result<BatchSummary> {
    prepare_dirs(cfg)?;

    let years = pending_years(cfg);
    let mut summary = BatchSummary {
        dispatched: years.clone(),
        ..Default::default()
    };
    if years.is_empty() {
        info!("no sod years to fetch");
        return Ok(summary);
    }
    info!(count = years.len(), workers = cfg.workers, "dispatching sod years");

    let sem = Arc::new(Semaphore::new(cfg.workers));
    let shared_cfg = Arc::new(cfg.clone());
    let mut tasks = JoinSet::new();

    for &year in &years {
        let source = Arc::clone(&source);
        let sem = Arc::clone(&sem);
        let cfg = Arc::clone(&shared_cfg);
        tasks.spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(p) => p,
                Err(e) => return (year, Err(e.into())),
            };
            (year, fetch_year(source.as_ref(), &cfg, year).await)
        });
    }

    // anything left here at the end panicked
    let mut outstanding: BTreeSet<u16> = years.into_iter().collect();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((year, result)) => {
                outstanding.remove(&year);
                match result {
                    Ok(FetchOutcome::Written { .. }) => summary.written.push(year),
                    Ok(FetchOutcome::Unavailable { .. }) => summary.unavailable.push(year),
                    Err(e) => {
                        error!(year, "sod {} failed: {:#}", year, e);
                        summary.failed.push(year);
                    }
                }
            }
            Err(e) => error!("sod task aborted: {}", e),
        }
    }
    summary.failed.extend(outstanding);

    summary.written.sort_unstable();
    summary.unavailable.sort_unstable();
    summary.failed.sort_unstable();

    info!(
        written = summary.written.len(),
        unavailable = summary.unavailable.len(),
        failed = summary.failed.len(),
        "batch complete"
    );
    Ok(summary)
}
