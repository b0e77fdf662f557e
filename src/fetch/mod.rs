// src/fetch/mod.rs

pub mod zips;

use anyhow::{Context, Result};
use reqwest::Client;
use std::{
    future::Future,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::{
    config::Config,
    store,
    table::{self, Encoding},
};

/// What a source handed back for one year.
#[derive(Debug)]
pub enum Retrieved {
    Archive(Vec<u8>),
    /// The remote answered with a non-success status.
    Unavailable(u16),
}

/// Where yearly archives come from.
pub trait ArchiveSource: Send + Sync + 'static {
    fn retrieve(&self, year: u16) -> impl Future<Output = Result<Retrieved>> + Send;
}

/// Downloads archives over HTTP from the configured URL template.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    cfg: Config,
}

impl HttpSource {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            cfg: cfg.clone(),
        }
    }
}

impl ArchiveSource for HttpSource {
    async fn retrieve(&self, year: u16) -> Result<Retrieved> {
        let url = self.cfg.url_for(year)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(Retrieved::Unavailable(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading body from {}", url))?;
        Ok(Retrieved::Archive(body.to_vec()))
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Written {
        path: PathBuf,
        rows: usize,
        encoding: Encoding,
    },
    Unavailable {
        status: u16,
    },
}

/// Fetch one year's archive and persist its data member as `sod_<year>.csv.xz`.
///
/// A non-success status is not an error: the year is reported as unavailable and
/// nothing is written.
#[instrument(level = "info", skip(source, cfg))]
pub async fn fetch_year<S: ArchiveSource>(
    source: &S,
    cfg: &Config,
    year: u16,
) -> Result<FetchOutcome> {
    let body = match source.retrieve(year).await? {
        Retrieved::Archive(body) => body,
        Retrieved::Unavailable(status) => {
            warn!(year, status, "no sod file for year");
            return Ok(FetchOutcome::Unavailable { status });
        }
    };
    info!(year, bytes = body.len(), "retrieved sod zip");

    let path = cfg.output_path(year);
    let (rows, encoding) = tokio::task::spawn_blocking({
        let path = path.clone();
        move || normalize_archive(&body, &path)
    })
    .await?
    .with_context(|| format!("normalizing sod {}", year))?;

    info!(year, rows, %encoding, "wrote sod");
    Ok(FetchOutcome::Written {
        path,
        rows,
        encoding,
    })
}

/// Unzip, parse and persist. Returns the row count and the encoding that decoded.
pub fn normalize_archive(body: &[u8], out_path: &Path) -> Result<(usize, Encoding)> {
    let (member, data) = zips::extract_member(body)?;
    let (table, encoding) =
        table::read_table(&data).with_context(|| format!("parsing {}", member))?;
    store::write_table(&table, out_path)?;
    Ok((table.len(), encoding))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::{collections::HashMap, sync::Mutex};

    /// Serves archives from memory; any year without one answers 404.
    #[derive(Default)]
    pub struct MemorySource {
        pub archives: HashMap<u16, Vec<u8>>,
        pub requested: Mutex<Vec<u16>>,
    }

    impl MemorySource {
        pub fn with(mut self, year: u16, archive: Vec<u8>) -> Self {
            self.archives.insert(year, archive);
            self
        }

        pub fn requested(&self) -> Vec<u16> {
            let mut years = self.requested.lock().unwrap().clone();
            years.sort_unstable();
            years
        }
    }

    impl ArchiveSource for MemorySource {
        async fn retrieve(&self, year: u16) -> Result<Retrieved> {
            self.requested.lock().unwrap().push(year);
            Ok(match self.archives.get(&year) {
                Some(a) => Retrieved::Archive(a.clone()),
                None => Retrieved::Unavailable(404),
            })
        }
    }

    pub fn sod_csv(year: u16) -> String {
        format!(
            "YEAR,CERT,BRNUM,STCNTYBR,DEPSUMBR,BKMO,NAMEBR\n\
             {y},14,0,25025,\"1,000\",1,Main Office\n\
             {y},14,1,25025,500,0,Back Bay\n\
             {y},15,0,25017,\"2,250\",1,\"Smith, Jones & Co\"\n",
            y = year
        )
    }
}
