// src/config.rs

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_URL_TEMPLATE: &str = "https://www7.fdic.gov/sod/download/ALL_{year}.zip";

/// First year the SOD covers thrifts as well as banks (FSLIC/RTC folded into the FDIC ~1993).
pub const FIRST_SOD_YEAR: u16 = 1994;

const DEFAULT_WORKERS: usize = 6;
const YEAR_PLACEHOLDER: &str = "{year}";

/// Everything the fetcher and reporter need, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Download URL with a `{year}` placeholder.
    pub url_template: String,
    /// Where `sod_<year>.csv.xz` files are written.
    pub sod_dir: PathBuf,
    /// Where the reporter writes its charts.
    pub figs_dir: PathBuf,
    pub start_year: u16,
    /// Exclusive.
    pub end_year: u16,
    /// Maximum number of years fetched concurrently.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            sod_dir: PathBuf::from("sod"),
            figs_dir: PathBuf::from("figs"),
            start_year: FIRST_SOD_YEAR,
            end_year: Local::now().year() as u16,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Defaults, overridden by any `SOD_*` variables set in the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(t) = lookup("SOD_URL_TEMPLATE") {
            cfg.url_template = t;
        }
        if let Some(d) = lookup("SOD_DIR") {
            cfg.sod_dir = PathBuf::from(d);
        }
        if let Some(d) = lookup("SOD_FIGS_DIR") {
            cfg.figs_dir = PathBuf::from(d);
        }
        if let Some(y) = lookup("SOD_START_YEAR") {
            cfg.start_year = y
                .trim()
                .parse()
                .with_context(|| format!("parsing SOD_START_YEAR={:?}", y))?;
        }
        if let Some(y) = lookup("SOD_END_YEAR") {
            cfg.end_year = y
                .trim()
                .parse()
                .with_context(|| format!("parsing SOD_END_YEAR={:?}", y))?;
        }
        if let Some(w) = lookup("SOD_WORKERS") {
            cfg.workers = w
                .trim()
                .parse()
                .with_context(|| format!("parsing SOD_WORKERS={:?}", w))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.url_template.contains(YEAR_PLACEHOLDER) {
            bail!(
                "url template {:?} has no {} placeholder",
                self.url_template,
                YEAR_PLACEHOLDER
            );
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        Ok(())
    }

    /// Remote archive location for `year`.
    pub fn url_for(&self, year: u16) -> Result<Url> {
        let raw = self
            .url_template
            .replace(YEAR_PLACEHOLDER, &year.to_string());
        Url::parse(&raw).with_context(|| format!("parsing sod url {}", raw))
    }

    /// `<sod_dir>/sod_<year>.csv.xz`
    pub fn output_path(&self, year: u16) -> PathBuf {
        self.sod_dir.join(format!("sod_{}.csv.xz", year))
    }

    pub fn years(&self) -> impl Iterator<Item = u16> {
        self.start_year..self.end_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.start_year, 1994);
        assert_eq!(cfg.workers, 6);
        assert_eq!(cfg.end_year as i32, Local::now().year());
        assert_eq!(
            cfg.url_for(2020).unwrap().as_str(),
            "https://www7.fdic.gov/sod/download/ALL_2020.zip"
        );
        assert_eq!(cfg.output_path(2020), PathBuf::from("sod/sod_2020.csv.xz"));
    }

    #[test]
    fn test_env_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("SOD_URL_TEMPLATE", "http://127.0.0.1:8080/ALL_{year}.zip"),
            ("SOD_DIR", "/tmp/sod"),
            ("SOD_START_YEAR", "2020"),
            ("SOD_END_YEAR", " 2022 "),
            ("SOD_WORKERS", "2"),
        ]))
        .unwrap();

        assert_eq!(cfg.years().collect::<Vec<_>>(), vec![2020, 2021]);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.output_path(2021), PathBuf::from("/tmp/sod/sod_2021.csv.xz"));
        assert_eq!(
            cfg.url_for(2021).unwrap().as_str(),
            "http://127.0.0.1:8080/ALL_2021.zip"
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = Config::from_lookup(lookup_from(&[("SOD_WORKERS", "lots")])).unwrap_err();
        assert!(format!("{:#}", err).contains("SOD_WORKERS"));

        assert!(Config::from_lookup(lookup_from(&[("SOD_WORKERS", "0")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("SOD_URL_TEMPLATE", "https://x/ALL.zip")]))
                .is_err()
        );
    }
}
