// src/report/stats.rs

use std::collections::BTreeMap;

use super::Branch;

#[derive(Debug, Clone, PartialEq)]
pub struct CountyHhi {
    pub year: u16,
    pub county: i64,
    /// Σ (100 · branch share)² over the institutions in the county.
    pub branch_hhi: f64,
    /// Σ (100 · deposit share)²; NaN when the county holds no deposits.
    pub deposit_hhi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainOfficeShare {
    pub year: u16,
    pub cert: i64,
    pub main_office: f64,
    pub total: f64,
    /// 100 · main_office / total; NaN when total is zero.
    pub pct: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    branches: u64,
    deposits: f64,
}

impl Tally {
    fn add(&mut self, b: &Branch) {
        if b.branch_number.is_some() {
            self.branches += 1;
        }
        self.deposits += b.deposits.unwrap_or(0.0);
    }
}

/// Branch and deposit concentration per county per year.
pub fn county_hhi(branches: &[Branch]) -> Vec<CountyHhi> {
    let mut by_cert: BTreeMap<(u16, i64, i64), Tally> = BTreeMap::new();
    let mut by_county: BTreeMap<(u16, i64), Tally> = BTreeMap::new();
    for b in branches {
        by_cert.entry((b.year, b.county, b.cert)).or_default().add(b);
        by_county.entry((b.year, b.county)).or_default().add(b);
    }

    let mut hhi: BTreeMap<(u16, i64), (f64, f64)> = BTreeMap::new();
    for (&(year, county, _), cert) in &by_cert {
        let cnty = by_county[&(year, county)];
        let brs_share = cert.branches as f64 / cnty.branches as f64;
        let dep_share = cert.deposits / cnty.deposits;

        let acc = hhi.entry((year, county)).or_insert((0.0, 0.0));
        acc.0 += (brs_share * 100.0).powi(2);
        acc.1 += (dep_share * 100.0).powi(2);
    }

    hhi.into_iter()
        .map(|((year, county), (branch_hhi, deposit_hhi))| CountyHhi {
            year,
            county,
            branch_hhi,
            deposit_hhi,
        })
        .collect()
}

/// Share of each institution's branch deposits booked at its main office (BKMO = 1).
pub fn main_office_share(branches: &[Branch]) -> Vec<MainOfficeShare> {
    let mut by_cert: BTreeMap<(u16, i64), (f64, f64)> = BTreeMap::new();
    for b in branches {
        let dep = b.deposits.unwrap_or(0.0);
        let acc = by_cert.entry((b.year, b.cert)).or_insert((0.0, 0.0));
        if b.main_office == Some(1) {
            acc.0 += dep;
        }
        acc.1 += dep;
    }

    by_cert
        .into_iter()
        .map(|((year, cert), (main_office, total))| MainOfficeShare {
            year,
            cert,
            main_office,
            total,
            pct: 100.0 * main_office / total,
        })
        .collect()
}
