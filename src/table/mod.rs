// src/table/mod.rs

pub mod parse;

pub use parse::{parse_csv, read_table};

use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashMap, fmt};
use thiserror::Error;

/// Text encodings seen across SOD years: newer files are UTF-8, older ones Latin-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => f.write_str("utf-8"),
            Encoding::Latin1 => f.write_str("latin-1"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid {encoding} text on line {line} (byte {position} of field)")]
    Decode {
        encoding: Encoding,
        line: u64,
        position: usize,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line} has {found} fields, header has {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("no header row")]
    Empty,
}

/// A delimited table held as text cells. Every row is exactly `headers.len()` wide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A plain or thousands-grouped decimal, e.g. `42`, `-1,234`, `12,345.50`.
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").expect("number regex is valid")
});

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Strips thousands separators from every column whose non-empty cells are all numbers.
    /// Text columns are left untouched even if some of their cells look numeric.
    pub fn normalize_thousands(&mut self) {
        for col in 0..self.headers.len() {
            let mut any = false;
            let numeric = self.rows.iter().all(|row| {
                let cell = row[col].trim();
                if cell.is_empty() {
                    return true;
                }
                any = true;
                NUMBER.is_match(cell)
            });
            if !(numeric && any) {
                continue;
            }
            for row in &mut self.rows {
                if row[col].contains(',') {
                    row[col] = row[col].trim().replace(',', "");
                }
            }
        }
    }

    /// Stacks tables whose columns differ: the result has the union of all columns in
    /// first-seen order, and cells a table doesn't have are left empty.
    pub fn concat_relaxed(tables: Vec<Table>) -> Table {
        let mut headers: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for t in &tables {
            for h in &t.headers {
                if !index.contains_key(h) {
                    index.insert(h.clone(), headers.len());
                    headers.push(h.clone());
                }
            }
        }

        let total = tables.iter().map(Table::len).sum();
        let mut out = Table {
            headers,
            rows: Vec::with_capacity(total),
        };
        let width = out.headers.len();

        for t in tables {
            let mapping: Vec<usize> = t.headers.iter().map(|h| index[h]).collect();
            for row in t.rows {
                let mut wide = vec![String::new(); width];
                for (cell, &dst) in row.into_iter().zip(&mapping) {
                    wide[dst] = cell;
                }
                out.rows.push(wide);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_normalize_thousands_only_touches_numeric_columns() {
        let mut t = table(
            &["DEPSUMBR", "ADDRESS", "ZIPBR"],
            &[
                &["1,234", "1,000 Main St", "02134"],
                &["56", "12 Elm", ""],
                &["", "3,000", "10001"],
                &["-7,654,321.5", "x", "99501"],
            ],
        );
        t.normalize_thousands();

        let deps: Vec<&str> = t.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(deps, vec!["1234", "56", "", "-7654321.5"]);
        assert_eq!(t.rows[0][1], "1,000 Main St");
        assert_eq!(t.rows[2][1], "3,000");
        assert_eq!(t.rows[0][2], "02134");
    }

    #[test]
    fn test_malformed_grouping_is_text() {
        let mut t = table(&["A"], &[&["1,23"], &["4"]]);
        t.normalize_thousands();
        assert_eq!(t.rows[0][0], "1,23");
    }

    #[test]
    fn test_concat_relaxed_fills_missing_columns() {
        let old = table(&["YEAR", "CERT", "DEPSUMBR"], &[&["1994", "14", "100"]]);
        let new = table(
            &["YEAR", "DEPSUMBR", "CERT", "BKMO"],
            &[&["2020", "250", "14", "1"], &["2020", "5", "15", "0"]],
        );

        let all = Table::concat_relaxed(vec![old, new]);
        assert_eq!(all.headers, vec!["YEAR", "CERT", "DEPSUMBR", "BKMO"]);
        assert_eq!(all.len(), 3);
        assert_eq!(all.rows[0], vec!["1994", "14", "100", ""]);
        assert_eq!(all.rows[1], vec!["2020", "14", "250", "1"]);
        assert_eq!(all.rows[2], vec!["2020", "15", "5", "0"]);
    }
}
