// src/fetch/zips.rs

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// The whole-year data file. `ALL_<yyyy>_1.csv`, `ALL_<yyyy>_2.csv`, ... are split copies
/// of the same rows and are ignored.
static DATA_MEMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ALL_\d{4}\.csv").expect("member regex is valid"));

/// Largest up-front reservation for a member, whatever its header claims.
const SIZE_HINT_CAP: u64 = 1 << 28;

/// Capacity to reserve for a member that declares `declared` bytes. The header is
/// untrusted, so the reservation is capped and `read_to_end` grows past it if needed.
fn size_hint(declared: u64) -> usize {
    declared.min(SIZE_HINT_CAP) as usize
}

pub fn is_data_member(name: &str) -> bool {
    DATA_MEMBER.is_match(name)
}

/// Open `body` as an in-memory zip and read the first data member, in archive order.
/// Returns the member's name and its raw bytes.
pub fn extract_member(body: &[u8]) -> Result<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(body)).context("opening sod zip")?;

    let mut seen = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("accessing zip entry #{}", i))?;
        let name = entry.name().to_string();

        if entry.is_file() && is_data_member(&name) {
            let mut buf = Vec::with_capacity(size_hint(entry.size()));
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("reading {} into memory", name))?;
            debug!(member = %name, bytes = buf.len(), "extracted");
            return Ok((name, buf));
        }
        seen.push(name);
    }

    bail!(
        "no ALL_<year>.csv member in sod zip (members: [{}])",
        seen.join(", ")
    )
}

#[cfg(test)]
pub(crate) fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        zw.start_file(*name, SimpleFileOptions::default())
            .expect("start zip member");
        zw.write_all(data).expect("write zip member");
    }
    zw.finish().expect("finish zip").into_inner()
}
