// src/store.rs

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::debug;
use xz2::{read::XzDecoder, write::XzEncoder};

use crate::table::Table;

/// xz preset; 9 is the maximum.
pub const XZ_LEVEL: u32 = 9;

#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// True if `path` exists and has at least one byte.
pub fn is_nonempty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Write `table` as xz-compressed CSV at `path`.
///
/// The data goes to a temp file next to `path` first and is renamed into place once
/// the xz stream is finished, so an interrupted run never leaves a truncated file that
/// a later run would mistake for a finished year.
pub fn write_table(table: &Table, path: &Path) -> Result<u64> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;

    {
        let encoder = XzEncoder::new(BufWriter::new(tmp.as_file_mut()), XZ_LEVEL);
        let mut wtr = WriterBuilder::new().from_writer(encoder);
        wtr.write_record(&table.headers)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        let encoder = wtr
            .into_inner()
            .map_err(|e| anyhow!("flushing csv writer: {}", e.error()))?;
        encoder
            .finish()
            .context("finishing xz stream")?
            .flush()
            .context("flushing xz output")?;
    }

    // tempfile creates 0600 files; outputs should be readable like any other file
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(OUTPUT_MODE))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("persisting {}", path.display()))?;

    let size = fs::metadata(path)?.len();
    debug!(path = %path.display(), rows = table.len(), bytes = size, "wrote table");
    Ok(size)
}

/// Read a table written by [`write_table`].
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let decoder = XzDecoder::new(BufReader::new(file));
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(decoder);

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut table = Table::new(headers);
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("reading {}", path.display()))?;
        table.rows.push(rec.iter().map(str::to_string).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("sod_2020.csv.xz");

        let src = "YEAR,CERT,NAMEFULL,ADDRESBR,DEPSUMBR\n\
                   2020,14,\"State Street, N.A.\",\"1 \"\"Lincoln\"\" St\",\"1,234,567\"\n\
                   2020,15,Peñasco Bank,,\n";
        let (parsed, _) = table::read_table(src.as_bytes())?;

        assert!(!is_nonempty(&path));
        write_table(&parsed, &path)?;
        assert!(is_nonempty(&path));

        let back = read_table(&path)?;
        assert_eq!(back, parsed);
        assert_eq!(back.rows[0][4], "1234567");

        // no temp files left behind
        let entries = fs::read_dir(tmp.path())?.count();
        assert_eq!(entries, 1);
        Ok(())
    }

    #[test]
    fn test_output_is_xz() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("t.csv.xz");
        let mut t = Table::new(vec!["A".into()]);
        t.rows.push(vec!["1".into()]);
        write_table(&t, &path)?;

        let bytes = fs::read(&path)?;
        assert_eq!(&bytes[..6], b"\xFD7zXZ\x00");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_world_readable() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir()?;
        let path = tmp.path().join("sod_2020.csv.xz");
        let mut t = Table::new(vec!["YEAR".into()]);
        t.rows.push(vec!["2020".into()]);
        write_table(&t, &path)?;

        let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o644, "mode was {:o}", mode);
        Ok(())
    }
}
