// src/table/parse.rs

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, warn};

use super::{Encoding, Table, TableError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse delimited text as UTF-8, and if any field isn't valid UTF-8, parse it again as
/// Latin-1. Errors other than a decode failure are returned without a retry.
pub fn read_table(bytes: &[u8]) -> Result<(Table, Encoding), TableError> {
    match parse_csv(bytes, Encoding::Utf8) {
        Ok(t) => Ok((t, Encoding::Utf8)),
        Err(TableError::Decode { line, position, .. }) => {
            warn!(line, position, "not utf-8, falling back to latin-1");
            let t = parse_csv(bytes, Encoding::Latin1)?;
            Ok((t, Encoding::Latin1))
        }
        Err(e) => Err(e),
    }
}

/// Parse `bytes` as a header row followed by data rows, decoding every field with
/// `encoding`. Short rows are padded with empty cells; rows wider than the header fail.
pub fn parse_csv(bytes: &[u8], encoding: Encoding) -> Result<Table, TableError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = rdr.byte_records();
    let header = match records.next() {
        Some(rec) => rec?,
        None => return Err(TableError::Empty),
    };
    let mut table = Table::new(decode_record(&header, encoding)?);
    let width = table.headers.len();

    for rec in records {
        let rec = rec?;
        if rec.len() > width {
            return Err(TableError::RaggedRow {
                line: line_of(&rec),
                expected: width,
                found: rec.len(),
            });
        }
        let mut row = decode_record(&rec, encoding)?;
        row.resize(width, String::new());
        table.rows.push(row);
    }

    table.normalize_thousands();
    debug!(rows = table.len(), cols = width, %encoding, "parsed table");
    Ok(table)
}

fn line_of(rec: &ByteRecord) -> u64 {
    rec.position().map(|p| p.line()).unwrap_or(0)
}

fn decode_record(rec: &ByteRecord, encoding: Encoding) -> Result<Vec<String>, TableError> {
    rec.iter()
        .map(|field| match encoding {
            Encoding::Utf8 => std::str::from_utf8(field)
                .map(str::to_string)
                .map_err(|e| TableError::Decode {
                    encoding,
                    line: line_of(rec),
                    position: e.valid_up_to(),
                }),
            // ISO-8859-1 maps every byte to the code point of the same value.
            Encoding::Latin1 => Ok(field.iter().map(|&b| char::from(b)).collect()),
        })
        .collect()
}
