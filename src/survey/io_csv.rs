// Primitives for reading CSV files.

use std::fs;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};

use crate::survey::{
    io_common::{cell_from_str, header_names},
    *,
};

/// Reads a CSV export. The bytes are decoded as UTF-8 (with or without a
/// byte order mark) and, failing that, with the legacy encoding.
pub fn read_csv_table(path: &Path, legacy: &'static Encoding) -> IngestResult<RawTable> {
    let p = path.display().to_string();
    let bytes = fs::read(path).context(ReadingFileSnafu { path: p.clone() })?;
    let text = decode(&bytes, legacy).context(DecodingSnafu {
        path: p.clone(),
        encoding: legacy.name(),
    })?;
    parse_csv(&text, &p)
}

fn decode(bytes: &[u8], legacy: &'static Encoding) -> Option<String> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return Some(text.into_owned());
    }
    debug!("decode: not UTF-8, trying {}", legacy.name());
    let (text, had_errors) = legacy.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Parses decoded CSV text. The first record is the header row; records of
/// any length are accepted.
pub fn parse_csv(text: &str, path: &str) -> IngestResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = rdr.records();
    let header = match records.next() {
        Some(line_r) => line_r.context(ParsingCsvSnafu { path })?,
        None => return MissingHeaderSnafu { path }.fail(),
    };
    let headers = header_names(header.iter().map(cell_from_str).collect());
    debug!("parse_csv: {}: header: {:?}", path, headers);

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for line_r in records {
        let line = line_r.context(ParsingCsvSnafu { path })?;
        rows.push(line.iter().map(cell_from_str).collect());
    }
    Ok(RawTable::from_source(path, headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let p = dir.path().join(name);
        fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn utf8_with_bom() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "a.csv", "\u{feff}教師姓名,題目\n王,階段二\n".as_bytes());
        let t = read_csv_table(&p, encoding_rs::BIG5).unwrap();
        assert_eq!(t.headers, vec!["教師姓名", "題目"]);
        assert_eq!(t.rows, vec![vec![Some("王".to_string()), Some("階段二".to_string())]]);
    }

    #[test]
    fn big5_fallback() {
        let dir = TempDir::new().unwrap();
        let (bytes, _, _) = encoding_rs::BIG5.encode("教師姓名,題目\n林,階段五\n");
        let p = write(&dir, "b.csv", bytes.as_ref());
        let t = read_csv_table(&p, encoding_rs::BIG5).unwrap();
        assert_eq!(t.headers, vec!["教師姓名", "題目"]);
        assert_eq!(t.rows[0][1].as_deref(), Some("階段五"));
    }

    #[test]
    fn undecodable_file() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "c.csv", &[0x61, 0xff, 0xff, 0x0a]);
        let res = read_csv_table(&p, encoding_rs::BIG5);
        assert!(matches!(res, Err(IngestError::Decoding { .. })));
    }

    #[test]
    fn ragged_rows_and_empty_cells() {
        let t = parse_csv("a,b,c\n1,,3\n4\n5,6,7,8\n", "test").unwrap();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.rows[0], vec![Some("1".to_string()), None, Some("3".to_string())]);
        assert_eq!(t.rows[1], vec![Some("4".to_string()), None, None]);
        assert_eq!(t.rows[2].len(), 3);
    }

    #[test]
    fn quoted_fields() {
        let t = parse_csv("\"1.1 題目, 含逗號\"\n\"階段三\n說明\"\n", "test").unwrap();
        assert_eq!(t.headers, vec!["1.1 題目, 含逗號"]);
        assert_eq!(t.rows[0][0].as_deref(), Some("階段三\n說明"));
    }

    #[test]
    fn empty_file_has_no_header() {
        let res = parse_csv("", "test");
        assert!(matches!(res, Err(IngestError::MissingHeader { .. })));
    }
}
