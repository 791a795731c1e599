//! Loader for raw labeled-record files.
//!
//! Accepts either a JSON array of records or JSONL (one record per line). Records are kept in
//! their raw form; validation happens during preparation so discarded rows can be counted.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use thiserror::Error;

use crate::demographic::RawRecord;

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid records file: {0}")]
    InvalidRecords(String),
}

/// Load raw records from a `.json` array or a `.jsonl` file.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, DatasetLoadError> {
    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    if is_jsonl {
        return load_records_jsonl(path);
    }
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    parse_records(&bytes)
}

/// Parse a JSON array of records, falling back to JSONL when the payload is not an array.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<RawRecord>, DatasetLoadError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        None => Ok(Vec::new()),
        Some(b'[') => Ok(serde_json::from_slice(bytes)?),
        Some(_) => parse_lines(BufReader::new(bytes)),
    }
}

fn load_records_jsonl(path: &Path) -> Result<Vec<RawRecord>, DatasetLoadError> {
    let file = File::open(path)?;
    parse_lines(BufReader::new(file))
}

fn parse_lines(reader: impl BufRead) -> Result<Vec<RawRecord>, DatasetLoadError> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRecord = serde_json::from_str(&line)
            .map_err(|err| DatasetLoadError::InvalidRecords(format!("line {}: {err}", idx + 1)))?;
        out.push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const RECORD_A: &str = r#"{"demographic":{"age":25,"gender":"male","location":"Northeast","educationLevel":"bachelors","ethnicity":"White"},"name":"Michael"}"#;
    const RECORD_B: &str = r#"{"demographic":{"age":"old","gender":"female"},"name":"Karen"}"#;

    #[test]
    fn loads_jsonl_and_keeps_invalid_rows_raw() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, format!("{RECORD_A}\n\n{RECORD_B}\n")).unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].validate().unwrap().name, "Michael");
        assert!(records[1].validate().is_none());
    }

    #[test]
    fn loads_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, format!("  [{RECORD_A}, {RECORD_B}]")).unwrap();
        assert_eq!(load_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_records(format!("{RECORD_A}\nnot json\n").as_bytes()).unwrap_err();
        match err {
            DatasetLoadError::InvalidRecords(msg) => assert!(msg.starts_with("line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_records(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DatasetLoadError::Io(_)));
    }
}
