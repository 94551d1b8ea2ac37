//! Streaming reader over the product file
//!
//! The first line is always treated as the header and never yielded. Rows
//! with the wrong number of fields are passed through untouched.

use crate::error::Result;
use crate::record::RawRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Single-pass iterator of raw rows
pub struct RecordSource<R: Read> {
    reader: csv::Reader<R>,
    record: csv::StringRecord,
    rows_read: usize,
    exhausted: bool,
}

impl RecordSource<File> {
    /// Open `path` for streaming
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_csv(builder().from_path(path)?))
    }
}

impl<R: Read> RecordSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::from_csv(builder().from_reader(reader))
    }

    fn from_csv(reader: csv::Reader<R>) -> Self {
        Self {
            reader,
            record: csv::StringRecord::new(),
            rows_read: 0,
            exhausted: false,
        }
    }

    /// Data rows yielded so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

fn builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true);
    builder
}

impl<R: Read> Iterator for RecordSource<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                self.rows_read += 1;
                Some(Ok(RawRecord::new(
                    self.record.iter().map(str::to_string).collect(),
                )))
            },
            Ok(false) => {
                self.exhausted = true;
                None
            },
            Err(e) => {
                self.exhausted = true;
                Some(Err(e.into()))
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HEADER: &str = "Id,Name,Description,Brand,Category,Price,Currency,Stock,EAN,Color,Size,Availability,InternalID\n";

    #[test]
    fn test_header_is_skipped() {
        let data = format!(
            "{HEADER}1,Lamp,Desk lamp,Lumen,Lighting,19.99,EUR,4,123,Red,S,in_stock,INT-1\n"
        );
        let rows: Vec<_> = RecordSource::from_reader(data.as_bytes())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field(0), "1");
        assert_eq!(rows[0].field(12), "INT-1");
    }

    #[test]
    fn test_malformed_rows_are_yielded() {
        let data = format!("{HEADER}1,only,three\n2,Chair,,,,5,EUR,1,,,,,,extra\n");
        let mut source = RecordSource::from_reader(data.as_bytes());

        let short = source.next().unwrap().unwrap();
        let long = source.next().unwrap().unwrap();
        assert_eq!(short.len(), 3);
        assert_eq!(long.len(), 14);
        assert!(source.next().is_none());
        assert_eq!(source.rows_read(), 2);
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let mut source = RecordSource::from_reader(HEADER.as_bytes());
        assert!(source.next().is_none());
        assert!(source.next().is_none());
        assert_eq!(source.rows_read(), 0);
    }

    #[test]
    fn test_quoted_fields_keep_delimiters() {
        let data = format!("{HEADER}7,\"Sofa, corner\",\"Seats \"\"four\"\"\",B,C,1,EUR,2,,,,,\n");
        let row = RecordSource::from_reader(data.as_bytes())
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(row.field(1), "Sofa, corner");
        assert_eq!(row.field(2), "Seats \"four\"");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordSource::from_path(dir.path().join("missing.csv")).is_err());
    }
}
