//! CSV row reader
//!
//! Decodes delimited text into [`Row`]s using `csv-async` on top of the
//! storage input handle. The first record is the header; every later record
//! becomes one row whose cells are named after the header columns.
//!
//! # Failure classification
//!
//! - Records whose field count differs from the header and invalid UTF-8 are
//!   reported as [`ConnectorError::Malformed`]. The file is routed to the error
//!   folder.
//! - I/O failures of the underlying handle are reported as
//!   [`ConnectorError::Storage`] and stop the task.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_connect::format::csv::CsvReaderFactory;
//!
//! let factory = CsvReaderFactory::new(b';');
//! let mut reader = factory.create("/input/a.csv", storage.open("/input/a.csv").await?)?;
//! while let Some(row) = reader.next_row().await? {
//!     println!("{}", row);
//! }
//! ```

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::reader::{ReaderFactory, RowDataReader};
use crate::traits::storage::FileInput;
use crate::types::{Cell, Row};
use async_trait::async_trait;
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};

/// Default field delimiter
pub const DEFAULT_DELIMITER: u8 = b',';

/// Builds [`CsvDataReader`]s with a fixed delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvReaderFactory {
    delimiter: u8,
}

impl CsvReaderFactory {
    /// Create a factory for the given field delimiter
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Configured field delimiter
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl Default for CsvReaderFactory {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl ReaderFactory for CsvReaderFactory {
    fn create(&self, path: &str, input: FileInput) -> ConnectorResult<Box<dyn RowDataReader>> {
        Ok(Box::new(CsvDataReader::new(path, input, self.delimiter)))
    }
}

/// Header-driven CSV reader over one file
pub struct CsvDataReader {
    path: String,
    reader: AsyncReader<FileInput>,
    header: Option<Vec<String>>,
    record: StringRecord,
}

impl CsvDataReader {
    /// Wrap `input`; `path` is only used for error reporting
    pub fn new(path: impl Into<String>, input: FileInput, delimiter: u8) -> Self {
        let reader = AsyncReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(false)
            .create_reader(input);

        Self {
            path: path.into(),
            reader,
            header: None,
            record: StringRecord::new(),
        }
    }

    /// Column names, once the header has been read
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    async fn read_record(&mut self) -> ConnectorResult<bool> {
        self.reader
            .read_record(&mut self.record)
            .await
            .map_err(|e| classify(&self.path, e))
    }
}

#[async_trait]
impl RowDataReader for CsvDataReader {
    async fn next_row(&mut self) -> ConnectorResult<Option<Row>> {
        if self.header.is_none() {
            if !self.read_record().await? {
                return Ok(None);
            }
            self.header = Some(self.record.iter().map(str::to_string).collect());
        }

        if !self.read_record().await? {
            return Ok(None);
        }

        let Some(header) = self.header.as_ref() else {
            return Ok(None);
        };
        let cells = header
            .iter()
            .zip(self.record.iter())
            .map(|(name, value)| Cell::new(name.as_str(), value))
            .collect();
        Ok(Some(Row::of(cells)))
    }
}

fn classify(path: &str, err: csv_async::Error) -> ConnectorError {
    match err.kind() {
        csv_async::ErrorKind::Io(io) => ConnectorError::storage("read", path, io),
        _ => ConnectorError::malformed(path, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(content: &str, delimiter: u8) -> Box<dyn RowDataReader> {
        let input: FileInput = Box::new(Cursor::new(content.as_bytes().to_vec()));
        CsvReaderFactory::new(delimiter)
            .create("/input/test.csv", input)
            .unwrap()
    }

    async fn read_all(reader: &mut Box<dyn RowDataReader>) -> ConnectorResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    #[tokio::test]
    async fn test_reads_rows_with_header_names() {
        let mut r = reader("id,name\n1,alice\n2,bob\n", b',');
        let rows = read_all(&mut r).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Row::from_pairs([("id", "1"), ("name", "alice")]));
        assert_eq!(rows[1].get("name"), Some(&serde_json::json!("bob")));
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let mut r = reader("a;b\nx;y\n", b';');
        let rows = read_all(&mut r).await.unwrap();
        assert_eq!(rows, vec![Row::from_pairs([("a", "x"), ("b", "y")])]);
    }

    #[tokio::test]
    async fn test_empty_file_and_header_only() {
        let mut empty = reader("", b',');
        assert!(empty.next_row().await.unwrap().is_none());

        let mut header_only = reader("id,name\n", b',');
        assert!(header_only.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quoted_fields() {
        let mut r = reader("id,text\n1,\"hello, world\"\n", b',');
        let rows = read_all(&mut r).await.unwrap();
        assert_eq!(rows[0].get("text"), Some(&serde_json::json!("hello, world")));
    }

    #[tokio::test]
    async fn test_unequal_lengths_are_malformed() {
        let mut r = reader("id,name\n1,alice\n2\n", b',');
        assert!(r.next_row().await.unwrap().is_some());
        let err = r.next_row().await.unwrap_err();
        assert!(err.is_malformed(), "unexpected error: {err}");
        assert!(err.to_string().contains("/input/test.csv"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let mut bytes = b"id\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let input: FileInput = Box::new(Cursor::new(bytes));
        let mut r = CsvReaderFactory::default()
            .create("/input/bin.csv", input)
            .unwrap();
        assert!(r.next_row().await.unwrap_err().is_malformed());
    }
}
