//! Row reader traits
//!
//! A [`RowDataReader`] turns one opened file into a lazy sequence of rows.
//! Readers are single-use: the task asks its [`ReaderFactory`] for a fresh
//! one every time it opens a file.

use super::storage::FileInput;
use crate::error::ConnectorResult;
use crate::types::Row;
use async_trait::async_trait;

/// Lazy per-file row stream
///
/// `Ok(None)` signals end-of-file. Content that cannot be decoded must be
/// reported as [`ConnectorError::Malformed`](crate::error::ConnectorError::Malformed)
/// so the task can route the file to the error folder; any other error is
/// treated as fatal.
#[async_trait]
pub trait RowDataReader: Send {
    /// Read the next row
    async fn next_row(&mut self) -> ConnectorResult<Option<Row>>;
}

/// Creates a reader for each opened file
pub trait ReaderFactory: Send + Sync {
    /// Wrap an open input handle; `path` is used for error reporting
    fn create(&self, path: &str, input: FileInput) -> ConnectorResult<Box<dyn RowDataReader>>;
}

/// Reader over a fixed list of rows
///
/// Useful for embedding pre-parsed data and in tests.
#[derive(Debug, Default)]
pub struct VecRowReader {
    rows: std::collections::VecDeque<Row>,
}

impl VecRowReader {
    /// Create a reader yielding `rows` in order
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into() }
    }
}

#[async_trait]
impl RowDataReader for VecRowReader {
    async fn next_row(&mut self) -> ConnectorResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}
