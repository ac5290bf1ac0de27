//! Core connector traits and types
//!
//! This module provides the building blocks the file source task is wired from:
//! - `StorageClient` - List, classify, open and move files on a storage
//! - `RowDataReader` / `ReaderFactory` - Decode an opened file into rows
//! - `OffsetReader` - Look up offsets committed by a previous run
//! - `SourceRecord` - An immutable row on its way to a topic
//! - `testing` - In-memory storage with failure injection
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_connect::prelude::*;
//!
//! pub struct LinesReader { /* ... */ }
//!
//! #[async_trait]
//! impl RowDataReader for LinesReader {
//!     async fn next_row(&mut self) -> ConnectorResult<Option<Row>> {
//!         // ...
//!     }
//! }
//! ```

pub mod offset;
pub mod reader;
pub mod record;
pub mod storage;
pub mod testing;

// Re-export record types
pub use record::{RecordKey, SourceMap, SourceRecord, SourceRecordBuilder};

// Re-export storage types
pub use storage::{FileInput, FileOutput, FileType, StorageClient};

// Re-export reader types
pub use reader::{ReaderFactory, RowDataReader, VecRowReader};

// Re-export offset types
pub use offset::{MemoryOffsetReader, OffsetReader, OFFSET_KEY, PATH_KEY};

// Re-export testing utilities
pub use testing::{FailureMode, InMemoryStorage};
