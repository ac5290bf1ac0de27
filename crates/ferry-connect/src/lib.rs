//! ferry-connect - File source connector core
//!
//! This crate turns the files of a shared input folder into records for a
//! message-bus topic. Several task instances split the folder between them by
//! hashing file names, and a file is moved out of the input folder only after
//! every record read from it has been committed by the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ferry-connect (Runtime)                      │
//! │  FileSourceRunner: poll → RecordSink → commit                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    FileSourceTask                               │
//! │  ├── FileQueue + TaskPartitioner (which files, in what order)   │
//! │  ├── RowDataReader (CSV)                                        │
//! │  └── RecordCache (what is still uncommitted)                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    StorageClient                                │
//! │  └── LocalStorage, InMemoryStorage                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Library Usage
//!
//! ```rust,ignore
//! use ferry_connect::prelude::*;
//!
//! let config = FileSourceConfig::new("rows", "/input", "/error", 1, 0)
//!     .with_completed_folder("/completed");
//! let storage = Arc::new(LocalStorage::new("/var/lib/ferry"));
//! let readers = Arc::new(CsvReaderFactory::default());
//!
//! let mut task = FileSourceTask::start(config, storage, readers).await?;
//! loop {
//!     for record in task.poll().await? {
//!         deliver(&record).await?;
//!         task.commit_record(&record);
//!     }
//! }
//! ```
//!
//! # CLI Usage (Binary)
//!
//! ```bash
//! # Run the task described by a config file
//! ferry-connect -c ferry.yaml
//!
//! # Validate configuration
//! ferry-connect -c ferry.yaml validate
//!
//! # Print the connector definition
//! ferry-connect definition
//! ```

// Core traits
pub mod traits;

// Row and cell types
pub mod types;

// Error types
pub mod error;

// Ingestion core
pub mod cache;
pub mod definition;
pub mod partitioner;
pub mod queue;
pub mod task;

// Runtime modules
pub mod config;
pub mod source_runner;
pub mod storage;

// Row decoders (CSV)
pub mod format;

pub use traits::testing;

// Re-export core types at crate root for ergonomic use
pub use cache::{FileOutcome, RecordCache};
pub use definition::{Definition, SettingDef, SettingType};
pub use partitioner::TaskPartitioner;
pub use queue::FileQueue;
pub use task::{FileSourceTask, RecordCommitter, TaskState};
pub use traits::{
    FileType, OffsetReader, ReaderFactory, RecordKey, RowDataReader, SourceMap, SourceRecord,
    SourceRecordBuilder, StorageClient,
};
pub use types::{Cell, Row};

// Re-export error types
pub use error::{ConnectError, ConnectorError, ConnectorResult, ConnectorStatus, Result};

// Re-export config types
pub use config::{ConnectConfig, FileSourceConfig};

// Re-export runtime types
pub use source_runner::{FileSourceRunner, RecordSink, StdoutSink};
pub use storage::LocalStorage;

// Re-export commonly used dependencies for reader and storage implementations
pub use async_trait::async_trait;
pub use futures::stream::BoxStream;

/// Everything needed to embed a file source task
pub mod prelude {
    pub use crate::config::FileSourceConfig;
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::format::CsvReaderFactory;
    pub use crate::storage::LocalStorage;
    pub use crate::task::{FileSourceTask, RecordCommitter};
    pub use crate::traits::{
        FileInput, FileType, OffsetReader, ReaderFactory, RowDataReader, SourceMap,
        SourceRecord, StorageClient,
    };
    pub use crate::types::{Cell, Row};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
