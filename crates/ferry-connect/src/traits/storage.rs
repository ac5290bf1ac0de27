//! Storage capability trait
//!
//! The task never talks to a concrete file system. Everything it needs from
//! storage goes through [`StorageClient`], addressed by `/`-separated paths.
//!
//! Implementations must report a vanished path as
//! [`ConnectorError::NotFound`](crate::error::ConnectorError::NotFound) from
//! `file_type` and `open`; the task relies on that to tell listing races apart
//! from real failures.

use crate::error::ConnectorResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Readable handle returned by [`StorageClient::open`]
pub type FileInput = Box<dyn AsyncRead + Send + Unpin>;

/// Writable handle returned by [`StorageClient::create`] and [`StorageClient::append`]
pub type FileOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// Kind of entry found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Path-addressed storage operations consumed by the file source task
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Whether anything exists at `path`
    async fn exists(&self, path: &str) -> ConnectorResult<bool>;

    /// Lazily list the entry names (not full paths) directly under `dir`
    async fn list_file_names(
        &self,
        dir: &str,
    ) -> ConnectorResult<BoxStream<'static, ConnectorResult<String>>>;

    /// Classify `path`; fails with `NotFound` if it vanished
    async fn file_type(&self, path: &str) -> ConnectorResult<FileType>;

    /// Open `path` for reading; fails with `NotFound` if it vanished
    async fn open(&self, path: &str) -> ConnectorResult<FileInput>;

    /// Create (or truncate) `path` for writing
    async fn create(&self, path: &str) -> ConnectorResult<FileOutput>;

    /// Open `path` for appending, creating it if needed
    async fn append(&self, path: &str) -> ConnectorResult<FileOutput>;

    /// Delete `path`; directories need `recursive` unless empty
    async fn delete(&self, path: &str, recursive: bool) -> ConnectorResult<()>;

    /// Move `source` to `target`; `Ok(false)` when the source is gone
    async fn move_file(&self, source: &str, target: &str) -> ConnectorResult<bool>;

    /// Create `dir` and any missing parents
    async fn mkdirs(&self, dir: &str) -> ConnectorResult<()>;

    /// Release any resources held by the client
    async fn close(&self) -> ConnectorResult<()>;
}

/// Join a folder and an entry name with exactly one separator
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Final component of a `/`-separated path
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/input", "a.csv"), "/input/a.csv");
        assert_eq!(join_path("/input/", "a.csv"), "/input/a.csv");
        assert_eq!(join_path("/input", "/a.csv"), "/input/a.csv");
        assert_eq!(join_path("/", "a.csv"), "/a.csv");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/input/a.csv"), "a.csv");
        assert_eq!(file_name("a.csv"), "a.csv");
        assert_eq!(file_name("/input/dir/"), "dir");
    }
}
