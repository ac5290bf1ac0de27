//! Testing utilities for file sources
//!
//! [`InMemoryStorage`] is a [`StorageClient`] backed by a map, with failure
//! injection for the calls whose errors the task has to classify.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_connect::testing::*;
//!
//! #[tokio::test]
//! async fn test_vanishing_file() {
//!     let storage = Arc::new(
//!         InMemoryStorage::new()
//!             .with_file("/input/a.csv", "id\n1\n")
//!             .with_file_type_failure(FailureMode::NotFound),
//!     );
//!     let mut task = FileSourceTask::start(config, storage, readers).await.unwrap();
//!     assert!(task.poll().await.unwrap().is_empty());
//! }
//! ```

use super::storage::{FileInput, FileOutput, FileType, StorageClient};
use crate::error::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Injected failure for a storage call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Report every path as vanished
    NotFound,
    /// Fail with an unclassified storage error carrying this message
    Other(String),
}

impl FailureMode {
    fn to_error(&self, op: &'static str, path: &str) -> ConnectorError {
        match self {
            Self::NotFound => ConnectorError::not_found(path),
            Self::Other(message) => ConnectorError::storage(op, path, message),
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Entries {
    fn add_dirs(&mut self, dir: &str) {
        let mut current = Some(normalize(dir));
        while let Some(dir) = current {
            current = parent(&dir);
            self.dirs.insert(dir);
        }
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }
}

/// Map-backed storage for tests
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: Arc<Mutex<Entries>>,
    file_type_failure: Mutex<Option<FailureMode>>,
    open_failure: Mutex<Option<FailureMode>>,
    calls: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl InMemoryStorage {
    /// Create an empty storage containing only the root folder
    pub fn new() -> Self {
        let storage = Self::default();
        storage.entries.lock().add_dirs("/");
        storage
    }

    /// Add a file, creating its parent folders
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.put_file(path, content);
        self
    }

    /// Make every `file_type` call fail
    pub fn with_file_type_failure(self, mode: FailureMode) -> Self {
        *self.file_type_failure.lock() = Some(mode);
        self
    }

    /// Make every `open` call fail
    pub fn with_open_failure(self, mode: FailureMode) -> Self {
        *self.open_failure.lock() = Some(mode);
        self
    }

    /// Add or replace a file, creating its parent folders
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let path = normalize(path);
        let mut entries = self.entries.lock();
        if let Some(dir) = parent(&path) {
            entries.add_dirs(&dir);
        }
        entries.files.insert(path, content.into());
    }

    /// Remove a file behind the task's back
    pub fn remove_file(&self, path: &str) -> bool {
        self.entries.lock().files.remove(&normalize(path)).is_some()
    }

    /// Content of a file
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.lock().files.get(&normalize(path)).cloned()
    }

    /// All file paths in sorted order
    pub fn file_paths(&self) -> Vec<String> {
        self.entries.lock().files.keys().cloned().collect()
    }

    /// Log of storage calls as `"<op> <path>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().push(format!("{} {}", op, path));
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn exists(&self, path: &str) -> ConnectorResult<bool> {
        self.record("exists", path);
        let path = normalize(path);
        let entries = self.entries.lock();
        Ok(entries.files.contains_key(&path) || entries.is_dir(&path))
    }

    async fn list_file_names(
        &self,
        dir: &str,
    ) -> ConnectorResult<BoxStream<'static, ConnectorResult<String>>> {
        self.record("list", dir);
        let dir = normalize(dir);
        let entries = self.entries.lock();
        if !entries.is_dir(&dir) {
            return Err(ConnectorError::not_found(dir));
        }

        let names: Vec<String> = entries
            .files
            .keys()
            .chain(entries.dirs.iter())
            .filter(|p| parent(p).as_deref() == Some(dir.as_str()))
            .map(|p| super::storage::file_name(p).to_string())
            .collect();
        Ok(stream::iter(names.into_iter().map(Ok)).boxed())
    }

    async fn file_type(&self, path: &str) -> ConnectorResult<FileType> {
        self.record("file_type", path);
        if let Some(mode) = self.file_type_failure.lock().as_ref() {
            return Err(mode.to_error("file_type", path));
        }

        let normalized = normalize(path);
        let entries = self.entries.lock();
        if entries.files.contains_key(&normalized) {
            Ok(FileType::File)
        } else if entries.is_dir(&normalized) {
            Ok(FileType::Directory)
        } else {
            Err(ConnectorError::not_found(path))
        }
    }

    async fn open(&self, path: &str) -> ConnectorResult<FileInput> {
        self.record("open", path);
        if let Some(mode) = self.open_failure.lock().as_ref() {
            return Err(mode.to_error("open", path));
        }

        let normalized = normalize(path);
        let entries = self.entries.lock();
        match entries.files.get(&normalized) {
            Some(content) => Ok(Box::new(Cursor::new(content.clone()))),
            None if entries.is_dir(&normalized) => {
                Err(ConnectorError::storage("open", path, "is a directory"))
            }
            None => Err(ConnectorError::not_found(path)),
        }
    }

    async fn create(&self, path: &str) -> ConnectorResult<FileOutput> {
        self.record("create", path);
        self.put_file(path, Vec::new());
        Ok(Box::new(MemoryWriter::new(path, Arc::clone(&self.entries))))
    }

    async fn append(&self, path: &str) -> ConnectorResult<FileOutput> {
        self.record("append", path);
        if self.read(path).is_none() {
            self.put_file(path, Vec::new());
        }
        Ok(Box::new(MemoryWriter::new(path, Arc::clone(&self.entries))))
    }

    async fn delete(&self, path: &str, recursive: bool) -> ConnectorResult<()> {
        self.record("delete", path);
        let normalized = normalize(path);
        let mut entries = self.entries.lock();

        if entries.files.remove(&normalized).is_some() {
            return Ok(());
        }
        if !entries.is_dir(&normalized) {
            return Err(ConnectorError::not_found(path));
        }

        let prefix = format!("{}/", normalized.trim_end_matches('/'));
        let has_children = entries.files.keys().any(|p| p.starts_with(&prefix))
            || entries.dirs.iter().any(|p| p.starts_with(&prefix));
        if has_children && !recursive {
            return Err(ConnectorError::storage("delete", path, "directory not empty"));
        }

        entries.files.retain(|p, _| !p.starts_with(&prefix));
        entries.dirs.retain(|p| !p.starts_with(&prefix) && *p != normalized);
        Ok(())
    }

    async fn move_file(&self, source: &str, target: &str) -> ConnectorResult<bool> {
        self.record("move", source);
        let source = normalize(source);
        let target = normalize(target);
        let mut entries = self.entries.lock();

        let Some(content) = entries.files.remove(&source) else {
            return Ok(false);
        };
        if let Some(dir) = parent(&target) {
            entries.add_dirs(&dir);
        }
        entries.files.insert(target, content);
        Ok(true)
    }

    async fn mkdirs(&self, dir: &str) -> ConnectorResult<()> {
        self.record("mkdirs", dir);
        let mut entries = self.entries.lock();
        if entries.files.contains_key(&normalize(dir)) {
            return Err(ConnectorError::storage("mkdirs", dir, "a file exists at this path"));
        }
        entries.add_dirs(dir);
        Ok(())
    }

    async fn close(&self) -> ConnectorResult<()> {
        self.record("close", "");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Writer appending straight into the storage map
struct MemoryWriter {
    path: String,
    entries: Arc<Mutex<Entries>>,
}

impl MemoryWriter {
    fn new(path: &str, entries: Arc<Mutex<Entries>>) -> Self {
        Self {
            path: normalize(path),
            entries,
        }
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let mut entries = self.entries.lock();
        entries
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

fn parent(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let (head, _) = path.rsplit_once('/')?;
    Some(if head.is_empty() { "/".to_string() } else { head.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn list(storage: &InMemoryStorage, dir: &str) -> Vec<String> {
        let stream = storage.list_file_names(dir).await.unwrap();
        stream.map(|r| r.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_listing_is_direct_children_only() {
        let storage = InMemoryStorage::new()
            .with_file("/input/a.csv", "x")
            .with_file("/input/nested/b.csv", "y");

        let mut names = list(&storage, "/input").await;
        names.sort();
        assert_eq!(names, vec!["a.csv", "nested"]);
        assert!(storage.list_file_names("/missing").await.is_err());
    }

    #[tokio::test]
    async fn test_file_type_and_open() {
        let storage = InMemoryStorage::new().with_file("/input/a.csv", "hello");
        assert_eq!(storage.file_type("/input/a.csv").await.unwrap(), FileType::File);
        assert_eq!(storage.file_type("/input").await.unwrap(), FileType::Directory);
        assert!(storage.file_type("/input/b.csv").await.unwrap_err().is_not_found());

        let mut input = storage.open("/input/a.csv").await.unwrap();
        let mut content = String::new();
        input.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let storage = InMemoryStorage::new()
            .with_file("/input/a.csv", "x")
            .with_open_failure(FailureMode::Other("boom".into()));
        let err = storage.open("/input/a.csv").await.err().unwrap();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_create_append_and_move() {
        let storage = InMemoryStorage::new();
        let mut out = storage.create("/out/a.txt").await.unwrap();
        out.write_all(b"ab").await.unwrap();
        let mut out = storage.append("/out/a.txt").await.unwrap();
        out.write_all(b"cd").await.unwrap();
        assert_eq!(storage.read("/out/a.txt").unwrap(), b"abcd");

        assert!(storage.move_file("/out/a.txt", "/done/a.txt").await.unwrap());
        assert!(!storage.move_file("/out/a.txt", "/done/a.txt").await.unwrap());
        assert!(storage.exists("/done").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_directory_requires_recursive() {
        let storage = InMemoryStorage::new().with_file("/d/a", "x");
        assert!(storage.delete("/d", false).await.is_err());
        storage.delete("/d", true).await.unwrap();
        assert!(!storage.exists("/d").await.unwrap());
        assert!(!storage.exists("/d/a").await.unwrap());
        assert!(storage.delete("/d", true).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_call_log_and_close() {
        let storage = InMemoryStorage::new();
        storage.mkdirs("/a/b").await.unwrap();
        storage.close().await.unwrap();
        assert_eq!(storage.calls(), vec!["mkdirs /a/b", "close "]);
        assert!(storage.is_closed());
    }
}
