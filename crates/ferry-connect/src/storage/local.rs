//! Local file system storage
//!
//! Storage paths are `/`-separated and resolved under a root directory, so
//! `/input/a.csv` with root `/var/lib/ferry` is `/var/lib/ferry/input/a.csv`.
//! Paths containing `..` are rejected.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::storage::{FileInput, FileOutput, FileType, StorageClient};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// [`StorageClient`] over a local directory tree
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a storage path to a local path
    pub fn resolve(&self, path: &str) -> ConnectorResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConnectorError::storage(
                "resolve",
                path,
                "path must stay below the storage root",
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn exists(&self, path: &str) -> ConnectorResult<bool> {
        let local = self.resolve(path)?;
        fs::try_exists(&local)
            .await
            .map_err(|e| ConnectorError::from_io("exists", path, e))
    }

    async fn list_file_names(
        &self,
        dir: &str,
    ) -> ConnectorResult<BoxStream<'static, ConnectorResult<String>>> {
        let local = self.resolve(dir)?;
        let entries = fs::read_dir(&local)
            .await
            .map_err(|e| ConnectorError::from_io("list", dir, e))?;
        let dir = dir.to_string();

        let names = stream::unfold(Some(entries), move |state| {
            let dir = dir.clone();
            async move {
                let mut entries = state?;
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => match entry.file_name().into_string() {
                            Ok(name) => return Some((Ok(name), Some(entries))),
                            Err(raw) => {
                                warn!(dir = %dir, name = ?raw, "Skipping non UTF-8 file name");
                            }
                        },
                        Ok(None) => return None,
                        Err(e) => return Some((Err(ConnectorError::from_io("list", dir, e)), None)),
                    }
                }
            }
        });
        Ok(names.boxed())
    }

    async fn file_type(&self, path: &str) -> ConnectorResult<FileType> {
        let local = self.resolve(path)?;
        let metadata = fs::metadata(&local)
            .await
            .map_err(|e| ConnectorError::from_io("file_type", path, e))?;
        Ok(if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        })
    }

    async fn open(&self, path: &str) -> ConnectorResult<FileInput> {
        let local = self.resolve(path)?;
        let file = fs::File::open(&local)
            .await
            .map_err(|e| ConnectorError::from_io("open", path, e))?;
        Ok(Box::new(file))
    }

    async fn create(&self, path: &str) -> ConnectorResult<FileOutput> {
        let local = self.resolve(path)?;
        let file = fs::File::create(&local)
            .await
            .map_err(|e| ConnectorError::from_io("create", path, e))?;
        Ok(Box::new(file))
    }

    async fn append(&self, path: &str) -> ConnectorResult<FileOutput> {
        let local = self.resolve(path)?;
        let file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&local)
            .await
            .map_err(|e| ConnectorError::from_io("append", path, e))?;
        Ok(Box::new(file))
    }

    async fn delete(&self, path: &str, recursive: bool) -> ConnectorResult<()> {
        let local = self.resolve(path)?;
        let metadata = fs::metadata(&local)
            .await
            .map_err(|e| ConnectorError::from_io("delete", path, e))?;

        let result = if !metadata.is_dir() {
            fs::remove_file(&local).await
        } else if recursive {
            fs::remove_dir_all(&local).await
        } else {
            fs::remove_dir(&local).await
        };
        result.map_err(|e| ConnectorError::from_io("delete", path, e))
    }

    async fn move_file(&self, source: &str, target: &str) -> ConnectorResult<bool> {
        let from = self.resolve(source)?;
        let to = self.resolve(target)?;

        if !self.exists(source).await? {
            return Ok(false);
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConnectorError::from_io("move", target, e))?;
        }

        match fs::rename(&from, &to).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConnectorError::storage(
                "move",
                source,
                format!("to '{}': {}", target, e),
            )),
        }
    }

    async fn mkdirs(&self, dir: &str) -> ConnectorResult<()> {
        let local = self.resolve(dir)?;
        fs::create_dir_all(&local)
            .await
            .map_err(|e| ConnectorError::from_io("mkdirs", dir, e))
    }

    async fn close(&self) -> ConnectorResult<()> {
        debug!(root = %self.root.display(), "Closing local storage");
        Ok(())
    }
}
