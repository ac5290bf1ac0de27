//! File source task
//!
//! [`FileSourceTask`] turns the files of one input folder into
//! [`SourceRecord`]s, one row at a time, and moves each file out of the input
//! folder once every record read from it has been committed by the host.
//!
//! ## Poll cycle
//!
//! 1. Files that are exhausted and fully committed are moved to the completed
//!    folder (or deleted) or to the error folder.
//! 2. When idle, the next owned path is taken from the [`FileQueue`],
//!    refilling it from a listing of the input folder when it ran dry.
//! 3. The path is classified and opened. A path that vanished in the meantime
//!    is skipped for this cycle; any other storage failure is fatal.
//! 4. Up to `batch_size` rows are read and returned as records.
//!
//! A file stays claimed by the queue from the moment it is taken until it has
//! been moved, so it is never read twice by the same task.

use crate::cache::{FileOutcome, RecordCache};
use crate::config::FileSourceConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::queue::FileQueue;
use crate::traits::offset::{row_offset, OffsetReader, OFFSET_KEY, PATH_KEY};
use crate::traits::reader::{ReaderFactory, RowDataReader};
use crate::traits::record::{RecordKey, SourceMap, SourceRecord};
use crate::traits::storage::{file_name, join_path, FileType, StorageClient};
use metrics::counter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`FileSourceTask`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No file open; the next poll takes a new path
    Idle,
    /// A file is open and rows remain
    Reading,
    /// `stop` was called
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Reading => write!(f, "reading"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Cloneable handle for committing records from another task or thread
#[derive(Debug, Clone)]
pub struct RecordCommitter {
    cache: Arc<RecordCache>,
}

impl RecordCommitter {
    /// Confirm that `record` has been durably accepted
    pub fn commit(&self, record: &SourceRecord) -> bool {
        self.commit_key(&record.key())
    }

    /// Confirm a record by key
    pub fn commit_key(&self, key: &RecordKey) -> bool {
        let removed = self.cache.commit(key);
        if removed {
            counter!("file_source.records.committed").increment(1);
        } else {
            debug!(key = %key, "Commit for untracked record ignored");
        }
        removed
    }

    /// Records awaiting commit
    pub fn pending(&self) -> usize {
        self.cache.size()
    }
}

struct OpenFile {
    path: String,
    partition: SourceMap,
    reader: Box<dyn RowDataReader>,
    next_offset: u64,
    resume_after: Option<u64>,
}

/// Ingestion task for one slot of a partitioned input folder
pub struct FileSourceTask {
    config: FileSourceConfig,
    storage: Arc<dyn StorageClient>,
    readers: Arc<dyn ReaderFactory>,
    offsets: Option<Arc<dyn OffsetReader>>,
    queue: FileQueue,
    cache: Arc<RecordCache>,
    current: Option<OpenFile>,
    state: TaskState,
}

impl fmt::Debug for FileSourceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSourceTask")
            .field("input_folder", &self.config.input_folder)
            .field("state", &self.state)
            .field("queued", &self.queue.size())
            .field("pending", &self.cache.size())
            .field("current", &self.current.as_ref().map(|f| f.path.as_str()))
            .finish()
    }
}

impl FileSourceTask {
    /// Validate `config`, create missing output folders and return an idle task
    pub async fn start(
        config: FileSourceConfig,
        storage: Arc<dyn StorageClient>,
        readers: Arc<dyn ReaderFactory>,
    ) -> ConnectorResult<Self> {
        config.check()?;

        if config.task_hash >= config.task_total {
            warn!(
                task_hash = config.task_hash,
                task_total = config.task_total,
                "task_hash is not below task_total; using it modulo task_total"
            );
        }

        for folder in config.output_folders() {
            if !storage.exists(folder).await? {
                info!(folder = %folder, "Creating output folder");
                storage.mkdirs(folder).await?;
            }
        }

        let queue = FileQueue::new(
            config.input_folder.clone(),
            config.file_cache_size,
            config.partitioner(),
        );

        info!(
            "File source task {}/{} started on '{}', publishing to topic: {}",
            config.task_hash % config.task_total,
            config.task_total,
            config.input_folder,
            config.topic
        );

        Ok(Self {
            config,
            storage,
            readers,
            offsets: None,
            queue,
            cache: Arc::new(RecordCache::new()),
            current: None,
            state: TaskState::Idle,
        })
    }

    /// Resolve a host settings map and start
    pub async fn start_with_settings(
        settings: &HashMap<String, String>,
        storage: Arc<dyn StorageClient>,
        readers: Arc<dyn ReaderFactory>,
    ) -> ConnectorResult<Self> {
        let config = FileSourceConfig::from_settings(settings)?;
        Self::start(config, storage, readers).await
    }

    /// Skip rows already committed in a previous run when reopening a file
    pub fn with_offset_reader(mut self, offsets: Arc<dyn OffsetReader>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// Run one poll cycle; an empty batch means there was nothing to emit
    pub async fn poll(&mut self) -> ConnectorResult<Vec<SourceRecord>> {
        if self.state == TaskState::Stopped {
            return Err(ConnectorError::State("poll called on a stopped task".into()));
        }

        self.flush_files().await?;

        if self.current.is_none() {
            let Some(path) = self.next_path().await? else {
                return Ok(Vec::new());
            };
            if !self.open_file(path).await? {
                return Ok(Vec::new());
            }
        }

        self.read_batch().await
    }

    /// Confirm that `record` has been durably accepted
    pub fn commit_record(&self, record: &SourceRecord) -> bool {
        self.committer().commit(record)
    }

    /// Handle for committing from elsewhere
    pub fn committer(&self) -> RecordCommitter {
        RecordCommitter {
            cache: Arc::clone(&self.cache),
        }
    }

    /// Drop the open reader, forget pending records and close the storage
    pub async fn stop(&mut self) -> ConnectorResult<()> {
        if self.state == TaskState::Stopped {
            return Ok(());
        }

        if let Some(file) = self.current.take() {
            debug!(path = %file.path, "Closing reader on stop");
        }
        let pending = self.cache.size();
        self.cache.clear();
        self.queue.clear();
        self.state = TaskState::Stopped;

        info!(pending, "File source task stopped");
        self.storage.close().await
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of queued file paths
    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    /// Number of records awaiting commit
    pub fn pending_records(&self) -> usize {
        self.cache.size()
    }

    /// Path of the file being read, if any
    pub fn current_file(&self) -> Option<&str> {
        self.current.as_ref().map(|f| f.path.as_str())
    }

    /// Resolved configuration
    pub fn config(&self) -> &FileSourceConfig {
        &self.config
    }

    async fn next_path(&mut self) -> ConnectorResult<Option<String>> {
        if self.queue.is_empty() {
            let listing = match self.storage.list_file_names(&self.config.input_folder).await {
                Ok(listing) => listing,
                Err(e) if e.is_not_found() => {
                    warn!(folder = %self.config.input_folder, "Input folder does not exist");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            let accepted = self.queue.refill_stream(listing).await?;
            debug!(
                folder = %self.config.input_folder,
                accepted,
                "Refilled file queue"
            );
        }
        Ok(self.queue.next())
    }

    /// Returns `false` when the path was skipped
    async fn open_file(&mut self, path: String) -> ConnectorResult<bool> {
        match self.storage.file_type(&path).await {
            Ok(FileType::File) => {}
            Ok(FileType::Directory) => {
                debug!(path = %path, "Skipping directory");
                self.skip(&path);
                return Ok(false);
            }
            Err(e) if e.is_not_found() => {
                warn!(path = %path, "File vanished before it could be read");
                self.skip(&path);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let input = match self.storage.open(&path).await {
            Ok(input) => input,
            Err(e) if e.is_not_found() => {
                warn!(path = %path, "File vanished before it could be opened");
                self.skip(&path);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let reader = self.readers.create(&path, input)?;
        let partition = SourceMap::from([(PATH_KEY.to_string(), path.clone())]);
        let resume_after = match &self.offsets {
            Some(offsets) => offsets
                .committed_offset(&partition)
                .await
                .as_ref()
                .and_then(row_offset),
            None => None,
        };

        debug!(path = %path, ?resume_after, "Reading file");
        self.current = Some(OpenFile {
            path,
            partition,
            reader,
            next_offset: 0,
            resume_after,
        });
        self.state = TaskState::Reading;
        Ok(true)
    }

    async fn read_batch(&mut self) -> ConnectorResult<Vec<SourceRecord>> {
        let Some(file) = self.current.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::with_capacity(self.config.batch_size.min(1024));
        let mut outcome = None;
        while batch.len() < self.config.batch_size {
            match file.reader.next_row().await {
                Ok(Some(row)) => {
                    let offset = file.next_offset;
                    file.next_offset += 1;
                    if file.resume_after.is_some_and(|committed| offset <= committed) {
                        continue;
                    }

                    let record = SourceRecord::builder()
                        .topic_name(self.config.topic.as_str())
                        .row(row)
                        .source_partition(file.partition.clone())
                        .source_offset(SourceMap::from([(
                            OFFSET_KEY.to_string(),
                            offset.to_string(),
                        )]))
                        .build()?;
                    batch.push(record);
                }
                Ok(None) => {
                    outcome = Some(FileOutcome::Completed);
                    break;
                }
                Err(e) if e.is_malformed() => {
                    warn!(path = %file.path, error = %e, "Malformed file, routing to error folder");
                    outcome = Some(FileOutcome::Failed);
                    break;
                }
                Err(e) => {
                    // Rows read in this cycle were never handed out.
                    let path = file.path.clone();
                    self.current = None;
                    self.state = TaskState::Idle;
                    self.queue.release(&path);
                    warn!(path = %path, dropped = batch.len(), error = %e, "Read failed, closing file");
                    return Err(e);
                }
            }
        }

        for record in &batch {
            self.cache.put(record);
        }
        counter!("file_source.records.polled").increment(batch.len() as u64);

        if let Some(outcome) = outcome {
            if let Some(file) = self.current.take() {
                self.state = TaskState::Idle;
                debug!(path = %file.path, %outcome, rows = file.next_offset, "Finished reading file");
                self.cache.mark_exhausted(&file.path, outcome);
                if let Some(outcome) = self.cache.take_flushed(&file.path) {
                    self.finish_file(&file.path, outcome).await?;
                }
            }
        }

        Ok(batch)
    }

    async fn flush_files(&mut self) -> ConnectorResult<()> {
        for (path, outcome) in self.cache.drain_flushed() {
            self.finish_file(&path, outcome).await?;
        }
        Ok(())
    }

    async fn finish_file(&mut self, path: &str, outcome: FileOutcome) -> ConnectorResult<()> {
        match (outcome, &self.config.completed_folder) {
            (FileOutcome::Completed, Some(folder)) => {
                let target = join_path(folder, file_name(path));
                move_file(self.storage.as_ref(), path, &target).await?;
                counter!("file_source.files.completed").increment(1);
            }
            (FileOutcome::Completed, None) => {
                match self.storage.delete(path, false).await {
                    Ok(()) => info!(path = %path, "Deleted completed file"),
                    Err(e) if e.is_not_found() => {
                        warn!(path = %path, "Completed file already gone")
                    }
                    Err(e) => return Err(e),
                }
                counter!("file_source.files.completed").increment(1);
            }
            (FileOutcome::Failed, _) => {
                let target = join_path(&self.config.error_folder, file_name(path));
                move_file(self.storage.as_ref(), path, &target).await?;
                counter!("file_source.files.failed").increment(1);
            }
        }
        self.queue.release(path);
        Ok(())
    }

    fn skip(&mut self, path: &str) {
        counter!("file_source.files.skipped").increment(1);
        self.queue.release(path);
    }
}

async fn move_file(
    storage: &dyn StorageClient,
    path: &str,
    target: &str,
) -> ConnectorResult<()> {
    if storage.move_file(path, target).await? {
        info!(path = %path, target = %target, "Moved file");
    } else {
        warn!(path = %path, target = %target, "File vanished before it could be moved");
    }
    Ok(())
}
