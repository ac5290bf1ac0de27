//! Source runner - drives a file source task and delivers its records
//!
//! Features:
//! - Poll, deliver, commit loop with an idle back-off
//! - Delivery retries with exponential backoff
//! - Status tracking
//! - Graceful shutdown support

use crate::config::{ConnectConfig, RunnerConfig};
use crate::error::{ConnectError, ConnectorStatus, Result};
use crate::format::CsvReaderFactory;
use crate::storage;
use crate::task::FileSourceTask;
use crate::traits::record::SourceRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

const INITIAL_RETRY_BACKOFF_MS: u64 = 100;
const MAX_RETRY_BACKOFF_MS: u64 = 30_000;

/// Destination for polled records
///
/// `publish` returns once the whole batch is durably accepted. The runner
/// commits the batch only after a successful return.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Deliver a batch of records
    async fn publish(&self, records: &[SourceRecord]) -> Result<()>;
}

/// Writes each record as one JSON line
pub struct StdoutSink {
    name: String,
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl StdoutSink {
    /// Sink writing to standard output
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, Box::new(tokio::io::stdout()))
    }

    /// Sink writing to an arbitrary writer
    pub fn with_writer(name: impl Into<String>, out: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
        }
    }

    fn encode(&self, records: &[SourceRecord]) -> Result<Vec<u8>> {
        let delivered_at = chrono::Utc::now().to_rfc3339();
        let mut buf = Vec::new();
        for record in records {
            let mut line = record.to_json();
            line["delivered_at"] = serde_json::Value::String(delivered_at.clone());
            serde_json::to_writer(&mut buf, &line)
                .map_err(|e| ConnectError::sink(&self.name, e.to_string()))?;
            buf.push(b'\n');
        }
        Ok(buf)
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, records: &[SourceRecord]) -> Result<()> {
        let buf = self.encode(records)?;
        let mut out = self.out.lock().await;
        out.write_all(&buf).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Source runner state
pub struct FileSourceRunner {
    config: RunnerConfig,
    task: FileSourceTask,
    sink: Arc<dyn RecordSink>,
    status: RwLock<ConnectorStatus>,
    records_published: AtomicU64,
    errors_count: AtomicU64,
}

impl FileSourceRunner {
    /// Create a runner around a started task
    pub fn new(config: RunnerConfig, task: FileSourceTask, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config,
            task,
            sink,
            status: RwLock::new(ConnectorStatus::Starting),
            records_published: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
        }
    }

    /// Get current status
    pub async fn status(&self) -> ConnectorStatus {
        *self.status.read().await
    }

    /// Records delivered and committed so far
    pub fn records_published(&self) -> u64 {
        self.records_published.load(Ordering::Relaxed)
    }

    /// Failed delivery attempts so far
    pub fn errors_count(&self) -> u64 {
        self.errors_count.load(Ordering::Relaxed)
    }

    /// The wrapped task
    pub fn task(&self) -> &FileSourceTask {
        &self.task
    }

    /// Run until shutdown or a fatal error, then stop the task
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "Source '{}' starting on '{}', publishing to topic: {}",
            self.config.name,
            self.task.config().input_folder,
            self.task.config().topic
        );
        *self.status.write().await = ConnectorStatus::Running;

        let result = self.run_loop(&mut shutdown_rx).await;

        if let Err(e) = self.task.stop().await {
            warn!(source = %self.config.name, error = %e, "Task stop returned error");
        }

        *self.status.write().await = match &result {
            Ok(()) => ConnectorStatus::Stopped,
            Err(e) if e.is_shutdown() => ConnectorStatus::Stopped,
            Err(e) => {
                error!("Source '{}' failed: {}", self.config.name, e);
                ConnectorStatus::Failed
            }
        };

        result
    }

    async fn run_loop(&mut self, shutdown_rx: &mut broadcast::Receiver<()>) -> Result<()> {
        let idle = Duration::from_millis(self.config.idle_backoff_ms);

        loop {
            let polled = tokio::select! {
                _ = shutdown_rx.recv() => None,
                batch = self.task.poll() => Some(batch),
            };
            let Some(batch) = polled else {
                info!(
                    "Source '{}' shutting down after {} records",
                    self.config.name,
                    self.records_published()
                );
                return Ok(());
            };

            let batch = batch?;
            if batch.is_empty() {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(
                            "Source '{}' shutting down after {} records",
                            self.config.name,
                            self.records_published()
                        );
                        return Ok(());
                    }
                    _ = tokio::time::sleep(idle) => {}
                }
                continue;
            }

            publish_with_retry(
                self.sink.as_ref(),
                &self.config,
                &self.errors_count,
                &batch,
            )
            .await?;

            let committed = batch.iter().filter(|r| self.task.commit_record(r)).count();
            let count = self
                .records_published
                .fetch_add(committed as u64, Ordering::Relaxed)
                + committed as u64;
            debug!(
                source = %self.config.name,
                batch = batch.len(),
                total = count,
                "Delivered batch"
            );
        }
    }
}

/// Deliver `batch`, retrying with exponential backoff
async fn publish_with_retry(
    sink: &dyn RecordSink,
    config: &RunnerConfig,
    errors_count: &AtomicU64,
    batch: &[SourceRecord],
) -> Result<()> {
    let max_retries = config.max_publish_retries.max(1);
    let mut backoff_ms = INITIAL_RETRY_BACKOFF_MS;
    let mut attempt = 1;

    loop {
        match sink.publish(batch).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                errors_count.fetch_add(1, Ordering::Relaxed);
                if attempt >= max_retries {
                    error!(
                        "Source '{}': delivery to '{}' failed after {} attempts: {}",
                        config.name,
                        sink.name(),
                        attempt,
                        e
                    );
                    return Err(e);
                }
                warn!(
                    "Source '{}': delivery to '{}' failed (attempt {}/{}), retrying in {}ms: {}",
                    config.name,
                    sink.name(),
                    attempt,
                    max_retries,
                    backoff_ms,
                    e
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_RETRY_BACKOFF_MS);
                attempt += 1;
            }
        }
    }
}

/// Build the storage, task and stdout sink described by `config` and run them
pub async fn run_source(config: &ConnectConfig, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let storage = storage::from_config(&config.storage);
    let readers = Arc::new(CsvReaderFactory::new(config.source.delimiter_byte()));
    let task = FileSourceTask::start(config.source.clone(), storage, readers).await?;
    let sink = Arc::new(StdoutSink::new("stdout"));

    let mut runner = FileSourceRunner::new(config.runner.clone(), task, sink);
    runner.run(shutdown_rx).await
}
