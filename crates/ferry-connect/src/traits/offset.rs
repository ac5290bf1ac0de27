//! Committed offset lookup
//!
//! Hosts that persist source offsets can hand them back to the task through
//! [`OffsetReader`]. On reopening a file the task skips every row at or below
//! the committed offset, which keeps duplicates down after a restart.

use super::record::SourceMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source offset key written by the file source task
pub const OFFSET_KEY: &str = "offset";

/// Source partition key written by the file source task
pub const PATH_KEY: &str = "path";

/// Looks up the last committed offset of a source partition
#[async_trait]
pub trait OffsetReader: Send + Sync {
    /// Last committed `source_offset` for `partition`, if any
    async fn committed_offset(&self, partition: &SourceMap) -> Option<SourceMap>;
}

/// In-process offset store
#[derive(Debug, Default)]
pub struct MemoryOffsetReader {
    offsets: RwLock<HashMap<String, SourceMap>>,
}

impl MemoryOffsetReader {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `offset` as committed for `partition`
    pub fn store(&self, partition: &SourceMap, offset: SourceMap) {
        self.offsets.write().insert(partition_key(partition), offset);
    }

    /// Number of tracked partitions
    pub fn len(&self) -> usize {
        self.offsets.read().len()
    }

    /// Whether no partition has been stored
    pub fn is_empty(&self) -> bool {
        self.offsets.read().is_empty()
    }
}

#[async_trait]
impl OffsetReader for MemoryOffsetReader {
    async fn committed_offset(&self, partition: &SourceMap) -> Option<SourceMap> {
        self.offsets.read().get(&partition_key(partition)).cloned()
    }
}

fn partition_key(partition: &SourceMap) -> String {
    partition
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Row index stored in an offset map, if present and numeric
pub fn row_offset(offset: &SourceMap) -> Option<u64> {
    offset.get(OFFSET_KEY).and_then(|v| v.parse().ok())
}
