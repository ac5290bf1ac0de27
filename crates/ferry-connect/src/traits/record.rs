//! Source record types
//!
//! A [`SourceRecord`] is one row on its way to a topic, together with the
//! `source_partition`/`source_offset` maps that tell the host runtime where it
//! came from. Records are immutable once built.

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::Row;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key/value map used for source partitions and offsets
pub type SourceMap = BTreeMap<String, String>;

/// A row destined for a topic
///
/// The partition and offset maps are shared and only ever handed out by
/// shared reference, so they cannot be modified after construction:
///
/// ```compile_fail
/// use ferry_connect::{Row, SourceRecord};
///
/// let record = SourceRecord::builder()
///     .topic_name("rows")
///     .row(Row::default())
///     .build()
///     .unwrap();
/// record.source_offset().insert("a".to_string(), "b".to_string());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    topic_name: String,
    row: Row,
    partition: Option<u32>,
    timestamp: Option<i64>,
    source_partition: Arc<SourceMap>,
    source_offset: Arc<SourceMap>,
}

impl SourceRecord {
    /// Create a builder for constructing records
    pub fn builder() -> SourceRecordBuilder {
        SourceRecordBuilder::default()
    }

    /// Destination topic
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Payload row
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Target topic partition, if pinned
    pub fn partition(&self) -> Option<u32> {
        self.partition
    }

    /// Event timestamp in epoch millis, if set
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Identifies the origin of this record (e.g. the source file)
    pub fn source_partition(&self) -> &SourceMap {
        &self.source_partition
    }

    /// Identifies the position of this record within its origin
    pub fn source_offset(&self) -> &SourceMap {
        &self.source_offset
    }

    /// Stable key derived from the partition and offset maps
    pub fn key(&self) -> RecordKey {
        RecordKey {
            source_partition: Arc::clone(&self.source_partition),
            source_offset: Arc::clone(&self.source_offset),
        }
    }

    /// JSON envelope used by line-oriented sinks
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "topic": self.topic_name,
            "partition": self.partition,
            "timestamp": self.timestamp,
            "source_partition": *self.source_partition,
            "source_offset": *self.source_offset,
            "row": self.row.to_json(),
        })
    }
}

/// Builder for [`SourceRecord`]
#[derive(Debug, Default)]
pub struct SourceRecordBuilder {
    topic_name: Option<String>,
    row: Option<Row>,
    partition: Option<u32>,
    timestamp: Option<i64>,
    source_partition: SourceMap,
    source_offset: SourceMap,
}

impl SourceRecordBuilder {
    /// Set the destination topic
    pub fn topic_name(mut self, topic: impl Into<String>) -> Self {
        self.topic_name = Some(topic.into());
        self
    }

    /// Set the payload row
    pub fn row(mut self, row: Row) -> Self {
        self.row = Some(row);
        self
    }

    /// Pin the record to a topic partition
    pub fn partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Set the event timestamp (epoch millis)
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the source partition map
    pub fn source_partition(mut self, partition: SourceMap) -> Self {
        self.source_partition = partition;
        self
    }

    /// Set the source offset map
    pub fn source_offset(mut self, offset: SourceMap) -> Self {
        self.source_offset = offset;
        self
    }

    /// Build the record; topic and row are mandatory
    pub fn build(self) -> ConnectorResult<SourceRecord> {
        let topic_name = self
            .topic_name
            .ok_or_else(|| ConnectorError::config("source record requires a topic name"))?;
        let row = self
            .row
            .ok_or_else(|| ConnectorError::config("source record requires a row"))?;

        Ok(SourceRecord {
            topic_name,
            row,
            partition: self.partition,
            timestamp: self.timestamp,
            source_partition: Arc::new(self.source_partition),
            source_offset: Arc::new(self.source_offset),
        })
    }
}

/// Cache key identifying one emitted record
///
/// Two records with equal partition and offset maps have equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    source_partition: Arc<SourceMap>,
    source_offset: Arc<SourceMap>,
}

impl RecordKey {
    /// Source partition part of the key
    pub fn source_partition(&self) -> &SourceMap {
        &self.source_partition
    }

    /// Source offset part of the key
    pub fn source_offset(&self) -> &SourceMap {
        &self.source_offset
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:?}", self.source_partition, self.source_offset)
    }
}
