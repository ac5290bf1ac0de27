//! Emitted-but-unconfirmed record bookkeeping
//!
//! Every record the task hands to the host is put into the [`RecordCache`]
//! before `poll` returns, and leaves it when the host commits it. Per-file
//! counters on top of that tell the task when an exhausted file has no record
//! in flight any more and can be moved out of the input folder.
//!
//! The cache is shared between the poll path and the commit path, which may
//! run on different threads, so both maps are `DashMap`s.

use crate::traits::offset::PATH_KEY;
use crate::traits::record::{RecordKey, SourceRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// How reading a file ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Read to end-of-file
    Completed,
    /// Aborted on malformed content
    Failed,
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Default)]
struct FileProgress {
    outstanding: usize,
    outcome: Option<FileOutcome>,
}

impl FileProgress {
    fn flushed(&self) -> Option<FileOutcome> {
        self.outcome.filter(|_| self.outstanding == 0)
    }
}

/// Concurrent map of records awaiting commit
#[derive(Debug, Default)]
pub struct RecordCache {
    records: DashMap<RecordKey, Option<Arc<str>>>,
    files: DashMap<Arc<str>, FileProgress>,
}

impl RecordCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `record` until it is committed
    ///
    /// The record's file is taken from the `path` entry of its source
    /// partition. Records are identified by [`RecordKey`], so every record
    /// must carry a distinct `(source_partition, source_offset)` pair; putting
    /// a key that is already tracked is a no-op. Records built by
    /// [`FileSourceTask`](crate::task::FileSourceTask) always carry the file
    /// path and row offset.
    pub fn put(&self, record: &SourceRecord) -> RecordKey {
        let key = record.key();
        let file: Option<Arc<str>> = record
            .source_partition()
            .get(PATH_KEY)
            .map(|p| Arc::from(p.as_str()));

        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                // Count before the record becomes visible to commit.
                if let Some(file) = &file {
                    self.files.entry(Arc::clone(file)).or_default().outstanding += 1;
                }
                slot.insert(file);
            }
        }
        key
    }

    /// Remove a delivered record; `false` if the key was not tracked
    pub fn commit(&self, key: &RecordKey) -> bool {
        let Some((_, file)) = self.records.remove(key) else {
            return false;
        };
        if let Some(file) = file {
            if let Some(mut progress) = self.files.get_mut(&file) {
                progress.outstanding = progress.outstanding.saturating_sub(1);
            }
        }
        true
    }

    /// Number of records awaiting commit
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Whether no record awaits commit
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `key` is still awaiting commit
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Snapshot of all tracked keys
    pub fn keys(&self) -> Vec<RecordKey> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }

    /// Records of `path` awaiting commit
    pub fn outstanding(&self, path: &str) -> usize {
        self.files.get(path).map(|p| p.outstanding).unwrap_or(0)
    }

    /// Mark `path` as fully read; it is flushed once nothing is outstanding
    pub fn mark_exhausted(&self, path: &str, outcome: FileOutcome) {
        self.files.entry(Arc::from(path)).or_default().outcome = Some(outcome);
    }

    /// Stop tracking `path` if it is flushed, returning its outcome
    pub fn take_flushed(&self, path: &str) -> Option<FileOutcome> {
        self.files
            .remove_if(path, |_, progress| progress.flushed().is_some())
            .and_then(|(_, progress)| progress.outcome)
    }

    /// Stop tracking every flushed file, returning paths in sorted order
    pub fn drain_flushed(&self) -> Vec<(String, FileOutcome)> {
        let mut flushed = Vec::new();
        self.files.retain(|path, progress| match progress.flushed() {
            Some(outcome) => {
                flushed.push((path.to_string(), outcome));
                false
            }
            None => true,
        });
        flushed.sort_by(|a, b| a.0.cmp(&b.0));
        flushed
    }

    /// Drop all tracked records and files
    pub fn clear(&self) {
        self.records.clear();
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::offset::OFFSET_KEY;
    use crate::traits::record::SourceMap;
    use crate::types::Row;

    fn record(path: &str, offset: u64) -> SourceRecord {
        SourceRecord::builder()
            .topic_name("rows")
            .row(Row::from_pairs([("n", offset)]))
            .source_partition(SourceMap::from([(PATH_KEY.to_string(), path.to_string())]))
            .source_offset(SourceMap::from([(
                OFFSET_KEY.to_string(),
                offset.to_string(),
            )]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_put_and_commit_accounting() {
        let cache = RecordCache::new();
        let keys: Vec<_> = (0..3).map(|i| cache.put(&record("/input/a", i))).collect();
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.outstanding("/input/a"), 3);

        assert!(cache.commit(&keys[1]));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.outstanding("/input/a"), 2);
        assert!(!cache.contains(&keys[1]));
    }

    #[test]
    fn test_commit_is_idempotent() {
        let cache = RecordCache::new();
        let key = cache.put(&record("/input/a", 0));
        assert!(cache.commit(&key));
        assert!(!cache.commit(&key));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.outstanding("/input/a"), 0);
    }

    #[test]
    fn test_unknown_key_is_noop() {
        let cache = RecordCache::new();
        cache.put(&record("/input/a", 0));
        assert!(!cache.commit(&record("/input/b", 0).key()));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_duplicate_put_is_counted_once() {
        let cache = RecordCache::new();
        cache.put(&record("/input/a", 0));
        cache.put(&record("/input/a", 0));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.outstanding("/input/a"), 1);
    }

    #[test]
    fn test_identity_is_partition_and_offset() {
        let cache = RecordCache::new();
        let bare = |n: u64| {
            SourceRecord::builder()
                .topic_name("rows")
                .row(Row::from_pairs([("n", n)]))
                .build()
                .unwrap()
        };

        // Without origin maps two different rows share one key.
        let first = cache.put(&bare(1));
        assert_eq!(cache.put(&bare(2)), first);
        assert_eq!(cache.size(), 1);

        cache.put(&record("/input/a", 1));
        cache.put(&record("/input/a", 2));
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_flushed_only_after_exhausted_and_committed() {
        let cache = RecordCache::new();
        let key = cache.put(&record("/input/a", 0));

        assert!(cache.drain_flushed().is_empty());
        cache.mark_exhausted("/input/a", FileOutcome::Completed);
        assert!(cache.drain_flushed().is_empty());

        cache.commit(&key);
        assert_eq!(
            cache.drain_flushed(),
            vec![("/input/a".to_string(), FileOutcome::Completed)]
        );
        assert!(cache.drain_flushed().is_empty());
    }

    #[test]
    fn test_take_flushed() {
        let cache = RecordCache::new();
        cache.mark_exhausted("/input/empty", FileOutcome::Failed);
        assert_eq!(cache.take_flushed("/input/empty"), Some(FileOutcome::Failed));
        assert_eq!(cache.take_flushed("/input/empty"), None);

        cache.put(&record("/input/busy", 0));
        cache.mark_exhausted("/input/busy", FileOutcome::Completed);
        assert_eq!(cache.take_flushed("/input/busy"), None);
    }

    #[test]
    fn test_keys_snapshot_allows_removal() {
        let cache = RecordCache::new();
        for i in 0..5 {
            cache.put(&record("/input/a", i));
        }
        for key in cache.keys() {
            assert!(cache.commit(&key));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_commit() {
        let cache = Arc::new(RecordCache::new());
        let keys: Vec<_> = (0..200).map(|i| cache.put(&record("/input/a", i))).collect();

        let handles: Vec<_> = keys
            .chunks(50)
            .map(|chunk| {
                let cache = Arc::clone(&cache);
                let chunk = chunk.to_vec();
                std::thread::spawn(move || chunk.iter().filter(|k| cache.commit(k)).count())
            })
            .collect();

        let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(committed, 200);
        assert_eq!(cache.outstanding("/input/a"), 0);
    }

    #[test]
    fn test_clear() {
        let cache = RecordCache::new();
        cache.put(&record("/input/a", 0));
        cache.mark_exhausted("/input/a", FileOutcome::Completed);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.drain_flushed().is_empty());
    }
}
