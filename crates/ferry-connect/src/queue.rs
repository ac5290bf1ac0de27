//! Bounded queue of owned file paths
//!
//! The queue holds full storage paths of files this task owns and has not
//! started on yet. It only refills once it has been drained, so a slow listing
//! is paid at most once per `capacity` files.
//!
//! Paths handed out by [`FileQueue::next`] stay *claimed* until the task
//! calls [`FileQueue::release`]. A claimed path is never queued again, which
//! keeps a file whose records are still in flight from being read twice while
//! it sits in the input folder.

use crate::error::ConnectorResult;
use crate::partitioner::TaskPartitioner;
use crate::traits::storage::join_path;
use futures::{Stream, StreamExt};
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// FIFO of file paths owned by one task
#[derive(Debug)]
pub struct FileQueue {
    input_folder: String,
    capacity: usize,
    partitioner: TaskPartitioner,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    claimed: HashSet<String>,
}

impl FileQueue {
    /// Create an empty queue for files listed under `input_folder`
    pub fn new(
        input_folder: impl Into<String>,
        capacity: usize,
        partitioner: TaskPartitioner,
    ) -> Self {
        Self {
            input_folder: input_folder.into(),
            capacity,
            partitioner,
            queue: VecDeque::with_capacity(capacity),
            queued: HashSet::with_capacity(capacity),
            claimed: HashSet::new(),
        }
    }

    /// Number of queued paths
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Whether no path is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the queue is at capacity
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    /// Maximum number of queued paths
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Folder that offered names are resolved against
    pub fn input_folder(&self) -> &str {
        &self.input_folder
    }

    /// Pop the oldest path and mark it claimed
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        let path = self.queue.pop_front()?;
        self.queued.remove(&path);
        self.claimed.insert(path.clone());
        Some(path)
    }

    /// Offer a listed file name
    ///
    /// Returns `true` if the resulting path was queued. Names owned by another
    /// task, paths already queued or claimed, and offers to a full queue are
    /// rejected.
    pub fn offer(&mut self, file_name: &str) -> bool {
        if self.is_full() || !self.partitioner.owns(file_name) {
            return false;
        }

        let path = join_path(&self.input_folder, file_name);
        if self.queued.contains(&path) || self.claimed.contains(&path) {
            trace!(path = %path, "Skipping path already tracked");
            return false;
        }

        self.queued.insert(path.clone());
        self.queue.push_back(path);
        true
    }

    /// Refill from a listing of file names, in listing order
    ///
    /// Does nothing unless the queue is empty. Stops once the queue is full.
    /// Returns how many paths were queued.
    pub fn refill<I, S>(&mut self, listing: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.is_empty() {
            return 0;
        }

        let mut accepted = 0;
        for name in listing {
            if self.is_full() {
                break;
            }
            if self.offer(name.as_ref()) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Refill from a lazy listing, pulling names only until the queue is full
    ///
    /// Does nothing unless the queue is empty. A listing error aborts the
    /// refill; paths queued before it stay queued.
    pub async fn refill_stream<S>(&mut self, mut listing: S) -> ConnectorResult<usize>
    where
        S: Stream<Item = ConnectorResult<String>> + Unpin,
    {
        if !self.is_empty() {
            return Ok(0);
        }

        let mut accepted = 0;
        while !self.is_full() {
            let Some(name) = listing.next().await else {
                break;
            };
            if self.offer(&name?) {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Drop the claim on `path` once the task is done with it
    pub fn release(&mut self, path: &str) -> bool {
        self.claimed.remove(path)
    }

    /// Whether `path` is claimed and not yet released
    pub fn is_claimed(&self, path: &str) -> bool {
        self.claimed.contains(path)
    }

    /// Number of claimed paths
    pub fn claimed(&self) -> usize {
        self.claimed.len()
    }

    /// Forget all queued and claimed paths
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
        self.claimed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(capacity: usize) -> FileQueue {
        FileQueue::new("/input", capacity, TaskPartitioner::new(1, 10))
    }

    #[test]
    fn test_size_sequence_over_two_refills() {
        let mut q = queue(3);
        let listing = ["a.csv", "b.csv", "c.csv"];
        let mut sizes = Vec::new();

        for _ in 0..2 {
            assert_eq!(q.refill(listing), 3);
            sizes.push(q.size());
            let mut taken = Vec::new();
            while let Some(path) = q.next() {
                sizes.push(q.size());
                taken.push(path);
            }
            for path in taken {
                assert!(q.release(&path));
            }
        }

        assert_eq!(sizes, vec![3, 2, 1, 0, 3, 2, 1, 0]);
    }

    #[test]
    fn test_fifo_order_and_full_paths() {
        let mut q = queue(10);
        q.refill(["b.csv", "a.csv"]);
        assert_eq!(q.next().as_deref(), Some("/input/b.csv"));
        assert_eq!(q.next().as_deref(), Some("/input/a.csv"));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_capacity_is_respected() {
        let mut q = queue(2);
        assert_eq!(q.refill(["a", "b", "c", "d"]), 2);
        assert!(q.is_full());
        assert!(!q.offer("e"));
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_refill_only_when_empty() {
        let mut q = queue(5);
        q.refill(["a"]);
        assert_eq!(q.refill(["b", "c"]), 0);
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn test_dedup_against_queued_and_claimed() {
        let mut q = queue(5);
        assert!(q.offer("a"));
        assert!(!q.offer("a"));

        let path = q.next().unwrap();
        assert!(q.is_claimed(&path));
        assert_eq!(q.refill(["a", "b"]), 1);
        assert_eq!(q.next().as_deref(), Some("/input/b"));

        q.release(&path);
        assert!(q.offer("a"));
    }

    #[test]
    fn test_foreign_files_are_rejected() {
        let partitioner = TaskPartitioner::new(4, 0);
        let mut q = FileQueue::new("/input", 100, partitioner);
        let names: Vec<String> = (0..64).map(|i| format!("file-{}.csv", i)).collect();

        let accepted = q.refill(&names);
        let expected = names.iter().filter(|n| partitioner.owns(n)).count();
        assert_eq!(accepted, expected);
        assert!(accepted < names.len());
    }

    #[tokio::test]
    async fn test_refill_stream_stops_when_full() {
        let mut q = queue(2);
        let listing = futures::stream::iter(
            ["a", "b", "c"].map(|n| Ok::<_, crate::error::ConnectorError>(n.to_string())),
        );
        assert_eq!(q.refill_stream(listing).await.unwrap(), 2);
        assert_eq!(q.size(), 2);
    }

    #[tokio::test]
    async fn test_refill_stream_propagates_listing_error() {
        let mut q = queue(5);
        let listing = futures::stream::iter(vec![
            Ok("a".to_string()),
            Err(crate::error::ConnectorError::storage("list", "/input", "timeout")),
        ]);
        assert!(q.refill_stream(listing).await.is_err());
        assert_eq!(q.size(), 1);
    }

    #[test]
    fn test_clear() {
        let mut q = queue(3);
        q.refill(["a", "b"]);
        q.next();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.claimed(), 0);
    }
}
