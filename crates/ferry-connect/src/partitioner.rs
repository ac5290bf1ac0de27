//! Static file-to-task assignment
//!
//! Every task instance lists the same input folder. Each one keeps only the
//! files whose name hashes onto its own ordinal, so N tasks split the folder
//! without talking to each other.
//!
//! ## Design
//!
//! - The hash is CRC-32 over the UTF-8 bytes of the file name, which is stable
//!   across processes and platforms.
//! - Ownership is `crc32(name) % total == task_hash % total`.
//! - Changing `task_total` reshuffles ownership. There is no rebalancing.

/// Decides which files a task instance owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPartitioner {
    total_tasks: u32,
    task_hash: u32,
}

impl TaskPartitioner {
    /// Create a partitioner for the task at `task_hash` out of `total_tasks`
    pub fn new(total_tasks: u32, task_hash: u32) -> Self {
        Self {
            total_tasks,
            task_hash,
        }
    }

    /// Whether this task owns `file_name`
    pub fn owns(&self, file_name: &str) -> bool {
        owns(file_name, self.total_tasks, self.task_hash)
    }

    /// Ordinal this task answers for, in `[0, total_tasks)`
    pub fn ordinal(&self) -> Option<u32> {
        (self.total_tasks > 0).then(|| self.task_hash % self.total_tasks)
    }

    /// Configured number of tasks
    pub fn total_tasks(&self) -> u32 {
        self.total_tasks
    }

    /// Configured task hash
    pub fn task_hash(&self) -> u32 {
        self.task_hash
    }
}

/// Ordinal in `[0, total_tasks)` that `file_name` hashes to
pub fn file_ordinal(file_name: &str, total_tasks: u32) -> Option<u32> {
    if total_tasks == 0 {
        return None;
    }
    Some(crc32fast::hash(file_name.as_bytes()) % total_tasks)
}

/// Whether the task at `task_hash` out of `total_tasks` owns `file_name`
///
/// With zero tasks nothing is owned.
pub fn owns(file_name: &str, total_tasks: u32, task_hash: u32) -> bool {
    match file_ordinal(file_name, total_tasks) {
        Some(ordinal) => ordinal == task_hash % total_tasks,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_task_owns_everything() {
        let partitioner = TaskPartitioner::new(1, 10);
        for name in ["a.csv", "b.csv", "", "日本.csv"] {
            assert!(partitioner.owns(name));
        }
        assert_eq!(partitioner.ordinal(), Some(0));
    }

    #[test]
    fn test_zero_tasks_owns_nothing() {
        assert!(!owns("a.csv", 0, 0));
        assert_eq!(TaskPartitioner::new(0, 3).ordinal(), None);
    }

    #[test]
    fn test_deterministic() {
        let first = file_ordinal("orders-2024-01-01.csv", 7);
        for _ in 0..10 {
            assert_eq!(file_ordinal("orders-2024-01-01.csv", 7), first);
        }
    }

    #[test]
    fn test_hash_above_total_is_normalized() {
        let name = "data.csv";
        let ordinal = file_ordinal(name, 4).unwrap();
        assert!(owns(name, 4, ordinal));
        assert!(owns(name, 4, ordinal + 4));
        assert!(!owns(name, 4, ordinal + 1));
    }

    proptest! {
        #[test]
        fn prop_every_file_has_exactly_one_owner(
            names in prop::collection::vec("[a-zA-Z0-9_.-]{0,24}", 1..50),
            total in 1u32..16,
        ) {
            for name in &names {
                let owners = (0..total).filter(|hash| owns(name, total, *hash)).count();
                prop_assert_eq!(owners, 1);
            }
        }
    }
}
