//! File source task tests against the in-memory storage
//!
//! Run with: cargo test -p ferry-connect --test file_source

use ferry_connect::config::keys;
use ferry_connect::format::CsvReaderFactory;
use ferry_connect::testing::{FailureMode, InMemoryStorage};
use ferry_connect::{ConnectorError, FileSourceTask, SourceRecord, StorageClient, TaskState};
use std::collections::HashMap;
use std::sync::Arc;

fn settings() -> HashMap<String, String> {
    [
        (keys::TOPIC, "rows"),
        (keys::INPUT_FOLDER, "/input"),
        (keys::COMPLETED_FOLDER, "/completed"),
        (keys::ERROR_FOLDER, "/error"),
        (keys::TASK_TOTAL, "1"),
        (keys::TASK_HASH, "10"),
        (keys::FILE_CACHE_SIZE, "3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn storage_with_files(count: usize) -> InMemoryStorage {
    (1..=count).fold(InMemoryStorage::new(), |storage, i| {
        storage.with_file(&format!("/input/file{}", i), format!("id,name\n{},row{}\n", i, i))
    })
}

async fn start(storage: &Arc<InMemoryStorage>) -> FileSourceTask {
    FileSourceTask::start_with_settings(
        &settings(),
        storage.clone(),
        Arc::new(CsvReaderFactory::default()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_queue_drains_and_refills() {
    let storage = Arc::new(storage_with_files(99));
    let mut task = start(&storage).await;

    let mut sizes = Vec::new();
    for _ in 0..6 {
        let batch = task.poll().await.unwrap();
        assert_eq!(batch.len(), 1);
        sizes.push(task.queue_size());
    }

    assert_eq!(sizes, vec![2, 1, 0, 2, 1, 0]);
    assert_eq!(task.pending_records(), 6);
}

#[tokio::test]
async fn test_vanished_files_are_skipped() {
    let storage = Arc::new(storage_with_files(99).with_file_type_failure(FailureMode::NotFound));
    let mut task = start(&storage).await;

    let mut sizes = Vec::new();
    for _ in 0..3 {
        assert!(task.poll().await.unwrap().is_empty());
        sizes.push(task.queue_size());
    }

    assert_eq!(sizes, vec![2, 1, 0]);
    assert_eq!(task.state(), TaskState::Idle);
    assert_eq!(task.pending_records(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_propagated() {
    let storage = Arc::new(
        storage_with_files(99).with_file_type_failure(FailureMode::Other("permission denied".into())),
    );
    let mut task = start(&storage).await;

    let err = task.poll().await.unwrap_err();
    assert!(matches!(err, ConnectorError::Storage { op: "file_type", .. }));
}

#[tokio::test]
async fn test_every_file_reaches_completed_folder() {
    let storage = Arc::new(storage_with_files(10));
    let mut task = start(&storage).await;
    let committer = task.committer();

    let mut delivered: Vec<SourceRecord> = Vec::new();
    for _ in 0..20 {
        let batch = task.poll().await.unwrap();
        for record in &batch {
            assert!(committer.commit(record));
        }
        delivered.extend(batch);
    }

    assert_eq!(delivered.len(), 10);
    assert_eq!(task.pending_records(), 0);
    for i in 1..=10 {
        assert!(!storage.exists(&format!("/input/file{}", i)).await.unwrap());
        assert!(storage.exists(&format!("/completed/file{}", i)).await.unwrap());
    }

    let mut ids: Vec<String> = delivered
        .iter()
        .map(|r| r.row().get("id").unwrap().as_str().unwrap().to_string())
        .collect();
    ids.sort_by_key(|id| id.parse::<u32>().unwrap());
    let expected: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_uncommitted_file_stays_in_input_folder() {
    let storage = Arc::new(storage_with_files(2));
    let mut task = start(&storage).await;

    let first = task.poll().await.unwrap();
    let second = task.poll().await.unwrap();
    task.commit_record(&second[0]);
    task.poll().await.unwrap();

    let first_path = first[0].source_partition()["path"].clone();
    let second_path = second[0].source_partition()["path"].clone();
    assert!(storage.exists(&first_path).await.unwrap());
    assert!(!storage.exists(&second_path).await.unwrap());
    assert_eq!(task.pending_records(), 1);
}

#[tokio::test]
async fn test_tasks_split_the_folder() {
    let storage = Arc::new(storage_with_files(60));
    let mut seen = Vec::new();

    for hash in 0..3 {
        let mut settings = settings();
        settings.insert(keys::TASK_TOTAL.to_string(), "3".to_string());
        settings.insert(keys::TASK_HASH.to_string(), hash.to_string());
        settings.insert(keys::FILE_CACHE_SIZE.to_string(), "100".to_string());
        let mut task = FileSourceTask::start_with_settings(
            &settings,
            storage.clone(),
            Arc::new(CsvReaderFactory::default()),
        )
        .await
        .unwrap();

        loop {
            let batch = task.poll().await.unwrap();
            if batch.is_empty() && task.queue_size() == 0 && task.state() == TaskState::Idle {
                break;
            }
            seen.extend(batch.iter().map(|r| r.source_partition()["path"].clone()));
        }
    }

    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(total, 60);
    assert_eq!(seen.len(), 60);
}
