//! Storage backends
//!
//! Concrete [`StorageClient`](crate::traits::storage::StorageClient)
//! implementations. The in-memory backend used by tests lives in
//! [`traits::testing`](crate::traits::testing).

pub mod local;

pub use local::LocalStorage;

use crate::config::StorageConfig;
use crate::traits::storage::StorageClient;
use std::sync::Arc;

/// Build the storage client selected by `config`
pub fn from_config(config: &StorageConfig) -> Arc<dyn StorageClient> {
    match config {
        StorageConfig::Local { root } => Arc::new(LocalStorage::new(root.clone())),
    }
}
