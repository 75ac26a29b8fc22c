//! Persistence Provider: string-keyed JSON blobs behind a narrow async trait.
//!
//! The social store never assumes atomicity across keys. Backends:
//! - `MemoryStore` (default, tests, anonymous local mode)
//! - `RedisStore` (namespaced keys on a multiplexed connection)
//! - `PostgresStore` (single `kv_store` table)
//!
//! `AppState` carries the selected backend as `Arc<dyn KeyValueStore>`.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;
pub mod redis_store;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removes every listed key. Missing keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}
