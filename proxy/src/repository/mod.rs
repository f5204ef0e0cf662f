pub mod readings;

use aculink::SensorReading;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use readings::SqliteReadingRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Store for decoded readings, keyed by reading identity.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    async fn exists(&self, uuid: &Uuid) -> Result<bool, StoreError>;
    async fn insert(&self, reading: &SensorReading) -> Result<(), StoreError>;
}
