//! Storage and subscription seams shared by the hub and its backends

use model::{ProcessedReading, StoredRecord, ValidationError};

mod registry;

pub use registry::{BroadcastReport, Subscriber, SubscriberId, SubscriptionRegistry, DEFAULT_SEND_TIMEOUT};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("processed_agent_data {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence for processed readings.
///
/// Implementations open one session per call and release it on every exit
/// path. Mutations are atomic: a failed call leaves nothing behind.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts all items in one transaction and returns them with their ids.
    async fn create_batch(&self, items: Vec<ProcessedReading>) -> Result<Vec<StoredRecord>, IngestError>;
    async fn get_by_id(&self, id: i64) -> Result<StoredRecord, IngestError>;
    async fn list(&self) -> Result<Vec<StoredRecord>, IngestError>;
    async fn update_by_id(&self, id: i64, item: ProcessedReading) -> Result<StoredRecord, IngestError>;
    /// Returns the record as it was right before removal.
    async fn delete_by_id(&self, id: i64) -> Result<StoredRecord, IngestError>;
}
