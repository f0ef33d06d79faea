use roomcraft_core::error::CoreError;
use roomcraft_core::types::ProjectId;

/// Errors raised by a [`crate::ProjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(ProjectId),

    /// The write was refused because the project is in the wrong status
    /// (or the id already exists on create).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back onto the domain model.
    #[error("Corrupt project row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Project",
                id: id.to_string(),
            },
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Errors raised by a [`crate::BlobStore`].
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The key is empty, absolute, or escapes the store root.
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// The URL was not issued by this store.
    #[error("URL does not belong to this blob store: {0}")]
    ForeignUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob backend error: {0}")]
    Backend(String),
}
