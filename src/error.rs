use thiserror::Error;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// Client protocol errors (late or malformed messages) never reach this type;
/// they are logged and dropped at the dispatch layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}
