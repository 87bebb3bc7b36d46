use thiserror::Error;

use crate::sheet::StoreError;

/// User-facing failures. Every variant renders to a chat message at the
/// dispatch boundary; none of them terminate the process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not extract a sheet id from that link")]
    InvalidReference,
    #[error("access to the sheet was denied; grant edit access to {service_account}")]
    PermissionDenied { service_account: String },
    #[error("the sheet service is unreachable: {0}")]
    StoreUnavailable(String),
    #[error("no sheet is linked yet")]
    NoLinkedStore,
    #[error("no task is currently being timed")]
    NoActiveTask,
    #[error("the task description must not be empty")]
    EmptyDescription,
}

impl EngineError {
    /// Maps an adapter failure onto the user-facing taxonomy. An id that opens
    /// nothing is treated the same as a malformed reference.
    pub fn from_store(error: StoreError, service_account: &str) -> Self {
        match error {
            StoreError::PermissionDenied => EngineError::PermissionDenied {
                service_account: service_account.to_string(),
            },
            StoreError::NotFound(_) => EngineError::InvalidReference,
            StoreError::Unavailable(message) => EngineError::StoreUnavailable(message),
        }
    }
}
