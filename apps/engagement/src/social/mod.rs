// Social Engagement Store.
// Repository + ledger hold state, `interaction` is the only place counters move,
// the coordinator owns the optimistic apply/persist/rollback protocol, and the
// feed assembler is read-only.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

pub mod coordinator;
pub mod feed;
pub mod handlers;
pub mod interaction;
pub mod ledger;
pub mod repository;
pub mod samples;
pub mod validation;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Concurrent update on '{key}' (expected revision {expected}, found {found})")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote skill service error: {0}")]
    Remote(#[from] RemoteError),

    /// An optimistic update failed to persist and was reverted. `restored` is
    /// the pre-action view the caller should render again.
    #[error("{cause}; local state rolled back")]
    RolledBack {
        cause: Box<SocialError>,
        restored: Option<serde_json::Value>,
    },
}

impl SocialError {
    /// Storage failures and lost-update conflicts can be retried by the caller as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            SocialError::Storage(_) | SocialError::Conflict { .. } => true,
            SocialError::RolledBack { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }
}
