//! Outbox errors

use thiserror::Error;

use core_kernel::OutboxEventId;

use crate::envelope::OutboxStatus;

/// Errors that can occur in outbox operations
///
/// Stores never retry internally; callers inspect [`OutboxError::is_retryable`]
/// and decide whether to back off and try again.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The backing store failed (connection loss, constraint violation, ...)
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No envelope with this identifier exists
    #[error("Outbox event not found: {0}")]
    NotFound(OutboxEventId),

    /// The envelope is in a status that does not allow the requested change
    #[error("Outbox event {id} cannot be modified while {status}")]
    ConcurrentModification {
        id: OutboxEventId,
        status: OutboxStatus,
    },

    /// A batch limit of zero was requested
    #[error("Invalid limit: {0} (must be at least 1)")]
    InvalidLimit(u32),

    /// An envelope payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OutboxError {
    /// Creates a Storage error without an underlying cause
    pub fn storage(message: impl Into<String>) -> Self {
        OutboxError::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Storage error wrapping the underlying cause
    pub fn storage_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OutboxError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if repeating the operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OutboxError::Storage { .. } | OutboxError::ConcurrentModification { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OutboxError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let id = OutboxEventId::generate();

        assert!(OutboxError::storage("connection reset").is_retryable());
        assert!(OutboxError::ConcurrentModification {
            id,
            status: OutboxStatus::InProgress
        }
        .is_retryable());
        assert!(!OutboxError::NotFound(id).is_retryable());
        assert!(!OutboxError::InvalidLimit(0).is_retryable());
    }

    #[test]
    fn test_messages_name_the_envelope() {
        let id = OutboxEventId::generate();
        let err = OutboxError::ConcurrentModification {
            id,
            status: OutboxStatus::Sent,
        };

        let text = err.to_string();
        assert!(text.contains(&id.to_string()));
        assert!(text.contains("SENT"));
    }
}
