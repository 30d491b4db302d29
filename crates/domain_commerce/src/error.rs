//! Commerce domain errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors raised while building or validating canonical commerce data
#[derive(Debug, Error)]
pub enum CommerceError {
    /// A DTO failed its validation rules
    #[error("Invalid {entity}: {message}")]
    Invalid {
        entity: &'static str,
        message: String,
    },

    /// A DTO could not be encoded into an event payload
    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CommerceError {
    pub fn invalid(entity: &'static str, errors: &validator::ValidationErrors) -> Self {
        CommerceError::Invalid {
            entity,
            message: errors.to_string(),
        }
    }
}

impl From<CommerceError> for PortError {
    fn from(error: CommerceError) -> Self {
        match error {
            CommerceError::Invalid { entity, message } => {
                PortError::validation_field(message, entity)
            }
            CommerceError::Encoding(e) => PortError::Transformation {
                message: e.to_string(),
            },
        }
    }
}
