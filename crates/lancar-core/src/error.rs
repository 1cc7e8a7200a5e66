use thiserror::Error;
use uuid::Uuid;

/// Failure classes surfaced by the directory boundary. Conflict and
/// Validation messages are written for end users and shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoaError {
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("account {0} not found")]
    NotFound(Uuid),
    #[error("network failure: {0}")]
    Network(String),
    #[error("server error: {0}")]
    Server(String),
}

impl CoaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// Violations of the tree shape the directory guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureViolation {
    #[error("postable account {code} has sub-accounts")]
    LeafWithChildren { code: String },
    #[error("account {code} does not reference its parent")]
    ParentMismatch { code: String },
    #[error("account code {code} appears more than once")]
    DuplicateCode { code: String },
    #[error("sub-account {code} does not share its header's type")]
    TypeMismatch { code: String },
}
