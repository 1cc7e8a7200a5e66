use lancar_core::CoaError;

/// Transient user-visible notification (rendered as a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Validation and conflict messages are server-authored and shown
    /// verbatim; transport and server failures get generic wording.
    pub fn from_error(err: &CoaError) -> Self {
        match err {
            CoaError::Validation { message, .. } => Self::error(message.clone()),
            CoaError::Conflict(message) => Self::error(message.clone()),
            CoaError::NotFound(_) => {
                Self::error("the account no longer exists, refresh and try again")
            }
            CoaError::Network(_) => Self::error("could not reach the server, check your connection"),
            CoaError::Server(_) => Self::error("something went wrong on the server, try again later"),
        }
    }
}
