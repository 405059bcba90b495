//! Directory Error Types

use thiserror::Error;

/// Error taxonomy for the directory service.
///
/// Every failure a caller can observe maps to exactly one of these kinds,
/// so a transport layer can translate them to stable status codes via
/// [`DirectoryError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// A zero or malformed identifier argument.
    #[error("invalid ID")]
    InvalidId,

    /// The handle failed syntax validation.
    #[error("invalid handle")]
    InvalidHandle,

    /// Another role already owns this handle.
    #[error("role handle not unique")]
    HandleNotUnique,

    /// Another role already owns this name.
    #[error("role name not unique")]
    NameNotUnique,

    /// No role matched the given identifier.
    #[error("role not found")]
    NotFound,

    /// The acting identity may not perform this operation on the role.
    #[error("not allowed to access this role")]
    NoPermission,

    /// The acting identity may not create roles.
    #[error("not allowed to create roles")]
    NoCreatePermission,

    /// The acting identity may not update this role.
    #[error("not allowed to update this role")]
    NoUpdatePermission,

    /// Ad hoc denial, forwarded with its message (member management).
    #[error("{0}")]
    NotAllowed(String),

    /// The backing store failed.
    #[error("store error: {message}")]
    Store { message: String },
}

impl DirectoryError {
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::NotAllowed(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Suggested HTTP status code for transport-layer mapping.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidId | Self::InvalidHandle => 400,
            Self::HandleNotUnique | Self::NameNotUnique => 409,
            Self::NotFound => 404,
            Self::NoPermission
            | Self::NoCreatePermission
            | Self::NoUpdatePermission
            | Self::NotAllowed(_) => 403,
            Self::Store { .. } => 500,
        }
    }
}

impl From<mongodb::error::Error> for DirectoryError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
