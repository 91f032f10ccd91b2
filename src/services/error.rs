//! Service error taxonomy
//!
//! One closed enum shared by every service. Repositories report failures as
//! `anyhow::Error`, which `?` turns into `ServiceError::Internal`.

/// Error returned by service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Bearer token is malformed, forged or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Account inactive")]
    AccountInactive,

    /// Token subject no longer exists or was deactivated
    #[error("User not found or account inactive")]
    UserNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Moderation rule violation
    #[error("{0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Machine-readable kind used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::InvalidCredentials => "InvalidCredentials",
            ServiceError::InvalidToken => "InvalidToken",
            ServiceError::AccountInactive => "AccountInactive",
            ServiceError::UserNotFound => "UserNotFound",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::Conflict(_) => "Conflict",
            ServiceError::InvalidTransition(_) => "InvalidTransition",
            ServiceError::Internal(_) => "InternalError",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
