//! Error types for Whisper Synth.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::JobStatus;
use crate::validation::ValidationFailure;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a generation request.
#[derive(Error, Debug)]
pub enum Error {
    /// Client input or schema mismatch on an inbound payload
    #[error("Validation error: {0}")]
    Validation(ValidationFailure),

    /// Upstream transport or vendor failure
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// The remote job reached `failed` or `canceled`
    #[error("Job {job_id} {status}: {message}")]
    JobFailed {
        job_id: String,
        status: JobStatus,
        message: String,
    },

    /// Poll bound exceeded before the job became terminal
    #[error("Job {job_id} still running after {attempts} attempts ({elapsed:?})")]
    Timeout {
        job_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error code reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    ServiceError,
    TimeoutError,
    InternalError,
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Service(_) | Error::JobFailed { .. } => 502,
            Error::Timeout { .. } => 504,
            _ => 500,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation(_) => ErrorCode::ValidationError,
            Error::Service(_) | Error::JobFailed { .. } => ErrorCode::ServiceError,
            Error::Timeout { .. } => ErrorCode::TimeoutError,
            Error::Config(_) | Error::Serialization(_) | Error::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Message safe to show to the end user.
    ///
    /// Only validation failures carry caller-specific detail; everything else
    /// collapses to a fixed message so vendor payloads never reach the client.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(failure) => failure.message.clone(),
            Error::Service(_) => {
                "The music service is unavailable right now. Please try again.".to_string()
            }
            Error::JobFailed { .. } => "Music generation failed. Please try again.".to_string(),
            Error::Timeout { .. } => {
                "Music generation is taking too long. Please try again in a few minutes."
                    .to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<ValidationFailure> for Error {
    fn from(failure: ValidationFailure) -> Self {
        Error::Validation(failure)
    }
}

/// Failure talking to the generation service.
#[derive(Error, Debug)]
#[error("{operation} failed ({kind}): {message}")]
pub struct ServiceError {
    pub operation: &'static str,
    pub kind: ServiceErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Connection, TLS, timeout or body read failure
    Transport,
    /// Non-success HTTP status from the vendor
    Status(u16),
    /// Response body did not match the expected schema
    Schema,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErrorKind::Transport => write!(f, "transport"),
            ServiceErrorKind::Status(code) => write!(f, "HTTP {}", code),
            ServiceErrorKind::Schema => write!(f, "schema"),
        }
    }
}

impl ServiceError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: ServiceErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn status(operation: &'static str, code: u16, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: ServiceErrorKind::Status(code),
            message: message.into(),
        }
    }

    pub fn schema(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: ServiceErrorKind::Schema,
            message: message.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ServiceErrorKind::Transport => true,
            ServiceErrorKind::Status(code) => code == 429 || code >= 500,
            ServiceErrorKind::Schema => false,
        }
    }
}
