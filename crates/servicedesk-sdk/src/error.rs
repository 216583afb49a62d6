//! Error types for Service Desk SDK operations.
//!
//! Errors carry enough classification for callers to decide whether a retry
//! makes sense. The SDK itself never retries.

use thiserror::Error;

/// Errors during Service Desk API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from the Service Desk API.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// The request was invalid (client error).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Authentication to the Service Desk API failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The automation account lacks permission for the operation.
    #[error("Authorization failed")]
    AuthorizationFailed,

    /// The requested resource was not found.
    #[error("Resource not found")]
    NotFound,

    /// The site URL could not be used to build a request.
    #[error("Invalid site URL '{url}': {message}")]
    InvalidSiteUrl { url: String, message: String },

    /// The project key has no matching service desk.
    #[error("No service desk found for project {project_key}")]
    ServiceDeskNotFound { project_key: String },

    /// The requested workflow transition is not available for the issue.
    #[error("Transition to '{status}' is not available for {issue_key}")]
    TransitionUnavailable { issue_key: String, status: String },

    /// Client construction or configuration failed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Failed to parse a JSON response.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, timeout, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient conditions include:
    /// - Server errors (5xx)
    /// - Rate limiting (429)
    /// - Network/transport errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidRequest { .. } => false,
            Self::AuthenticationFailed => false,
            Self::AuthorizationFailed => false,
            Self::NotFound => false,
            Self::InvalidSiteUrl { .. } => false,
            Self::ServiceDeskNotFound { .. } => false,
            Self::TransitionUnavailable { .. } => false,
            Self::Configuration { .. } => false,
            Self::JsonError(_) => false,
            Self::HttpClientError(_) => true,
        }
    }

    /// Build an error from a non-success HTTP status and its response text.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest { message },
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 => Self::NotFound,
            _ => Self::HttpError { status, message },
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing.
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field has an invalid format.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
