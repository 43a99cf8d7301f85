//! Error types for the client library.

use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the forwarding proxy.
///
/// The proxy answers `{"error": "...", "details": "..."}`; SAP gateways
/// sometimes nest the message as `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Short error text, or a nested detail object.
    pub error: ErrorField,
    /// Longer explanation, if any.
    #[serde(default)]
    pub details: Option<String>,
}

/// The `error` member of an [`ErrorResponse`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    /// Plain message.
    Text(String),
    /// Nested object carrying a message.
    Detail {
        /// The error message text.
        message: String,
    },
}

impl ErrorResponse {
    /// Flattens the body into a single message.
    #[must_use]
    pub fn into_message(self) -> String {
        let error = match self.error {
            ErrorField::Text(text) | ErrorField::Detail { message: text } => text,
        };
        match self.details {
            Some(details) if !details.is_empty() => format!("{error}: {details}"),
            _ => error,
        }
    }
}

/// Errors that can occur when talking to the SAP workflow API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The resource endpoint answered HTTP 401.
    ///
    /// The cached token has already been discarded when this is returned;
    /// calling again fetches a fresh token.
    #[error("Authentication expired. Please refresh and try again.")]
    AuthExpired,

    /// No response was received.
    ///
    /// Covers refused connections, DNS failures and timeouts. In a browser
    /// deployment this is also how a missing CORS proxy shows up.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with a non-success status.
    #[error("Request failed{}: {message}", status_suffix(.status.as_ref()))]
    RequestFailed {
        /// HTTP status code, if one was received.
        status: Option<u16>,
        /// Message extracted from the response.
        message: String,
    },

    /// The server accepted the decision but did not complete the task.
    #[error(
        "Decision for {instance_id} was not completed. Status: {}",
        .status.as_deref().unwrap_or("none")
    )]
    DecisionRejected {
        /// Workflow instance the decision was sent for.
        instance_id: String,
        /// Status reported by the server, if any.
        status: Option<String>,
    },

    /// The token endpoint refused to issue a token.
    #[error("Token request failed{}: {message}", status_suffix(.status.as_ref()))]
    TokenRequestFailed {
        /// HTTP status code, if one was received.
        status: Option<u16>,
        /// Message extracted from the response.
        message: String,
    },

    /// Client configuration issue.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Unexpected or malformed response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Check if this is an expired-authentication error.
    #[must_use]
    pub const fn is_authentication_error(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// Check if no response was received.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::NetworkError(_))
    }

    /// Classifies a transport error from reqwest.
    ///
    /// Errors without a response (connect, timeout, request building on
    /// the wire) become [`ClientError::NetworkError`]; anything carrying a
    /// status becomes [`ClientError::RequestFailed`].
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::NetworkError(format!("request timed out: {err}"));
        }
        match err.status() {
            Some(status) => Self::RequestFailed {
                status: Some(status.as_u16()),
                message: err.to_string(),
            },
            None => Self::NetworkError(err.to_string()),
        }
    }
}

fn status_suffix(status: Option<&u16>) -> String {
    status.map_or_else(String::new, |s| format!(" with status {s}"))
}

/// Extracts a human-readable message from an error response body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.into_message();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
