//! Shared error types for the services crate.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

use cert_core::model::{QuestionError, QuizError};

/// Errors emitted by the authenticated request layer.
///
/// Every network-origin failure is returned to the immediate caller;
/// nothing is swallowed or routed through a global handler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The request never reached the server, or the connection dropped
    /// before a response arrived.
    #[error("request failed before reaching the server")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server responded with {status}: {status_text}")]
    Http {
        status: StatusCode,
        status_text: String,
    },

    /// The server answered 2xx but the body did not match the expected
    /// shape.
    #[error("failed to decode response body")]
    Decode(#[source] reqwest::Error),

    #[error("invalid request url: {0}")]
    InvalidUrl(url::ParseError),
}

impl RequestError {
    /// HTTP status of the response, when the server was reached.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Message suitable for direct display.
    ///
    /// 4xx responses surface their status text verbatim (user-actionable);
    /// 5xx and transport failures map to a generic retry prompt.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RequestError::Network(_) => {
                "could not reach the server, check your connection and try again".to_string()
            }
            RequestError::Http { status, status_text } if status.is_client_error() => {
                if status_text.is_empty() {
                    status.to_string()
                } else {
                    status_text.clone()
                }
            }
            RequestError::Http { .. } | RequestError::Decode(_) | RequestError::InvalidUrl(_) => {
                "something went wrong, try again".to_string()
            }
        }
    }
}

/// Errors emitted by credential persistence adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialStoreError {
    #[error("failed to access credential storage")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode credentials")]
    Serde(#[from] serde_json::Error),
}

/// Errors emitted while reading API configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiConfigError {
    #[error("CERTQUIZ_API_BASE_URL is not set")]
    MissingBaseUrl,
    #[error("invalid API base URL")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Errors emitted by `QuizFlowService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizFlowError {
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A cache-mediated read produced no usable data. The original error
    /// is shared because other subscribers to the same entry see it too.
    #[error("cached read failed: {0}")]
    CachedRead(Arc<RequestError>),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Errors emitted while bootstrapping client services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientServicesError {
    #[error(transparent)]
    Config(#[from] ApiConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_surface_status_text_verbatim() {
        let err = RequestError::Http {
            status: StatusCode::CONFLICT,
            status_text: "Conflict".to_string(),
        };
        assert_eq!(err.user_message(), "Conflict");
    }

    #[test]
    fn server_errors_map_to_generic_retry_prompt() {
        let err = RequestError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            status_text: "Internal Server Error".to_string(),
        };
        assert_eq!(err.user_message(), "something went wrong, try again");
    }

    #[test]
    fn unauthorized_is_detectable_without_matching() {
        let err = RequestError::Http {
            status: StatusCode::UNAUTHORIZED,
            status_text: "Unauthorized".to_string(),
        };
        assert!(err.is_unauthorized());
    }
}
