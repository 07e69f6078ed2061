//! Error types for calls against the answering service.

use serde::Deserialize;
use thiserror::Error;

/// Failure of a single gateway round trip.
///
/// Every variant is converted to text at the operation boundary with
/// [`GatewayError::user_message`]; none of them reach the UI as a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request could not be sent or the response could not be received.
    #[error("request failed: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },
    /// Required input was missing; no request was made.
    #[error("{0}")]
    Validation(String),
    /// A success response whose body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Shape of the JSON error bodies produced by the service's exception handler.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    /// Concise description of a `Service` body.
    ///
    /// The service replies with either plain text or `{"error", "message"}`;
    /// prefer the human message, then the error code, then the raw text.
    pub fn detail(&self) -> Option<String> {
        let GatewayError::Service { body, .. } = self else {
            return None;
        };
        let trimmed = body.trim();
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed) {
            if let Some(msg) = parsed.message.filter(|m| !m.trim().is_empty()) {
                return Some(msg);
            }
            if let Some(code) = parsed.error.filter(|e| !e.trim().is_empty()) {
                return Some(code);
            }
        }
        Some(trimmed.to_string())
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Transport(msg) => format!("could not reach the service ({})", msg),
            GatewayError::Service { status, .. } => match self.detail() {
                Some(detail) if !detail.is_empty() => {
                    format!("service returned {}: {}", status, detail)
                }
                _ => format!("service returned {}", status),
            },
            GatewayError::Validation(msg) => msg.clone(),
            GatewayError::Decode(msg) => format!("unexpected response from the service ({})", msg),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}
