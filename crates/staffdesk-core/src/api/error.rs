use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Value of the `error` field the server uses for an expired access token.
pub const TOKEN_EXPIRED: &str = "token_expired";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication required: {0}")]
    AuthInvalid(String),

    #[error("HTTP {status}: {}", truncate_body(.body))]
    Http { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for response bodies in error messages and logs
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

/// JSON error body shape shared by the API's failure responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

/// Outcome of inspecting a 401 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Unauthorized {
    /// Access token expired; a refresh may recover.
    Expired,
    /// Any other rejection, with the server's reason.
    Denied(String),
}

impl Unauthorized {
    pub(crate) fn classify(body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        if parsed.error.as_deref() == Some(TOKEN_EXPIRED) {
            Unauthorized::Expired
        } else {
            Unauthorized::Denied(auth_reason(body))
        }
    }
}

/// Human-readable reason for a 401, preferring the server's own words.
pub(crate) fn auth_reason(body: &str) -> String {
    let parsed = ErrorBody::parse(body);
    parsed
        .message
        .or(parsed.error)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "Unauthorized".to_string()
            } else {
                truncate_body(trimmed)
            }
        })
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            ApiError::AuthInvalid(auth_reason(body))
        } else {
            ApiError::Http {
                status,
                body: body.to_string(),
            }
        }
    }

    /// True when the caller has to sign in again.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthInvalid(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthInvalid(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Message suitable for showing to the user: the server's literal
    /// `message`/`error` text when it sent one, otherwise the error itself.
    pub fn server_message(&self) -> String {
        match self {
            ApiError::AuthInvalid(reason) => reason.clone(),
            ApiError::Http { status, body } => {
                let parsed = ErrorBody::parse(body);
                parsed
                    .message
                    .or(parsed.error)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| {
                        if body.trim().is_empty() {
                            format!("HTTP {}", status.as_u16())
                        } else {
                            body.clone()
                        }
                    })
            }
            other => other.to_string(),
        }
    }
}
