use docquery_core::ValidationError;
use serde::Serialize;

/// Message used when a transport error carries no text of its own.
pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Decode(String),
    #[error("No response body")]
    NoBody,
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub(crate) fn network(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            let text = inner.to_string();
            if !text.is_empty() && !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = inner.source();
        }
        Self::from_message(message)
    }

    pub(crate) fn from_message(message: String) -> Self {
        if message.trim().is_empty() {
            ApiError::Network(UNKNOWN_ERROR.to_string())
        } else {
            ApiError::Network(message)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// Tagged outcome envelope: `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_matches_contract() {
        assert_eq!(
            ApiError::HttpStatus(503).to_string(),
            "HTTP error! status: 503"
        );
    }

    #[test]
    fn empty_transport_message_falls_back() {
        assert_eq!(
            ApiError::from_message("  ".to_string()),
            ApiError::Network(UNKNOWN_ERROR.to_string())
        );
    }

    #[test]
    fn envelope_from_failure_has_no_data() {
        let response: ApiResponse<u32> = Err(ApiError::HttpStatus(404)).into();
        assert!(!response.success);
        assert_eq!(response.data, None);
        assert_eq!(response.error.as_deref(), Some("HTTP error! status: 404"));
    }
}
