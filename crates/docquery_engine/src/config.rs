use std::time::Duration;

use url::Url;

use crate::ApiError;

/// Local development backend; every router is mounted under `/api`.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    pub user_agent: String,
    /// Applied to every request when set. The backend bounds request
    /// duration otherwise.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(&format!("{DEFAULT_BASE_URL}/")).expect("default base URL"),
            user_agent: format!("docquery/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            ..Self::default()
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path (no leading slash) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidUrl(format!("{path}: {err}")))
    }
}

/// Parses the base URL and guarantees a trailing slash so relative joins keep
/// the `/api` prefix.
pub fn normalize_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|err| ApiError::InvalidUrl(format!("{raw}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::InvalidUrl(format!(
            "{raw}: unsupported scheme {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_keep_api_prefix() {
        let config = ClientConfig::new("http://example.test:8000/api").unwrap();
        assert_eq!(
            config.endpoint("documents/").unwrap().as_str(),
            "http://example.test:8000/api/documents/"
        );
        assert_eq!(
            config.endpoint("/chat/sessions").unwrap().as_str(),
            "http://example.test:8000/api/chat/sessions"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(
            ClientConfig::new("ftp://example.test"),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
