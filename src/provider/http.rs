use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a page from a provider.
///
/// None of these reach the presentation layer: the feed layer logs them and
/// degrades to an empty or unchanged feed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response body was not valid JSON for the provider schema
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Configured base URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Base URL is plain HTTP and not a loopback host
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    /// The fetch task panicked before producing a result
    #[error("Fetch task panicked: {0}")]
    Panicked(String),
}

/// Transport limits shared by every provider adapter.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_response_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            max_response_bytes: 5 * 1024 * 1024, // 5MB
        }
    }
}

/// Parses a provider base URL and rejects plain HTTP for non-loopback hosts.
///
/// API keys travel in the query string (Tenor) or the path (Klipy), so a
/// cleartext base URL would leak them.
pub(crate) fn validate_base_url(base: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(base.trim_end_matches('/'))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if is_localhost {
                tracing::warn!(base_url = %url, "Using non-HTTPS provider base URL (localhost only)");
                Ok(url)
            } else {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS provider base URL");
                Err(ProviderError::InsecureBaseUrl)
            }
        }
        _ => Err(ProviderError::InsecureBaseUrl),
    }
}

/// Builds the HTTP client shared by every adapter.
///
/// Follows at most 3 redirects and rejects loops. Redirect hops are logged
/// by host only.
pub fn build_client() -> Result<reqwest::Client, ProviderError> {
    let client = reqwest::Client::builder()
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to_host = url.host_str().unwrap_or("unknown"),
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Builds a URL from `base` and the query pairs, omitting pairs whose value
/// is empty.
pub(crate) fn with_query(base: &str, params: &[(&str, String)]) -> Result<Url, ProviderError> {
    let non_empty = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (*key, value.as_str()));
    Ok(Url::parse_with_params(base, non_empty)?)
}

/// GETs `url` and returns the body bytes.
///
/// 429 and 5xx responses are retried with exponential backoff; other
/// non-2xx statuses fail immediately. `label` identifies the request in
/// logs in place of the URL, which may embed credentials.
pub(crate) async fn get_bytes(
    client: &reqwest::Client,
    url: &Url,
    settings: &HttpSettings,
    label: &str,
) -> Result<Vec<u8>, ProviderError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(settings.timeout, client.get(url.as_str()).send())
            .await
            .map_err(|_| ProviderError::Timeout)?
            .map_err(ProviderError::Network)?;

        let status = response.status();
        let retryable =
            status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

        if retryable {
            if retry_count >= settings.max_retries {
                return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    ProviderError::RateLimited(settings.max_retries)
                } else {
                    ProviderError::HttpStatus(status.as_u16())
                });
            }

            let delay = settings
                .retry_backoff
                .saturating_mul(1u32.checked_shl(retry_count).unwrap_or(u32::MAX));
            tracing::warn!(
                request = label,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Provider request failed, retrying after delay"
            );

            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        return read_limited_bytes(response, settings.max_response_bytes).await;
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ProviderError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ProviderError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ProviderError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ProviderError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings() -> HttpSettings {
        HttpSettings {
            retry_backoff: Duration::ZERO,
            ..HttpSettings::default()
        }
    }

    #[test]
    fn test_https_base_url_allowed() {
        assert!(validate_base_url("https://tenor.googleapis.com/v2").is_ok());
    }

    #[test]
    fn test_http_base_url_rejected() {
        assert!(matches!(
            validate_base_url("http://evil.com/v2"),
            Err(ProviderError::InsecureBaseUrl)
        ));
    }

    #[test]
    fn test_localhost_base_url_allowed() {
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("http://localhost:8080/").is_ok());
    }

    #[test]
    fn test_unparseable_base_url_rejected() {
        assert!(matches!(
            validate_base_url("not a url"),
            Err(ProviderError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_with_query_omits_empty_values() {
        let url = with_query(
            "https://example.com/search",
            &[("key", "abc".to_string()), ("q", String::new()), ("limit", "30".to_string())],
        )
        .unwrap();
        assert_eq!(url.query(), Some("key=abc&limit=30"));
    }

    #[tokio::test]
    async fn test_get_bytes_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let bytes = get_bytes(&reqwest::Client::new(), &url, &fast_settings(), "test")
            .await
            .unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[tokio::test]
    async fn test_get_bytes_404_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = get_bytes(&reqwest::Client::new(), &url, &fast_settings(), "test").await;
        assert!(matches!(result, Err(ProviderError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_get_bytes_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3) // Initial request + 2 retries
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = get_bytes(&reqwest::Client::new(), &url, &fast_settings(), "test").await;
        assert!(matches!(result, Err(ProviderError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_get_bytes_429_reports_rate_limited() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = get_bytes(&reqwest::Client::new(), &url, &fast_settings(), "test").await;
        assert!(matches!(result, Err(ProviderError::RateLimited(2))));
    }

    #[tokio::test]
    async fn test_get_bytes_503_retry_then_success() {
        use wiremock::matchers::any;

        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let bytes = get_bytes(&reqwest::Client::new(), &url, &fast_settings(), "test")
            .await
            .unwrap();
        assert_eq!(bytes, b"[]");
    }

    #[tokio::test]
    async fn test_get_bytes_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let settings = HttpSettings {
            max_response_bytes: 16,
            ..fast_settings()
        };
        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = get_bytes(&reqwest::Client::new(), &url, &settings, "test").await;
        assert!(matches!(result, Err(ProviderError::ResponseTooLarge(16))));
    }
}
