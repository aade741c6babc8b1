//! HTTP transport for fetching collection items and pages.
//!
//! [`HttpClient`] wraps one pooled `reqwest::Client` with the timeouts,
//! retry policy, User-Agent and proxy settings from a [`TransportConfig`].
//! The orchestrator depends only on the [`Transport`] trait so it can be
//! driven by any fetcher.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, parse_retry_after};
use crate::user_agent;

/// Transport settings, passed explicitly to [`HttpClient::new`].
///
/// Default configuration:
/// - Connect timeout: 5 seconds
/// - Read timeout: 5 seconds
/// - Retry policy: [`RetryPolicy::default`]
/// - User-Agent: a random Chrome User-Agent chosen at construction
/// - Proxies: discovered from the environment
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed between reads of the response.
    pub read_timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry_policy: RetryPolicy,
    /// Fixed User-Agent; `None` picks a random browser User-Agent.
    pub user_agent: Option<String>,
    /// Route requests through proxies named in `HTTPS_PROXY`/`HTTP_PROXY`/`ALL_PROXY`.
    pub use_env_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            retry_policy: RetryPolicy::default(),
            user_agent: None,
            use_env_proxy: true,
        }
    }
}

/// A fully received response body with the headers the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    /// Response body.
    pub bytes: Vec<u8>,
    /// Declared Content-Type, if any.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
}

impl FetchedItem {
    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Fetches remote items.
///
/// Implementations own their retry behaviour: an `Err` means the item is
/// not going to be fetched in this run.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` in full.
    async fn fetch(&self, url: &str) -> Result<FetchedItem, DownloadError>;
}

/// HTTP client with bounded retry, timeouts and a per-instance User-Agent.
///
/// Create one per collection run (or share one across runs); clones share
/// the connection pool.
///
/// # Example
///
/// ```no_run
/// use multporn_core::download::{HttpClient, Transport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new(TransportConfig::default());
/// let item = client.fetch("https://multporn.net/comics/between_friends").await?;
/// println!("{} bytes of {:?}", item.bytes.len(), item.content_type);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
    user_agent: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl HttpClient {
    /// Creates a new HTTP client from the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build (TLS backend
    /// initialization). Use [`try_new`](Self::try_new) to handle that case.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: TransportConfig) -> Self {
        Self::try_new(config).expect("failed to build HTTP client")
    }

    /// Creates a new HTTP client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the underlying client cannot be built.
    #[instrument(level = "debug", skip(config))]
    pub fn try_new(config: TransportConfig) -> Result<Self, reqwest::Error> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::random_chrome_user_agent);
        let client = build_client(&config, &user_agent)?;
        debug!(
            user_agent = %user_agent,
            connect_timeout_ms = config.connect_timeout.as_millis(),
            read_timeout_ms = config.read_timeout.as_millis(),
            retries = config.retry_policy.total(),
            env_proxy = config.use_env_proxy,
            "built HTTP transport"
        );
        Ok(Self {
            client,
            retry_policy: config.retry_policy,
            user_agent,
        })
    }

    /// User-Agent sent with every request from this client.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Retry policy applied by [`fetch`](Transport::fetch).
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fetches a page and decodes it as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch`](Transport::fetch).
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        Ok(self.fetch(url).await?.text())
    }

    /// Single GET without retry.
    async fn fetch_once(&self, url: &str) -> Result<FetchedItem, DownloadError> {
        let parsed_url = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed_url)
            .send()
            .await
            .map_err(|e| map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let final_url = response.url().to_string();

        let bytes = read_body(response, url, content_length).await?;

        if let Some(expected) = content_length
            && expected != bytes.len() as u64
        {
            return Err(DownloadError::integrity(url, expected, bytes.len() as u64));
        }

        Ok(FetchedItem {
            bytes,
            content_type,
            final_url,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    /// Fetches `url`, retrying forcelisted statuses and connection failures.
    ///
    /// # Errors
    ///
    /// Returns the last `DownloadError` once the policy gives up, or the
    /// first non-retryable one.
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedItem, DownloadError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let error = match self.fetch_once(url).await {
                Ok(item) => return Ok(item),
                Err(e) => e,
            };

            let failure_type = self.retry_policy.classify(&error);
            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let retry_after = retry_after_delay(&error);
                    let delay = retry_after.map_or(backoff_delay, |ra| ra.max(backoff_delay));
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        retries = self.retry_policy.total(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying fetch");
                    return Err(error);
                }
            }
        }
    }
}

fn map_send_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Reads the whole response body, chunk by chunk.
///
/// A connection that ends before the declared `expected` length is an
/// integrity failure rather than a network one.
async fn read_body(
    response: reqwest::Response,
    url: &str,
    expected: Option<u64>,
) -> Result<Vec<u8>, DownloadError> {
    let mut body = Vec::with_capacity(
        response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0),
    );
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) if e.is_timeout() => return Err(DownloadError::timeout(url)),
            Err(e) => {
                return Err(match expected {
                    Some(expected) if (body.len() as u64) < expected => {
                        debug!(url, error = %e, "body ended early");
                        DownloadError::integrity(url, expected, body.len() as u64)
                    }
                    _ => DownloadError::network(url, e),
                });
            }
        };
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn retry_after_delay(error: &DownloadError) -> Option<Duration> {
    match error {
        DownloadError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

fn build_client(config: &TransportConfig, user_agent: &str) -> Result<Client, reqwest::Error> {
    // System proxy lookup is bypassed; only the environment is consulted.
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .gzip(true)
        .user_agent(user_agent)
        .no_proxy();
    if config.use_env_proxy {
        builder = apply_env_proxy(builder);
    }
    builder.build()
}

fn apply_env_proxy(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        debug!(proxy = %proxy, "using HTTPS proxy from environment");
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        debug!(proxy = %proxy, "using HTTP proxy from environment");
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarRestore {
        name: &'static str,
        previous: Option<String>,
    }

    impl EnvVarRestore {
        fn set(name: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(name).ok();
            // SAFETY: test uses process-local lock to avoid concurrent env mutation.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
            Self { name, previous }
        }
    }

    impl Drop for EnvVarRestore {
        fn drop(&mut self) {
            // SAFETY: paired restoration under process-local test lock.
            unsafe {
                match &self.previous {
                    Some(previous) => std::env::set_var(self.name, previous),
                    None => std::env::remove_var(self.name),
                }
            }
        }
    }

    fn fast_client(total: u32) -> HttpClient {
        HttpClient::new(TransportConfig {
            retry_policy: RetryPolicy::with_total(total).backoff_factor(Duration::ZERO),
            use_env_proxy: false,
            ..TransportConfig::default()
        })
    }

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert!(config.user_agent.is_none());
        assert!(config.use_env_proxy);
    }

    #[test]
    fn test_env_proxy_for_scheme_prefers_specific_proxy_var() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        let _restore_https = EnvVarRestore::set("HTTPS_PROXY", Some("http://proxy.example:8443"));
        let _restore_all = EnvVarRestore::set("ALL_PROXY", Some("http://all.example:8080"));

        assert_eq!(
            env_proxy_for_scheme("https"),
            Some("http://proxy.example:8443".to_string())
        );
    }

    #[test]
    fn test_env_proxy_blank_values_ignored() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        let _restore_http = EnvVarRestore::set("HTTP_PROXY", Some("   "));
        let _restore_lower = EnvVarRestore::set("http_proxy", None);
        let _restore_all = EnvVarRestore::set("ALL_PROXY", None);
        let _restore_all_lower = EnvVarRestore::set("all_proxy", None);

        assert_eq!(env_proxy_for_scheme("http"), None);
        assert_eq!(env_proxy_for_scheme("ftp"), None);
    }

    #[test]
    fn test_user_agent_fixed_per_client() {
        let client = HttpClient::new(TransportConfig {
            use_env_proxy: false,
            ..TransportConfig::default()
        });
        assert!(client.user_agent().contains("Chrome/"));
        assert_eq!(client.clone().user_agent(), client.user_agent());
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(b"PNGDATA".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let client = fast_client(0);
        let item = client
            .fetch(&format!("{}/page.png", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(item.bytes, b"PNGDATA");
        assert_eq!(item.content_type.as_deref(), Some("image/png"));
        assert!(item.final_url.ends_with("/page.png"));
    }

    #[tokio::test]
    async fn test_fetch_retries_forcelisted_status_then_succeeds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(b"JPEG".to_vec()),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = fast_client(5);
        let item = client
            .fetch(&format!("{}/flaky.jpg", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(item.bytes, b"JPEG");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_total_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = fast_client(2);
        let result = client.fetch(&format!("{}/down", mock_server.uri())).await;

        match result {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 502),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry_non_forcelisted_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = fast_client(5);
        let result = client.fetch(&format!("{}/missing", mock_server.uri())).await;

        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_body_shorter_than_content_length_is_integrity_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: 100\r\nConnection: close\r\n\r\nabc",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        // One accepted connection only: a retry would fail with a network error.
        let client = fast_client(3);
        let result = client.fetch(&format!("http://{addr}/page.jpg")).await;
        match result {
            Err(DownloadError::Integrity {
                expected_bytes,
                actual_bytes,
                ..
            }) => {
                assert_eq!(expected_bytes, 100);
                assert!(actual_bytes <= 3);
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let client = fast_client(5);
        let result = client.fetch("not-a-valid-url").await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_same_user_agent_sent_on_every_request() {
        let mock_server = MockServer::start().await;
        let client = fast_client(0);

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&mock_server)
            .await;

        client.fetch(&format!("{}/a", mock_server.uri())).await.unwrap();
        client.fetch(&format!("{}/b", mock_server.uri())).await.unwrap();

        // The generated value contains a comma, so compare raw header bytes.
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            let sent = request.headers.get("user-agent").unwrap();
            assert_eq!(sent.as_bytes(), client.user_agent().as_bytes());
        }
    }

    #[tokio::test]
    async fn test_configured_user_agent_overrides_random() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "custom-agent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new(TransportConfig {
            user_agent: Some("custom-agent/1.0".to_string()),
            use_env_proxy: false,
            ..TransportConfig::default()
        });
        assert_eq!(client.user_agent(), "custom-agent/1.0");
        client.fetch(&format!("{}/x", mock_server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_text_decodes_utf8() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/comics/x"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=utf-8")
                    .set_body_string("<html>héllo</html>"),
            )
            .mount(&mock_server)
            .await;

        let client = fast_client(0);
        let text = client
            .get_text(&format!("{}/comics/x", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "<html>héllo</html>");
    }

    #[tokio::test]
    async fn test_read_timeout_is_transient_and_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"data".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new(TransportConfig {
            read_timeout: Duration::from_millis(300),
            retry_policy: RetryPolicy::with_total(1).backoff_factor(Duration::ZERO),
            use_env_proxy: false,
            ..TransportConfig::default()
        });
        let result = client.fetch(&format!("{}/slow", mock_server.uri())).await;
        assert!(result.is_err(), "expected timeout or network error");
    }

    #[test]
    fn test_retry_after_delay_only_for_status_errors() {
        let with_header = DownloadError::http_status_with_retry_after(
            "http://example.com",
            429,
            Some("3".to_string()),
        );
        assert_eq!(retry_after_delay(&with_header), Some(Duration::from_secs(3)));
        assert_eq!(
            retry_after_delay(&DownloadError::timeout("http://example.com")),
            None
        );
    }
}
