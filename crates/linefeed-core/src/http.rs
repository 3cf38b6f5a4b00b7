//! Single-shot HTTP GET with a request deadline.
//!
//! Uses async reqwest internally, driven by a shared tokio runtime,
//! but presents a sync interface so pipeline stages stay strictly sequential.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The only status accepted as a successful fetch
const STATUS_OK: u16 = 200;

/// HTTP failure with optional status code.
///
/// `status` is `None` for transport failures (refused connection, timeout,
/// broken body) where the server never produced a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "HTTP {s}: {}", self.message),
            None => write!(f, "HTTP error: {}", self.message),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so endpoints do not leak into logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    fn timed_out(timeout: Duration) -> Self {
        Self {
            status: None,
            message: format!("request timed out after {timeout:?}"),
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP GET → full response body.
///
/// Anything other than `200 OK` is an error carrying the status, including
/// other 2xx codes. `timeout` bounds the whole exchange (headers and body).
pub fn get_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>, HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let exchange = async {
            let response = SHARED_CLIENT
                .get(url)
                .send()
                .await
                .map_err(HttpError::from_reqwest)?;

            let status = response.status().as_u16();
            if status != STATUS_OK {
                let reason = response
                    .status()
                    .canonical_reason()
                    .unwrap_or("unexpected status");
                return Err(HttpError {
                    status: Some(status),
                    message: reason.to_string(),
                });
            }

            let body = response.bytes().await.map_err(|e| HttpError {
                status: Some(status),
                message: format!("failed to read body: {}", e.without_url()),
            })?;
            Ok(body.to_vec())
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::timed_out(timeout)),
        }
    })
}
