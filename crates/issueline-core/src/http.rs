//! Shared HTTP client and the fetch failure taxonomy.
//!
//! Uses async reqwest behind a shared tokio runtime, exposed through a
//! sync `block_on` facade so callers stay on one thread of control.

use std::sync::LazyLock;
use std::time::Duration;

/// Connect timeout for the shared client
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a paged fetch failed, from the orchestrator's point of view.
///
/// The class decides what happens next: abort the project, pace and
/// retry the same offset, or apply the configured skip/abort policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorClass {
    /// Host unreachable / connection refused — retrying is futile
    Connectivity,
    /// HTTP 429 — back off hard, then retry the same offset
    RateLimited,
    /// HTTP 5xx — back off, then retry the same offset
    Server,
    /// Anything else (4xx, decode failures, ...) — policy-dependent
    Other,
}

/// Error from fetching one page of issues.
#[derive(Debug)]
pub enum FetchError {
    /// Response arrived but signalled failure, or the body did not parse
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Transport-level failure before any response
    Connect { message: String },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Connect { message } => write!(f, "connection failed: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Classify a reqwest error before any HTTP status is available.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect {
                message: e.to_string(),
            }
        } else {
            Self::Http {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }

    pub fn class(&self) -> FetchErrorClass {
        match self {
            Self::Connect { .. } => FetchErrorClass::Connectivity,
            Self::Http { status, .. } => match status {
                Some(429) => FetchErrorClass::RateLimited,
                Some(500..=599) => FetchErrorClass::Server,
                _ => FetchErrorClass::Other,
            },
        }
    }

    /// Whether a transparent low-level retry may help.
    ///
    /// Rate limits and server errors are retry-safe for an idempotent GET;
    /// connectivity failures and client errors are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            FetchErrorClass::RateLimited | FetchErrorClass::Server
        )
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});
