//! Issueline Core - Common infrastructure for issue-tracker ingestion
//!
//! This crate provides the shared pieces of the ingestion pipeline:
//! the HTTP client bridge, the fetch failure taxonomy, retry/backoff
//! policy, logging, progress reporting, and graceful shutdown.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use http::{FetchError, FetchErrorClass, SHARED_RUNTIME, http_client};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{PageAction, UnclassifiedPolicy, backoff_duration, page_action};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
