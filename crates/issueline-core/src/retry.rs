//! Retry and backoff policy for paged fetching.
//!
//! The policy is a pure function from failure class to action, so the
//! runner's behavior under every failure mode is unit-testable without
//! touching the network.

use std::time::Duration;

use serde::Deserialize;

use crate::http::FetchErrorClass;

/// Exponential backoff for low-level fetch retries: base × 2^attempt.
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

/// What to do with an unclassified remote failure (4xx, decode errors).
///
/// `Skip` advances past the page, trading completeness for liveness;
/// `Abort` stops the project so nothing is silently lost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnclassifiedPolicy {
    #[default]
    Skip,
    Abort,
}

/// Orchestrator-level reaction to a classified fetch failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageAction {
    /// Sleep, then retry the same offset
    Retry(Duration),
    /// Advance to the next offset without data for this page
    Skip,
    /// Stop ingesting this project; the checkpoint stays valid
    Abort,
}

/// Map a failure class to the runner's next action.
///
/// Rate limits wait three base delays, server errors two — the remote
/// is answering, so the same offset is retried. Connectivity failures
/// abort outright. Everything else follows `policy`.
pub fn page_action(
    class: FetchErrorClass,
    base_delay: Duration,
    policy: UnclassifiedPolicy,
) -> PageAction {
    match class {
        FetchErrorClass::Connectivity => PageAction::Abort,
        FetchErrorClass::RateLimited => PageAction::Retry(base_delay * 3),
        FetchErrorClass::Server => PageAction::Retry(base_delay * 2),
        FetchErrorClass::Other => match policy {
            UnclassifiedPolicy::Skip => PageAction::Skip,
            UnclassifiedPolicy::Abort => PageAction::Abort,
        },
    }
}
