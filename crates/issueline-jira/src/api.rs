//! JIRA REST API client: one paged search query per call.

use std::time::Duration;

use serde_json::Value;

use issueline_core::http::{FetchError, SHARED_RUNTIME, http_client};
use issueline_core::retry::backoff_duration;

use crate::config::Config;

/// Per-request timeout for one paged search call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed field set requested from the search endpoint.
pub const SEARCH_FIELDS: &str =
    "key,summary,description,status,reporter,assignee,created,updated,comment";

/// How much of an error response body is kept in log messages.
const BODY_SNIPPET_LEN: usize = 200;

/// One page of raw issues plus the total the remote reported.
#[derive(Debug)]
pub struct PageResult {
    pub records: Vec<Value>,
    pub total: u64,
}

/// A source of raw issue pages.
///
/// The runner only sees this trait, so its failure handling is testable
/// with a scripted fetcher instead of a live endpoint.
pub trait PageFetcher {
    fn fetch_page(&self, project: &str, offset: u64, page_size: u64)
    -> Result<PageResult, FetchError>;
}

/// HTTP fetcher against a JIRA search endpoint.
#[derive(Debug)]
pub struct JiraClient {
    base_url: String,
    api_token: Option<String>,
    retry_count: u32,
    base_delay: Duration,
}

impl JiraClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            retry_count: config.retry_count.max(1),
            base_delay: config.base_delay,
        }
    }

    /// Issue the search request once, without retries.
    fn request_once(
        &self,
        project: &str,
        offset: u64,
        page_size: u64,
    ) -> Result<PageResult, FetchError> {
        let body = SHARED_RUNTIME.handle().block_on(async {
            let mut req = http_client()
                .get(format!("{}/search", self.base_url))
                .query(&[
                    ("jql", format!("project={project}")),
                    ("startAt", offset.to_string()),
                    ("maxResults", page_size.to_string()),
                    ("fields", SEARCH_FIELDS.to_string()),
                ])
                .timeout(REQUEST_TIMEOUT);
            if let Some(token) = &self.api_token {
                req = req.bearer_auth(token);
            }
            let resp = req.send().await.map_err(|e| FetchError::from_reqwest(&e))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(&e))?;
            if !status.is_success() {
                return Err(FetchError::Http {
                    status: Some(status.as_u16()),
                    message: snippet(&body),
                });
            }
            Ok(body)
        })?;
        parse_page(&body)
    }
}

impl PageFetcher for JiraClient {
    /// Fetch one page, transparently retrying retry-safe failures with
    /// exponential backoff before surfacing a classified error.
    fn fetch_page(
        &self,
        project: &str,
        offset: u64,
        page_size: u64,
    ) -> Result<PageResult, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.request_once(project, offset, page_size) {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry_count => {
                    attempt += 1;
                    let delay = backoff_duration(self.base_delay, attempt);
                    log::warn!(
                        "{project} offset {offset}: {e}, retry {attempt}/{} in {delay:?}",
                        self.retry_count - 1
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Parse a search response body into records plus the reported total.
fn parse_page(body: &str) -> Result<PageResult, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Http {
        status: None,
        message: format!("invalid response JSON: {e}"),
    })?;
    let total = value["total"].as_u64().ok_or_else(|| FetchError::Http {
        status: None,
        message: "response missing 'total'".to_string(),
    })?;
    let records = value["issues"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    Ok(PageResult { records, total })
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_valid() {
        let body = r#"{"startAt":0,"maxResults":2,"total":3,
            "issues":[{"key":"SPARK-1"},{"key":"SPARK-2"}]}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0]["key"], "SPARK-1");
    }

    #[test]
    fn parse_page_missing_total_is_error() {
        let err = parse_page(r#"{"issues":[]}"#).unwrap_err();
        assert!(format!("{err}").contains("total"));
    }

    #[test]
    fn parse_page_missing_issues_is_empty() {
        let page = parse_page(r#"{"total":0}"#).unwrap();
        assert!(page.records.is_empty());
    }

    #[test]
    fn parse_page_invalid_json() {
        assert!(parse_page("not json").is_err());
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        let s = snippet(&body);
        assert!(s.len() <= BODY_SNIPPET_LEN + 3);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn snippet_keeps_short_bodies() {
        assert_eq!(snippet(" short \n"), "short");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = Config {
            base_url: "https://example.org/rest/api/2/".to_string(),
            ..Config::default()
        };
        let client = JiraClient::new(&config);
        assert_eq!(client.base_url, "https://example.org/rest/api/2");
    }
}
