//! Shared reqwest plumbing for the profile store, members service and token
//! clients.

use std::time::Duration;

use reqwest::{Client, Response, Url};

use crate::error::SyncError;

/// Build the HTTP client used by every outbound call.
///
/// The timeout applies to the whole request; expiry surfaces as a transient
/// error from the calling component.
pub fn build_client(timeout: Duration) -> Result<Client, SyncError> {
    Client::builder()
        .user_agent(concat!("skillsync/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))
}

/// Parse a configured base URL, rejecting ones that cannot take path
/// segments (e.g. `mailto:`).
pub fn parse_base_url(raw: &str) -> Result<Url, SyncError> {
    let url = Url::parse(raw).map_err(|e| SyncError::Config(format!("invalid URL '{raw}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(SyncError::Config(format!(
            "URL '{raw}' cannot be used as a base"
        )));
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base`.
pub fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Human-readable reason for a transport-level failure.
pub fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_decode() {
        format!("invalid response body: {err}")
    } else {
        err.to_string()
    }
}

/// Reason string for a non-success response, including a bounded body
/// excerpt.
pub async fn describe_status(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    if excerpt.is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {excerpt}")
    }
}

/// Render a query for logs and error messages: `/users?handle=jdoe`.
pub fn display_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{path}?{}", query.join("&"))
}
