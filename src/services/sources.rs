use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::models::{Posting, SearchCriteria};

pub const RAPIDAPI_KEY_HEADER: &str = "x-rapidapi-key";
pub const RAPIDAPI_HOST_HEADER: &str = "x-rapidapi-host";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A job board or job API that can be searched for postings
///
/// Implementations never fail: transport and API errors are logged and
/// yield whatever postings were collected (usually none).
#[async_trait]
pub trait PostingSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Search for at most `limit` postings matching the criteria
    async fn search(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Posting>;
}

/// Build the shared HTTP client for upstream APIs
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// True when the requested job nature is remote work
pub(crate) fn wants_remote(criteria: &SearchCriteria) -> bool {
    criteria
        .job_nature
        .as_deref()
        .map(|n| n.trim().eq_ignore_ascii_case("remote"))
        .unwrap_or(false)
}

/// True when the requested job nature is on-site work
pub(crate) fn wants_onsite(criteria: &SearchCriteria) -> bool {
    criteria
        .job_nature
        .as_deref()
        .map(|n| n.trim().eq_ignore_ascii_case("onsite"))
        .unwrap_or(false)
}

/// Non-empty string from a JSON field that may hold a string or a number
pub(crate) fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number from a JSON field that may hold a number or a numeric string
pub(crate) fn number_field(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite() && *n > 0.0)
}

/// Boolean from a JSON field that may hold a bool or "true"/"false"
pub(crate) fn flag_field(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
