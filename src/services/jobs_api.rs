use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::rate_limiter::{RateLimiter, RetryPolicy};
use crate::core::salary::{parse_requested_range, salary_in_range, SalaryRange};
use crate::models::{Posting, SearchCriteria};
use crate::services::sources::{
    build_http_client, number_field, text_field, wants_onsite, wants_remote, PostingSource,
    DEFAULT_REQUEST_TIMEOUT, RAPIDAPI_HOST_HEADER, RAPIDAPI_KEY_HEADER,
};
use crate::services::UpstreamError;

/// Rate-limit bucket for the Jobs API
pub const JOBS_API: &str = "jobs_api";

pub const DEFAULT_JOBS_API_BASE_URL: &str = "https://jobs-api14.p.rapidapi.com";
pub const DEFAULT_JOBS_API_HOST: &str = "jobs-api14.p.rapidapi.com";
pub const DEFAULT_LOCATION: &str = "United States";

/// Value of `Posting::source` for Jobs API results
pub const JOBS_API_SOURCE: &str = "Jobs API";

const EMPLOYMENT_TYPES: &str = "fulltime;parttime;intern;contractor";
const MIN_DESCRIPTION_CHARS: usize = 10;
const REMOTE_HINT_CHARS: usize = 200;
const DEFAULT_CURRENCY: &str = "USD";

/// Jobs API (RapidAPI) client, an aggregator of job-board listings
pub struct JobsApiSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    base_url: String,
    host: String,
    api_key: Option<String>,
}

impl JobsApiSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            limiter,
            retry_policy: RetryPolicy::default(),
            base_url: base_url.into(),
            host: DEFAULT_JOBS_API_HOST.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn search_params(&self, criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
        vec![
            ("query", criteria.position.clone()),
            (
                "location",
                criteria
                    .location
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            ),
            ("autoTranslateLocation", "true".to_string()),
            ("remoteOnly", wants_remote(criteria).to_string()),
            ("employmentTypes", EMPLOYMENT_TYPES.to_string()),
        ]
    }

    async fn list(&self, api_key: &str, params: &[(&'static str, String)]) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/v2/list", self.base_url.trim_end_matches('/'));
        debug!("Jobs API request: {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .header(RAPIDAPI_KEY_HEADER, api_key)
            .header(RAPIDAPI_HOST_HEADER, &self.host)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::from_response(response).await);
        }
        if !status.is_success() {
            error!("Jobs API returned status code {}", status);
            return Ok(Vec::new());
        }

        let mut body: Value = response.json().await?;
        match body.get_mut("jobs").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(UpstreamError::InvalidResponse("`jobs` is not an array".into())),
        }
    }
}

fn to_posting(raw: &Value, remote_only: bool) -> Option<Posting> {
    let title = text_field(raw.get("title"))?;
    let company = text_field(raw.get("company")).unwrap_or_default();

    let description = match text_field(raw.get("description")) {
        Some(text) if text.chars().count() > MIN_DESCRIPTION_CHARS => text,
        _ => format!("Position: {}\nCompany: {}", title, company),
    };

    let location = text_field(raw.get("location")).or_else(|| {
        match (text_field(raw.get("city")), text_field(raw.get("country"))) {
            (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
            _ => None,
        }
    });

    let mut posting = Posting::new(title, company, JOBS_API_SOURCE).with_description(description);
    let remote = remote_only || has_remote_hint(&posting);

    posting.location = location;
    posting.job_nature = Some(if remote { "remote" } else { "onsite" }.to_string());
    posting.source_id = text_field(raw.get("id"));
    posting.apply_link = text_field(raw.get("url"));
    posting.min_salary = number_field(raw.get("salary_min"));
    posting.max_salary = number_field(raw.get("salary_max"));

    if posting.min_salary.is_some() {
        posting.salary_currency =
            text_field(raw.get("salary_currency")).or_else(|| Some(DEFAULT_CURRENCY.to_string()));
    } else {
        posting.salary = text_field(raw.get("salary")).or_else(|| text_field(raw.get("salaryRange")));
    }

    Some(posting)
}

/// "remote" in the title or near the start of the description
fn has_remote_hint(posting: &Posting) -> bool {
    let hint: String = posting
        .description_text()
        .unwrap_or_default()
        .chars()
        .take(REMOTE_HINT_CHARS)
        .collect();

    posting.title.to_lowercase().contains("remote") || hint.to_lowercase().contains("remote")
}

/// Whether a posting fits the requested job nature and salary range
///
/// Onsite requests drop postings that look remote. Remote requests are
/// already narrowed by the `remoteOnly` query flag. Postings without any
/// salary information pass the salary check.
fn matches_request(posting: &Posting, criteria: &SearchCriteria, salary: Option<(f64, f64)>) -> bool {
    if wants_onsite(criteria) && has_remote_hint(posting) {
        return false;
    }

    let Some((min, max)) = salary else {
        return true;
    };

    match (posting.min_salary, posting.max_salary) {
        (Some(low), high) => SalaryRange {
            min: low,
            max: high.unwrap_or(low),
            period: None,
        }
        .overlaps(min, max),
        _ => posting
            .salary
            .as_deref()
            .map_or(true, |text| salary_in_range(text, min, max)),
    }
}

#[async_trait]
impl PostingSource for JobsApiSource {
    fn name(&self) -> &str {
        JOBS_API_SOURCE
    }

    async fn search(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Posting> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("{}: JOBS_API_KEY not set, skipping", JOBS_API_SOURCE);
            return Vec::new();
        };

        let params = self.search_params(criteria);
        let result = self
            .limiter
            .execute_with_retry(JOBS_API, &self.retry_policy, || self.list(api_key, &params))
            .await;

        let items = match result {
            Ok(items) => items,
            Err(e) => {
                error!("Error searching {}: {}", JOBS_API_SOURCE, e);
                return Vec::new();
            }
        };

        let remote_only = wants_remote(criteria);
        let salary = criteria.salary.as_deref().and_then(parse_requested_range);

        let postings: Vec<Posting> = items
            .iter()
            .filter_map(|raw| to_posting(raw, remote_only))
            .filter(|posting| matches_request(posting, criteria, salary))
            .take(limit)
            .collect();

        info!(
            "{} returned {} of {} postings after filtering",
            JOBS_API_SOURCE,
            postings.len(),
            items.len()
        );
        postings
    }
}
