use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

use crate::core::rate_limiter::{RateLimiter, RetryPolicy};
use crate::core::salary::parse_requested_range;
use crate::models::{Posting, SearchCriteria};
use crate::services::sources::{
    build_http_client, flag_field, number_field, text_field, wants_onsite, wants_remote,
    PostingSource, DEFAULT_REQUEST_TIMEOUT, RAPIDAPI_HOST_HEADER, RAPIDAPI_KEY_HEADER,
};
use crate::services::UpstreamError;

/// Rate-limit bucket for every JSearch call
pub const JSEARCH_API: &str = "jsearch";

pub const DEFAULT_JSEARCH_BASE_URL: &str = "https://jsearch.p.rapidapi.com";
pub const DEFAULT_JSEARCH_HOST: &str = "jsearch.p.rapidapi.com";
pub const DEFAULT_COUNTRY: &str = "us";

/// Value of `Posting::source` for JSearch results
pub const JSEARCH_SOURCE: &str = "JSearch";

const REMOTE_HINT_CHARS: usize = 500;

/// Market salary estimate for a title and location
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryEstimate {
    pub median: f64,
    pub currency: String,
}

/// Map free-text experience ("3 years", "senior") to a JSearch experience code
///
/// The first number wins; without one, seniority keywords are used.
/// Returns `None` when nothing maps (the API's "any experience").
pub fn experience_code(experience: &str) -> Option<&'static str> {
    static YEARS: OnceLock<Regex> = OnceLock::new();
    let years = YEARS.get_or_init(|| Regex::new(r"(\d+)").expect("static regex is valid"));

    if let Some(years) = years
        .captures(experience)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return Some(match years {
            0 => "LESS_THAN_ONE",
            1..=3 => "ONE_TO_THREE",
            4..=6 => "FOUR_TO_SIX",
            7..=9 => "SEVEN_TO_NINE",
            10..=14 => "TEN_TO_FOURTEEN",
            _ => "ABOVE_FIFTEEN",
        });
    }

    let lower = experience.to_lowercase();
    if lower.contains("no experience") || lower.contains("entry") || lower.contains("junior") {
        Some("LESS_THAN_ONE")
    } else if lower.contains("mid") {
        Some("FOUR_TO_SIX")
    } else if lower.contains("senior") || lower.contains("experienced") {
        Some("SEVEN_TO_NINE")
    } else if lower.contains("expert") || lower.contains("principal") {
        Some("TEN_TO_FOURTEEN")
    } else {
        None
    }
}

/// Human-readable label for an experience code
pub fn experience_label(code: &str) -> &str {
    match code {
        "LESS_THAN_ONE" => "Less than 1 year",
        "ONE_TO_THREE" => "1-3 years",
        "FOUR_TO_SIX" => "4-6 years",
        "SEVEN_TO_NINE" => "7-9 years",
        "TEN_TO_FOURTEEN" => "10-14 years",
        "ABOVE_FIFTEEN" => "15+ years",
        other => other,
    }
}

/// JSearch (RapidAPI) client
///
/// Serves both job search and single-job detail lookups. All calls go
/// through the shared limiter's `jsearch` bucket.
pub struct JSearchSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    base_url: String,
    host: String,
    api_key: Option<String>,
    country: String,
    site: Option<String>,
    name: String,
}

impl JSearchSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: build_http_client(DEFAULT_REQUEST_TIMEOUT),
            limiter,
            retry_policy: RetryPolicy::default(),
            base_url: base_url.into(),
            host: DEFAULT_JSEARCH_HOST.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            country: DEFAULT_COUNTRY.to_string(),
            site: None,
            name: JSEARCH_SOURCE.to_string(),
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

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Restrict results to one job board, e.g. "linkedin.com"
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        let site = site.into();
        self.name = format!("{} ({})", JSEARCH_SOURCE, site);
        self.site = Some(site);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Query-string parameters for a search
    pub fn search_params(&self, criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
        let mut query = match criteria.location.as_deref() {
            Some(location) => format!("{} in {}", criteria.position, location),
            None => criteria.position.clone(),
        };

        let mut params = vec![
            ("page", "1".to_string()),
            ("num_pages", "1".to_string()),
            ("country", self.country.clone()),
        ];

        if let Some(site) = &self.site {
            params.push(("site", site.clone()));
        }

        if wants_remote(criteria) {
            params.push(("work_from_home", "true".to_string()));
            params.push(("remote_jobs_only", "true".to_string()));
            query.push_str(" remote");
        } else if wants_onsite(criteria) {
            params.push(("work_from_home", "false".to_string()));
        }

        if let Some(code) = criteria.experience.as_deref().and_then(experience_code) {
            params.push(("years_of_experience", code.to_string()));
        }

        params.insert(0, ("query", query));
        params
    }

    async fn get_data(&self, path: &str, params: &[(&'static str, String)]) -> Result<Vec<Value>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredentials("JSEARCH_API_KEY"))?;

        let url = self.endpoint(path);
        debug!("JSearch request: {} {:?}", url, params);

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
            error!("JSearch API returned status code {}", status);
            return Ok(Vec::new());
        }

        let mut body: Value = response.json().await?;
        match body.get_mut("data").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(UpstreamError::InvalidResponse("`data` is not an array".into())),
        }
    }

    /// Full description of one job, by JSearch job id
    ///
    /// `Ok(None)` when the API knows no such job or returns no text.
    pub async fn job_details(&self, job_id: &str) -> Result<Option<String>, UpstreamError> {
        let params = [("job_id", job_id.to_string()), ("country", self.country.clone())];

        let items = self
            .limiter
            .execute_with_retry(JSEARCH_API, &self.retry_policy, || {
                self.get_data("job-details", &params)
            })
            .await?;

        Ok(items
            .first()
            .and_then(|job| text_field(job.get("job_description"))))
    }

    /// Median salary for `position` in `location`, from `/estimated-salary`
    ///
    /// `Ok(None)` when the API has no estimate.
    pub async fn estimated_salary(
        &self,
        position: &str,
        location: &str,
        experience: Option<&str>,
    ) -> Result<Option<SalaryEstimate>, UpstreamError> {
        let params = [
            ("job_title", position.to_string()),
            ("location", location.to_string()),
            ("location_type", "ANY".to_string()),
            ("years_of_experience", experience.and_then(experience_code).unwrap_or("ALL").to_string()),
        ];

        let items = self
            .limiter
            .execute_with_retry(JSEARCH_API, &self.retry_policy, || {
                self.get_data("estimated-salary", &params)
            })
            .await?;

        Ok(items.first().and_then(|estimate| {
            Some(SalaryEstimate {
                median: number_field(estimate.get("median_salary"))?,
                currency: text_field(estimate.get("salary_currency")).unwrap_or_else(|| "USD".to_string()),
            })
        }))
    }

    /// Estimate to attach to this search's postings
    ///
    /// Only looked up when the request has both a location and a salary
    /// range, and only kept when the median falls inside that range.
    async fn estimate_for(&self, criteria: &SearchCriteria) -> Option<SalaryEstimate> {
        let location = criteria.location.as_deref()?;
        let (min, max) = criteria.salary.as_deref().and_then(parse_requested_range)?;

        match self
            .estimated_salary(&criteria.position, location, criteria.experience.as_deref())
            .await
        {
            Ok(estimate) => estimate.filter(|e| (min..=max).contains(&e.median)),
            Err(e) => {
                error!("Error getting estimated salary: {}", e);
                None
            }
        }
    }

    fn to_posting(&self, raw: &Value, criteria: &SearchCriteria) -> Option<Posting> {
        let title = text_field(raw.get("job_title"))?;
        let company = text_field(raw.get("employer_name")).unwrap_or_default();

        let mut posting = Posting::new(title, company, JSEARCH_SOURCE);

        let location: Vec<String> = ["job_city", "job_state"]
            .iter()
            .filter_map(|field| text_field(raw.get(*field)))
            .collect();
        posting.location = if location.is_empty() {
            text_field(raw.get("job_country"))
        } else {
            Some(location.join(", "))
        };

        let title = posting.title.to_lowercase();
        let hint: String = text_field(raw.get("job_description"))
            .unwrap_or_default()
            .chars()
            .take(REMOTE_HINT_CHARS)
            .collect();
        let remote = wants_remote(criteria)
            || flag_field(raw.get("job_is_remote"))
            || flag_field(raw.get("work_from_home"))
            || title.contains("remote")
            || title.contains("work from home")
            || hint.to_lowercase().contains("remote");
        posting.job_nature = Some(if remote { "remote" } else { "onsite" }.to_string());

        posting.experience = criteria
            .experience
            .as_deref()
            .and_then(experience_code)
            .map(|code| experience_label(code).to_string());

        posting.description = text_field(raw.get("job_description"));
        posting.source_id = text_field(raw.get("job_id"));
        posting.apply_link =
            text_field(raw.get("job_apply_link")).or_else(|| text_field(raw.get("job_google_link")));
        posting.min_salary = number_field(raw.get("job_min_salary"));
        posting.max_salary = number_field(raw.get("job_max_salary"));
        posting.salary_currency = text_field(raw.get("job_salary_currency"));

        Some(posting)
    }
}

#[async_trait]
impl PostingSource for JSearchSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Posting> {
        if !self.has_credentials() {
            warn!("{}: JSEARCH_API_KEY not set, skipping", self.name);
            return Vec::new();
        }

        let params = self.search_params(criteria);
        let result = self
            .limiter
            .execute_with_retry(JSEARCH_API, &self.retry_policy, || self.get_data("search", &params))
            .await;

        let items = match result {
            Ok(items) => items,
            Err(e) => {
                error!("Error searching {}: {}", self.name, e);
                return Vec::new();
            }
        };

        let estimate = self.estimate_for(criteria).await;
        let onsite_only = wants_onsite(criteria);

        let postings: Vec<Posting> = items
            .iter()
            .filter_map(|raw| self.to_posting(raw, criteria))
            .filter(|posting| !(onsite_only && posting.job_nature.as_deref() == Some("remote")))
            .map(|mut posting| {
                if let Some(estimate) = &estimate {
                    posting.median_salary = Some(estimate.median);
                    posting.salary_currency = Some(estimate.currency.clone());
                }
                posting
            })
            .take(limit)
            .collect();

        info!("{} returned {} postings", self.name, postings.len());
        postings
    }
}
