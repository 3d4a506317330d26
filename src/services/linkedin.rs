use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::rate_limiter::{RateLimiter, RetryPolicy};
use crate::models::{Posting, SearchCriteria};
use crate::services::descriptions::browser_client;
use crate::services::sources::{wants_remote, PostingSource};
use crate::services::UpstreamError;

/// Rate-limit bucket for LinkedIn page requests (served by the default rate)
pub const LINKEDIN_API: &str = "linkedin";

pub const DEFAULT_LINKEDIN_BASE_URL: &str = "https://www.linkedin.com";

/// Value of `Posting::source` for scraped LinkedIn cards
pub const LINKEDIN_SOURCE: &str = "LinkedIn";

/// LinkedIn's work-type filter value for remote jobs
const REMOTE_WORK_TYPE: &str = "2";

const CARD_SELECTOR: &str = "div.base-card";
const TITLE_SELECTOR: &str = ".base-search-card__title";
const COMPANY_SELECTOR: &str = ".base-search-card__subtitle";
const LOCATION_SELECTOR: &str = ".job-search-card__location";
const LINK_SELECTOR: &str = "a.base-card__full-link";

/// Job cards scraped from LinkedIn's public job search page
///
/// Needs no API key; used as the fallback when the API sources find nothing.
pub struct LinkedInPageSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    base_url: String,
}

impl LinkedInPageSource {
    pub fn new(base_url: impl Into<String>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: browser_client(),
            limiter,
            retry_policy: RetryPolicy::default(),
            base_url: base_url.into(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn search_params(criteria: &SearchCriteria) -> Vec<(&'static str, String)> {
        let keywords = match criteria.location.as_deref() {
            Some(location) => format!("{} {}", criteria.position, location),
            None => criteria.position.clone(),
        };

        let mut params = vec![("keywords", keywords)];
        if wants_remote(criteria) {
            params.push(("f_WT", REMOTE_WORK_TYPE.to_string()));
        }
        params
    }

    async fn fetch_page(&self, params: &[(&'static str, String)]) -> Result<String, UpstreamError> {
        let url = format!("{}/jobs/search/", self.base_url.trim_end_matches('/'));
        debug!("LinkedIn page request: {} {:?}", url, params);

        let response = self.client.get(&url).query(params).send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::from_response(response).await);
        }

        Ok(response.text().await?)
    }
}

fn selector(css: &str) -> Result<Selector, UpstreamError> {
    Selector::parse(css).map_err(|e| UpstreamError::InvalidResponse(format!("Bad selector {}: {:?}", css, e)))
}

fn first_text(card: &ElementRef, selector: &Selector) -> Option<String> {
    let text = card
        .select(selector)
        .next()?
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    Some(text).filter(|t| !t.is_empty())
}

/// Postings from the job cards of a LinkedIn search results page
///
/// Cards without a title, company or job link are skipped.
pub fn parse_job_cards(html: &str, remote: bool) -> Result<Vec<Posting>, UpstreamError> {
    let card_selector = selector(CARD_SELECTOR)?;
    let title_selector = selector(TITLE_SELECTOR)?;
    let company_selector = selector(COMPANY_SELECTOR)?;
    let location_selector = selector(LOCATION_SELECTOR)?;
    let link_selector = selector(LINK_SELECTOR)?;

    let document = Html::parse_document(html);
    let postings = document
        .select(&card_selector)
        .filter_map(|card| {
            let title = first_text(&card, &title_selector)?;
            let company = first_text(&card, &company_selector)?;
            let link = card
                .select(&link_selector)
                .next()?
                .value()
                .attr("href")
                .map(str::trim)
                .filter(|href| !href.is_empty())?;

            let mut posting = Posting::new(title, company, LINKEDIN_SOURCE).with_apply_link(link);
            posting.location = first_text(&card, &location_selector);
            if remote {
                posting.job_nature = Some("remote".to_string());
            }
            Some(posting)
        })
        .collect();

    Ok(postings)
}

#[async_trait]
impl PostingSource for LinkedInPageSource {
    fn name(&self) -> &str {
        LINKEDIN_SOURCE
    }

    async fn search(&self, criteria: &SearchCriteria, limit: usize) -> Vec<Posting> {
        let params = Self::search_params(criteria);
        let page = self
            .limiter
            .execute_with_retry(LINKEDIN_API, &self.retry_policy, || self.fetch_page(&params))
            .await;

        let postings = match page.and_then(|html| parse_job_cards(&html, wants_remote(criteria))) {
            Ok(postings) => postings.into_iter().take(limit).collect::<Vec<_>>(),
            Err(e) => {
                error!("Error scraping LinkedIn search page: {}", e);
                return Vec::new();
            }
        };

        info!("{} page returned {} postings", LINKEDIN_SOURCE, postings.len());
        postings
    }
}
