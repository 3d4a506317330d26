use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::models::Posting;
use crate::services::jsearch::{JSearchSource, JSEARCH_SOURCE};
use crate::services::sources::DEFAULT_REQUEST_TIMEOUT;
use crate::services::UpstreamError;

/// Postings per request that may trigger a description fetch
pub const DEFAULT_DESCRIPTION_FETCH_LIMIT: usize = 6;

const LINKEDIN_DESCRIPTION_SELECTOR: &str = "div.description__text";
const INDEED_DESCRIPTION_SELECTOR: &str = "div#jobDescriptionText";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Somewhere a posting's full description can be looked up
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    /// `Ok(None)` when there is no way to look this posting up
    async fn fetch(&self, posting: &Posting) -> Result<Option<String>, UpstreamError>;
}

/// Fill in missing descriptions, looking up at most `max_fetches` of them
///
/// Postings that already carry a description are untouched. A failed
/// lookup, and every posting past the fetch bound, gets the
/// "{title} at {company}" placeholder. Postings with no lookup route, or
/// whose lookup found no text, keep no description; only the latter uses
/// up the bound.
pub async fn fetch_descriptions<D>(source: &D, mut postings: Vec<Posting>, max_fetches: usize) -> Vec<Posting>
where
    D: DescriptionSource + ?Sized,
{
    let mut attempts = 0;

    for posting in postings.iter_mut() {
        if posting.description_text().is_some() {
            continue;
        }

        if attempts >= max_fetches {
            posting.description = Some(posting.placeholder_description());
            continue;
        }

        posting.description = match source.fetch(posting).await {
            Ok(Some(text)) => {
                attempts += 1;
                Some(text).filter(|t| !t.trim().is_empty())
            }
            Ok(None) => None,
            Err(e) => {
                attempts += 1;
                error!("Error fetching description for {}: {}", posting.title, e);
                Some(posting.placeholder_description())
            }
        };
    }

    debug!("Description lookups used: {}/{}", attempts, max_fetches);
    postings
}

/// Looks descriptions up through JSearch job details, or by scraping the
/// LinkedIn or Indeed posting page behind the apply link
pub struct HttpDescriptionSource {
    client: Client,
    jsearch: Option<Arc<JSearchSource>>,
    politeness_delay: Option<(Duration, Duration)>,
}

/// HTTP client that presents itself as a desktop browser, for job-board pages
pub(crate) fn browser_client() -> Client {
    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}

impl HttpDescriptionSource {
    pub fn new(jsearch: Option<Arc<JSearchSource>>) -> Self {
        Self {
            client: browser_client(),
            jsearch,
            politeness_delay: None,
        }
    }

    /// Sleep a random duration in `[min, max]` after every page or API lookup
    pub fn with_politeness_delay(mut self, min: Duration, max: Duration) -> Self {
        self.politeness_delay = Some((min, max.max(min)));
        self
    }

    async fn scrape(&self, url: &str, selector: &str) -> Result<Option<String>, UpstreamError> {
        info!("Fetching job page: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(UpstreamError::from_response(response).await);
        }

        let html = response.text().await?;
        extract_description(&html, selector)
    }

    async fn lookup(&self, posting: &Posting) -> Option<Result<Option<String>, UpstreamError>> {
        if let (Some(jsearch), Some(job_id)) = (&self.jsearch, posting.source_id.as_deref()) {
            if posting.source == JSEARCH_SOURCE && jsearch.has_credentials() {
                return Some(jsearch.job_details(job_id).await);
            }
        }

        let link = posting.apply_link.as_deref()?;
        let selector = if link.contains("linkedin.com") {
            LINKEDIN_DESCRIPTION_SELECTOR
        } else if link.contains("indeed.com") {
            INDEED_DESCRIPTION_SELECTOR
        } else {
            return None;
        };

        Some(self.scrape(link, selector).await)
    }

    async fn pause(&self) {
        if let Some((min, max)) = self.politeness_delay {
            let delay = rand::thread_rng().gen_range(min..=max);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DescriptionSource for HttpDescriptionSource {
    async fn fetch(&self, posting: &Posting) -> Result<Option<String>, UpstreamError> {
        let Some(result) = self.lookup(posting).await else {
            return Ok(None);
        };

        self.pause().await;

        // an attempt was made, so "not found" is reported as empty text
        result.map(|text| Some(text.unwrap_or_default()))
    }
}

/// Text of the first element matching `selector`, whitespace-collapsed
pub fn extract_description(html: &str, selector: &str) -> Result<Option<String>, UpstreamError> {
    let selector = Selector::parse(selector)
        .map_err(|e| UpstreamError::InvalidResponse(format!("Bad selector {}: {:?}", selector, e)))?;

    let document = Html::parse_document(html);
    let text = document.select(&selector).next().map(|element| {
        element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ")
    });

    Ok(text.filter(|t| !t.is_empty()))
}
