use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::relevance::RelevanceScorer;
use crate::core::skills::parse_skills;
use crate::models::{FindJobsResponse, Posting, SearchCriteria};
use crate::services::descriptions::{fetch_descriptions, DescriptionSource, DEFAULT_DESCRIPTION_FETCH_LIMIT};
use crate::services::formatter::format_results;
use crate::services::sources::PostingSource;

pub const DEFAULT_PER_SOURCE_LIMIT: usize = 5;
pub const DEFAULT_RESULT_LIMIT: usize = 3;
pub const MAX_RESULT_LIMIT: usize = 5;

/// End-to-end job search: collect, enrich, score, format
///
/// # Pipeline Stages
/// 1. Query every primary source; the fallback source only runs when they
///    all come back empty
/// 2. Drop duplicate postings
/// 3. Fill in missing descriptions (bounded number of lookups)
/// 4. Relevance scoring
/// 5. Format and truncate to the requested limit
///
/// One instance serves the whole process so the scorer's cache and the
/// rate limiter behind every collaborator are shared.
pub struct JobSearchService {
    sources: Vec<Arc<dyn PostingSource>>,
    fallback: Option<Arc<dyn PostingSource>>,
    descriptions: Arc<dyn DescriptionSource>,
    scorer: RelevanceScorer,
    per_source_limit: usize,
    description_fetch_limit: usize,
    default_limit: usize,
    max_limit: usize,
}

impl JobSearchService {
    pub fn new(
        sources: Vec<Arc<dyn PostingSource>>,
        descriptions: Arc<dyn DescriptionSource>,
        scorer: RelevanceScorer,
    ) -> Self {
        Self {
            sources,
            fallback: None,
            descriptions,
            scorer,
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
            description_fetch_limit: DEFAULT_DESCRIPTION_FETCH_LIMIT,
            default_limit: DEFAULT_RESULT_LIMIT,
            max_limit: MAX_RESULT_LIMIT,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn PostingSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_per_source_limit(mut self, per_source_limit: usize) -> Self {
        self.per_source_limit = per_source_limit.max(1);
        self
    }

    pub fn with_description_fetch_limit(mut self, description_fetch_limit: usize) -> Self {
        self.description_fetch_limit = description_fetch_limit;
        self
    }

    pub fn with_result_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    /// Requested result count, defaulted and clamped to `1..=max_limit`
    pub fn clamp_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.default_limit).clamp(1, self.max_limit)
    }

    /// Postings from every source, de-duplicated, in source order
    pub async fn collect(&self, criteria: &SearchCriteria) -> Vec<Posting> {
        let mut postings = Vec::new();

        for source in &self.sources {
            let found = source.search(criteria, self.per_source_limit).await;
            debug!("{}: {} postings", source.name(), found.len());
            postings.extend(found);
        }

        if postings.is_empty() {
            if let Some(fallback) = &self.fallback {
                info!("No postings from primary sources, trying {}", fallback.name());
                postings = fallback.search(criteria, self.per_source_limit).await;
            }
        }

        dedupe(postings)
    }

    /// Run the whole pipeline for one request
    pub async fn find_jobs(&self, criteria: &SearchCriteria, limit: Option<usize>) -> FindJobsResponse {
        let limit = self.clamp_limit(limit);

        let postings = self.collect(criteria).await;
        if postings.is_empty() {
            info!("No postings found for '{}'", criteria.position);
            return FindJobsResponse::default();
        }

        let postings = fetch_descriptions(self.descriptions.as_ref(), postings, self.description_fetch_limit).await;
        let mut scored = self.scorer.score_jobs(postings, criteria).await;
        scored.truncate(limit);

        let requested_skills = parse_skills(criteria.skills.as_deref()).len();
        format_results(&scored, requested_skills)
    }
}

/// Drop repeated postings, keeping the first occurrence
///
/// Postings with a source id are identified by (source, id); the rest by
/// case-insensitive (title, company).
pub fn dedupe(postings: Vec<Posting>) -> Vec<Posting> {
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|posting| seen.insert(dedupe_key(posting)))
        .collect()
}

fn dedupe_key(posting: &Posting) -> String {
    match posting.source_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => format!("id|{}|{}", posting.source, id),
        None => format!(
            "job|{}|{}",
            posting.title.trim().to_lowercase(),
            posting.company.trim().to_lowercase()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_limiter::RateLimiter;
    use crate::core::relevance::ScoringBackend;
    use crate::services::{ScoreCache, UpstreamError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        name: String,
        postings: Vec<Posting>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(name: &str, postings: Vec<Posting>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                postings,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PostingSource for FixedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, _criteria: &SearchCriteria, limit: usize) -> Vec<Posting> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.postings.iter().take(limit).cloned().collect()
        }
    }

    struct NoDescriptions;

    #[async_trait]
    impl DescriptionSource for NoDescriptions {
        async fn fetch(&self, _posting: &Posting) -> Result<Option<String>, UpstreamError> {
            Ok(None)
        }
    }

    struct TitleLengthBackend;

    #[async_trait]
    impl ScoringBackend for TitleLengthBackend {
        async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
            // longer titles score higher
            let title_line = prompt.lines().find(|l| l.starts_with("Job: ")).unwrap_or("");
            Ok(format!("{{\"score\": {:.2}}}", (title_line.len() as f64 / 100.0).min(0.9)))
        }
    }

    fn create_service(sources: Vec<Arc<dyn PostingSource>>) -> JobSearchService {
        let scorer = RelevanceScorer::new(
            Arc::new(TitleLengthBackend),
            Arc::new(RateLimiter::new()),
            ScoreCache::unbounded(),
        );
        JobSearchService::new(sources, Arc::new(NoDescriptions), scorer)
    }

    fn posting(title: &str, company: &str, id: Option<&str>) -> Posting {
        let mut posting = Posting::new(title, company, "JSearch");
        posting.source_id = id.map(str::to_string);
        posting
    }

    #[test]
    fn test_dedupe_by_id_then_title_company() {
        let postings = vec![
            posting("Engineer", "Acme", Some("1")),
            posting("Engineer (copy)", "Acme", Some("1")),
            posting("Analyst", "Globex", None),
            posting(" analyst", "GLOBEX ", None),
            posting("Analyst", "Globex", Some("2")),
        ];

        let titles: Vec<String> = dedupe(postings).into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Engineer", "Analyst", "Analyst"]);
    }

    #[test]
    fn test_clamp_limit() {
        let service = create_service(vec![]);
        assert_eq!(service.clamp_limit(None), 3);
        assert_eq!(service.clamp_limit(Some(0)), 1);
        assert_eq!(service.clamp_limit(Some(4)), 4);
        assert_eq!(service.clamp_limit(Some(50)), 5);
    }

    #[tokio::test]
    async fn test_fallback_only_when_primaries_empty() {
        let empty = FixedSource::new("empty", vec![]);
        let fallback = FixedSource::new("fallback", vec![posting("Engineer", "Acme", None)]);

        let service = create_service(vec![empty.clone()]).with_fallback(fallback.clone());
        let postings = service.collect(&SearchCriteria::new("Engineer")).await;
        assert_eq!(postings.len(), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);

        let primary = FixedSource::new("primary", vec![posting("Analyst", "Acme", None)]);
        let service = create_service(vec![primary]).with_fallback(fallback.clone());
        service.collect(&SearchCriteria::new("Engineer")).await;
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_jobs_scores_and_truncates() {
        let source = FixedSource::new(
            "board",
            vec![
                posting("Engineer", "Acme", Some("1")),
                posting("Senior Platform Engineer", "Acme", Some("2")),
                posting("Staff Engineer", "Acme", Some("3")),
                posting("Engineer", "Acme", Some("1")),
            ],
        );
        let service = create_service(vec![source]);

        let response = service.find_jobs(&SearchCriteria::new("Engineer"), Some(2)).await;

        let titles: Vec<&str> = response.relevant_jobs.iter().map(|j| j.job_title.as_str()).collect();
        assert_eq!(titles, vec!["Senior Platform Engineer", "Staff Engineer"]);
    }

    #[tokio::test]
    async fn test_find_jobs_without_postings() {
        let service = create_service(vec![FixedSource::new("empty", vec![])]);
        let response = service.find_jobs(&SearchCriteria::new("Engineer"), None).await;
        assert!(response.relevant_jobs.is_empty());
    }
}
