use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::{
    filters::prefilter,
    rate_limiter::{RateLimiter, RetryPolicy},
    scoring::{build_scoring_prompt, cold_score, hot_score, parse_score_reply, ParseOutcome},
    skills::{match_fraction, match_skills, parse_skills},
};
use crate::models::{Posting, SearchCriteria};
use crate::services::{ScoreCache, UpstreamError};

/// Rate-limit bucket used for scoring calls
pub const SCORING_API: &str = "huggingface";

/// Postings per request that may go to the scoring backend
pub const DEFAULT_HOT_SET_SIZE: usize = 6;

/// Text-in, text-out model call used to score postings
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// Main scoring orchestrator
///
/// # Pipeline Stages
/// 1. Heuristic prefilter ordering
/// 2. Hot set (first `hot_set_size`): cache lookup, else rate-limited backend
///    call, reply parsing and skill boost
/// 3. Cold set: flat heuristic score with a small skill boost, no external call
/// 4. Merge and stable sort by relevance
///
/// Holds the score cache and a handle to the shared rate limiter, so one
/// instance must serve every request in the process.
pub struct RelevanceScorer {
    backend: Arc<dyn ScoringBackend>,
    limiter: Arc<RateLimiter>,
    cache: ScoreCache,
    retry_policy: RetryPolicy,
    hot_set_size: usize,
}

impl RelevanceScorer {
    pub fn new(backend: Arc<dyn ScoringBackend>, limiter: Arc<RateLimiter>, cache: ScoreCache) -> Self {
        Self {
            backend,
            limiter,
            cache,
            retry_policy: RetryPolicy::default(),
            hot_set_size: DEFAULT_HOT_SET_SIZE,
        }
    }

    pub fn with_hot_set_size(mut self, hot_set_size: usize) -> Self {
        self.hot_set_size = hot_set_size;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Score postings against the criteria and return them best first
    ///
    /// A failure while scoring one posting gives that posting a zero score;
    /// the rest of the batch is unaffected.
    pub async fn score_jobs(&self, postings: Vec<Posting>, criteria: &SearchCriteria) -> Vec<Posting> {
        if postings.is_empty() {
            return Vec::new();
        }

        let skills = parse_skills(criteria.skills.as_deref());

        let mut hot = prefilter(postings, criteria);
        let mut cold = if hot.len() > self.hot_set_size {
            hot.split_off(self.hot_set_size)
        } else {
            Vec::new()
        };

        debug!(
            "Scoring {} postings with the backend, {} heuristically",
            hot.len(),
            cold.len()
        );

        for posting in hot.iter_mut() {
            match self.score_hot(posting, criteria, &skills).await {
                Ok(score) => posting.relevance_score = Some(score),
                Err(e) => {
                    error!("Error scoring job {}: {}", posting.title, e);
                    posting.relevance_score = Some(0.0);
                }
            }
        }

        for posting in cold.iter_mut() {
            let fraction = attach_skill_matches(posting, &skills);
            posting.relevance_score = Some(cold_score(fraction));
        }

        let mut scored = hot;
        scored.append(&mut cold);
        sort_by_relevance(&mut scored);

        info!(
            "Scored {} postings for position '{}'",
            scored.len(),
            criteria.position
        );

        scored
    }

    async fn score_hot(
        &self,
        posting: &mut Posting,
        criteria: &SearchCriteria,
        skills: &[String],
    ) -> Result<f64, UpstreamError> {
        let fraction = attach_skill_matches(posting, skills);
        let key = ScoreCache::key(&posting.title, &posting.company, &criteria.position);

        if let Some(score) = self.cache.get(&key).await {
            return Ok(score);
        }

        let prompt = build_scoring_prompt(posting, criteria);
        let reply = self
            .limiter
            .execute_with_retry(SCORING_API, &self.retry_policy, || {
                self.backend.generate(&prompt)
            })
            .await?;

        let outcome = parse_score_reply(reply.trim());
        if outcome == ParseOutcome::Unparsed {
            debug!("No score in backend reply for {}: {:?}", posting.title, reply);
        }

        let score = hot_score(outcome.score(), fraction);
        self.cache.insert(key, score).await;

        Ok(score)
    }
}

/// Record skill matches on the posting and return the matched share
///
/// Zero when no skills were requested or the posting has no description.
fn attach_skill_matches(posting: &mut Posting, skills: &[String]) -> f64 {
    if skills.is_empty() {
        return 0.0;
    }
    let Some(description) = posting.description_text() else {
        return 0.0;
    };

    let matched = match_skills(description, skills);
    let fraction = match_fraction(matched.len(), skills.len());
    posting.matched_skills = matched;
    fraction
}

/// Stable sort, highest relevance first; unset scores count as zero
pub fn sort_by_relevance(postings: &mut [Posting]) {
    postings.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;

    /// Backend that replays scripted replies and counts calls
    struct ScriptedBackend {
        replies: Mutex<Vec<Result<String, UpstreamError>>>,
        default_reply: String,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn constant(reply: &str) -> Self {
            Self {
                replies: Mutex::new(Vec::new()),
                default_reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn scripted(mut replies: Vec<Result<String, UpstreamError>>, default_reply: &str) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                default_reply: default_reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl ScoringBackend for ScriptedBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            let next = self.replies.lock().unwrap().pop();
            next.unwrap_or_else(|| Ok(self.default_reply.clone()))
        }
    }

    fn create_scorer(backend: Arc<ScriptedBackend>) -> RelevanceScorer {
        RelevanceScorer::new(backend, Arc::new(RateLimiter::new()), ScoreCache::unbounded())
    }

    fn create_posting(title: &str, company: &str, description: Option<&str>) -> Posting {
        let mut posting = Posting::new(title, company, "JSearch");
        posting.description = description.map(str::to_string);
        posting
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_returns_empty() {
        let backend = Arc::new(ScriptedBackend::constant(r#"{"score": 0.9}"#));
        let scorer = create_scorer(backend.clone());

        let result = scorer.score_jobs(Vec::new(), &SearchCriteria::new("Engineer")).await;

        assert!(result.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_hot_set_uses_backend() {
        let backend = Arc::new(ScriptedBackend::constant(r#"{"score": 0.9}"#));
        let scorer = create_scorer(backend.clone());
        let criteria = SearchCriteria::new("Engineer").with_skills("python");

        let postings: Vec<Posting> = (0..10)
            .map(|i| create_posting(&format!("Role {}", i), "Acme", Some("python shop")))
            .collect();

        let result = scorer.score_jobs(postings, &criteria).await;

        assert_eq!(result.len(), 10);
        assert_eq!(backend.calls(), DEFAULT_HOT_SET_SIZE);

        // all prefilter scores tie, so the first six inputs are the hot set
        let (hot, cold): (Vec<&Posting>, Vec<&Posting>) = result
            .iter()
            .partition(|p| ["Role 0", "Role 1", "Role 2", "Role 3", "Role 4", "Role 5"].contains(&p.title.as_str()));
        assert_eq!(hot.len(), 6);
        for posting in hot {
            assert_eq!(posting.score(), 1.0);
        }
        for posting in cold {
            assert!(posting.score() >= 0.3 && posting.score() <= 0.5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_hits_cache() {
        let backend = Arc::new(ScriptedBackend::constant(r#"{"score": 0.6}"#));
        let scorer = create_scorer(backend.clone());
        let criteria = SearchCriteria::new("Engineer");

        let first = scorer
            .score_jobs(vec![create_posting("Engineer", "Acme", None)], &criteria)
            .await;
        assert_eq!(backend.calls(), 1);

        let second = scorer
            .score_jobs(vec![create_posting("Engineer", "Acme", None)], &criteria)
            .await;

        assert_eq!(backend.calls(), 1);
        assert_eq!(first[0].relevance_score, second[0].relevance_score);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skill_boost_added_to_backend_score() {
        let backend = Arc::new(ScriptedBackend::constant(r#"{"score": 0.5}"#));
        let scorer = create_scorer(backend);
        let criteria = SearchCriteria::new("Engineer").with_skills("python,sql");

        let result = scorer
            .score_jobs(
                vec![create_posting("Senior Engineer", "Acme", Some("We write Python daily"))],
                &criteria,
            )
            .await;

        let posting = &result[0];
        assert_eq!(posting.matched_skills.len(), 1);
        assert_eq!(posting.matched_skills.get("python"), Some(&1.0));
        assert!((posting.score() - 0.65).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_posting_scores_zero_and_batch_continues() {
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![Err(UpstreamError::status(401, "bad token"))],
            r#"{"score": 0.7}"#,
        ));
        let scorer = create_scorer(backend.clone());
        let criteria = SearchCriteria::new("Engineer");

        let postings = vec![
            create_posting("Engineer A", "Acme", None),
            create_posting("Engineer B", "Acme", None),
        ];
        let result = scorer.score_jobs(postings, &criteria).await;

        // 401 is not retried
        assert_eq!(backend.calls(), 2);
        assert_eq!(result[0].title, "Engineer B");
        assert!((result[0].score() - 0.7).abs() < 1e-9);
        assert_eq!(result[1].title, "Engineer A");
        assert_eq!(result[1].score(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_posting_is_not_cached() {
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![Err(UpstreamError::InvalidResponse("empty".into()))],
            r#"{"score": 0.7}"#,
        ));
        let scorer = create_scorer(backend.clone());
        let criteria = SearchCriteria::new("Engineer");

        scorer.score_jobs(vec![create_posting("Engineer", "Acme", None)], &criteria).await;
        let retry = scorer.score_jobs(vec![create_posting("Engineer", "Acme", None)], &criteria).await;

        assert_eq!(backend.calls(), 2);
        assert!((retry[0].score() - 0.7).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_backend_is_retried() {
        let backend = Arc::new(ScriptedBackend::scripted(
            vec![
                Err(UpstreamError::status(429, "slow down")),
                Err(UpstreamError::status(503, "busy")),
            ],
            "Relevance: 0.8",
        ));
        let scorer = create_scorer(backend.clone());

        let result = scorer
            .score_jobs(vec![create_posting("Engineer", "Acme", None)], &SearchCriteria::new("Engineer"))
            .await;

        assert_eq!(backend.calls(), 3);
        assert!((result[0].score() - 0.8).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_reply_scores_zero() {
        let backend = Arc::new(ScriptedBackend::constant("no idea"));
        let scorer = create_scorer(backend);

        let result = scorer
            .score_jobs(vec![create_posting("Engineer", "Acme", None)], &SearchCriteria::new("Engineer"))
            .await;

        assert_eq!(result[0].relevance_score, Some(0.0));
    }

    #[test]
    fn test_sort_by_relevance_is_stable() {
        let mut postings = vec![
            create_posting("a", "x", None),
            create_posting("b", "x", None),
            create_posting("c", "x", None),
            create_posting("d", "x", None),
        ];
        postings[0].relevance_score = Some(0.2);
        postings[1].relevance_score = Some(0.9);
        postings[2].relevance_score = None;
        postings[3].relevance_score = Some(0.2);

        sort_by_relevance(&mut postings);

        let titles: Vec<&str> = postings.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a", "d", "c"]);
    }
}
