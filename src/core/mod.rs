// Core algorithm exports
pub mod filters;
pub mod rate_limiter;
pub mod relevance;
pub mod salary;
pub mod scoring;
pub mod skills;

pub use filters::{prefilter, prefilter_score};
pub use rate_limiter::{RateLimiter, Retryable, RetryPolicy};
pub use relevance::{sort_by_relevance, RelevanceScorer, ScoringBackend};
pub use salary::{parse_requested_range, parse_salary_range, salary_in_range, PayPeriod, SalaryRange};
pub use scoring::{build_scoring_prompt, parse_score_reply, ParseOutcome};
pub use skills::{match_skills, parse_skills};
