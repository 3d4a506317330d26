//! Job Radar - job aggregation service with rate-limited relevance scoring
//!
//! Postings are collected from several job APIs, enriched with full
//! descriptions, ranked by a heuristic prefilter and scored by a hosted
//! text-generation model. Every outbound call is admitted through a shared
//! per-API token bucket with adaptive retries.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{RateLimiter, RelevanceScorer, RetryPolicy, ScoringBackend};
pub use models::{FindJobsRequest, FindJobsResponse, JobView, Posting, SearchCriteria};
pub use services::{JobSearchService, ScoreCache, UpstreamError};
