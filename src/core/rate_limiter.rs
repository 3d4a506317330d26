use rand::Rng;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bucket used for any API name that has no entry of its own
pub const DEFAULT_API: &str = "default";

/// Requests per minute for each known API
pub const DEFAULT_RATE_LIMITS: [(&str, u32); 4] = [
    ("jsearch", 5),
    ("jobs_api", 5),
    ("huggingface", 10),
    (DEFAULT_API, 30),
];

pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

const TOO_MANY_REQUESTS: u16 = 429;
const MAX_JITTER_MS: u64 = 100;
const RETRY_AFTER_BUFFER: Duration = Duration::from_millis(100);
const MAX_RATE_LIMIT_BACKOFF_SECS: u64 = 30;

/// Classification hooks for errors passed through `execute_with_retry`
pub trait Retryable {
    /// HTTP status carried by the error, if any
    fn status_code(&self) -> Option<u16>;

    /// Raw `Retry-After` header value, if the server sent one
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    #[inline]
    fn tokens_per_second(&self) -> f64 {
        self.capacity as f64 / 60.0
    }

    #[inline]
    fn seconds_per_token(&self) -> f64 {
        60.0 / self.capacity as f64
    }

    /// Continuous refill based on elapsed time, capped at capacity
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.tokens_per_second()).min(self.capacity as f64);
        state.last_refill = now;
    }
}

/// Per-API token-bucket admission control with adaptive retries
///
/// One instance must be shared (behind an `Arc`) by every request path in
/// the process. Building a fresh limiter per request gives each caller a
/// full bucket and throttles nothing.
///
/// Admission is atomic per bucket: the bucket lock is held from the token
/// check through the wait and the decrement, so concurrent callers queue
/// up instead of both spending the same token.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: HashMap<String, TokenBucket>,
    fallback: TokenBucket,
}

impl RateLimiter {
    /// Limiter with the built-in rate table
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RATE_LIMITS.iter().map(|(name, rpm)| (name.to_string(), *rpm)))
    }

    /// Limiter with a custom rate table (requests per minute per API)
    ///
    /// A `default` entry sets the fallback bucket; without one the
    /// built-in default rate is used.
    pub fn with_limits<I>(limits: I) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let mut buckets: HashMap<String, TokenBucket> = limits
            .into_iter()
            .map(|(name, rpm)| (name, TokenBucket::new(rpm)))
            .collect();

        let fallback = buckets.remove(DEFAULT_API).unwrap_or_else(|| {
            let default_rpm = DEFAULT_RATE_LIMITS
                .iter()
                .find(|(name, _)| *name == DEFAULT_API)
                .map(|(_, rpm)| *rpm)
                .unwrap_or(30);
            TokenBucket::new(default_rpm)
        });

        Self { buckets, fallback }
    }

    fn bucket(&self, api_name: &str) -> (&str, &TokenBucket) {
        self.buckets
            .get_key_value(api_name)
            .map(|(name, bucket)| (name.as_str(), bucket))
            .unwrap_or((DEFAULT_API, &self.fallback))
    }

    /// Requests-per-minute capacity of the bucket serving `api_name`
    pub fn capacity(&self, api_name: &str) -> u32 {
        self.bucket(api_name).1.capacity
    }

    /// Current token count of the bucket serving `api_name`, after refill
    pub async fn available_tokens(&self, api_name: &str) -> f64 {
        let (_, bucket) = self.bucket(api_name);
        let mut state = bucket.state.lock().await;
        bucket.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Take one token for `api_name`, waiting if the bucket is empty
    ///
    /// Returns the delay actually applied (zero when a token was ready).
    pub async fn admit(&self, api_name: &str) -> Duration {
        let (bucket_name, bucket) = self.bucket(api_name);
        let mut state = bucket.state.lock().await;

        bucket.refill(&mut state, Instant::now());
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Duration::ZERO;
        }

        let delay = Duration::from_secs_f64(bucket.seconds_per_token());
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));

        if delay > Duration::from_millis(100) {
            info!(
                "Rate limiting {} (bucket {}): waiting {:.2}s before next request",
                api_name,
                bucket_name,
                delay.as_secs_f64()
            );
        }

        tokio::time::sleep(delay + jitter).await;

        bucket.refill(&mut state, Instant::now());
        state.tokens = (state.tokens - 1.0).max(0.0);

        delay + jitter
    }

    /// Run `operation` under the rate limit with the default retry policy
    pub async fn execute<T, E, F, Fut>(&self, api_name: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        self.execute_with_retry(api_name, &RetryPolicy::default(), operation)
            .await
    }

    /// Run `operation` under the rate limit, retrying transient failures
    ///
    /// Every attempt is admitted through the bucket first. Errors without a
    /// retryable status are returned immediately. The last attempt never
    /// waits; its error is returned as is.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        api_name: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let attempts = policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            self.admit(api_name).await;

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let Some(delay) = policy.retry_delay(&error, attempt) else {
                debug!("{} error is not retryable: {}", api_name, error);
                return Err(error);
            };

            if attempt + 1 >= attempts {
                warn!("{} failed after {} attempts: {}", api_name, attempts, error);
                return Err(error);
            }

            if delay > Duration::from_millis(500) {
                info!(
                    "{} error (attempt {}/{}): retrying in {:.1}s",
                    api_name,
                    attempt + 1,
                    attempts,
                    delay.as_secs_f64()
                );
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry settings for `RateLimiter::execute_with_retry`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts; zero is treated as one
    pub max_retries: u32,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, or `None` if the error must not be retried
    ///
    /// 429: server `Retry-After` plus a small buffer, else `min(2 * (attempt + 1), 30)`s.
    /// Other retryable statuses: `0.5 * (attempt + 1)`s.
    pub fn retry_delay<E: Retryable>(&self, error: &E, attempt: u32) -> Option<Duration> {
        let status = error.status_code()?;

        if status == TOO_MANY_REQUESTS {
            let delay = error
                .retry_after()
                .and_then(parse_retry_after)
                .unwrap_or_else(|| {
                    Duration::from_secs((2 * (attempt as u64 + 1)).min(MAX_RATE_LIMIT_BACKOFF_SECS))
                });
            return Some(delay);
        }

        if self.retryable_status_codes.contains(&status) {
            return Some(Duration::from_millis(500 * (attempt as u64 + 1)));
        }

        None
    }
}

/// Parse a `Retry-After` value given in whole seconds
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs) + RETRY_AFTER_BUFFER)
}
