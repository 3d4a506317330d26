// Service exports
pub mod cache;
pub mod descriptions;
pub mod formatter;
pub mod inference;
pub mod jobs_api;
pub mod jsearch;
pub mod linkedin;
pub mod search;
pub mod sources;
pub mod upstream;

pub use cache::{CacheStats, ScoreCache};
pub use descriptions::{fetch_descriptions, DescriptionSource, HttpDescriptionSource};
pub use formatter::{format_amount, format_money, format_results};
pub use inference::InferenceBackend;
pub use jobs_api::JobsApiSource;
pub use jsearch::JSearchSource;
pub use linkedin::LinkedInPageSource;
pub use search::JobSearchService;
pub use sources::PostingSource;
pub use upstream::UpstreamError;
