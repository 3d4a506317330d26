// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Posting, SearchCriteria};
pub use requests::{FindJobsQuery, FindJobsRequest};
pub use responses::{ErrorResponse, FindJobsResponse, HealthResponse, JobView, SkillsMatch};
