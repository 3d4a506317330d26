use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::SearchCriteria;

/// Request body for the find-jobs endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindJobsRequest {
    #[validate(length(min = 1))]
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(alias = "job_nature", rename = "jobNature", default)]
    pub job_nature: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
}

impl From<FindJobsRequest> for SearchCriteria {
    fn from(req: FindJobsRequest) -> Self {
        SearchCriteria {
            position: req.position.trim().to_string(),
            location: req.location.filter(|l| !l.trim().is_empty()),
            job_nature: req.job_nature.filter(|n| !n.trim().is_empty()),
            salary: req.salary.filter(|s| !s.trim().is_empty()),
            experience: req.experience.filter(|e| !e.trim().is_empty()),
            skills: req.skills,
        }
    }
}

/// Query string of the find-jobs endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindJobsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}
