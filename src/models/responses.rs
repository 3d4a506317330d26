use serde::{Deserialize, Serialize};

/// Externally visible view of a posting
///
/// Internal scoring fields (description, source, source id, relevance
/// score, matched-skills map) never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_title: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(rename = "jobNature", skip_serializing_if = "Option::is_none")]
    pub job_nature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_match: Option<SkillsMatch>,
}

/// Summary of which requested skills a posting covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsMatch {
    pub matched_skills: Vec<String>,
    pub match_percentage: String,
}

/// Response for the find-jobs endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindJobsResponse {
    pub relevant_jobs: Vec<JobView>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
