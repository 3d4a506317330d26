use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user's job search request
///
/// Read-only for the whole pipeline; nothing downstream mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "jobNature", default)]
    pub job_nature: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    /// Comma-separated skill list, e.g. "python, sql"
    #[serde(default)]
    pub skills: Option<String>,
}

impl SearchCriteria {
    pub fn new(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_skills(mut self, skills: impl Into<String>) -> Self {
        self.skills = Some(skills.into());
        self
    }

    pub fn with_job_nature(mut self, job_nature: impl Into<String>) -> Self {
        self.job_nature = Some(job_nature.into());
        self
    }

    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = Some(experience.into());
        self
    }
}

/// One job listing normalized from an external source
///
/// Sources fill the descriptive fields. The relevance scorer writes
/// `relevance_score` and `matched_skills` in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Posting {
    #[serde(rename = "jobTitle")]
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "jobNature", default)]
    pub job_nature: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(rename = "minSalary", default)]
    pub min_salary: Option<f64>,
    #[serde(rename = "maxSalary", default)]
    pub max_salary: Option<f64>,
    #[serde(rename = "medianSalary", default)]
    pub median_salary: Option<f64>,
    #[serde(rename = "salaryCurrency", default)]
    pub salary_currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "applyLink", default)]
    pub apply_link: Option<String>,
    #[serde(rename = "sourceId", default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "relevanceScore", default)]
    pub relevance_score: Option<f64>,
    #[serde(rename = "matchedSkills", default)]
    pub matched_skills: BTreeMap<String, f64>,
}

impl Posting {
    pub fn new(title: impl Into<String>, company: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_apply_link(mut self, apply_link: impl Into<String>) -> Self {
        self.apply_link = Some(apply_link.into());
        self
    }

    /// Description text, treating an empty string as absent
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Score used for ordering; unset sorts as zero
    pub fn score(&self) -> f64 {
        self.relevance_score.unwrap_or(0.0)
    }

    /// Stand-in description used when the real one cannot be fetched
    pub fn placeholder_description(&self) -> String {
        format!("{} at {}", self.title, self.company)
    }
}
