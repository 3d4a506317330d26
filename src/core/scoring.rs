use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::models::{Posting, SearchCriteria};

/// Longest description excerpt sent to the scoring backend, in characters
pub const DESCRIPTION_PREVIEW_CHARS: usize = 500;

/// Cap on the skill boost added to a backend score
pub const HOT_SKILL_BOOST_CAP: f64 = 0.3;

/// Flat score for postings outside the ML budget
pub const COLD_BASE_SCORE: f64 = 0.3;
pub const COLD_SKILL_BOOST_CAP: f64 = 0.2;
pub const COLD_SCORE_CAP: f64 = 0.5;

const NOT_SPECIFIED: &str = "Not specified";

/// How a backend reply was turned into a score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseOutcome {
    /// Reply was a JSON object; value of its `score` field (0.0 when absent)
    Structured(f64),
    /// First decimal number found in free text
    Extracted(f64),
    /// Nothing numeric in the reply
    Unparsed,
}

impl ParseOutcome {
    pub fn score(&self) -> f64 {
        match self {
            ParseOutcome::Structured(score) | ParseOutcome::Extracted(score) => *score,
            ParseOutcome::Unparsed => 0.0,
        }
    }
}

/// Build the relevance prompt for one posting against the search criteria
pub fn build_scoring_prompt(posting: &Posting, criteria: &SearchCriteria) -> String {
    let description: String = match posting.description_text() {
        Some(text) => text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect(),
        None => "Not available".to_string(),
    };

    format!(
        "Score job relevance (0.0-1.0):\n\
         \n\
         Job: {title} at {company}\n\
         Location: {location}\n\
         Type: {job_type}\n\
         Salary: {salary}\n\
         Experience: {experience}\n\
         \n\
         User wants:\n\
         Position: {position}\n\
         Location: {user_location}\n\
         Type: {user_job_type}\n\
         Salary: {user_salary}\n\
         Experience: {user_experience}\n\
         Skills: {user_skills}\n\
         \n\
         Job description excerpt: {description}...\n\
         \n\
         Weigh the skills match heavily: the more of the user's skills the job asks for, the higher the score.\n\
         \n\
         Return only: {{\"score\": 0.XX}}",
        title = posting.title,
        company = posting.company,
        location = or_unspecified(posting.location.as_deref()),
        job_type = or_unspecified(posting.job_nature.as_deref()),
        salary = or_unspecified(posting.salary.as_deref()),
        experience = or_unspecified(posting.experience.as_deref()),
        position = criteria.position,
        user_location = or_unspecified(criteria.location.as_deref()),
        user_job_type = or_unspecified(criteria.job_nature.as_deref()),
        user_salary = or_unspecified(criteria.salary.as_deref()),
        user_experience = or_unspecified(criteria.experience.as_deref()),
        user_skills = or_unspecified(criteria.skills.as_deref()),
        description = description,
    )
}

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_SPECIFIED)
}

/// Turn a backend reply into a score
///
/// Stage one decodes `{"score": n}` (markdown fences tolerated). Replies that
/// are not a JSON object, or whose `score` is not numeric, fall through to
/// stage two: the first `digits.digits` number in the text.
pub fn parse_score_reply(reply: &str) -> ParseOutcome {
    if let Some(score) = parse_structured(strip_json_fences(reply)) {
        return ParseOutcome::Structured(score);
    }

    first_decimal()
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(ParseOutcome::Extracted)
        .unwrap_or(ParseOutcome::Unparsed)
}

fn parse_structured(text: &str) -> Option<f64> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    match object.get("score") {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Some(_) => None,
    }
}

fn first_decimal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.\d+)").expect("static regex is valid"))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));

    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped.strip_suffix("```").map(str::trim).unwrap_or(stripped)
        }
        None => text,
    }
}

/// Final score for a posting scored by the backend
///
/// `skill_fraction` is matched ÷ requested skills.
#[inline]
pub fn hot_score(base: f64, skill_fraction: f64) -> f64 {
    let boost = (skill_fraction * HOT_SKILL_BOOST_CAP).min(HOT_SKILL_BOOST_CAP);
    clamp_unit(base + boost)
}

/// Heuristic score for a posting outside the ML budget, in [0.3, 0.5]
#[inline]
pub fn cold_score(skill_fraction: f64) -> f64 {
    let boost = (skill_fraction * COLD_SKILL_BOOST_CAP).min(COLD_SKILL_BOOST_CAP);
    (COLD_BASE_SCORE + boost.max(0.0)).min(COLD_SCORE_CAP)
}

#[inline]
fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
