use crate::models::{Posting, SearchCriteria};
use crate::core::skills::parse_skills;

const TITLE_MATCH_POINTS: u32 = 5;
const SKILL_IN_TITLE_POINTS: u32 = 2;
const SKILL_IN_DESCRIPTION_POINTS: u32 = 1;
const MAJORITY_SKILLS_BONUS: u32 = 2;
const LOCATION_MATCH_POINTS: u32 = 2;

/// Cheap heuristic score used to order postings before ML scoring
///
/// * +5 if the requested position is in the title
/// * per requested skill found in the description: +2 if also in the title, else +1
/// * +2 if more than half of the requested skills were found
/// * +2 if the requested location is part of the posting location
///
/// All comparisons are case-insensitive substring checks.
#[inline]
pub fn prefilter_score(posting: &Posting, criteria: &SearchCriteria, skills: &[String]) -> u32 {
    let mut score = 0;
    let title = posting.title.to_lowercase();

    if title.contains(&criteria.position.to_lowercase()) {
        score += TITLE_MATCH_POINTS;
    }

    if let Some(description) = posting.description_text().filter(|_| !skills.is_empty()) {
        let description = description.to_lowercase();
        let mut found = 0usize;

        for skill in skills {
            if description.contains(skill.as_str()) {
                found += 1;
                score += if title.contains(skill.as_str()) {
                    SKILL_IN_TITLE_POINTS
                } else {
                    SKILL_IN_DESCRIPTION_POINTS
                };
            }
        }

        if found as f64 > skills.len() as f64 / 2.0 {
            score += MAJORITY_SKILLS_BONUS;
        }
    }

    if let (Some(wanted), Some(location)) = (criteria.location.as_deref(), posting.location.as_deref()) {
        if location.to_lowercase().contains(&wanted.to_lowercase()) {
            score += LOCATION_MATCH_POINTS;
        }
    }

    score
}

/// Order postings by heuristic score, highest first
///
/// The sort is stable: postings with equal scores keep their input order.
pub fn prefilter(postings: Vec<Posting>, criteria: &SearchCriteria) -> Vec<Posting> {
    let skills = parse_skills(criteria.skills.as_deref());

    let mut scored: Vec<(u32, Posting)> = postings
        .into_iter()
        .map(|posting| (prefilter_score(&posting, criteria, &skills), posting))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored.into_iter().map(|(_, posting)| posting).collect()
}
