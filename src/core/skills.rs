use std::collections::BTreeMap;

/// Minimum share of a multi-word skill's words that must appear for partial credit
const PARTIAL_MATCH_THRESHOLD: f64 = 0.5;

/// Split a comma-separated skills string into trimmed, lowercase, non-empty tokens
pub fn parse_skills(skills: Option<&str>) -> Vec<String> {
    skills
        .map(|s| {
            s.split(',')
                .map(|skill| skill.trim().to_lowercase())
                .filter(|skill| !skill.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Score how well `description` covers each skill in `skills`
///
/// Keys are the trimmed, lowercase skills. An exact (case-insensitive)
/// substring match yields 1.0. A multi-word skill without an exact match
/// gets the share of its words found in the description, kept only when
/// strictly above one half. Single-word skills get no partial credit.
pub fn match_skills<S: AsRef<str>>(description: &str, skills: &[S]) -> BTreeMap<String, f64> {
    let mut matched = BTreeMap::new();
    if description.is_empty() || skills.is_empty() {
        return matched;
    }

    let description = description.to_lowercase();

    for skill in skills {
        let skill = skill.as_ref().trim().to_lowercase();
        if skill.is_empty() {
            continue;
        }

        if description.contains(&skill) {
            matched.insert(skill, 1.0);
            continue;
        }

        let words: Vec<&str> = skill.split_whitespace().collect();
        if words.len() < 2 {
            continue;
        }

        let found = words.iter().filter(|word| description.contains(**word)).count();
        let confidence = found as f64 / words.len() as f64;
        if confidence > PARTIAL_MATCH_THRESHOLD {
            matched.insert(skill, confidence);
        }
    }

    matched
}

/// Share of requested skills that matched, in [0, 1]
#[inline]
pub fn match_fraction(matched: usize, requested: usize) -> f64 {
    if requested == 0 {
        return 0.0;
    }
    (matched as f64 / requested as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skills() {
        assert_eq!(parse_skills(Some(" Python, SQL ,,rust ")), vec!["python", "sql", "rust"]);
        assert!(parse_skills(Some("")).is_empty());
        assert!(parse_skills(Some(" , ")).is_empty());
        assert!(parse_skills(None).is_empty());
    }

    #[test]
    fn test_exact_match_is_full_confidence() {
        let matched = match_skills("We use PYTHON and Postgres", &["python"]);
        assert_eq!(matched.get("python"), Some(&1.0));
    }

    #[test]
    fn test_empty_inputs_yield_nothing() {
        assert!(match_skills("", &["python"]).is_empty());
        let no_skills: Vec<String> = Vec::new();
        assert!(match_skills("python", no_skills.as_slice()).is_empty());
    }

    #[test]
    fn test_single_word_gets_no_partial_credit() {
        let matched = match_skills("java developer", &["rust"]);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_multi_word_partial_match_needs_more_than_half() {
        let description = "experience with machine vision and deep networks";

        // 2 of 3 words present
        let matched = match_skills(description, &["machine learning vision"]);
        assert!((matched["machine learning vision"] - 2.0 / 3.0).abs() < 1e-9);

        // exactly half is excluded
        let matched = match_skills(description, &["machine learning"]);
        assert!(matched.is_empty());

        let matched = match_skills(description, &["deep vision learning models"]);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_blank_skills_are_skipped() {
        let matched = match_skills("python", &["  ", "Python "]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched.get("python"), Some(&1.0));
    }

    #[test]
    fn test_confidences_are_in_unit_interval() {
        let skills = ["python", "sql", "data pipelines", "cloud data warehouse", "go"];
        let matched = match_skills("Python, cloud warehouse and data tooling", &skills);
        for confidence in matched.values() {
            assert!(*confidence > 0.0 && *confidence <= 1.0);
        }
    }

    #[test]
    fn test_match_fraction() {
        assert_eq!(match_fraction(1, 2), 0.5);
        assert_eq!(match_fraction(0, 0), 0.0);
        assert_eq!(match_fraction(3, 3), 1.0);
    }
}
