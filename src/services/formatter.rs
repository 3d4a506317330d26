use crate::core::skills::match_fraction;
use crate::models::{FindJobsResponse, JobView, Posting, SkillsMatch};

/// Build the client-facing response from scored postings
///
/// `requested_skill_count` is the number of parsed skills in the request;
/// it is the denominator of every match percentage.
pub fn format_results(postings: &[Posting], requested_skill_count: usize) -> FindJobsResponse {
    FindJobsResponse {
        relevant_jobs: postings
            .iter()
            .map(|posting| to_view(posting, requested_skill_count))
            .collect(),
    }
}

fn to_view(posting: &Posting, requested_skill_count: usize) -> JobView {
    let salary = posting
        .salary
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| synthesize_salary(posting));

    let skills_match = if posting.matched_skills.is_empty() {
        None
    } else {
        let matched = posting.matched_skills.len();
        let total = if requested_skill_count > 0 { requested_skill_count } else { matched };
        Some(SkillsMatch {
            matched_skills: posting.matched_skills.keys().cloned().collect(),
            match_percentage: format!("{}%", (match_fraction(matched, total) * 100.0).round() as u32),
        })
    };

    JobView {
        job_title: posting.title.clone(),
        company: posting.company.clone(),
        experience: non_empty(&posting.experience),
        job_nature: non_empty(&posting.job_nature),
        location: non_empty(&posting.location),
        salary,
        apply_link: non_empty(&posting.apply_link),
        skills_match,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

/// Salary text from the numeric fields, when the source gave no text
pub fn synthesize_salary(posting: &Posting) -> Option<String> {
    let positive = |v: Option<f64>| v.filter(|n| *n > 0.0);
    let money = |amount: f64| format_amount(amount, posting.salary_currency.as_deref());

    if let Some(median) = positive(posting.median_salary) {
        return Some(format!("Median: {}", money(median)));
    }

    match (positive(posting.min_salary), positive(posting.max_salary)) {
        (Some(min), Some(max)) => Some(format!("{} - {}", money(min), money(max))),
        (Some(min), None) => Some(format!("From {}", money(min))),
        (None, Some(max)) => Some(format!("Up to {}", money(max))),
        (None, None) => None,
    }
}

/// Amount in the given currency: dollars for USD or no currency, otherwise
/// the grouped figure followed by the currency code, e.g. `1,234.50 EUR`
pub fn format_amount(amount: f64, currency: Option<&str>) -> String {
    match currency.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) if !code.eq_ignore_ascii_case("USD") => {
            format!("{} {}", format_money(amount).replacen('$', "", 1), code.to_uppercase())
        }
        _ => format_money(amount),
    }
}

/// Dollar amount with thousands separators and two decimals, e.g. `$1,234.50`
pub fn format_money(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}
