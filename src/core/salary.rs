use regex::Regex;
use std::sync::OnceLock;

const HOURS_PER_WEEK: f64 = 40.0;
const DAYS_PER_WEEK: f64 = 5.0;
const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: f64 = 12.0;

/// Pay period attached to a salary figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPeriod {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl PayPeriod {
    fn parse(word: &str) -> Option<Self> {
        let word = word.to_lowercase();
        if word.contains("hour") {
            Some(PayPeriod::Hour)
        } else if word.contains("day") {
            Some(PayPeriod::Day)
        } else if word.contains("week") || word.contains("wk") {
            Some(PayPeriod::Week)
        } else if word.contains("month") {
            Some(PayPeriod::Month)
        } else if word.contains("year") || word.contains("annual") || word.contains("yr") {
            Some(PayPeriod::Year)
        } else {
            None
        }
    }

    /// Yearly equivalent of `amount` paid once per period
    ///
    /// Assumes a 40-hour, 5-day week and 52 weeks a year.
    pub fn annualize(self, amount: f64) -> f64 {
        match self {
            PayPeriod::Hour => amount * HOURS_PER_WEEK * WEEKS_PER_YEAR,
            PayPeriod::Day => amount * DAYS_PER_WEEK * WEEKS_PER_YEAR,
            PayPeriod::Week => amount * WEEKS_PER_YEAR,
            PayPeriod::Month => amount * MONTHS_PER_YEAR,
            PayPeriod::Year => amount,
        }
    }
}

/// A salary range read from free text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryRange {
    pub min: f64,
    pub max: f64,
    pub period: Option<PayPeriod>,
}

impl SalaryRange {
    /// The range in yearly terms; figures without a period are taken as yearly
    pub fn annual(&self) -> (f64, f64) {
        match self.period {
            Some(period) => (period.annualize(self.min), period.annualize(self.max)),
            None => (self.min, self.max),
        }
    }

    /// True when any part of the yearly range falls inside `[min, max]`
    pub fn overlaps(&self, min: f64, max: f64) -> bool {
        let (low, high) = self.annual();
        !(high < min || low > max)
    }
}

fn range_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$?([0-9][0-9,.]*)\s*[-–]\s*\$?([0-9][0-9,.]*)\s*(?:per|an|a|/)?\s*(year|month|hour|yr|wk|week|day|annual)?")
            .expect("static regex is valid")
    })
}

fn single_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$?([0-9][0-9,.]*)\s*(?:per|an|a|/)?\s*(year|month|hour|yr|wk|week|day|annual)?")
            .expect("static regex is valid")
    })
}

fn amount(text: &str) -> Option<f64> {
    text.replace(',', "")
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Parse salary text such as `"55,020.16–64,729.60 a year"` or `"$30 per hour"`
///
/// A single figure becomes a range with equal ends.
pub fn parse_salary_range(text: &str) -> Option<SalaryRange> {
    if let Some(caps) = range_pattern().captures(text) {
        if let (Some(min), Some(max)) = (amount(&caps[1]), amount(&caps[2])) {
            return Some(SalaryRange {
                min,
                max,
                period: caps.get(3).and_then(|m| PayPeriod::parse(m.as_str())),
            });
        }
    }

    let caps = single_pattern().captures(text)?;
    let value = amount(&caps[1])?;
    Some(SalaryRange {
        min: value,
        max: value,
        period: caps.get(2).and_then(|m| PayPeriod::parse(m.as_str())),
    })
}

/// The user's requested yearly range, e.g. `"$50,000 - $60,000"`
///
/// Only an explicit two-ended range counts; anything else means no salary
/// filter.
pub fn parse_requested_range(text: &str) -> Option<(f64, f64)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\$?(\d+(?:,\d+)*)\s*-\s*\$?(\d+(?:,\d+)*)").expect("static regex is valid")
    });

    let caps = re.captures(text)?;
    let min = amount(&caps[1])?;
    let max = amount(&caps[2])?;
    (min > 0.0 && max > 0.0).then_some((min, max))
}

/// Whether a job's salary text overlaps the requested yearly range
///
/// Text that cannot be parsed does not match.
pub fn salary_in_range(job_salary: &str, min: f64, max: f64) -> bool {
    parse_salary_range(job_salary).is_some_and(|range| range.overlaps(min, max))
}
