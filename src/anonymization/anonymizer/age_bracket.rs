//! Age bracketing operator
//!
//! Turns a birth date or a stated age into a coarse range such as `40-44`.

use crate::anonymization::validators::parse_date;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default bracket width in years
pub const DEFAULT_BRACKET_SIZE: u32 = 5;

const MAX_AGE: u32 = 150;

static STATED_AGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:age\s*[:\-]?\s*)?(\d{1,3})(?:\s*(?:years?|yrs?|y\.?o\.?)(?:\s+old)?)?$")
        .expect("valid age regex")
});

/// Age in whole years at `reference` for a birth date
///
/// Returns `None` for birth dates after the reference date.
pub fn age_on(birth: NaiveDate, reference: NaiveDate) -> Option<u32> {
    if birth > reference {
        return None;
    }
    let mut years = reference.year() - birth.year();
    if (reference.month(), reference.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Parse an age from a stated age (`42`, `Age: 42`, `42 years old`) or a date
pub fn parse_age(text: &str, reference: NaiveDate) -> Option<u32> {
    let trimmed = text.trim();

    if let Some(caps) = STATED_AGE.captures(trimmed) {
        let age: u32 = caps[1].parse().ok()?;
        return (age <= MAX_AGE).then_some(age);
    }

    let age = age_on(parse_date(trimmed)?, reference)?;
    (age <= MAX_AGE).then_some(age)
}

/// Bracket an age: `lo = age / size * size`, `hi = lo + size - 1`
pub fn bracket(age: u32, size: u32) -> String {
    let size = size.max(1);
    let lo = age / size * size;
    format!("{}-{}", lo, lo + size - 1)
}

/// Bracket the age expressed by `text`, or `None` when it cannot be parsed
pub fn age_bracket(text: &str, size: u32, reference: NaiveDate) -> Option<String> {
    parse_age(text, reference).map(|age| bracket(age, size))
}
