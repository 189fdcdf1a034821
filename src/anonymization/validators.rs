//! Structural and checksum validators for candidate spans
//!
//! Each validator is a pure, total function over the span text. The
//! [`ValidatorRegistry`] maps entity types to validators; types without a
//! registered validator always pass.

use crate::anonymization::models::EntityType;
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Validator function signature
pub type ValidatorFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static STATE_POSTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:NSW|VIC|QLD|WA|SA|TAS|NT|ACT)\s+\d{4}$").expect("valid state regex")
});
static NUMERIC_DMY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/.-](\d{1,2})[/.-](\d{2}|\d{4})$").expect("valid date regex")
});
static NUMERIC_YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[/.-](\d{1,2})[/.-](\d{1,2})$").expect("valid date regex")
});
static PHONE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d{3}").expect("valid phone prefix regex"));
static PHONE_HALVES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{4}$").expect("valid phone halves regex"));
static SERVICE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:13\d{4}|1300\d{6}|1800\d{6})$").expect("valid service number regex")
});
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d+\s*(?:minute|hour|day|week|month|year)s?$").expect("valid duration regex")
});
static NUMBER_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s,.\-/]*\d[\d\s,.\-/]*$").expect("valid number regex"));

/// Registry of validators keyed by entity type
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<EntityType, ValidatorFn>,
}

impl ValidatorRegistry {
    /// Create an empty registry (every type passes)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in validators
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(EntityType::AU_TFN, validate_tfn);
        registry.register(EntityType::AU_ABN, validate_abn);
        registry.register(EntityType::AU_ACN, validate_acn);
        registry.register(EntityType::AU_MEDICARE, validate_medicare);
        registry.register(EntityType::AU_PHONE, validate_au_phone);
        registry.register(EntityType::AU_BSB, validate_bsb);
        registry.register(EntityType::AU_POSTCODE, validate_au_postcode);
        registry.register(EntityType::CREDIT_CARD, validate_luhn);
        registry.register(EntityType::DATE, validate_date);
        registry.register(EntityType::DATE_OF_BIRTH, validate_date);
        registry.register(EntityType::NUMBER, validate_number);
        registry
    }

    /// Register (or replace) the validator for an entity type
    pub fn register<F>(&mut self, entity_type: EntityType, validator: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.validators.insert(entity_type, Arc::new(validator));
    }

    /// Check whether a validator exists for the entity type
    pub fn has_validator(&self, entity_type: &EntityType) -> bool {
        self.validators.contains_key(entity_type)
    }

    /// Validate span text for an entity type; unregistered types pass
    ///
    /// A validator that panics counts as a failed validation.
    pub fn validate(&self, entity_type: &EntityType, text: &str) -> bool {
        let Some(validator) = self.validators.get(entity_type) else {
            return true;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| validator(text))) {
            Ok(valid) => valid,
            Err(_) => {
                tracing::warn!(
                    entity_type = %entity_type,
                    length = text.len(),
                    "Validator panicked, dropping candidate"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.validators.keys().map(EntityType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("entity_types", &types)
            .finish()
    }
}

fn digits_of(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn only_digits_and_separators(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '-')
}

/// Australian Tax File Number: 8 or 9 digits with a weighted mod-11 checksum
pub fn validate_tfn(text: &str) -> bool {
    if !only_digits_and_separators(text) {
        return false;
    }
    let digits = digits_of(text);
    let weights: &[u32] = match digits.len() {
        9 => &[1, 4, 3, 7, 5, 8, 6, 9, 10],
        8 => &[10, 7, 8, 4, 6, 3, 5, 1],
        _ => return false,
    };
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    sum % 11 == 0
}

/// Australian Business Number: 11 digits, mod-89 checksum
pub fn validate_abn(text: &str) -> bool {
    if !only_digits_and_separators(text) {
        return false;
    }
    let digits = digits_of(text);
    if digits.len() != 11 || digits[0] == 0 {
        return false;
    }
    const WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i == 0 { d - 1 } else { *d })
        .zip(WEIGHTS)
        .map(|(d, w)| d * w)
        .sum();
    sum % 89 == 0
}

/// Australian Company Number: 9 digits, complement-of-mod-10 check digit
pub fn validate_acn(text: &str) -> bool {
    if !only_digits_and_separators(text) {
        return false;
    }
    let digits = digits_of(text);
    if digits.len() != 9 {
        return false;
    }
    let sum: u32 = digits[..8]
        .iter()
        .zip([8, 7, 6, 5, 4, 3, 2, 1])
        .map(|(d, w)| d * w)
        .sum();
    (10 - sum % 10) % 10 == digits[8]
}

/// Medicare card number: first digit 2-6, weighted check digit, non-zero issue number
pub fn validate_medicare(text: &str) -> bool {
    if !only_digits_and_separators(text) {
        return false;
    }
    let digits = digits_of(text);
    if !(digits.len() == 10 || digits.len() == 11) {
        return false;
    }
    if !(2..=6).contains(&digits[0]) {
        return false;
    }
    let sum: u32 = digits[..8]
        .iter()
        .zip([1, 3, 7, 9, 1, 3, 7, 9])
        .map(|(d, w)| d * w)
        .sum();
    sum % 10 == digits[8] && digits[9] != 0
}

/// Australian phone number: mobile, landline, service, emergency or international
pub fn validate_au_phone(text: &str) -> bool {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    if cleaned.is_empty() {
        return false;
    }
    let (international, body) = match cleaned.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if international {
        if let Some(national) = body.strip_prefix("61") {
            return national.len() == 9 && matches!(national.as_bytes()[0], b'2' | b'3' | b'4' | b'7' | b'8');
        }
        return (8..=17).contains(&body.len());
    }
    if body == "000" || body == "112" {
        return true;
    }
    if SERVICE_NUMBER.is_match(body) {
        return true;
    }
    body.len() == 10 && body.starts_with('0') && matches!(body.as_bytes()[1], b'2' | b'3' | b'4' | b'7' | b'8')
}

/// Bank State Branch number: six digits, optionally `ddd-ddd`
pub fn validate_bsb(text: &str) -> bool {
    let bytes = text.trim().as_bytes();
    match bytes.len() {
        6 => bytes.iter().all(u8::is_ascii_digit),
        7 => {
            matches!(bytes[3], b'-' | b' ')
                && bytes[..3].iter().all(u8::is_ascii_digit)
                && bytes[4..].iter().all(u8::is_ascii_digit)
        }
        _ => false,
    }
}

/// Four-digit Australian postcode within a state range
pub fn validate_au_postcode(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match trimmed.parse::<u32>() {
        Ok(code) => (200..=299).contains(&code) || (800..=999).contains(&code) || code >= 1000,
        Err(_) => false,
    }
}

/// Luhn checksum over 13-19 digits
pub fn validate_luhn(text: &str) -> bool {
    if !only_digits_and_separators(text) {
        return false;
    }
    let digits = digits_of(text);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                *d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Date sanity check
///
/// Rejects values that collide with other numeric formats: `STATE 2000`,
/// postcodes, phone fragments, Medicare numbers, service numbers and
/// durations. Accepts plausible years and real calendar dates.
pub fn validate_date(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || STATE_POSTCODE.is_match(trimmed) {
        return false;
    }

    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let current_year = Utc::now().year();
        return match trimmed.parse::<i32>() {
            Ok(year) => (1900..=current_year + 5).contains(&year),
            Err(_) => false,
        };
    }

    if PHONE_PREFIX.is_match(trimmed)
        || PHONE_HALVES.is_match(trimmed)
        || SERVICE_NUMBER.is_match(trimmed)
        || DURATION.is_match(trimmed)
    {
        return false;
    }
    if trimmed.len() == 10 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    parse_date(trimmed).is_some()
}

/// Generic number: digits with common separators, not a bare `#`
pub fn validate_number(text: &str) -> bool {
    let trimmed = text.trim().trim_start_matches('#').trim();
    !trimmed.is_empty() && NUMBER_SHAPE.is_match(trimmed)
}

/// Parse a calendar date in the formats seen in Australian free text
///
/// Numeric dates are day-first. Two-digit years below 30 map to 20xx,
/// the rest to 19xx.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();

    if let Some(caps) = NUMERIC_YMD.captures(trimmed) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC_DMY.captures(trimmed) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let raw_year: i32 = caps[3].parse().ok()?;
        let year = if caps[3].len() == 2 {
            if raw_year < 30 {
                2000 + raw_year
            } else {
                1900 + raw_year
            }
        } else {
            raw_year
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    const TEXTUAL_FORMATS: [&str; 4] = ["%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];
    TEXTUAL_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
