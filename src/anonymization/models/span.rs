//! Span and entity type data models

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Symbolic entity type tag (e.g. `PERSON`, `AU_TFN`, `NAME_CONSULTANT`)
///
/// Entity types are open: rules and recognizers may introduce new ones at
/// runtime. Names are normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Cow<'static, str>);

impl EntityType {
    pub const PERSON: Self = Self::from_static("PERSON");
    pub const NAME_CONSULTANT: Self = Self::from_static("NAME_CONSULTANT");
    pub const ORGANIZATION: Self = Self::from_static("ORGANIZATION");
    pub const LOCATION: Self = Self::from_static("LOCATION");
    pub const DATE: Self = Self::from_static("DATE");
    pub const DATE_OF_BIRTH: Self = Self::from_static("DATE_OF_BIRTH");
    pub const NUMBER: Self = Self::from_static("NUMBER");
    pub const EMAIL_ADDRESS: Self = Self::from_static("EMAIL_ADDRESS");
    pub const PHONE_NUMBER: Self = Self::from_static("PHONE_NUMBER");
    pub const CREDIT_CARD: Self = Self::from_static("CREDIT_CARD");
    pub const AU_TFN: Self = Self::from_static("AU_TFN");
    pub const AU_ABN: Self = Self::from_static("AU_ABN");
    pub const AU_ACN: Self = Self::from_static("AU_ACN");
    pub const AU_MEDICARE: Self = Self::from_static("AU_MEDICARE");
    pub const AU_PHONE: Self = Self::from_static("AU_PHONE");
    pub const AU_BSB: Self = Self::from_static("AU_BSB");
    pub const AU_ACCOUNT_NUMBER: Self = Self::from_static("AU_ACCOUNT_NUMBER");
    pub const AU_POSTCODE: Self = Self::from_static("AU_POSTCODE");

    /// Create an entity type from a name, normalizing to upper case
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Cow::Owned(name.as_ref().trim().to_uppercase()))
    }

    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Get the entity type name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Detection method that produced a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Pattern rule from the catalog
    Regex,
    /// External named-entity recognizer
    Ner,
}

/// A typed, scored half-open interval `[start, end)` over source text
///
/// Offsets are UTF-8 byte offsets that always fall on `char` boundaries.
/// `text` is captured once at detection time and is never re-sliced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Entity type tag
    pub entity_type: EntityType,
    /// Matched text, equal to `source[start..end]`
    pub text: String,
    /// Confidence score (0.0 - 1.0)
    pub score: f32,
    /// Rule name or recognizer id that produced the span
    pub source: String,
    /// Detection method used
    pub method: DetectionMethod,
}

impl Span {
    /// Create a new span, clamping the score into `[0.0, 1.0]`
    pub fn new(
        start: usize,
        end: usize,
        entity_type: EntityType,
        text: impl Into<String>,
        score: f32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            entity_type,
            text: text.into(),
            score: score.clamp(0.0, 1.0),
            source: source.into(),
            method: DetectionMethod::Regex,
        }
    }

    /// Create a span by slicing `source_text`
    ///
    /// Returns `None` when the interval is empty, out of range, or not on
    /// `char` boundaries.
    pub fn from_source(
        source_text: &str,
        start: usize,
        end: usize,
        entity_type: EntityType,
        score: f32,
        source: impl Into<String>,
    ) -> Option<Self> {
        if start >= end || end > source_text.len() {
            return None;
        }
        let text = source_text.get(start..end)?;
        Some(Self::new(start, end, entity_type, text, score, source))
    }

    /// Set the detection method
    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check whether two spans overlap (`a.start < b.end && b.start < a.end`)
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check whether the cached text still matches the source slice
    pub fn matches_source(&self, source_text: &str) -> bool {
        source_text.get(self.start..self.end) == Some(self.text.as_str())
    }

    /// Set the confidence score
    pub fn set_score(&mut self, score: f32) {
        self.score = score.clamp(0.0, 1.0);
    }

    /// Add a delta to the confidence score
    pub fn adjust_score(&mut self, delta: f32) {
        self.set_score(self.score + delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_normalization() {
        assert_eq!(EntityType::new(" person "), EntityType::PERSON);
        assert_eq!(EntityType::from("au_tfn").as_str(), "AU_TFN");
        assert_eq!(EntityType::AU_BSB.to_string(), "AU_BSB");
    }

    #[test]
    fn test_entity_type_serde_transparent() {
        let json = serde_json::to_string(&EntityType::EMAIL_ADDRESS).unwrap();
        assert_eq!(json, "\"EMAIL_ADDRESS\"");
        let parsed: EntityType = serde_json::from_str("\"CUSTOM_ID\"").unwrap();
        assert_eq!(parsed.as_str(), "CUSTOM_ID");
    }

    #[test]
    fn test_from_source_slices_text() {
        let text = "Call 0412 345 678 today";
        let span = Span::from_source(text, 5, 17, EntityType::AU_PHONE, 0.9, "au_mobile").unwrap();
        assert_eq!(span.text, "0412 345 678");
        assert!(span.matches_source(text));
    }

    #[test]
    fn test_from_source_rejects_bad_offsets() {
        let text = "héllo";
        assert!(Span::from_source(text, 3, 3, EntityType::PERSON, 0.5, "t").is_none());
        assert!(Span::from_source(text, 0, 99, EntityType::PERSON, 0.5, "t").is_none());
        // byte 2 is inside the two-byte 'é'
        assert!(Span::from_source(text, 2, 4, EntityType::PERSON, 0.5, "t").is_none());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = Span::new(0, 5, EntityType::PERSON, "Bruno", 0.9, "t");
        let b = Span::new(5, 9, EntityType::PERSON, " Alo", 0.9, "t");
        let c = Span::new(4, 6, EntityType::PERSON, "o ", 0.9, "t");
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_score_is_clamped() {
        let mut span = Span::new(0, 1, EntityType::NUMBER, "7", 1.4, "t");
        assert_eq!(span.score, 1.0);
        span.adjust_score(-2.0);
        assert_eq!(span.score, 0.0);
    }
}
