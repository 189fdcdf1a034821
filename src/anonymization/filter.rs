//! False-positive filtering
//!
//! Candidates are checked in a fixed order: registered validator, blacklist,
//! structural plausibility, context contradiction. The first failing check
//! drops the candidate; surviving candidates keep their score.

use crate::anonymization::detector::context::{ContextScorer, ContextWindow};
use crate::anonymization::detector::regex::DEFAULT_CONTEXT_WINDOW;
use crate::anonymization::models::{EntityType, Span};
use crate::anonymization::validators::ValidatorRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Blacklist key applying to every entity type
pub const GLOBAL_BLACKLIST: &str = "*";

const STREET_SUFFIXES: &[&str] = &[
    " st", " street", " rd", " road", " ave", " avenue", " dr", " drive", " ln", " lane", " pl",
    " place", " ct", " court", " cr", " crescent",
];

const PERSON_REJECT_PREFIXES: &[&str] = &["policy", "claim", "ref"];

/// Blacklist definition from the catalog
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BlacklistDefinition {
    /// Whole-text phrases (case-insensitive)
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Words that disqualify a span when any token matches
    #[serde(default)]
    pub words: Vec<String>,
    /// Prefixes that disqualify single-word spans
    #[serde(default)]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Blacklist {
    phrases: HashSet<String>,
    words: HashSet<String>,
    prefixes: Vec<String>,
}

impl From<&BlacklistDefinition> for Blacklist {
    fn from(definition: &BlacklistDefinition) -> Self {
        Self {
            phrases: definition.phrases.iter().map(|p| p.trim().to_lowercase()).collect(),
            words: definition.words.iter().map(|w| w.trim().to_lowercase()).collect(),
            prefixes: definition.prefixes.iter().map(|p| p.trim().to_lowercase()).collect(),
        }
    }
}

impl Blacklist {
    fn merge(&mut self, other: Blacklist) {
        self.phrases.extend(other.phrases);
        self.words.extend(other.words);
        self.prefixes.extend(other.prefixes);
    }
}

/// Reason a candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Validator,
    Blacklist,
    Implausible,
    Contradiction,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Validator => "validator",
            Rejection::Blacklist => "blacklist",
            Rejection::Implausible => "implausible",
            Rejection::Contradiction => "contradiction",
        }
    }
}

/// Drops candidates that fail validation, blacklists, plausibility or context
#[derive(Debug, Clone)]
pub struct FalsePositiveFilter {
    validators: Arc<ValidatorRegistry>,
    scorer: Arc<ContextScorer>,
    global: Blacklist,
    blacklists: HashMap<EntityType, Blacklist>,
    /// Union of every word list, used for the non-entity phrase check
    vocabulary: HashSet<String>,
    context_window: usize,
}

impl FalsePositiveFilter {
    /// Create a filter without blacklists
    pub fn new(validators: Arc<ValidatorRegistry>, scorer: Arc<ContextScorer>) -> Self {
        Self {
            validators,
            scorer,
            global: Blacklist::default(),
            blacklists: HashMap::new(),
            vocabulary: HashSet::new(),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Load blacklists keyed by entity type (`"*"` applies to all types)
    pub fn with_blacklists(mut self, definitions: &HashMap<String, BlacklistDefinition>) -> Self {
        for (key, definition) in definitions {
            let blacklist = Blacklist::from(definition);
            self.vocabulary.extend(blacklist.words.iter().cloned());
            if key.trim() == GLOBAL_BLACKLIST {
                self.global.merge(blacklist);
            } else {
                self.blacklists
                    .entry(EntityType::new(key))
                    .or_default()
                    .merge(blacklist);
            }
        }
        self
    }

    /// Set the context window used for contradiction checks
    pub fn with_context_window(mut self, chars: usize) -> Self {
        self.context_window = chars;
        self
    }

    /// Filter candidates, preserving input order
    pub fn filter(&self, candidates: Vec<Span>, source: &str) -> Vec<Span> {
        let before = candidates.len();
        let kept: Vec<Span> = candidates
            .into_iter()
            .filter(|span| match self.check(span, source) {
                Some(reason) => {
                    tracing::debug!(
                        entity_type = %span.entity_type,
                        start = span.start,
                        end = span.end,
                        source = %span.source,
                        reason = reason.as_str(),
                        "Dropped candidate"
                    );
                    false
                }
                None => true,
            })
            .collect();

        tracing::trace!(before, after = kept.len(), "False-positive filter complete");
        kept
    }

    /// Run all checks on one candidate
    pub fn check(&self, span: &Span, source: &str) -> Option<Rejection> {
        if !self.validators.validate(&span.entity_type, &span.text) {
            return Some(Rejection::Validator);
        }

        let lowered = span.text.trim().to_lowercase();
        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(strip_punctuation)
            .filter(|t| !t.is_empty())
            .collect();

        if self.is_blacklisted(&span.entity_type, &lowered, &tokens) {
            return Some(Rejection::Blacklist);
        }

        if self.is_implausible(span, &lowered, &tokens) {
            return Some(Rejection::Implausible);
        }

        let window = ContextWindow::for_span(source, span, self.context_window);
        if self.scorer.is_contradicted(&window, &span.entity_type) {
            return Some(Rejection::Contradiction);
        }

        None
    }

    fn is_blacklisted(&self, entity_type: &EntityType, lowered: &str, tokens: &[&str]) -> bool {
        if self.global.phrases.contains(lowered) {
            return true;
        }
        let Some(blacklist) = self.blacklists.get(entity_type) else {
            return false;
        };
        blacklist.phrases.contains(lowered) || tokens.iter().any(|t| blacklist.words.contains(*t))
    }

    fn is_implausible(&self, span: &Span, lowered: &str, tokens: &[&str]) -> bool {
        let entity_type = &span.entity_type;
        let name_like = *entity_type == EntityType::PERSON
            || *entity_type == EntityType::ORGANIZATION
            || *entity_type == EntityType::LOCATION;

        let raw_tokens: Vec<&str> = span.text.split_whitespace().collect();
        if name_like && raw_tokens.len() == 1 && is_lowercase_word(raw_tokens[0]) {
            return true;
        }

        if !tokens.is_empty() && tokens.iter().all(|t| self.vocabulary.contains(*t)) {
            return true;
        }

        if *entity_type == EntityType::PERSON
            && (lowered.contains("number")
                || PERSON_REJECT_PREFIXES.iter().any(|p| lowered.starts_with(p))
                || STREET_SUFFIXES.iter().any(|s| lowered.ends_with(s)))
        {
            return true;
        }

        if raw_tokens.len() == 1 {
            if let Some(blacklist) = self.blacklists.get(entity_type) {
                if blacklist.prefixes.iter().any(|p| lowered.starts_with(p.as_str())) {
                    return true;
                }
                if *entity_type == EntityType::LOCATION {
                    if let Some(singular) = lowered.strip_suffix('s') {
                        if blacklist.phrases.contains(singular) {
                            return true;
                        }
                    }
                }
            }
        }

        false
    }
}

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| c.is_ascii_punctuation())
}

fn is_lowercase_word(token: &str) -> bool {
    token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_uppercase)
}
