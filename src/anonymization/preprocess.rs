//! Acronym expansion before analysis
//!
//! Domain shorthand such as `DOB` or `TFN` hides the labels that context
//! scoring keys on. When enabled, acronyms are expanded to their long form
//! before matching and every substitution is recorded.

use crate::domain::{Result, VeilError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One acronym substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    /// Acronym as it appeared in the input
    pub acronym: String,
    /// Long form written in its place
    pub expansion: String,
    /// Byte offset of the acronym in the input
    pub source_start: usize,
    /// Byte offset of the expansion in the expanded text
    pub expanded_start: usize,
}

/// Whole-word, longest-first acronym replacement
#[derive(Debug, Clone)]
pub struct AcronymExpander {
    pattern: Option<Regex>,
    expansions: HashMap<String, String>,
    case_sensitive: bool,
}

impl AcronymExpander {
    /// Build an expander from an acronym → expansion map
    ///
    /// # Errors
    ///
    /// Empty acronyms are a configuration error.
    pub fn new(acronyms: &HashMap<String, String>, case_sensitive: bool) -> Result<Self> {
        let key = |acronym: &str| {
            if case_sensitive {
                acronym.to_string()
            } else {
                acronym.to_lowercase()
            }
        };

        let mut expansions = HashMap::new();
        for (acronym, expansion) in acronyms {
            let acronym = acronym.trim();
            if acronym.is_empty() {
                return Err(VeilError::Configuration(
                    "Acronym keys must not be empty".to_string(),
                ));
            }
            expansions.insert(key(acronym), expansion.clone());
        }

        let mut ordered: Vec<&str> = acronyms.keys().map(|a| a.trim()).collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        ordered.dedup();

        let pattern = if ordered.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = ordered.iter().map(|a| whole_word(a)).collect();
            let flags = if case_sensitive { "" } else { "(?i)" };
            let source = format!("{flags}(?:{})", alternatives.join("|"));
            Some(Regex::new(&source).map_err(|e| {
                VeilError::Configuration(format!("Invalid acronym table: {e}"))
            })?)
        };

        Ok(Self {
            pattern,
            expansions,
            case_sensitive,
        })
    }

    pub fn len(&self) -> usize {
        self.expansions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expansions.is_empty()
    }

    /// Expand acronyms in `text`, returning the new text and the substitutions made
    pub fn expand(&self, text: &str) -> (String, Vec<Expansion>) {
        let Some(pattern) = &self.pattern else {
            return (text.to_string(), Vec::new());
        };

        let mut expanded = String::with_capacity(text.len());
        let mut expansions = Vec::new();
        let mut cursor = 0;

        for m in pattern.find_iter(text) {
            let lookup = if self.case_sensitive {
                m.as_str().to_string()
            } else {
                m.as_str().to_lowercase()
            };
            let Some(long_form) = self.expansions.get(&lookup) else {
                continue;
            };

            expanded.push_str(&text[cursor..m.start()]);
            expansions.push(Expansion {
                acronym: m.as_str().to_string(),
                expansion: long_form.clone(),
                source_start: m.start(),
                expanded_start: expanded.len(),
            });
            expanded.push_str(long_form);
            cursor = m.end();
        }
        expanded.push_str(&text[cursor..]);

        if !expansions.is_empty() {
            tracing::debug!(count = expansions.len(), "Expanded acronyms");
        }
        (expanded, expansions)
    }
}

/// Escape an acronym and anchor it on word boundaries where it has word characters
fn whole_word(acronym: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let mut alternative = String::new();
    if is_word(acronym.chars().next()) {
        alternative.push_str(r"\b");
    }
    alternative.push_str(&regex::escape(acronym));
    if is_word(acronym.chars().last()) {
        alternative.push_str(r"\b");
    }
    alternative
}
