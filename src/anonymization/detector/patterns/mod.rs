//! Pattern rules for PII detection
//!
//! Rules are plain data: an entity type, an ordered list of match
//! expressions and scoring metadata. Expressions compile on the linear-time
//! `regex` engine; expressions that need lookaround fall back to
//! `fancy-regex`. Both sit behind [`MatchExpression`].

mod authoring;

pub use authoring::{
    evaluate_rule, regex_from_examples, rule_from_examples, validate_rule_definition,
    ExampleMatch, Generalization, PatternTestReport,
};

use crate::anonymization::models::EntityType;
use crate::domain::{Result, VeilError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) fn default_score() -> f32 {
    0.85
}

/// Rule definition as stored in a catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleDefinition {
    /// Unique rule name, reported as the span source
    pub name: String,
    /// Entity type produced by the rule
    pub entity_type: String,
    /// Match expressions, tried in order
    pub patterns: Vec<String>,
    /// Base score (0.0 - 1.0)
    #[serde(default = "default_score")]
    pub score: f32,
    /// Capture group narrowing the reported span
    #[serde(default)]
    pub group: Option<usize>,
    /// Context keywords that raise the score when found near the match
    #[serde(default)]
    pub context: Vec<String>,
    /// Lower the score when no context keyword is present
    #[serde(default)]
    pub require_context: bool,
    /// Discard matches directly preceded by one of these terms
    #[serde(default)]
    pub exclude_before: Vec<String>,
    /// Discard matches directly followed by one of these terms
    #[serde(default)]
    pub exclude_after: Vec<String>,
    /// Compile expressions case-insensitively
    #[serde(default)]
    pub case_insensitive: bool,
}

/// A compiled match expression
#[derive(Debug, Clone)]
pub enum MatchExpression {
    /// Linear-time engine
    Linear(regex::Regex),
    /// Backtracking engine, used for lookaround and backreferences
    Backtracking(fancy_regex::Regex),
}

impl MatchExpression {
    /// Compile an expression, preferring the linear-time engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither engine accepts the pattern.
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let source = if case_insensitive {
            format!("(?i){pattern}")
        } else {
            pattern.to_string()
        };

        match regex::Regex::new(&source) {
            Ok(re) => Ok(Self::Linear(re)),
            Err(linear_err) => fancy_regex::Regex::new(&source)
                .map(Self::Backtracking)
                .map_err(|_| {
                    VeilError::Configuration(format!(
                        "Invalid match expression '{pattern}': {linear_err}"
                    ))
                }),
        }
    }

    /// Source pattern
    pub fn as_str(&self) -> &str {
        match self {
            Self::Linear(re) => re.as_str(),
            Self::Backtracking(re) => re.as_str(),
        }
    }

    /// Number of capture groups, including the implicit whole-match group
    pub fn captures_len(&self) -> usize {
        match self {
            Self::Linear(re) => re.captures_len(),
            Self::Backtracking(re) => re.captures_len(),
        }
    }

    /// Check whether the expression uses the backtracking engine
    pub fn is_backtracking(&self) -> bool {
        matches!(self, Self::Backtracking(_))
    }

    /// Find all non-empty match intervals
    ///
    /// With `group` set, the interval of that capture group is reported and
    /// matches where the group did not participate are skipped.
    pub fn find_intervals(&self, text: &str, group: Option<usize>) -> Vec<(usize, usize)> {
        let index = group.unwrap_or(0);
        let mut intervals = Vec::new();

        match self {
            Self::Linear(re) => {
                for caps in re.captures_iter(text) {
                    if let Some(m) = caps.get(index) {
                        if m.start() < m.end() {
                            intervals.push((m.start(), m.end()));
                        }
                    }
                }
            }
            Self::Backtracking(re) => {
                for caps in re.captures_iter(text) {
                    match caps {
                        Ok(caps) => {
                            if let Some(m) = caps.get(index) {
                                if m.start() < m.end() {
                                    intervals.push((m.start(), m.end()));
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                pattern = %re.as_str(),
                                error = %e,
                                "Backtracking match aborted"
                            );
                            break;
                        }
                    }
                }
            }
        }

        intervals
    }
}

/// A compiled pattern rule
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub name: String,
    pub entity_type: EntityType,
    pub expressions: Vec<MatchExpression>,
    pub group: Option<usize>,
    /// Lower-cased context keywords
    pub context: Vec<String>,
    pub score: f32,
    pub require_context: bool,
    /// Lower-cased exclusion terms
    pub exclude_before: Vec<String>,
    pub exclude_after: Vec<String>,
}

impl PatternRule {
    /// Create a rule from raw patterns
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty pattern list, an invalid
    /// expression or a score outside `[0.0, 1.0]`.
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        entity_type: EntityType,
        patterns: &[S],
        score: f32,
    ) -> Result<Self> {
        Self::compile(name.into(), entity_type, patterns, score, false)
    }

    fn compile<S: AsRef<str>>(
        name: String,
        entity_type: EntityType,
        patterns: &[S],
        score: f32,
        case_insensitive: bool,
    ) -> Result<Self> {
        if patterns.is_empty() {
            return Err(VeilError::Configuration(format!(
                "Rule '{name}' has no patterns"
            )));
        }
        if !(0.0..=1.0).contains(&score) {
            return Err(VeilError::Configuration(format!(
                "Rule '{name}' score {score} must be between 0.0 and 1.0"
            )));
        }

        let expressions = patterns
            .iter()
            .map(|p| MatchExpression::compile(p.as_ref(), case_insensitive))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| VeilError::Configuration(format!("Rule '{name}': {e}")))?;

        Ok(Self {
            name,
            entity_type,
            expressions,
            group: None,
            context: Vec::new(),
            score,
            require_context: false,
            exclude_before: Vec::new(),
            exclude_after: Vec::new(),
        })
    }

    /// Compile a rule from its catalog definition
    pub fn from_definition(definition: &RuleDefinition) -> Result<Self> {
        let rule = Self::compile(
            definition.name.clone(),
            EntityType::new(&definition.entity_type),
            &definition.patterns,
            definition.score,
            definition.case_insensitive,
        )?;

        Ok(rule
            .with_group(definition.group)
            .with_context(&definition.context, definition.require_context)
            .with_exclusions(&definition.exclude_before, &definition.exclude_after))
    }

    /// Report the given capture group instead of the whole match
    pub fn with_group(mut self, group: Option<usize>) -> Self {
        self.group = group;
        self
    }

    /// Set context keywords
    pub fn with_context<S: AsRef<str>>(mut self, keywords: &[S], required: bool) -> Self {
        self.context = keywords.iter().map(|k| k.as_ref().to_lowercase()).collect();
        self.require_context = required;
        self
    }

    /// Set lookbehind / lookahead exclusion terms
    pub fn with_exclusions<S: AsRef<str>>(mut self, before: &[S], after: &[S]) -> Self {
        self.exclude_before = before.iter().map(|t| t.as_ref().to_lowercase()).collect();
        self.exclude_after = after.iter().map(|t| t.as_ref().to_lowercase()).collect();
        self
    }

    /// Check whether exclusion terms rule out a match given its surroundings
    pub fn is_excluded(&self, before: &str, after: &str) -> bool {
        let before = before.trim_end().to_lowercase();
        let after = after.trim_start().to_lowercase();
        self.exclude_before.iter().any(|t| before.ends_with(t.as_str()))
            || self.exclude_after.iter().any(|t| after.starts_with(t.as_str()))
    }
}

/// Ordered collection of compiled rules
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
    rules_by_type: HashMap<EntityType, Vec<usize>>,
}

impl PatternRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a registry from catalog definitions, preserving order
    ///
    /// # Errors
    ///
    /// Fails on the first invalid rule or on duplicate rule names.
    pub fn from_definitions(definitions: &[RuleDefinition]) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.add_rule(PatternRule::from_definition(definition)?)?;
        }
        Ok(registry)
    }

    /// Append a rule
    pub fn add_rule(&mut self, rule: PatternRule) -> Result<()> {
        if self.rules.iter().any(|r| r.name == rule.name) {
            return Err(VeilError::Configuration(format!(
                "Duplicate rule name '{}'",
                rule.name
            )));
        }
        self.rules_by_type
            .entry(rule.entity_type.clone())
            .or_default()
            .push(self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// All rules in load order
    pub fn all_rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Rules producing a given entity type
    pub fn rules_for(&self, entity_type: &EntityType) -> Vec<&PatternRule> {
        self.rules_by_type
            .get(entity_type)
            .map(|indices| indices.iter().map(|&i| &self.rules[i]).collect())
            .unwrap_or_default()
    }

    /// Look up a rule by name
    pub fn rule(&self, name: &str) -> Option<&PatternRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, entity_type: &str, patterns: &[&str]) -> RuleDefinition {
        RuleDefinition {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            score: 0.85,
            group: None,
            context: vec![],
            require_context: false,
            exclude_before: vec![],
            exclude_after: vec![],
            case_insensitive: false,
        }
    }

    #[test]
    fn test_linear_expression_with_group() {
        let expr = MatchExpression::compile(r"BSB\s*:\s*(\d{3}-\d{3})", false).unwrap();
        assert!(!expr.is_backtracking());
        let text = "BSB : 062-000";
        assert_eq!(expr.find_intervals(text, Some(1)), vec![(6, 13)]);
        assert_eq!(expr.find_intervals(text, None), vec![(0, 13)]);
    }

    #[test]
    fn test_lookahead_falls_back_to_backtracking() {
        let expr = MatchExpression::compile(
            r"Consultant\s*:\s*([A-Z][a-z]+\s+[A-Z][a-z]+)(?=\s+Subject)",
            false,
        )
        .unwrap();
        assert!(expr.is_backtracking());
        let text = "Consultant : Jane Citizen Subject: renewal";
        let intervals = expr.find_intervals(text, Some(1));
        assert_eq!(intervals.len(), 1);
        let (start, end) = intervals[0];
        assert_eq!(&text[start..end], "Jane Citizen");
    }

    #[test]
    fn test_invalid_expression_is_configuration_error() {
        let result = MatchExpression::compile(r"(\d{3}", false);
        assert!(matches!(result, Err(VeilError::Configuration(_))));
    }

    #[test]
    fn test_case_insensitive_definition() {
        let mut def = definition("tfn", "au_tfn", &[r"tfn\s*:\s*(\d{9})"]);
        def.case_insensitive = true;
        def.group = Some(1);
        let rule = PatternRule::from_definition(&def).unwrap();
        assert_eq!(rule.entity_type, EntityType::AU_TFN);
        let intervals = rule.expressions[0].find_intervals("TFN: 123456782", rule.group);
        assert_eq!(intervals, vec![(5, 14)]);
    }

    #[test]
    fn test_case_insensitive_flag_compiled_into_every_expression() {
        let mut def = definition("ref", "INVOICE_NUMBER", &[r"inv-\d{4}", r"(?=ref)ref-\d{4}"]);
        def.case_insensitive = true;
        let rule = PatternRule::from_definition(&def).unwrap();

        assert_eq!(rule.expressions.len(), 2);
        assert!(!rule.expressions[0].is_backtracking());
        assert!(rule.expressions[1].is_backtracking());
        for expr in &rule.expressions {
            assert!(expr.as_str().starts_with("(?i)"));
            assert!(!expr.as_str().starts_with("(?i)(?i)"));
        }
        assert_eq!(rule.expressions[0].find_intervals("INV-2024", None), vec![(0, 8)]);
        assert_eq!(rule.expressions[1].find_intervals("REF-0042", None), vec![(0, 8)]);

        let plain = PatternRule::new("plain", EntityType::new("INVOICE_NUMBER"), &[r"inv-\d{4}"], 0.8)
            .unwrap();
        assert!(plain.expressions[0].find_intervals("INV-2024", None).is_empty());
    }

    #[test]
    fn test_captures_len_counts_whole_match() {
        let linear = MatchExpression::compile(r"(\d{3})-(\d{3})", false).unwrap();
        assert_eq!(linear.captures_len(), 3);
        let backtracking = MatchExpression::compile(r"(\w+)(?=:)", false).unwrap();
        assert_eq!(backtracking.captures_len(), 2);
    }

    #[test]
    fn test_rule_rejects_bad_score_and_empty_patterns() {
        let mut def = definition("bad", "PERSON", &[r"\w+"]);
        def.score = 1.5;
        assert!(PatternRule::from_definition(&def).is_err());

        let def = definition("empty", "PERSON", &[]);
        assert!(PatternRule::from_definition(&def).is_err());
    }

    #[test]
    fn test_exclusion_terms() {
        let rule = PatternRule::new("digits", EntityType::NUMBER, &[r"\d+"], 0.5)
            .unwrap()
            .with_exclusions(&["invoice"], &["kg"]);
        assert!(rule.is_excluded("Invoice ", " units"));
        assert!(rule.is_excluded("Total ", " KG"));
        assert!(!rule.is_excluded("Total ", " units"));
    }

    #[test]
    fn test_registry_preserves_order_and_rejects_duplicates() {
        let defs = vec![
            definition("b_rule", "PERSON", &[r"[A-Z][a-z]+"]),
            definition("a_rule", "AU_TFN", &[r"\d{9}"]),
        ];
        let mut registry = PatternRegistry::from_definitions(&defs).unwrap();
        let names: Vec<&str> = registry.all_rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b_rule", "a_rule"]);
        assert_eq!(registry.rules_for(&EntityType::AU_TFN).len(), 1);

        let duplicate = PatternRule::new("a_rule", EntityType::PERSON, &[r"x"], 0.5).unwrap();
        assert!(registry.add_rule(duplicate).is_err());
    }
}
