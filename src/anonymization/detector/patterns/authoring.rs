//! Rule authoring: build rules from example values and check them before use
//!
//! A rule built here is an ordinary [`RuleDefinition`]; compile it with
//! [`PatternRule::from_definition`] and hand it to
//! [`PatternRegistry::add_rule`](super::PatternRegistry::add_rule).

use super::{default_score, MatchExpression, PatternRule, RuleDefinition};
use crate::domain::{Result, VeilError};
use serde::Serialize;

/// How far example values are generalized into a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generalization {
    /// Match the examples literally
    Exact,
    /// Keep letters and punctuation, accept any run of digits
    Digits,
    /// Keep punctuation, generalize runs by character class and length range
    #[default]
    Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Digit,
    Upper,
    Lower,
    Letter,
    Space,
    Literal(char),
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_ascii_digit() {
            Self::Digit
        } else if c.is_ascii_uppercase() {
            Self::Upper
        } else if c.is_ascii_lowercase() {
            Self::Lower
        } else if c.is_alphabetic() {
            Self::Letter
        } else if c.is_whitespace() {
            Self::Space
        } else {
            Self::Literal(c)
        }
    }

    fn is_word(self) -> bool {
        !matches!(self, Self::Space | Self::Literal(_)) || self == Self::Literal('_')
    }

    fn atom(self) -> String {
        match self {
            Self::Digit => r"\d".to_string(),
            Self::Upper => "[A-Z]".to_string(),
            Self::Lower => "[a-z]".to_string(),
            Self::Letter => r"\p{L}".to_string(),
            Self::Space => r"\s".to_string(),
            Self::Literal(c) => regex::escape(c.encode_utf8(&mut [0; 4])),
        }
    }
}

/// Split an example into runs of one character class
fn runs(example: &str) -> Vec<(CharClass, usize)> {
    let mut runs: Vec<(CharClass, usize)> = Vec::new();
    for class in example.chars().map(CharClass::of) {
        match runs.last_mut() {
            Some((last, count)) if *last == class => *count += 1,
            _ => runs.push((class, 1)),
        }
    }
    runs
}

fn quantifier(min: usize, max: usize) -> String {
    match (min, max) {
        (1, 1) => String::new(),
        (min, max) if min == max => format!("{{{min}}}"),
        (min, max) => format!("{{{min},{max}}}"),
    }
}

fn with_boundaries(body: String, first: CharClass, last: CharClass) -> String {
    let lead = if first.is_word() { r"\b" } else { "" };
    let trail = if last.is_word() { r"\b" } else { "" };
    format!("{lead}{body}{trail}")
}

fn exact_alternative(example: &str) -> String {
    let classes = runs(example);
    let body = regex::escape(example);
    match (classes.first(), classes.last()) {
        (Some(&(first, _)), Some(&(last, _))) => with_boundaries(body, first, last),
        _ => body,
    }
}

fn digits_alternative(example: &str) -> String {
    let classes = runs(example);
    let mut body = String::new();
    let mut rest = example;
    for &(class, count) in &classes {
        let split = rest
            .char_indices()
            .nth(count)
            .map_or(rest.len(), |(i, _)| i);
        let (run, tail) = rest.split_at(split);
        if class == CharClass::Digit {
            body.push_str(r"\d+");
        } else {
            body.push_str(&regex::escape(run));
        }
        rest = tail;
    }
    match (classes.first(), classes.last()) {
        (Some(&(first, _)), Some(&(last, _))) => with_boundaries(body, first, last),
        _ => body,
    }
}

/// Examples with the same class sequence share one alternative whose run
/// lengths span the observed range
fn shape_alternatives(examples: &[&str]) -> Vec<String> {
    let mut shapes: Vec<(Vec<CharClass>, Vec<(usize, usize)>)> = Vec::new();

    for example in examples {
        let example_runs = runs(example);
        let key: Vec<CharClass> = example_runs.iter().map(|&(class, _)| class).collect();
        match shapes.iter_mut().find(|(shape, _)| *shape == key) {
            Some((_, ranges)) => {
                for (range, &(_, count)) in ranges.iter_mut().zip(&example_runs) {
                    range.0 = range.0.min(count);
                    range.1 = range.1.max(count);
                }
            }
            None => shapes.push((key, example_runs.iter().map(|&(_, c)| (c, c)).collect())),
        }
    }

    shapes
        .into_iter()
        .filter_map(|(classes, ranges)| {
            let body: String = classes
                .iter()
                .zip(&ranges)
                .map(|(&class, &(min, max))| match class {
                    CharClass::Space => r"\s+".to_string(),
                    _ => format!("{}{}", class.atom(), quantifier(min, max)),
                })
                .collect();
            Some(with_boundaries(body, *classes.first()?, *classes.last()?))
        })
        .collect()
}

/// Build a regular expression matching every example
///
/// Distinct alternatives are joined in first-seen order. Word boundaries are
/// added at ends that start or finish with a word character.
///
/// # Errors
///
/// Returns a configuration error when `examples` is empty or contains a
/// blank value.
pub fn regex_from_examples<S: AsRef<str>>(
    examples: &[S],
    level: Generalization,
) -> Result<String> {
    if examples.is_empty() {
        return Err(VeilError::Configuration(
            "At least one example is required".to_string(),
        ));
    }
    let examples: Vec<&str> = examples.iter().map(|e| e.as_ref().trim()).collect();
    if let Some(index) = examples.iter().position(|e| e.is_empty()) {
        return Err(VeilError::Configuration(format!("Example {index} is blank")));
    }

    let candidates: Vec<String> = match level {
        Generalization::Exact => examples.iter().map(|e| exact_alternative(e)).collect(),
        Generalization::Digits => examples.iter().map(|e| digits_alternative(e)).collect(),
        Generalization::Shape => shape_alternatives(&examples),
    };

    let mut alternatives: Vec<String> = Vec::new();
    for candidate in candidates {
        if !alternatives.contains(&candidate) {
            alternatives.push(candidate);
        }
    }

    Ok(match alternatives.as_slice() {
        [single] => single.clone(),
        _ => format!("(?:{})", alternatives.join("|")),
    })
}

/// Build a rule definition from example values
///
/// The rule gets the default score and no context; set the public fields
/// before compiling to refine it.
///
/// # Errors
///
/// Fails when the examples are unusable or the resulting definition does not
/// pass [`validate_rule_definition`].
pub fn rule_from_examples<S: AsRef<str>>(
    name: &str,
    entity_type: &str,
    examples: &[S],
    level: Generalization,
) -> Result<RuleDefinition> {
    let pattern = regex_from_examples(examples, level)?;
    let definition = RuleDefinition {
        name: name.trim().to_string(),
        entity_type: entity_type.trim().to_uppercase(),
        patterns: vec![pattern],
        score: default_score(),
        group: None,
        context: Vec::new(),
        require_context: false,
        exclude_before: Vec::new(),
        exclude_after: Vec::new(),
        case_insensitive: false,
    };
    validate_rule_definition(&definition)?;

    tracing::debug!(
        rule = %definition.name,
        entity_type = %definition.entity_type,
        pattern = %definition.patterns[0],
        examples = examples.len(),
        "Rule built from examples"
    );

    Ok(definition)
}

/// Check a rule definition without registering it
///
/// Every problem is reported, not just the first.
///
/// # Errors
///
/// Returns a configuration error listing blank names or keywords, a malformed
/// entity type, missing or invalid patterns, a capture group the patterns do
/// not have, and a score outside `[0.0, 1.0]`.
pub fn validate_rule_definition(definition: &RuleDefinition) -> Result<()> {
    let mut problems = Vec::new();

    if definition.name.trim().is_empty() {
        problems.push("name is blank".to_string());
    }

    let entity_type = definition.entity_type.trim();
    if entity_type.is_empty() {
        problems.push("entity type is blank".to_string());
    } else if !entity_type.starts_with(|c: char| c.is_ascii_alphabetic())
        || !entity_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        problems.push(format!(
            "entity type '{entity_type}' must start with a letter and use only letters, digits and underscores"
        ));
    }

    if definition.patterns.is_empty() {
        problems.push("no patterns".to_string());
    }
    for (index, pattern) in definition.patterns.iter().enumerate() {
        match MatchExpression::compile(pattern, definition.case_insensitive) {
            Ok(expression) => {
                if let Some(group) = definition.group {
                    if group >= expression.captures_len() {
                        problems.push(format!("pattern {index} has no capture group {group}"));
                    }
                }
            }
            Err(e) => problems.push(format!("pattern {index}: {e}")),
        }
    }

    if !(0.0..=1.0).contains(&definition.score) {
        problems.push(format!(
            "score {} must be between 0.0 and 1.0",
            definition.score
        ));
    }

    let blank_keyword = definition
        .context
        .iter()
        .chain(&definition.exclude_before)
        .chain(&definition.exclude_after)
        .any(|k| k.trim().is_empty());
    if blank_keyword {
        problems.push("context and exclusion terms must not be blank".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(VeilError::Configuration(format!(
            "Rule '{}' is invalid: {}",
            definition.name,
            problems.join("; ")
        )))
    }
}

/// A match found in one example
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExampleMatch {
    pub example: String,
    pub matched: String,
    pub start: usize,
    pub end: usize,
}

/// Outcome of running a rule over labelled examples
///
/// Only the rule's expressions and capture group are applied; validators,
/// context scoring and filtering are not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternTestReport {
    /// Positive examples the rule matched
    pub true_positives: Vec<ExampleMatch>,
    /// Positive examples the rule missed
    pub false_negatives: Vec<String>,
    /// Negative examples the rule matched
    pub false_positives: Vec<ExampleMatch>,
    /// Negative examples the rule left alone
    pub true_negatives: Vec<String>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl PatternTestReport {
    pub fn accuracy(&self) -> f64 {
        let correct = self.true_positives.len() + self.true_negatives.len();
        let total = correct + self.false_negatives.len() + self.false_positives.len();
        ratio(correct, total)
    }

    pub fn precision(&self) -> f64 {
        let tp = self.true_positives.len();
        ratio(tp, tp + self.false_positives.len())
    }

    pub fn recall(&self) -> f64 {
        let tp = self.true_positives.len();
        ratio(tp, tp + self.false_negatives.len())
    }

    pub fn f1(&self) -> f64 {
        let (precision, recall) = (self.precision(), self.recall());
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// Every positive matched and no negative matched
    pub fn is_clean(&self) -> bool {
        self.false_negatives.is_empty() && self.false_positives.is_empty()
    }
}

/// Earliest match of any of the rule's expressions
fn first_match(rule: &PatternRule, example: &str) -> Option<ExampleMatch> {
    rule.expressions
        .iter()
        .flat_map(|expression| expression.find_intervals(example, rule.group))
        .min_by_key(|&(start, end)| (start, std::cmp::Reverse(end)))
        .map(|(start, end)| ExampleMatch {
            example: example.to_string(),
            matched: example[start..end].to_string(),
            start,
            end,
        })
}

/// Run a rule definition over positive and negative examples
///
/// # Errors
///
/// Fails when the definition does not pass [`validate_rule_definition`].
pub fn evaluate_rule<P: AsRef<str>, N: AsRef<str>>(
    definition: &RuleDefinition,
    positives: &[P],
    negatives: &[N],
) -> Result<PatternTestReport> {
    validate_rule_definition(definition)?;
    let rule = PatternRule::from_definition(definition)?;
    let mut report = PatternTestReport::default();

    for example in positives.iter().map(AsRef::as_ref) {
        match first_match(&rule, example) {
            Some(found) => report.true_positives.push(found),
            None => report.false_negatives.push(example.to_string()),
        }
    }
    for example in negatives.iter().map(AsRef::as_ref) {
        match first_match(&rule, example) {
            Some(found) => report.false_positives.push(found),
            None => report.true_negatives.push(example.to_string()),
        }
    }

    tracing::debug!(
        rule = %definition.name,
        precision = report.precision(),
        recall = report.recall(),
        "Rule evaluated against examples"
    );

    Ok(report)
}
