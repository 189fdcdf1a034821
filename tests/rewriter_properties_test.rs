//! Properties of resolution, trimming and rewriting on realistic documents

use std::sync::Arc;
use veil::anonymization::models::{EntityType, Span};
use veil::anonymization::resolver::{is_resolved, OverlapResolver, PriorityTable};
use veil::anonymization::trimmer::BoundaryTrimmer;
use veil::anonymization::{rewrite, AnonymizationEngine, Operator, OperatorConfig};

const DOCUMENT: &str = "Claim notes for Name: Jane Citizen, DOB: 14/03/1975.\n\
    Medicare: 2123 45670 1, mobile 0412 345 678, email jane.citizen@example.com.\n\
    BSB : 062-000 Account Number : 1617 8029\n\
    Assigned To : Bruno Aloi Subject\n";

fn operator_sets() -> Vec<OperatorConfig> {
    vec![
        OperatorConfig::new(),
        OperatorConfig::new().with_default_operator(Operator::Redact),
        OperatorConfig::new().with_default_operator(Operator::Mask),
        OperatorConfig::new().with_default_operator(Operator::Hash),
    ]
}

#[test]
fn test_output_length_matches_replacement_deltas() {
    let engine = AnonymizationEngine::with_defaults().unwrap();
    let spans = engine.analyze(DOCUMENT).unwrap();
    assert!(spans.len() >= 6);

    for operators in operator_sets() {
        let result = rewrite(DOCUMENT, &spans, &operators).unwrap();
        let expected = DOCUMENT.len() as isize + result.total_delta();
        assert_eq!(result.text.len() as isize, expected);

        for replacement in &result.replacements {
            assert_eq!(
                replacement.output_end - replacement.output_start,
                replacement.replacement_len
            );
        }
    }
}

#[test]
fn test_keep_everything_is_identity() {
    let engine = AnonymizationEngine::with_defaults().unwrap();
    let spans = engine.analyze(DOCUMENT).unwrap();
    let operators = OperatorConfig::new().with_default_operator(Operator::Keep);

    let result = rewrite(DOCUMENT, &spans, &operators).unwrap();
    assert_eq!(result.text, DOCUMENT);
    assert_eq!(result.replacements.len(), spans.len());
    assert!(result.replacements.iter().all(|r| r.delta() == 0));
}

#[test]
fn test_resolution_ignores_input_order() {
    let engine = AnonymizationEngine::with_defaults().unwrap();
    let candidates = engine.detect(DOCUMENT).unwrap();
    let resolver = OverlapResolver::new(Arc::new(engine.priorities().clone()));

    let forward = resolver.resolve(candidates.clone());
    let mut reversed_input = candidates.clone();
    reversed_input.reverse();
    let reversed = resolver.resolve(reversed_input);
    let mut rotated_input = candidates;
    rotated_input.rotate_left(3);
    let rotated = resolver.resolve(rotated_input);

    assert!(is_resolved(&forward));
    assert_eq!(forward, reversed);
    assert_eq!(forward, rotated);
}

#[test]
fn test_equal_priority_tie_break() {
    let mut table = PriorityTable::new();
    table.set(EntityType::AU_BSB, 85);
    table.set(EntityType::AU_ACCOUNT_NUMBER, 85);
    let resolver = OverlapResolver::new(Arc::new(table));

    let text = "062000 12345678";
    let bsb = Span::new(0, 6, EntityType::AU_BSB, &text[0..6], 0.8, "bsb");
    let account = Span::new(0, 15, EntityType::AU_ACCOUNT_NUMBER, text, 0.8, "account");

    let a = resolver.resolve(vec![bsb.clone(), account.clone()]);
    let b = resolver.resolve(vec![account, bsb]);
    assert_eq!(a, b);
    assert_eq!(a.len(), 1);
    // Equal priority and score: the longer span wins
    assert_eq!(a[0].entity_type, EntityType::AU_ACCOUNT_NUMBER);
}

#[test]
fn test_trim_is_idempotent() {
    let trimmer = BoundaryTrimmer::default();
    let text = "Assigned To : Bruno Aloi Subject Re";
    let start = text.find("Bruno").unwrap();
    let span = Span::new(
        start,
        text.len(),
        EntityType::NAME_CONSULTANT,
        &text[start..],
        0.9,
        "consultant_assigned",
    );

    let once = trimmer.trim(span).unwrap();
    assert_eq!(once.text, "Bruno Aloi");
    let twice = trimmer.trim(once.clone()).unwrap();
    assert_eq!(once, twice);
}
