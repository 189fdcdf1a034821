//! Span rewriting
//!
//! Applies the operator for every resolved span in a single left-to-right
//! pass: copy the gap before the span, append the replacement, advance the
//! cursor, and finally copy the tail. Output offsets are recorded per
//! replacement so the audit trail can locate every substitution.

use crate::anonymization::anonymizer::{OperatorConfig, OperatorOutcome};
use crate::anonymization::models::{AnonymizedText, Replacement, RewriteWarning, Span};
use crate::domain::{Result, VeilError};

/// Rewrite `source` by substituting each resolved span
///
/// # Errors
///
/// Returns [`VeilError::Rewrite`] when the spans are unsorted, overlapping,
/// out of bounds, off a `char` boundary or no longer match the source text.
/// Operator configuration and encryption errors are propagated. No partial
/// output is produced in either case.
pub fn rewrite(source: &str, spans: &[Span], operators: &OperatorConfig) -> Result<AnonymizedText> {
    operators.validate()?;
    verify_spans(source, spans)?;

    let include_original = operators.params().include_original;
    let mut text = String::with_capacity(source.len());
    let mut replacements = Vec::with_capacity(spans.len());
    let mut warnings = Vec::new();
    let mut cursor = 0;

    for span in spans {
        text.push_str(&source[cursor..span.start]);

        let operator = operators.operator_for(&span.entity_type);
        match operators.apply(operator, span)? {
            OperatorOutcome::Replaced(replacement) => {
                let output_start = text.len();
                text.push_str(&replacement);
                replacements.push(Replacement {
                    entity_type: span.entity_type.clone(),
                    operator: operator.name(),
                    start: span.start,
                    end: span.end,
                    output_start,
                    output_end: text.len(),
                    original_len: span.len(),
                    replacement_len: replacement.len(),
                    original: include_original.then(|| span.text.clone()),
                });
            }
            OperatorOutcome::Skipped(message) => {
                tracing::warn!(
                    entity_type = %span.entity_type,
                    operator = %operator.name(),
                    start = span.start,
                    end = span.end,
                    "Operator could not apply; span left unchanged"
                );
                text.push_str(&span.text);
                warnings.push(RewriteWarning {
                    entity_type: span.entity_type.clone(),
                    start: span.start,
                    end: span.end,
                    message,
                });
            }
        }

        cursor = span.end;
    }
    text.push_str(&source[cursor..]);

    tracing::debug!(
        replacements = replacements.len(),
        warnings = warnings.len(),
        input_len = source.len(),
        output_len = text.len(),
        "Rewrite complete"
    );

    Ok(AnonymizedText {
        text,
        replacements,
        warnings,
    })
}

/// Check the offset invariants the rewrite relies on
fn verify_spans(source: &str, spans: &[Span]) -> Result<()> {
    let mut previous_end = 0;

    for (index, span) in spans.iter().enumerate() {
        if span.start >= span.end {
            return Err(VeilError::Rewrite(format!(
                "Span {index} ({}) is empty: [{}, {})",
                span.entity_type, span.start, span.end
            )));
        }
        if span.end > source.len() {
            return Err(VeilError::Rewrite(format!(
                "Span {index} ({}) ends at {} past text length {}",
                span.entity_type,
                span.end,
                source.len()
            )));
        }
        if index > 0 && span.start < previous_end {
            return Err(VeilError::Rewrite(format!(
                "Span {index} ({}) starts at {} before previous end {}",
                span.entity_type, span.start, previous_end
            )));
        }
        if !source.is_char_boundary(span.start) || !source.is_char_boundary(span.end) {
            return Err(VeilError::Rewrite(format!(
                "Span {index} ({}) is not on a character boundary: [{}, {})",
                span.entity_type, span.start, span.end
            )));
        }
        if !span.matches_source(source) {
            return Err(VeilError::Rewrite(format!(
                "Span {index} ({}) text does not match the source at [{}, {})",
                span.entity_type, span.start, span.end
            )));
        }
        previous_end = span.end;
    }
    Ok(())
}
