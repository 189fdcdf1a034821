//! Analyze command implementation

use super::{read_input, EXIT_CONFIG, EXIT_OK};
use crate::anonymization::models::Span;
use crate::anonymization::{AnonymizationEngine, DetectionExplanation};
use crate::config::VeilConfig;
use anyhow::Context;
use clap::Args;
use serde::Serialize;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input file, or `-` for stdin
    pub input: String,

    /// Include an explanation for every span
    #[arg(long)]
    pub explain: bool,
}

#[derive(Debug, Serialize)]
struct ExplainedSpan {
    span: Span,
    explanation: DetectionExplanation,
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, config: &VeilConfig) -> anyhow::Result<i32> {
        let engine = match AnonymizationEngine::new(config) {
            Ok(engine) => engine,
            Err(e) if e.is_configuration() => {
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
            Err(e) => return Err(e.into()),
        };

        let text = read_input(&self.input)?;
        let output = self.render(&engine, &text)?;
        println!("{output}");
        Ok(EXIT_OK)
    }

    /// Analyze `text` and render the JSON report
    pub fn render(&self, engine: &AnonymizationEngine, text: &str) -> anyhow::Result<String> {
        let analysis = engine.analyze_detailed(text)?;
        tracing::info!(
            input = %self.input,
            entities = analysis.spans.len(),
            "Analysis finished"
        );

        if !self.explain {
            return serde_json::to_string_pretty(&analysis.spans)
                .context("Failed to serialize spans");
        }

        let explained = analysis
            .spans
            .into_iter()
            .map(|span| {
                let explanation = engine.explain(&analysis.analyzed_text, &span)?;
                Ok(ExplainedSpan { span, explanation })
            })
            .collect::<crate::domain::Result<Vec<_>>>()?;
        serde_json::to_string_pretty(&explained).context("Failed to serialize explanations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_spans_and_explanations() {
        let engine = AnonymizationEngine::with_defaults().unwrap();
        let text = "Contact jane.citizen@example.com";

        let plain = AnalyzeArgs {
            input: "-".to_string(),
            explain: false,
        };
        let spans: serde_json::Value =
            serde_json::from_str(&plain.render(&engine, text).unwrap()).unwrap();
        assert_eq!(spans[0]["entity_type"], "EMAIL_ADDRESS");

        let explained = AnalyzeArgs {
            input: "-".to_string(),
            explain: true,
        };
        let report: serde_json::Value =
            serde_json::from_str(&explained.render(&engine, text).unwrap()).unwrap();
        assert_eq!(report[0]["explanation"]["source"], "email_address");
        assert_eq!(report[0]["explanation"]["context_before"], "Contact ");
    }
}
