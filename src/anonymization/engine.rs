//! Main anonymization engine
//!
//! This module provides the [`AnonymizationEngine`] that runs the full
//! detection pipeline and the rewrite.
//!
//! # Architecture
//!
//! ```text
//! text ─▶ acronym expansion (optional)
//!      ─▶ pattern matcher + external recognizers
//!      ─▶ score adjustment, active types, threshold
//!      ─▶ boundary trimmer ─▶ false-positive filter ─▶ overlap resolver
//!      ─▶ rewriter ─▶ audit log (optional)
//! ```
//!
//! Every table is built once in [`EngineBuilder::build`] and never mutated,
//! so one engine can be shared across threads behind an `Arc`.
//!
//! # Examples
//!
//! ```no_run
//! use veil::anonymization::{AnonymizationEngine, OperatorConfig};
//!
//! # fn example() -> veil::domain::Result<()> {
//! let engine = AnonymizationEngine::with_defaults()?;
//! let result = engine.anonymize("Medicare: 2123 45670 1", &OperatorConfig::new())?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

use crate::anonymization::{
    anonymizer::OperatorConfig,
    audit::AuditLogger,
    catalog::Catalog,
    detector::{
        context::{ContextEvidence, ContextScorer, ContextWindow},
        patterns::PatternRegistry,
        regex::PatternMatcher,
        spans_from_recognizer, EntityRecognizer,
    },
    filter::FalsePositiveFilter,
    models::{
        Analysis, AnonymizedText, DetectionMethod, EntityStatistics, EntityType, ProcessResult,
        Span,
    },
    preprocess::AcronymExpander,
    resolver::{OverlapResolver, PriorityTable},
    rewriter,
    trimmer::BoundaryTrimmer,
    validators::ValidatorRegistry,
};
use crate::config::{AnalysisConfig, AuditConfig, VeilConfig};
use crate::domain::{Result, VeilError};
use crate::{log_analysis_complete, log_anonymization_complete};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Characters of context shown on each side in explanations
pub const EXPLANATION_CONTEXT: usize = 50;

/// Why a span was detected
#[derive(Debug, Clone, Serialize)]
pub struct DetectionExplanation {
    pub entity_type: EntityType,
    /// Rule name or recognizer id
    pub source: String,
    pub method: DetectionMethod,
    pub score: f32,
    pub priority: i32,
    pub start: usize,
    pub end: usize,
    /// Up to 50 characters before the span
    pub context_before: String,
    /// Up to 50 characters after the span
    pub context_after: String,
    /// Rule-level keywords found in the scoring window
    pub rule_keywords: Vec<String>,
    /// Entity-level context evidence found in the scoring window
    pub evidence: ContextEvidence,
}

/// Analysis settings applied between matching and filtering
#[derive(Debug, Clone)]
struct AnalysisSettings {
    min_score_threshold: f32,
    active_entity_types: HashSet<EntityType>,
    score_adjustment: HashMap<EntityType, f32>,
}

impl From<&AnalysisConfig> for AnalysisSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_score_threshold: config.min_score_threshold,
            active_entity_types: config.active_entity_types.iter().map(EntityType::new).collect(),
            score_adjustment: config
                .score_adjustment
                .iter()
                .map(|(name, delta)| (EntityType::new(name), *delta))
                .collect(),
        }
    }
}

/// Builder for [`AnonymizationEngine`]
pub struct EngineBuilder {
    catalog: Option<Catalog>,
    analysis: AnalysisConfig,
    validators: ValidatorRegistry,
    recognizers: Vec<Arc<dyn EntityRecognizer>>,
    audit_logger: Option<AuditLogger>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            catalog: None,
            analysis: AnalysisConfig::default(),
            validators: ValidatorRegistry::with_defaults(),
            recognizers: Vec::new(),
            audit_logger: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this catalog instead of the one named in the analysis settings
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Replace the validator registry
    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    /// Register an external recognizer
    pub fn with_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    pub fn with_audit_logger(mut self, logger: AuditLogger) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    /// Create the audit logger described by an `[audit]` section
    pub fn with_audit_config(self, audit: &AuditConfig) -> Result<Self> {
        if !audit.enabled {
            return Ok(self);
        }
        let mut logger = AuditLogger::new(audit.log_path.clone(), audit.json_format, true)?;
        if let Some(key) = &audit.hash_key {
            logger = logger.with_hash_key(key);
        }
        Ok(self.with_audit_logger(logger))
    }

    /// Compile every table and build the engine
    ///
    /// # Errors
    ///
    /// Invalid rule expressions, context patterns, acronym tables or an
    /// unreadable catalog are configuration errors.
    pub fn build(self) -> Result<AnonymizationEngine> {
        let analysis = self.analysis;

        let catalog = match (self.catalog, &analysis.catalog) {
            (Some(catalog), _) => catalog,
            (None, Some(path)) => Catalog::from_file(path)?,
            (None, None) => Catalog::default_catalog()?,
        };

        let registry = Arc::new(PatternRegistry::from_definitions(&catalog.rules)?);
        let scorer = Arc::new(ContextScorer::from_definitions(
            &catalog.context,
            analysis.context_bonus,
        )?);

        let matcher = PatternMatcher::new(registry, Arc::clone(&scorer))
            .with_context_window(analysis.context_window)
            .with_missing_context_penalty(analysis.missing_context_penalty);

        let filter = FalsePositiveFilter::new(Arc::new(self.validators), Arc::clone(&scorer))
            .with_blacklists(&catalog.blacklists)
            .with_context_window(analysis.context_window);

        let mut trimmer = catalog
            .trimming
            .as_ref()
            .map(BoundaryTrimmer::from_definition)
            .unwrap_or_default();
        if !analysis.trim_entity_types.is_empty() {
            trimmer = trimmer.with_entity_types(analysis.trim_entity_types.iter().map(EntityType::new));
        }

        let priorities = PriorityTable::from_definitions(&catalog.priorities)
            .with_overrides(&analysis.priorities);
        let resolver = OverlapResolver::new(Arc::new(priorities));

        let expander = if analysis.expand_acronyms {
            Some(AcronymExpander::new(
                &analysis.acronyms,
                analysis.acronyms_case_sensitive,
            )?)
        } else {
            None
        };

        tracing::info!(
            rules = matcher.registry().len(),
            recognizers = self.recognizers.len(),
            context_window = analysis.context_window,
            min_score_threshold = analysis.min_score_threshold,
            acronym_expansion = expander.is_some(),
            audit_enabled = self.audit_logger.as_ref().is_some_and(AuditLogger::is_enabled),
            "Anonymization engine initialized"
        );

        Ok(AnonymizationEngine {
            settings: AnalysisSettings::from(&analysis),
            matcher,
            recognizers: self.recognizers,
            scorer,
            filter,
            trimmer,
            resolver,
            expander,
            audit_logger: self.audit_logger,
        })
    }
}

/// Detection and anonymization engine
///
/// Holds only immutable tables; calls are pure functions of their input
/// (plus the optional audit log append).
pub struct AnonymizationEngine {
    settings: AnalysisSettings,
    matcher: PatternMatcher,
    recognizers: Vec<Arc<dyn EntityRecognizer>>,
    scorer: Arc<ContextScorer>,
    filter: FalsePositiveFilter,
    trimmer: BoundaryTrimmer,
    resolver: OverlapResolver,
    expander: Option<AcronymExpander>,
    audit_logger: Option<AuditLogger>,
}

impl AnonymizationEngine {
    /// Build an engine from the full configuration
    pub fn new(config: &VeilConfig) -> Result<Self> {
        let mut audit = config.audit.clone();
        if audit.hash_key.is_none() {
            audit.hash_key = config.anonymization.hash_salt.clone();
        }
        EngineBuilder::new()
            .with_analysis(config.analysis.clone())
            .with_audit_config(&audit)?
            .build()
    }

    /// Engine with the embedded catalog and default settings
    pub fn with_defaults() -> Result<Self> {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Resolved spans for `text`
    ///
    /// With acronym expansion enabled the offsets refer to the expanded
    /// text; use [`analyze_detailed`](Self::analyze_detailed) to get it.
    pub fn analyze(&self, text: &str) -> Result<Vec<Span>> {
        Ok(self.analyze_detailed(text)?.spans)
    }

    /// Resolved spans together with the analyzed text and expansions
    pub fn analyze_detailed(&self, text: &str) -> Result<Analysis> {
        let (analyzed_text, expansions) = match &self.expander {
            Some(expander) => expander.expand(text),
            None => (text.to_string(), Vec::new()),
        };

        let started = Instant::now();
        let candidates = self.detect(&analyzed_text)?;
        let candidate_count = candidates.len();
        let spans = self.resolve(candidates);
        log_analysis_complete!(candidate_count, spans.len(), started.elapsed());

        Ok(Analysis {
            analyzed_text,
            spans,
            expansions,
        })
    }

    /// Filtered and trimmed candidates, before overlap resolution
    ///
    /// Callers that want to resolve a subset (for example one entity type)
    /// can pass the selection to [`resolve`](Self::resolve).
    pub fn detect(&self, text: &str) -> Result<Vec<Span>> {
        let mut candidates = self.matcher.find_candidates(text);

        for recognizer in &self.recognizers {
            match recognizer.recognize(text) {
                Ok(entities) => {
                    candidates.extend(spans_from_recognizer(recognizer.name(), text, entities));
                }
                Err(e) => {
                    tracing::warn!(
                        recognizer = recognizer.name(),
                        error = %e,
                        "Recognizer failed, ignoring its output"
                    );
                }
            }
        }

        let raw = candidates.len();
        let candidates = self.apply_settings(candidates);
        // Trailing labels are cut before the blacklist sees the span
        let candidates = self.trimmer.trim_all(candidates);
        let candidates = self.filter.filter(candidates, text);

        tracing::trace!(raw, kept = candidates.len(), "Candidate detection complete");
        Ok(candidates)
    }

    /// Resolve candidates into a non-overlapping set sorted by start
    pub fn resolve(&self, candidates: Vec<Span>) -> Vec<Span> {
        self.resolver.resolve(candidates)
    }

    fn apply_settings(&self, candidates: Vec<Span>) -> Vec<Span> {
        let settings = &self.settings;
        candidates
            .into_iter()
            .filter_map(|mut span| {
                if let Some(delta) = settings.score_adjustment.get(&span.entity_type) {
                    span.adjust_score(*delta);
                }
                let active = settings.active_entity_types.is_empty()
                    || settings.active_entity_types.contains(&span.entity_type);
                (active && span.score >= settings.min_score_threshold).then_some(span)
            })
            .collect()
    }

    /// Analyze and rewrite `text`
    ///
    /// # Errors
    ///
    /// Operator configuration, encryption, rewrite and audit failures are
    /// returned; no partial output is produced.
    pub fn anonymize(&self, text: &str, operators: &OperatorConfig) -> Result<AnonymizedText> {
        let analysis = self.analyze_detailed(text)?;
        self.anonymize_spans(&analysis.analyzed_text, &analysis.spans, operators)
    }

    /// Rewrite `text` with an already resolved span set
    pub fn anonymize_spans(
        &self,
        text: &str,
        spans: &[Span],
        operators: &OperatorConfig,
    ) -> Result<AnonymizedText> {
        let started = Instant::now();
        let anonymized = rewriter::rewrite(text, spans, operators)?;
        let elapsed = started.elapsed();
        log_anonymization_complete!(
            anonymized.replacements.len(),
            anonymized.warnings.len(),
            elapsed
        );

        if let Some(logger) = &self.audit_logger {
            let document_id = Uuid::new_v4().to_string();
            logger.log_anonymization(&document_id, &anonymized, text, elapsed.as_millis() as u64)?;
        }
        Ok(anonymized)
    }

    /// Analysis, anonymization and statistics in one call
    pub fn process(&self, text: &str, operators: &OperatorConfig) -> Result<ProcessResult> {
        let analysis = self.analyze_detailed(text)?;
        let anonymized = self.anonymize_spans(&analysis.analyzed_text, &analysis.spans, operators)?;
        let statistics = EntityStatistics::from_spans(&analysis.spans);

        Ok(ProcessResult {
            analysis,
            anonymized,
            statistics,
        })
    }

    /// Explain a detected span
    ///
    /// `text` must be the text the span was detected in.
    ///
    /// # Errors
    ///
    /// A span whose offsets do not match `text` is a validation error.
    pub fn explain(&self, text: &str, span: &Span) -> Result<DetectionExplanation> {
        if !span.matches_source(text) {
            return Err(VeilError::Validation(format!(
                "Span [{}, {}) does not match the given text",
                span.start, span.end
            )));
        }

        let display = ContextWindow::for_span(text, span, EXPLANATION_CONTEXT);
        let scoring = ContextWindow::for_span(text, span, self.matcher.context_window());

        let rule_keywords = self
            .matcher
            .registry()
            .rule(&span.source)
            .map(|rule| {
                let before = scoring.before.to_lowercase();
                let after = scoring.after.to_lowercase();
                rule.context
                    .iter()
                    .filter(|k| before.contains(k.as_str()) || after.contains(k.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(DetectionExplanation {
            entity_type: span.entity_type.clone(),
            source: span.source.clone(),
            method: span.method,
            score: span.score,
            priority: self.resolver.priorities().priority(&span.entity_type),
            start: span.start,
            end: span.end,
            context_before: display.before.to_string(),
            context_after: display.after.to_string(),
            rule_keywords,
            evidence: self.scorer.evidence(&scoring, &span.entity_type),
        })
    }

    /// Number of compiled rules
    pub fn rule_count(&self) -> usize {
        self.matcher.registry().len()
    }

    pub fn priorities(&self) -> &PriorityTable {
        self.resolver.priorities()
    }
}
