//! Anonymize command implementation
//!
//! Files are processed concurrently on the blocking pool while one engine is
//! shared between workers. A shutdown signal stops new files from being
//! started; files already in flight are finished.

use super::{read_input, EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use crate::anonymization::{AnonymizationEngine, CustomOperators, OperatorConfig};
use crate::config::VeilConfig;
use anyhow::Context;
use clap::Args;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Exit code when some files failed or the batch was interrupted
pub const EXIT_PARTIAL: i32 = 1;

/// Suffix appended to the input stem for output files
const OUTPUT_SUFFIX: &str = "anon.txt";

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Input files (`-` reads stdin)
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Directory for `<name>.anon.txt` outputs
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of files processed at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct FileOutcome {
    /// Input path
    pub input: PathBuf,
    /// Where the output went, `None` for stdout
    pub output: Option<PathBuf>,
    /// Replacement count, or the failure
    pub result: anyhow::Result<usize>,
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub async fn execute(
        &self,
        config: &VeilConfig,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let (engine, operators) = match build_pipeline(config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if self.writes_stdout() {
            let input = self.inputs[0].to_string_lossy().into_owned();
            let text = read_input(&input)?;
            let anonymized = engine
                .anonymize(&text, &operators)
                .with_context(|| format!("Failed to anonymize {input}"))?;
            print!("{}", anonymized.text);
            return Ok(EXIT_OK);
        }

        let collisions = self.output_collisions();
        if !collisions.is_empty() {
            for (output, inputs) in &collisions {
                let inputs: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
                tracing::error!(
                    output = %output.display(),
                    inputs = %inputs.join(", "),
                    "Inputs share an output path"
                );
                eprintln!(
                    "Configuration error: {} would be written by more than one input: {}",
                    output.display(),
                    inputs.join(", ")
                );
            }
            return Ok(EXIT_CONFIG);
        }

        if let Some(dir) = &self.output_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }

        let outcomes = self.run_batch(engine, operators, shutdown).await;
        Ok(self.report(&outcomes))
    }

    fn writes_stdout(&self) -> bool {
        self.inputs.len() == 1 && self.output_dir.is_none()
    }

    /// Output paths claimed by more than one input, with those inputs
    ///
    /// Inputs with the same stem in different directories map to one file
    /// under `--output-dir`; a repeated input maps to its own output twice.
    pub fn output_collisions(&self) -> Vec<(PathBuf, Vec<PathBuf>)> {
        let mut claims: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for input in &self.inputs {
            claims
                .entry(output_path(input, self.output_dir.as_deref()))
                .or_default()
                .push(input.clone());
        }
        claims
            .into_iter()
            .filter(|(_, inputs)| inputs.len() > 1)
            .collect()
    }

    /// Process every input, at most `concurrency` at a time
    pub async fn run_batch(
        &self,
        engine: Arc<AnonymizationEngine>,
        operators: Arc<OperatorConfig>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<FileOutcome> {
        let total = self.inputs.len();
        let mut outcomes = Vec::with_capacity(total);

        let results = stream::iter(self.inputs.iter().cloned())
            .take_while(move |_| {
                let stop = *shutdown.borrow();
                if stop {
                    tracing::warn!("Shutdown requested, not starting remaining files");
                }
                async move { !stop }
            })
            .map(|input| {
                let engine = Arc::clone(&engine);
                let operators = Arc::clone(&operators);
                let output = output_path(&input, self.output_dir.as_deref());
                async move {
                    let task_input = input.clone();
                    let task_output = output.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        anonymize_file(&engine, &operators, &task_input, &task_output)
                    })
                    .await
                    .context("Anonymization task failed")
                    .and_then(|r| r);
                    FileOutcome {
                        input,
                        output: Some(output),
                        result,
                    }
                }
            })
            .buffer_unordered(self.concurrency.max(1));
        tokio::pin!(results);

        while let Some(outcome) = results.next().await {
            outcomes.push(outcome);
            crate::log_batch_progress!(outcomes.len(), total);
        }
        outcomes
    }

    fn report(&self, outcomes: &[FileOutcome]) -> i32 {
        let mut failed = 0usize;
        for outcome in outcomes {
            match &outcome.result {
                Ok(count) => {
                    let target = outcome
                        .output
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "stdout".to_string());
                    println!(
                        "{} -> {} ({} replacements)",
                        outcome.input.display(),
                        target,
                        count
                    );
                }
                Err(e) => {
                    failed += 1;
                    let context = format!("anonymizing {}", outcome.input.display());
                    crate::log_error_with_context!(e, context.as_str());
                    eprintln!("{}: {e:#}", outcome.input.display());
                }
            }
        }

        let skipped = self.inputs.len() - outcomes.len();
        println!();
        println!(
            "Processed {} of {} files ({} failed, {} not started)",
            outcomes.len() - failed,
            self.inputs.len(),
            failed,
            skipped
        );

        match (failed, skipped) {
            (0, 0) => EXIT_OK,
            (f, 0) if f == outcomes.len() => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }
}

fn build_pipeline(
    config: &VeilConfig,
) -> crate::domain::Result<(Arc<AnonymizationEngine>, Arc<OperatorConfig>)> {
    let engine = AnonymizationEngine::new(config)?;
    let operators = OperatorConfig::from_settings(&config.anonymization, &CustomOperators::new())?;
    Ok((Arc::new(engine), Arc::new(operators)))
}

/// `<dir>/<stem>.anon.txt`, next to the input when no directory is given
fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string());
    let file_name = format!("{stem}.{OUTPUT_SUFFIX}");
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input
            .parent()
            .map(|p| p.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

fn anonymize_file(
    engine: &AnonymizationEngine,
    operators: &OperatorConfig,
    input: &Path,
    output: &Path,
) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let anonymized = engine
        .anonymize(&text, operators)
        .with_context(|| format!("Failed to anonymize {}", input.display()))?;
    std::fs::write(output, &anonymized.text)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(anonymized.replacements.len())
}
