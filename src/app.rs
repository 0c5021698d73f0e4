//! Application entry point for the `run` command.
//!
//! Composition root: resolves settings, wires the speech backend, the
//! verifier and the offload strategy, then drives the pipeline.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::controller::{
    LogProgress, Pipeline, PipelineSettings, ProgressReporter, RunSummary,
};
use crate::pipeline::synthesizer::SynthesisOutcome;
use crate::store::b2::{B2Credentials, B2Store};
use crate::store::offload::{NoOffload, Offloader, RemoteOffload};
use crate::stt::verifier::Verifier;
use crate::stt::whisper::{WhisperConfig, WhisperVerifier};
use crate::text::Fragment;
use crate::tts::backend::SpeechBackend;
use crate::tts::openai_fm::OpenAiFmBackend;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the CI step output file.
pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Run the pipeline for one document.
///
/// # Arguments
/// * `config` - Base configuration (overridden by `args`)
/// * `args` - Command-line overrides
/// * `quiet` - No progress bar
pub async fn run_command(mut config: Config, args: &RunArgs, quiet: bool) -> Result<RunSummary> {
    args.apply(&mut config)?;
    let settings = PipelineSettings::from_config(&config)?;

    if let Ok(path) = std::env::var(GITHUB_OUTPUT_ENV)
        && !path.is_empty()
    {
        write_github_output(Path::new(&path), &settings.book_name, &settings.ledger_path)?;
    }

    let timeout = Duration::from_secs(config.synthesis.request_timeout_secs);
    let backend: Arc<dyn SpeechBackend> =
        Arc::new(OpenAiFmBackend::new(&config.synthesis.endpoint, timeout)?);

    let verifier: Arc<dyn Verifier> = Arc::new(WhisperVerifier::new(WhisperConfig {
        model_path: config.verify.model.clone(),
        languages: config.verify.languages.clone(),
        threads: config.verify.threads,
    })?);

    let offloader = create_offloader(&settings, args.no_offload, timeout)?;

    tracing::info!(
        version = %crate::version_string(),
        source = %settings.source.display(),
        verifier = verifier.model_name(),
        backend = backend.name(),
        offload = offloader.enabled(),
        "Starting run"
    );

    let pipeline = Pipeline::new(settings, backend, verifier, offloader);
    if quiet {
        pipeline.run(&LogProgress).await
    } else {
        pipeline.run(&BarProgress::new()).await
    }
}

/// Remote offload when credentials are present and not disabled.
fn create_offloader(
    settings: &PipelineSettings,
    no_offload: bool,
    timeout: Duration,
) -> Result<Arc<dyn Offloader>> {
    if no_offload {
        tracing::info!("Offload disabled by --no-offload");
        return Ok(Arc::new(NoOffload));
    }
    let Some(credentials) = B2Credentials::from_env() else {
        tracing::info!("Object store credentials not set, keeping artifacts on local disk");
        return Ok(Arc::new(NoOffload));
    };
    let store = B2Store::new(credentials, timeout)?;
    Ok(Arc::new(RemoteOffload::new(
        Arc::new(store),
        settings.output_area(),
        &settings.book_name,
    )))
}

/// Append `book_name=` and `ledger_file=` lines for the CI step.
pub fn write_github_output(path: &Path, book_name: &str, ledger_path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "book_name={book_name}")?;
    writeln!(file, "ledger_file={}", ledger_path.display())?;
    Ok(())
}

/// Terminal progress bar over fragments.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            // SAFETY: hardcoded template string, always valid
            #[allow(clippy::expect_used)]
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("hardcoded progress bar template")
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: usize, resume_index: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(resume_index.min(total) as u64);
    }

    fn fragment_done(&self, fragment: &Fragment, outcome: &SynthesisOutcome) {
        let label = match outcome {
            SynthesisOutcome::Accepted { voice, style, .. } => format!(
                "{} {}",
                voice.as_deref().unwrap_or("-"),
                style.as_deref().unwrap_or("-")
            ),
            SynthesisOutcome::Suspicious { .. } => "text (size)".to_string(),
            SynthesisOutcome::Exhausted { .. } => "text (exhausted)".to_string(),
            SynthesisOutcome::AlreadyPresent { .. } => "present".to_string(),
        };
        self.bar.set_message(format!("#{} {label}", fragment.index));
        self.bar.inc(1);
    }

    fn finish(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn github_output_lines_are_appended() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("github_output");
        std::fs::write(&path, "existing=1\n").unwrap();

        write_github_output(&path, "volk", &PathBuf::from("out/volk.ledger.jsonl")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "existing=1\nbook_name=volk\nledger_file=out/volk.ledger.jsonl\n"
        );
    }

    #[test]
    fn no_offload_flag_wins_over_credentials() {
        let mut config = Config::default();
        config.source.path = Some(PathBuf::from("book.txt"));
        let settings = PipelineSettings::from_config(&config).unwrap();
        let offloader = create_offloader(&settings, true, Duration::from_secs(1)).unwrap();
        assert!(!offloader.enabled());
    }

    #[test]
    fn bar_progress_tracks_position() {
        let progress = BarProgress::new();
        progress.start(10, 4);
        assert_eq!(progress.bar.position(), 4);
        assert_eq!(progress.bar.length(), Some(10));
    }
}
