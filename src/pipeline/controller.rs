//! Pipeline controller: startup, resume, per-fragment processing, final flush.

use crate::audio::silence::SilenceSettings;
use crate::config::{Config, ResumeStrategyKind, SourceFormat};
use crate::defaults;
use crate::error::Result;
use crate::pipeline::artifacts::{DiskScan, OutputArea, UploadMarker};
use crate::pipeline::batch::{BatchAccumulator, BatchPackager};
use crate::pipeline::ledger::Ledger;
use crate::pipeline::recovery::recover_orphans;
use crate::pipeline::resume::{LogAndDisk, LogWatermark, ResumeContext, ResumeStrategy, strategy_for};
use crate::pipeline::synthesizer::{SynthesisOutcome, SynthesisSettings, Synthesizer};
use crate::store::offload::{OffloadReport, Offloader};
use crate::stt::verifier::Verifier;
use crate::text::{Fragment, load_document, segment};
use crate::tts::backend::SpeechBackend;
use crate::tts::voices::{StyleDef, SweepSpace};
use std::path::PathBuf;
use std::sync::Arc;

/// Immutable run parameters, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Source document
    pub source: PathBuf,
    pub format: SourceFormat,
    pub max_fragment_chars: usize,
    /// Used for the ledger and archive names
    pub book_name: String,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub ledger_path: PathBuf,
    /// Voice × style sweep, starting pair included
    pub sweep: SweepSpace,
    pub styles: Vec<StyleDef>,
    pub synthesis: SynthesisSettings,
    pub audio_size_limit_mb: u64,
    /// Without offload, end the run once the resident batch is full
    pub stop_when_full: bool,
    pub resume_strategy: ResumeStrategyKind,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let source = config.source_path()?.to_path_buf();

        let sweep = SweepSpace::new(
            &config.synthesis.voices,
            &config.synthesis.styles,
            &config.synthesis.voice,
            &config.synthesis.style,
        );

        let audio = &config.audio;
        let synthesis = SynthesisSettings {
            sample_rate: audio.sample_rate.hz(),
            min_size_kb: audio.min_size_kb,
            max_size_kb: audio.max_size_kb,
            silence: SilenceSettings {
                min_silence_ms: audio.min_silence_ms,
                offset_db: audio.silence_offset_db,
                pause_ms: audio.pause_ms,
                keep_silence_ms: audio.keep_silence_ms,
                window_ms: defaults::ANALYSIS_WINDOW_MS,
            },
        };

        Ok(Self {
            source,
            format: config.source.format,
            max_fragment_chars: config.source.max_fragment_chars,
            book_name: config.book_name(),
            output_dir: config.output.dir.clone(),
            temp_dir: config.temp_dir(),
            ledger_path: config.ledger_path(),
            sweep,
            styles: config.synthesis.styles.clone(),
            synthesis,
            audio_size_limit_mb: config.batch.audio_size_limit_mb,
            stop_when_full: config.batch.stop_when_full,
            resume_strategy: config.resume.strategy,
        })
    }

    pub fn output_area(&self) -> OutputArea {
        OutputArea::new(&self.output_dir, &self.temp_dir)
    }

    /// Load and fragment the source document.
    pub fn fragments(&self) -> Result<Vec<Fragment>> {
        let text = load_document(&self.source, self.format)?;
        segment(&text, self.max_fragment_chars)
    }
}

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// At or below the resume watermark
    pub skipped: usize,
    pub accepted: usize,
    pub suspicious: usize,
    pub exhausted: usize,
    pub already_present: usize,
    /// Filesystem error that ended the run; at most one
    pub failed: usize,
    /// Settled at startup from orphaned temp takes
    pub recovered: usize,
    pub archives_uploaded: usize,
    pub archives_failed: usize,
    /// Ended once the resident batch was full
    pub stopped_early: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &SynthesisOutcome) {
        match outcome {
            SynthesisOutcome::Accepted { .. } => self.accepted += 1,
            SynthesisOutcome::Suspicious { .. } => self.suspicious += 1,
            SynthesisOutcome::Exhausted { .. } => self.exhausted += 1,
            SynthesisOutcome::AlreadyPresent { .. } => self.already_present += 1,
        }
    }

    fn record_flush(&mut self, report: Option<OffloadReport>) {
        match report {
            Some(OffloadReport::Uploaded { .. }) => self.archives_uploaded += 1,
            Some(OffloadReport::Failed { .. }) => self.archives_failed += 1,
            Some(OffloadReport::Kept) | None => {}
        }
    }
}

/// Observer for run progress.
pub trait ProgressReporter: Send + Sync {
    /// Called once fragments are known and the watermark is computed.
    fn start(&self, total: usize, resume_index: usize);

    /// Called after each fragment above the watermark is settled.
    fn fragment_done(&self, fragment: &Fragment, outcome: &SynthesisOutcome);

    fn finish(&self, summary: &RunSummary);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn start(&self, total: usize, resume_index: usize) {
        tracing::info!(total, resume_index, "Starting synthesis");
    }

    fn fragment_done(&self, fragment: &Fragment, outcome: &SynthesisOutcome) {
        tracing::debug!(
            index = fragment.index,
            path = %outcome.artifact().path.display(),
            "Fragment settled"
        );
    }

    fn finish(&self, summary: &RunSummary) {
        tracing::info!(?summary, "Run finished");
    }
}

/// The resumable synthesis pipeline.
pub struct Pipeline {
    settings: PipelineSettings,
    backend: Arc<dyn SpeechBackend>,
    verifier: Arc<dyn Verifier>,
    offloader: Arc<dyn Offloader>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        backend: Arc<dyn SpeechBackend>,
        verifier: Arc<dyn Verifier>,
        offloader: Arc<dyn Offloader>,
    ) -> Self {
        Self {
            settings,
            backend,
            verifier,
            offloader,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run to completion.
    ///
    /// Errors only for startup-fatal conditions: missing source document or
    /// unusable output, temp or ledger paths.
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunSummary> {
        // INIT
        let fragments = self.settings.fragments()?;
        let area = self.settings.output_area();
        area.ensure()?;
        let mut ledger = Ledger::open(&self.settings.ledger_path)?;
        let mut summary = RunSummary {
            total: fragments.len(),
            ..RunSummary::default()
        };
        tracing::info!(
            book = %self.settings.book_name,
            fragments = fragments.len(),
            output = %area.dir().display(),
            "Document loaded"
        );

        let mut synth = Synthesizer::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.verifier),
            area.clone(),
            self.settings.sweep.clone(),
            self.settings.styles.clone(),
            self.settings.synthesis,
        );

        // RESUME
        let recovery = recover_orphans(&synth, &area, &fragments)?;
        for outcome in &recovery.recovered {
            summary.recovered += 1;
            append_record(&mut ledger, outcome);
        }

        let strategy = strategy_for(self.settings.resume_strategy);
        let ledger_paths = [self.settings.ledger_path.clone()];
        let resume_index = strategy.resume_index(&ResumeContext {
            ledger_paths: &ledger_paths,
            area: &area,
        })?;
        tracing::info!(strategy = strategy.name(), resume_index, "Resume point");

        let mut acc = BatchAccumulator::new(self.settings.audio_size_limit_mb);
        let seeded = acc.seed_from_disk(&area)?;
        if seeded > 0 {
            tracing::info!(seeded, bytes = acc.total_bytes(), "Seeded batch from disk");
        }
        let mut packager = BatchPackager::new(acc, Arc::clone(&self.offloader));
        let stop_when_full = self.settings.stop_when_full && !packager.offload_enabled();

        progress.start(fragments.len(), resume_index);

        // PROCESS_FRAGMENT
        for fragment in &fragments {
            if fragment.index <= resume_index {
                summary.skipped += 1;
                continue;
            }
            if stop_when_full && packager.is_full() {
                tracing::info!(
                    index = fragment.index,
                    bytes = packager.resident().total_bytes(),
                    "Resident batch is full, stopping"
                );
                summary.stopped_early = true;
                break;
            }

            let outcome = match synth.synthesize(fragment).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Later fragments would move the watermark past this one.
                    tracing::error!(index = fragment.index, error = %e, "Fragment failed, stopping");
                    summary.failed += 1;
                    break;
                }
            };

            append_record(&mut ledger, &outcome);
            summary.record(&outcome);
            packager.on_artifact_accepted(outcome.artifact().clone());
            progress.fragment_done(fragment, &outcome);

            let report = packager.maybe_flush().await;
            summary.record_flush(report);
        }

        // FINAL_FLUSH
        let report = packager.flush().await;
        summary.record_flush(report);

        // DONE
        if let Err(e) = area.remove_temp_dir() {
            tracing::warn!(path = %area.temp_dir().display(), error = %e, "Failed to remove temp directory");
        }
        progress.finish(&summary);
        Ok(summary)
    }
}

fn append_record(ledger: &mut Ledger, outcome: &SynthesisOutcome) {
    let Some(record) = outcome.ledger_record() else {
        return;
    };
    if let Err(e) = ledger.append(&record) {
        tracing::error!(index = record.index, error = %e, "Failed to append ledger record");
    }
}

/// Resume state of an output directory, without running anything.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub fragments: usize,
    /// Watermark by strategy name
    pub watermarks: Vec<(&'static str, usize)>,
    pub disk: DiskScan,
    pub marker: Option<UploadMarker>,
}

pub fn status(settings: &PipelineSettings) -> Result<StatusReport> {
    let fragments = settings.fragments()?.len();
    let area = settings.output_area();
    let ledger_paths = [settings.ledger_path.clone()];
    let ctx = ResumeContext {
        ledger_paths: &ledger_paths,
        area: &area,
    };

    let strategies: [&dyn ResumeStrategy; 2] = [&LogWatermark, &LogAndDisk];
    let mut watermarks = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        watermarks.push((strategy.name(), strategy.resume_index(&ctx)?));
    }

    Ok(StatusReport {
        fragments,
        watermarks,
        disk: area.scan()?,
        marker: area.read_marker(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleRate;
    use crate::pipeline::artifacts::ArtifactKind;
    use crate::pipeline::ledger::{Outcome, read_records};
    use crate::store::offload::NoOffload;
    use crate::stt::verifier::MockVerifier;
    use crate::tts::backend::MockBackend;
    use tempfile::TempDir;

    fn config(dir: &TempDir, text: &str) -> Config {
        let source = dir.path().join("book.txt");
        std::fs::write(&source, text).unwrap();
        let mut config = Config::default();
        config.source.path = Some(source);
        config.source.max_fragment_chars = 20;
        config.output.dir = dir.path().join("out");
        config.audio.sample_rate = SampleRate::Hz8000;
        config.audio.min_size_kb = 1;
        config
    }

    fn pipeline(settings: PipelineSettings, verifier: MockVerifier) -> Pipeline {
        Pipeline::new(
            settings,
            Arc::new(MockBackend::with_tone(1000, 8000).unwrap()),
            Arc::new(verifier),
            Arc::new(NoOffload),
        )
    }

    #[test]
    fn settings_resolve_paths_from_config() {
        let dir = TempDir::new().unwrap();
        let settings = PipelineSettings::from_config(&config(&dir, "One.")).unwrap();
        assert_eq!(settings.book_name, "book");
        assert!(settings.ledger_path.ends_with("out/book.ledger.jsonl"));
        assert!(settings.temp_dir.ends_with("out/TEMP_audio"));
        assert_eq!(settings.synthesis.sample_rate, 8000);
    }

    #[test]
    fn settings_require_a_source() {
        assert!(PipelineSettings::from_config(&Config::default()).is_err());
    }

    #[tokio::test]
    async fn missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, "One.");
        config.source.path = Some(dir.path().join("missing.txt"));
        let settings = PipelineSettings::from_config(&config).unwrap();
        assert!(pipeline(settings, MockVerifier::accepting())
            .run(&LogProgress)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn run_settles_every_fragment_and_cleans_temp() {
        let dir = TempDir::new().unwrap();
        let settings =
            PipelineSettings::from_config(&config(&dir, "First one. Second one. Third one.")).unwrap();
        let temp_dir = settings.temp_dir.clone();
        let ledger_path = settings.ledger_path.clone();

        let summary = pipeline(settings, MockVerifier::accepting())
            .run(&LogProgress)
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.accepted, 3);
        assert!(!temp_dir.exists());
        let records = read_records(&ledger_path).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.outcome == Outcome::Accepted));
    }

    #[tokio::test]
    async fn rejected_takes_fall_back_to_text() {
        let dir = TempDir::new().unwrap();
        let settings = PipelineSettings::from_config(&config(&dir, "Only one.")).unwrap();
        let area = settings.output_area();

        let summary = pipeline(settings, MockVerifier::rejecting())
            .run(&LogProgress)
            .await
            .unwrap();

        assert_eq!(summary.exhausted, 1);
        assert_eq!(
            std::fs::read_to_string(area.artifact_path(1, ArtifactKind::Text)).unwrap(),
            "Only one."
        );
    }

    #[tokio::test]
    async fn stop_when_full_ends_early_without_offload() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir, "First one. Second one. Third one.");
        config.batch.stop_when_full = true;
        config.batch.audio_size_limit_mb = 1;
        let settings = PipelineSettings::from_config(&config).unwrap();
        let area = settings.output_area();
        area.ensure().unwrap();
        area.write_audio(1, &vec![0u8; 1024 * 1024]).unwrap();

        let summary = pipeline(settings, MockVerifier::accepting())
            .run(&LogProgress)
            .await
            .unwrap();

        assert!(summary.stopped_early);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.accepted, 0);
    }

    #[tokio::test]
    async fn status_reports_both_watermarks() {
        let dir = TempDir::new().unwrap();
        let settings = PipelineSettings::from_config(&config(&dir, "First one. Second one.")).unwrap();
        let area = settings.output_area();
        area.ensure().unwrap();
        area.write_text(2, "Second one.").unwrap();

        let report = status(&settings).unwrap();
        assert_eq!(report.fragments, 2);
        assert_eq!(report.watermarks, vec![("log", 0), ("log_and_disk", 2)]);
        assert!(report.marker.is_none());
    }
}
