//! Per-fragment generate → verify → accept/reject state machine.
//!
//! Voice/style pairs are swept deterministically: styles advance first, and
//! once every style has been tried for a voice the style resets to the
//! configured starting style and the voice advances. The cursor is sticky
//! across fragments, so the pair that settled the previous fragment is the
//! first one tried for the next.

use crate::audio;
use crate::audio::silence::{self, SilenceSettings};
use crate::audio::wav::encode_wav;
use crate::error::Result;
use crate::pipeline::artifacts::{AcceptedArtifact, OutputArea};
use crate::pipeline::ledger::{LedgerRecord, Outcome};
use crate::stt::verifier::Verifier;
use crate::text::Fragment;
use crate::tts::backend::{AudioMime, SpeechBackend};
use crate::tts::voices::{StyleDef, SweepSpace, style_prompt};
use std::sync::Arc;

/// Audio parameters for evaluating takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisSettings {
    pub sample_rate: u32,
    pub min_size_kb: u64,
    pub max_size_kb: u64,
    pub silence: SilenceSettings,
}

/// Which artifact a normalized take of a given size becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Audio,
    Text,
}

/// Inclusive bounds, in KB of 1024 bytes.
pub fn classify_size(size_bytes: u64, min_kb: u64, max_kb: u64) -> SizeClass {
    let kb = size_bytes as f64 / 1024.0;
    if kb >= min_kb as f64 && kb <= max_kb as f64 {
        SizeClass::Audio
    } else {
        SizeClass::Text
    }
}

/// Position in the voice × style sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepCursor {
    pub voice: usize,
    pub style: usize,
}

/// Terminal result for one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Accepted {
        artifact: AcceptedArtifact,
        voice: Option<String>,
        style: Option<String>,
        size_kb: f64,
    },
    Suspicious {
        artifact: AcceptedArtifact,
        voice: Option<String>,
        style: Option<String>,
        size_kb: f64,
    },
    Exhausted {
        artifact: AcceptedArtifact,
    },
    /// An artifact for this index was already on disk; nothing was written.
    AlreadyPresent {
        artifact: AcceptedArtifact,
    },
}

impl SynthesisOutcome {
    pub fn artifact(&self) -> &AcceptedArtifact {
        match self {
            SynthesisOutcome::Accepted { artifact, .. }
            | SynthesisOutcome::Suspicious { artifact, .. }
            | SynthesisOutcome::Exhausted { artifact }
            | SynthesisOutcome::AlreadyPresent { artifact } => artifact,
        }
    }

    /// Ledger line for a decision made in this run.
    pub fn ledger_record(&self) -> Option<LedgerRecord> {
        match self {
            SynthesisOutcome::Accepted {
                artifact,
                voice,
                style,
                size_kb,
            } => Some(
                LedgerRecord::new(artifact.index, Outcome::Accepted).with_take(
                    voice.as_deref(),
                    style.as_deref(),
                    *size_kb,
                ),
            ),
            SynthesisOutcome::Suspicious {
                artifact,
                voice,
                style,
                size_kb,
            } => Some(
                LedgerRecord::new(artifact.index, Outcome::Suspicious).with_take(
                    voice.as_deref(),
                    style.as_deref(),
                    *size_kb,
                ),
            ),
            SynthesisOutcome::Exhausted { artifact } => {
                Some(LedgerRecord::new(artifact.index, Outcome::Exhausted))
            }
            SynthesisOutcome::AlreadyPresent { .. } => None,
        }
    }
}

/// Drives synthesis for fragments in order, carrying the sweep cursor.
pub struct Synthesizer {
    backend: Arc<dyn SpeechBackend>,
    verifier: Arc<dyn Verifier>,
    area: OutputArea,
    space: SweepSpace,
    styles: Vec<StyleDef>,
    settings: SynthesisSettings,
    cursor: SweepCursor,
}

impl Synthesizer {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        verifier: Arc<dyn Verifier>,
        area: OutputArea,
        space: SweepSpace,
        styles: Vec<StyleDef>,
        settings: SynthesisSettings,
    ) -> Self {
        let cursor = SweepCursor {
            voice: space.start_voice,
            style: space.start_style,
        };
        Self {
            backend,
            verifier,
            area,
            space,
            styles,
            settings,
            cursor,
        }
    }

    pub fn cursor(&self) -> SweepCursor {
        self.cursor
    }

    /// Voice and style names at the cursor.
    pub fn current_pair(&self) -> (&str, &str) {
        (
            self.space.voices[self.cursor.voice].as_str(),
            self.space.styles[self.cursor.style].as_str(),
        )
    }

    /// Settle one fragment.
    ///
    /// Only filesystem failures are errors; transport, decode, verification
    /// and editing failures move the sweep on.
    pub async fn synthesize(&mut self, fragment: &Fragment) -> Result<SynthesisOutcome> {
        if let Some(artifact) = self.area.existing(fragment.index) {
            tracing::info!(
                index = fragment.index,
                path = %artifact.path.display(),
                "Artifact already present, skipping"
            );
            return Ok(SynthesisOutcome::AlreadyPresent { artifact });
        }

        let voice_count = self.space.voices.len();
        let style_count = self.space.styles.len();

        for _ in 0..voice_count {
            for _ in 0..style_count {
                let (voice, style) = {
                    let (v, s) = self.current_pair();
                    (v.to_string(), s.to_string())
                };
                let attempt = self.try_pair(fragment, &voice, &style).await;
                self.area.clear_temp(fragment.index);
                if let Some(outcome) = attempt? {
                    return Ok(outcome);
                }
                self.cursor.style = (self.cursor.style + 1) % style_count;
            }
            self.cursor.voice = (self.cursor.voice + 1) % voice_count;
            self.cursor.style = self.space.start_style;
            tracing::info!(
                index = fragment.index,
                voice = %self.space.voices[self.cursor.voice],
                "All styles tried, switching voice"
            );
        }

        if let Some(artifact) = self.area.existing(fragment.index) {
            return Ok(SynthesisOutcome::AlreadyPresent { artifact });
        }
        let artifact = self.area.write_text(fragment.index, &fragment.text)?;
        tracing::warn!(
            index = fragment.index,
            "No voice produced an accepted take, saved text"
        );
        Ok(SynthesisOutcome::Exhausted { artifact })
    }

    async fn try_pair(
        &self,
        fragment: &Fragment,
        voice: &str,
        style: &str,
    ) -> Result<Option<SynthesisOutcome>> {
        let prompt = style_prompt(&self.styles, style);
        let take = match self.backend.generate(&fragment.text, voice, &prompt).await {
            Ok(take) => take,
            Err(e) => {
                tracing::warn!(
                    index = fragment.index,
                    voice,
                    style,
                    error = %e,
                    "Speech request failed"
                );
                return Ok(None);
            }
        };

        self.area
            .write_temp_take(fragment.index, take.mime, &take.bytes)?;
        self.evaluate_take(fragment, &take.bytes, take.mime, Some(voice), Some(style))
    }

    /// Decode, verify, edit and classify one take, writing the artifact when
    /// it settles the fragment. `Ok(None)` means the take was rejected.
    pub fn evaluate_take(
        &self,
        fragment: &Fragment,
        bytes: &[u8],
        mime: AudioMime,
        voice: Option<&str>,
        style: Option<&str>,
    ) -> Result<Option<SynthesisOutcome>> {
        let index = fragment.index;
        let voice_label = voice.unwrap_or("-");
        let style_label = style.unwrap_or("-");

        let audio = match audio::prepare(bytes, mime, self.settings.sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(index, voice = voice_label, style = style_label, error = %e, "Take could not be decoded");
                return Ok(None);
            }
        };

        let verdict = match self.verifier.verify(&audio) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(index, voice = voice_label, style = style_label, error = %e, "Verification failed");
                return Ok(None);
            }
        };
        if !verdict.accepted {
            tracing::info!(
                index,
                voice = voice_label,
                style = style_label,
                language = %verdict.language,
                transcript = %verdict.transcript.chars().take(50).collect::<String>(),
                "Take rejected"
            );
            return Ok(None);
        }

        let edited = match silence::normalize(&audio, &self.settings.silence)
            .and_then(|normalized| encode_wav(&normalized))
        {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(index, voice = voice_label, style = style_label, error = %e, "Silence editing failed");
                return Ok(None);
            }
        };

        if let Some(artifact) = self.area.existing(index) {
            tracing::info!(index, "Artifact appeared meanwhile, keeping it");
            return Ok(Some(SynthesisOutcome::AlreadyPresent { artifact }));
        }

        let size_bytes = edited.len() as u64;
        let size_kb = size_bytes as f64 / 1024.0;
        let voice = voice.map(str::to_string);
        let style = style.map(str::to_string);

        match classify_size(
            size_bytes,
            self.settings.min_size_kb,
            self.settings.max_size_kb,
        ) {
            SizeClass::Audio => {
                let artifact = self.area.write_audio(index, &edited)?;
                tracing::info!(
                    index,
                    voice = voice_label,
                    style = style_label,
                    language = %verdict.language,
                    size_kb = %format!("{size_kb:.1}"),
                    "Take accepted"
                );
                Ok(Some(SynthesisOutcome::Accepted {
                    artifact,
                    voice,
                    style,
                    size_kb,
                }))
            }
            SizeClass::Text => {
                let artifact = self.area.write_text(index, &fragment.text)?;
                tracing::warn!(
                    index,
                    voice = voice_label,
                    style = style_label,
                    size_kb = %format!("{size_kb:.1}"),
                    "Take size out of bounds, saved text"
                );
                Ok(Some(SynthesisOutcome::Suspicious {
                    artifact,
                    voice,
                    style,
                    size_kb,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifacts::ArtifactKind;
    use crate::stt::verifier::MockVerifier;
    use crate::tts::backend::MockBackend;
    use crate::tts::voices::StyleDef;
    use tempfile::TempDir;

    const RATE: u32 = 22050;

    fn settings() -> SynthesisSettings {
        SynthesisSettings {
            sample_rate: RATE,
            min_size_kb: 150,
            max_size_kb: 5000,
            silence: SilenceSettings::default(),
        }
    }

    fn styles() -> Vec<StyleDef> {
        vec![
            StyleDef::new("Calm", &["calm"]),
            StyleDef::new("Serene", &["serene"]),
            StyleDef::new("Sincere", &["sincere"]),
        ]
    }

    fn voices() -> Vec<String> {
        vec!["Alloy".to_string(), "Ash".to_string()]
    }

    struct Fixture {
        _dir: TempDir,
        area: OutputArea,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let area = OutputArea::new(dir.path(), dir.path().join("TEMP_audio"));
        area.ensure().unwrap();
        Fixture { _dir: dir, area }
    }

    fn synthesizer(
        fx: &Fixture,
        backend: MockBackend,
        verifier: MockVerifier,
        voice: &str,
        style: &str,
    ) -> Synthesizer {
        let styles = styles();
        Synthesizer::new(
            Arc::new(backend),
            Arc::new(verifier),
            fx.area.clone(),
            SweepSpace::new(&voices(), &styles, voice, style),
            styles,
            settings(),
        )
    }

    #[test]
    fn size_classification_bounds_are_inclusive() {
        assert_eq!(classify_size(100 * 1024, 150, 5000), SizeClass::Text);
        assert_eq!(classify_size(150 * 1024, 150, 5000), SizeClass::Audio);
        assert_eq!(classify_size(200 * 1024, 150, 5000), SizeClass::Audio);
        assert_eq!(classify_size(5000 * 1024, 150, 5000), SizeClass::Audio);
        assert_eq!(classify_size(6000 * 1024, 150, 5000), SizeClass::Text);
    }

    #[tokio::test]
    async fn accepted_take_becomes_audio_artifact() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend, MockVerifier::accepting(), "Alloy", "Calm");

        let outcome = synth
            .synthesize(&Fragment::new(1, "Привет."))
            .await
            .unwrap();
        match &outcome {
            SynthesisOutcome::Accepted { artifact, voice, .. } => {
                assert_eq!(artifact.kind, ArtifactKind::Audio);
                assert_eq!(voice.as_deref(), Some("Alloy"));
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert!(fx.area.artifact_path(1, ArtifactKind::Audio).exists());
        assert!(!fx.area.artifact_path(1, ArtifactKind::Text).exists());
        assert!(fx.area.orphan_takes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn small_take_becomes_suspicious_text() {
        let fx = fixture();
        // ~43 KB once encoded, below the 150 KB floor
        let backend = MockBackend::with_tone(1000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend, MockVerifier::accepting(), "Alloy", "Calm");

        let outcome = synth
            .synthesize(&Fragment::new(2, "Короткий."))
            .await
            .unwrap();
        assert!(matches!(outcome, SynthesisOutcome::Suspicious { .. }));
        let text = std::fs::read_to_string(fx.area.artifact_path(2, ArtifactKind::Text)).unwrap();
        assert_eq!(text, "Короткий.");
        assert!(!fx.area.artifact_path(2, ArtifactKind::Audio).exists());
    }

    #[tokio::test]
    async fn sweep_advances_styles_before_voices() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend.clone(), MockVerifier::cycle(4), "Alloy", "Serene");

        let outcome = synth.synthesize(&Fragment::new(1, "Текст.")).await.unwrap();
        assert!(matches!(outcome, SynthesisOutcome::Accepted { .. }));

        let tried: Vec<(String, String)> = backend
            .calls()
            .into_iter()
            .map(|c| (c.voice, c.style_prompt))
            .collect();
        let expected = vec![
            ("Alloy", "serene"),
            ("Alloy", "sincere"),
            ("Alloy", "calm"),
            ("Ash", "serene"),
            ("Ash", "sincere"),
        ];
        assert_eq!(
            tried,
            expected
                .into_iter()
                .map(|(v, s)| (v.to_string(), s.to_string()))
                .collect::<Vec<_>>()
        );
        assert_eq!(synth.current_pair(), ("Ash", "Sincere"));
    }

    #[tokio::test]
    async fn cursor_is_sticky_across_fragments() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend.clone(), MockVerifier::cycle(1), "Alloy", "Calm");

        synth.synthesize(&Fragment::new(1, "Один.")).await.unwrap();
        assert_eq!(synth.current_pair(), ("Alloy", "Serene"));

        synth.synthesize(&Fragment::new(2, "Два.")).await.unwrap();
        let calls = backend.calls();
        assert_eq!(calls[2].style_prompt, "serene");
        assert_eq!(synth.current_pair(), ("Alloy", "Sincere"));
    }

    #[tokio::test]
    async fn exhaustion_writes_text_and_resets_cursor() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend.clone(), MockVerifier::rejecting(), "Ash", "Serene");

        let outcome = synth.synthesize(&Fragment::new(4, "Нет.")).await.unwrap();
        assert!(matches!(outcome, SynthesisOutcome::Exhausted { .. }));
        assert_eq!(backend.calls().len(), 6);
        assert!(fx.area.artifact_path(4, ArtifactKind::Text).exists());
        assert_eq!(synth.current_pair(), ("Ash", "Serene"));
        assert_eq!(
            outcome.ledger_record().unwrap().outcome,
            Outcome::Exhausted
        );
    }

    #[tokio::test]
    async fn transport_failures_move_to_next_voice() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE)
            .unwrap()
            .with_failing_voice("Alloy");
        let mut synth = synthesizer(&fx, backend.clone(), MockVerifier::accepting(), "Alloy", "Calm");

        let outcome = synth.synthesize(&Fragment::new(1, "Текст.")).await.unwrap();
        match outcome {
            SynthesisOutcome::Accepted { voice, style, .. } => {
                assert_eq!(voice.as_deref(), Some("Ash"));
                assert_eq!(style.as_deref(), Some("Calm"));
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert_eq!(backend.calls().len(), 4);
    }

    #[tokio::test]
    async fn verifier_errors_are_rejections() {
        let fx = fixture();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend, MockVerifier::failing(), "Alloy", "Calm");
        let outcome = synth.synthesize(&Fragment::new(1, "Текст.")).await.unwrap();
        assert!(matches!(outcome, SynthesisOutcome::Exhausted { .. }));
    }

    #[tokio::test]
    async fn existing_artifact_short_circuits() {
        let fx = fixture();
        fx.area.write_text(3, "earlier").unwrap();
        let backend = MockBackend::with_tone(5000, RATE).unwrap();
        let mut synth = synthesizer(&fx, backend.clone(), MockVerifier::accepting(), "Alloy", "Calm");

        let outcome = synth.synthesize(&Fragment::new(3, "Новый.")).await.unwrap();
        assert!(matches!(outcome, SynthesisOutcome::AlreadyPresent { .. }));
        assert!(outcome.ledger_record().is_none());
        assert!(backend.calls().is_empty());
        assert_eq!(
            std::fs::read_to_string(fx.area.artifact_path(3, ArtifactKind::Text)).unwrap(),
            "earlier"
        );
    }
}
