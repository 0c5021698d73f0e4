//! Recovery of temp takes orphaned by an interrupted run.
//!
//! A take that was downloaded but never judged is put through the same
//! verify → edit → classify path as a fresh one. Whatever happens, the temp
//! file is removed.

use crate::error::Result;
use crate::pipeline::artifacts::{OrphanTake, OutputArea};
use crate::pipeline::synthesizer::{SynthesisOutcome, Synthesizer};
use crate::text::Fragment;

#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Fragments settled from orphaned takes.
    pub recovered: Vec<SynthesisOutcome>,
    /// Takes that were rejected, stale, or already settled.
    pub discarded: usize,
}

pub fn recover_orphans(
    synth: &Synthesizer,
    area: &OutputArea,
    fragments: &[Fragment],
) -> Result<RecoveryReport> {
    let orphans = area.orphan_takes()?;
    let mut report = RecoveryReport::default();
    if orphans.is_empty() {
        return Ok(report);
    }

    tracing::info!(count = orphans.len(), "Recovering orphaned temp takes");

    for orphan in orphans {
        match recover_one(synth, area, fragments, &orphan) {
            Ok(Some(outcome)) => report.recovered.push(outcome),
            Ok(None) => report.discarded += 1,
            Err(e) => {
                tracing::warn!(index = orphan.index, error = %e, "Failed to recover temp take");
                report.discarded += 1;
            }
        }
        if let Err(e) = std::fs::remove_file(&orphan.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %orphan.path.display(), error = %e, "Failed to remove temp take");
        }
    }

    Ok(report)
}

fn recover_one(
    synth: &Synthesizer,
    area: &OutputArea,
    fragments: &[Fragment],
    orphan: &OrphanTake,
) -> Result<Option<SynthesisOutcome>> {
    let Some(fragment) = orphan
        .index
        .checked_sub(1)
        .and_then(|i| fragments.get(i))
    else {
        tracing::info!(index = orphan.index, "Temp take does not belong to this document");
        return Ok(None);
    };

    if area.existing(orphan.index).is_some() {
        tracing::info!(index = orphan.index, "Fragment already settled, dropping temp take");
        return Ok(None);
    }

    let bytes = std::fs::read(&orphan.path)?;
    let outcome = synth.evaluate_take(fragment, &bytes, orphan.mime, None, None)?;
    if let Some(ref outcome) = outcome {
        tracing::info!(
            index = orphan.index,
            path = %outcome.artifact().path.display(),
            "Recovered temp take"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::silence::SilenceSettings;
    use crate::audio::wav::encode_wav;
    use crate::pipeline::artifacts::ArtifactKind;
    use crate::pipeline::synthesizer::SynthesisSettings;
    use crate::stt::verifier::MockVerifier;
    use crate::tts::backend::{AudioMime, MockBackend, tone};
    use crate::tts::voices::{SweepSpace, builtin_styles, builtin_voices};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(verifier: MockVerifier) -> (TempDir, OutputArea, Synthesizer) {
        let dir = TempDir::new().unwrap();
        let area = OutputArea::new(dir.path(), dir.path().join("TEMP_audio"));
        area.ensure().unwrap();
        let styles = builtin_styles();
        let synth = Synthesizer::new(
            Arc::new(MockBackend::with_tone(100, 8000).unwrap()),
            Arc::new(verifier),
            area.clone(),
            SweepSpace::new(&builtin_voices(), &styles, "Alloy", "Calm"),
            styles,
            SynthesisSettings {
                sample_rate: 22050,
                min_size_kb: 150,
                max_size_kb: 5000,
                silence: SilenceSettings::default(),
            },
        );
        (dir, area, synth)
    }

    fn fragments(n: usize) -> Vec<Fragment> {
        (1..=n).map(|i| Fragment::new(i, format!("Фрагмент {i}."))).collect()
    }

    fn long_take() -> Vec<u8> {
        encode_wav(&tone(5000, 22050)).unwrap()
    }

    #[test]
    fn orphan_is_settled_and_removed() {
        let (_dir, area, synth) = setup(MockVerifier::accepting());
        let path = area.write_temp_take(2, AudioMime::Wav, &long_take()).unwrap();

        let report = recover_orphans(&synth, &area, &fragments(3)).unwrap();
        assert_eq!(report.recovered.len(), 1);
        assert!(matches!(
            report.recovered[0],
            SynthesisOutcome::Accepted { .. }
        ));
        assert!(area.artifact_path(2, ArtifactKind::Audio).exists());
        assert!(!path.exists());
    }

    #[test]
    fn rejected_orphan_is_discarded() {
        let (_dir, area, synth) = setup(MockVerifier::rejecting());
        let path = area.write_temp_take(1, AudioMime::Wav, &long_take()).unwrap();

        let report = recover_orphans(&synth, &area, &fragments(3)).unwrap();
        assert!(report.recovered.is_empty());
        assert_eq!(report.discarded, 1);
        assert!(area.existing(1).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn orphan_beyond_document_is_discarded() {
        let (_dir, area, synth) = setup(MockVerifier::accepting());
        area.write_temp_take(9, AudioMime::Wav, &long_take()).unwrap();

        let report = recover_orphans(&synth, &area, &fragments(3)).unwrap();
        assert!(report.recovered.is_empty());
        assert_eq!(report.discarded, 1);
        assert!(area.existing(9).is_none());
    }

    #[test]
    fn orphan_for_settled_fragment_keeps_existing_artifact() {
        let (_dir, area, synth) = setup(MockVerifier::accepting());
        area.write_text(1, "kept").unwrap();
        area.write_temp_take(1, AudioMime::Wav, &long_take()).unwrap();

        let report = recover_orphans(&synth, &area, &fragments(3)).unwrap();
        assert!(report.recovered.is_empty());
        assert!(!area.artifact_path(1, ArtifactKind::Audio).exists());
        assert_eq!(
            std::fs::read_to_string(area.artifact_path(1, ArtifactKind::Text)).unwrap(),
            "kept"
        );
    }

    #[test]
    fn undecodable_orphan_is_discarded() {
        let (_dir, area, synth) = setup(MockVerifier::accepting());
        area.write_temp_take(1, AudioMime::Mpeg, b"not an mp3").unwrap();
        let report = recover_orphans(&synth, &area, &fragments(1)).unwrap();
        assert_eq!(report.discarded, 1);
        assert!(area.orphan_takes().unwrap().is_empty());
    }
}
