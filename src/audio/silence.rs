//! Silence editor.
//!
//! Long pauses in a take are cut down to a fixed pause; leading and
//! trailing silence is dropped. Silence is judged per analysis window
//! against a threshold relative to the clip's overall loudness, so quiet
//! and loud takes are treated alike.

use crate::audio::pcm::{PcmAudio, calculate_rms, ms_to_samples, rms_to_dbfs};
use crate::defaults;
use crate::error::{BookvoiceError, Result};
use std::ops::Range;

/// Silence editor parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceSettings {
    /// Silence runs at least this long are replaced by `pause_ms`.
    pub min_silence_ms: u32,
    /// Threshold relative to the clip's overall dBFS (negative).
    pub offset_db: f32,
    /// Pause inserted between voiced chunks.
    pub pause_ms: u32,
    /// Silence kept on each side of a voiced chunk.
    pub keep_silence_ms: u32,
    /// Analysis window.
    pub window_ms: u32,
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            min_silence_ms: defaults::MIN_SILENCE_MS,
            offset_db: defaults::SILENCE_OFFSET_DB,
            pause_ms: defaults::PAUSE_MS,
            keep_silence_ms: defaults::KEEP_SILENCE_MS,
            window_ms: defaults::ANALYSIS_WINDOW_MS,
        }
    }
}

/// Normalize pauses in a take.
///
/// Fails on empty or entirely silent audio; callers treat that as a rejected
/// take.
pub fn normalize(audio: &PcmAudio, settings: &SilenceSettings) -> Result<PcmAudio> {
    let chunks = voiced_ranges(audio, settings)?;

    let pause = PcmAudio::silence(settings.pause_ms, audio.sample_rate);
    let mut out = PcmAudio::new(Vec::with_capacity(audio.samples.len()), audio.sample_rate);
    for (i, range) in chunks.iter().enumerate() {
        if i > 0 {
            out.samples.extend_from_slice(&pause.samples);
        }
        out.samples.extend_from_slice(&audio.samples[range.clone()]);
    }
    Ok(out)
}

/// Sample ranges to keep, padding included, in order.
pub fn voiced_ranges(audio: &PcmAudio, settings: &SilenceSettings) -> Result<Vec<Range<usize>>> {
    if audio.is_empty() || audio.sample_rate == 0 {
        return Err(BookvoiceError::SilenceEdit {
            message: "empty audio".to_string(),
        });
    }

    let overall_db = audio.dbfs();
    if overall_db.is_infinite() {
        return Err(BookvoiceError::SilenceEdit {
            message: "audio is entirely silent".to_string(),
        });
    }
    let threshold_db = overall_db + settings.offset_db;

    let window = ms_to_samples(settings.window_ms, audio.sample_rate).max(1);
    let min_silence = ms_to_samples(settings.min_silence_ms, audio.sample_rate);
    let keep = ms_to_samples(settings.keep_silence_ms, audio.sample_rate);
    let total = audio.samples.len();

    // Voiced windows as sample ranges, merged across short gaps.
    let mut voiced: Vec<Range<usize>> = Vec::new();
    for (w, chunk) in audio.samples.chunks(window).enumerate() {
        if rms_to_dbfs(calculate_rms(chunk)) < threshold_db {
            continue;
        }
        let start = w * window;
        let end = start + chunk.len();
        match voiced.last_mut() {
            Some(last) if start - last.end < min_silence.max(1) => last.end = end,
            _ => voiced.push(start..end),
        }
    }

    if voiced.is_empty() {
        return Err(BookvoiceError::SilenceEdit {
            message: "no voiced audio above threshold".to_string(),
        });
    }

    Ok(voiced
        .into_iter()
        .map(|r| r.start.saturating_sub(keep)..(r.end + keep).min(total))
        .collect())
}
