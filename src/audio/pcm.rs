//! Mono 16-bit PCM buffer shared by the codec, the silence editor and the
//! verifier.

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Digital silence of the given duration.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        Self::new(vec![0; ms_to_samples(duration_ms, sample_rate)], sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Overall loudness in dBFS.
    pub fn dbfs(&self) -> f32 {
        rms_to_dbfs(calculate_rms(&self.samples))
    }

    /// Resampled copy at `rate`.
    pub fn resampled(&self, rate: u32) -> Self {
        Self::new(resample(&self.samples, self.sample_rate, rate), rate)
    }

    /// Append another clip, resampling it if the rates differ.
    pub fn append(&mut self, other: &PcmAudio) {
        if other.sample_rate == self.sample_rate {
            self.samples.extend_from_slice(&other.samples);
        } else {
            self.samples
                .extend(resample(&other.samples, other.sample_rate, self.sample_rate));
        }
    }
}

/// Number of samples covering `duration_ms` at `sample_rate`.
pub fn ms_to_samples(duration_ms: u32, sample_rate: u32) -> usize {
    (duration_ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Convert a normalized RMS value to dBFS. Silence maps to negative infinity.
pub fn rms_to_dbfs(rms: f32) -> f32 {
    if rms <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

/// Average interleaved channels down to mono.
pub fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&[0i16; 100]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&[i16::MAX; 100]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_dbfs_of_silence_is_negative_infinity() {
        assert_eq!(rms_to_dbfs(0.0), f32::NEG_INFINITY);
        assert!(PcmAudio::silence(100, 16000).dbfs().is_infinite());
    }

    #[test]
    fn test_dbfs_of_half_scale() {
        let db = rms_to_dbfs(0.5);
        assert!((db + 6.02).abs() < 0.01, "expected ~-6 dBFS, got {db}");
    }

    #[test]
    fn test_silence_length() {
        let silence = PcmAudio::silence(2000, 22050);
        assert_eq!(silence.samples.len(), 44100);
        assert_eq!(silence.duration_ms(), 2000);
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = vec![100i16, 200, 300, 400, 500, 600];
        assert_eq!(downmix(&stereo, 2), vec![150, 350, 550]);
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        let mono = vec![1i16, 2, 3];
        assert_eq!(downmix(&mono, 1), mono);
    }

    #[test]
    fn test_resample_identity_same_rate() {
        let samples = vec![100i16, 200, 300, 400, 500];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_upsample() {
        let resampled = resample(&[0i16, 1000, 2000], 8000, 16000);
        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn test_resample_downsample() {
        let resampled = resample(&[0i16; 3200], 16000, 8000);
        assert_eq!(resampled.len(), 1600);
    }

    #[test]
    fn test_resample_edge_cases() {
        assert!(resample(&[], 16000, 8000).is_empty());
        assert_eq!(resample(&[100i16], 16000, 8000), vec![100]);
    }

    #[test]
    fn test_append_resamples_other_rate() {
        let mut base = PcmAudio::new(vec![0; 1600], 16000);
        base.append(&PcmAudio::new(vec![0; 800], 8000));
        assert_eq!(base.samples.len(), 3200);
    }
}
