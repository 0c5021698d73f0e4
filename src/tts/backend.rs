use crate::audio::pcm::PcmAudio;
use crate::audio::wav::encode_wav;
use crate::error::{BookvoiceError, Result};
use std::sync::{Arc, Mutex};

/// Container format of a take as returned by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMime {
    Wav,
    Mpeg,
}

impl AudioMime {
    /// Map a `Content-Type` header value. Parameters such as `; charset` are
    /// ignored.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Ok(AudioMime::Wav),
            "audio/mpeg" | "audio/mp3" => Ok(AudioMime::Mpeg),
            _ => Err(BookvoiceError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }),
        }
    }

    /// File extension for temp takes.
    pub fn extension(self) -> &'static str {
        match self {
            AudioMime::Wav => "wav",
            AudioMime::Mpeg => "mp3",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioMime::Wav),
            "mp3" => Some(AudioMime::Mpeg),
            _ => None,
        }
    }
}

/// Raw audio from one synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Take {
    pub bytes: Vec<u8>,
    pub mime: AudioMime,
}

/// Remote text-to-speech endpoint.
///
/// This trait allows swapping implementations (real HTTP endpoint vs mock).
#[async_trait::async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize `text` with `voice`, styled by `style_prompt`.
    ///
    /// Transport failures, non-success statuses and unsupported content
    /// types are all errors; the caller moves on to the next voice/style.
    async fn generate(&self, text: &str, voice: &str, style_prompt: &str) -> Result<Take>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<T: SpeechBackend + ?Sized> SpeechBackend for Arc<T> {
    async fn generate(&self, text: &str, voice: &str, style_prompt: &str) -> Result<Take> {
        (**self).generate(text, voice, style_prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One recorded call to [`MockBackend::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub text: String,
    pub voice: String,
    pub style_prompt: String,
}

/// Mock speech backend for testing.
///
/// Returns the same take for every call unless configured to fail.
#[derive(Debug, Clone)]
pub struct MockBackend {
    take: Take,
    failing_voices: Vec<String>,
    should_fail: bool,
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl MockBackend {
    /// A backend returning `take` for every call.
    pub fn new(take: Take) -> Self {
        Self {
            take,
            failing_voices: Vec::new(),
            should_fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend returning a voiced WAV of `duration_ms` at `sample_rate`.
    pub fn with_tone(duration_ms: u32, sample_rate: u32) -> Result<Self> {
        Ok(Self::new(Take {
            bytes: encode_wav(&tone(duration_ms, sample_rate))?,
            mime: AudioMime::Wav,
        }))
    }

    /// Fail every call made with `voice` (case-insensitive).
    pub fn with_failing_voice(mut self, voice: &str) -> Self {
        self.failing_voices.push(voice.to_ascii_lowercase());
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SpeechBackend for MockBackend {
    async fn generate(&self, text: &str, voice: &str, style_prompt: &str) -> Result<Take> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(BackendCall {
                text: text.to_string(),
                voice: voice.to_string(),
                style_prompt: style_prompt.to_string(),
            });
        }

        if self.should_fail
            || self
                .failing_voices
                .iter()
                .any(|v| v.eq_ignore_ascii_case(voice))
        {
            return Err(BookvoiceError::Synthesis {
                message: format!("mock synthesis failure for voice {voice}"),
            });
        }
        Ok(self.take.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Continuous 220 Hz tone, voiced in every analysis window.
pub fn tone(duration_ms: u32, sample_rate: u32) -> PcmAudio {
    let len = (duration_ms as u64 * sample_rate as u64 / 1000) as usize;
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate.max(1) as f32;
            ((t * 220.0 * std::f32::consts::TAU).sin() * 8000.0) as i16
        })
        .collect();
    PcmAudio::new(samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_mapping() {
        assert_eq!(
            AudioMime::from_content_type("audio/wav").unwrap(),
            AudioMime::Wav
        );
        assert_eq!(
            AudioMime::from_content_type("audio/mpeg; charset=binary").unwrap(),
            AudioMime::Mpeg
        );
        match AudioMime::from_content_type("text/html") {
            Err(BookvoiceError::UnsupportedContentType { content_type }) => {
                assert_eq!(content_type, "text/html");
            }
            other => panic!("expected UnsupportedContentType, got {other:?}"),
        }
    }

    #[test]
    fn extension_round_trip() {
        for mime in [AudioMime::Wav, AudioMime::Mpeg] {
            assert_eq!(AudioMime::from_extension(mime.extension()), Some(mime));
        }
        assert_eq!(AudioMime::from_extension("ogg"), None);
    }

    #[tokio::test]
    async fn mock_records_calls_and_fails_selected_voices() {
        let backend = MockBackend::with_tone(100, 8000)
            .unwrap()
            .with_failing_voice("Ash");

        assert!(backend.generate("text", "Alloy", "calm").await.is_ok());
        assert!(backend.generate("text", "ash", "calm").await.is_err());

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].voice, "ash");
    }

    #[tokio::test]
    async fn mock_with_failure_always_fails() {
        let backend = MockBackend::with_tone(100, 8000).unwrap().with_failure();
        assert!(backend.generate("text", "Alloy", "calm").await.is_err());
    }

    #[test]
    fn tone_has_expected_length_and_energy() {
        let audio = tone(1000, 16000);
        assert_eq!(audio.samples.len(), 16000);
        assert!(audio.dbfs() > -20.0);
    }
}
