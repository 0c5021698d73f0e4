use crate::audio::pcm::PcmAudio;
use crate::error::{BookvoiceError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of transcribing a take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub accepted: bool,
    /// Detected language code, e.g. "ru"
    pub language: String,
    pub transcript: String,
}

impl VerificationResult {
    /// Accept iff `language` is allowed and the transcript has content.
    pub fn judge(language: &str, transcript: &str, allowed: &[String]) -> Self {
        let transcript = transcript.trim();
        let accepted =
            !transcript.is_empty() && allowed.iter().any(|l| l.eq_ignore_ascii_case(language));
        Self {
            accepted,
            language: language.to_string(),
            transcript: transcript.to_string(),
        }
    }
}

/// Trait for checking that a take actually speaks the expected language.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Verifier: Send + Sync {
    /// Transcribe `audio` and judge it.
    ///
    /// Errors are treated by callers as a rejection.
    fn verify(&self, audio: &PcmAudio) -> Result<VerificationResult>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

impl<T: Verifier + ?Sized> Verifier for Arc<T> {
    fn verify(&self, audio: &PcmAudio) -> Result<VerificationResult> {
        (**self).verify(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockMode {
    Accept,
    Reject,
    /// Reject `n` calls, accept the next one, repeat.
    Cycle(usize),
    Fail,
}

/// Mock verifier for testing
#[derive(Debug, Clone)]
pub struct MockVerifier {
    mode: MockMode,
    language: String,
    transcript: String,
    calls: Arc<AtomicUsize>,
}

impl MockVerifier {
    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            language: "ru".to_string(),
            transcript: "проверка".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Accept every take.
    pub fn accepting() -> Self {
        Self::with_mode(MockMode::Accept)
    }

    /// Reject every take as the wrong language.
    pub fn rejecting() -> Self {
        Self::with_mode(MockMode::Reject)
    }

    /// Reject `reject_count` takes, accept the next, and start over.
    pub fn cycle(reject_count: usize) -> Self {
        Self::with_mode(MockMode::Cycle(reject_count))
    }

    /// Return an error for every take.
    pub fn failing() -> Self {
        Self::with_mode(MockMode::Fail)
    }

    /// Configure the language reported on acceptance
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Number of takes verified so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Verifier for MockVerifier {
    fn verify(&self, _audio: &PcmAudio) -> Result<VerificationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let accept = match self.mode {
            MockMode::Accept => true,
            MockMode::Reject => false,
            MockMode::Cycle(n) => call % (n + 1) == n,
            MockMode::Fail => {
                return Err(BookvoiceError::Verification {
                    message: "mock verification failure".to_string(),
                });
            }
        };

        Ok(if accept {
            VerificationResult {
                accepted: true,
                language: self.language.clone(),
                transcript: self.transcript.clone(),
            }
        } else {
            VerificationResult {
                accepted: false,
                language: "en".to_string(),
                transcript: "wrong language".to_string(),
            }
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
