//! Whisper-based take verification.
//!
//! Takes are resampled to 16 kHz, transcribed with language auto-detection,
//! and accepted when the detected language is on the allow-list.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake):
//!
//! ```bash
//! cargo build --features whisper
//! ```
//!
//! Without it the type still exists but refuses to construct, so a run
//! stops at startup instead of settling every fragment as text.

use crate::audio::pcm::PcmAudio;
use crate::defaults;
use crate::error::{BookvoiceError, Result};
use crate::stt::verifier::{VerificationResult, Verifier};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

#[cfg(not(feature = "whisper"))]
const NOT_ENABLED: &str = concat!(
    "whisper feature not enabled.\n",
    "To fix: cargo build --release --features full\n",
    "If build fails with cmake errors, install: sudo apt install cmake"
);

/// Configuration for the Whisper verifier.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Accepted language codes
    pub languages: Vec<String>,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-tiny.bin"),
            languages: defaults::ACCEPTED_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            threads: None,
        }
    }
}

/// Whisper verifier.
///
/// The WhisperContext is wrapped in a Mutex to ensure thread safety.
#[cfg(feature = "whisper")]
pub struct WhisperVerifier {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperVerifier")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper verifier placeholder (without whisper feature). Never constructed.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperVerifier {
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
fn model_name_of(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Convert i16 audio samples to f32 normalized to [-1.0, 1.0]
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

#[cfg(feature = "whisper")]
impl WhisperVerifier {
    /// Load the model.
    ///
    /// # Errors
    /// Returns `BookvoiceError::VerifierModelNotFound` if the model file doesn't exist
    /// Returns `BookvoiceError::Verification` if model loading fails
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(BookvoiceError::VerifierModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_of(&config);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| BookvoiceError::Verification {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| BookvoiceError::Verification {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        tracing::info!(model = %model_name, "Whisper model loaded");

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperVerifier {
    /// Always fails: without inference every take would be rejected and
    /// every fragment permanently settled as text.
    ///
    /// # Errors
    /// Returns `BookvoiceError::VerifierUnavailable`
    pub fn new(_config: WhisperConfig) -> Result<Self> {
        Err(BookvoiceError::VerifierUnavailable {
            message: NOT_ENABLED.to_string(),
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Verifier for WhisperVerifier {
    fn verify(&self, audio: &PcmAudio) -> Result<VerificationResult> {
        let resampled = audio.resampled(defaults::WHISPER_SAMPLE_RATE);
        let audio_f32 = convert_audio(&resampled.samples);

        let context = self
            .context
            .lock()
            .map_err(|e| BookvoiceError::Verification {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| BookvoiceError::Verification {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(None);
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| BookvoiceError::Verification {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let lang_id = state.full_lang_id_from_state();
        let language = whisper_rs::get_lang_str(lang_id).unwrap_or("").to_string();

        let mut transcript = String::new();
        for segment in state.as_iter() {
            transcript.push_str(&segment.to_string());
        }

        let result = VerificationResult::judge(&language, &transcript, &self.config.languages);
        tracing::debug!(
            language = %result.language,
            accepted = result.accepted,
            transcript_length = result.transcript.chars().count(),
            "Take transcribed"
        );
        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl Verifier for WhisperVerifier {
    fn verify(&self, _audio: &PcmAudio) -> Result<VerificationResult> {
        Err(BookvoiceError::VerifierUnavailable {
            message: NOT_ENABLED.to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
