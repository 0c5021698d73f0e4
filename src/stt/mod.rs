//! Transcription-based verification of synthesized takes.

pub mod verifier;
pub mod whisper;

pub use verifier::{MockVerifier, VerificationResult, Verifier};
pub use whisper::{WhisperConfig, WhisperVerifier};
