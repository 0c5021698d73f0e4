//! bookvoice - Resumable long-form text to verified speech
//!
//! Splits a document into fragments, synthesizes each one through a remote
//! speech endpoint, checks every take by transcribing it, and keeps exactly
//! one durable artifact per fragment so an interrupted run picks up where it
//! stopped.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod stt;
pub mod text;
pub mod tts;

// Composition root - needs everything
#[cfg(feature = "cli")]
pub mod app;

// Collaborator seams (generate → verify → store)
pub use store::RemoteStore;
pub use store::offload::Offloader;
pub use stt::verifier::Verifier;
pub use tts::backend::SpeechBackend;

// Pipeline
pub use pipeline::controller::{Pipeline, PipelineSettings, RunSummary};
pub use pipeline::resume::ResumeStrategy;

// Error handling
pub use error::{BookvoiceError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
