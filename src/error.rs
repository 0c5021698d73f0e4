//! Error types for bookvoice.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookvoiceError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Source document errors
    #[error("Source document not found at {path}")]
    SourceNotFound { path: String },

    #[error("Failed to parse source document {path}: {message}")]
    SourceParse { path: String, message: String },

    // Speech generation errors
    #[error("Speech generation failed: {message}")]
    Synthesis { message: String },

    #[error("Speech endpoint returned unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    // Audio errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Audio encode failed: {message}")]
    AudioEncode { message: String },

    #[error("Silence editing failed: {message}")]
    SilenceEdit { message: String },

    // Verification errors
    #[error("Verifier model not found at {path}")]
    VerifierModelNotFound { path: String },

    #[error("Verification failed: {message}")]
    Verification { message: String },

    #[error("Speech recognition not available in this build: {message}")]
    VerifierUnavailable { message: String },

    // Persisted state errors
    #[error("Ledger error at {path}: {message}")]
    Ledger { path: String, message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    // Remote store errors
    #[error("Remote store authorization failed: {message}")]
    StoreAuthorization { message: String },

    #[error("Remote store upload failed: {message}")]
    StoreUpload { message: String },

    #[error("Remote size mismatch for {remote_name}: local {local} bytes, remote {remote} bytes")]
    StoreSizeMismatch {
        remote_name: String,
        local: u64,
        remote: u64,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BookvoiceError>;
