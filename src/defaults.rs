//! Default configuration constants for bookvoice.
//!
//! Shared by the config layer and the pipeline so both agree on the same
//! numbers without duplicating them.

/// Maximum fragment length in characters.
///
/// The ledger identifies fragments by position only, so this value must
/// stay fixed for the lifetime of a document's output directory.
pub const MAX_FRAGMENT_CHARS: usize = 980;

/// Lower bound (inclusive) for a normalized audio artifact, in KB.
pub const MIN_SIZE_KB: u64 = 150;

/// Upper bound (inclusive) for a normalized audio artifact, in KB.
pub const MAX_SIZE_KB: u64 = 5000;

/// Resident batch size that triggers packaging, in MB.
pub const AUDIO_SIZE_LIMIT_MB: u64 = 5;

/// Silence runs shorter than this are left untouched.
pub const MIN_SILENCE_MS: u32 = 4000;

/// Silence threshold relative to the clip's overall loudness, in dB.
pub const SILENCE_OFFSET_DB: f32 = -14.0;

/// Pause inserted between voiced chunks after trimming.
pub const PAUSE_MS: u32 = 2000;

/// Silence kept on each side of a voiced chunk.
pub const KEEP_SILENCE_MS: u32 = 100;

/// Loudness analysis window.
pub const ANALYSIS_WINDOW_MS: u32 = 10;

/// Timeout for every speech endpoint and object store request.
pub const REQUEST_TIMEOUT_SECS: u64 = 90;

/// Speech endpoint.
pub const SPEECH_ENDPOINT: &str = "https://www.openai.fm/api/generate";

/// Sample rate expected by Whisper.
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Languages a take may be transcribed as to be accepted.
pub const ACCEPTED_LANGUAGES: &[&str] = &["ru", "uk"];

/// Starting voice.
pub const DEFAULT_VOICE: &str = "Alloy";

/// Starting style.
pub const DEFAULT_STYLE: &str = "Calm";

/// Prompt used when a style name is not in the catalog.
pub const FALLBACK_STYLE_PROMPT: &str = "Voice Affect: Calm, composed, and reassuring.";

/// Number of fragments per merged range file.
pub const MERGE_GROUP_SIZE: usize = 10;

/// Default output directory (relative to the working directory).
pub const OUTPUT_DIR: &str = "output";

/// Name of the temp directory inside the output directory.
pub const TEMP_DIR_NAME: &str = "TEMP_audio";

/// Name of the archive directory inside the output directory.
pub const ARCHIVE_DIR_NAME: &str = "archives";

/// Name of the upload marker file inside the output directory.
pub const UPLOAD_MARKER_FILE: &str = "upload_marker.json";

/// Zero-padding width for artifact file names.
pub const INDEX_WIDTH: usize = 5;
