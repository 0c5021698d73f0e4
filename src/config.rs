use crate::defaults;
use crate::error::{BookvoiceError, Result};
use crate::tts::voices::{StyleDef, builtin_styles, builtin_voices};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub synthesis: SynthesisConfig,
    pub audio: AudioConfig,
    pub verify: VerifyConfig,
    pub batch: BatchConfig,
    pub resume: ResumeConfig,
    pub logging: LoggingConfig,
}

/// Source document configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    pub format: SourceFormat,
    pub max_fragment_chars: usize,
}

/// Source document format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Pick by file extension
    #[default]
    Auto,
    /// Plain UTF-8 text
    Txt,
    /// FictionBook XML, tags stripped
    Fb2,
}

/// Output area configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Defaults to `<dir>/TEMP_audio`
    pub temp_dir: Option<PathBuf>,
    /// Defaults to `<dir>/<book>.ledger.jsonl`
    pub ledger_file: Option<PathBuf>,
}

/// Speech generation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub voice: String,
    pub style: String,
    pub request_timeout_secs: u64,
    pub voices: Vec<String>,
    pub styles: Vec<StyleDef>,
}

/// Audio normalization and size-bound configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: SampleRate,
    pub min_size_kb: u64,
    pub max_size_kb: u64,
    pub min_silence_ms: u32,
    pub silence_offset_db: f32,
    pub pause_ms: u32,
    pub keep_silence_ms: u32,
}

/// Output sample rates the normalizer can target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    #[default]
    Hz22050,
    Hz24000,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    pub const ALL: [SampleRate; 6] = [
        SampleRate::Hz8000,
        SampleRate::Hz16000,
        SampleRate::Hz22050,
        SampleRate::Hz24000,
        SampleRate::Hz44100,
        SampleRate::Hz48000,
    ];

    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz22050 => 22050,
            SampleRate::Hz24000 => 24000,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = String;

    fn try_from(hz: u32) -> std::result::Result<Self, Self::Error> {
        SampleRate::ALL
            .into_iter()
            .find(|rate| rate.hz() == hz)
            .ok_or_else(|| {
                let allowed: Vec<String> =
                    SampleRate::ALL.iter().map(|r| r.hz().to_string()).collect();
                format!(
                    "unsupported sample rate {hz}, expected one of {}",
                    allowed.join(", ")
                )
            })
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

/// Transcription check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifyConfig {
    pub model: PathBuf,
    pub languages: Vec<String>,
    pub threads: Option<usize>,
}

/// Batch packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub audio_size_limit_mb: u64,
    /// Without offload: end the run once the resident batch is full
    pub stop_when_full: bool,
    pub merge_group_size: usize,
}

/// Resume configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ResumeConfig {
    pub strategy: ResumeStrategyKind,
}

/// How the resume watermark is derived
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResumeStrategyKind {
    /// Ledger watermark only
    Log,
    /// Ledger watermark reconciled with artifacts and the upload marker
    #[default]
    LogAndDisk,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

/// Log line format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: SourceFormat::Auto,
            max_fragment_chars: defaults::MAX_FRAGMENT_CHARS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
            temp_dir: None,
            ledger_file: None,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::SPEECH_ENDPOINT.to_string(),
            voice: defaults::DEFAULT_VOICE.to_string(),
            style: defaults::DEFAULT_STYLE.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            voices: builtin_voices(),
            styles: builtin_styles(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::default(),
            min_size_kb: defaults::MIN_SIZE_KB,
            max_size_kb: defaults::MAX_SIZE_KB,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            silence_offset_db: defaults::SILENCE_OFFSET_DB,
            pause_ms: defaults::PAUSE_MS,
            keep_silence_ms: defaults::KEEP_SILENCE_MS,
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            model: default_model_path(),
            languages: defaults::ACCEPTED_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            threads: None,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            audio_size_limit_mb: defaults::AUDIO_SIZE_LIMIT_MB,
            stop_when_full: false,
            merge_group_size: defaults::MERGE_GROUP_SIZE,
        }
    }
}

/// Whisper model location under the user's cache directory.
fn default_model_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("bookvoice")
        .join("models")
        .join("ggml-tiny.bin")
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only when the file is missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(BookvoiceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BOOKVOICE_SOURCE → source.path
    /// - BOOKVOICE_OUTPUT_DIR → output.dir
    /// - BOOKVOICE_VOICE → synthesis.voice
    /// - BOOKVOICE_STYLE → synthesis.style
    /// - BOOKVOICE_WHISPER_MODEL → verify.model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(source) = std::env::var("BOOKVOICE_SOURCE")
            && !source.is_empty()
        {
            self.source.path = Some(PathBuf::from(source));
        }

        if let Ok(dir) = std::env::var("BOOKVOICE_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.dir = PathBuf::from(dir);
        }

        if let Ok(voice) = std::env::var("BOOKVOICE_VOICE")
            && !voice.is_empty()
        {
            self.synthesis.voice = voice;
        }

        if let Ok(style) = std::env::var("BOOKVOICE_STYLE")
            && !style.is_empty()
        {
            self.synthesis.style = style;
        }

        if let Ok(model) = std::env::var("BOOKVOICE_WHISPER_MODEL")
            && !model.is_empty()
        {
            self.verify.model = PathBuf::from(model);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/bookvoice/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("bookvoice")
            .join("config.toml")
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| BookvoiceError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.source.max_fragment_chars == 0 {
            return Err(invalid("source.max_fragment_chars", "must be positive"));
        }
        if self.audio.min_size_kb > self.audio.max_size_kb {
            return Err(invalid(
                "audio.min_size_kb",
                "must not exceed audio.max_size_kb",
            ));
        }
        if self.batch.audio_size_limit_mb == 0 {
            return Err(invalid("batch.audio_size_limit_mb", "must be positive"));
        }
        if self.batch.merge_group_size == 0 {
            return Err(invalid("batch.merge_group_size", "must be positive"));
        }
        if self.synthesis.voices.is_empty() {
            return Err(invalid("synthesis.voices", "must list at least one voice"));
        }
        if self.synthesis.styles.is_empty() {
            return Err(invalid("synthesis.styles", "must list at least one style"));
        }
        if self.verify.languages.is_empty() {
            return Err(invalid(
                "verify.languages",
                "must list at least one language",
            ));
        }
        if self.synthesis.request_timeout_secs == 0 {
            return Err(invalid("synthesis.request_timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Source path, or an error when none was configured.
    pub fn source_path(&self) -> Result<&Path> {
        self.source
            .path
            .as_deref()
            .ok_or_else(|| BookvoiceError::ConfigInvalidValue {
                key: "source.path".to_string(),
                message: "no source document given (pass SOURCE or set source.path)"
                    .to_string(),
            })
    }

    /// Book name: the source file stem, used for the ledger and archive names.
    pub fn book_name(&self) -> String {
        self.source
            .path
            .as_deref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("book")
            .to_string()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.output
            .temp_dir
            .clone()
            .unwrap_or_else(|| self.output.dir.join(defaults::TEMP_DIR_NAME))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output.ledger_file.clone().unwrap_or_else(|| {
            self.output
                .dir
                .join(format!("{}.ledger.jsonl", self.book_name()))
        })
    }

    /// Look up a value by dotted key path (e.g. `audio.min_size_kb`).
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = toml::Value::try_from(self).map_err(|e| BookvoiceError::Other(e.to_string()))?;
        let mut current = &root;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| BookvoiceError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "unknown key".to_string(),
                })?;
        }
        Ok(match current {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Render the full configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BookvoiceError::Other(e.to_string()))
    }
}
