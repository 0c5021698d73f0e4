//! Speech synthesis backends and the voice/style catalog.

pub mod backend;
pub mod openai_fm;
pub mod voices;

pub use backend::{AudioMime, MockBackend, SpeechBackend, Take};
pub use openai_fm::OpenAiFmBackend;
