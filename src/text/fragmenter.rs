//! Sentence-aligned text segmentation.
//!
//! Fragments are identified by position only, so segmentation must be a
//! pure function of the text and the maximum length.

use crate::error::{BookvoiceError, Result};

/// Characters that end a sentence.
const TERMINALS: &[char] = &['.', '!', '?', '…'];

/// One synthesis unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1-based position in the document.
    pub index: usize,
    pub text: String,
}

impl Fragment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.text.len()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into fragments of at most `max_length` characters.
///
/// Each window is cut right after the last sentence terminal inside it, or
/// at `max_length` when it holds none. Fragments are trimmed; fragments
/// that are empty after trimming are dropped without taking an index.
pub fn segment(text: &str, max_length: usize) -> Result<Vec<Fragment>> {
    if max_length == 0 {
        return Err(BookvoiceError::ConfigInvalidValue {
            key: "source.max_fragment_chars".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let window_end = start.saturating_add(max_length);
        let end = if window_end >= chars.len() {
            chars.len()
        } else {
            chars[start..window_end]
                .iter()
                .rposition(|c| TERMINALS.contains(c))
                .map(|pos| start + pos + 1)
                .unwrap_or(window_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            fragments.push(Fragment::new(fragments.len() + 1, trimmed));
        }
        start = end;
    }

    Ok(fragments)
}
