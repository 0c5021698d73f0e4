//! Voice list and style catalog.
//!
//! A style is a named list of prompt lines sent to the speech endpoint as a
//! single prompt. The sweep in the synthesizer walks voices × styles in the
//! order given here.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// A named speaking style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleDef {
    pub name: String,
    pub lines: Vec<String>,
}

impl StyleDef {
    pub fn new(name: &str, lines: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Prompt text: lines separated by a blank line.
    pub fn prompt(&self) -> String {
        self.lines.join("\n\n")
    }
}

const VOICES: &[&str] = &[
    "Alloy", "Ash", "Ballad", "Coral", "Echo", "Fable", "Onyx", "Nova", "Sage", "Shimmer", "Verse",
];

/// Voices offered by the speech endpoint.
pub fn builtin_voices() -> Vec<String> {
    VOICES.iter().map(|v| v.to_string()).collect()
}

/// Default style catalog.
pub fn builtin_styles() -> Vec<StyleDef> {
    vec![
        StyleDef::new(
            "Calm",
            &[
                "Emotion: Sincere empathy, quiet confidence.",
                "Emphasis: Highlight the key thoughts.",
            ],
        ),
        StyleDef::new(
            "Energetic",
            &[
                "Emotion: Bright, energetic tone.",
                "Emphasis: Highlight emotionally charged words.",
            ],
        ),
        StyleDef::new(
            "Storyteller",
            &[
                "Emotion: Expressive and immersive, following the mood of the scene.",
                "Emphasis: Highlight names, places and turning points.",
            ],
        ),
        StyleDef::new(
            "Serene",
            &[
                "Emotion: Warmth and unhurried calm.",
                "Emphasis: Highlight the key images.",
            ],
        ),
        StyleDef::new(
            "Sincere",
            &[
                "Emotion: Calm reassurance.",
                "Pacing: Slow during the important passages.",
            ],
        ),
        StyleDef::new(
            "Reflective",
            &[
                "Emotion: Meditative, thoughtful.",
                "Emphasis: Pause after questions.",
            ],
        ),
        StyleDef::new(
            "News_Anchor",
            &[
                "Emotion: Impartial and clear.",
                "Emphasis: Highlight facts and numbers.",
            ],
        ),
        StyleDef::new(
            "Librarian",
            &[
                "Emotion: Soft-spoken, precise.",
                "Emphasis: Highlight the key information.",
            ],
        ),
    ]
}

/// Prompt for a style name, or the neutral fallback prompt.
pub fn style_prompt(styles: &[StyleDef], name: &str) -> String {
    styles
        .iter()
        .find(|s| s.name == name)
        .map(StyleDef::prompt)
        .unwrap_or_else(|| defaults::FALLBACK_STYLE_PROMPT.to_string())
}

/// Ordered voice and style names for the sweep.
///
/// The starting voice and style are guaranteed to be present: if the
/// configured lists do not contain them they are prepended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSpace {
    pub voices: Vec<String>,
    pub styles: Vec<String>,
    pub start_voice: usize,
    pub start_style: usize,
}

impl SweepSpace {
    pub fn new(voices: &[String], styles: &[StyleDef], voice: &str, style: &str) -> Self {
        let mut voices = voices.to_vec();
        let start_voice = position_or_prepend(&mut voices, voice);

        let mut styles: Vec<String> = styles.iter().map(|s| s.name.clone()).collect();
        let start_style = position_or_prepend(&mut styles, style);

        Self {
            voices,
            styles,
            start_voice,
            start_style,
        }
    }

    /// Total number of (voice, style) pairs.
    pub fn len(&self) -> usize {
        self.voices.len() * self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn position_or_prepend(list: &mut Vec<String>, name: &str) -> usize {
    match list.iter().position(|v| v.eq_ignore_ascii_case(name)) {
        Some(pos) => pos,
        None => {
            list.insert(0, name.to_string());
            0
        }
    }
}
