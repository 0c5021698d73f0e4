//! Source document loading.
//!
//! Plain text is read verbatim. FictionBook files keep only paragraph text:
//! every `<p>` is flattened to its text content, paragraphs are joined with
//! a single space, and markup-like punctuation the speech endpoint tends to
//! read aloud is removed.

use crate::config::SourceFormat;
use crate::error::{BookvoiceError, Result};
use quick_xml::Reader as XmlReader;
use quick_xml::events::Event;
use std::path::Path;

/// Characters removed from FictionBook text.
const UNWANTED_CHARS: &[char] = &[
    '{', '[', '*', '+', '=', '<', '>', '#', '@', '\\', '$', '&', '\'', '"', '~', '`', '/', '|',
    '(', ')', ']', '}',
];

/// Load a document and return its speakable text.
pub fn load_document(path: &Path, format: SourceFormat) -> Result<String> {
    if !path.is_file() {
        return Err(BookvoiceError::SourceNotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| BookvoiceError::SourceParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    match resolve_format(path, format) {
        SourceFormat::Fb2 => fb2_text(&content).map_err(|message| BookvoiceError::SourceParse {
            path: path.display().to_string(),
            message,
        }),
        _ => Ok(content),
    }
}

/// Pick a concrete format for `Auto` from the file extension.
pub fn resolve_format(path: &Path, format: SourceFormat) -> SourceFormat {
    match format {
        SourceFormat::Auto => match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("fb2") => SourceFormat::Fb2,
            _ => SourceFormat::Txt,
        },
        other => other,
    }
}

/// Paragraph text of a FictionBook document, cleaned.
pub fn fb2_text(xml: &str) -> std::result::Result<String, String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"p" => {
                if depth == 0 {
                    current.clear();
                }
                depth += 1;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"p" && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"p" && depth == 0 => {
                paragraphs.push(String::new());
            }
            Ok(Event::Text(ref e)) if depth > 0 => {
                let text = e
                    .unescape()
                    .map_err(|err| format!("invalid text at {}: {err}", reader.buffer_position()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(ref e)) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(strip_unwanted(&paragraphs.join(" ")))
}

fn strip_unwanted(text: &str) -> String {
    text.chars().filter(|c| !UNWANTED_CHARS.contains(c)).collect()
}
