//! Append-only resume ledger.
//!
//! One JSON object per line, one line per terminal fragment decision. The
//! resume watermark is the highest index among `accepted` records; other
//! outcomes are kept for the operator and for merge labels. Readers tolerate
//! duplicates, out-of-order indices and malformed lines.

use crate::error::{BookvoiceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Terminal decision for a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Audio artifact within the size bounds
    Accepted,
    /// Take passed verification but its size was out of bounds; text kept
    Suspicious,
    /// No voice/style pair produced an accepted take; text kept
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub timestamp: DateTime<Utc>,
    pub index: usize,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_kb: Option<f64>,
}

impl LedgerRecord {
    pub fn new(index: usize, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            index,
            outcome,
            voice: None,
            style: None,
            size_kb: None,
        }
    }

    pub fn with_take(mut self, voice: Option<&str>, style: Option<&str>, size_kb: f64) -> Self {
        self.voice = voice.map(str::to_string);
        self.style = style.map(str::to_string);
        self.size_kb = Some(size_kb);
        self
    }
}

/// Open ledger file in append mode.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    file: File,
}

impl Ledger {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ledger_err(path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ledger_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk before returning.
    pub fn append(&mut self, record: &LedgerRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(|e| ledger_err(&self.path, e))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| ledger_err(&self.path, e))
    }
}

fn ledger_err(path: &Path, e: impl std::fmt::Display) -> BookvoiceError {
    BookvoiceError::Ledger {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Read every well-formed record. A missing file has no records.
pub fn read_records(path: &Path) -> Result<Vec<LedgerRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ledger_err(path, e)),
    };

    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut line = Vec::new();
    let mut n = 0;
    loop {
        line.clear();
        if reader
            .read_until(b'\n', &mut line)
            .map_err(|e| ledger_err(path, e))?
            == 0
        {
            break;
        }
        n += 1;
        if line.trim_ascii().is_empty() {
            continue;
        }
        // Torn writes may leave invalid UTF-8; those lines are skipped too.
        match serde_json::from_slice::<LedgerRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = n,
                    error = %e,
                    "Skipping malformed ledger line"
                );
            }
        }
    }
    Ok(records)
}

/// Highest accepted index across `paths`, 0 when there is none.
pub fn resume_index<P: AsRef<Path>>(paths: &[P]) -> Result<usize> {
    let mut max = 0;
    for path in paths {
        let highest = read_records(path.as_ref())?
            .into_iter()
            .filter(|r| r.outcome == Outcome::Accepted)
            .map(|r| r.index)
            .max()
            .unwrap_or(0);
        max = max.max(highest);
    }
    Ok(max)
}

/// The most recent accepted record for `index`, if any.
pub fn accepted_record(records: &[LedgerRecord], index: usize) -> Option<&LedgerRecord> {
    records
        .iter()
        .rev()
        .find(|r| r.index == index && r.outcome == Outcome::Accepted)
}
