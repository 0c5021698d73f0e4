//! The output area: artifact naming, existence checks, writes and disk scans.
//!
//! One durable artifact per fragment index: `{index:05}.wav` for accepted
//! audio or `{index:05}.txt` carrying the fragment text. Merged range files
//! `{first:05}-{last:05} (voice, style).wav` are presentation only.

use crate::defaults;
use crate::error::{BookvoiceError, Result};
use crate::tts::backend::AudioMime;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// SAFETY: hardcoded patterns, always valid
#[allow(clippy::expect_used)]
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(wav|txt)$").expect("hardcoded artifact pattern"));
#[allow(clippy::expect_used)]
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)-(\d+)(?: \([^)]*\))?\.wav$").expect("hardcoded range pattern")
});
#[allow(clippy::expect_used)]
static TEMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-tmp\.(wav|mp3)$").expect("hardcoded temp pattern"));

/// Zero-padded index as used in file names.
pub fn padded(index: usize) -> String {
    format!("{:0width$}", index, width = defaults::INDEX_WIDTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Audio,
    Text,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "wav",
            ArtifactKind::Text => "txt",
        }
    }
}

/// A durable per-index outcome on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedArtifact {
    pub index: usize,
    /// Last index covered; differs from `index` only for merged ranges.
    pub last_index: usize,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A merged range file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRange {
    pub first: usize,
    pub last: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl MergedRange {
    /// The range as one batch member covering `first..=last`.
    pub fn as_artifact(&self) -> AcceptedArtifact {
        AcceptedArtifact {
            index: self.first,
            last_index: self.last,
            kind: ArtifactKind::Audio,
            path: self.path.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

/// A temp take left behind by an interrupted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanTake {
    pub index: usize,
    pub mime: AudioMime,
    pub path: PathBuf,
}

/// Everything found in the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskScan {
    /// Per-index artifacts, sorted by index.
    pub artifacts: Vec<AcceptedArtifact>,
    /// Merged range files, sorted by first index.
    pub merged: Vec<MergedRange>,
}

impl DiskScan {
    /// Highest settled index on disk; merged ranges count by their last index.
    pub fn highest_index(&self) -> usize {
        let single = self.artifacts.iter().map(|a| a.index).max().unwrap_or(0);
        let merged = self.merged.iter().map(|m| m.last).max().unwrap_or(0);
        single.max(merged)
    }
}

/// Highest archived index, written after each verified upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMarker {
    pub last_index: usize,
    pub archive: String,
    pub remote_file_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Output directory layout for one book.
#[derive(Debug, Clone)]
pub struct OutputArea {
    dir: PathBuf,
    temp_dir: PathBuf,
    archive_dir: PathBuf,
}

impl OutputArea {
    pub fn new(dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let archive_dir = dir.join(defaults::ARCHIVE_DIR_NAME);
        Self {
            dir,
            temp_dir: temp_dir.into(),
            archive_dir,
        }
    }

    /// Create the output, temp and archive directories.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.dir, &self.temp_dir, &self.archive_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                BookvoiceError::Other(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn artifact_path(&self, index: usize, kind: ArtifactKind) -> PathBuf {
        self.dir
            .join(format!("{}.{}", padded(index), kind.extension()))
    }

    pub fn temp_take_path(&self, index: usize, mime: AudioMime) -> PathBuf {
        self.temp_dir
            .join(format!("{}-tmp.{}", padded(index), mime.extension()))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(defaults::UPLOAD_MARKER_FILE)
    }

    /// The artifact already settled for `index`, if any.
    pub fn existing(&self, index: usize) -> Option<AcceptedArtifact> {
        [ArtifactKind::Audio, ArtifactKind::Text]
            .into_iter()
            .find_map(|kind| {
                let path = self.artifact_path(index, kind);
                let meta = fs::metadata(&path).ok()?;
                Some(AcceptedArtifact {
                    index,
                    last_index: index,
                    kind,
                    path,
                    size_bytes: meta.len(),
                })
            })
    }

    pub fn write_audio(&self, index: usize, wav: &[u8]) -> Result<AcceptedArtifact> {
        self.write_artifact(index, ArtifactKind::Audio, wav)
    }

    pub fn write_text(&self, index: usize, text: &str) -> Result<AcceptedArtifact> {
        self.write_artifact(index, ArtifactKind::Text, text.as_bytes())
    }

    /// Write through a partial file and rename, so a kill never leaves a
    /// truncated artifact under its final name.
    fn write_artifact(
        &self,
        index: usize,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> Result<AcceptedArtifact> {
        let path = self.artifact_path(index, kind);
        let partial = path.with_extension(format!("{}.partial", kind.extension()));
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &path)?;
        Ok(AcceptedArtifact {
            index,
            last_index: index,
            kind,
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Write a temp take and return its path.
    pub fn write_temp_take(&self, index: usize, mime: AudioMime, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.temp_take_path(index, mime);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Remove any temp takes for `index`.
    pub fn clear_temp(&self, index: usize) {
        for mime in [AudioMime::Wav, AudioMime::Mpeg] {
            let path = self.temp_take_path(index, mime);
            if path.exists()
                && let Err(e) = fs::remove_file(&path)
            {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp take");
            }
        }
    }

    /// Scan the output directory for artifacts and merged ranges.
    pub fn scan(&self) -> Result<DiskScan> {
        let mut scan = DiskScan::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(scan),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if let Some(caps) = SINGLE_RE.captures(name) {
                let Ok(index) = caps[1].parse::<usize>() else {
                    continue;
                };
                let kind = if &caps[2] == "wav" {
                    ArtifactKind::Audio
                } else {
                    ArtifactKind::Text
                };
                scan.artifacts.push(AcceptedArtifact {
                    index,
                    last_index: index,
                    kind,
                    path: entry.path(),
                    size_bytes: entry.metadata()?.len(),
                });
            } else if let Some(caps) = RANGE_RE.captures(name) {
                let (Ok(first), Ok(last)) = (caps[1].parse::<usize>(), caps[2].parse::<usize>())
                else {
                    continue;
                };
                scan.merged.push(MergedRange {
                    first,
                    last,
                    path: entry.path(),
                    size_bytes: entry.metadata()?.len(),
                });
            }
        }

        scan.artifacts.sort_by_key(|a| (a.index, a.kind.extension()));
        scan.merged.sort_by_key(|m| m.first);
        Ok(scan)
    }

    /// Temp takes left behind by an interrupted run, sorted by index.
    pub fn orphan_takes(&self) -> Result<Vec<OrphanTake>> {
        let entries = match fs::read_dir(&self.temp_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut orphans = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(caps) = name.to_str().and_then(|n| TEMP_RE.captures(n)) else {
                continue;
            };
            let (Ok(index), Some(mime)) = (
                caps[1].parse::<usize>(),
                AudioMime::from_extension(&caps[2]),
            ) else {
                continue;
            };
            orphans.push(OrphanTake {
                index,
                mime,
                path: entry.path(),
            });
        }
        orphans.sort_by_key(|o| o.index);
        Ok(orphans)
    }

    /// Read the upload marker. Missing or unreadable markers count as none.
    pub fn read_marker(&self) -> Option<UploadMarker> {
        let path = self.marker_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed upload marker");
                None
            }
        }
    }

    pub fn write_marker(&self, marker: &UploadMarker) -> Result<()> {
        let json = serde_json::to_string_pretty(marker)
            .map_err(|e| BookvoiceError::Other(format!("Failed to encode upload marker: {e}")))?;
        let path = self.marker_path();
        let partial = path.with_extension("json.partial");
        fs::write(&partial, json)?;
        fs::rename(&partial, &path)?;
        Ok(())
    }

    /// Remove the temp directory and everything in it.
    pub fn remove_temp_dir(&self) -> Result<()> {
        match fs::remove_dir_all(&self.temp_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn area(dir: &TempDir) -> OutputArea {
        let area = OutputArea::new(dir.path(), dir.path().join("TEMP_audio"));
        area.ensure().unwrap();
        area
    }

    #[test]
    fn artifact_names_are_zero_padded() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        assert!(
            area.artifact_path(7, ArtifactKind::Audio)
                .ends_with("00007.wav")
        );
        assert!(
            area.temp_take_path(42, AudioMime::Mpeg)
                .ends_with("TEMP_audio/00042-tmp.mp3")
        );
    }

    #[test]
    fn existing_finds_either_kind() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        assert!(area.existing(3).is_none());

        area.write_text(3, "fallback").unwrap();
        let found = area.existing(3).unwrap();
        assert_eq!(found.kind, ArtifactKind::Text);
        assert_eq!(found.size_bytes, 8);
    }

    #[test]
    fn write_leaves_no_partial_files() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.write_audio(1, b"RIFF").unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.contains("partial"))
            .collect();
        assert!(names.is_empty(), "left partial files: {names:?}");
    }

    #[test]
    fn scan_reads_artifacts_and_ranges() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.write_audio(12, b"wav").unwrap();
        area.write_text(13, "text").unwrap();
        fs::write(dir.path().join("00001-00010 (Alloy, Calm).wav"), b"merged").unwrap();
        fs::write(dir.path().join("notes.md"), b"ignored").unwrap();

        let scan = area.scan().unwrap();
        assert_eq!(
            scan.artifacts.iter().map(|a| a.index).collect::<Vec<_>>(),
            vec![12, 13]
        );
        assert_eq!(scan.merged.len(), 1);
        assert_eq!(scan.merged[0].first, 1);
        assert_eq!(scan.merged[0].last, 10);
        assert_eq!(scan.highest_index(), 13);
    }

    #[test]
    fn merged_range_counts_by_last_index() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.write_audio(3, b"wav").unwrap();
        fs::write(dir.path().join("00011-00020 (MERGED, MERGED).wav"), b"m").unwrap();
        assert_eq!(area.scan().unwrap().highest_index(), 20);
    }

    #[test]
    fn orphan_takes_are_listed_by_index() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.write_temp_take(9, AudioMime::Mpeg, b"mp3").unwrap();
        area.write_temp_take(2, AudioMime::Wav, b"wav").unwrap();
        fs::write(area.temp_dir().join("00003-edited.wav"), b"x").unwrap();

        let orphans = area.orphan_takes().unwrap();
        assert_eq!(orphans.len(), 2);
        assert_eq!(orphans[0].index, 2);
        assert_eq!(orphans[0].mime, AudioMime::Wav);
        assert_eq!(orphans[1].mime, AudioMime::Mpeg);
    }

    #[test]
    fn clear_temp_removes_takes_for_index() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        let path = area.write_temp_take(5, AudioMime::Wav, b"wav").unwrap();
        area.clear_temp(5);
        assert!(!path.exists());
    }

    #[test]
    fn marker_round_trip_and_malformed() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        assert!(area.read_marker().is_none());

        let marker = UploadMarker {
            last_index: 40,
            archive: "book_00031-00040.tar.gz".to_string(),
            remote_file_id: "id-1".to_string(),
            timestamp: Utc::now(),
        };
        area.write_marker(&marker).unwrap();
        assert_eq!(area.read_marker().unwrap(), marker);

        fs::write(area.marker_path(), "{not json").unwrap();
        assert!(area.read_marker().is_none());
    }

    #[test]
    fn remove_temp_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let area = area(&dir);
        area.remove_temp_dir().unwrap();
        assert!(!area.temp_dir().exists());
        area.remove_temp_dir().unwrap();
    }
}
