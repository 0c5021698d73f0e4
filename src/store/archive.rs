//! Batch packaging into gzip-compressed tarballs.

use crate::error::{BookvoiceError, Result};
use crate::pipeline::artifacts::{AcceptedArtifact, padded};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A packaged batch on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub first_index: usize,
    pub last_index: usize,
    /// Member artifacts, ordered by index.
    pub members: Vec<AcceptedArtifact>,
    pub size_bytes: u64,
    /// Lowercase hex SHA-1 of the archive file.
    pub sha1: String,
}

impl Archive {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn archive_err(context: &str, e: impl std::fmt::Display) -> BookvoiceError {
    BookvoiceError::Archive {
        message: format!("{context}: {e}"),
    }
}

/// `{book}_{first:05}-{last:05}.tar.gz`
pub fn archive_name(book: &str, first: usize, last: usize) -> String {
    format!("{}_{}-{}.tar.gz", book, padded(first), padded(last))
}

/// Index range of an archive named by [`archive_name`] for `book`.
pub fn parse_archive_name(book: &str, name: &str) -> Option<(usize, usize)> {
    let range = name
        .strip_prefix(book)?
        .strip_prefix('_')?
        .strip_suffix(".tar.gz")?;
    let (first, last) = range.split_once('-')?;
    Some((first.parse().ok()?, last.parse().ok()?))
}

/// Package `members` into `archive_dir`. Members are sorted by index and
/// stored under their file names.
pub fn package(
    members: &[AcceptedArtifact],
    archive_dir: &Path,
    book: &str,
) -> Result<Archive> {
    let mut members = members.to_vec();
    members.sort_by_key(|m| m.index);
    let Some(first_index) = members.first().map(|m| m.index) else {
        return Err(archive_err("Cannot package", "batch is empty"));
    };
    let last_index = members.iter().map(|m| m.last_index).max().unwrap_or(first_index);

    std::fs::create_dir_all(archive_dir)
        .map_err(|e| archive_err("Failed to create archive directory", e))?;
    let path = archive_dir.join(archive_name(book, first_index, last_index));

    let file = File::create(&path).map_err(|e| archive_err("Failed to create archive", e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for member in &members {
        let name = member
            .path
            .file_name()
            .ok_or_else(|| archive_err("Invalid member path", member.path.display()))?;
        builder
            .append_path_with_name(&member.path, name)
            .map_err(|e| archive_err(&format!("Failed to add {}", member.path.display()), e))?;
    }
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(|e| archive_err("Failed to finish archive", e))?;

    let size_bytes = std::fs::metadata(&path)?.len();
    let sha1 = sha1_file(&path)?;

    tracing::info!(
        archive = %path.display(),
        members = members.len(),
        first_index,
        last_index,
        size_bytes,
        "Batch packaged"
    );

    Ok(Archive {
        path,
        first_index,
        last_index,
        members,
        size_bytes,
        sha1,
    })
}

/// Hex SHA-1 of a file's contents.
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
