//! Offload strategies: what happens to a full batch.

use crate::error::{BookvoiceError, Result};
use crate::pipeline::artifacts::{AcceptedArtifact, OutputArea, UploadMarker};
use crate::store::RemoteStore;
use crate::store::archive::{self, Archive};
use chrono::Utc;
use std::sync::Arc;

/// Result of handing a batch to an offloader.
#[derive(Debug)]
pub enum OffloadReport {
    /// Offload disabled; artifacts stay on disk.
    Kept,
    /// Archive uploaded and verified; local archive and members deleted.
    Uploaded { archive: Archive, file_id: String },
    /// Packaging or upload failed; whatever was produced stays on disk.
    Failed {
        archive: Option<Archive>,
        error: BookvoiceError,
    },
}

#[async_trait::async_trait]
pub trait Offloader: Send + Sync {
    /// Whether batches are ever packaged.
    fn enabled(&self) -> bool;

    async fn offload(&self, batch: &[AcceptedArtifact]) -> OffloadReport;
}

/// Keep everything on local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOffload;

#[async_trait::async_trait]
impl Offloader for NoOffload {
    fn enabled(&self) -> bool {
        false
    }

    async fn offload(&self, _batch: &[AcceptedArtifact]) -> OffloadReport {
        OffloadReport::Kept
    }
}

/// Package, upload, verify, then reclaim local disk.
pub struct RemoteOffload {
    store: Arc<dyn RemoteStore>,
    area: OutputArea,
    book: String,
}

impl RemoteOffload {
    pub fn new(store: Arc<dyn RemoteStore>, area: OutputArea, book: &str) -> Self {
        Self {
            store,
            area,
            book: book.to_string(),
        }
    }

    async fn upload(&self, archive: &Archive) -> Result<String> {
        let auth = self.store.authorize().await?;
        let target = self.store.get_upload_target(&auth).await?;
        let bytes = std::fs::read(&archive.path)?;
        let remote_name = archive.file_name();
        let receipt = self
            .store
            .upload(&target, bytes, &remote_name, &archive.sha1)
            .await?;

        if receipt.remote_size != archive.size_bytes {
            return Err(BookvoiceError::StoreSizeMismatch {
                remote_name,
                local: archive.size_bytes,
                remote: receipt.remote_size,
            });
        }
        Ok(receipt.file_id)
    }

    fn reclaim(&self, archive: &Archive) {
        for path in archive
            .members
            .iter()
            .map(|m| &m.path)
            .chain(std::iter::once(&archive.path))
        {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded file");
            }
        }
        self.remove_superseded(archive);
    }

    /// Drop archives left by failed uploads whose range overlaps `uploaded`.
    /// Their members are gone now; anything not overlapping is still
    /// pending and gets repackaged on retry.
    fn remove_superseded(&self, uploaded: &Archive) {
        let Ok(entries) = std::fs::read_dir(self.area.archive_dir()) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path == uploaded.path {
                continue;
            }
            let Some((first, last)) = entry
                .file_name()
                .to_str()
                .and_then(|name| archive::parse_archive_name(&self.book, name))
            else {
                continue;
            };
            if first > uploaded.last_index || last < uploaded.first_index {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::info!(archive = %path.display(), "Removed superseded archive"),
                Err(e) => {
                    tracing::warn!(archive = %path.display(), error = %e, "Failed to remove superseded archive");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Offloader for RemoteOffload {
    fn enabled(&self) -> bool {
        true
    }

    async fn offload(&self, batch: &[AcceptedArtifact]) -> OffloadReport {
        let archive = match archive::package(batch, self.area.archive_dir(), &self.book) {
            Ok(archive) => archive,
            Err(error) => {
                tracing::error!(error = %error, "Failed to package batch");
                return OffloadReport::Failed {
                    archive: None,
                    error,
                };
            }
        };

        match self.upload(&archive).await {
            Ok(file_id) => {
                let previous = self.area.read_marker().map(|m| m.last_index).unwrap_or(0);
                let marker = UploadMarker {
                    last_index: previous.max(archive.last_index),
                    archive: archive.file_name(),
                    remote_file_id: file_id.clone(),
                    timestamp: Utc::now(),
                };
                if let Err(e) = self.area.write_marker(&marker) {
                    tracing::warn!(error = %e, "Failed to write upload marker");
                }
                self.reclaim(&archive);
                tracing::info!(
                    store = self.store.name(),
                    archive = %archive.file_name(),
                    file_id = %file_id,
                    last_index = archive.last_index,
                    "Batch offloaded"
                );
                OffloadReport::Uploaded { archive, file_id }
            }
            Err(error) => {
                tracing::error!(
                    store = self.store.name(),
                    archive = %archive.path.display(),
                    error = %error,
                    "Upload failed, keeping archive and artifacts"
                );
                OffloadReport::Failed {
                    archive: Some(archive),
                    error,
                }
            }
        }
    }
}
