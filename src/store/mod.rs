//! Remote object storage for completed batches.

pub mod archive;
pub mod b2;
pub mod offload;

use crate::error::{BookvoiceError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Session credentials returned by [`RemoteStore::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub api_url: String,
    pub token: String,
}

/// Upload endpoint returned by [`RemoteStore::get_upload_target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub upload_url: String,
    pub token: String,
}

/// What the store reports after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub remote_size: u64,
    pub file_id: String,
}

/// Object store with an authorize → upload-target → upload sequence.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    async fn authorize(&self) -> Result<Authorization>;

    async fn get_upload_target(&self, auth: &Authorization) -> Result<UploadTarget>;

    async fn upload(
        &self,
        target: &UploadTarget,
        bytes: Vec<u8>,
        remote_name: &str,
        sha1: &str,
    ) -> Result<UploadReceipt>;

    fn name(&self) -> &str;
}

/// Stage at which a [`MemoryStore`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Authorize,
    UploadTarget,
    Upload,
}

/// One object held by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub bytes: Vec<u8>,
    pub sha1: String,
}

/// In-memory store for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    fail_at: Option<FailAt>,
    /// Remaining failures at `fail_at`; unlimited when `None`.
    failures_left: Option<Arc<AtomicUsize>>,
    truncate_by: u64,
    objects: Arc<Mutex<Vec<StoredObject>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail at `stage` on every call.
    pub fn with_failure(mut self, stage: FailAt) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Fail at `stage` for the first `times` calls, then succeed.
    /// Clones share the remaining count.
    pub fn with_failures(mut self, stage: FailAt, times: usize) -> Self {
        self.fail_at = Some(stage);
        self.failures_left = Some(Arc::new(AtomicUsize::new(times)));
        self
    }

    /// Report a remote size `bytes` smaller than what was sent.
    pub fn with_short_size(mut self, bytes: u64) -> Self {
        self.truncate_by = bytes;
        self
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn check(&self, stage: FailAt) -> Result<()> {
        if self.fail_at != Some(stage) {
            return Ok(());
        }
        if let Some(left) = &self.failures_left
            && left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            return Ok(());
        }
        let message = format!("mock {stage:?} failure");
        Err(match stage {
            FailAt::Authorize => BookvoiceError::StoreAuthorization { message },
            FailAt::UploadTarget | FailAt::Upload => BookvoiceError::StoreUpload { message },
        })
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn authorize(&self) -> Result<Authorization> {
        self.check(FailAt::Authorize)?;
        Ok(Authorization {
            api_url: "memory://api".to_string(),
            token: "auth-token".to_string(),
        })
    }

    async fn get_upload_target(&self, _auth: &Authorization) -> Result<UploadTarget> {
        self.check(FailAt::UploadTarget)?;
        Ok(UploadTarget {
            upload_url: "memory://upload".to_string(),
            token: "upload-token".to_string(),
        })
    }

    async fn upload(
        &self,
        _target: &UploadTarget,
        bytes: Vec<u8>,
        remote_name: &str,
        sha1: &str,
    ) -> Result<UploadReceipt> {
        self.check(FailAt::Upload)?;
        let remote_size = (bytes.len() as u64).saturating_sub(self.truncate_by);
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| BookvoiceError::StoreUpload {
                message: format!("store lock poisoned: {e}"),
            })?;
        objects.push(StoredObject {
            name: remote_name.to_string(),
            bytes,
            sha1: sha1.to_string(),
        });
        Ok(UploadReceipt {
            remote_size,
            file_id: format!("mem-{}", objects.len()),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
