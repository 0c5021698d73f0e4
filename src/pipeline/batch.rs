//! Resident batch tracking and flush policy.

use crate::error::Result;
use crate::pipeline::artifacts::{AcceptedArtifact, OutputArea};
use crate::store::offload::{OffloadReport, Offloader};
use std::collections::BTreeMap;
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

/// Artifacts on disk that have not been archived yet.
#[derive(Debug, Clone, Default)]
pub struct BatchAccumulator {
    members: BTreeMap<usize, AcceptedArtifact>,
    total_bytes: u64,
    limit_bytes: u64,
}

impl BatchAccumulator {
    pub fn new(limit_mb: u64) -> Self {
        Self {
            members: BTreeMap::new(),
            total_bytes: 0,
            limit_bytes: limit_mb.saturating_mul(MIB),
        }
    }

    /// Seed from everything resident in the output directory.
    ///
    /// A verified upload deletes its members, so any artifact or merged
    /// range still on disk has never been archived, whatever the marker says.
    pub fn seed_from_disk(&mut self, area: &OutputArea) -> Result<usize> {
        let scan = area.scan()?;
        let before = self.members.len();
        let ranges = scan.merged.iter().map(|m| m.as_artifact());
        for artifact in scan.artifacts.into_iter().chain(ranges) {
            self.on_artifact_accepted(artifact);
        }
        Ok(self.members.len() - before)
    }

    /// Register a settled artifact. Re-registering an index replaces it.
    pub fn on_artifact_accepted(&mut self, artifact: AcceptedArtifact) {
        let size = artifact.size_bytes;
        if let Some(previous) = self.members.insert(artifact.index, artifact) {
            self.total_bytes = self.total_bytes.saturating_sub(previous.size_bytes);
        }
        self.total_bytes += size;
    }

    pub fn is_full(&self) -> bool {
        self.total_bytes >= self.limit_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Drain members in index order.
    pub fn take(&mut self) -> Vec<AcceptedArtifact> {
        self.total_bytes = 0;
        std::mem::take(&mut self.members).into_values().collect()
    }
}

/// Couples the accumulator with an offload strategy.
pub struct BatchPackager {
    acc: BatchAccumulator,
    offloader: Arc<dyn Offloader>,
}

impl BatchPackager {
    pub fn new(acc: BatchAccumulator, offloader: Arc<dyn Offloader>) -> Self {
        Self { acc, offloader }
    }

    pub fn offload_enabled(&self) -> bool {
        self.offloader.enabled()
    }

    pub fn on_artifact_accepted(&mut self, artifact: AcceptedArtifact) {
        self.acc.on_artifact_accepted(artifact);
    }

    pub fn is_full(&self) -> bool {
        self.acc.is_full()
    }

    pub fn resident(&self) -> &BatchAccumulator {
        &self.acc
    }

    /// Flush only once the threshold is reached.
    pub async fn maybe_flush(&mut self) -> Option<OffloadReport> {
        if !self.acc.is_full() {
            return None;
        }
        self.flush().await
    }

    /// Flush whatever is resident. With offload disabled the batch is kept.
    ///
    /// A failed offload still empties the in-memory batch; the next run
    /// seeds it again from disk.
    pub async fn flush(&mut self) -> Option<OffloadReport> {
        if !self.offloader.enabled() || self.acc.is_empty() {
            return None;
        }
        tracing::info!(
            members = self.acc.len(),
            bytes = self.acc.total_bytes(),
            "Flushing batch"
        );
        let members = self.acc.take();
        Some(self.offloader.offload(&members).await)
    }
}
