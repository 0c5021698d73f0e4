//! Resumable synthesis pipeline.
//!
//! Fragments are settled strictly in index order. Each settled fragment
//! leaves exactly one durable artifact in the output area and one ledger
//! line; batches of resident artifacts are packaged and offloaded once
//! they grow past the configured size.

pub mod artifacts;
pub mod batch;
pub mod controller;
pub mod ledger;
pub mod merge;
pub mod recovery;
pub mod resume;
pub mod synthesizer;

pub use artifacts::{AcceptedArtifact, ArtifactKind, OutputArea};
pub use batch::{BatchAccumulator, BatchPackager};
pub use controller::{
    LogProgress, Pipeline, PipelineSettings, ProgressReporter, RunSummary, StatusReport, status,
};
pub use ledger::{Ledger, LedgerRecord, Outcome};
pub use merge::merge_resident;
pub use resume::{ResumeStrategy, strategy_for};
pub use synthesizer::{SynthesisOutcome, SynthesisSettings, Synthesizer};
