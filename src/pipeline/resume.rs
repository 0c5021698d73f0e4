//! Resume strategies: how the watermark of settled fragments is derived.

use crate::config::ResumeStrategyKind;
use crate::error::Result;
use crate::pipeline::artifacts::OutputArea;
use crate::pipeline::ledger;
use std::path::PathBuf;

/// What a strategy may consult.
#[derive(Debug, Clone)]
pub struct ResumeContext<'a> {
    pub ledger_paths: &'a [PathBuf],
    pub area: &'a OutputArea,
}

/// Derives the highest settled fragment index. Processing resumes at the
/// next index.
pub trait ResumeStrategy: Send + Sync {
    fn resume_index(&self, ctx: &ResumeContext<'_>) -> Result<usize>;

    fn name(&self) -> &'static str;
}

/// Trust the ledger only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWatermark;

impl ResumeStrategy for LogWatermark {
    fn resume_index(&self, ctx: &ResumeContext<'_>) -> Result<usize> {
        ledger::resume_index(ctx.ledger_paths)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Reconcile the ledger with artifacts on disk and the upload marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndDisk;

impl ResumeStrategy for LogAndDisk {
    fn resume_index(&self, ctx: &ResumeContext<'_>) -> Result<usize> {
        let from_log = ledger::resume_index(ctx.ledger_paths)?;
        let from_disk = ctx.area.scan()?.highest_index();
        let from_marker = ctx.area.read_marker().map(|m| m.last_index).unwrap_or(0);

        tracing::debug!(from_log, from_disk, from_marker, "Resume sources");
        Ok(from_log.max(from_disk).max(from_marker))
    }

    fn name(&self) -> &'static str {
        "log_and_disk"
    }
}

pub fn strategy_for(kind: ResumeStrategyKind) -> Box<dyn ResumeStrategy> {
    match kind {
        ResumeStrategyKind::Log => Box::new(LogWatermark),
        ResumeStrategyKind::LogAndDisk => Box::new(LogAndDisk),
    }
}
