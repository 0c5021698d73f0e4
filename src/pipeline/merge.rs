//! Presentation merge of resident audio into range files.

use crate::audio::wav::{encode_wav, read_wav_file};
use crate::error::Result;
use crate::pipeline::artifacts::{AcceptedArtifact, ArtifactKind, MergedRange, OutputArea, padded};
use crate::pipeline::ledger::{LedgerRecord, accepted_record};
use std::fs;

const UNKNOWN_LABEL: &str = "MERGED";

/// `{first:05}-{last:05} ({voice}, {style}).wav`
pub fn merged_name(first: usize, last: usize, voice: &str, style: &str) -> String {
    format!("{}-{} ({voice}, {style}).wav", padded(first), padded(last))
}

/// Consecutive runs of `group_size` contiguous audio artifacts. A text
/// artifact or a gap breaks the run.
pub fn plan_groups(artifacts: &[AcceptedArtifact], group_size: usize) -> Vec<Vec<AcceptedArtifact>> {
    let mut groups = Vec::new();
    if group_size == 0 {
        return groups;
    }

    let mut current: Vec<AcceptedArtifact> = Vec::with_capacity(group_size);
    for artifact in artifacts {
        let contiguous = current
            .last()
            .is_none_or(|prev| artifact.index == prev.index + 1);
        if artifact.kind != ArtifactKind::Audio {
            current.clear();
            continue;
        }
        if !contiguous {
            current.clear();
        }
        current.push(artifact.clone());
        if current.len() == group_size {
            groups.push(std::mem::take(&mut current));
        }
    }
    groups
}

/// Merge resident audio in groups of `group_size`, labelled by the ledger
/// record of each group's first index. Sources are deleted once the range
/// file is written.
pub fn merge_resident(
    area: &OutputArea,
    records: &[LedgerRecord],
    group_size: usize,
) -> Result<Vec<MergedRange>> {
    let scan = area.scan()?;
    let mut merged = Vec::new();

    for group in plan_groups(&scan.artifacts, group_size) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let (first, last) = (first.index, last.index);

        let record = accepted_record(records, first);
        let voice = record
            .and_then(|r| r.voice.as_deref())
            .unwrap_or(UNKNOWN_LABEL);
        let style = record
            .and_then(|r| r.style.as_deref())
            .unwrap_or(UNKNOWN_LABEL);

        let mut combined = read_wav_file(&group[0].path)?;
        for member in &group[1..] {
            combined.append(&read_wav_file(&member.path)?);
        }
        let wav = encode_wav(&combined)?;

        let path = area.dir().join(merged_name(first, last, voice, style));
        let partial = path.with_extension("wav.partial");
        fs::write(&partial, &wav)?;
        fs::rename(&partial, &path)?;

        for member in &group {
            if let Err(e) = fs::remove_file(&member.path) {
                tracing::warn!(path = %member.path.display(), error = %e, "Failed to remove merged source");
            }
        }

        tracing::info!(first, last, voice, style, path = %path.display(), "Merged range");
        merged.push(MergedRange {
            first,
            last,
            path,
            size_bytes: wav.len() as u64,
        });
    }

    Ok(merged)
}
