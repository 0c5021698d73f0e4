//! Batch packaging and offload during full runs.

use bookvoice::config::{Config, SampleRate};
use bookvoice::pipeline::artifacts::{ArtifactKind, OutputArea};
use bookvoice::pipeline::controller::{LogProgress, Pipeline, PipelineSettings, RunSummary};
use bookvoice::pipeline::ledger::read_records;
use bookvoice::pipeline::merge::merge_resident;
use bookvoice::store::offload::RemoteOffload;
use bookvoice::store::{FailAt, MemoryStore};
use bookvoice::stt::verifier::MockVerifier;
use bookvoice::tts::backend::MockBackend;
use flate2::read::GzDecoder;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const RATE: u32 = 8000;
// 409_644 bytes per take at 8 kHz: twelve stay under 5 MB, thirteen fill it.
const TAKE_MS: u32 = 25_600;
const FRAGMENTS: usize = 13;

fn config(dir: &Path, fragments: usize) -> Config {
    let source = dir.join("longbook.txt");
    let text = (1..=fragments)
        .map(|i| format!("Sentence {i:02} ends here."))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(&source, text).unwrap();

    let mut config = Config::default();
    config.source.path = Some(source);
    config.source.max_fragment_chars = 25;
    config.output.dir = dir.join("out");
    config.audio.sample_rate = SampleRate::Hz8000;
    config.audio.min_size_kb = 1;
    config.audio.max_size_kb = 1024;
    config.batch.audio_size_limit_mb = 5;
    config
}

async fn run_with(config: &Config, store: &MemoryStore) -> RunSummary {
    let settings = PipelineSettings::from_config(config).unwrap();
    let offloader = RemoteOffload::new(
        Arc::new(store.clone()),
        settings.output_area(),
        &settings.book_name,
    );
    Pipeline::new(
        settings,
        Arc::new(MockBackend::with_tone(TAKE_MS, RATE).unwrap()),
        Arc::new(MockVerifier::accepting()),
        Arc::new(offloader),
    )
    .run(&LogProgress)
    .await
    .unwrap()
}

fn area(config: &Config) -> OutputArea {
    OutputArea::new(&config.output.dir, config.temp_dir())
}

fn archive_count(area: &OutputArea) -> usize {
    std::fs::read_dir(area.archive_dir())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

fn member_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().display().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn full_batch_is_uploaded_and_reclaimed() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), FRAGMENTS);
    let store = MemoryStore::new();

    let summary = run_with(&config, &store).await;

    assert_eq!(summary.accepted, FRAGMENTS);
    assert_eq!(summary.archives_uploaded, 1);
    assert_eq!(summary.archives_failed, 0);

    let objects = store.objects();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].name.starts_with("longbook"));

    let area = area(&config);
    let marker = area.read_marker().unwrap();
    assert_eq!(marker.last_index, FRAGMENTS);
    assert_eq!(marker.archive, objects[0].name);
    assert!(area.scan().unwrap().artifacts.is_empty());
    assert_eq!(archive_count(&area), 0);
}

#[tokio::test]
async fn failed_upload_keeps_everything_until_next_run() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), FRAGMENTS);

    let broken = MemoryStore::new().with_failure(FailAt::Upload);
    let summary = run_with(&config, &broken).await;

    assert_eq!(summary.accepted, FRAGMENTS);
    assert_eq!(summary.archives_failed, 1);
    assert!(broken.objects().is_empty());

    let area = area(&config);
    assert!(area.read_marker().is_none());
    for index in 1..=FRAGMENTS {
        assert!(area.artifact_path(index, ArtifactKind::Audio).exists());
    }
    assert_eq!(std::fs::read_dir(area.archive_dir()).unwrap().count(), 1);

    // Nothing left to synthesize; the resident batch is seeded from disk and
    // shipped by the final flush.
    let working = MemoryStore::new();
    let summary = run_with(&config, &working).await;

    assert_eq!(summary.skipped, FRAGMENTS);
    assert_eq!(summary.archives_uploaded, 1);
    assert_eq!(working.objects().len(), 1);
    assert_eq!(area.read_marker().unwrap().last_index, FRAGMENTS);
    assert!(area.scan().unwrap().artifacts.is_empty());
}

#[tokio::test]
async fn batch_that_failed_before_a_later_success_is_shipped_on_rerun() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 2 * FRAGMENTS);
    let area = area(&config);

    // First batch (1-13) fails, second batch (14-26) goes through.
    let flaky = MemoryStore::new().with_failures(FailAt::Upload, 1);
    let summary = run_with(&config, &flaky).await;

    assert_eq!(summary.accepted, 2 * FRAGMENTS);
    assert_eq!(summary.archives_failed, 1);
    assert_eq!(summary.archives_uploaded, 1);
    assert_eq!(flaky.objects().len(), 1);
    assert_eq!(area.read_marker().unwrap().last_index, 2 * FRAGMENTS);
    for index in 1..=FRAGMENTS {
        assert!(area.artifact_path(index, ArtifactKind::Audio).exists());
    }
    assert!(!area.artifact_path(FRAGMENTS + 1, ArtifactKind::Audio).exists());
    assert_eq!(archive_count(&area), 1);

    // The marker already sits at 26; the resident 1-13 must still ship.
    let working = MemoryStore::new();
    let summary = run_with(&config, &working).await;

    assert_eq!(summary.skipped, 2 * FRAGMENTS);
    assert_eq!(summary.archives_uploaded, 1);
    let objects = working.objects();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].name.contains("00001-00013"));
    assert_eq!(member_names(&objects[0].bytes).len(), FRAGMENTS);
    assert_eq!(area.read_marker().unwrap().last_index, 2 * FRAGMENTS);
    assert!(area.scan().unwrap().artifacts.is_empty());
    assert_eq!(archive_count(&area), 0);
}

#[tokio::test]
async fn merged_ranges_are_archived_with_the_batch() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), 4);
    let area = area(&config);

    let broken = MemoryStore::new().with_failure(FailAt::Upload);
    let summary = run_with(&config, &broken).await;
    assert_eq!(summary.accepted, 4);
    assert_eq!(summary.archives_failed, 1);

    let records = read_records(&config.ledger_path()).unwrap();
    let merged = merge_resident(&area, &records, 2).unwrap();
    assert_eq!(merged.len(), 2);
    let scan = area.scan().unwrap();
    assert!(scan.artifacts.is_empty());
    assert_eq!(scan.merged.len(), 2);

    let working = MemoryStore::new();
    let summary = run_with(&config, &working).await;

    assert_eq!(summary.archives_uploaded, 1);
    let objects = working.objects();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].name.ends_with("_00001-00004.tar.gz"));
    let names = member_names(&objects[0].bytes);
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("00001-00002 ("));
    assert!(names[1].starts_with("00003-00004 ("));
    assert!(area.scan().unwrap().merged.is_empty());
    assert_eq!(area.read_marker().unwrap().last_index, 4);
}
