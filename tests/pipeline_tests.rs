//! End-to-end pipeline tests: coverage, dedup, caching, resume.

use std::path::Path;
use std::time::Duration;

use docmill::config::PipelineConfig;
use docmill::progress::SilentProgress;
use docmill::store::{FileStatus, Store};
use docmill::strategies::text::{truncation_marker, MAX_LINES};
use docmill::{Pipeline, RunStats};
use tempfile::TempDir;

fn run_pipeline(input: &Path, output: &Path, cache: &Path) -> RunStats {
    let config = PipelineConfig::default()
        .with_input_root(input)
        .with_output_root(output)
        .with_cache_path(cache)
        .with_timeout(Duration::from_secs(30));
    Pipeline::new(config).run(&SilentProgress).unwrap()
}

/// Body of an artifact, without the front matter block.
fn artifact_body(path: &Path) -> String {
    let content = std::fs::read_to_string(path).unwrap();
    let after = content
        .strip_prefix("---\n")
        .and_then(|rest| rest.split_once("---\n\n"))
        .map(|(_, body)| body.to_string());
    after.unwrap_or(content)
}

#[test]
fn test_mixed_tree_gets_full_coverage() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("readme.md"), "# Title\n\nBody.\n").unwrap();
    std::fs::write(input.path().join("data.bin"), [0u8, 1, 2, 3, 0xFF]).unwrap();
    std::fs::create_dir_all(input.path().join("nested/deep")).unwrap();
    std::fs::write(input.path().join("nested/deep/notes.txt"), "deep notes").unwrap();

    let cache = output.path().join("cache.db");
    let stats = run_pipeline(input.path(), output.path(), &cache);

    // Three inputs, three artifacts, plus the run summary.
    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.failed, 0);
    assert!(output.path().join("readme.md.md").exists());
    assert!(output.path().join("data.bin.md").exists());
    assert!(output.path().join("nested/deep/notes.txt.md").exists());
    assert!(output.path().join("_ingest_summary.md").exists());
}

#[test]
fn test_unknown_binary_gets_placeholder_body() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("blob.bin"), vec![0x7Fu8; 64]).unwrap();

    let cache = output.path().join("cache.db");
    run_pipeline(input.path(), output.path(), &cache);

    let body = artifact_body(&output.path().join("blob.bin.md"));
    assert!(body.contains("`.bin`"), "body was: {body}");
    assert!(body.contains("blob.bin"));
}

#[test]
fn test_identical_files_share_one_extraction() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("a.txt"), "hello").unwrap();
    std::fs::write(input.path().join("b.txt"), "hello").unwrap();

    let cache = output.path().join("cache.db");
    let stats = run_pipeline(input.path(), output.path(), &cache);

    assert_eq!(stats.invocations, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.duplicates, 1);

    // Both artifacts exist and carry the same extracted text.
    let a = artifact_body(&output.path().join("a.txt.md"));
    let b = artifact_body(&output.path().join("b.txt.md"));
    assert_eq!(a, b);

    let store = Store::open(&cache).unwrap();
    let a_rec = store.registry.get("a.txt").unwrap().unwrap();
    let b_rec = store.registry.get("b.txt").unwrap().unwrap();
    assert_eq!(a_rec.status, FileStatus::Processed);
    assert_eq!(b_rec.status, FileStatus::Duplicate);
}

#[test]
fn test_rerun_on_unchanged_tree_invokes_nothing() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("a.txt"), "stable content").unwrap();
    std::fs::write(input.path().join("b.txt"), "more content").unwrap();

    let cache = output.path().join("cache.db");
    let first = run_pipeline(input.path(), output.path(), &cache);
    let before = std::fs::read_to_string(output.path().join("a.txt.md")).unwrap();

    let second = run_pipeline(input.path(), output.path(), &cache);
    let after = std::fs::read_to_string(output.path().join("a.txt.md")).unwrap();

    assert_eq!(first.invocations, 2);
    assert_eq!(second.invocations, 0);
    assert_eq!(second.dispatched, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(before, after);
}

#[test]
fn test_changed_file_is_re_extracted() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let file = input.path().join("a.txt");
    std::fs::write(&file, "version one").unwrap();
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_000_000, 0)).unwrap();

    let cache = output.path().join("cache.db");
    run_pipeline(input.path(), output.path(), &cache);

    std::fs::write(&file, "version two").unwrap();
    filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(2_000_000, 0)).unwrap();
    let second = run_pipeline(input.path(), output.path(), &cache);

    assert_eq!(second.dispatched, 1);
    assert_eq!(second.invocations, 1);
    let body = artifact_body(&output.path().join("a.txt.md"));
    assert!(body.contains("version two"));
}

#[test]
fn test_pending_record_is_resumed_from_cache() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("a.txt"), "resumable").unwrap();

    let cache = output.path().join("cache.db");
    run_pipeline(input.path(), output.path(), &cache);

    // Simulate an interrupt that left the record pending after the
    // extraction was cached.
    {
        let store = Store::open(&cache).unwrap();
        store
            .registry
            .mark_outcome("a.txt", FileStatus::Pending, None)
            .unwrap();
    }

    let stats = run_pipeline(input.path(), output.path(), &cache);
    assert_eq!(stats.dispatched, 1);
    // The cached extraction is reused; no strategy runs again.
    assert_eq!(stats.invocations, 0);

    let store = Store::open(&cache).unwrap();
    let record = store.registry.get("a.txt").unwrap().unwrap();
    assert_eq!(record.status, FileStatus::Processed);
}

#[test]
fn test_corrupt_pdf_fails_without_stopping_the_run() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("broken.pdf"), b"%PDF-1.4 not really").unwrap();
    std::fs::write(input.path().join("ok.txt"), "fine").unwrap();

    let cache = output.path().join("cache.db");
    let stats = run_pipeline(input.path(), output.path(), &cache);

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.exit_code().as_i32(), 3);

    // The failure still produced an artifact.
    let artifact = std::fs::read_to_string(output.path().join("broken.pdf.md")).unwrap();
    assert!(artifact.contains("status: failed"));
}

#[test]
fn test_hidden_files_are_not_ingested() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join(".hidden"), "secret").unwrap();
    std::fs::write(input.path().join("visible.txt"), "shown").unwrap();

    let cache = output.path().join("cache.db");
    let stats = run_pipeline(input.path(), output.path(), &cache);

    assert_eq!(stats.dispatched, 1);
    assert!(!output.path().join(".hidden.md").exists());
}

#[test]
fn test_ignore_patterns_exclude_files() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("keep.txt"), "keep").unwrap();
    std::fs::write(input.path().join("drop.log"), "drop").unwrap();

    let config = PipelineConfig::default()
        .with_input_root(input.path())
        .with_output_root(output.path())
        .with_cache_path(output.path().join("cache.db"))
        .with_ignore_patterns(vec!["*.log".to_string()]);
    let stats = Pipeline::new(config).run(&SilentProgress).unwrap();

    assert_eq!(stats.dispatched, 1);
    assert!(output.path().join("keep.txt.md").exists());
    assert!(!output.path().join("drop.log.md").exists());
}

#[test]
fn test_truncation_law_for_long_text() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let mut long = String::with_capacity(12 * 60_000);
    for i in 0..60_000 {
        long.push_str(&format!("line {i}\n"));
    }
    std::fs::write(input.path().join("long.txt"), &long).unwrap();

    let cache = output.path().join("cache.db");
    run_pipeline(input.path(), output.path(), &cache);

    let body = artifact_body(&output.path().join("long.txt.md"));
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), MAX_LINES + 1);
    assert_eq!(lines[MAX_LINES], truncation_marker(MAX_LINES));
    assert_eq!(lines[0], "line 0");
    assert_eq!(lines[MAX_LINES - 1], format!("line {}", MAX_LINES - 1));
}

#[test]
fn test_reset_discards_prior_state() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    std::fs::write(input.path().join("a.txt"), "content").unwrap();

    let cache = output.path().join("cache.db");
    run_pipeline(input.path(), output.path(), &cache);

    let config = PipelineConfig::default()
        .with_input_root(input.path())
        .with_output_root(output.path())
        .with_cache_path(&cache)
        .with_reset(true);
    let stats = Pipeline::new(config).run(&SilentProgress).unwrap();

    // Everything is rediscovered and re-extracted after a reset.
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.invocations, 1);
}
