//! Integration tests for sublogue
//!
//! These tests exercise the codec, intro builder and file processor together
//! against temporary files. No network access is needed.

use sublogue::subtitle::{
    build_intro_blocks, format_srt, parse_srt, sanitize_entries, strip_generated_entries,
    DetectionMode, IntroConfig, SubtitleEntry, SENTINEL,
};
use sublogue::{
    CatalogProvider, MetadataRecord, ProcessOptions, ProcessStatus, ProcessorSettings,
    SubtitleProcessor,
};

use std::fs;
use std::path::{Path, PathBuf};

const TWO_LINES: &str = "1\n00:00:10,000 --> 00:00:12,500\nHello sir\n\n2\n00:00:13,000 --> 00:00:15,000\nHow are you today?\n";

fn heat() -> MetadataRecord {
    MetadataRecord {
        title: "Heat".to_string(),
        year: Some("1995".to_string()),
        plot: "A group of professional bank robbers start to feel the heat from police when they unknowingly leave a clue."
            .to_string(),
        imdb_rating: Some("8.3".to_string()),
        rotten_tomatoes: Some("88%".to_string()),
        runtime: Some("170 min".to_string()),
        ..Default::default()
    }
}

fn processor() -> SubtitleProcessor {
    SubtitleProcessor::new(ProcessorSettings::default())
        .with_provider(Box::new(CatalogProvider::from_records(vec![heat()])))
}

fn write_srt(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn timings(entries: &[SubtitleEntry]) -> Vec<(u64, u64, String)> {
    entries
        .iter()
        .map(|e| (e.start_ms, e.end_ms, e.text.clone()))
        .collect()
}

// ============================================================================
// Codec Tests
// ============================================================================

mod codec_tests {
    use super::*;

    #[test]
    fn test_crlf_bom_matches_plain() {
        let crlf = format!("\u{feff}{}", TWO_LINES.replace('\n', "\r\n"));
        let plain = parse_srt(TWO_LINES);
        let windows = parse_srt(&crlf);

        assert_eq!(plain.len(), 2);
        assert_eq!(timings(&plain), timings(&windows));
    }

    #[test]
    fn test_formatting_is_stable() {
        let once = format_srt(&parse_srt(TWO_LINES));
        let twice = format_srt(&parse_srt(&once));
        assert_eq!(once, twice);
        assert_eq!(once, TWO_LINES);
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nGood\n\n2\nnot a timecode\nBad\n\n3\n00:99:01,000 --> 00:00:02,000\nAlso bad\n\n4\n00:00:05,000 --> 00:00:06,000\nGood again\n";
        let entries = parse_srt(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].text, "Good again");
    }
}

// ============================================================================
// Intro Builder Tests
// ============================================================================

mod builder_tests {
    use super::*;

    const TWENTY_WORDS: &str =
        "A cop and a thief meet in a diner. They both know that only one of them will walk away.";

    #[test]
    fn test_full_fit_before_ten_seconds() {
        let blocks =
            build_intro_blocks(&heat(), TWENTY_WORDS, 10_000, &IntroConfig::default());

        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text.contains(SENTINEL));
        assert!(blocks.last().unwrap().end_ms < 10_000);
        assert!(blocks.windows(2).all(|w| w[0].end_ms <= w[1].start_ms));
    }

    #[test]
    fn test_no_fit_when_dialogue_starts_early() {
        let blocks = build_intro_blocks(&heat(), TWENTY_WORDS, 900, &IntroConfig::default());
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_intro_never_reaches_dialogue() {
        let config = IntroConfig::default();
        for first_start in (0..30_000).step_by(250) {
            let blocks = build_intro_blocks(&heat(), &heat().plot, first_start, &config);
            for block in &blocks {
                assert!(block.start_ms <= block.end_ms);
                assert!(block.end_ms < first_start, "overlap at {}", first_start);
            }
        }
    }
}

// ============================================================================
// Processor Tests
// ============================================================================

mod processor_tests {
    use super::*;

    #[tokio::test]
    async fn test_original_dialogue_survives_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);

        processor()
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let dialogue = strip_generated_entries(parse_srt(&written), DetectionMode::Standard);
        assert_eq!(timings(&dialogue), timings(&parse_srt(TWO_LINES)));
    }

    #[tokio::test]
    async fn test_output_contains_no_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);

        processor()
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("{SUBLOGUE"));
        assert!(!written.contains("\n\n\n"));
        assert_eq!(sanitize_entries(parse_srt(&written)), parse_srt(&written));
    }

    #[tokio::test]
    async fn test_second_run_skips_and_leaves_bytes_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);
        let processor = processor();

        let first = processor
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();
        let bytes = fs::read(&path).unwrap();
        let second = processor
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(first.status, ProcessStatus::Processed);
        assert_eq!(second.status, ProcessStatus::Skipped);
        assert_eq!(second.plot, heat().plot);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_forced_rerun_replaces_old_intro() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);
        let processor = processor();

        processor
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();

        let options = ProcessOptions {
            metadata_override: Some(MetadataRecord {
                plot: "A short replacement plot about a long night in Los Angeles.".to_string(),
                ..heat()
            }),
            ..Default::default()
        };
        processor.process_file(&path, &options).await.unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.matches("Generated by Sublogue").count(), 1);
        assert!(written.contains("replacement plot"));
        assert!(!written.contains("bank robbers"));

        let dialogue = strip_generated_entries(parse_srt(&written), DetectionMode::Standard);
        assert_eq!(timings(&dialogue), timings(&parse_srt(TWO_LINES)));
    }

    #[tokio::test]
    async fn test_legacy_zero_time_entries_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = format!(
            "1\n00:00:00,000 --> 00:00:00,000\nOld intro card\n\n{}",
            TWO_LINES.replacen("1\n", "2\n", 1).replacen("\n2\n", "\n3\n", 1)
        );
        let path = write_srt(dir.path(), "Heat (1995).srt", &legacy);

        processor()
            .process_file(&path, &ProcessOptions::default())
            .await
            .unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("Old intro card"));
        let entries = parse_srt(&written);
        assert_eq!(entries.last().unwrap().text, "How are you today?");
    }

    #[test]
    fn test_blocking_callers_can_drive_the_processor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let outcome = runtime
            .block_on(processor().process_file(&path, &ProcessOptions::default()))
            .unwrap();

        assert_eq!(outcome.status, ProcessStatus::Processed);
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

mod concurrency_tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_calls_on_one_file_insert_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_srt(dir.path(), "Heat (1995).srt", TWO_LINES);
        let processor = Arc::new(processor());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let processor = processor.clone();
                let path = path.clone();
                tokio::spawn(async move {
                    processor
                        .process_file(&path, &ProcessOptions::default())
                        .await
                })
            })
            .collect();

        let mut processed = 0;
        let mut skipped = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap().status {
                ProcessStatus::Processed => processed += 1,
                ProcessStatus::Skipped => skipped += 1,
            }
        }

        assert_eq!(processed, 1);
        assert_eq!(skipped, 5);

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.matches("Generated by Sublogue").count(), 1);
        assert!(!sublogue::lock::lock_path_for(&path).exists());
    }
}
