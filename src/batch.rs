use crate::error::{Result, SublogueError};
use crate::processor::{ProcessOptions, ProcessReport, ProcessStatus, ProcessSuccess, SubtitleProcessor};
use console::style;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Outcome for one file of a batch.
#[derive(Debug)]
pub struct FileResult {
    pub position: usize,
    pub path: PathBuf,
    pub result: Result<ProcessSuccess>,
    pub duration_ms: u64,
}

impl FileResult {
    pub fn report(&self) -> ProcessReport {
        ProcessReport::from_result(&self.path, &self.result)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total_files: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_time: Duration,
}

/// Runs the processor over many files with bounded concurrency.
pub struct BatchRunner {
    processor: Arc<SubtitleProcessor>,
    concurrency: usize,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(processor: SubtitleProcessor, concurrency: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            concurrency: concurrency.max(1),
            show_progress: true,
        }
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Process every path and return results in input order.
    pub async fn run(
        &self,
        paths: Vec<PathBuf>,
        options: &ProcessOptions,
    ) -> (Vec<FileResult>, BatchStats) {
        let total_files = paths.len();
        let start_time = Instant::now();

        if paths.is_empty() {
            return (Vec::new(), BatchStats::default());
        }

        info!(
            "Processing {} file(s) with up to {} in flight",
            total_files, self.concurrency
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total_files as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for (position, path) in paths.into_iter().enumerate() {
            let sem = semaphore.clone();
            let processor = self.processor.clone();
            let pb = progress_bar.clone();

            let future = async move {
                let file_start = Instant::now();
                let result = match sem.acquire().await {
                    Ok(_permit) => {
                        debug!("Starting {:?}", path);
                        processor.process_file(&path, options).await
                    }
                    Err(e) => Err(SublogueError::Internal(format!("semaphore closed: {}", e))),
                };
                let duration_ms = file_start.elapsed().as_millis() as u64;

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }

                match &result {
                    Ok(outcome) => debug!("{:?} {} in {}ms", path, outcome.status, duration_ms),
                    Err(e) => warn!("{:?} failed: {}", path, e),
                }

                FileResult {
                    position,
                    path,
                    result,
                    duration_ms,
                }
            };

            futures.push(future);
        }

        let mut results: Vec<FileResult> = Vec::with_capacity(total_files);
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Done");
        }

        results.sort_by_key(|r| r.position);

        let mut stats = BatchStats {
            total_files,
            total_time: start_time.elapsed(),
            ..Default::default()
        };
        for result in &results {
            match &result.result {
                Ok(outcome) if outcome.status == ProcessStatus::Processed => stats.processed += 1,
                Ok(_) => stats.skipped += 1,
                Err(_) => stats.failed += 1,
            }
        }

        info!(
            "Batch finished: {} processed, {} skipped, {} failed in {:.2}s",
            stats.processed,
            stats.skipped,
            stats.failed,
            stats.total_time.as_secs_f64()
        );

        (results, stats)
    }
}

/// Print a per-file summary of a batch.
pub fn print_summary(results: &[FileResult], stats: &BatchStats) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                        Sublogue Summary                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    for file in results {
        let name = file.path.display();
        match &file.result {
            Ok(outcome) => {
                let label = match outcome.status {
                    ProcessStatus::Processed => style("✓ Processed").green(),
                    ProcessStatus::Skipped => style("• Skipped  ").yellow(),
                };
                let title = outcome.title.as_deref().unwrap_or("?");
                match outcome.year.as_deref() {
                    Some(year) => println!("  {}  {}  ({} {})", label, name, title, year),
                    None => println!("  {}  {}  ({})", label, name, title),
                }
            }
            Err(e) => println!("  {}  {}  {}", style("✗ Error    ").red(), name, e),
        }
    }

    println!();
    println!(
        "  Files:      {} ({} processed, {} skipped, {} failed)",
        stats.total_files, stats.processed, stats.skipped, stats.failed
    );
    println!("  Total:      {:.2}s", stats.total_time.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
