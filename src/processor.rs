use crate::config::Config;
use crate::error::{Result, SublogueError};
use crate::lock::{FileLocker, MarkerFileLocker};
use crate::metadata::{BasicTitleCleaner, MetadataProvider, MetadataRecord, TitleCleaner};
use crate::subtitle::intro::plan_intro;
use crate::subtitle::marker::{read_existing_intro, ExistingIntro};
use crate::subtitle::srt::format_timestamp;
use crate::subtitle::{
    format_srt, has_generated_content, parse_srt, renumber_entries, sanitize_entries,
    strip_generated_entries, DetectionMode, FormatOptions, IntroConfig, IntroStrategy,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-call switches.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Rebuild the intro even when the file already carries one.
    pub force: bool,
    /// Use this record instead of looking the title up. Implies a rebuild.
    pub metadata_override: Option<MetadataRecord>,
    pub format: FormatOptions,
}

/// Limits and timing shared by every call on one processor.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub intro: IntroConfig,
    pub max_file_bytes: u64,
    pub scan_lines: usize,
    pub lock_timeout: Duration,
    pub lock_staleness: Duration,
    pub detection: DetectionMode,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            intro: IntroConfig {
                safety_gap_ms: config.safety_gap_ms,
                format: config.format,
                ..IntroConfig::default()
            },
            max_file_bytes: config.max_file_bytes,
            scan_lines: config.scan_lines,
            lock_timeout: config.lock_timeout(),
            lock_staleness: config.lock_staleness(),
            detection: config.detection_mode(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessStatus {
    Processed,
    Skipped,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Processed => write!(f, "Processed"),
            ProcessStatus::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Successful outcome of [`SubtitleProcessor::process_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSuccess {
    pub status: ProcessStatus,
    pub plot: String,
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_rating: Option<String>,
    pub rotten_tomatoes: Option<String>,
    pub runtime: Option<String>,
    pub media_type: Option<String>,
    /// Intro cues written; zero when skipped or the gap was too small.
    pub intro_blocks: usize,
    pub strategy: Option<IntroStrategy>,
}

impl ProcessSuccess {
    fn processed(
        record: &MetadataRecord,
        plot: &str,
        intro_blocks: usize,
        strategy: IntroStrategy,
    ) -> Self {
        Self {
            status: ProcessStatus::Processed,
            plot: plot.to_string(),
            title: Some(record.title.clone()),
            year: record.year.clone(),
            imdb_rating: record.imdb_rating.clone(),
            rotten_tomatoes: record.rotten_tomatoes.clone(),
            runtime: record.runtime.clone(),
            media_type: record.media_type.clone(),
            intro_blocks,
            strategy: Some(strategy),
        }
    }

    fn skipped(existing: ExistingIntro) -> Self {
        Self {
            status: ProcessStatus::Skipped,
            plot: existing.plot,
            title: existing.title,
            year: existing.year,
            imdb_rating: existing.imdb_rating,
            rotten_tomatoes: existing.rotten_tomatoes,
            runtime: existing.runtime,
            media_type: None,
            intro_blocks: 0,
            strategy: None,
        }
    }
}

/// Serializable result contract for one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub path: PathBuf,
    pub success: bool,
    /// `Processed`, `Skipped` or `Error`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub plot: String,
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_rating: Option<String>,
    pub rotten_tomatoes: Option<String>,
    pub runtime: Option<String>,
    pub media_type: Option<String>,
}

impl ProcessReport {
    pub fn from_result(path: &Path, result: &Result<ProcessSuccess>) -> Self {
        match result {
            Ok(outcome) => Self {
                path: path.to_path_buf(),
                success: true,
                status: outcome.status.to_string(),
                reason: None,
                plot: outcome.plot.clone(),
                title: outcome.title.clone(),
                year: outcome.year.clone(),
                imdb_rating: outcome.imdb_rating.clone(),
                rotten_tomatoes: outcome.rotten_tomatoes.clone(),
                runtime: outcome.runtime.clone(),
                media_type: outcome.media_type.clone(),
            },
            Err(e) => Self {
                path: path.to_path_buf(),
                success: false,
                status: "Error".to_string(),
                reason: Some(e.to_string()),
                plot: String::new(),
                title: None,
                year: None,
                imdb_rating: None,
                rotten_tomatoes: None,
                runtime: None,
                media_type: None,
            },
        }
    }
}

/// Injects plot intros into subtitle files.
///
/// Metadata is resolved before the file lock is taken; everything from the
/// "already processed" re-check to the final rename happens under the lock.
pub struct SubtitleProcessor {
    provider: Option<Arc<dyn MetadataProvider>>,
    cleaner: Arc<dyn TitleCleaner>,
    locker: Arc<dyn FileLocker>,
    settings: ProcessorSettings,
}

impl SubtitleProcessor {
    pub fn new(settings: ProcessorSettings) -> Self {
        Self {
            provider: None,
            cleaner: Arc::new(BasicTitleCleaner),
            locker: Arc::new(MarkerFileLocker::new()),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ProcessorSettings::from(config)).with_locker(Box::new(
            MarkerFileLocker::new().with_poll_interval(config.lock_poll_interval()),
        ))
    }

    pub fn with_provider(mut self, provider: Box<dyn MetadataProvider>) -> Self {
        self.provider = Some(Arc::from(provider));
        self
    }

    pub fn with_cleaner(mut self, cleaner: Box<dyn TitleCleaner>) -> Self {
        self.cleaner = Arc::from(cleaner);
        self
    }

    pub fn with_locker(mut self, locker: Box<dyn FileLocker>) -> Self {
        self.locker = Arc::from(locker);
        self
    }

    /// Add (or refresh) the intro in the subtitle file at `path`.
    pub async fn process_file(
        &self,
        path: &Path,
        options: &ProcessOptions,
    ) -> Result<ProcessSuccess> {
        let start_time = Instant::now();

        if !path.exists() {
            return Err(SublogueError::FileNotFound(path.to_path_buf()));
        }

        let size = fs::metadata(path)?.len();
        if size > self.settings.max_file_bytes {
            return Err(SublogueError::FileTooLarge {
                size,
                limit: self.settings.max_file_bytes,
            });
        }

        // ═══════════════════════════════════════════════════════════════════════
        // Stage 1: Metadata (outside the lock; may hit the network)
        // ═══════════════════════════════════════════════════════════════════════
        info!("Stage 1/2: Resolving metadata for {:?}", path);
        let record = self.resolve_metadata(path, options).await?;

        let plot = record.plot.trim().to_string();
        if plot.is_empty() {
            return Err(SublogueError::EmptyPlot);
        }

        // ═══════════════════════════════════════════════════════════════════════
        // Stage 2: Locked mutation
        // ═══════════════════════════════════════════════════════════════════════
        info!("Stage 2/2: Rewriting {:?} under lock", path);
        let job = MutationJob {
            path: path.to_path_buf(),
            record,
            plot,
            rebuild: options.force || options.metadata_override.is_some(),
            settings: ProcessorSettings {
                intro: IntroConfig {
                    format: options.format,
                    ..self.settings.intro
                },
                ..self.settings
            },
        };
        let locker = self.locker.clone();

        let outcome = tokio::task::spawn_blocking(move || job.run(locker.as_ref()))
            .await
            .map_err(|e| SublogueError::Internal(format!("critical section aborted: {}", e)))??;

        info!(
            "{} {:?} in {:.2}s",
            outcome.status,
            path,
            start_time.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    async fn resolve_metadata(
        &self,
        path: &Path,
        options: &ProcessOptions,
    ) -> Result<MetadataRecord> {
        if let Some(record) = &options.metadata_override {
            info!("Using provided metadata for {:?}: {}", path, record.title);
            return Ok(record.clone());
        }

        let raw_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identity = self.cleaner.clean(&raw_name);
        info!(
            "Resolved name '{}' -> '{}' (year={:?})",
            raw_name, identity.title, identity.year
        );

        let Some(provider) = &self.provider else {
            warn!("No metadata provider configured");
            return Err(SublogueError::NoMetadata(identity.title));
        };

        match provider.fetch(&identity).await {
            Ok(Some(record)) => {
                info!(
                    "Found metadata via {}: {} ({:?})",
                    provider.name(),
                    record.title,
                    record.year
                );
                Ok(record)
            }
            Ok(None) => Err(SublogueError::NoMetadata(identity.title)),
            Err(e) => {
                warn!("{} lookup failed for '{}': {}", provider.name(), identity.title, e);
                Err(SublogueError::NoMetadata(identity.title))
            }
        }
    }
}

/// Everything the critical section needs, owned so it can move to a blocking thread.
struct MutationJob {
    path: PathBuf,
    record: MetadataRecord,
    plot: String,
    rebuild: bool,
    settings: ProcessorSettings,
}

impl MutationJob {
    fn run(self, locker: &dyn FileLocker) -> Result<ProcessSuccess> {
        let settings = &self.settings;
        let _guard =
            locker.try_acquire(&self.path, settings.lock_timeout, settings.lock_staleness)?;

        // Re-check under the lock so two callers cannot both insert
        if !self.rebuild && has_generated_content(&self.path, settings.scan_lines) {
            info!("Skipping {:?} (intro already present)", self.path);
            let entries = parse_srt(&read_lossy(&self.path)?);
            return Ok(ProcessSuccess::skipped(read_existing_intro(&entries)));
        }

        let entries = parse_srt(&read_lossy(&self.path)?);
        if entries.is_empty() {
            return Err(SublogueError::NoSubtitles);
        }
        debug!("Parsed {} subtitle blocks from {:?}", entries.len(), self.path);

        let dialogue = strip_generated_entries(entries, settings.detection);
        let Some(first) = dialogue.first() else {
            return Err(SublogueError::NoDialogue);
        };
        let first_start_ms = first.start_ms;
        info!(
            "First dialogue at {} ({}ms)",
            format_timestamp(first_start_ms),
            first_start_ms
        );

        let plan = plan_intro(&self.record, &self.plot, first_start_ms, &settings.intro);
        let intro_count = plan.blocks.len();
        let dialogue_count = dialogue.len();

        let mut merged = plan.blocks;
        merged.extend(dialogue);
        let merged = renumber_entries(merged);

        if let Some(preserved) = merged.get(intro_count) {
            if preserved.start_ms != first_start_ms {
                return Err(SublogueError::TimingCorruption {
                    expected: first_start_ms,
                    actual: preserved.start_ms,
                });
            }
        }

        let sanitized = sanitize_entries(merged);
        write_atomically(&self.path, &format_srt(&sanitized))?;

        info!(
            "Wrote {} blocks to {:?} ({} intro + {} original)",
            sanitized.len(),
            self.path,
            intro_count,
            dialogue_count
        );

        Ok(ProcessSuccess::processed(
            &self.record,
            &self.plot,
            intro_count,
            plan.strategy,
        ))
    }
}

/// Read a file as UTF-8, dropping bytes that do not decode.
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let mut text = String::with_capacity(bytes.len());
            for chunk in bytes.utf8_chunks() {
                text.push_str(chunk.valid());
            }
            text
        }
    })
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".sublogue-")
        .suffix(".srt.tmp")
        .tempfile_in(dir)
        .map_err(SublogueError::Write)?;
    tmp.write_all(contents.as_bytes())
        .map_err(SublogueError::Write)?;
    tmp.as_file().sync_all().map_err(SublogueError::Write)?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(SublogueError::Write)?;
    }

    tmp.persist(path).map_err(|e| SublogueError::Write(e.error))?;
    Ok(())
}
