use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sublogue::{
    print_summary, BatchRunner, CatalogProvider, Config, MetadataRecord, ProcessOptions,
    SubtitleProcessor,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sublogue")]
#[command(version, about = "Add plot and rating intros to SRT subtitles")]
#[command(
    long_about = "Prepends a short title card and plot summary to subtitle files, using the silence before the first line of dialogue. Dialogue timing is never changed."
)]
struct Cli {
    /// Subtitle files to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Rebuild the intro even if one is already present
    #[arg(short, long)]
    force: bool,

    /// JSON catalog of title metadata
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Use this title instead of looking one up (requires --plot)
    #[arg(long, requires = "plot")]
    title: Option<String>,

    /// Year for --title
    #[arg(long, requires = "title")]
    year: Option<String>,

    /// Plot text for --title
    #[arg(long, requires = "title")]
    plot: Option<String>,

    /// IMDb rating for --title
    #[arg(long, requires = "title")]
    imdb_rating: Option<String>,

    /// Rotten Tomatoes score for --title
    #[arg(long, requires = "title")]
    rotten_tomatoes: Option<String>,

    /// Runtime for --title, e.g. "170 min"
    #[arg(long, requires = "title")]
    runtime: Option<String>,

    /// Do not bold the title line
    #[arg(long)]
    no_bold: bool,

    /// Do not italicize the plot
    #[arg(long)]
    no_italic: bool,

    /// Add director, cast, release date and genre to the header
    #[arg(long)]
    details: bool,

    /// Also treat cues with old-style rating glyphs as generated
    #[arg(long)]
    legacy_detection: bool,

    /// Number of files processed concurrently
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Print one JSON result per file instead of the summary table
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn metadata_override(&self) -> Option<MetadataRecord> {
        let title = self.title.clone()?;
        Some(MetadataRecord {
            title,
            year: self.year.clone(),
            plot: self.plot.clone().unwrap_or_default(),
            imdb_rating: self.imdb_rating.clone(),
            rotten_tomatoes: self.rotten_tomatoes.clone(),
            runtime: self.runtime.clone(),
            ..Default::default()
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref catalog) = cli.catalog {
        config.catalog = Some(catalog.clone());
    }
    if cli.legacy_detection {
        config.legacy_glyph_detection = true;
    }
    if cli.no_bold {
        config.format.title_bold = false;
    }
    if cli.no_italic {
        config.format.plot_italic = false;
    }
    if cli.details {
        config.format.show_director = true;
        config.format.show_actors = true;
        config.format.show_released = true;
        config.format.show_genre = true;
    }
    config.validate().context("Configuration validation failed")?;

    let mut processor = SubtitleProcessor::from_config(&config);
    if let Some(ref catalog) = config.catalog {
        let provider = CatalogProvider::from_path(catalog)
            .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
        processor = processor.with_provider(Box::new(provider));
    }

    let options = ProcessOptions {
        force: cli.force,
        metadata_override: cli.metadata_override(),
        format: config.format,
    };

    info!("Files:       {}", cli.files.len());
    info!("Concurrency: {}", config.concurrency);
    info!("Safety gap:  {}ms", config.safety_gap_ms);
    if let Some(ref catalog) = config.catalog {
        info!("Catalog:     {}", catalog.display());
    }

    let runner = BatchRunner::new(processor, config.concurrency).with_progress(!cli.json);
    let (results, stats) = runner.run(cli.files.clone(), &options).await;

    if cli.json {
        for result in &results {
            println!("{}", serde_json::to_string(&result.report())?);
        }
    } else {
        print_summary(&results, &stats);
    }

    if stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
