//! Intro cue construction.
//!
//! Header and plot cues are laid out in the silence before the first dialogue cue.
//! Dialogue timing is never touched: if the intro cannot end strictly before the
//! first dialogue cue, nothing is inserted.

use super::chunk::{split_plot_into_chunks, wrap_for_tv, ChunkLimits};
use super::marker::{tag, ATTRIBUTION};
use super::timing::{count_words, ReadingModel};
use super::SubtitleEntry;
use crate::metadata::MetadataRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{info, warn};

static RUNTIME_MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("Invalid runtime regex"));

const NOT_AVAILABLE: &str = "N/A";
const MAX_LISTED_ACTORS: usize = 3;

/// Header markup switches. None of these affect timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub title_bold: bool,
    pub plot_italic: bool,
    pub show_director: bool,
    pub show_actors: bool,
    pub show_released: bool,
    pub show_genre: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            title_bold: true,
            plot_italic: true,
            show_director: false,
            show_actors: false,
            show_released: false,
            show_genre: false,
        }
    }
}

/// Inputs to intro layout besides the metadata itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntroConfig {
    /// Silence kept between the last intro cue and the first dialogue cue.
    pub safety_gap_ms: u64,
    pub reading: ReadingModel,
    pub limits: ChunkLimits,
    pub format: FormatOptions,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            safety_gap_ms: 500,
            reading: ReadingModel::default(),
            limits: ChunkLimits::default(),
            format: FormatOptions::default(),
        }
    }
}

/// Which layout was chosen for the available gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroStrategy {
    /// Gap too small to guarantee no overlap; nothing inserted.
    NoFit,
    /// Header and every chunk at their natural reading duration.
    Full,
    /// Every chunk shown, durations squeezed in proportion to word count.
    Compressed,
    /// Header plus as many chunks as fit; the remainder is folded into the last one.
    Partial,
    /// Title and attribution only.
    Brief,
}

#[derive(Debug, Clone)]
pub struct IntroPlan {
    pub strategy: IntroStrategy,
    pub blocks: Vec<SubtitleEntry>,
}

/// Render the sentinel-tagged header cue.
pub fn render_header(record: &MetadataRecord, options: &FormatOptions) -> String {
    let title = if options.title_bold {
        format!("<b>{}</b>", record.title)
    } else {
        record.title.clone()
    };

    let mut lines = vec![title_with_year(&title, record.year.as_deref())];

    lines.push(format!(
        "⭐ IMDb: {}   🍅 RT: {}   ⏱ {}",
        or_na(record.imdb_rating.as_deref()),
        or_na(record.rotten_tomatoes.as_deref()),
        runtime_display(record.runtime.as_deref()),
    ));

    if options.show_director {
        if let Some(director) = present(record.director.as_deref()) {
            lines.push(format!("🎬 Director: {}", director));
        }
    }
    if options.show_actors {
        if let Some(actors) = present(record.actors.as_deref()) {
            let listed: Vec<&str> = actors.split(", ").collect();
            let cast = if listed.len() > MAX_LISTED_ACTORS {
                format!("{}...", listed[..MAX_LISTED_ACTORS].join(", "))
            } else {
                actors.to_string()
            };
            lines.push(format!("🎭 Cast: {}", cast));
        }
    }
    if options.show_released {
        if let Some(released) = present(record.released.as_deref()) {
            lines.push(format!("📅 Released: {}", released));
        }
    }
    if options.show_genre {
        if let Some(genre) = present(record.genre.as_deref()) {
            lines.push(format!("🎞 Genre: {}", genre));
        }
    }

    lines.push(format!("— {}", ATTRIBUTION));
    tag(&lines.join("\n"))
}

fn render_brief(record: &MetadataRecord) -> String {
    tag(&format!(
        "{}\n— {}",
        title_with_year(&record.title, record.year.as_deref()),
        ATTRIBUTION
    ))
}

fn format_plot_chunk(chunk: &str, is_first: bool, config: &IntroConfig) -> String {
    let wrapped = wrap_for_tv(chunk, config.limits.line_width);
    let styled = if config.format.plot_italic {
        format!("<i>{}</i>", wrapped)
    } else {
        wrapped
    };
    if is_first {
        tag(&format!("Plot: {}", styled))
    } else {
        tag(&styled)
    }
}

fn title_with_year(title: &str, year: Option<&str>) -> String {
    match present(year) {
        Some(year) => format!("{} ({})", title, year),
        None => title.to_string(),
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NOT_AVAILABLE)
}

fn or_na(value: Option<&str>) -> &str {
    present(value).unwrap_or(NOT_AVAILABLE)
}

fn runtime_display(runtime: Option<&str>) -> String {
    match present(runtime) {
        Some(raw) => RUNTIME_MINUTES_RE
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("{} min", m.as_str()))
            .unwrap_or_else(|| raw.to_string()),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// The attribution line is a credit, not something the viewer reads, so it is
/// left out of the header's reading time.
fn header_reading_text(header: &str) -> String {
    header
        .lines()
        .filter(|line| !line.contains(ATTRIBUTION))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build intro cues that end strictly before `first_start_ms`.
pub fn build_intro_blocks(
    record: &MetadataRecord,
    plot: &str,
    first_start_ms: u64,
    config: &IntroConfig,
) -> Vec<SubtitleEntry> {
    plan_intro(record, plot, first_start_ms, config).blocks
}

/// Choose a layout strategy and build its cues.
pub fn plan_intro(
    record: &MetadataRecord,
    plot: &str,
    first_start_ms: u64,
    config: &IntroConfig,
) -> IntroPlan {
    let reading = &config.reading;
    let min_ms = reading.min_ms;
    let available_ms = first_start_ms as i64 - config.safety_gap_ms as i64;

    info!(
        "Timing analysis: first subtitle at {}ms, available window {}ms ({}ms safety gap)",
        first_start_ms, available_ms, config.safety_gap_ms
    );

    if first_start_ms < min_ms + config.safety_gap_ms || available_ms <= 0 {
        warn!(
            "[NO INSERT] First subtitle at {}ms, need at least {}ms",
            first_start_ms,
            min_ms + config.safety_gap_ms
        );
        return IntroPlan {
            strategy: IntroStrategy::NoFit,
            blocks: Vec::new(),
        };
    }
    // From here on the window holds at least one minimum-length cue
    let available = available_ms as u64;
    let safe_end = |proposed: u64| proposed.min(first_start_ms.saturating_sub(1));

    let header_text = render_header(record, &config.format);
    let header_ms = reading.duration_ms(&header_reading_text(&header_text));

    let chunks = split_plot_into_chunks(plot, &config.limits);
    let chunk_ms: Vec<u64> = chunks.iter().map(|c| reading.duration_ms(c)).collect();
    let total_needed = header_ms + chunk_ms.iter().sum::<u64>();

    info!(
        "Header needs {}ms, {} plot chunk(s) need {}ms in total, {}ms available",
        header_ms,
        chunks.len(),
        total_needed,
        available
    );

    let mut blocks: Vec<SubtitleEntry> = Vec::new();
    let push = |blocks: &mut Vec<SubtitleEntry>, start: u64, end: u64, text: String| {
        let index = blocks.len() + 1;
        blocks.push(SubtitleEntry::new(index, start, safe_end(end), text));
    };

    let strategy = if available >= total_needed {
        push(&mut blocks, 0, header_ms, header_text);
        let mut cursor = header_ms;
        for (i, (chunk, duration)) in chunks.iter().zip(&chunk_ms).enumerate() {
            push(
                &mut blocks,
                cursor,
                cursor + duration,
                format_plot_chunk(chunk, i == 0, config),
            );
            cursor += duration;
        }
        IntroStrategy::Full
    } else if available >= header_ms + min_ms * chunks.len() as u64 {
        let n = chunks.len() as u64;
        let header_end = header_ms.min(min_ms.max(available / (n + 1)));
        push(&mut blocks, 0, header_end, header_text);

        // Every chunk gets the minimum; leftover time goes out by word count
        let plot_available = available - header_end;
        let spare = plot_available - min_ms * n;
        let words: Vec<u64> = chunks.iter().map(|c| count_words(c) as u64).collect();
        let total_words: u64 = words.iter().sum();

        let mut cursor = header_end;
        for (i, chunk) in chunks.iter().enumerate() {
            let duration = if i + 1 == chunks.len() {
                available - cursor
            } else if total_words > 0 {
                min_ms + spare * words[i] / total_words
            } else {
                min_ms + spare / n
            };
            push(
                &mut blocks,
                cursor,
                cursor + duration,
                format_plot_chunk(chunk, i == 0, config),
            );
            cursor += duration;
        }
        IntroStrategy::Compressed
    } else if available >= header_ms + min_ms {
        let header_end = header_ms.min(available / 2);
        push(&mut blocks, 0, header_end, header_text);

        let mut cursor = header_end;
        for (i, chunk) in chunks.iter().enumerate() {
            let remaining = available.saturating_sub(cursor);
            if remaining < min_ms {
                break;
            }
            let duration = chunk_ms[i].min(remaining).max(min_ms);
            let is_last = i + 1 == chunks.len() || remaining - duration < min_ms;

            // Whatever does not get its own cue rides along in this one
            let text = if is_last {
                chunks[i..].join(" ")
            } else {
                chunk.clone()
            };
            push(
                &mut blocks,
                cursor,
                cursor + duration,
                format_plot_chunk(&text, i == 0, config),
            );
            cursor += duration;

            if is_last {
                break;
            }
        }
        IntroStrategy::Partial
    } else if available >= min_ms {
        push(&mut blocks, 0, available, render_brief(record));
        IntroStrategy::Brief
    } else {
        IntroStrategy::NoFit
    };

    if let Some(last) = blocks.last() {
        assert!(
            last.end_ms < first_start_ms,
            "intro cue ends at {}ms, overlapping first subtitle at {}ms",
            last.end_ms,
            first_start_ms
        );
    }

    info!(
        "[{:?}] {} intro block(s), ending at {}ms",
        strategy,
        blocks.len(),
        blocks.last().map_or(0, |b| b.end_ms)
    );

    IntroPlan { strategy, blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::marker::{contains_token, SENTINEL};

    fn heat() -> MetadataRecord {
        MetadataRecord {
            title: "Heat".to_string(),
            year: Some("1995".to_string()),
            plot: String::new(),
            imdb_rating: Some("8.3".to_string()),
            rotten_tomatoes: Some("88%".to_string()),
            runtime: Some("170 min".to_string()),
            ..Default::default()
        }
    }

    const TWENTY_WORDS: &str =
        "A cop and a thief meet in a diner. They both know that only one of them will walk away.";

    const LONG_PLOT: &str = "A seasoned detective returns to the city where his partner vanished many long years ago. \
        He finds the old precinct run by the very people who buried the case back then. \
        Each clue pulls him deeper into a network of favors, debts and quiet threats. \
        When a witness finally talks, the cost of the truth becomes painfully clear to all.";

    fn plot_words(blocks: &[SubtitleEntry]) -> Vec<String> {
        blocks
            .iter()
            .skip(1)
            .flat_map(|b| {
                b.text
                    .replace(SENTINEL, "")
                    .replace("<i>", "")
                    .replace("</i>", "")
                    .replace("Plot:", "")
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_render_header_defaults() {
        let header = render_header(&heat(), &FormatOptions::default());
        let lines: Vec<&str> = header.lines().collect();

        assert_eq!(lines[0], SENTINEL);
        assert_eq!(lines[1], "<b>Heat</b> (1995)");
        assert_eq!(lines[2], "⭐ IMDb: 8.3   🍅 RT: 88%   ⏱ 170 min");
        assert_eq!(lines[3], "— Generated by Sublogue");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_render_header_missing_values_show_na() {
        let record = MetadataRecord {
            title: "Obscure".to_string(),
            runtime: Some("N/A".to_string()),
            ..Default::default()
        };
        let header = render_header(&record, &FormatOptions::default());
        assert!(header.contains("<b>Obscure</b>\n"));
        assert!(header.contains("⭐ IMDb: N/A   🍅 RT: N/A   ⏱ N/A"));
    }

    #[test]
    fn test_render_header_optional_lines() {
        let record = MetadataRecord {
            director: Some("Michael Mann".to_string()),
            actors: Some("Al Pacino, Robert De Niro, Val Kilmer, Jon Voight".to_string()),
            released: Some("15 Dec 1995".to_string()),
            genre: Some("Crime, Drama".to_string()),
            runtime: Some("170 minutes".to_string()),
            ..heat()
        };
        let options = FormatOptions {
            title_bold: false,
            plot_italic: false,
            show_director: true,
            show_actors: true,
            show_released: true,
            show_genre: true,
        };

        let header = render_header(&record, &options);

        assert!(header.contains("\nHeat (1995)\n"));
        assert!(header.contains("⏱ 170 min"));
        assert!(header.contains("🎬 Director: Michael Mann"));
        assert!(header.contains("🎭 Cast: Al Pacino, Robert De Niro, Val Kilmer..."));
        assert!(header.contains("📅 Released: 15 Dec 1995"));
        assert!(header.contains("🎞 Genre: Crime, Drama"));
    }

    #[test]
    fn test_full_fit_for_short_plot() {
        let plan = plan_intro(&heat(), TWENTY_WORDS, 10_000, &IntroConfig::default());

        assert_eq!(plan.strategy, IntroStrategy::Full);
        assert_eq!(plan.blocks.len(), 2);
        assert_eq!((plan.blocks[0].start_ms, plan.blocks[0].end_ms), (0, 3000));
        assert_eq!((plan.blocks[1].start_ms, plan.blocks[1].end_ms), (3000, 9000));
        assert!(plan.blocks[1].text.contains("Plot: <i>"));
        assert!(plan.blocks.last().unwrap().end_ms < 10_000);
        assert!(plan.blocks.iter().all(|b| b.text.starts_with(SENTINEL)));
    }

    #[test]
    fn test_no_fit_when_gap_too_small() {
        let plan = plan_intro(&heat(), TWENTY_WORDS, 900, &IntroConfig::default());
        assert_eq!(plan.strategy, IntroStrategy::NoFit);
        assert!(plan.blocks.is_empty());

        assert!(build_intro_blocks(&heat(), TWENTY_WORDS, 0, &IntroConfig::default()).is_empty());
        assert!(build_intro_blocks(&heat(), TWENTY_WORDS, 1699, &IntroConfig::default()).is_empty());
    }

    #[test]
    fn test_brief_fit_header_only() {
        let plan = plan_intro(&heat(), TWENTY_WORDS, 3000, &IntroConfig::default());

        assert_eq!(plan.strategy, IntroStrategy::Brief);
        assert_eq!(plan.blocks.len(), 1);
        assert_eq!((plan.blocks[0].start_ms, plan.blocks[0].end_ms), (0, 2500));
        assert!(plan.blocks[0].text.contains("Heat (1995)"));
        assert!(plan.blocks[0].text.contains("Generated by Sublogue"));
    }

    #[test]
    fn test_compressed_fit_spreads_remaining_time() {
        let limits = ChunkLimits::default();
        let chunks = split_plot_into_chunks(LONG_PLOT, &limits);
        assert_eq!(chunks.len(), 4);

        // header 3000ms + 4 x 1200ms minimum = 7800ms, ideal is far more
        let plan = plan_intro(&heat(), LONG_PLOT, 9000, &IntroConfig::default());

        assert_eq!(plan.strategy, IntroStrategy::Compressed);
        assert_eq!(plan.blocks.len(), 5);
        for pair in plan.blocks.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        for block in &plan.blocks[1..] {
            assert!(block.duration_ms() >= 1200);
        }
        assert_eq!(plan.blocks.last().unwrap().end_ms, 8500);
        assert_eq!(plot_words(&plan.blocks).join(" "), chunks.join(" "));
    }

    #[test]
    fn test_partial_fit_folds_remaining_chunks() {
        let plan = plan_intro(&heat(), LONG_PLOT, 6000, &IntroConfig::default());

        assert_eq!(plan.strategy, IntroStrategy::Partial);
        assert!(plan.blocks.len() >= 2);
        assert!(plan.blocks.last().unwrap().end_ms < 6000);

        let expected: Vec<String> = LONG_PLOT.split_whitespace().map(str::to_string).collect();
        assert_eq!(plot_words(&plan.blocks), expected);
    }

    #[test]
    fn test_never_overlaps_first_subtitle() {
        let run_on = "word ".repeat(120);
        let plots = [TWENTY_WORDS, LONG_PLOT, "Short.", run_on.as_str()];
        for plot in plots {
            for first_start in (0..40_000).step_by(137) {
                let blocks = build_intro_blocks(&heat(), plot, first_start, &IntroConfig::default());
                if let Some(last) = blocks.last() {
                    assert!(last.end_ms < first_start, "overlap at {}", first_start);
                }
                for block in &blocks {
                    assert!(block.start_ms <= block.end_ms);
                    assert!(contains_token(&block.text));
                }
            }
        }
    }

    #[test]
    fn test_plot_never_lost_unless_brief() {
        let expected: Vec<String> = LONG_PLOT.split_whitespace().map(str::to_string).collect();
        for first_start in (0..40_000).step_by(211) {
            let plan = plan_intro(&heat(), LONG_PLOT, first_start, &IntroConfig::default());
            match plan.strategy {
                IntroStrategy::NoFit | IntroStrategy::Brief => {}
                _ => assert_eq!(plot_words(&plan.blocks), expected, "at {}", first_start),
            }
        }
    }
}
