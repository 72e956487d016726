//! Marking, detection and sanitization of generated cues.
//!
//! Generated cues are tagged with [`SENTINEL`] while they are being built so the
//! pipeline can tell them apart from dialogue. The tag never reaches disk:
//! [`sanitize_entries`] scrubs it right before serialization. What persists is the
//! attribution line in the header and the back-to-back layout of the intro run, and
//! those are what re-runs key on.

use super::SubtitleEntry;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Literal tag placed at the start of every generated cue.
pub const SENTINEL: &str = "{SUBLOGUE}";

/// Signature line rendered at the bottom of every header.
pub const ATTRIBUTION: &str = "Generated by Sublogue";

/// Matches `{SUBLOGUE}` and parametrized forms such as `{SUBLOGUE:v2}`.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{SUBLOGUE(?::[^}]*)?\}").expect("Invalid token regex"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank-run regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})\)").expect("Invalid year regex"));
static IMDB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"IMDb:\s*(\S+)").expect("Invalid IMDb regex"));
static RT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RT:\s*(\S+)").expect("Invalid RT regex"));
static RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"⏱\s*(.+?)(?:\s{2,}|$)").expect("Invalid runtime regex"));

/// Icons that only ever appeared in old metadata headers.
const LEGACY_GLYPH_MARKERS: &[&str] = &["imdb:", "⭐", "⏱"];

/// How aggressively prior generations are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// Sentinel, attribution line, zero-length cues at t=0 and the intro run.
    #[default]
    Standard,
    /// Additionally treat any cue showing rating/timer/star icons as generated.
    /// Real dialogue containing these characters will be removed too.
    LegacyGlyphs,
}

/// Prefix `text` with the sentinel tag.
pub fn tag(text: &str) -> String {
    format!("{}\n{}", SENTINEL, text)
}

pub fn contains_token(text: &str) -> bool {
    TOKEN_RE.is_match(text)
}

/// Remove every sentinel token, leaving surrounding text as is.
///
/// Removal repeats until no token is left, since cutting one out can join the
/// text around it into another (`{SUB{SUBLOGUE}LOGUE}`).
pub fn strip_tokens(text: &str) -> String {
    let mut cleaned = TOKEN_RE.replace_all(text, "").into_owned();
    while TOKEN_RE.is_match(&cleaned) {
        cleaned = TOKEN_RE.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

/// True when text carries the sentinel or the attribution signature.
pub fn is_generated_text(text: &str) -> bool {
    contains_token(text) || text.to_lowercase().contains(&ATTRIBUTION.to_lowercase())
}

fn has_direct_signal(entry: &SubtitleEntry, mode: DetectionMode) -> bool {
    if is_generated_text(&entry.text) {
        return true;
    }
    if entry.start_ms == 0 && entry.end_ms == 0 {
        return true;
    }
    if mode == DetectionMode::LegacyGlyphs {
        let lower = entry.text.to_lowercase();
        return LEGACY_GLYPH_MARKERS.iter().any(|m| lower.contains(m));
    }
    false
}

/// Flag each entry as generated (`true`) or dialogue (`false`).
///
/// Beyond direct signals, cues that start exactly where a leading generated cue
/// ended are part of the same intro run; plot chunks carry no attribution of their
/// own once sanitized. Chaining stops at the first dialogue cue.
fn classify(entries: &[SubtitleEntry], mode: DetectionMode) -> Vec<bool> {
    let mut flags = Vec::with_capacity(entries.len());
    let mut intro_end: Option<u64> = None;
    let mut in_leading_run = true;

    for entry in entries {
        let chained =
            in_leading_run && entry.start_ms > 0 && intro_end == Some(entry.start_ms);
        let generated = chained || has_direct_signal(entry, mode);

        if generated {
            if in_leading_run {
                intro_end = Some(entry.end_ms);
            }
        } else {
            in_leading_run = false;
        }
        flags.push(generated);
    }

    flags
}

/// Drop every previously generated cue, keeping only original dialogue.
pub fn strip_generated_entries(
    entries: Vec<SubtitleEntry>,
    mode: DetectionMode,
) -> Vec<SubtitleEntry> {
    let before = entries.len();
    let flags = classify(&entries, mode);

    let kept: Vec<SubtitleEntry> = entries
        .into_iter()
        .zip(flags)
        .filter_map(|(entry, generated)| {
            if generated {
                debug!(
                    "Stripping generated block at index {} ({}ms)",
                    entry.index, entry.start_ms
                );
                None
            } else {
                Some(entry)
            }
        })
        .collect();

    info!("Stripped generated blocks: {} -> {} blocks", before, kept.len());
    kept
}

/// Remove sentinel tokens, collapse runs of blank lines and trim.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = strip_tokens(text);
    BLANK_RUN_RE
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}

/// Sanitize every entry, dropping those left empty.
pub fn sanitize_entries(entries: Vec<SubtitleEntry>) -> Vec<SubtitleEntry> {
    entries
        .into_iter()
        .filter_map(|mut entry| {
            entry.text = sanitize_text(&entry.text);
            (!entry.text.is_empty()).then_some(entry)
        })
        .collect()
}

/// Scan the first `max_lines` lines of a file for generated content.
///
/// Unreadable files count as not processed; the caller's full read reports the error.
pub fn has_generated_content(path: &Path, max_lines: usize) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Fast scan could not open {:?}: {}", path, e);
            return false;
        }
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    for _ in 0..max_lines {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if is_generated_text(&String::from_utf8_lossy(&buf)) {
                    return true;
                }
            }
            Err(e) => {
                debug!("Fast scan read error on {:?}: {}", path, e);
                break;
            }
        }
    }
    false
}

/// Plot and header fields recovered from an already processed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingIntro {
    pub plot: String,
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_rating: Option<String>,
    pub rotten_tomatoes: Option<String>,
    pub runtime: Option<String>,
}

/// Read the leading intro run of `entries` back into plot and header fields.
pub fn read_existing_intro(entries: &[SubtitleEntry]) -> ExistingIntro {
    let flags = classify(entries, DetectionMode::Standard);
    let run: Vec<&SubtitleEntry> = entries
        .iter()
        .zip(flags)
        .take_while(|(_, generated)| *generated)
        .map(|(entry, _)| entry)
        .collect();

    let mut intro = ExistingIntro::default();
    let Some((header, plot_entries)) = run.split_first() else {
        return intro;
    };

    let header_text = strip_tokens(&header.text);
    let lines: Vec<&str> = header_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(first) = lines.first() {
        let title_line = first.replace("<b>", "").replace("</b>", "");
        match YEAR_RE.captures(&title_line) {
            Some(caps) => {
                intro.year = caps.get(1).map(|m| m.as_str().to_string());
                let start = caps.get(0).map_or(title_line.len(), |m| m.start());
                intro.title = Some(title_line[..start].trim().to_string());
            }
            None => {
                let title = title_line.trim();
                if !title.to_lowercase().contains(&ATTRIBUTION.to_lowercase()) {
                    intro.title = Some(title.to_string());
                }
            }
        }
    }

    if let Some(info_line) = lines.iter().find(|l| l.contains("IMDb:")) {
        intro.imdb_rating = capture(&IMDB_RE, info_line);
        intro.rotten_tomatoes = capture(&RT_RE, info_line);
        intro.runtime = capture(&RUNTIME_RE, info_line);
    }

    intro.plot = plot_entries
        .iter()
        .map(|entry| {
            let text = strip_tokens(&entry.text).replace("<i>", "").replace("</i>", "");
            let text = text.trim();
            let text = text.strip_prefix("Plot:").unwrap_or(text);
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    intro
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}
