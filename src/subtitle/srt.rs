// SRT subtitle format
use super::SubtitleEntry;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static TIMECODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2,}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2,}):(\d{2}):(\d{2}),(\d{3})")
        .expect("Invalid timecode regex")
});

/// Parse SRT content into entries.
///
/// Handles a leading BOM, CRLF/CR line endings and stray blank lines. Blocks whose
/// text is empty are dropped; malformed timecode lines are logged and skipped.
pub fn parse_srt(content: &str) -> Vec<SubtitleEntry> {
    let content = content.trim_start_matches('\u{feff}');
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = content.lines().collect();

    let mut entries = Vec::new();
    let n = lines.len();
    let mut i = 0;

    while i < n {
        let line = lines[i].trim();
        if line.is_empty() {
            i += 1;
            continue;
        }

        let Some((start_ms, end_ms)) = parse_timecode_line(line) else {
            if line.contains("-->") {
                warn!("Malformed timecode at line {}: {}", i + 1, line);
            }
            i += 1;
            continue;
        };

        let index = i
            .checked_sub(1)
            .and_then(|prev| lines[prev].trim().parse::<usize>().ok())
            .unwrap_or(0);

        i += 1;
        let mut text_lines: Vec<&str> = Vec::new();
        while i < n && !lines[i].trim().is_empty() && !TIMECODE_RE.is_match(lines[i]) {
            // A bare number directly followed by a timecode opens the next block
            if is_index_line(lines[i]) && i + 1 < n && TIMECODE_RE.is_match(lines[i + 1]) {
                break;
            }
            text_lines.push(lines[i]);
            i += 1;
        }

        let text = text_lines.join("\n").trim().to_string();
        if text.is_empty() {
            debug!("Dropping empty block at {}ms", start_ms);
        } else {
            entries.push(SubtitleEntry {
                index,
                start_ms,
                end_ms,
                text,
            });
        }
    }

    entries
}

/// Serialize entries as SRT, numbering them from 1 regardless of their stored index.
pub fn format_srt(entries: &[SubtitleEntry]) -> String {
    let mut out: Vec<String> = Vec::with_capacity(entries.len() * 4);
    for (i, entry) in entries.iter().enumerate() {
        out.push((i + 1).to_string());
        out.push(format!(
            "{} --> {}",
            format_timestamp(entry.start_ms),
            format_timestamp(entry.end_ms)
        ));
        // Blank lines inside a cue would terminate the block on re-read
        out.extend(
            entry
                .text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string),
        );
        out.push(String::new());
    }
    let joined = out.join("\n");
    format!("{}\n", joined.trim_end())
}

fn is_index_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

fn parse_timecode_line(line: &str) -> Option<(u64, u64)> {
    let caps = TIMECODE_RE.captures(line)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let start = to_ms(field(1)?, field(2)?, field(3)?, field(4)?)?;
    let end = to_ms(field(5)?, field(6)?, field(7)?, field(8)?)?;
    Some((start, end))
}

fn to_ms(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    if minutes > 59 || seconds > 59 {
        return None;
    }
    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes * 60_000 + seconds * 1000 + millis)
}

pub fn format_timestamp(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}
