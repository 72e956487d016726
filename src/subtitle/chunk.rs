//! Plot chunking for on-screen display.
//!
//! Every word of the plot lands in exactly one chunk; nothing is truncated or
//! ellipsized. Chunks prefer sentence boundaries and fall back to word boundaries
//! when a single sentence is longer than what fits on screen.

use super::timing::count_words;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Characters per line most TVs render without wrapping.
pub const TV_LINE_WIDTH: usize = 55;
/// Lines per cue kept readable at a glance.
pub const TV_MAX_LINES: usize = 2;
/// Chunks with fewer words than this are folded into their predecessor when they fit.
pub const MIN_WORDS_FOR_SEPARATE_CHUNK: usize = 6;

/// Display limits for plot chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub line_width: usize,
    pub max_lines: usize,
    pub min_words_per_chunk: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            line_width: TV_LINE_WIDTH,
            max_lines: TV_MAX_LINES,
            min_words_per_chunk: MIN_WORDS_FOR_SEPARATE_CHUNK,
        }
    }
}

impl ChunkLimits {
    pub fn max_chars(&self) -> usize {
        self.line_width * self.max_lines
    }
}

/// Split plot text into chunks that each fit the display budget.
pub fn split_plot_into_chunks(plot: &str, limits: &ChunkLimits) -> Vec<String> {
    if plot.trim().is_empty() {
        return Vec::new();
    }

    let max_chars = limits.max_chars();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(plot) {
        let candidate = join_words(&current, &sentence);
        if char_len(&candidate) <= max_chars {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if char_len(&sentence) <= max_chars {
            current = sentence;
            continue;
        }

        // Run-on sentence: fall back to word boundaries
        for word in sentence.split(' ') {
            let candidate = join_words(&current, word);
            if char_len(&candidate) <= max_chars {
                current = candidate;
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current = word.to_string();
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    let chunks = merge_small_trailing_chunks(chunks, limits);

    let original: HashSet<&str> = plot.split_whitespace().collect();
    let joined = chunks.join(" ");
    let chunked: HashSet<&str> = joined.split_whitespace().collect();
    if original != chunked {
        warn!(
            "Plot chunking changed the word set: {} words in, {} words out",
            original.len(),
            chunked.len()
        );
    }

    debug!(
        "Split plot into {} chunks: {:?} chars each",
        chunks.len(),
        chunks.iter().map(|c| char_len(c)).collect::<Vec<_>>()
    );

    chunks
}

/// Fold chunks that are too short to stand alone into the chunk before them.
fn merge_small_trailing_chunks(chunks: Vec<String>, limits: &ChunkLimits) -> Vec<String> {
    if chunks.len() <= 1 {
        return chunks;
    }

    let max_chars = limits.max_chars();
    let mut result = chunks;
    let mut i = result.len() - 1;

    while i > 0 {
        let words = count_words(&result[i]);
        if words < limits.min_words_per_chunk {
            let merged = format!("{} {}", result[i - 1], result[i]);
            if char_len(&merged) <= max_chars {
                debug!("Merged small chunk ({} words) into previous chunk", words);
                result[i - 1] = merged;
                result.remove(i);
            }
        }
        i -= 1;
    }

    result
}

/// Word-wrap text to `width` characters per line. Words longer than a line keep
/// a line of their own; no text is dropped.
pub fn wrap_for_tv(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = join_words(&current, word);
        if char_len(&candidate) <= width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Sentences end at `.`, `!` or `?` followed by whitespace. Internal whitespace is
/// normalized to single spaces.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        current = join_words(&current, word);
        if word.ends_with(['.', '!', '?']) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

fn join_words(current: &str, next: &str) -> String {
    if current.is_empty() {
        next.to_string()
    } else {
        format!("{} {}", current, next)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
