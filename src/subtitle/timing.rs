//! Reading-speed timing model.
//!
//! Display time grows with word count at a comfortable reading pace and is clamped so
//! text never flashes by or lingers after it has been read.

use super::marker::strip_tokens;
use tracing::debug;

/// Words per minute considered comfortable for on-screen text.
pub const READING_WPM: u64 = 160;
/// Shortest time any generated cue stays on screen.
pub const MIN_DURATION_MS: u64 = 1200;
/// Longest time any generated cue stays on screen.
pub const MAX_DURATION_MS: u64 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingModel {
    pub wpm: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for ReadingModel {
    fn default() -> Self {
        Self {
            wpm: READING_WPM,
            min_ms: MIN_DURATION_MS,
            max_ms: MAX_DURATION_MS,
        }
    }
}

impl ReadingModel {
    /// Display duration for `text` in milliseconds.
    pub fn duration_ms(&self, text: &str) -> u64 {
        let words = count_words(text);
        let duration = self.duration_for_words(words);
        debug!(
            "Reading time: {} words @ {} WPM -> {}ms",
            words, self.wpm, duration
        );
        duration
    }

    pub fn duration_for_words(&self, words: usize) -> u64 {
        let raw = if self.wpm == 0 {
            self.min_ms
        } else {
            words as u64 * 60_000 / self.wpm
        };
        raw.min(self.max_ms).max(self.min_ms)
    }
}

/// Count readable words: whitespace-delimited tokens left after removing sentinel
/// tokens.
///
/// Unlike a plain whitespace count, tokens without any letter or digit (icons,
/// dashes) are skipped. Callers wanting the literal count should use
/// `strip_tokens(text).split_whitespace().count()`.
pub fn count_words(text: &str) -> usize {
    strip_tokens(text)
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}
