pub mod chunk;
pub mod intro;
pub mod marker;
pub mod srt;
pub mod timing;

pub use chunk::{split_plot_into_chunks, wrap_for_tv, ChunkLimits};
pub use intro::{build_intro_blocks, render_header, FormatOptions, IntroConfig, IntroStrategy};
pub use marker::{
    has_generated_content, is_generated_text, sanitize_entries, sanitize_text,
    strip_generated_entries, DetectionMode, SENTINEL,
};
pub use srt::{format_srt, parse_srt};
pub use timing::{count_words, ReadingModel};

/// One SRT cue. Times are milliseconds from the start of the media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Re-number entries sequentially starting from 1. Timing is left untouched.
pub fn renumber_entries(entries: Vec<SubtitleEntry>) -> Vec<SubtitleEntry> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, mut entry)| {
            entry.index = i + 1;
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renumber_entries() {
        let entries = vec![
            SubtitleEntry::new(5, 0, 1000, "First"),
            SubtitleEntry::new(10, 2000, 3000, "Second"),
            SubtitleEntry::new(15, 4000, 5000, "Third"),
        ];

        let result = renumber_entries(entries);

        assert_eq!(result[0].index, 1);
        assert_eq!(result[1].index, 2);
        assert_eq!(result[2].index, 3);
        assert_eq!(result[1].start_ms, 2000);
        assert_eq!(result[2].end_ms, 5000);
    }
}
