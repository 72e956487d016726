use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SublogueError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Subtitle file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("No valid subtitle blocks found")]
    NoSubtitles,

    #[error("No dialogue subtitles found after cleaning")]
    NoDialogue,

    #[error("No metadata found for '{0}'")]
    NoMetadata(String),

    #[error("Empty plot")]
    EmptyPlot,

    #[error("Could not acquire lock on {path} within {timeout:?}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Write failed: {0}")]
    Write(std::io::Error),

    #[error("Timing corruption: first original entry moved from {expected}ms to {actual}ms")]
    TimingCorruption { expected: u64, actual: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure categories callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NoMetadata,
    EmptyPlot,
    LockTimeout,
    Write,
    Internal,
}

impl SublogueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SublogueError::FileNotFound(_)
            | SublogueError::FileTooLarge { .. }
            | SublogueError::NoSubtitles
            | SublogueError::NoDialogue
            | SublogueError::Io(_)
            | SublogueError::Json(_)
            | SublogueError::Config(_) => ErrorKind::Input,
            SublogueError::NoMetadata(_) => ErrorKind::NoMetadata,
            SublogueError::EmptyPlot => ErrorKind::EmptyPlot,
            SublogueError::LockTimeout { .. } => ErrorKind::LockTimeout,
            SublogueError::Write(_) => ErrorKind::Write,
            SublogueError::TimingCorruption { .. } | SublogueError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SublogueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SublogueError::NoSubtitles.kind(), ErrorKind::Input);
        assert_eq!(SublogueError::EmptyPlot.kind(), ErrorKind::EmptyPlot);
        assert_eq!(
            SublogueError::NoMetadata("Heat".to_string()).kind(),
            ErrorKind::NoMetadata
        );
        let timeout = SublogueError::LockTimeout {
            path: PathBuf::from("a.srt"),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(timeout.kind(), ErrorKind::LockTimeout);
        assert!(timeout.to_string().contains("a.srt"));
    }
}
