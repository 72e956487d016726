pub mod batch;
pub mod config;
pub mod error;
pub mod lock;
pub mod metadata;
pub mod processor;
pub mod subtitle;

pub use batch::{print_summary, BatchRunner, BatchStats, FileResult};
pub use config::Config;
pub use error::{ErrorKind, Result, SublogueError};
pub use lock::{FileLocker, LockGuard, MarkerFileLocker};
pub use metadata::{
    BasicTitleCleaner, CatalogProvider, MediaIdentity, MetadataProvider, MetadataRecord,
    TitleCleaner,
};
pub use processor::{
    ProcessOptions, ProcessReport, ProcessStatus, ProcessSuccess, ProcessorSettings,
    SubtitleProcessor,
};
