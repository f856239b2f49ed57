pub mod capability;
pub mod catalog;
pub mod config;
pub mod download;
pub mod encode;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod selector;
pub mod util;

pub use config::AppConfig;
pub use errors::{CatalogError, DownloadError, EncodeError, PipelineError, SelectError};
pub use models::{
    CapabilityRecord, EncodeStats, SelectionResult, StreamDescriptor, StreamKind, VideoMeta,
    VideoSource,
};
pub use pipeline::Pipeline;
pub use progress::{CancelToken, DownloadPhase, ProgressEvent, ProgressSink};
pub use selector::StreamSelector;
