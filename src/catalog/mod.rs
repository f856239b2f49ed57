// Stream catalog - the boundary to the external extraction tooling

mod ytdlp;

pub use ytdlp::YtDlpCatalog;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{CatalogError, DownloadError};
use crate::models::{StreamDescriptor, VideoSource};
use crate::progress::CancelToken;

/// Byte-level progress callback: (bytes received, total size when known).
pub type ByteProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Where stream metadata comes from and how bytes get to disk.
///
/// Implementations wrap an extraction tool; the rest of the pipeline only
/// sees descriptors and paths.
#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Name of the catalog backend (for logging)
    fn name(&self) -> &'static str;

    /// Whether the backing tool is installed and runnable
    fn is_available(&self) -> bool;

    /// Look a URL up and return its metadata plus every representation.
    async fn inspect(&self, url: &str) -> Result<VideoSource, CatalogError>;

    /// Fetch one representation into `dest_dir`, naming the file
    /// `<prefix><id>.<container>`. Blocking from the caller's point of
    /// view, with byte-by-byte progress callbacks.
    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        dest_dir: &Path,
        prefix: &str,
        progress: ByteProgress,
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError>;
}
