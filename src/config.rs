// Process-wide configuration, built once at startup and passed by reference

use std::path::PathBuf;

use crate::util;

/// Everything the pipeline needs to know about its environment.
///
/// Built once in `main` (or a test) and handed by reference into the
/// selector, download orchestrator and encode orchestrator.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where downloads and the merged artifact land
    pub output_dir: PathBuf,
    /// Progressive streams at or above this height skip the merge (1080 by default)
    pub quality_threshold: u32,
    /// Container family used for filtering streams
    pub preferred_container: String,
    /// Concurrent fetch permits, capped at 4
    pub download_workers: usize,
    /// Threads handed to software encoders
    pub encoder_threads: usize,
    pub ffmpeg_path: String,
    pub ytdlp_path: String,
    /// SOCKS5/HTTP proxy URL for catalog and media fetches
    pub proxy: Option<String>,
    /// Timeout for catalog inspection, in seconds
    pub socket_timeout_secs: u64,
}

impl AppConfig {
    /// Build a config from the host environment.
    pub fn detect() -> Self {
        let threads = util::logical_cpus();
        Self {
            output_dir: util::home_downloads_dir(),
            quality_threshold: 1080,
            preferred_container: "mp4".to_string(),
            download_workers: (threads / 2).clamp(1, 4),
            encoder_threads: threads.saturating_sub(1).max(1),
            ffmpeg_path: util::find_ffmpeg(),
            ytdlp_path: util::find_program("yt-dlp"),
            proxy: None,
            socket_timeout_secs: 30,
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: u32) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_preferred_container(mut self, container: String) -> Self {
        self.preferred_container = container;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::detect()
    }
}
