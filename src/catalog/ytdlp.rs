// yt-dlp backed catalog
//
// Inspection shells out to the yt-dlp binary (`--dump-json`) and maps its
// format array onto StreamDescriptors. Fetching pulls the descriptor's
// direct media URL over HTTP, streaming chunks to disk.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{ByteProgress, StreamCatalog};
use crate::config::AppConfig;
use crate::errors::{CatalogError, DownloadError};
use crate::models::{StreamDescriptor, StreamKind, VideoMeta, VideoSource};
use crate::progress::CancelToken;
use crate::util::run_output_with_timeout;

pub struct YtDlpCatalog {
    ytdlp_path: String,
    client: reqwest::Client,
    proxy: Option<String>,
    timeout_secs: u64,
}

impl YtDlpCatalog {
    pub fn new(config: &AppConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy_url) = &config.proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => log::warn!("[Catalog] Ignoring invalid proxy {}: {}", proxy_url, e),
            }
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            client,
            proxy: config.proxy.clone(),
            timeout_secs: config.socket_timeout_secs,
        }
    }

    fn build_inspect_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.timeout_secs.to_string(),
            "--retries".to_string(),
            "2".to_string(),
        ];

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Map one dump-json document onto metadata plus descriptors.
    pub fn parse_dump(json: &serde_json::Value) -> Result<VideoSource, CatalogError> {
        let formats = json["formats"]
            .as_array()
            .ok_or_else(|| CatalogError::ParseError("No formats array in JSON".to_string()))?;

        let mut streams = Vec::new();
        for f in formats {
            if let Some(descriptor) = Self::parse_format(f) {
                streams.push(descriptor);
            }
        }

        let meta = VideoMeta {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
            thumbnail: json["thumbnail"].as_str().unwrap_or("").to_string(),
            webpage_url: json["webpage_url"].as_str().unwrap_or("").to_string(),
        };

        Ok(VideoSource { meta, streams })
    }

    fn parse_format(f: &serde_json::Value) -> Option<StreamDescriptor> {
        // Manifest-only entries carry no direct URL and cannot be fetched
        let url = f["url"].as_str()?;
        if url.is_empty() {
            return None;
        }

        let has_video = f["vcodec"].as_str().map_or(false, |v| v != "none" && !v.is_empty());
        let has_audio = f["acodec"].as_str().map_or(false, |a| a != "none" && !a.is_empty());

        let kind = if has_video {
            StreamKind::Video
        } else if has_audio {
            StreamKind::Audio
        } else {
            return None;
        };

        let progressive = has_video && has_audio;

        Some(StreamDescriptor {
            id: f["format_id"].as_str().unwrap_or("").to_string(),
            kind,
            resolution: f["height"].as_u64().map(|h| h as u32),
            bitrate_kbps: f["abr"]
                .as_f64()
                .or_else(|| f["tbr"].as_f64())
                .map(|b| b as f32),
            container: f["ext"].as_str().unwrap_or("").to_string(),
            progressive,
            adaptive: !progressive,
            file_size: f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64()),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl StreamCatalog for YtDlpCatalog {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        match StdCommand::new(&self.ytdlp_path).arg("--version").output() {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    async fn inspect(&self, url: &str) -> Result<VideoSource, CatalogError> {
        let args = self.build_inspect_args(url);
        log::debug!("[Catalog] {} {}", self.ytdlp_path, args.join(" "));

        let output = run_output_with_timeout(&self.ytdlp_path, &args, self.timeout_secs + 5)
            .await
            .map_err(CatalogError::ExecutionError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("[Catalog] inspection failed: {}", stderr.trim());
            return Err(CatalogError::classify(&stderr));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| CatalogError::ParseError(format!("Invalid JSON: {}", e)))?;

        Self::parse_dump(&json)
    }

    async fn fetch(
        &self,
        descriptor: &StreamDescriptor,
        dest_dir: &Path,
        prefix: &str,
        progress: ByteProgress,
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError> {
        let file_name = format!("{}{}.{}", prefix, descriptor.id, descriptor.container);
        let path = dest_dir.join(file_name);

        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DownloadError::BadStatus(response.status().to_string()));
        }

        let total = response.content_length().or(descriptor.file_size);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(received, total);
        }

        file.flush().await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump_fixture() -> serde_json::Value {
        json!({
            "id": "dQw4w9WgXcQ",
            "title": "Test Video",
            "uploader": "Tester",
            "duration": 212.0,
            "thumbnail": "https://i.ytimg.com/t.jpg",
            "webpage_url": "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "formats": [
                {
                    "format_id": "18",
                    "ext": "mp4",
                    "height": 360,
                    "vcodec": "avc1.42001E",
                    "acodec": "mp4a.40.2",
                    "filesize": 10_000_000,
                    "url": "https://cdn.example/18"
                },
                {
                    "format_id": "137",
                    "ext": "mp4",
                    "height": 1080,
                    "vcodec": "avc1.640028",
                    "acodec": "none",
                    "filesize": 80_000_000,
                    "url": "https://cdn.example/137"
                },
                {
                    "format_id": "140",
                    "ext": "m4a",
                    "vcodec": "none",
                    "acodec": "mp4a.40.2",
                    "abr": 129.5,
                    "filesize": 3_000_000,
                    "url": "https://cdn.example/140"
                },
                {
                    "format_id": "sb0",
                    "ext": "mhtml",
                    "vcodec": "none",
                    "acodec": "none",
                    "url": "https://cdn.example/storyboard"
                },
                {
                    "format_id": "hls",
                    "ext": "mp4",
                    "vcodec": "avc1",
                    "acodec": "mp4a",
                    "url": ""
                }
            ]
        })
    }

    #[test]
    fn parse_dump_maps_formats() {
        let source = YtDlpCatalog::parse_dump(&dump_fixture()).unwrap();
        assert_eq!(source.meta.title, "Test Video");
        assert_eq!(source.meta.duration_seconds, 212);
        // Storyboard and URL-less entries are dropped
        assert_eq!(source.streams.len(), 3);

        let progressive = &source.streams[0];
        assert!(progressive.progressive);
        assert!(!progressive.adaptive);
        assert_eq!(progressive.kind, StreamKind::Video);
        assert_eq!(progressive.resolution, Some(360));

        let adaptive_video = &source.streams[1];
        assert!(adaptive_video.adaptive);
        assert_eq!(adaptive_video.resolution, Some(1080));

        let audio = &source.streams[2];
        assert_eq!(audio.kind, StreamKind::Audio);
        assert_eq!(audio.container, "m4a");
        assert_eq!(audio.bitrate_kbps, Some(129.5));
    }

    #[test]
    fn parse_dump_without_formats_is_an_error() {
        let err = YtDlpCatalog::parse_dump(&json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, CatalogError::ParseError(_)));
    }
}
