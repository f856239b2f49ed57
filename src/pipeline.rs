// End-to-end job flow: inspect -> select -> download -> (maybe) merge

use std::path::PathBuf;
use std::sync::Arc;

use crate::capability;
use crate::catalog::{StreamCatalog, YtDlpCatalog};
use crate::config::AppConfig;
use crate::download::DownloadOrchestrator;
use crate::encode::{EncodeJob, EncodeOrchestrator};
use crate::errors::PipelineError;
use crate::models::{CapabilityRecord, EncodeStats};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::selector::StreamSelector;
use crate::util::sanitize_filename;

pub struct Pipeline {
    config: AppConfig,
    catalog: Arc<dyn StreamCatalog>,
    encoder: Arc<EncodeOrchestrator>,
}

impl Pipeline {
    pub fn new(config: AppConfig, caps: CapabilityRecord) -> Self {
        let catalog: Arc<dyn StreamCatalog> = Arc::new(YtDlpCatalog::new(&config));
        let encoder = Arc::new(EncodeOrchestrator::new(&config, caps));
        Self {
            config,
            catalog,
            encoder,
        }
    }

    /// Probe the host and build a pipeline in one go.
    pub fn detect(config: AppConfig) -> Self {
        let caps = capability::detect();
        Self::new(config, caps)
    }

    /// Assemble from explicit parts (tests swap in fakes here).
    pub fn with_parts(
        config: AppConfig,
        catalog: Arc<dyn StreamCatalog>,
        encoder: Arc<EncodeOrchestrator>,
    ) -> Self {
        Self {
            config,
            catalog,
            encoder,
        }
    }

    /// Run one download job to completion and return the final artifact
    /// path.
    pub async fn run(
        &self,
        url: &str,
        sink: ProgressSink,
        cancel: CancelToken,
    ) -> Result<PathBuf, PipelineError> {
        sink.emit(ProgressEvent::Inspecting {
            url: url.to_string(),
        });
        let source = self.catalog.inspect(url).await?;
        log::info!(
            "[Pipeline] \"{}\" by {} ({} streams)",
            source.meta.title,
            source.meta.uploader,
            source.streams.len()
        );

        let selection = StreamSelector::select(
            &source.streams,
            self.config.quality_threshold,
            &self.config.preferred_container,
        )?;
        sink.emit(ProgressEvent::Selected {
            resolution: selection.video.resolution,
            needs_merge: selection.needs_merge,
        });
        log::info!(
            "[Pipeline] Best quality found: {}p (merge: {})",
            selection.video.resolution.unwrap_or(0),
            selection.needs_merge
        );

        let downloader = DownloadOrchestrator::new(Arc::clone(&self.catalog), &self.config);
        let downloaded = downloader.run(&selection, &sink, &cancel).await?;

        let title = sanitize_filename(&source.meta.title);

        match downloaded.audio_path {
            Some(audio_path) => {
                let output_path = self.config.output_dir.join(format!("{}_HEVC.mp4", title));
                let job = EncodeJob {
                    video_path: downloaded.video_path.clone(),
                    audio_path: audio_path.clone(),
                    output_path: output_path.clone(),
                    duration_hint: Some(source.meta.duration_seconds as f64)
                        .filter(|d| *d > 0.0),
                };

                let stats = self.merge(job, &sink, &cancel).await?;

                // Merge landed; the two temp inputs are no longer needed.
                // On any failure above they stay behind for diagnosis.
                for temp in [&downloaded.video_path, &audio_path] {
                    if let Err(e) = std::fs::remove_file(temp) {
                        log::warn!("[Pipeline] Could not remove {}: {}", temp.display(), e);
                    }
                }

                sink.emit(ProgressEvent::Completed {
                    path: output_path.clone(),
                    stats: Some(stats),
                });
                Ok(output_path)
            }
            None => {
                let final_path = self
                    .config
                    .output_dir
                    .join(format!("{}.{}", title, selection.video.container));
                if downloaded.video_path != final_path {
                    tokio::fs::rename(&downloaded.video_path, &final_path)
                        .await
                        .map_err(crate::errors::DownloadError::from)?;
                }
                sink.emit(ProgressEvent::Completed {
                    path: final_path.clone(),
                    stats: None,
                });
                Ok(final_path)
            }
        }
    }

    /// The encoder blocks on a child process; keep it off the async
    /// workers.
    async fn merge(
        &self,
        job: EncodeJob,
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<EncodeStats, PipelineError> {
        let encoder = Arc::clone(&self.encoder);
        let sink = sink.clone();
        let cancel = cancel.clone();
        let stats = tokio::task::spawn_blocking(move || encoder.encode(&job, &sink, &cancel))
            .await
            .map_err(|e| PipelineError::Internal(format!("encode task panicked: {}", e)))??;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ByteProgress;
    use crate::encode::{EncodeStage, StageRunner};
    use crate::errors::{CatalogError, DownloadError, EncodeError};
    use crate::models::{StreamDescriptor, StreamKind, VideoMeta, VideoSource};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeCatalog {
        streams: Vec<StreamDescriptor>,
    }

    #[async_trait]
    impl StreamCatalog for FakeCatalog {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn inspect(&self, url: &str) -> Result<VideoSource, CatalogError> {
            Ok(VideoSource {
                meta: VideoMeta {
                    id: "abc123".to_string(),
                    title: "My Clip".to_string(),
                    uploader: "someone".to_string(),
                    duration_seconds: 60,
                    thumbnail: String::new(),
                    webpage_url: url.to_string(),
                },
                streams: self.streams.clone(),
            })
        }

        async fn fetch(
            &self,
            descriptor: &StreamDescriptor,
            dest_dir: &Path,
            prefix: &str,
            _progress: ByteProgress,
            _cancel: &CancelToken,
        ) -> Result<PathBuf, DownloadError> {
            let path =
                dest_dir.join(format!("{}{}.{}", prefix, descriptor.id, descriptor.container));
            tokio::fs::write(&path, b"bytes").await?;
            Ok(path)
        }
    }

    struct FailingRunner {
        attempts: Mutex<usize>,
    }

    impl StageRunner for FailingRunner {
        fn run_stage(
            &self,
            _stage: EncodeStage,
            _job: &EncodeJob,
            _args: &[String],
            _sink: &ProgressSink,
            _cancel: &CancelToken,
        ) -> Result<EncodeStats, String> {
            *self.attempts.lock().unwrap() += 1;
            Err("boom".to_string())
        }
    }

    struct TouchingRunner;

    impl StageRunner for TouchingRunner {
        fn run_stage(
            &self,
            _stage: EncodeStage,
            job: &EncodeJob,
            _args: &[String],
            _sink: &ProgressSink,
            _cancel: &CancelToken,
        ) -> Result<EncodeStats, String> {
            std::fs::write(&job.output_path, b"merged").map_err(|e| e.to_string())?;
            Ok(EncodeStats {
                avg_fps: 120.0,
                total_frames: 1440,
                duration_seconds: 60.0,
            })
        }
    }

    fn adaptive_catalog() -> FakeCatalog {
        FakeCatalog {
            streams: vec![
                StreamDescriptor {
                    id: "137".to_string(),
                    kind: StreamKind::Video,
                    resolution: Some(2160),
                    bitrate_kbps: None,
                    container: "mp4".to_string(),
                    progressive: false,
                    adaptive: true,
                    file_size: Some(5),
                    url: "u".to_string(),
                },
                StreamDescriptor {
                    id: "140".to_string(),
                    kind: StreamKind::Audio,
                    resolution: None,
                    bitrate_kbps: Some(128.0),
                    container: "m4a".to_string(),
                    progressive: false,
                    adaptive: true,
                    file_size: Some(5),
                    url: "u".to_string(),
                },
            ],
        }
    }

    fn progressive_catalog() -> FakeCatalog {
        FakeCatalog {
            streams: vec![StreamDescriptor {
                id: "22".to_string(),
                kind: StreamKind::Video,
                resolution: Some(1080),
                bitrate_kbps: None,
                container: "mp4".to_string(),
                progressive: true,
                adaptive: false,
                file_size: Some(5),
                url: "u".to_string(),
            }],
        }
    }

    fn pipeline_with(
        dir: &Path,
        catalog: FakeCatalog,
        runner: Box<dyn StageRunner>,
    ) -> Pipeline {
        let config = AppConfig::detect().with_output_dir(dir.to_path_buf());
        let encoder = Arc::new(EncodeOrchestrator::with_runner(
            CapabilityRecord::cpu_only(),
            2,
            runner,
        ));
        Pipeline::with_parts(config, Arc::new(catalog), encoder)
    }

    #[tokio::test]
    async fn merge_success_cleans_up_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(dir.path(), adaptive_catalog(), Box::new(TouchingRunner));

        let output = pipeline
            .run("https://y/x", ProgressSink::discard(), CancelToken::new())
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("My Clip_HEVC.mp4"));
        assert!(output.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with("video_") || name.starts_with("audio_")
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn failed_merge_preserves_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            dir.path(),
            adaptive_catalog(),
            Box::new(FailingRunner {
                attempts: Mutex::new(0),
            }),
        );

        let err = pipeline
            .run("https://y/x", ProgressSink::discard(), CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Encode(EncodeError::AllEncodersFailed)
        ));
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("video_")));
        assert!(names.iter().any(|n| n.starts_with("audio_")));
    }

    #[tokio::test]
    async fn progressive_download_skips_the_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            dir.path(),
            progressive_catalog(),
            Box::new(FailingRunner {
                attempts: Mutex::new(0),
            }),
        );

        let output = pipeline
            .run("https://y/x", ProgressSink::discard(), CancelToken::new())
            .await
            .unwrap();

        // Named after the title, no merge artifacts anywhere
        assert_eq!(output, dir.path().join("My Clip.mp4"));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn empty_catalog_surfaces_no_stream_available() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            dir.path(),
            FakeCatalog { streams: vec![] },
            Box::new(TouchingRunner),
        );

        let err = pipeline
            .run("https://y/x", ProgressSink::discard(), CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Select(_)));
    }
}
