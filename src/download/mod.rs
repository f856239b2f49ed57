// Download orchestration - one or two fetches per job
//
// The two-stream case runs video and audio concurrently on a small bounded
// pool; the merge stage is only reachable once both transfers resolved.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::catalog::{ByteProgress, StreamCatalog};
use crate::config::AppConfig;
use crate::errors::DownloadError;
use crate::models::{SelectionResult, StreamDescriptor};
use crate::progress::{CancelToken, DownloadPhase, ProgressEvent, ProgressSink};

const EMIT_INTERVAL: Duration = Duration::from_millis(250);

static NEXT_JOB: AtomicU64 = AtomicU64::new(0);

/// Per-job id used to prefix temp files, so concurrent jobs never target
/// the same paths without any locking.
fn next_job_id() -> String {
    let seq = NEXT_JOB.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", std::process::id(), seq)
}

/// Local files produced by one job's downloads.
#[derive(Debug)]
pub struct Downloaded {
    pub video_path: PathBuf,
    pub audio_path: Option<PathBuf>,
}

pub struct DownloadOrchestrator {
    catalog: Arc<dyn StreamCatalog>,
    workers: Arc<Semaphore>,
    output_dir: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(catalog: Arc<dyn StreamCatalog>, config: &AppConfig) -> Self {
        Self {
            catalog,
            workers: Arc::new(Semaphore::new(config.download_workers)),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Fetch the selected stream(s). Returns only when every transfer has
    /// resolved; if either of two transfers fails the whole job fails and
    /// nothing downstream runs.
    pub async fn run(
        &self,
        selection: &SelectionResult,
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Downloaded, DownloadError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let job_id = next_job_id();

        if let Some(audio) = &selection.audio {
            let video_task = self.spawn_fetch(
                selection.video.clone(),
                format!("video_{}_", job_id),
                DownloadPhase::Video,
                sink.clone(),
                cancel.clone(),
            );
            let audio_task = self.spawn_fetch(
                audio.clone(),
                format!("audio_{}_", job_id),
                DownloadPhase::Audio,
                sink.clone(),
                cancel.clone(),
            );

            let (video_path, audio_path) = tokio::try_join!(
                async { flatten(video_task).await },
                async { flatten(audio_task).await },
            )?;

            Ok(Downloaded {
                video_path,
                audio_path: Some(audio_path),
            })
        } else {
            let video_path = self
                .fetch_one(
                    selection.video.clone(),
                    String::new(),
                    DownloadPhase::Video,
                    sink.clone(),
                    cancel.clone(),
                )
                .await?;
            Ok(Downloaded {
                video_path,
                audio_path: None,
            })
        }
    }

    fn spawn_fetch(
        &self,
        descriptor: StreamDescriptor,
        prefix: String,
        phase: DownloadPhase,
        sink: ProgressSink,
        cancel: CancelToken,
    ) -> tokio::task::JoinHandle<Result<PathBuf, DownloadError>> {
        let catalog = Arc::clone(&self.catalog);
        let workers = Arc::clone(&self.workers);
        let dest_dir = self.output_dir.clone();

        tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| DownloadError::TaskFailed(e.to_string()))?;

            log::info!(
                "[Download] {} stream {} ({})",
                phase.label(),
                descriptor.id,
                descriptor.container
            );
            let progress = throttled_progress(sink.clone(), phase);
            let path = catalog
                .fetch(&descriptor, &dest_dir, &prefix, progress, &cancel)
                .await?;

            sink.emit(ProgressEvent::Download {
                phase,
                percent: 100.0,
                received: descriptor.file_size.unwrap_or(0),
                total: descriptor.file_size,
            });
            Ok(path)
        })
    }

    async fn fetch_one(
        &self,
        descriptor: StreamDescriptor,
        prefix: String,
        phase: DownloadPhase,
        sink: ProgressSink,
        cancel: CancelToken,
    ) -> Result<PathBuf, DownloadError> {
        flatten(self.spawn_fetch(descriptor, prefix, phase, sink, cancel)).await
    }
}

async fn flatten(
    handle: tokio::task::JoinHandle<Result<PathBuf, DownloadError>>,
) -> Result<PathBuf, DownloadError> {
    handle
        .await
        .map_err(|e| DownloadError::TaskFailed(e.to_string()))?
}

/// Wrap a sink into a byte callback that emits at most one event per
/// interval, so a fast transfer does not flood the channel.
fn throttled_progress(sink: ProgressSink, phase: DownloadPhase) -> ByteProgress {
    let last_emit: Mutex<Option<Instant>> = Mutex::new(None);
    Arc::new(move |received, total| {
        let now = Instant::now();
        let mut last = last_emit.lock().unwrap();
        let due = last.map_or(true, |t| now.duration_since(t) >= EMIT_INTERVAL);
        if !due {
            return;
        }
        *last = Some(now);
        drop(last);

        let percent = total
            .filter(|t| *t > 0)
            .map(|t| (received as f32 / t as f32) * 100.0)
            .unwrap_or(0.0);
        sink.emit(ProgressEvent::Download {
            phase,
            percent,
            received,
            total,
        });
    })
}
