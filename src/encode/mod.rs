// Encode orchestration - merge separate video/audio files into one HEVC
// container with an ordered hardware -> software fallback chain

mod progress;

pub use progress::{EncodeSnapshot, ProgressParser};

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::AppConfig;
use crate::errors::EncodeError;
use crate::models::{CapabilityRecord, EncodeStats};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::util::path_to_string;

/// One merge operation: two inputs, one output.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    /// Total duration from catalog metadata, used for percentages until
    /// the progress stream reports its own.
    pub duration_hint: Option<f64>,
}

/// The fallback chain, in the order stages are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    HardwareHevc,
    SoftwareHevc,
    SoftwareH264,
}

impl EncodeStage {
    pub const CHAIN: [EncodeStage; 3] = [
        EncodeStage::HardwareHevc,
        EncodeStage::SoftwareHevc,
        EncodeStage::SoftwareH264,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::HardwareHevc => "hardware-hevc",
            Self::SoftwareHevc => "software-hevc",
            Self::SoftwareH264 => "software-h264",
        }
    }

    /// The hardware stage is gated statically on the capability record;
    /// a host without an HEVC encoder never even attempts it.
    pub fn is_enabled(&self, caps: &CapabilityRecord) -> bool {
        match self {
            Self::HardwareHevc => caps.hardware_encoder_available && caps.hevc_supported,
            _ => true,
        }
    }

    /// Full ffmpeg argument list for this stage. Only the video codec
    /// settings differ between stages; audio is always AAC at 192k.
    pub fn args(&self, job: &EncodeJob, caps: &CapabilityRecord, threads: usize) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        let vaapi_device = match self {
            Self::HardwareHevc => caps.encoder_device_path.as_ref(),
            _ => None,
        };
        if let Some(device) = vaapi_device {
            args.push("-vaapi_device".into());
            args.push(path_to_string(device));
        }

        args.push("-i".into());
        args.push(path_to_string(&job.video_path));
        args.push("-i".into());
        args.push(path_to_string(&job.audio_path));

        match self {
            Self::HardwareHevc => {
                if vaapi_device.is_some() {
                    args.extend([
                        "-vf".into(),
                        "format=nv12,hwupload".into(),
                        "-c:v".into(),
                        "hevc_vaapi".into(),
                        "-qp".into(),
                        "28".into(),
                    ]);
                } else {
                    args.extend([
                        "-c:v".into(),
                        "hevc_videotoolbox".into(),
                        "-b:v".into(),
                        "6M".into(),
                    ]);
                }
            }
            Self::SoftwareHevc => {
                args.extend([
                    "-c:v".into(),
                    "libx265".into(),
                    "-crf".into(),
                    "28".into(),
                    "-preset".into(),
                    "medium".into(),
                    "-threads".into(),
                    threads.to_string(),
                ]);
            }
            Self::SoftwareH264 => {
                args.extend([
                    "-c:v".into(),
                    "libx264".into(),
                    "-crf".into(),
                    "23".into(),
                    "-preset".into(),
                    "medium".into(),
                    "-threads".into(),
                    threads.to_string(),
                ]);
            }
        }

        args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), "192k".into()]);
        args.extend(["-progress".into(), "pipe:1".into(), "-nostats".into()]);
        args.push(path_to_string(&job.output_path));
        args
    }
}

/// Executes a single stage. Split out so the fallback chain can be tested
/// without spawning real processes.
pub trait StageRunner: Send + Sync {
    fn run_stage(
        &self,
        stage: EncodeStage,
        job: &EncodeJob,
        args: &[String],
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<EncodeStats, String>;
}

/// Production runner: spawns ffmpeg, streams its stdout through the
/// progress parser, collects stderr on a side thread for diagnostics.
pub struct FfmpegRunner {
    ffmpeg_path: String,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }
}

impl StageRunner for FfmpegRunner {
    fn run_stage(
        &self,
        stage: EncodeStage,
        job: &EncodeJob,
        args: &[String],
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<EncodeStats, String> {
        log::info!("[Encode] {}: {} {}", stage.name(), self.ffmpeg_path, args.join(" "));

        let mut child = StdCommand::new(&self.ffmpeg_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to start ffmpeg: {}", e))?;

        let stdout = child.stdout.take().ok_or("Failed to capture stdout")?;
        let stderr = child.stderr.take().ok_or("Failed to capture stderr")?;

        let stderr_handle = std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            let mut lines = Vec::new();
            for line in reader.lines().map_while(Result::ok) {
                lines.push(line);
            }
            lines.join("\n")
        });

        let mut parser = ProgressParser::new(job.duration_hint);
        let reader = BufReader::new(stdout);
        for line in reader.lines().map_while(Result::ok) {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err("cancelled".to_string());
            }
            if let Some(snapshot) = parser.push_line(&line) {
                sink.emit(ProgressEvent::Encoding {
                    percent: snapshot.percent,
                    avg_fps: snapshot.avg_fps,
                    frame: snapshot.frame,
                });
            }
        }

        let status = child
            .wait()
            .map_err(|e| format!("Process error: {}", e))?;
        let stderr_output = stderr_handle.join().unwrap_or_default();

        if status.success() {
            Ok(parser.stats())
        } else {
            // Keep the tail; ffmpeg's banner is pages long
            let tail: Vec<&str> = stderr_output
                .lines()
                .rev()
                .take(8)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            Err(tail.join("\n"))
        }
    }
}

pub struct EncodeOrchestrator {
    caps: CapabilityRecord,
    threads: usize,
    runner: Box<dyn StageRunner>,
}

impl EncodeOrchestrator {
    pub fn new(config: &AppConfig, caps: CapabilityRecord) -> Self {
        Self {
            caps,
            threads: config.encoder_threads,
            runner: Box::new(FfmpegRunner::new(config.ffmpeg_path.clone())),
        }
    }

    pub fn with_runner(caps: CapabilityRecord, threads: usize, runner: Box<dyn StageRunner>) -> Self {
        Self {
            caps,
            threads,
            runner,
        }
    }

    /// Walk the fallback chain until a stage succeeds. Stage failures are
    /// recovered locally (log + next stage); only exhausting the chain is
    /// an error, and the caller's source files stay on disk in that case.
    pub fn encode(
        &self,
        job: &EncodeJob,
        sink: &ProgressSink,
        cancel: &CancelToken,
    ) -> Result<EncodeStats, EncodeError> {
        for stage in EncodeStage::CHAIN {
            if !stage.is_enabled(&self.caps) {
                log::info!(
                    "[Encode] Skipping {}: no hardware HEVC on this host",
                    stage.name()
                );
                continue;
            }

            sink.emit(ProgressEvent::EncodeStageStarted {
                backend: stage.name().to_string(),
            });

            let args = stage.args(job, &self.caps, self.threads);
            match self.runner.run_stage(stage, job, &args, sink, cancel) {
                Ok(stats) => {
                    log::info!(
                        "[Encode] {} succeeded: {} frames at {:.1} fps",
                        stage.name(),
                        stats.total_frames,
                        stats.avg_fps
                    );
                    return Ok(stats);
                }
                Err(detail) => {
                    if cancel.is_cancelled() {
                        return Err(EncodeError::Cancelled);
                    }
                    log::warn!("[Encode] {} failed: {}", stage.name(), detail);
                    sink.emit(ProgressEvent::EncodeStageFailed {
                        backend: stage.name().to_string(),
                        detail,
                    });
                }
            }
        }

        Err(EncodeError::AllEncodersFailed)
    }
}

/// First version token from `ffmpeg -version`, if the binary runs.
pub fn ffmpeg_version(ffmpeg_path: &str) -> Option<String> {
    lazy_static! {
        static ref VERSION_RE: Regex = Regex::new(r"ffmpeg version (\S+)").unwrap();
    }

    let output = StdCommand::new(ffmpeg_path).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    VERSION_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
