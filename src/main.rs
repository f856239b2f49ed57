// CLI entry point: wire the pipeline to a progress channel and render
// events as log lines on the control thread.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use wampytube::{
    capability, encode, util, AppConfig, CancelToken, Pipeline, ProgressEvent, ProgressSink,
};

#[derive(Parser)]
#[command(
    name = "wampytube",
    version,
    about = "Download YouTube videos and merge the best streams into an HEVC file"
)]
struct Cli {
    /// Video URL to download
    url: String,

    /// Output directory (defaults to ~/Downloads)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Progressive streams at or above this height skip the merge
    #[arg(long, default_value_t = 1080)]
    threshold: u32,

    /// Preferred container family
    #[arg(long, default_value = "mp4")]
    container: String,

    /// SOCKS5/HTTP proxy URL (e.g. socks5://127.0.0.1:1080)
    #[arg(long)]
    proxy: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = AppConfig::detect()
        .with_quality_threshold(cli.threshold)
        .with_preferred_container(cli.container)
        .with_proxy(cli.proxy);
    if let Some(dir) = cli.output {
        config = config.with_output_dir(dir);
    }

    let caps = capability::detect();
    log::info!(
        "System: {} \u{2022} {} threads",
        caps.gpu_model,
        util::logical_cpus()
    );
    match encode::ffmpeg_version(&config.ffmpeg_path) {
        Some(version) => log::info!("FFmpeg: {}", version),
        None => log::warn!("FFmpeg not found; merging adaptive streams will fail"),
    }

    let pipeline = Pipeline::new(config, caps);
    let (sink, mut events) = ProgressSink::channel();
    let cancel = CancelToken::new();

    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling...");
            cancel_on_signal.cancel();
        }
    });

    let url = cli.url.clone();
    let job = tokio::spawn(async move { pipeline.run(&url, sink, cancel).await });

    while let Some(event) = events.recv().await {
        render(&event);
    }

    match job.await {
        Ok(Ok(path)) => {
            log::info!("Download complete! Saved to: {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            log::error!("Download failed: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("Worker failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn render(event: &ProgressEvent) {
    match event {
        ProgressEvent::Inspecting { url } => {
            log::info!("Analyzing video streams: {}", url);
        }
        ProgressEvent::Selected {
            resolution,
            needs_merge,
        } => match resolution {
            Some(height) if *needs_merge => {
                log::info!("Best quality: {}p (separate audio, will merge)", height)
            }
            Some(height) => log::info!("Best quality: {}p (progressive)", height),
            None => log::info!("Best quality: unknown resolution"),
        },
        ProgressEvent::Download {
            phase,
            percent,
            received,
            total,
        } => match total {
            Some(total) => log::info!(
                "{}: {:.1}% ({} / {} bytes)",
                phase.label(),
                percent,
                received,
                total
            ),
            None => log::info!("{}: {} bytes", phase.label(), received),
        },
        ProgressEvent::EncodeStageStarted { backend } => {
            log::info!("Encoding with {}...", backend);
        }
        ProgressEvent::Encoding {
            percent,
            avg_fps,
            frame,
        } => {
            log::info!(
                "Encoding: {:.1}% \u{2022} {:.1} fps \u{2022} frame {}",
                percent,
                avg_fps,
                frame
            );
        }
        ProgressEvent::EncodeStageFailed { backend, detail } => {
            log::warn!("{} failed, falling back: {}", backend, detail);
        }
        ProgressEvent::Completed { path, stats } => {
            if let Some(stats) = stats {
                log::info!(
                    "Merged {} of footage ({} frames, {:.1} fps avg)",
                    util::format_duration(stats.duration_seconds as u64),
                    stats.total_frames,
                    stats.avg_fps
                );
            }
            log::info!("Saved: {}", path.display());
        }
    }
}
