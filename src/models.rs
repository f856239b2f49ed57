// Common data models shared by the catalog, selector and encoder

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a single stream representation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
}

/// One downloadable representation of a video, as reported by the catalog.
///
/// Progressive streams carry video and audio in one file and are tagged
/// `Video`; adaptive streams carry exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Catalog-side format id (e.g. "137", "140")
    pub id: String,
    pub kind: StreamKind,
    /// Video height in pixels (video streams)
    pub resolution: Option<u32>,
    /// Audio bitrate in kbps (audio streams)
    pub bitrate_kbps: Option<f32>,
    /// Container/extension (mp4, webm, m4a)
    pub container: String,
    /// Video and audio muxed into a single file
    pub progressive: bool,
    /// Single-track file that needs a merge to be playable
    pub adaptive: bool,
    /// File size in bytes, when the catalog reports one
    pub file_size: Option<u64>,
    /// Direct media URL to fetch this representation from
    pub url: String,
}

impl StreamDescriptor {
    pub fn is_video(&self) -> bool {
        self.kind == StreamKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == StreamKind::Audio
    }
}

/// Video-level metadata from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub webpage_url: String,
}

/// A video plus everything the catalog knows about its representations.
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub meta: VideoMeta,
    pub streams: Vec<StreamDescriptor>,
}

/// Outcome of stream selection for one download request.
///
/// Invariant: `needs_merge` is true iff `audio` is present; when it is
/// false, `video` is a progressive stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub video: StreamDescriptor,
    pub audio: Option<StreamDescriptor>,
    pub needs_merge: bool,
}

/// Hardware encoder capabilities, probed once at startup and read-only
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub gpu_model: String,
    pub hardware_encoder_available: bool,
    pub hevc_supported: bool,
    /// Render node to hand to the encoder (VAAPI hosts only)
    pub encoder_device_path: Option<PathBuf>,
}

impl CapabilityRecord {
    /// Record for a host with no usable hardware encoder.
    pub fn cpu_only() -> Self {
        Self {
            gpu_model: "CPU".to_string(),
            hardware_encoder_available: false,
            hevc_supported: false,
            encoder_device_path: None,
        }
    }
}

/// Counters accumulated over one encode invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodeStats {
    pub avg_fps: f32,
    pub total_frames: u64,
    pub duration_seconds: f64,
}
