// Stream selection - pure decision logic over a catalog snapshot
//
// Prefers a progressive stream when it is already high quality; otherwise
// pairs the best adaptive video with the best audio and asks for a merge.

use crate::errors::SelectError;
use crate::models::{SelectionResult, StreamDescriptor, StreamKind};

pub struct StreamSelector;

impl StreamSelector {
    /// Choose the best video/audio combination.
    ///
    /// Deterministic in (streams, threshold, container); calling it twice
    /// on the same catalog yields the same result.
    pub fn select(
        streams: &[StreamDescriptor],
        threshold: u32,
        container: &str,
    ) -> Result<SelectionResult, SelectError> {
        let best_progressive = streams
            .iter()
            .filter(|s| s.is_video() && s.progressive && s.container == container)
            .max_by_key(|s| s.resolution.unwrap_or(0));

        if let Some(progressive) = best_progressive {
            if progressive.resolution.unwrap_or(0) >= threshold {
                return Ok(SelectionResult {
                    video: progressive.clone(),
                    audio: None,
                    needs_merge: false,
                });
            }
        }

        let best_adaptive_video = streams
            .iter()
            .filter(|s| s.is_video() && s.adaptive && s.container == container)
            .max_by_key(|s| s.resolution.unwrap_or(0));

        let best_audio = streams
            .iter()
            .filter(|s| s.is_audio() && Self::audio_container_matches(s, container))
            .max_by_key(|s| s.bitrate_kbps.map(|b| (b * 100.0) as u32).unwrap_or(0));

        if let (Some(video), Some(audio)) = (best_adaptive_video, best_audio) {
            return Ok(SelectionResult {
                video: video.clone(),
                audio: Some(audio.clone()),
                needs_merge: true,
            });
        }

        // No adaptive pair: the sub-threshold progressive stream still beats nothing
        if let Some(progressive) = best_progressive {
            return Ok(SelectionResult {
                video: progressive.clone(),
                audio: None,
                needs_merge: false,
            });
        }

        Err(SelectError::NoStreamAvailable)
    }

    /// Extraction tools label MP4 audio as `m4a`; treat it as part of the
    /// mp4 family.
    fn audio_container_matches(stream: &StreamDescriptor, container: &str) -> bool {
        if stream.container == container {
            return true;
        }
        container == "mp4" && stream.container == "m4a"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progressive(height: u32) -> StreamDescriptor {
        StreamDescriptor {
            id: format!("prog-{}", height),
            kind: StreamKind::Video,
            resolution: Some(height),
            bitrate_kbps: None,
            container: "mp4".to_string(),
            progressive: true,
            adaptive: false,
            file_size: Some(height as u64 * 1_000_000),
            url: format!("https://cdn.example/prog-{}", height),
        }
    }

    fn adaptive_video(height: u32) -> StreamDescriptor {
        StreamDescriptor {
            id: format!("vid-{}", height),
            kind: StreamKind::Video,
            resolution: Some(height),
            bitrate_kbps: None,
            container: "mp4".to_string(),
            progressive: false,
            adaptive: true,
            file_size: Some(height as u64 * 2_000_000),
            url: format!("https://cdn.example/vid-{}", height),
        }
    }

    fn adaptive_audio(bitrate: f32) -> StreamDescriptor {
        StreamDescriptor {
            id: format!("aud-{}", bitrate as u32),
            kind: StreamKind::Audio,
            resolution: None,
            bitrate_kbps: Some(bitrate),
            container: "m4a".to_string(),
            progressive: false,
            adaptive: true,
            file_size: Some(3_000_000),
            url: format!("https://cdn.example/aud-{}", bitrate as u32),
        }
    }

    #[test]
    fn progressive_at_threshold_needs_no_merge() {
        let streams = vec![progressive(1080)];
        let result = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        assert_eq!(result.video.id, "prog-1080");
        assert!(result.audio.is_none());
        assert!(!result.needs_merge);
    }

    #[test]
    fn sub_threshold_progressive_prefers_adaptive_pair() {
        let streams = vec![
            progressive(720),
            progressive(480),
            adaptive_video(2160),
            adaptive_audio(128.0),
        ];
        let result = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        assert!(result.needs_merge);
        assert_eq!(result.video.id, "vid-2160");
        assert_eq!(result.audio.as_ref().unwrap().id, "aud-128");
    }

    #[test]
    fn highest_resolution_and_bitrate_win() {
        let streams = vec![
            progressive(360),
            adaptive_video(1080),
            adaptive_video(1440),
            adaptive_audio(48.0),
            adaptive_audio(160.0),
            adaptive_audio(128.0),
        ];
        let result = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        assert_eq!(result.video.resolution, Some(1440));
        assert_eq!(result.audio.as_ref().unwrap().bitrate_kbps, Some(160.0));
    }

    #[test]
    fn missing_adaptive_pair_falls_back_to_progressive() {
        // Adaptive video exists but there is no audio stream to pair it with
        let streams = vec![progressive(720), adaptive_video(2160)];
        let result = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        assert!(!result.needs_merge);
        assert_eq!(result.video.id, "prog-720");
    }

    #[test]
    fn empty_catalog_has_no_stream() {
        let err = StreamSelector::select(&[], 1080, "mp4").unwrap_err();
        assert_eq!(err, SelectError::NoStreamAvailable);
    }

    #[test]
    fn wrong_container_has_no_stream() {
        let mut webm = adaptive_video(1080);
        webm.container = "webm".to_string();
        let err = StreamSelector::select(&[webm], 1080, "mp4").unwrap_err();
        assert_eq!(err, SelectError::NoStreamAvailable);
    }

    #[test]
    fn selection_is_idempotent() {
        let streams = vec![
            progressive(720),
            adaptive_video(2160),
            adaptive_audio(128.0),
        ];
        let first = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        let second = StreamSelector::select(&streams, 1080, "mp4").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn merge_flag_tracks_audio_presence() {
        let with_pair = StreamSelector::select(
            &[progressive(480), adaptive_video(1080), adaptive_audio(128.0)],
            1080,
            "mp4",
        )
        .unwrap();
        assert_eq!(with_pair.needs_merge, with_pair.audio.is_some());

        let without_pair = StreamSelector::select(&[progressive(480)], 1080, "mp4").unwrap();
        assert_eq!(without_pair.needs_merge, without_pair.audio.is_some());
        assert!(without_pair.video.progressive);
    }
}
