// Parsing of the encoder's line-oriented progress stream
//
// ffmpeg (`-progress pipe:1`) writes key=value lines. Three keys matter
// here: elapsed time in the job, reported total duration, and the current
// frame count. Everything else is ignored.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::EncodeStats;

/// Trailing window for the rolling fps average, so startup transients do
/// not skew the number.
const FPS_WINDOW: Duration = Duration::from_secs(5);
const MAX_SAMPLES: usize = 120;
/// Minimum wall time between two emitted snapshots.
const EMIT_INTERVAL: Duration = Duration::from_millis(500);

/// One parsed progress observation, ready for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSnapshot {
    pub percent: f32,
    pub avg_fps: f32,
    pub frame: u64,
}

/// Stateful parser for one encode invocation.
pub struct ProgressParser {
    duration: Option<f64>,
    elapsed: f64,
    frame: u64,
    samples: VecDeque<(Instant, u64)>,
    first_sample: Option<Instant>,
    last_sample: Option<Instant>,
    last_emit: Option<Instant>,
}

impl ProgressParser {
    /// `duration_hint` seeds the total duration until the stream reports
    /// its own `duration=` line.
    pub fn new(duration_hint: Option<f64>) -> Self {
        Self {
            duration: duration_hint.filter(|d| *d > 0.0),
            elapsed: 0.0,
            frame: 0,
            samples: VecDeque::new(),
            first_sample: None,
            last_sample: None,
            last_emit: None,
        }
    }

    /// Feed one line. Returns a snapshot when the line updated the state
    /// and the emit throttle allows another update.
    pub fn push_line(&mut self, line: &str) -> Option<EncodeSnapshot> {
        self.push_line_at(line, Instant::now())
    }

    fn push_line_at(&mut self, line: &str, now: Instant) -> Option<EncodeSnapshot> {
        let line = line.trim();
        let mut updated = false;

        if let Some(value) = line.strip_prefix("out_time_ms=") {
            // out_time_ms carries microseconds, not milliseconds
            if let Ok(us) = value.trim().parse::<i64>() {
                self.elapsed = us.max(0) as f64 / 1_000_000.0;
                updated = true;
            }
        } else if let Some(value) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = value.trim().parse::<i64>() {
                self.elapsed = us.max(0) as f64 / 1_000_000.0;
                updated = true;
            }
        } else if let Some(value) = line.strip_prefix("out_time=") {
            if let Some(secs) = parse_clock(value.trim()) {
                self.elapsed = secs;
                updated = true;
            }
        } else if let Some(value) = line.strip_prefix("duration=") {
            if let Ok(secs) = value.trim().parse::<f64>() {
                if secs > 0.0 {
                    self.duration = Some(secs);
                }
            }
        } else if let Some(value) = line.strip_prefix("frame=") {
            if let Ok(n) = value.trim().parse::<u64>() {
                self.frame = n;
                self.record_sample(now);
                updated = true;
            }
        }

        if !updated {
            return None;
        }

        if self
            .last_emit
            .map_or(false, |t| now.duration_since(t) < EMIT_INTERVAL)
        {
            return None;
        }
        self.last_emit = Some(now);
        Some(self.snapshot())
    }

    fn record_sample(&mut self, now: Instant) {
        self.first_sample.get_or_insert(now);
        self.last_sample = Some(now);
        self.samples.push_back((now, self.frame));
        while let Some((t, _)) = self.samples.front() {
            if now.duration_since(*t) > FPS_WINDOW || self.samples.len() > MAX_SAMPLES {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> EncodeSnapshot {
        let percent = self
            .duration
            .filter(|d| *d > 0.0)
            .map(|d| ((self.elapsed / d) * 100.0).clamp(0.0, 100.0) as f32)
            .unwrap_or(0.0);

        EncodeSnapshot {
            percent,
            avg_fps: self.window_fps(),
            frame: self.frame,
        }
    }

    /// Rolling average over the trailing sample window.
    fn window_fps(&self) -> f32 {
        let (first, last) = match (self.samples.front(), self.samples.back()) {
            (Some(f), Some(l)) if l.0 > f.0 => (f, l),
            _ => return 0.0,
        };
        let dt = last.0.duration_since(first.0).as_secs_f32();
        let frames = last.1.saturating_sub(first.1) as f32;
        frames / dt
    }

    /// Final counters for one finished invocation.
    pub fn stats(&self) -> EncodeStats {
        let avg_fps = match (self.first_sample, self.last_sample) {
            (Some(first), Some(last)) if last > first => {
                self.frame as f32 / last.duration_since(first).as_secs_f32()
            }
            _ => self.window_fps(),
        };
        EncodeStats {
            avg_fps,
            total_frames: self.frame,
            duration_seconds: self.elapsed,
        }
    }
}

/// Parse an ffmpeg clock value like `00:03:21.500000` into seconds.
fn parse_clock(value: &str) -> Option<f64> {
    lazy_static! {
        static ref CLOCK_RE: Regex = Regex::new(r"^(\d+):(\d{2}):(\d+(?:\.\d+)?)$").unwrap();
    }
    let caps = CLOCK_RE.captures(value)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
