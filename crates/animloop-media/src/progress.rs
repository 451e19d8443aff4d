//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress pipe:2` stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fold one `key=value` progress line into `self`.
    ///
    /// Returns a snapshot at each `progress=` line, which terminates a block.
    /// Returns `None` for keys that are not part of the progress protocol so
    /// callers can keep those lines as diagnostics.
    pub fn apply_line(&mut self, line: &str) -> Option<LineKind> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" | "out_time_ms" => {
                // FFmpeg reports microseconds under both keys
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
                Some(LineKind::Field)
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
                Some(LineKind::Field)
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
                Some(LineKind::Field)
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                Some(LineKind::Snapshot(self.clone()))
            }
            "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
            | "stream_0_0_q" => Some(LineKind::Field),
            _ => None,
        }
    }
}

/// Classification of a progress protocol line.
#[derive(Debug, Clone)]
pub enum LineKind {
    Field,
    Snapshot(FfmpegProgress),
}
