use std::path::PathBuf;

/// Slack, in frames, absorbed when converting a time back to a frame.
const FRAME_EPSILON: f64 = 1e-6;

/// What the timeline needs from whatever holds the loaded video.
pub trait MediaSource {
    /// Total length in seconds. Zero when nothing is loaded.
    fn duration(&self) -> f64;
    fn current_frame_index(&self) -> u64;
    fn time_from_frame(&self, frame: u64) -> f64;
    fn frame_at_time(&self, time: f64) -> u64;
    /// Requests `frame` be displayed. False when the index is out of range or
    /// the frame could not be produced.
    fn show_frame(&mut self, frame: u64) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
    pub duration: f64,
    pub codec: String,
    pub has_audio: bool,
}

impl VideoMetadata {
    /// Builds metadata from duration and frame rate, deriving the frame count.
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, fps: f64, duration: f64) -> Self {
        let total_frames = if fps > 0.0 && duration > 0.0 {
            (duration * fps).round() as u64
        } else {
            0
        };
        Self {
            path: path.into(),
            width,
            height,
            fps,
            total_frames,
            duration,
            codec: String::new(),
            has_audio: false,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn last_frame(&self) -> u64 {
        self.total_frames.saturating_sub(1)
    }

    /// Frame shown at `time`. Times produced by `time_from_frame` map back
    /// to the same frame despite float rounding.
    pub fn frame_at_time(&self, time: f64) -> u64 {
        if self.fps <= 0.0 || time <= 0.0 {
            return 0;
        }
        ((time * self.fps + FRAME_EPSILON).floor() as u64).min(self.last_frame())
    }

    pub fn time_from_frame(&self, frame: u64) -> f64 {
        if self.fps <= 0.0 {
            return 0.0;
        }
        frame as f64 / self.fps
    }

    pub fn contains_frame(&self, frame: u64) -> bool {
        frame < self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VideoMetadata {
        VideoMetadata::new("/videos/clip.mp4", 1920, 1080, 30.0, 120.0)
    }

    #[test]
    fn test_total_frames_derived_from_duration() {
        let meta = sample();
        assert_eq!(meta.total_frames, 3600);
        assert_eq!(meta.last_frame(), 3599);
        assert_eq!(meta.file_name(), "clip.mp4");
    }

    #[test]
    fn test_frame_at_time_truncates_and_clamps() {
        let meta = sample();
        assert_eq!(meta.frame_at_time(10.0), 300);
        assert_eq!(meta.frame_at_time(10.02), 300);
        assert_eq!(meta.frame_at_time(-3.0), 0);
        assert_eq!(meta.frame_at_time(500.0), 3599);
    }

    #[test]
    fn test_frame_time_round_trip() {
        for fps in [30.0, 25.0, 24000.0 / 1001.0, 30000.0 / 1001.0] {
            let meta = VideoMetadata::new("clip.mp4", 1920, 1080, fps, 7200.0);
            for frame in 0..meta.total_frames {
                assert_eq!(
                    meta.frame_at_time(meta.time_from_frame(frame)),
                    frame,
                    "fps {fps}"
                );
            }
        }
    }

    #[test]
    fn test_time_from_frame() {
        let meta = sample();
        assert_eq!(meta.time_from_frame(0), 0.0);
        assert_eq!(meta.time_from_frame(450), 15.0);
    }

    #[test]
    fn test_zero_fps_degrades_to_zero() {
        let meta = VideoMetadata::new("x.mp4", 0, 0, 0.0, 12.0);
        assert_eq!(meta.total_frames, 0);
        assert_eq!(meta.frame_at_time(5.0), 0);
        assert_eq!(meta.time_from_frame(40), 0.0);
        assert!(!meta.contains_frame(0));
    }
}
