use crate::types::marker::FrameRange;

/// Frame rate assumed when the source does not report one.
pub const FALLBACK_FPS: f64 = 30.0;

/// A span of the source in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Converts exported frame ranges back into seconds.
pub fn frames_to_time_ranges(frames: &[FrameRange], fps: f64) -> Vec<TimeRange> {
    let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
    frames
        .iter()
        .map(|range| {
            TimeRange::new(
                range.start_frame as f64 / fps,
                range.end_frame as f64 / fps,
            )
        })
        .collect()
}

/// Sorts ranges by start and folds together any that overlap.
pub fn merge_overlapping(ranges: &[TimeRange]) -> Vec<TimeRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(last) if range.start < last.end => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// The parts of `[0, duration]` that survive once `removed` is cut out.
/// Empty when nothing is left to keep.
pub fn kept_ranges(removed: &[TimeRange], duration: f64) -> Vec<TimeRange> {
    let mut kept = Vec::new();
    let mut cursor = 0.0;
    for range in merge_overlapping(removed) {
        let start = range.start.clamp(0.0, duration);
        if start > cursor {
            kept.push(TimeRange::new(cursor, start));
        }
        cursor = f64::max(cursor, range.end.min(duration));
    }
    if cursor < duration {
        kept.push(TimeRange::new(cursor, duration));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_to_time_ranges() {
        let ranges = frames_to_time_ranges(&[FrameRange::new(300, 600)], 30.0);
        assert_eq!(ranges, vec![TimeRange::new(10.0, 20.0)]);
    }

    #[test]
    fn test_frames_to_time_ranges_falls_back_to_30fps() {
        let ranges = frames_to_time_ranges(&[FrameRange::new(30, 60)], 0.0);
        assert_eq!(ranges, vec![TimeRange::new(1.0, 2.0)]);
    }

    #[test]
    fn test_merge_overlapping_folds_and_sorts() {
        let merged = merge_overlapping(&[
            TimeRange::new(50.0, 60.0),
            TimeRange::new(10.0, 20.0),
            TimeRange::new(15.0, 30.0),
            TimeRange::new(30.0, 35.0),
        ]);
        assert_eq!(
            merged,
            vec![
                TimeRange::new(10.0, 30.0),
                TimeRange::new(30.0, 35.0),
                TimeRange::new(50.0, 60.0)
            ]
        );
    }

    #[test]
    fn test_merge_contained_range() {
        let merged = merge_overlapping(&[TimeRange::new(0.0, 50.0), TimeRange::new(10.0, 20.0)]);
        assert_eq!(merged, vec![TimeRange::new(0.0, 50.0)]);
    }

    #[test]
    fn test_kept_ranges_between_removals() {
        let kept = kept_ranges(
            &[TimeRange::new(10.0, 20.0), TimeRange::new(40.0, 50.0)],
            120.0,
        );
        assert_eq!(
            kept,
            vec![
                TimeRange::new(0.0, 10.0),
                TimeRange::new(20.0, 40.0),
                TimeRange::new(50.0, 120.0)
            ]
        );
    }

    #[test]
    fn test_kept_ranges_at_edges() {
        let kept = kept_ranges(
            &[TimeRange::new(0.0, 5.0), TimeRange::new(100.0, 130.0)],
            120.0,
        );
        assert_eq!(kept, vec![TimeRange::new(5.0, 100.0)]);
    }

    #[test]
    fn test_removing_everything_keeps_nothing() {
        assert!(kept_ranges(&[TimeRange::new(0.0, 120.0)], 120.0).is_empty());
    }

    #[test]
    fn test_no_removals_keeps_whole_video() {
        assert_eq!(kept_ranges(&[], 60.0), vec![TimeRange::new(0.0, 60.0)]);
    }
}
