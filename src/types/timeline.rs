use tracing::debug;

use crate::error::{Result, TrimError};
use crate::types::marker::{MIN_SEGMENT_WIDTH, Marker, MarkerKind, Segment};

/// Marker and segment state behind the timeline strip.
///
/// Markers are kept in insertion order. Every finalized segment is mirrored by
/// exactly one start and one end marker carrying its index as `segment_id`.
/// At most one start marker may be waiting for its end; its `segment_id` is
/// always `segments.len()`.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    markers: Vec<Marker>,
    segments: Vec<Segment>,
    selected: Option<usize>,
    dragging: Option<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Index of the start marker still waiting for its end, if any.
    pub fn open_start(&self) -> Option<usize> {
        let open_id = self.segments.len();
        self.markers.iter().position(|m| m.segment_id == open_id)
    }

    /// Kind of marker the next `add_marker` call would create.
    pub fn expected_kind(&self) -> MarkerKind {
        if self.open_start().is_some() {
            MarkerKind::End
        } else {
            MarkerKind::Start
        }
    }

    /// Index of the other marker of the same segment.
    pub fn paired_index(&self, index: usize) -> Option<usize> {
        let marker = self.markers.get(index)?;
        self.markers
            .iter()
            .enumerate()
            .find(|(i, m)| {
                *i != index && m.segment_id == marker.segment_id && m.kind != marker.kind
            })
            .map(|(i, _)| i)
    }

    /// Places a marker at `time`. Opens a new segment when none is waiting for
    /// its end, otherwise closes the open one.
    pub fn add_marker(&mut self, time: f64) -> Result<MarkerKind> {
        match self.open_start() {
            None => {
                let segment_id = self.segments.len();
                self.markers.push(Marker::start(time, segment_id));
                self.selected = Some(self.markers.len() - 1);
                debug!(segment_id, time, "start marker placed");
                Ok(MarkerKind::Start)
            }
            Some(open) => {
                let start = self.markers[open].time;
                if time <= start {
                    return Err(TrimError::InvalidEndPoint { start, end: time });
                }
                let segment_id = self.segments.len();
                self.segments.push(Segment::new(start, time));
                self.markers.push(Marker::end(time, segment_id));
                self.selected = Some(self.markers.len() - 1);
                debug!(segment_id, start, end = time, "segment closed");
                Ok(MarkerKind::End)
            }
        }
    }

    /// Deletes the marker at `index` (or the selected one) together with its
    /// segment and paired marker. Returns false when there is nothing to delete.
    pub fn delete_marker(&mut self, index: Option<usize>) -> bool {
        let Some(target) = index.or(self.selected) else {
            return false;
        };
        if target >= self.markers.len() {
            return false;
        }

        let segment_id = self.markers[target].segment_id;
        let mut removed = vec![target];
        if segment_id < self.segments.len() {
            if let Some(paired) = self.paired_index(target) {
                removed.push(paired);
            }
            self.segments.remove(segment_id);
            for marker in &mut self.markers {
                if marker.segment_id > segment_id {
                    marker.segment_id -= 1;
                }
            }
        }

        // Highest index first so the lower one stays valid.
        removed.sort_unstable_by(|a, b| b.cmp(a));
        for idx in &removed {
            self.markers.remove(*idx);
        }

        self.selected = self.selected.and_then(|sel| {
            if removed.contains(&sel) {
                None
            } else {
                Some(sel - removed.iter().filter(|&&r| r < sel).count())
            }
        });
        self.dragging = None;
        debug!(segment_id, removed = removed.len(), "marker deleted");
        true
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.segments.clear();
        self.selected = None;
        self.dragging = None;
    }

    /// Selects a marker by index and returns its time.
    pub fn select(&mut self, index: usize) -> Option<f64> {
        let time = self.markers.get(index)?.time;
        self.selected = Some(index);
        Some(time)
    }

    /// Moves the selection forward in insertion order, wrapping at the end.
    pub fn select_next(&mut self) -> Option<f64> {
        let count = self.markers.len();
        if count == 0 {
            return None;
        }
        let next = match self.selected {
            Some(sel) if sel < count => (sel + 1) % count,
            _ => 0,
        };
        self.select(next)
    }

    /// Moves the selection backward in insertion order, wrapping at the start.
    pub fn select_previous(&mut self) -> Option<f64> {
        let count = self.markers.len();
        if count == 0 {
            return None;
        }
        let previous = match self.selected {
            Some(sel) if sel < count => (sel + count - 1) % count,
            _ => count - 1,
        };
        self.select(previous)
    }

    pub fn begin_drag(&mut self, index: usize) -> bool {
        if index >= self.markers.len() {
            return false;
        }
        self.dragging = Some(index);
        self.selected = Some(index);
        true
    }

    /// Moves the dragged marker towards `time` and returns where it landed.
    ///
    /// The time is clamped to `[0, duration]` and kept at least
    /// `MIN_SEGMENT_WIDTH` away from the paired marker on the correct side.
    pub fn drag_to(&mut self, time: f64, duration: f64) -> Option<f64> {
        let index = self.dragging?;
        let marker = self.markers.get(index)?;
        let (kind, segment_id) = (marker.kind, marker.segment_id);
        let upper = duration.max(0.0);

        let mut time = time.clamp(0.0, upper);
        if let Some(paired) = self.paired_index(index) {
            let paired_time = self.markers[paired].time;
            time = match kind {
                MarkerKind::Start => time.min(paired_time - MIN_SEGMENT_WIDTH).max(0.0),
                MarkerKind::End => time.max(paired_time + MIN_SEGMENT_WIDTH).min(upper),
            };
        }

        self.markers[index].time = time;
        if let Some(segment) = self.segments.get_mut(segment_id) {
            segment.set_boundary(kind, time);
        }
        Some(time)
    }

    pub fn end_drag(&mut self) {
        self.dragging = None;
    }

    /// Finalized segments in ascending start order.
    pub fn segments_sorted(&self) -> Vec<Segment> {
        let mut sorted = self.segments.clone();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_with(times: &[f64]) -> Timeline {
        let mut timeline = Timeline::new();
        for &t in times {
            timeline.add_marker(t).unwrap();
        }
        timeline
    }

    fn assert_ids_contiguous(timeline: &Timeline) {
        let count = timeline.segments().len();
        for marker in timeline.markers() {
            assert!(marker.segment_id <= count, "dangling id {}", marker.segment_id);
        }
        for id in 0..count {
            let starts = timeline
                .markers()
                .iter()
                .filter(|m| m.segment_id == id && m.kind == MarkerKind::Start)
                .count();
            let ends = timeline
                .markers()
                .iter()
                .filter(|m| m.segment_id == id && m.kind == MarkerKind::End)
                .count();
            assert_eq!((starts, ends), (1, 1), "segment {id} is not paired");
        }
    }

    #[test]
    fn test_increasing_markers_pair_in_call_order() {
        let timeline = timeline_with(&[1.0, 2.0, 5.0, 9.0, 12.0, 13.5]);
        assert_eq!(
            timeline.segments(),
            &[
                Segment::new(1.0, 2.0),
                Segment::new(5.0, 9.0),
                Segment::new(12.0, 13.5)
            ]
        );
        assert!(timeline.segments().iter().all(|s| s.start < s.end));
        assert_ids_contiguous(&timeline);
    }

    #[test]
    fn test_first_marker_opens_segment_without_finalizing() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.add_marker(10.0).unwrap(), MarkerKind::Start);
        assert_eq!(timeline.markers().len(), 1);
        assert!(timeline.segments().is_empty());
        assert_eq!(timeline.open_start(), Some(0));
        assert_eq!(timeline.expected_kind(), MarkerKind::End);
        assert_eq!(timeline.selected(), Some(0));
    }

    #[test]
    fn test_end_at_or_before_start_is_rejected() {
        let mut timeline = timeline_with(&[10.0]);
        let before = timeline.clone();

        let err = timeline.add_marker(5.0).unwrap_err();
        assert!(matches!(err, TrimError::InvalidEndPoint { .. }));
        assert!(err.is_user_warning());
        assert!(timeline.add_marker(10.0).is_err());

        assert_eq!(timeline.markers(), before.markers());
        assert_eq!(timeline.segments(), before.segments());
        assert_eq!(timeline.selected(), before.selected());
    }

    #[test]
    fn test_closing_marker_is_selected() {
        let timeline = timeline_with(&[10.0, 20.0]);
        assert_eq!(timeline.selected(), Some(1));
        assert_eq!(timeline.open_start(), None);
        assert_eq!(timeline.expected_kind(), MarkerKind::Start);
    }

    #[test]
    fn test_delete_removes_pair_and_shifts_ids() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(timeline.delete_marker(Some(2)));
        assert_eq!(timeline.markers().len(), 4);
        assert_eq!(
            timeline.segments(),
            &[Segment::new(1.0, 2.0), Segment::new(5.0, 6.0)]
        );
        assert_eq!(timeline.markers()[2].segment_id, 1);
        assert_eq!(timeline.markers()[3].segment_id, 1);
        assert_ids_contiguous(&timeline);
    }

    #[test]
    fn test_delete_end_marker_removes_its_start() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0]);
        assert!(timeline.delete_marker(Some(1)));
        assert_eq!(timeline.segments(), &[Segment::new(3.0, 4.0)]);
        assert_eq!(timeline.markers()[0].time, 3.0);
        assert_ids_contiguous(&timeline);
    }

    #[test]
    fn test_delete_keeps_open_start_pointing_past_segments() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0, 7.0]);
        assert_eq!(timeline.open_start(), Some(4));
        assert!(timeline.delete_marker(Some(0)));
        assert_eq!(timeline.segments().len(), 1);
        assert_eq!(timeline.open_start(), Some(2));
        assert_eq!(timeline.markers()[2].segment_id, 1);

        // The open start still closes into a valid segment.
        timeline.add_marker(8.0).unwrap();
        assert_eq!(timeline.segments()[1], Segment::new(7.0, 8.0));
        assert_ids_contiguous(&timeline);
    }

    #[test]
    fn test_delete_lone_open_start() {
        let mut timeline = timeline_with(&[1.0, 2.0, 7.0]);
        assert!(timeline.delete_marker(Some(2)));
        assert_eq!(timeline.markers().len(), 2);
        assert_eq!(timeline.segments().len(), 1);
        assert_eq!(timeline.open_start(), None);
    }

    #[test]
    fn test_delete_defaults_to_selection_and_updates_it() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0]);
        timeline.select(3);
        assert!(timeline.delete_marker(None));
        assert_eq!(timeline.selected(), None);
        assert_eq!(timeline.markers().len(), 2);

        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0]);
        timeline.select(3);
        assert!(timeline.delete_marker(Some(0)));
        assert_eq!(timeline.selected(), Some(1));
        assert_eq!(timeline.markers()[1].time, 4.0);
    }

    #[test]
    fn test_delete_without_target_fails() {
        let mut timeline = Timeline::new();
        assert!(!timeline.delete_marker(None));
        assert!(!timeline.delete_marker(Some(0)));

        let mut timeline = timeline_with(&[1.0, 2.0]);
        timeline.clear();
        timeline.add_marker(3.0).unwrap();
        assert!(!timeline.delete_marker(Some(5)));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0]);
        timeline.begin_drag(0);
        timeline.clear();
        assert!(timeline.is_empty());
        assert!(timeline.segments().is_empty());
        assert_eq!(timeline.selected(), None);
        assert_eq!(timeline.dragging(), None);
        assert!(timeline.segments_sorted().is_empty());
    }

    #[test]
    fn test_selection_wraps_in_insertion_order() {
        let mut timeline = timeline_with(&[30.0, 40.0, 10.0, 20.0]);
        timeline.clear_selection_for_test();
        assert_eq!(timeline.select_next(), Some(30.0));
        assert_eq!(timeline.select_next(), Some(40.0));
        assert_eq!(timeline.select_next(), Some(10.0));
        assert_eq!(timeline.select_next(), Some(20.0));
        assert_eq!(timeline.select_next(), Some(30.0));
        assert_eq!(timeline.select_previous(), Some(20.0));
        assert_eq!(timeline.selected(), Some(3));
    }

    #[test]
    fn test_select_previous_from_nothing_picks_last() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0]);
        timeline.clear_selection_for_test();
        assert_eq!(timeline.select_previous(), Some(3.0));
        assert_eq!(timeline.selected(), Some(2));
    }

    #[test]
    fn test_next_then_previous_returns_to_origin() {
        let mut timeline = timeline_with(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        for origin in 0..5 {
            timeline.select(origin);
            timeline.select_next();
            timeline.select_previous();
            assert_eq!(timeline.selected(), Some(origin));
        }
    }

    #[test]
    fn test_selection_on_empty_timeline_is_noop() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.select_next(), None);
        assert_eq!(timeline.select_previous(), None);
        assert_eq!(timeline.selected(), None);
    }

    #[test]
    fn test_drag_start_stops_short_of_end() {
        let mut timeline = timeline_with(&[10.0, 20.0]);
        assert!(timeline.begin_drag(0));
        let landed = timeline.drag_to(25.0, 120.0).unwrap();
        assert!((landed - 19.9).abs() < 1e-9);
        assert_eq!(timeline.segments()[0].start, landed);
        assert_eq!(timeline.markers()[0].time, landed);
    }

    #[test]
    fn test_drag_end_stops_short_of_start() {
        let mut timeline = timeline_with(&[10.0, 20.0]);
        assert!(timeline.begin_drag(1));
        let landed = timeline.drag_to(3.0, 120.0).unwrap();
        assert!((landed - 10.1).abs() < 1e-9);
        assert_eq!(timeline.segments()[0].end, landed);
    }

    #[test]
    fn test_drag_clamps_to_media_bounds() {
        let mut timeline = timeline_with(&[10.0, 20.0]);
        timeline.begin_drag(1);
        assert_eq!(timeline.drag_to(500.0, 120.0), Some(120.0));
        timeline.end_drag();
        timeline.begin_drag(0);
        assert_eq!(timeline.drag_to(-4.0, 120.0), Some(0.0));
        assert_eq!(timeline.segments()[0], Segment::new(0.0, 120.0));
    }

    #[test]
    fn test_drag_open_start_is_unconstrained_by_pair() {
        let mut timeline = timeline_with(&[10.0]);
        timeline.begin_drag(0);
        assert_eq!(timeline.drag_to(80.0, 120.0), Some(80.0));
        assert!(timeline.segments().is_empty());
    }

    #[test]
    fn test_drag_requires_active_drag() {
        let mut timeline = timeline_with(&[10.0, 20.0]);
        assert_eq!(timeline.drag_to(15.0, 120.0), None);
        timeline.begin_drag(0);
        timeline.end_drag();
        assert_eq!(timeline.drag_to(15.0, 120.0), None);
        assert!(!timeline.begin_drag(9));
    }

    #[test]
    fn test_segments_sorted_by_start() {
        let timeline = timeline_with(&[50.0, 60.0, 5.0, 8.0, 20.0, 30.0]);
        let starts: Vec<f64> = timeline.segments_sorted().iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![5.0, 20.0, 50.0]);
    }

    impl Timeline {
        fn clear_selection_for_test(&mut self) {
            self.selected = None;
        }
    }
}
