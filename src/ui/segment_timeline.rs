use eframe::egui::{self, Align2, Color32, Pos2, Rect, Sense, Stroke, pos2, vec2};
use tracing::debug;

use crate::error::Result;
use crate::renderer::surface::{DisplayList, DrawRole, PresentationSurface, Primitive};
use crate::types::marker::{FrameRange, MarkerKind};
use crate::types::media::MediaSource;
use crate::types::timeline::Timeline;

/// Height of the whole strip: track plus the time labels under it.
pub const TIMELINE_HEIGHT: f32 = 50.0;
pub const TRACK_HEIGHT: f32 = 30.0;
const FLAG_HEIGHT: f32 = 15.0;
const FLAG_HALF_WIDTH: f32 = 5.0;
const LABEL_Y: f32 = TRACK_HEIGHT + 10.0;

const TRACK_COLOR: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
const GRID_COLOR: Color32 = Color32::from_rgb(0x77, 0x77, 0x77);
const LABEL_COLOR: Color32 = Color32::WHITE;
const SEGMENT_COLOR: Color32 = Color32::from_rgba_premultiplied(0x90, 0x00, 0x00, 0x90);
const START_COLOR: Color32 = Color32::from_rgb(0x00, 0xFF, 0x00);
const END_COLOR: Color32 = Color32::from_rgb(0xFF, 0x00, 0x00);
const PLAYHEAD_COLOR: Color32 = Color32::WHITE;
const SELECTED_OUTLINE: Color32 = Color32::WHITE;

/// Linear mapping between seconds and surface pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeScale {
    pub duration: f64,
    pub width: f32,
}

impl TimeScale {
    pub fn new(duration: f64, width: f32) -> Self {
        Self { duration, width }
    }

    fn is_degenerate(&self) -> bool {
        !(self.duration > 0.0) || !(self.width > 0.0)
    }

    pub fn time_to_x(&self, time: f64) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        (time / self.duration * self.width as f64) as f32
    }

    pub fn x_to_time(&self, x: f32) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        x as f64 / self.width as f64 * self.duration
    }
}

/// Grid spacing in seconds for a video of `duration` seconds.
pub fn time_marker_interval(duration: f64) -> f64 {
    if duration <= 60.0 {
        10.0
    } else if duration <= 300.0 {
        30.0
    } else if duration <= 1800.0 {
        60.0
    } else {
        300.0
    }
}

/// `MM:SS`, or `H:MM:SS` once the time reaches an hour.
pub fn format_time_label(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// What a press on the strip turned into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PressOutcome {
    /// A marker was hit and is now being dragged.
    Grabbed(usize),
    /// Empty track was hit; the player moved to this time.
    Seeked(f64),
}

/// The marker strip under the video preview.
///
/// Owns the marker state, keeps the surface's layers in sync with it and maps
/// pointer input onto marker edits and seeks.
#[derive(Debug, Default)]
pub struct SegmentTimeline {
    timeline: Timeline,
    scale: TimeScale,
    playhead: f64,
    /// Screen bounds of each drawn marker, in draw order.
    hit_boxes: Vec<(usize, Rect)>,
}

impl SegmentTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    fn sync_scale(&mut self, surface: &impl PresentationSurface, media: &impl MediaSource) {
        self.scale = TimeScale::new(media.duration(), surface.width());
    }

    /// Re-reads the surface size and media duration and redraws every layer.
    pub fn update_canvas_size(
        &mut self,
        surface: &mut impl PresentationSurface,
        media: &impl MediaSource,
    ) {
        self.sync_scale(&*surface, media);
        self.draw_time_markers(surface);
        self.update_segments_visualization(surface);
        self.update_playhead_position(surface, self.playhead);
    }

    pub fn draw_time_markers(&self, surface: &mut impl PresentationSurface) {
        surface.clear(DrawRole::Background);
        surface.clear(DrawRole::TimeMarker);
        surface.draw(
            DrawRole::Background,
            Primitive::Rect {
                rect: Rect::from_min_max(Pos2::ZERO, pos2(surface.width(), TRACK_HEIGHT)),
                fill: TRACK_COLOR,
                outline: None,
            },
        );

        let duration = self.scale.duration;
        if self.scale.is_degenerate() {
            return;
        }
        let interval = time_marker_interval(duration);
        let mut tick = 0u32;
        loop {
            let time = tick as f64 * interval;
            if time > duration {
                break;
            }
            let x = self.scale.time_to_x(time);
            surface.draw(
                DrawRole::TimeMarker,
                Primitive::Line {
                    from: pos2(x, 0.0),
                    to: pos2(x, TRACK_HEIGHT),
                    stroke: Stroke::new(1.0, GRID_COLOR),
                },
            );
            surface.draw(
                DrawRole::TimeMarker,
                Primitive::Text {
                    pos: pos2(x, LABEL_Y),
                    align: Align2::CENTER_CENTER,
                    text: format_time_label(time),
                    size: 10.0,
                    color: LABEL_COLOR,
                },
            );
            tick += 1;
        }
    }

    fn marker_hit_box(x: f32, kind: MarkerKind) -> Rect {
        match kind {
            MarkerKind::Start => {
                Rect::from_min_max(pos2(x - 6.0, 0.0), pos2(x + 6.0, FLAG_HEIGHT + 1.0))
            }
            MarkerKind::End => Rect::from_min_max(
                pos2(x - 6.0, TRACK_HEIGHT - FLAG_HEIGHT - 1.0),
                pos2(x + 6.0, TRACK_HEIGHT),
            ),
        }
    }

    fn marker_flag(x: f32, kind: MarkerKind) -> Vec<Pos2> {
        match kind {
            // Hangs from the top edge, tip down.
            MarkerKind::Start => vec![
                pos2(x - FLAG_HALF_WIDTH, 0.0),
                pos2(x + FLAG_HALF_WIDTH, 0.0),
                pos2(x, FLAG_HEIGHT),
            ],
            // Stands on the bottom edge, tip up.
            MarkerKind::End => vec![
                pos2(x + FLAG_HALF_WIDTH, TRACK_HEIGHT),
                pos2(x - FLAG_HALF_WIDTH, TRACK_HEIGHT),
                pos2(x, TRACK_HEIGHT - FLAG_HEIGHT),
            ],
        }
    }

    /// Redraws segment spans and marker flags and rebuilds the hit-box index.
    pub fn update_segments_visualization(&mut self, surface: &mut impl PresentationSurface) {
        surface.clear(DrawRole::Segment);
        surface.clear(DrawRole::Marker);
        self.hit_boxes.clear();
        if self.scale.is_degenerate() {
            return;
        }

        for segment in self.timeline.segments() {
            let (x0, x1) = (
                self.scale.time_to_x(segment.start),
                self.scale.time_to_x(segment.end),
            );
            surface.draw(
                DrawRole::Segment,
                Primitive::Rect {
                    rect: Rect::from_min_max(pos2(x0, 0.0), pos2(x1, TRACK_HEIGHT)),
                    fill: SEGMENT_COLOR,
                    outline: None,
                },
            );
        }

        let selected = self.timeline.selected();
        for (index, marker) in self.timeline.markers().iter().enumerate() {
            let x = self.scale.time_to_x(marker.time);
            let color = match marker.kind {
                MarkerKind::Start => START_COLOR,
                MarkerKind::End => END_COLOR,
            };
            surface.draw(
                DrawRole::Marker,
                Primitive::Polygon {
                    points: Self::marker_flag(x, marker.kind),
                    fill: color,
                },
            );
            let hit_box = Self::marker_hit_box(x, marker.kind);
            if selected == Some(index) {
                surface.draw(
                    DrawRole::Marker,
                    Primitive::Rect {
                        rect: hit_box,
                        fill: Color32::TRANSPARENT,
                        outline: Some(Stroke::new(2.0, SELECTED_OUTLINE)),
                    },
                );
            }
            self.hit_boxes.push((index, hit_box));
        }
    }

    pub fn update_playhead_position(&mut self, surface: &mut impl PresentationSurface, time: f64) {
        self.playhead = time;
        surface.clear(DrawRole::Playhead);
        let x = self.scale.time_to_x(time);
        surface.draw(
            DrawRole::Playhead,
            Primitive::Line {
                from: pos2(x, 0.0),
                to: pos2(x, TRACK_HEIGHT),
                stroke: Stroke::new(2.0, PLAYHEAD_COLOR),
            },
        );
    }

    /// Topmost marker under `pos`. Later markers are drawn over earlier ones.
    pub fn marker_at(&self, pos: Pos2) -> Option<usize> {
        self.hit_boxes
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(pos))
            .map(|(index, _)| *index)
    }

    fn seek(
        &mut self,
        surface: &mut impl PresentationSurface,
        media: &mut impl MediaSource,
        time: f64,
    ) {
        let frame = media.frame_at_time(time);
        if !media.show_frame(frame) {
            debug!(frame, "frame not shown");
        }
        self.update_playhead_position(surface, time);
    }

    /// Pointer press at `pos` in surface coordinates.
    pub fn on_click(
        &mut self,
        pos: Pos2,
        surface: &mut impl PresentationSurface,
        media: &mut impl MediaSource,
    ) -> PressOutcome {
        self.sync_scale(&*surface, &*media);
        if let Some(index) = self.marker_at(pos) {
            self.timeline.begin_drag(index);
            self.update_segments_visualization(surface);
            return PressOutcome::Grabbed(index);
        }

        let time = self.scale.x_to_time(pos.x).clamp(0.0, media.duration().max(0.0));
        let frame = media.frame_at_time(time);
        media.show_frame(frame);
        let shown = media.time_from_frame(frame);
        self.update_playhead_position(surface, shown);
        PressOutcome::Seeked(shown)
    }

    /// Pointer motion while pressed. Returns where the dragged marker landed.
    pub fn on_drag(
        &mut self,
        pos: Pos2,
        surface: &mut impl PresentationSurface,
        media: &mut impl MediaSource,
    ) -> Option<f64> {
        self.timeline.dragging()?;
        let time = self.scale.x_to_time(pos.x);
        let landed = self.timeline.drag_to(time, media.duration())?;
        self.update_segments_visualization(surface);
        self.seek(surface, media, landed);
        Some(landed)
    }

    pub fn on_release(&mut self) {
        self.timeline.end_drag();
    }

    /// Places a marker at `current_time`: a start when no segment is open,
    /// otherwise the end of the open one.
    pub fn add_marker(
        &mut self,
        surface: &mut impl PresentationSurface,
        current_time: f64,
    ) -> Result<MarkerKind> {
        let kind = self.timeline.add_marker(current_time)?;
        self.update_segments_visualization(surface);
        Ok(kind)
    }

    pub fn expected_marker(&self) -> MarkerKind {
        self.timeline.expected_kind()
    }

    pub fn delete_marker(
        &mut self,
        surface: &mut impl PresentationSurface,
        index: Option<usize>,
    ) -> bool {
        if !self.timeline.delete_marker(index) {
            return false;
        }
        self.update_segments_visualization(surface);
        true
    }

    pub fn clear_all_markers(&mut self, surface: &mut impl PresentationSurface) {
        self.timeline.clear();
        self.update_segments_visualization(surface);
    }

    pub fn select_next_marker(
        &mut self,
        surface: &mut impl PresentationSurface,
        media: &mut impl MediaSource,
    ) -> bool {
        let Some(time) = self.timeline.select_next() else {
            return false;
        };
        self.update_segments_visualization(surface);
        self.seek(surface, media, time);
        true
    }

    pub fn select_previous_marker(
        &mut self,
        surface: &mut impl PresentationSurface,
        media: &mut impl MediaSource,
    ) -> bool {
        let Some(time) = self.timeline.select_previous() else {
            return false;
        };
        self.update_segments_visualization(surface);
        self.seek(surface, media, time);
        true
    }

    /// Finalized segments in chronological order as inclusive frame ranges.
    pub fn get_segments_for_export(&self, media: &impl MediaSource) -> Vec<FrameRange> {
        self.timeline
            .segments_sorted()
            .iter()
            .map(|segment| {
                FrameRange::new(
                    media.frame_at_time(segment.start),
                    media.frame_at_time(segment.end),
                )
            })
            .collect()
    }

    /// Lays out the strip, routes pointer input and paints `surface`.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        surface: &mut DisplayList,
        media: &mut impl MediaSource,
    ) -> egui::Response {
        let width = ui.available_width().max(1.0);
        let (rect, response) =
            ui.allocate_exact_size(vec2(width, TIMELINE_HEIGHT), Sense::click_and_drag());

        let resized = surface.width() != rect.width() || surface.height() != rect.height();
        if resized || self.scale.duration != media.duration() {
            surface.resize(rect.width(), rect.height());
            self.update_canvas_size(surface, &*media);
        }

        let (pressed, released, pointer) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        if let Some(pointer) = pointer {
            let local = (pointer - rect.min).to_pos2();
            if pressed && response.hovered() {
                self.on_click(local, surface, media);
            } else if response.dragged() {
                self.on_drag(local, surface, media);
            }
        }
        if released {
            self.on_release();
        }

        surface.paint(&ui.painter_at(rect), rect.min);
        response
    }
}
