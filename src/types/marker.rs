/// Smallest allowed gap between the two markers of a segment, in seconds.
pub const MIN_SEGMENT_WIDTH: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

impl MarkerKind {
    pub fn label(&self) -> &'static str {
        match self {
            MarkerKind::Start => "Start",
            MarkerKind::End => "End",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    /// Position in seconds.
    pub time: f64,
    /// Index into the timeline's segment list. For the open start marker this
    /// is the index the segment will take once its end is placed.
    pub segment_id: usize,
}

impl Marker {
    pub fn start(time: f64, segment_id: usize) -> Self {
        Self {
            kind: MarkerKind::Start,
            time,
            segment_id,
        }
    }

    pub fn end(time: f64, segment_id: usize) -> Self {
        Self {
            kind: MarkerKind::End,
            time,
            segment_id,
        }
    }
}

/// A span of the source to be removed from the output. Always `start < end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn set_boundary(&mut self, kind: MarkerKind, time: f64) {
        match kind {
            MarkerKind::Start => self.start = time,
            MarkerKind::End => self.end = time,
        }
    }
}

/// Inclusive frame range handed to the media processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start_frame: u64,
    pub end_frame: u64,
}

impl FrameRange {
    pub fn new(start_frame: u64, end_frame: u64) -> Self {
        Self {
            start_frame,
            end_frame,
        }
    }
}
