use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, StrokeKind, Vec2};

/// Layer a primitive belongs to. Layers paint in declaration order and can be
/// cleared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrawRole {
    Background,
    TimeMarker,
    Segment,
    Marker,
    Playhead,
}

impl DrawRole {
    pub const ALL: [DrawRole; 5] = [
        DrawRole::Background,
        DrawRole::TimeMarker,
        DrawRole::Segment,
        DrawRole::Marker,
        DrawRole::Playhead,
    ];
}

/// Drawing primitive in surface-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect {
        rect: Rect,
        fill: Color32,
        outline: Option<Stroke>,
    },
    Line {
        from: Pos2,
        to: Pos2,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<Pos2>,
        fill: Color32,
    },
    Text {
        pos: Pos2,
        align: Align2,
        text: String,
        size: f32,
        color: Color32,
    },
}

impl Primitive {
    fn translated(&self, offset: Vec2) -> Primitive {
        match self {
            Primitive::Rect {
                rect,
                fill,
                outline,
            } => Primitive::Rect {
                rect: rect.translate(offset),
                fill: *fill,
                outline: *outline,
            },
            Primitive::Line { from, to, stroke } => Primitive::Line {
                from: *from + offset,
                to: *to + offset,
                stroke: *stroke,
            },
            Primitive::Polygon { points, fill } => Primitive::Polygon {
                points: points.iter().map(|p| *p + offset).collect(),
                fill: *fill,
            },
            Primitive::Text {
                pos,
                align,
                text,
                size,
                color,
            } => Primitive::Text {
                pos: *pos + offset,
                align: *align,
                text: text.clone(),
                size: *size,
                color: *color,
            },
        }
    }
}

/// Drawable area the timeline renders into.
pub trait PresentationSurface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn clear(&mut self, role: DrawRole);
    fn draw(&mut self, role: DrawRole, primitive: Primitive);
}

/// Retained surface: keeps primitives per role until they are cleared and
/// paints them with an egui painter each frame.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    width: f32,
    height: f32,
    items: Vec<(DrawRole, Primitive)>,
}

impl DisplayList {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    pub fn count(&self, role: DrawRole) -> usize {
        self.items.iter().filter(|(r, _)| *r == role).count()
    }

    pub fn primitives(&self, role: DrawRole) -> impl Iterator<Item = &Primitive> {
        self.items
            .iter()
            .filter(move |(r, _)| *r == role)
            .map(|(_, p)| p)
    }

    pub fn paint(&self, painter: &egui::Painter, origin: Pos2) {
        let offset = origin.to_vec2();
        for role in DrawRole::ALL {
            for primitive in self.primitives(role) {
                match primitive.translated(offset) {
                    Primitive::Rect {
                        rect,
                        fill,
                        outline,
                    } => {
                        painter.rect_filled(rect, 0.0, fill);
                        if let Some(stroke) = outline {
                            painter.rect_stroke(rect, 0.0, stroke, StrokeKind::Inside);
                        }
                    }
                    Primitive::Line { from, to, stroke } => {
                        painter.line_segment([from, to], stroke);
                    }
                    Primitive::Polygon { points, fill } => {
                        painter.add(Shape::convex_polygon(points, fill, Stroke::NONE));
                    }
                    Primitive::Text {
                        pos,
                        align,
                        text,
                        size,
                        color,
                    } => {
                        painter.text(pos, align, text, FontId::proportional(size), color);
                    }
                }
            }
        }
    }
}

impl PresentationSurface for DisplayList {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn clear(&mut self, role: DrawRole) {
        self.items.retain(|(r, _)| *r != role);
    }

    fn draw(&mut self, role: DrawRole, primitive: Primitive) {
        self.items.push((role, primitive));
    }
}
