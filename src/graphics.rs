//! Geometry and graphics parameter types shared by the interpreter and the
//! canvas backend contract.

use serde_derive::{Deserialize, Serialize};

/// A point in PDF user space (origin bottom left, y grows upward).
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Rectangle `(x, y, width, height)` from the lower left corner.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn from_wh(width: f32, height: f32) -> Self {
        Rect { x: 0.0, y: 0.0, width, height }
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect { x, y, width, height }
    }

    /// From two opposite corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Rect { x, y, width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let t = self.top().min(other.top());
        Rect { x, y, width: (r - x).max(0.0), height: (t - y).max(0.0) }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let t = self.top().max(other.top());
        Rect { x, y, width: r - x, height: t - y }
    }
}

/// One command of a user-space path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    /// Cubic Bézier: two control points, then the end point.
    CurveTo(Point, Point, Point),
    Close,
}

/// An ordered sequence of path commands plus the current point.
///
/// The path is owned by the interpreter (it survives `q`/`Q`) and cleared at
/// every painting operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPath {
    pub commands: Vec<PathCommand>,
    start: Option<Point>,
    last: Option<Point>,
}

impl PdfPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.last
    }

    pub fn move_to(&mut self, p: Point) {
        self.commands.push(PathCommand::MoveTo(p));
        self.start = Some(p);
        self.last = Some(p);
    }

    pub fn line_to(&mut self, p: Point) {
        self.commands.push(PathCommand::LineTo(p));
        self.last = Some(p);
    }

    pub fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        self.commands.push(PathCommand::CurveTo(c1, c2, end));
        self.last = Some(end);
    }

    pub fn close(&mut self) {
        if !self.commands.is_empty() {
            self.commands.push(PathCommand::Close);
            self.last = self.start;
        }
    }

    /// The `re` operator: a closed rectangle subpath, current point at (x, y).
    pub fn rect(&mut self, r: Rect) {
        self.move_to(Point::new(r.x, r.y));
        self.line_to(Point::new(r.x + r.width, r.y));
        self.line_to(Point::new(r.x + r.width, r.y + r.height));
        self.line_to(Point::new(r.x, r.y + r.height));
        self.close();
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.start = None;
        self.last = None;
    }

    /// Appends another path's commands (text clip accumulation).
    pub fn extend(&mut self, other: &PdfPath) {
        self.commands.extend_from_slice(&other.commands);
        self.last = other.last.or(self.last);
        self.start = other.start.or(self.start);
    }

    /// Control-polygon bounding box; good enough for layer sizing.
    pub fn bounds(&self) -> Rect {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        let mut any = false;
        let mut visit = |p: &Point| {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            any = true;
        };
        for cmd in &self.commands {
            match cmd {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => visit(p),
                PathCommand::CurveTo(c1, c2, p) => {
                    visit(c1);
                    visit(c2);
                    visit(p);
                }
                PathCommand::Close => {}
            }
        }
        if !any {
            return Rect::default();
        }
        Rect::from_corners(min, max)
    }
}

/// The rule used for filling and clipping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindingOrder {
    EvenOdd,
    #[default]
    NonZero,
}

/// What a path-painting operator does with the current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPaintOp {
    Stroke,
    CloseStroke,
    Fill,
    FillEvenOdd,
    FillStroke,
    FillStrokeEvenOdd,
    CloseFillStroke,
    CloseFillStrokeEvenOdd,
    /// `n`: no painting, used to realize a pending clip.
    NoOp,
}

impl PathPaintOp {
    pub fn fills(&self) -> bool {
        matches!(
            self,
            PathPaintOp::Fill
                | PathPaintOp::FillEvenOdd
                | PathPaintOp::FillStroke
                | PathPaintOp::FillStrokeEvenOdd
                | PathPaintOp::CloseFillStroke
                | PathPaintOp::CloseFillStrokeEvenOdd
        )
    }

    pub fn strokes(&self) -> bool {
        matches!(
            self,
            PathPaintOp::Stroke
                | PathPaintOp::CloseStroke
                | PathPaintOp::FillStroke
                | PathPaintOp::FillStrokeEvenOdd
                | PathPaintOp::CloseFillStroke
                | PathPaintOp::CloseFillStrokeEvenOdd
        )
    }

    pub fn closes(&self) -> bool {
        matches!(
            self,
            PathPaintOp::CloseStroke
                | PathPaintOp::CloseFillStroke
                | PathPaintOp::CloseFillStrokeEvenOdd
        )
    }

    pub fn fill_rule(&self) -> WindingOrder {
        match self {
            PathPaintOp::FillEvenOdd
            | PathPaintOp::FillStrokeEvenOdd
            | PathPaintOp::CloseFillStrokeEvenOdd => WindingOrder::EvenOdd,
            _ => WindingOrder::NonZero,
        }
    }
}

/// Line cap style: butt, round, or projecting-square.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineCapStyle {
    #[default]
    Butt,
    Round,
    ProjectingSquare,
}

impl LineCapStyle {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => LineCapStyle::Round,
            2 => LineCapStyle::ProjectingSquare,
            _ => LineCapStyle::Butt,
        }
    }
}

/// Line join style: miter, round or bevel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineJoinStyle {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoinStyle {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => LineJoinStyle::Round,
            2 => LineJoinStyle::Bevel,
            _ => LineJoinStyle::Miter,
        }
    }
}

/// Dash pattern from the `d` operator.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDashPattern {
    pub dashes: Vec<f32>,
    pub phase: f32,
}

impl LineDashPattern {
    pub fn solid() -> Self {
        Self::default()
    }

    /// An empty array or an all-zero array both mean solid.
    pub fn is_solid(&self) -> bool {
        self.dashes.is_empty() || self.dashes.iter().all(|d| *d <= 0.0)
    }
}

/// Text rendering mode (`Tr` operator).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextRenderingMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderingMode {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => TextRenderingMode::Stroke,
            2 => TextRenderingMode::FillStroke,
            3 => TextRenderingMode::Invisible,
            4 => TextRenderingMode::FillClip,
            5 => TextRenderingMode::StrokeClip,
            6 => TextRenderingMode::FillStrokeClip,
            7 => TextRenderingMode::Clip,
            _ => TextRenderingMode::Fill,
        }
    }

    pub fn fills(&self) -> bool {
        matches!(
            self,
            TextRenderingMode::Fill | TextRenderingMode::FillStroke
                | TextRenderingMode::FillClip | TextRenderingMode::FillStrokeClip
        )
    }

    pub fn strokes(&self) -> bool {
        matches!(
            self,
            TextRenderingMode::Stroke | TextRenderingMode::FillStroke
                | TextRenderingMode::StrokeClip | TextRenderingMode::FillStrokeClip
        )
    }

    pub fn clips(&self) -> bool {
        matches!(
            self,
            TextRenderingMode::FillClip | TextRenderingMode::StrokeClip
                | TextRenderingMode::FillStrokeClip | TextRenderingMode::Clip
        )
    }
}

/// Rendering intent (`ri` operator and image dictionaries).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderingIntent {
    Perceptual,
    #[default]
    RelativeColorimetric,
    Saturation,
    AbsoluteColorimetric,
}

impl RenderingIntent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Perceptual" => Some(RenderingIntent::Perceptual),
            "RelativeColorimetric" => Some(RenderingIntent::RelativeColorimetric),
            "Saturation" => Some(RenderingIntent::Saturation),
            "AbsoluteColorimetric" => Some(RenderingIntent::AbsoluteColorimetric),
            _ => None,
        }
    }
}

/// Blend mode from ExtGState `/BM`. Unknown names fall back to `Normal`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Normal" | "Compatible" => BlendMode::Normal,
            "Multiply" => BlendMode::Multiply,
            "Screen" => BlendMode::Screen,
            "Overlay" => BlendMode::Overlay,
            "Darken" => BlendMode::Darken,
            "Lighten" => BlendMode::Lighten,
            "ColorDodge" => BlendMode::ColorDodge,
            "ColorBurn" => BlendMode::ColorBurn,
            "HardLight" => BlendMode::HardLight,
            "SoftLight" => BlendMode::SoftLight,
            "Difference" => BlendMode::Difference,
            "Exclusion" => BlendMode::Exclusion,
            "Hue" => BlendMode::Hue,
            "Saturation" => BlendMode::Saturation,
            "Color" => BlendMode::Color,
            "Luminosity" => BlendMode::Luminosity,
            _ => return None,
        })
    }
}

#[test]
fn test_rect_path_is_closed() {
    let mut p = PdfPath::new();
    p.rect(Rect::from_xywh(1.0, 2.0, 3.0, 4.0));
    assert_eq!(p.commands.len(), 5);
    assert_eq!(p.commands.last(), Some(&PathCommand::Close));
    // current point returns to the rectangle origin
    assert_eq!(p.last_point(), Some(Point::new(1.0, 2.0)));
}

#[test]
fn test_dash_pattern_solid() {
    assert!(LineDashPattern::solid().is_solid());
    assert!(LineDashPattern { dashes: vec![0.0, 0.0], phase: 0.0 }.is_solid());
    assert!(!LineDashPattern { dashes: vec![2.0, 2.0], phase: 1.0 }.is_solid());
}
