//! The graphics state: one cheap-to-clone value plus the `q`/`Q` stack.
//!
//! The current path is *not* part of this state; the interpreter owns it
//! across `q`/`Q` boundaries. Converters and fonts are shared by reference,
//! ownership sits in the per-document cache.

use std::sync::Arc;

use lopdf::{Document, Object};

use crate::color::{ColorSpaceConv, Rgba};
use crate::font::PdfFont;
use crate::function::PdfFunction;
use crate::graphics::{
    BlendMode, LineCapStyle, LineDashPattern, LineJoinStyle, PdfPath, Rect, RenderingIntent,
    TextRenderingMode,
};
use crate::matrix::Matrix;
use crate::resources::{as_name_string, get_dict, get_f32_array, resolve, to_f32, DocumentCache};

/// What stroking or filling paints with.
#[derive(Debug, Clone)]
pub enum PaintSource {
    Solid(Rgba),
    /// A tiling pattern selected via `scn /Name`; `tint` carries the base
    /// color components of an uncolored pattern.
    Pattern { name: String, tint: Option<Vec<f32>> },
    /// A shading pattern (PatternType 2) selected via `scn /Name`.
    Shading { name: String },
}

/// Soft mask subtype from ExtGState `/SMask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftMaskType {
    Alpha,
    Luminosity,
}

#[derive(Debug, Clone)]
pub struct SoftMaskDescriptor {
    pub kind: SoftMaskType,
    /// The transparency group XObject (`/G`), unresolved.
    pub group: Object,
    pub transfer: Option<Arc<PdfFunction>>,
    pub backdrop: Option<Vec<f32>>,
}

/// Type 3 glyph metrics captured by `d0`/`d1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Type3Metrics {
    pub advance: (f32, f32),
    pub bbox: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct TextState {
    pub font: Option<Arc<PdfFont>>,
    pub size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// `Tz` as a fraction; 1.0 is 100%.
    pub horizontal_scaling: f32,
    /// Stored negated so `T*` translates by `(0, leading)` directly.
    pub leading: f32,
    pub rise: f32,
    pub mode: TextRenderingMode,
    pub matrix: Matrix,
    pub line_matrix: Matrix,
    /// Glyph outlines accumulated by the `*Clip` render modes; committed at
    /// `ET`.
    pub clip_path: PdfPath,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            mode: TextRenderingMode::Fill,
            matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            clip_path: PdfPath::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke_space: Arc<ColorSpaceConv>,
    pub fill_space: Arc<ColorSpaceConv>,
    pub stroke_paint: PaintSource,
    pub fill_paint: PaintSource,
    pub line_width: f32,
    pub line_cap: LineCapStyle,
    pub line_join: LineJoinStyle,
    pub miter_limit: f32,
    pub dash: LineDashPattern,
    pub rendering_intent: RenderingIntent,
    pub stroke_alpha: f32,
    pub fill_alpha: f32,
    pub blend_mode: BlendMode,
    pub soft_mask: Option<SoftMaskDescriptor>,
    pub transfer: Option<Arc<PdfFunction>>,
    /// Overprint flags; honored only by backends that separate plates.
    pub overprint_stroke: bool,
    pub overprint_fill: bool,
    pub text: TextState,
    pub in_text_object: bool,
    pub type3: Option<Type3Metrics>,
}

impl GraphicsState {
    pub fn new(base_ctm: Matrix) -> Self {
        GraphicsState {
            ctm: base_ctm,
            stroke_space: Arc::new(ColorSpaceConv::DeviceGray),
            fill_space: Arc::new(ColorSpaceConv::DeviceGray),
            stroke_paint: PaintSource::Solid(Rgba::BLACK),
            fill_paint: PaintSource::Solid(Rgba::BLACK),
            line_width: 1.0,
            line_cap: LineCapStyle::Butt,
            line_join: LineJoinStyle::Miter,
            miter_limit: 10.0,
            dash: LineDashPattern::solid(),
            rendering_intent: RenderingIntent::RelativeColorimetric,
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            blend_mode: BlendMode::Normal,
            soft_mask: None,
            transfer: None,
            overprint_stroke: false,
            overprint_fill: false,
            text: TextState::default(),
            in_text_object: false,
            type3: None,
        }
    }
}

/// `q` pushes a clone, `Q` pops; popping past the bottom is a no-op.
#[derive(Debug)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStateStack {
    pub fn new(base: GraphicsState) -> Self {
        GraphicsStateStack { current: base, saved: Vec::new() }
    }

    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Returns `false` when the stack is already at the bottom.
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(prev) => {
                self.current = prev;
                true
            }
            None => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

/// Applies an `/ExtGState` dictionary to the state (`gs` operator).
pub fn apply_ext_gstate(
    gs: &mut GraphicsState,
    doc: &Document,
    dict: &lopdf::Dictionary,
    _cache: &DocumentCache,
) {
    for (key, value) in dict.iter() {
        let value = resolve(doc, value);
        match key.as_slice() {
            b"LW" => gs.line_width = to_f32(value),
            b"LC" => gs.line_cap = LineCapStyle::from_i64(to_f32(value) as i64),
            b"LJ" => gs.line_join = LineJoinStyle::from_i64(to_f32(value) as i64),
            b"ML" => gs.miter_limit = to_f32(value),
            b"D" => {
                if let Ok(arr) = value.as_array() {
                    let dashes = arr
                        .first()
                        .and_then(|o| get_f32_array(doc, Some(o)))
                        .unwrap_or_default();
                    let phase = arr.get(1).map(|o| to_f32(resolve(doc, o))).unwrap_or(0.0);
                    gs.dash = LineDashPattern { dashes, phase: phase.max(0.0) };
                }
            }
            b"RI" => {
                if let Some(name) = as_name_string(value) {
                    if let Some(intent) = RenderingIntent::from_name(&name) {
                        gs.rendering_intent = intent;
                    }
                }
            }
            b"CA" => gs.stroke_alpha = to_f32(value).clamp(0.0, 1.0),
            b"ca" => gs.fill_alpha = to_f32(value).clamp(0.0, 1.0),
            b"BM" => {
                let name = match value {
                    Object::Name(_) => as_name_string(value),
                    Object::Array(arr) => arr.first().and_then(as_name_string),
                    _ => None,
                };
                if let Some(name) = name {
                    match BlendMode::from_name(&name) {
                        Some(bm) => gs.blend_mode = bm,
                        None => {
                            log::info!("unknown blend mode /{name}, using Normal");
                            gs.blend_mode = BlendMode::Normal;
                        }
                    }
                }
            }
            b"OP" => gs.overprint_stroke = matches!(value, Object::Boolean(true)),
            b"op" => gs.overprint_fill = matches!(value, Object::Boolean(true)),
            b"SMask" => {
                gs.soft_mask = parse_soft_mask(doc, value);
            }
            b"TR" | b"TR2" => {
                gs.transfer = match value {
                    Object::Name(n) if n == b"Identity" || n == b"Default" => None,
                    other => PdfFunction::parse(doc, other).ok().map(Arc::new),
                };
            }
            b"Font" => {
                // [fontRef size]: rarely used outside Type 3 workflows
                log::info!("ExtGState /Font is not applied");
            }
            _ => {}
        }
    }
}

fn parse_soft_mask(doc: &Document, value: &Object) -> Option<SoftMaskDescriptor> {
    match value {
        Object::Name(n) if n == b"None" => None,
        _ => {
            let dict = get_dict(doc, value)?;
            let kind = match dict.get(b"S").ok().and_then(as_name_string).as_deref() {
                Some("Alpha") => SoftMaskType::Alpha,
                _ => SoftMaskType::Luminosity,
            };
            let group = dict.get(b"G").ok()?.clone();
            let transfer = dict.get(b"TR").ok().and_then(|tr| {
                match resolve(doc, tr) {
                    Object::Name(n) if n == b"Identity" => None,
                    other => PdfFunction::parse(doc, other).ok().map(Arc::new),
                }
            });
            let backdrop = get_f32_array(doc, dict.get(b"BC").ok());
            Some(SoftMaskDescriptor { kind, group, transfer, backdrop })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_at_bottom_is_noop() {
        let mut stack = GraphicsStateStack::new(GraphicsState::new(Matrix::identity()));
        assert!(!stack.restore());
        stack.save();
        stack.current_mut().line_width = 4.0;
        assert!(stack.restore());
        assert_eq!(stack.current().line_width, 1.0);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn save_snapshots_text_state() {
        let mut stack = GraphicsStateStack::new(GraphicsState::new(Matrix::identity()));
        stack.current_mut().text.size = 12.0;
        stack.save();
        stack.current_mut().text.size = 24.0;
        stack.restore();
        assert_eq!(stack.current().text.size, 12.0);
    }
}
