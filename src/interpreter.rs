//! The content-stream interpreter: a stack machine executing page operators
//! against the graphics state, delegating painting to the canvas backend.
//!
//! Operator tokens and operands arrive pre-grouped from lopdf's content
//! decoder. Malformed operators abort only themselves and leave a warning;
//! only cancellation unwinds the stream. The interpreter keeps the canvas
//! save depth in lockstep with the graphics-state stack and rebalances at
//! end of stream.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::canvas::Canvas;
use crate::color::ColorSpaceConv;
use crate::error::{CancelToken, RenderError, RenderWarnMsg};
use crate::graphics::{
    LineCapStyle, LineDashPattern, LineJoinStyle, PathPaintOp, PdfPath, Point, Rect,
    RenderingIntent, TextRenderingMode, WindingOrder,
};
use crate::gstate::{
    apply_ext_gstate, GraphicsState, GraphicsStateStack, PaintSource, Type3Metrics,
};
use crate::matrix::Matrix;
use crate::resources::{as_name_string, get_dict, resolve, to_f32, DocumentCache, PageResources};

/// An inline image lifted out of the content stream before decoding.
#[derive(Debug, Clone)]
pub(crate) struct InlineImage {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

/// Internal operator substituted for `BI ... ID ... EI` spans.
pub(crate) const INLINE_IMAGE_OP: &str = "BeginInlineImage";

pub struct ContentInterpreter<'a> {
    pub(crate) doc: &'a Document,
    pub(crate) cache: &'a DocumentCache,
    pub(crate) canvas: &'a mut dyn Canvas,
    pub(crate) resources: PageResources,
    pub(crate) gs: GraphicsStateStack,
    /// The current path; survives `q`/`Q`, cleared by painting operators.
    pub(crate) path: PdfPath,
    /// Deferred `W`/`W*`: fires at the next painting operator.
    pub(crate) pending_clip: Option<WindingOrder>,
    pub(crate) warnings: Vec<RenderWarnMsg>,
    pub(crate) cancel: CancelToken,
    pub(crate) page: usize,
    pub(crate) op_id: usize,
    /// Visited form identities guarding against recursion cycles.
    pub(crate) form_stack: Vec<ObjectId>,
    /// `BX`/`EX` nesting; unknown operators inside are silent.
    pub(crate) compat_depth: u32,
    /// Nonzero while executing a Type 3 glyph procedure.
    pub(crate) type3_depth: u32,
    /// The page base transform; patterns are anchored to it.
    pub(crate) base_ctm: Matrix,
    /// Uncolored tiling cells ignore color operators.
    pub(crate) ignore_color_ops: bool,
    /// Bilinear sampling for every image, regardless of `/Interpolate`.
    pub(crate) force_interpolation: bool,
    inline_images: Vec<InlineImage>,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(
        doc: &'a Document,
        cache: &'a DocumentCache,
        canvas: &'a mut dyn Canvas,
        resources: PageResources,
        base_ctm: Matrix,
        cancel: CancelToken,
        page: usize,
    ) -> Self {
        ContentInterpreter {
            doc,
            cache,
            canvas,
            resources,
            gs: GraphicsStateStack::new(GraphicsState::new(base_ctm)),
            path: PdfPath::new(),
            pending_clip: None,
            warnings: Vec::new(),
            cancel,
            page,
            op_id: 0,
            form_stack: Vec::new(),
            compat_depth: 0,
            type3_depth: 0,
            base_ctm,
            ignore_color_ops: false,
            force_interpolation: false,
            inline_images: Vec::new(),
        }
    }

    pub fn take_warnings(&mut self) -> Vec<RenderWarnMsg> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn warn(&mut self, msg: String) {
        log::warn!("page {} op {}: {}", self.page, self.op_id, msg);
        self.warnings
            .push(RenderWarnMsg::warning(self.page, self.op_id, msg));
    }

    pub(crate) fn info(&mut self, msg: String) {
        log::info!("page {} op {}: {}", self.page, self.op_id, msg);
        self.warnings
            .push(RenderWarnMsg::info(self.page, self.op_id, msg));
    }

    /// Executes one decoded content stream. Canvas saves and graphics-state
    /// depth are rebalanced to the entry depth before returning, also on
    /// cancellation.
    pub fn run(&mut self, content: &[u8]) -> Result<(), RenderError> {
        let (stripped, inline) = split_inline_images(content);
        let saved_inline = std::mem::replace(&mut self.inline_images, inline);
        let start_canvas = self.canvas.save_count();
        let start_gs = self.gs.depth();

        let result = (|| -> Result<(), RenderError> {
            let ops = match Content::decode(&stripped) {
                Ok(c) => c.operations,
                Err(e) => {
                    self.warn(format!("content stream not decodable: {e}"));
                    return Ok(());
                }
            };
            for op in &ops {
                self.op_id += 1;
                self.cancel.check()?;
                self.execute_op(op)?;
            }
            Ok(())
        })();

        while self.canvas.save_count() > start_canvas {
            self.canvas.restore();
        }
        while self.gs.depth() > start_gs {
            self.gs.restore();
        }
        self.inline_images = saved_inline;
        result
    }

    fn f(&self, op: &Operation, i: usize) -> f32 {
        op.operands.get(i).map(to_f32).unwrap_or(0.0)
    }

    fn name(&self, op: &Operation, i: usize) -> Option<String> {
        op.operands.get(i).and_then(as_name_string)
    }

    /// Checks the operand count; a failed check aborts only this operator.
    pub(crate) fn require(&mut self, op: &Operation, n: usize) -> bool {
        if op.operands.len() < n {
            let operator = op.operator.clone();
            self.warn(format!(
                "'{operator}' expects {n} operands, got {}",
                op.operands.len()
            ));
            return false;
        }
        true
    }

    fn execute_op(&mut self, op: &Operation) -> Result<(), RenderError> {
        match op.operator.as_str() {
            // --- graphics state ---
            "q" => {
                self.gs.save();
                self.canvas.save();
            }
            "Q" => {
                // extra Q in malformed files is a no-op
                if self.gs.restore() {
                    self.canvas.restore();
                }
            }
            "cm" => {
                if self.require(op, 6) {
                    let m = Matrix::new(
                        self.f(op, 0), self.f(op, 1), self.f(op, 2),
                        self.f(op, 3), self.f(op, 4), self.f(op, 5),
                    );
                    self.gs.current_mut().ctm.pre_concat(&m);
                    self.canvas.concat(&m);
                }
            }
            "w" => {
                if self.require(op, 1) {
                    self.gs.current_mut().line_width = self.f(op, 0);
                }
            }
            "J" => {
                if self.require(op, 1) {
                    self.gs.current_mut().line_cap = LineCapStyle::from_i64(self.f(op, 0) as i64);
                }
            }
            "j" => {
                if self.require(op, 1) {
                    self.gs.current_mut().line_join =
                        LineJoinStyle::from_i64(self.f(op, 0) as i64);
                }
            }
            "M" => {
                if self.require(op, 1) {
                    self.gs.current_mut().miter_limit = self.f(op, 0);
                }
            }
            "d" => {
                if self.require(op, 2) {
                    let dashes = op.operands[0]
                        .as_array()
                        .map(|arr| arr.iter().map(to_f32).collect::<Vec<_>>())
                        .unwrap_or_default();
                    let phase = self.f(op, 1).max(0.0);
                    self.gs.current_mut().dash = LineDashPattern { dashes, phase };
                }
            }
            "ri" => {
                if let Some(name) = self.name(op, 0) {
                    match RenderingIntent::from_name(&name) {
                        Some(intent) => self.gs.current_mut().rendering_intent = intent,
                        None => self.info(format!("unknown rendering intent /{name}")),
                    }
                }
            }
            "i" => {
                // flatness tolerance: accepted, ignored
            }
            "gs" => {
                if let Some(name) = self.name(op, 0) {
                    match self.resources.ext_gstate(&name).cloned() {
                        Some(obj) => match get_dict(self.doc, &obj) {
                            Some(dict) => {
                                let dict = dict.clone();
                                apply_ext_gstate(
                                    self.gs.current_mut(),
                                    self.doc,
                                    &dict,
                                    self.cache,
                                );
                            }
                            None => self.warn(format!("/ExtGState /{name} is not a dictionary")),
                        },
                        None => self.warn(format!("/ExtGState /{name} not found")),
                    }
                }
            }

            // --- path construction ---
            "m" => {
                if self.require(op, 2) {
                    self.path.move_to(Point::new(self.f(op, 0), self.f(op, 1)));
                }
            }
            "l" => {
                if self.require(op, 2) {
                    self.path.line_to(Point::new(self.f(op, 0), self.f(op, 1)));
                }
            }
            "c" => {
                if self.require(op, 6) {
                    self.path.curve_to(
                        Point::new(self.f(op, 0), self.f(op, 1)),
                        Point::new(self.f(op, 2), self.f(op, 3)),
                        Point::new(self.f(op, 4), self.f(op, 5)),
                    );
                }
            }
            "v" => {
                if self.require(op, 4) {
                    // first control point is the current point
                    let c1 = self.path.last_point().unwrap_or_default();
                    self.path.curve_to(
                        c1,
                        Point::new(self.f(op, 0), self.f(op, 1)),
                        Point::new(self.f(op, 2), self.f(op, 3)),
                    );
                }
            }
            "y" => {
                if self.require(op, 4) {
                    // second control point coincides with the end point
                    let end = Point::new(self.f(op, 2), self.f(op, 3));
                    self.path
                        .curve_to(Point::new(self.f(op, 0), self.f(op, 1)), end, end);
                }
            }
            "h" => self.path.close(),
            "re" => {
                if self.require(op, 4) {
                    self.path.rect(Rect::from_xywh(
                        self.f(op, 0),
                        self.f(op, 1),
                        self.f(op, 2),
                        self.f(op, 3),
                    ));
                }
            }

            // --- path painting (resets the path, fires the pending clip) ---
            "S" => self.paint_path(PathPaintOp::Stroke)?,
            "s" => self.paint_path(PathPaintOp::CloseStroke)?,
            "f" | "F" => self.paint_path(PathPaintOp::Fill)?,
            "f*" => self.paint_path(PathPaintOp::FillEvenOdd)?,
            "B" => self.paint_path(PathPaintOp::FillStroke)?,
            "B*" => self.paint_path(PathPaintOp::FillStrokeEvenOdd)?,
            "b" => self.paint_path(PathPaintOp::CloseFillStroke)?,
            "b*" => self.paint_path(PathPaintOp::CloseFillStrokeEvenOdd)?,
            "n" => self.paint_path(PathPaintOp::NoOp)?,
            "W" => self.pending_clip = Some(WindingOrder::NonZero),
            "W*" => self.pending_clip = Some(WindingOrder::EvenOdd),

            // --- color (ignored inside uncolored pattern cells) ---
            "CS" | "cs" | "SC" | "SCN" | "sc" | "scn" | "G" | "g" | "RG" | "rg" | "K" | "k"
                if self.ignore_color_ops => {}
            "CS" => self.op_set_color_space(op, true),
            "cs" => self.op_set_color_space(op, false),
            "SC" | "SCN" => self.op_set_color(op, true),
            "sc" | "scn" => self.op_set_color(op, false),
            "G" => self.op_device_color(op, true, ColorSpaceConv::DeviceGray, 1),
            "g" => self.op_device_color(op, false, ColorSpaceConv::DeviceGray, 1),
            "RG" => self.op_device_color(op, true, ColorSpaceConv::DeviceRgb, 3),
            "rg" => self.op_device_color(op, false, ColorSpaceConv::DeviceRgb, 3),
            "K" => {
                self.op_device_color(op, true, ColorSpaceConv::DeviceCmyk { profile: None }, 4)
            }
            "k" => {
                self.op_device_color(op, false, ColorSpaceConv::DeviceCmyk { profile: None }, 4)
            }

            // --- text objects and state ---
            "BT" => self.op_begin_text(),
            "ET" => self.op_end_text(),
            "Tc" => {
                if self.require(op, 1) {
                    self.gs.current_mut().text.char_spacing = self.f(op, 0);
                }
            }
            "Tw" => {
                if self.require(op, 1) {
                    self.gs.current_mut().text.word_spacing = self.f(op, 0);
                }
            }
            "Tz" => {
                if self.require(op, 1) {
                    self.gs.current_mut().text.horizontal_scaling = self.f(op, 0) / 100.0;
                }
            }
            "TL" => {
                if self.require(op, 1) {
                    // stored negated: T* translates by (0, leading)
                    self.gs.current_mut().text.leading = -self.f(op, 0);
                }
            }
            "Tf" => self.op_set_font(op),
            "Tr" => {
                if self.require(op, 1) {
                    self.gs.current_mut().text.mode =
                        TextRenderingMode::from_i64(self.f(op, 0) as i64);
                }
            }
            "Ts" => {
                if self.require(op, 1) {
                    self.gs.current_mut().text.rise = self.f(op, 0);
                }
            }
            "Td" => {
                if self.require(op, 2) {
                    self.op_text_move(self.f(op, 0), self.f(op, 1));
                }
            }
            "TD" => {
                if self.require(op, 2) {
                    let ty = self.f(op, 1);
                    self.gs.current_mut().text.leading = ty;
                    self.op_text_move(self.f(op, 0), ty);
                }
            }
            "Tm" => {
                if self.require(op, 6) {
                    let m = Matrix::new(
                        self.f(op, 0), self.f(op, 1), self.f(op, 2),
                        self.f(op, 3), self.f(op, 4), self.f(op, 5),
                    );
                    let text = &mut self.gs.current_mut().text;
                    text.matrix = m;
                    text.line_matrix = m;
                }
            }
            "T*" => {
                let leading = self.gs.current().text.leading;
                self.op_text_move(0.0, leading);
            }

            // --- text showing ---
            "Tj" => {
                if self.require(op, 1) {
                    let bytes = string_bytes(&op.operands[0]);
                    self.op_show_text(&bytes)?;
                }
            }
            "'" => {
                if self.require(op, 1) {
                    let leading = self.gs.current().text.leading;
                    self.op_text_move(0.0, leading);
                    let bytes = string_bytes(&op.operands[0]);
                    self.op_show_text(&bytes)?;
                }
            }
            "\"" => {
                if self.require(op, 3) {
                    // set spacings, new line, show
                    {
                        let text = &mut self.gs.current_mut().text;
                        text.word_spacing = to_f32(&op.operands[0]);
                        text.char_spacing = to_f32(&op.operands[1]);
                    }
                    let leading = self.gs.current().text.leading;
                    self.op_text_move(0.0, leading);
                    let bytes = string_bytes(&op.operands[2]);
                    self.op_show_text(&bytes)?;
                }
            }
            "TJ" => {
                if self.require(op, 1) {
                    let elements = op.operands[0]
                        .as_array()
                        .map(|a| a.to_vec())
                        .unwrap_or_default();
                    self.op_show_text_adjusted(&elements)?;
                }
            }

            // --- Type 3 glyph metrics ---
            "d0" => {
                if self.type3_depth > 0 && self.require(op, 2) {
                    self.gs.current_mut().type3 = Some(Type3Metrics {
                        advance: (self.f(op, 0), self.f(op, 1)),
                        bbox: None,
                    });
                }
            }
            "d1" => {
                if self.type3_depth > 0 && self.require(op, 6) {
                    self.gs.current_mut().type3 = Some(Type3Metrics {
                        advance: (self.f(op, 0), self.f(op, 1)),
                        bbox: Some(Rect::from_corners(
                            Point::new(self.f(op, 2), self.f(op, 3)),
                            Point::new(self.f(op, 4), self.f(op, 5)),
                        )),
                    });
                }
            }

            // --- XObjects, shadings, inline images ---
            "Do" => {
                if let Some(name) = self.name(op, 0) {
                    self.op_do_xobject(&name)?;
                } else {
                    self.warn("'Do' without a name operand".to_string());
                }
            }
            "sh" => {
                if let Some(name) = self.name(op, 0) {
                    self.op_shading(&name)?;
                } else {
                    self.warn("'sh' without a name operand".to_string());
                }
            }
            INLINE_IMAGE_OP => {
                if self.require(op, 1) {
                    let index = self.f(op, 0) as usize;
                    if let Some(image) = self.inline_images.get(index).cloned() {
                        self.op_inline_image(&image)?;
                    }
                }
            }
            // raw inline-image operators only appear when the splitter was
            // bypassed; consume without painting
            "BI" | "ID" | "EI" => {
                self.info("inline image tokens outside the splitter are skipped".to_string());
            }

            // --- marked content and compatibility ---
            "MP" | "DP" | "BMC" | "BDC" | "EMC" => {}
            "BX" => self.compat_depth += 1,
            "EX" => self.compat_depth = self.compat_depth.saturating_sub(1),

            other => {
                if self.compat_depth == 0 {
                    let msg = format!("unhandled operator '{other}'");
                    self.info(msg);
                }
            }
        }
        Ok(())
    }

    // --- color operator bodies ---

    fn op_set_color_space(&mut self, op: &Operation, stroke: bool) {
        let Some(name) = self.name(op, 0) else {
            self.warn("color space operator without a name".to_string());
            return;
        };
        match ColorSpaceConv::from_operand(
            self.doc,
            &Object::Name(name.clone().into_bytes()),
            &self.resources,
            self.cache,
        ) {
            Ok(cs) => {
                let intent = self.gs.current().rendering_intent;
                let initial = cs.initial_color();
                let paint = if cs.is_pattern() {
                    PaintSource::Solid(crate::color::Rgba::BLACK)
                } else {
                    PaintSource::Solid(cs.to_srgb(&initial, intent))
                };
                let space = std::sync::Arc::new(cs);
                let gs = self.gs.current_mut();
                if stroke {
                    gs.stroke_space = space;
                    gs.stroke_paint = paint;
                } else {
                    gs.fill_space = space;
                    gs.fill_paint = paint;
                }
            }
            Err(e) => self.warn(e),
        }
    }

    fn op_set_color(&mut self, op: &Operation, stroke: bool) {
        // scn with a trailing name selects a pattern
        if let Some(Object::Name(n)) = op.operands.last() {
            let name = String::from_utf8_lossy(n).to_string();
            let tint: Vec<f32> = op.operands[..op.operands.len() - 1]
                .iter()
                .map(to_f32)
                .collect();
            let space = if stroke {
                self.gs.current().stroke_space.clone()
            } else {
                self.gs.current().fill_space.clone()
            };
            if !space.is_pattern() {
                self.warn(format!("pattern /{name} selected outside a Pattern space"));
            }
            let source = match self.pattern_kind(&name) {
                Some(PatternSelection::Shading) => PaintSource::Shading { name },
                _ => PaintSource::Pattern {
                    name,
                    tint: if tint.is_empty() { None } else { Some(tint) },
                },
            };
            let gs = self.gs.current_mut();
            if stroke {
                gs.stroke_paint = source;
            } else {
                gs.fill_paint = source;
            }
            return;
        }

        let comps: Vec<f32> = op.operands.iter().map(to_f32).collect();
        let gs = self.gs.current();
        let space = if stroke { gs.stroke_space.clone() } else { gs.fill_space.clone() };
        let color = space.to_srgb(&comps, gs.rendering_intent);
        let gs = self.gs.current_mut();
        if stroke {
            gs.stroke_paint = PaintSource::Solid(color);
        } else {
            gs.fill_paint = PaintSource::Solid(color);
        }
    }

    fn op_device_color(
        &mut self,
        op: &Operation,
        stroke: bool,
        space: ColorSpaceConv,
        n: usize,
    ) {
        if !self.require(op, n) {
            return;
        }
        let comps: Vec<f32> = op.operands.iter().take(n).map(to_f32).collect();
        let color = space.to_srgb(&comps, self.gs.current().rendering_intent);
        let gs = self.gs.current_mut();
        if stroke {
            gs.stroke_space = std::sync::Arc::new(space);
            gs.stroke_paint = PaintSource::Solid(color);
        } else {
            gs.fill_space = std::sync::Arc::new(space);
            gs.fill_paint = PaintSource::Solid(color);
        }
    }

    fn pattern_kind(&self, name: &str) -> Option<PatternSelection> {
        let obj = self.resources.pattern(name)?;
        let dict = get_dict(self.doc, resolve(self.doc, obj))?;
        match dict.get(b"PatternType").ok().map(|o| to_f32(resolve(self.doc, o)) as u8) {
            Some(2) => Some(PatternSelection::Shading),
            _ => Some(PatternSelection::Tiling),
        }
    }
}

enum PatternSelection {
    Tiling,
    Shading,
}

/// The raw bytes of a string operand; non-strings yield empty.
pub(crate) fn string_bytes(obj: &Object) -> Vec<u8> {
    match obj {
        Object::String(bytes, _) => bytes.clone(),
        _ => Vec::new(),
    }
}

// --- inline image splitting -------------------------------------------------

fn is_white(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    is_white(b) || matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Lifts `BI ... ID <data> EI` spans out of a content stream and replaces
/// them with an internal marker operator, so the external tokenizer never
/// sees the binary payload.
pub(crate) fn split_inline_images(content: &[u8]) -> (Vec<u8>, Vec<InlineImage>) {
    let mut out = Vec::with_capacity(content.len());
    let mut images = Vec::new();
    let mut i = 0;

    while i < content.len() {
        let b = content[i];
        match b {
            b'(' => {
                // literal string with escapes and nesting
                let start = i;
                i += 1;
                let mut depth = 1;
                while i < content.len() && depth > 0 {
                    match content[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                out.extend_from_slice(&content[start..i]);
            }
            b'%' => {
                let start = i;
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    i += 1;
                }
                out.extend_from_slice(&content[start..i]);
            }
            b'B' if content.get(i + 1) == Some(&b'I')
                && (i == 0 || is_delimiter(content[i - 1]))
                && (i == 0 || content[i - 1] != b'/')
                && content
                    .get(i + 2)
                    .map(|c| is_delimiter(*c))
                    .unwrap_or(true) =>
            {
                match take_inline_image(content, i + 2) {
                    Some((image, end)) => {
                        out.extend_from_slice(
                            format!(" {} {} ", images.len(), INLINE_IMAGE_OP).as_bytes(),
                        );
                        images.push(image);
                        i = end;
                    }
                    None => {
                        log::warn!("unterminated inline image, rest of stream dropped");
                        break;
                    }
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    (out, images)
}

/// Parses the dictionary part after `BI` and extracts the binary payload.
/// Returns the image and the index just past `EI`.
fn take_inline_image(content: &[u8], mut i: usize) -> Option<(InlineImage, usize)> {
    // find the standalone ID token
    let dict_start = i;
    let mut id_at = None;
    while i + 1 < content.len() {
        match content[i] {
            b'(' => {
                i += 1;
                let mut depth = 1;
                while i < content.len() && depth > 0 {
                    match content[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'I' if content.get(i + 1) == Some(&b'D')
                && (i == 0 || is_delimiter(content[i - 1]))
                && content
                    .get(i + 2)
                    .map(|c| is_white(*c))
                    .unwrap_or(true) =>
            {
                id_at = Some(i);
                break;
            }
            _ => i += 1,
        }
    }
    let id_at = id_at?;
    let dict = parse_inline_dict(&content[dict_start..id_at])?;

    // exactly one whitespace byte separates ID from the data
    let mut data_start = id_at + 2;
    if content.get(data_start).copied().map(is_white).unwrap_or(false) {
        data_start += 1;
    }

    // uncompressed payloads have a computable length; filtered ones are
    // scanned for a whitespace-delimited EI
    if let Some(len) = uncompressed_inline_len(&dict) {
        let data_end = (data_start + len).min(content.len());
        let mut j = data_end;
        while j < content.len() && is_white(content[j]) {
            j += 1;
        }
        if content.get(j..j + 2) == Some(b"EI") {
            let data = content[data_start..data_end].to_vec();
            return Some((InlineImage { dict, data }, j + 2));
        }
    }
    let mut j = data_start;
    while j + 1 < content.len() {
        if content[j] == b'E'
            && content[j + 1] == b'I'
            && j > data_start
            && is_white(content[j - 1])
            && content
                .get(j + 2)
                .map(|c| is_delimiter(*c))
                .unwrap_or(true)
        {
            let mut data_end = j;
            while data_end > data_start && is_white(content[data_end - 1]) {
                data_end -= 1;
            }
            let data = content[data_start..data_end].to_vec();
            return Some((InlineImage { dict, data }, j + 2));
        }
        j += 1;
    }
    None
}

/// Parses the inline dictionary source through the content tokenizer by
/// appending a dummy operator, then pairs up the operands.
fn parse_inline_dict(src: &[u8]) -> Option<Dictionary> {
    let mut padded = src.to_vec();
    padded.extend_from_slice(b" ZZ");
    let content = Content::decode(&padded).ok()?;
    let operands = content
        .operations
        .iter()
        .find(|o| o.operator == "ZZ")
        .map(|o| o.operands.clone())?;
    let mut dict = Dictionary::new();
    let mut iter = operands.into_iter();
    while let Some(key) = iter.next() {
        let Object::Name(name) = key else { continue };
        let Some(value) = iter.next() else { break };
        dict.set(name, value);
    }
    Some(dict)
}

/// Data length of an unfiltered inline image, from its dictionary.
fn uncompressed_inline_len(dict: &Dictionary) -> Option<usize> {
    if dict.get(b"F").is_ok() || dict.get(b"Filter").is_ok() {
        return None;
    }
    let num = |a: &[u8], b: &[u8]| {
        dict.get(a)
            .or_else(|_| dict.get(b))
            .ok()
            .map(to_f32)
            .filter(|v| *v > 0.0)
    };
    let w = num(b"W", b"Width")? as usize;
    let h = num(b"H", b"Height")? as usize;
    let bpc = num(b"BPC", b"BitsPerComponent").unwrap_or(8.0) as usize;
    let is_mask = matches!(
        dict.get(b"IM").or_else(|_| dict.get(b"ImageMask")),
        Ok(Object::Boolean(true))
    );
    let colors = if is_mask {
        1
    } else {
        match dict.get(b"CS").or_else(|_| dict.get(b"ColorSpace")) {
            Ok(Object::Name(n)) => match n.as_slice() {
                b"RGB" | b"DeviceRGB" | b"CalRGB" => 3,
                b"CMYK" | b"DeviceCMYK" => 4,
                _ => 1,
            },
            Err(_) => 1,
            _ => return None,
        }
    };
    let bpc = if is_mask { 1 } else { bpc };
    Some((w * colors * bpc + 7) / 8 * h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splitter_passes_plain_content_through() {
        let src = b"q 1 0 0 1 10 10 cm (BI not an image) Tj Q";
        let (out, images) = split_inline_images(src);
        assert_eq!(out, src.to_vec());
        assert!(images.is_empty());
    }

    #[test]
    fn splitter_extracts_uncompressed_image() {
        let src = b"q BI /W 2 /H 2 /BPC 8 /CS /G ID \x00\x01\x02\x03 EI Q";
        let (out, images) = split_inline_images(src);
        assert_eq!(images.len(), 1);
        let img = &images[0];
        assert_eq!(img.data, vec![0x00, 0x01, 0x02, 0x03]);
        assert_eq!(img.dict.get(b"W").and_then(|o| o.as_i64()).ok(), Some(2));
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains(INLINE_IMAGE_OP));
        assert!(!text.contains("BI"));
    }

    #[test]
    fn splitter_handles_binary_ei_lookalike() {
        // payload contains the bytes "EI" without surrounding whitespace
        let src = b"BI /W 3 /H 1 /BPC 8 /CS /G ID \x45\x49\x00 EI";
        let (_, images) = split_inline_images(src);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, vec![0x45, 0x49, 0x00]);
    }

    #[test]
    fn inline_dict_pairs_up() {
        let dict = parse_inline_dict(b"/W 4 /H 2 /IM true").unwrap();
        assert_eq!(dict.get(b"W").and_then(|o| o.as_i64()).ok(), Some(4));
        assert!(matches!(dict.get(b"IM"), Ok(Object::Boolean(true))));
    }
}
