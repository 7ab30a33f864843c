//! Text objects and text showing.
//!
//! Shows resolve each character code to `(unicode, GID, width)` through the
//! font, build one positioned glyph run per string, advance the text matrix
//! by the accumulated displacement, and route painting through the current
//! text rendering mode. Type 3 glyphs re-enter the interpreter with the
//! font matrix concatenated.

use std::sync::Arc;

use lopdf::content::Operation;
use lopdf::Object;

use crate::canvas::{GlyphRun, PositionedGlyph};
use crate::cmap::CharCode;
use crate::error::RenderError;
use crate::font::PdfFont;
use crate::graphics::{PathCommand, PdfPath, Point};
use crate::interpreter::{string_bytes, ContentInterpreter};
use crate::matrix::Matrix;
use crate::resources::{get_dict, PageResources};

impl<'a> ContentInterpreter<'a> {
    /// `BT`: enter a text object, reset both text matrices, drop any stale
    /// accumulated text clip.
    pub(crate) fn op_begin_text(&mut self) {
        let text = &mut self.gs.current_mut().text;
        text.matrix = Matrix::identity();
        text.line_matrix = Matrix::identity();
        text.clip_path = PdfPath::new();
        self.gs.current_mut().in_text_object = true;
    }

    /// `ET`: commit the accumulated text clip, leave the text object.
    pub(crate) fn op_end_text(&mut self) {
        let clip = std::mem::take(&mut self.gs.current_mut().text.clip_path);
        if !clip.is_empty() {
            self.canvas
                .clip_path(&clip, crate::graphics::WindingOrder::NonZero);
        }
        self.gs.current_mut().in_text_object = false;
    }

    /// `Td`/`TD`/`T*`: translate the line matrix, restart the text matrix.
    pub(crate) fn op_text_move(&mut self, tx: f32, ty: f32) {
        let text = &mut self.gs.current_mut().text;
        text.line_matrix = Matrix::translate(tx, ty).multiply(&text.line_matrix);
        text.matrix = text.line_matrix;
    }

    /// `Tf`: resolve the named font from the page resources.
    pub(crate) fn op_set_font(&mut self, op: &Operation) {
        if !self.require(op, 2) {
            return;
        }
        let Some(Object::Name(name_bytes)) = op.operands.first() else {
            self.warn("'Tf' first operand is not a name".to_string());
            return;
        };
        let name = String::from_utf8_lossy(name_bytes).to_string();
        let size = crate::resources::to_f32(&op.operands[1]);

        let font = self.resolve_font(&name);
        if font.is_none() {
            self.warn(format!("font /{name} not found in resources"));
        }
        let text = &mut self.gs.current_mut().text;
        text.font = font;
        text.size = size;
    }

    fn resolve_font(&mut self, name: &str) -> Option<Arc<PdfFont>> {
        let obj = self.resources.font(name)?.clone();
        let doc = self.doc;
        let cache = self.cache;
        let compute = || {
            let dict = get_dict(doc, &obj)?;
            match PdfFont::parse(doc, dict, cache) {
                Ok(f) => Some(Arc::new(f)),
                Err(e) => {
                    log::warn!("font /{name} rejected: {e}");
                    None
                }
            }
        };
        match &obj {
            Object::Reference(id) => cache.font(*id, compute),
            _ => compute(),
        }
    }

    /// `Tj` (and the tail of `'` and `"`).
    pub(crate) fn op_show_text(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        if !self.gs.current().in_text_object {
            self.warn("text shown outside BT/ET".to_string());
        }
        self.show_glyphs(bytes)
    }

    /// `TJ`: strings show, numbers displace the next glyph.
    pub(crate) fn op_show_text_adjusted(
        &mut self,
        elements: &[Object],
    ) -> Result<(), RenderError> {
        for element in elements {
            match element {
                Object::String(_, _) => {
                    let bytes = string_bytes(element);
                    self.show_glyphs(&bytes)?;
                }
                Object::Integer(_) | Object::Real(_) => {
                    let n = crate::resources::to_f32(element);
                    let (size, h) = {
                        let text = &self.gs.current().text;
                        (text.size, text.horizontal_scaling)
                    };
                    // unit displacement opposite to text direction
                    let dx = -n / 1000.0 * size * h;
                    let text = &mut self.gs.current_mut().text;
                    text.matrix = Matrix::translate(dx, 0.0).multiply(&text.matrix);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The shaping core: segmentation, advancement, run emission.
    fn show_glyphs(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let Some(font) = self.gs.current().text.font.clone() else {
            self.warn("text shown without a selected font".to_string());
            return Ok(());
        };
        if font.is_type3() {
            return self.show_type3_glyphs(&font, bytes);
        }

        let (size, h, char_spacing, word_spacing, rise, mode, tm) = {
            let text = &self.gs.current().text;
            (
                text.size,
                text.horizontal_scaling,
                text.char_spacing,
                text.word_spacing,
                text.rise,
                text.mode,
                text.matrix,
            )
        };

        let codes = font.segment(bytes);
        let mut glyphs = Vec::with_capacity(codes.len());
        let mut advance = 0.0f32;
        for code in &codes {
            let info = font.char_info(*code);
            glyphs.push(PositionedGlyph {
                gid: info.gid,
                origin: Point::new(advance, rise),
            });
            let word = if code.is_word_break() { word_spacing } else { 0.0 };
            advance += info.width * size * h + (char_spacing + word) * h;
        }

        if mode.clips() {
            self.accumulate_text_clip(&font, &codes, size, h, rise, &tm);
        }
        if mode.fills() || mode.strokes() {
            let run = GlyphRun {
                glyphs,
                font_data: font.embedded_font_data(),
                font_index: 0,
                font_size: size,
                matrix: tm,
            };
            self.draw_text_run(&run, mode)?;
        }

        // advance the text matrix by the total displacement
        let text = &mut self.gs.current_mut().text;
        text.matrix = Matrix::translate(advance, 0.0).multiply(&text.matrix);
        Ok(())
    }

    /// Unions glyph outlines into the pending text clip (user space).
    fn accumulate_text_clip(
        &mut self,
        font: &PdfFont,
        codes: &[CharCode],
        size: f32,
        h: f32,
        rise: f32,
        tm: &Matrix,
    ) {
        let mut advance = 0.0f32;
        let mut clip = PdfPath::new();
        let mut missing = false;
        for code in codes {
            let info = font.char_info(*code);
            if let Some(outline) = font.glyph_outline(info.gid) {
                let m = Matrix::scale(size * h, size)
                    .multiply(&Matrix::translate(advance, rise))
                    .multiply(tm);
                clip.extend(&transform_path(&outline, &m));
            } else {
                missing = true;
            }
            let word = if code.is_word_break() { self.gs.current().text.word_spacing } else { 0.0 };
            advance += info.width * size * h + (self.gs.current().text.char_spacing + word) * h;
        }
        if missing {
            self.info("text clip outlines unavailable for some glyphs".to_string());
        }
        self.gs.current_mut().text.clip_path.extend(&clip);
    }

    /// Type 3 shows execute the glyph procedures through the interpreter.
    fn show_type3_glyphs(
        &mut self,
        font: &Arc<PdfFont>,
        bytes: &[u8],
    ) -> Result<(), RenderError> {
        let Some(t3) = font.type3() else { return Ok(()) };
        let t3 = t3.clone();
        let (size, h, char_spacing, word_spacing, rise, mode) = {
            let text = &self.gs.current().text;
            (
                text.size,
                text.horizontal_scaling,
                text.char_spacing,
                text.word_spacing,
                text.rise,
                text.mode,
            )
        };

        for byte in bytes {
            let code = CharCode::one_byte(*byte);
            let info = font.char_info(code);
            let mut advance = info.width * size * h;

            let proc = t3.char_proc(self.doc, *byte);
            if let Some(content) = proc {
                if mode != crate::graphics::TextRenderingMode::Invisible {
                    let tm = self.gs.current().text.matrix;
                    let text_params = Matrix::new(size * h, 0.0, 0.0, size, 0.0, rise);
                    let glyph_matrix =
                        t3.font_matrix.multiply(&text_params.multiply(&tm));

                    self.gs.save();
                    self.canvas.save();
                    self.gs.current_mut().ctm.pre_concat(&glyph_matrix);
                    self.canvas.concat(&glyph_matrix);
                    self.gs.current_mut().type3 = None;

                    let parent_resources = self.resources.clone();
                    if let Some(res) = &t3.resources {
                        self.resources = PageResources::from_dict(self.doc, res)
                            .merged_with(&parent_resources);
                    }
                    self.type3_depth += 1;
                    let result = self.run(&content);
                    self.type3_depth -= 1;
                    self.resources = parent_resources;

                    // d0/d1 metrics override a missing /Widths entry
                    if info.width == 0.0 {
                        if let Some(metrics) = self.gs.current().type3 {
                            let glyph_adv = t3
                                .font_matrix
                                .transform_vector(Point::new(metrics.advance.0, 0.0));
                            advance = glyph_adv.x * size * h;
                        }
                    }
                    self.canvas.restore();
                    self.gs.restore();
                    result?;
                }
            } else {
                self.info(format!("Type 3 glyph for code {byte} missing"));
            }

            let word = if code.is_word_break() { word_spacing } else { 0.0 };
            advance += (char_spacing + word) * h;
            let text = &mut self.gs.current_mut().text;
            text.matrix = Matrix::translate(advance, 0.0).multiply(&text.matrix);
        }
        Ok(())
    }
}

/// Applies an affine to every command of a path.
fn transform_path(path: &PdfPath, m: &Matrix) -> PdfPath {
    let mut out = PdfPath::new();
    for cmd in &path.commands {
        match cmd {
            PathCommand::MoveTo(p) => out.move_to(m.transform_point(*p)),
            PathCommand::LineTo(p) => out.line_to(m.transform_point(*p)),
            PathCommand::CurveTo(c1, c2, p) => out.curve_to(
                m.transform_point(*c1),
                m.transform_point(*c2),
                m.transform_point(*p),
            ),
            PathCommand::Close => out.close(),
        }
    }
    out
}
