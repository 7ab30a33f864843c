//! Rendering orchestration: the public page-render entry point and the
//! high-level draw verbs the interpreter calls.
//!
//! Each verb applies the active soft-mask scope once, resolves the graphics
//! state into backend paints, and issues canvas calls. Failures inside a
//! verb degrade to warnings; only cancellation unwinds.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_derive::{Deserialize, Serialize};

use crate::canvas::{
    Canvas, CompositeMode, ImageData, Paint, Picture, RasterImage, RecordingCanvas,
    SamplingOptions, Shader, StrokeParams,
};
use crate::color::{ColorSpaceConv, Rgba};
use crate::error::{CancelToken, RenderError, RenderWarnMsg};
use crate::graphics::{PathPaintOp, PdfPath, Point, Rect, WindingOrder};
use crate::gstate::{PaintSource, SoftMaskDescriptor, SoftMaskType};
use crate::image::{decode_image, decode_jpeg_fallback, DecodedImage, ImageKind, PdfImage};
use crate::interpreter::{ContentInterpreter, InlineImage};
use crate::matrix::Matrix;
use crate::pattern::{PdfPattern, ShadingPattern, TilingPattern};
use crate::resources::{get_dict, resolve, to_f32, DocumentCache, PageResources};
use crate::shading::ShadingDefinition;
use crate::xobject::{classify, FormXObject, XObjectKind};

fn default_scale() -> f32 {
    1.0
}

/// Options for one page render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Device pixels per PDF unit.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Painted behind the page content when set.
    #[serde(default)]
    pub background: Option<Rgba>,
    /// Forces bilinear sampling regardless of `/Interpolate`.
    #[serde(default)]
    pub force_interpolation: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { scale: 1.0, background: None, force_interpolation: false }
    }
}

/// A loaded document plus its read-only caches. Rendering different pages
/// from different threads is fine once the caches are warm; each render
/// brings its own canvas.
pub struct PdfRenderer {
    pub doc: Document,
    pub cache: DocumentCache,
}

impl PdfRenderer {
    pub fn from_bytes(bytes: &[u8]) -> Result<PdfRenderer, RenderError> {
        let doc = Document::load_mem(bytes)?;
        Ok(PdfRenderer { doc, cache: DocumentCache::new() })
    }

    pub fn new(doc: Document) -> PdfRenderer {
        PdfRenderer { doc, cache: DocumentCache::new() }
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn page_id(&self, page_index: usize) -> Result<ObjectId, RenderError> {
        self.doc
            .get_pages()
            .values()
            .nth(page_index)
            .copied()
            .ok_or(RenderError::PageNotFound(page_index))
    }

    /// Output pixel size of a page under `options.scale`.
    pub fn page_size(&self, page_index: usize, options: &RenderOptions) -> Option<(f32, f32)> {
        let id = self.page_id(page_index).ok()?;
        let dict = self.doc.get_object(id).ok()?.as_dict().ok()?;
        let layout = PageLayout::from_page(&self.doc, dict, options.scale)?;
        Some((layout.device_width, layout.device_height))
    }

    /// Renders one page onto `canvas`, best effort. Problems inside the
    /// content stream come back as warnings; the error path is reserved for
    /// cancellation and unusable page objects.
    pub fn render_page(
        &self,
        page_index: usize,
        canvas: &mut dyn Canvas,
        options: &RenderOptions,
        cancel: CancelToken,
    ) -> Result<Vec<RenderWarnMsg>, RenderError> {
        let id = self.page_id(page_index)?;
        let page_dict = self
            .doc
            .get_object(id)?
            .as_dict()
            .map_err(|_| RenderError::Validation("page object is not a dictionary".into()))?
            .clone();

        let layout = PageLayout::from_page(&self.doc, &page_dict, options.scale)
            .ok_or_else(|| RenderError::Validation("page has no usable MediaBox".into()))?;

        let resources = inherited_entry(&self.doc, &page_dict, b"Resources")
            .and_then(|o| get_dict(&self.doc, &o).cloned())
            .map(|d| PageResources::from_dict(&self.doc, &d))
            .unwrap_or_default();

        let content = collect_page_content(&self.doc, &page_dict);

        if let Some(bg) = options.background {
            let mut path = PdfPath::new();
            path.rect(Rect::from_wh(layout.device_width, layout.device_height));
            canvas.draw_path(&path, &Paint::solid(bg), WindingOrder::NonZero, None);
        }

        canvas.save();
        canvas.concat(&layout.base_ctm);
        let mut interp = ContentInterpreter::new(
            &self.doc,
            &self.cache,
            canvas,
            resources,
            layout.base_ctm,
            cancel,
            page_index,
        );
        interp.force_interpolation = options.force_interpolation;
        let result = interp.run(&content);
        let warnings = interp.take_warnings();
        canvas.restore();
        result?;
        Ok(warnings)
    }
}

/// The page base transform: media-box offset, `/Rotate`, y-flip and scale.
struct PageLayout {
    base_ctm: Matrix,
    device_width: f32,
    device_height: f32,
}

impl PageLayout {
    fn from_page(doc: &Document, page: &Dictionary, scale: f32) -> Option<PageLayout> {
        let media_box = inherited_entry(doc, page, b"MediaBox")
            .and_then(|o| crate::resources::get_f32_array(doc, Some(&o)))
            .filter(|v| v.len() == 4)
            .map(|v| Rect::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3])))?;
        if media_box.is_empty() {
            return None;
        }
        let rotate = inherited_entry(doc, page, b"Rotate")
            .map(|o| to_f32(resolve(doc, &o)) as i32)
            .unwrap_or(0)
            .rem_euclid(360);

        let (w, h) = (media_box.width, media_box.height);
        let origin = Matrix::translate(-media_box.x, -media_box.y);
        let (rotation, rot_w, rot_h) = match rotate {
            90 => (Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0), h, w),
            180 => (Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h), w, h),
            270 => (Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w), h, w),
            _ => (Matrix::identity(), w, h),
        };
        let device_width = rot_w * scale;
        let device_height = rot_h * scale;
        // PDF user space is y-up, device space y-down
        let flip = Matrix::new(scale, 0.0, 0.0, -scale, 0.0, device_height);
        let base_ctm = origin.multiply(&rotation).multiply(&flip);
        Some(PageLayout { base_ctm, device_width, device_height })
    }
}

/// Page-tree attributes (`MediaBox`, `Resources`, `Rotate`) inherit through
/// `/Parent`.
fn inherited_entry(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut dict = page.clone();
    for _ in 0..32 {
        if let Ok(v) = dict.get(key) {
            return Some(v.clone());
        }
        let parent = dict.get(b"Parent").ok()?;
        dict = get_dict(doc, parent)?.clone();
    }
    None
}

/// Concatenates the page's content streams in order.
fn collect_page_content(doc: &Document, page: &Dictionary) -> Vec<u8> {
    let mut content = Vec::new();
    let Ok(contents) = page.get(b"Contents") else {
        return content;
    };
    let mut append = |obj: &Object| {
        if let Some(data) = crate::resources::get_stream_data(doc, obj) {
            content.extend(data);
            content.push(b'\n');
        }
    };
    match resolve(doc, contents) {
        Object::Array(arr) => {
            for obj in arr {
                append(obj);
            }
        }
        other => append(other),
    }
    content
}

// --- interpreter draw verbs -------------------------------------------------

impl<'a> ContentInterpreter<'a> {
    /// Alpha and blend mode for the current stroke or fill.
    pub(crate) fn base_paint(&self, stroke: bool) -> Paint {
        let gs = self.gs.current();
        Paint {
            shader: Shader::Solid(Rgba::BLACK),
            alpha: if stroke { gs.stroke_alpha } else { gs.fill_alpha },
            blend_mode: gs.blend_mode,
            composite: CompositeMode::SourceOver,
            luminance_to_alpha: false,
        }
    }

    pub(crate) fn stroke_params(&self) -> StrokeParams {
        let gs = self.gs.current();
        StrokeParams {
            width: gs.line_width,
            cap: gs.line_cap,
            join: gs.line_join,
            miter_limit: gs.miter_limit,
            dash: if gs.dash.is_solid() {
                crate::graphics::LineDashPattern::solid()
            } else {
                gs.dash.clone()
            },
        }
    }

    /// Runs `f` inside the soft-mask scope of the current state: a layer is
    /// opened, the content drawn, and the rendered mask group composed in
    /// with destination-in.
    pub(crate) fn with_soft_mask<F>(&mut self, f: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        let Some(mask) = self.gs.current_mut().soft_mask.take() else {
            return f(self);
        };
        let Some(picture) = self.render_soft_mask_group(&mask) else {
            let result = f(self);
            self.restore_soft_mask(mask);
            return result;
        };

        let bounds = self.canvas.device_clip_bounds();
        self.canvas.save_layer(Some(&bounds), None);
        let result = f(self);
        let mut paint = Paint::default();
        paint.composite = CompositeMode::DestinationIn;
        paint.luminance_to_alpha = mask.kind == SoftMaskType::Luminosity;
        self.canvas.draw_picture(&picture, &paint);
        self.canvas.restore_layer();
        self.restore_soft_mask(mask);
        result
    }

    fn restore_soft_mask(&mut self, mask: SoftMaskDescriptor) {
        let gs = self.gs.current_mut();
        if gs.soft_mask.is_none() {
            gs.soft_mask = Some(mask);
        }
    }

    /// Renders the soft-mask transparency group into a replayable picture.
    fn render_soft_mask_group(&mut self, mask: &SoftMaskDescriptor) -> Option<Picture> {
        let form = match FormXObject::parse(self.doc, &mask.group) {
            Ok(f) => f,
            Err(e) => {
                self.warn(format!("soft mask group unusable: {e}"));
                return None;
            }
        };
        if mask.transfer.is_some() {
            self.info("soft mask transfer function is not applied".to_string());
        }

        let device_bounds = self.canvas.device_clip_bounds();
        let ctm = self.gs.current().ctm;
        let mut recording = RecordingCanvas::new(device_bounds);

        // luminosity masks start from a backdrop (default black)
        if mask.kind == SoftMaskType::Luminosity {
            if let Some(user_bounds) = ctm.invert().map(|inv| inv.transform_rect(&device_bounds))
            {
                let mut path = PdfPath::new();
                path.rect(user_bounds);
                recording.draw_path(
                    &path,
                    &Paint::solid(Rgba::BLACK),
                    WindingOrder::NonZero,
                    None,
                );
            }
        }

        let resources = form
            .resources
            .as_ref()
            .map(|d| PageResources::from_dict(self.doc, d))
            .unwrap_or_default()
            .merged_with(&self.resources);
        let mut sub = ContentInterpreter::new(
            self.doc,
            self.cache,
            &mut recording,
            resources,
            ctm,
            self.cancel.clone(),
            self.page,
        );
        sub.canvas.save();
        sub.canvas.concat(&form.matrix);
        sub.gs.current_mut().ctm.pre_concat(&form.matrix);
        if let Some(bbox) = form.bbox {
            let mut clip = PdfPath::new();
            clip.rect(bbox);
            sub.canvas.clip_path(&clip, WindingOrder::NonZero);
        }
        let run = sub.run(&form.content);
        let mut sub_warnings = sub.take_warnings();
        sub.canvas.restore();
        drop(sub);
        self.warnings.append(&mut sub_warnings);
        if run.is_err() {
            return None;
        }
        Some(recording.finish())
    }

    // --- path painting ---

    /// A path-painting operator: paint, fire the pending clip *after* the
    /// paint action, reset the path.
    pub(crate) fn paint_path(&mut self, op: PathPaintOp) -> Result<(), RenderError> {
        if op.closes() {
            self.path.close();
        }
        let has_path = !self.path.is_empty();
        if has_path && op != PathPaintOp::NoOp {
            let path = self.path.clone();
            let rule = op.fill_rule();
            self.with_soft_mask(|me| {
                if op.fills() {
                    me.fill_path(&path, rule)?;
                }
                if op.strokes() {
                    me.stroke_path(&path)?;
                }
                Ok(())
            })?;
        }
        if let Some(rule) = self.pending_clip.take() {
            if has_path {
                self.canvas.clip_path(&self.path, rule);
            }
        }
        self.path.clear();
        Ok(())
    }

    fn fill_path(&mut self, path: &PdfPath, rule: WindingOrder) -> Result<(), RenderError> {
        match self.gs.current().fill_paint.clone() {
            PaintSource::Solid(color) => {
                let mut paint = self.base_paint(false);
                paint.shader = Shader::Solid(color);
                self.canvas.draw_path(path, &paint, rule, None);
            }
            PaintSource::Pattern { name, tint } => {
                if let Some(paint) = self.tiling_paint(&name, tint.as_deref(), false)? {
                    self.canvas.draw_path(path, &paint, rule, None);
                }
            }
            PaintSource::Shading { name } => {
                self.paint_shading_pattern(&name, Some((path, rule)))?;
            }
        }
        Ok(())
    }

    fn stroke_path(&mut self, path: &PdfPath) -> Result<(), RenderError> {
        let stroke = self.stroke_params();
        match self.gs.current().stroke_paint.clone() {
            PaintSource::Solid(color) => {
                let mut paint = self.base_paint(true);
                paint.shader = Shader::Solid(color);
                self.canvas
                    .draw_path(path, &paint, WindingOrder::NonZero, Some(&stroke));
            }
            PaintSource::Pattern { name, tint } => {
                if let Some(paint) = self.tiling_paint(&name, tint.as_deref(), true)? {
                    self.canvas
                        .draw_path(path, &paint, WindingOrder::NonZero, Some(&stroke));
                }
            }
            PaintSource::Shading { name } => {
                // stroke geometry becomes the clip for the shading
                self.paint_shading_pattern(&name, Some((path, WindingOrder::NonZero)))?;
            }
        }
        Ok(())
    }

    /// Paint used for glyph runs; shading-pattern text falls back unfilled.
    fn glyph_paint(&mut self, stroke: bool) -> Result<Option<Paint>, RenderError> {
        let source = if stroke {
            self.gs.current().stroke_paint.clone()
        } else {
            self.gs.current().fill_paint.clone()
        };
        match source {
            PaintSource::Solid(color) => {
                let mut paint = self.base_paint(stroke);
                paint.shader = Shader::Solid(color);
                Ok(Some(paint))
            }
            PaintSource::Pattern { name, tint } => self.tiling_paint(&name, tint.as_deref(), stroke),
            PaintSource::Shading { .. } => {
                self.info("shading-pattern text paint is not supported".to_string());
                Ok(None)
            }
        }
    }

    pub(crate) fn draw_text_run(
        &mut self,
        run: &crate::canvas::GlyphRun,
        mode: crate::graphics::TextRenderingMode,
    ) -> Result<(), RenderError> {
        self.with_soft_mask(|me| {
            if mode.fills() {
                if let Some(paint) = me.glyph_paint(false)? {
                    me.canvas.draw_glyph_run(run, &paint, None);
                }
            }
            if mode.strokes() {
                let stroke = me.stroke_params();
                if let Some(paint) = me.glyph_paint(true)? {
                    me.canvas.draw_glyph_run(run, &paint, Some(&stroke));
                }
            }
            Ok(())
        })
    }

    // --- patterns ---

    /// Transform from pattern space into the current user space. Pattern
    /// matrices are anchored to the page base transform, not the CTM.
    fn pattern_space_matrix(&self, pattern_matrix: &Matrix) -> Matrix {
        let to_device = pattern_matrix.multiply(&self.base_ctm);
        match self.gs.current().ctm.invert() {
            Some(inv) => to_device.multiply(&inv),
            None => to_device,
        }
    }

    fn tiling_paint(
        &mut self,
        name: &str,
        tint: Option<&[f32]>,
        stroke: bool,
    ) -> Result<Option<Paint>, RenderError> {
        let Some(obj) = self.resources.pattern(name).cloned() else {
            self.warn(format!("pattern /{name} not found"));
            return Ok(None);
        };
        let pattern = match PdfPattern::parse(self.doc, &obj, self.cache) {
            Ok(p) => p,
            Err(e) => {
                self.warn(format!("pattern /{name}: {e}"));
                return Ok(None);
            }
        };
        match pattern {
            PdfPattern::Tiling(tp) => {
                let tint_color = if tp.is_colored() {
                    None
                } else {
                    // uncolored cells are tinted with the base-space color
                    let space = if stroke {
                        self.gs.current().stroke_space.clone()
                    } else {
                        self.gs.current().fill_space.clone()
                    };
                    let base = match space.as_ref() {
                        ColorSpaceConv::Pattern { base: Some(b) } => (**b).clone(),
                        _ => ColorSpaceConv::DeviceGray,
                    };
                    let comps = tint.unwrap_or(&[]);
                    Some(base.to_srgb(comps, self.gs.current().rendering_intent))
                };
                let picture = self.record_tile_cell(&tp, tint_color)?;
                let mut paint = self.base_paint(stroke);
                paint.shader = Shader::Tile {
                    picture: Arc::new(picture),
                    tile: Rect::from_xywh(tp.bbox.x, tp.bbox.y, tp.x_step, tp.y_step),
                    matrix: self.pattern_space_matrix(&tp.matrix),
                };
                Ok(Some(paint))
            }
            PdfPattern::Shading(_) => {
                // selection normally routes shading patterns elsewhere
                Ok(None)
            }
        }
    }

    /// Renders the pattern cell once into a picture; uncolored cells are
    /// executed with color operators disabled and the tint preloaded.
    fn record_tile_cell(
        &mut self,
        pattern: &TilingPattern,
        tint: Option<Rgba>,
    ) -> Result<Picture, RenderError> {
        let mut recording = RecordingCanvas::new(pattern.bbox);
        let resources = pattern
            .resources
            .as_ref()
            .map(|d| PageResources::from_dict(self.doc, d))
            .unwrap_or_default()
            .merged_with(&self.resources);
        let mut sub = ContentInterpreter::new(
            self.doc,
            self.cache,
            &mut recording,
            resources,
            Matrix::identity(),
            self.cancel.clone(),
            self.page,
        );
        if let Some(color) = tint {
            sub.ignore_color_ops = true;
            sub.gs.current_mut().fill_paint = PaintSource::Solid(color);
            sub.gs.current_mut().stroke_paint = PaintSource::Solid(color);
        }
        let mut clip = PdfPath::new();
        clip.rect(pattern.bbox);
        sub.canvas.clip_path(&clip, WindingOrder::NonZero);
        let run = sub.run(&pattern.content);
        let mut sub_warnings = sub.take_warnings();
        drop(sub);
        self.warnings.append(&mut sub_warnings);
        run?;
        Ok(recording.finish())
    }

    /// Draws a shading pattern, optionally clipped to a painted path.
    fn paint_shading_pattern(
        &mut self,
        name: &str,
        clip: Option<(&PdfPath, WindingOrder)>,
    ) -> Result<(), RenderError> {
        let Some(obj) = self.resources.pattern(name).cloned() else {
            self.warn(format!("pattern /{name} not found"));
            return Ok(());
        };
        let pattern = match PdfPattern::parse(self.doc, &obj, self.cache) {
            Ok(PdfPattern::Shading(sp)) => sp,
            Ok(PdfPattern::Tiling(_)) => {
                self.warn(format!("pattern /{name} is not a shading pattern"));
                return Ok(());
            }
            Err(e) => {
                self.warn(format!("pattern /{name}: {e}"));
                return Ok(());
            }
        };
        self.draw_shading_pattern(&pattern, clip)
    }

    fn draw_shading_pattern(
        &mut self,
        pattern: &ShadingPattern,
        clip: Option<(&PdfPath, WindingOrder)>,
    ) -> Result<(), RenderError> {
        self.canvas.save();
        if let Some((path, rule)) = clip {
            self.canvas.clip_path(path, rule);
        }
        let m = self.pattern_space_matrix(&pattern.matrix);
        self.canvas.concat(&m);

        let total = m.multiply(&self.gs.current().ctm);
        let target = total
            .invert()
            .map(|inv| inv.transform_rect(&self.canvas.device_clip_bounds()))
            .unwrap_or_else(|| Rect::from_wh(1.0, 1.0));

        let base = self.base_paint(false);
        let intent = self.gs.current().rendering_intent;
        let cancel = self.cancel.clone();
        let result = pattern
            .shading
            .draw(self.canvas, &target, &base, intent, &cancel);
        self.canvas.restore();
        result
    }

    // --- sh, Do, inline images ---

    /// The `sh` operator: paint the shading across the current clip region.
    pub(crate) fn op_shading(&mut self, name: &str) -> Result<(), RenderError> {
        let Some(obj) = self.resources.shading(name).cloned() else {
            self.warn(format!("shading /{name} not found"));
            return Ok(());
        };
        let shading = match ShadingDefinition::parse(self.doc, &obj, self.cache) {
            Ok(s) => s,
            Err(e) => {
                self.warn(format!("shading /{name}: {e}"));
                return Ok(());
            }
        };
        self.with_soft_mask(|me| {
            let target = me
                .gs
                .current()
                .ctm
                .invert()
                .map(|inv| inv.transform_rect(&me.canvas.device_clip_bounds()))
                .unwrap_or_else(|| Rect::from_wh(1.0, 1.0));
            let base = me.base_paint(false);
            let intent = me.gs.current().rendering_intent;
            let cancel = me.cancel.clone();
            shading.draw(me.canvas, &target, &base, intent, &cancel)
        })
    }

    /// The `Do` operator.
    pub(crate) fn op_do_xobject(&mut self, name: &str) -> Result<(), RenderError> {
        let Some(obj) = self.resources.xobject(name).cloned() else {
            self.warn(format!("XObject /{name} not found"));
            return Ok(());
        };
        match classify(self.doc, &obj) {
            Some(XObjectKind::Image) => {
                match PdfImage::from_xobject(self.doc, &obj, &self.resources, self.cache) {
                    Ok(image) => self.draw_image_verb(&image),
                    Err(e) => {
                        self.warn(format!("image /{name}: {e}"));
                        Ok(())
                    }
                }
            }
            Some(XObjectKind::Form) => match FormXObject::parse(self.doc, &obj) {
                Ok(form) => self.run_form(&form),
                Err(e) => {
                    self.warn(format!("form /{name}: {e}"));
                    Ok(())
                }
            },
            Some(XObjectKind::PostScript) => {
                self.info(format!("PostScript XObject /{name} skipped"));
                Ok(())
            }
            None => {
                self.warn(format!("XObject /{name} has no usable subtype"));
                Ok(())
            }
        }
    }

    /// Recursive form execution with cycle detection.
    pub(crate) fn run_form(&mut self, form: &FormXObject) -> Result<(), RenderError> {
        let pushed = match form.object_id {
            Some(id) => {
                if self.form_stack.contains(&id) {
                    self.warn("form XObject recursion detected, skipped".to_string());
                    return Ok(());
                }
                self.form_stack.push(id);
                true
            }
            None => false,
        };

        self.gs.save();
        self.canvas.save();
        self.gs.current_mut().ctm.pre_concat(&form.matrix);
        self.canvas.concat(&form.matrix);
        if let Some(bbox) = form.bbox {
            let mut clip = PdfPath::new();
            clip.rect(bbox);
            self.canvas.clip_path(&clip, WindingOrder::NonZero);
        }

        let parent_resources = self.resources.clone();
        if let Some(res) = &form.resources {
            self.resources =
                PageResources::from_dict(self.doc, res).merged_with(&parent_resources);
        }
        let saved_path = std::mem::take(&mut self.path);
        let saved_clip = self.pending_clip.take();

        let result = self.run(&form.content);

        self.path = saved_path;
        self.pending_clip = saved_clip;
        self.resources = parent_resources;
        self.canvas.restore();
        self.gs.restore();
        if pushed {
            self.form_stack.pop();
        }
        result
    }

    /// Inline images draw into the unit square like any other image.
    pub(crate) fn op_inline_image(&mut self, inline: &InlineImage) -> Result<(), RenderError> {
        match PdfImage::from_inline(
            self.doc,
            &inline.dict,
            inline.data.clone(),
            &self.resources,
            self.cache,
        ) {
            Ok(image) => self.draw_image_verb(&image),
            Err(e) => {
                self.warn(format!("inline image: {e}"));
                Ok(())
            }
        }
    }

    /// Decodes and draws an image in unit user space, `(0, −1)` to `(1, 0)`
    /// with the Y flip; the CTM takes it to the page.
    pub(crate) fn draw_image_verb(&mut self, image: &PdfImage) -> Result<(), RenderError> {
        self.with_soft_mask(|me| {
            let intent = me.gs.current().rendering_intent;
            let decoded = match decode_image(image, intent, &me.cancel) {
                Ok(d) => d,
                Err(e) => {
                    me.cancel.check()?;
                    if image.kind == ImageKind::Jpeg {
                        // one backend fallback attempt, then skip
                        me.warn(format!("JPEG decode failed ({e}), trying fallback"));
                        match decode_jpeg_fallback(image) {
                            Ok(d) => d,
                            Err(e2) => {
                                me.warn(format!("image skipped: {e2}"));
                                return Ok(());
                            }
                        }
                    } else {
                        me.info(format!("image skipped: {e}"));
                        return Ok(());
                    }
                }
            };

            let sampling =
                SamplingOptions::from_interpolate(image.interpolate || me.force_interpolation);
            let unit = Rect::from_wh(1.0, 1.0);
            me.canvas.save();
            // image space is y-down; flip it into the unit square
            me.canvas.concat(&Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 1.0));

            match decoded {
                DecodedImage::Stencil(mask) => {
                    // order matters: the mask shapes the layer alpha before
                    // the fill rectangle composites source-in
                    let fill = me.glyph_stencil_fill();
                    let base = me.base_paint(false);
                    me.canvas.save_layer(Some(&unit), None);
                    me.canvas.draw_image(&mask, &unit, sampling, &base);
                    let mut paint = fill;
                    paint.composite = CompositeMode::SourceIn;
                    let mut rect_path = PdfPath::new();
                    rect_path.rect(unit);
                    me.canvas
                        .draw_path(&rect_path, &paint, WindingOrder::NonZero, None);
                    me.canvas.restore_layer();
                }
                DecodedImage::Pixels(pixels) => {
                    // /SMask wins; an explicit stencil /Mask is the same
                    // destination-in composition
                    let smask_alpha = match (&image.smask, &image.mask) {
                        (Some(m), _) => me.decode_smask_alpha(m, intent),
                        (None, crate::image::MaskKind::Stencil(m)) => {
                            me.decode_smask_alpha(m, intent)
                        }
                        _ => None,
                    };
                    let base = me.base_paint(false);
                    match smask_alpha {
                        Some(alpha) => {
                            me.canvas.save_layer(Some(&unit), None);
                            me.canvas.draw_image(&pixels, &unit, sampling, &base);
                            let mut paint = Paint::default();
                            paint.composite = CompositeMode::DestinationIn;
                            me.canvas.draw_image(&alpha, &unit, sampling, &paint);
                            me.canvas.restore_layer();
                        }
                        None => {
                            me.canvas.draw_image(&pixels, &unit, sampling, &base);
                        }
                    }
                }
            }
            me.canvas.restore();
            Ok(())
        })
    }

    /// Non-stroke paint for stencil masks; pattern sources degrade to black.
    fn glyph_stencil_fill(&mut self) -> Paint {
        let mut paint = self.base_paint(false);
        paint.shader = match self.gs.current().fill_paint.clone() {
            PaintSource::Solid(c) => Shader::Solid(c),
            _ => Shader::Solid(Rgba::BLACK),
        };
        paint
    }

    /// Decodes an `/SMask` image into an alpha-only raster.
    fn decode_smask_alpha(
        &mut self,
        smask: &PdfImage,
        intent: crate::graphics::RenderingIntent,
    ) -> Option<RasterImage> {
        match decode_image(smask, intent, &self.cancel) {
            Ok(DecodedImage::Pixels(img)) => Some(luminance_to_alpha(&img)),
            Ok(DecodedImage::Stencil(img)) => Some(img),
            Err(e) => {
                self.warn(format!("soft-mask image skipped: {e}"));
                None
            }
        }
    }
}

/// Converts an RGBA raster into an alpha raster by luminance.
fn luminance_to_alpha(image: &RasterImage) -> RasterImage {
    let ImageData::Rgba8(px) = &image.data else {
        return image.clone();
    };
    let alpha: Vec<u8> = px
        .chunks_exact(4)
        .map(|p| {
            let lum = 0.2126 * p[0] as f32 + 0.7152 * p[1] as f32 + 0.0722 * p[2] as f32;
            lum.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    RasterImage::alpha8(image.width, image.height, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasOp, GlyphRun};
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn empty_doc() -> Document {
        Document::with_version("1.7")
    }

    fn run_content(
        doc: &Document,
        resources: PageResources,
        content: &[u8],
    ) -> (RecordingCanvas, usize, Matrix) {
        let cache = DocumentCache::new();
        let mut canvas = RecordingCanvas::new(Rect::from_wh(612.0, 792.0));
        let mut interp = ContentInterpreter::new(
            doc,
            &cache,
            &mut canvas,
            resources,
            Matrix::identity(),
            CancelToken::new(),
            0,
        );
        interp.run(content).unwrap();
        let depth = interp.gs.depth();
        let tm = interp.gs.current().text.matrix;
        drop(interp);
        (canvas, depth, tm)
    }

    #[test]
    fn gs_stack_balances_with_extra_q() {
        let doc = empty_doc();
        let content = b"q q 2 w Q Q Q Q 0 0 5 5 re f";
        let (canvas, depth, _) = run_content(&doc, PageResources::default(), content);
        assert_eq!(depth, 0);
        assert_eq!(canvas.save_count(), 0);
    }

    #[test]
    fn path_resets_after_every_painting_operator() {
        let doc = empty_doc();
        let cache = DocumentCache::new();
        for paint_op in ["S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n"] {
            let content = format!("0 0 10 10 re 20 20 m 30 30 l {paint_op}");
            let mut canvas = RecordingCanvas::new(Rect::from_wh(100.0, 100.0));
            let mut interp = ContentInterpreter::new(
                &doc,
                &cache,
                &mut canvas,
                PageResources::default(),
                Matrix::identity(),
                CancelToken::new(),
                0,
            );
            interp.run(content.as_bytes()).unwrap();
            assert!(interp.path.is_empty(), "path not reset after {paint_op}");
        }
    }

    #[test]
    fn td_translates_line_matrix_and_tm_replaces_both() {
        let doc = empty_doc();
        let content = b"BT 72 720 Td ET";
        let (_, _, tm) = run_content(&doc, PageResources::default(), content);
        let mapped = tm.transform_point(Point::new(0.0, 0.0));
        assert_eq!((mapped.x, mapped.y), (72.0, 720.0));

        let content = b"BT 1 0 0 1 5 6 Td 2 0 0 2 100 200 Tm ET";
        let (_, _, tm) = run_content(&doc, PageResources::default(), content);
        assert_eq!(tm.as_array(), [2.0, 0.0, 0.0, 2.0, 100.0, 200.0]);
    }

    #[test]
    fn deferred_clip_fires_at_painting_operator() {
        let doc = empty_doc();
        let content = b"0 0 10 10 re W n 0 0 5 5 re f";
        let (canvas, _, _) = run_content(&doc, PageResources::default(), content);
        // n realizes the clip without painting
        let first_clip = canvas.ops.iter().position(|op| matches!(op, CanvasOp::ClipPath { .. }));
        let first_draw = canvas.ops.iter().position(|op| matches!(op, CanvasOp::DrawPath { .. }));
        assert!(first_clip.is_some());
        assert!(first_draw.is_some());
        assert!(first_clip.unwrap() < first_draw.unwrap());
    }

    #[test]
    fn clip_applies_after_its_own_paint() {
        let doc = empty_doc();
        let content = b"0 0 10 10 re W f";
        let (canvas, _, _) = run_content(&doc, PageResources::default(), content);
        let clip = canvas.ops.iter().position(|op| matches!(op, CanvasOp::ClipPath { .. })).unwrap();
        let draw = canvas.ops.iter().position(|op| matches!(op, CanvasOp::DrawPath { .. })).unwrap();
        assert!(draw < clip, "clip must intersect after the paint action");
    }

    fn helvetica_like() -> Dictionary {
        // widths cover codes 72..=111: H, e, l, o as in a metric subset
        let mut widths = vec![0i64; 40];
        widths[0] = 722; // H
        widths[29] = 556; // e
        widths[36] = 222; // l
        widths[39] = 556; // o
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 72,
            "LastChar" => 111,
            "Widths" => widths.into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }
    }

    #[test]
    fn hello_advances_text_matrix_and_draws_one_run() {
        let doc = empty_doc();
        let resources_dict = dictionary! {
            "Font" => dictionary! { "F1" => helvetica_like() },
        };
        let resources = PageResources::from_dict(&doc, &resources_dict);
        let content = b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET";
        let (canvas, _, tm) = run_content(&doc, resources, content);

        // (722 + 556 + 222 + 222 + 556) * 12 / 1000 = 27.336
        assert!((tm.e - 99.336).abs() < 1e-3, "tm.e = {}", tm.e);
        assert_eq!(tm.f, 720.0);

        let runs: Vec<&GlyphRun> = canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                CanvasOp::DrawGlyphRun { run, .. } => Some(run),
                _ => None,
            })
            .collect();
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].matrix.e, runs[0].matrix.f), (72.0, 720.0));
        assert_eq!(runs[0].glyphs.len(), 5);
        // per-glyph origins accumulate the advances
        assert_eq!(runs[0].glyphs[0].origin.x, 0.0);
        assert!((runs[0].glyphs[1].origin.x - 722.0 * 12.0 / 1000.0).abs() < 1e-4);
    }

    #[test]
    fn tj_numbers_displace_against_text_direction() {
        let doc = empty_doc();
        let resources_dict = dictionary! {
            "Font" => dictionary! { "F1" => helvetica_like() },
        };
        let resources = PageResources::from_dict(&doc, &resources_dict);
        // -1000 shifts one full em to the right at size 12
        let content = b"BT /F1 12 Tf [ (H) -1000 (H) ] TJ ET";
        let (_, _, tm) = run_content(&doc, resources, content);
        let expected = 0.722 * 12.0 + 12.0 + 0.722 * 12.0;
        assert!((tm.e - expected).abs() < 1e-3, "tm.e = {}", tm.e);
    }

    #[test]
    fn quote_operator_sets_spacings_then_breaks_then_shows() {
        let doc = empty_doc();
        let resources_dict = dictionary! {
            "Font" => dictionary! { "F1" => helvetica_like() },
        };
        let resources = PageResources::from_dict(&doc, &resources_dict);
        let content = b"BT /F1 10 Tf 14 TL 0 100 Td 3 2 (H) \" ET";
        let cache = DocumentCache::new();
        let mut canvas = RecordingCanvas::new(Rect::from_wh(612.0, 792.0));
        let mut interp = ContentInterpreter::new(
            &doc,
            &cache,
            &mut canvas,
            resources,
            Matrix::identity(),
            CancelToken::new(),
            0,
        );
        interp.run(content).unwrap();
        let text = &interp.gs.current().text;
        assert_eq!(text.word_spacing, 3.0);
        assert_eq!(text.char_spacing, 2.0);
        // the line break moved down by the leading before showing
        assert_eq!(text.line_matrix.f, 100.0 - 14.0);
    }

    #[test]
    fn page_layout_flips_y_and_honors_rotation() {
        let doc = empty_doc();
        let page = dictionary! {
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(200), Object::Integer(100)],
        };
        let layout = PageLayout::from_page(&doc, &page, 1.0).unwrap();
        assert_eq!((layout.device_width, layout.device_height), (200.0, 100.0));
        // bottom-left of the page lands at the bottom of the device
        let p = layout.base_ctm.transform_point(Point::new(0.0, 0.0));
        assert_eq!((p.x, p.y), (0.0, 100.0));
        let p = layout.base_ctm.transform_point(Point::new(0.0, 100.0));
        assert_eq!((p.x, p.y), (0.0, 0.0));

        let rotated = dictionary! {
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(200), Object::Integer(100)],
            "Rotate" => 90,
        };
        let layout = PageLayout::from_page(&doc, &rotated, 1.0).unwrap();
        assert_eq!((layout.device_width, layout.device_height), (100.0, 200.0));
    }

    #[test]
    fn invisible_text_advances_without_drawing() {
        let doc = empty_doc();
        let resources_dict = dictionary! {
            "Font" => dictionary! { "F1" => helvetica_like() },
        };
        let resources = PageResources::from_dict(&doc, &resources_dict);
        let content = b"BT /F1 12 Tf 3 Tr (H) Tj ET";
        let (canvas, _, tm) = run_content(&doc, resources, content);
        assert!(tm.e > 0.0);
        assert!(!canvas.ops.iter().any(|op| matches!(op, CanvasOp::DrawGlyphRun { .. })));
    }
}
