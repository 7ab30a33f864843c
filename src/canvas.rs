//! The canvas backend contract.
//!
//! The rendering core never rasterizes paths itself: it issues draw calls
//! against this narrow trait and lets the concrete 2D backend (Skia, tiny-skia,
//! an SVG writer, ...) do the painting. [`RecordingCanvas`] is the built-in
//! implementation that records calls into a replayable [`Picture`]; it backs
//! tiling pattern cells, soft-mask groups and the test suite.

use std::sync::Arc;

use crate::color::Rgba;
use crate::graphics::{
    BlendMode, LineCapStyle, LineDashPattern, LineJoinStyle, PdfPath, Point, Rect, WindingOrder,
};
use crate::matrix::Matrix;

/// How source pixels combine with what is already in the layer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    #[default]
    SourceOver,
    /// Keep source where the destination is opaque (stencil masking).
    SourceIn,
    /// Keep destination where the source is opaque (soft masks).
    DestinationIn,
}

/// Sampling options mapped from the PDF `/Interpolate` flag.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SamplingOptions {
    #[default]
    Nearest,
    Bilinear,
}

impl SamplingOptions {
    pub fn from_interpolate(interpolate: bool) -> Self {
        if interpolate {
            SamplingOptions::Bilinear
        } else {
            SamplingOptions::Nearest
        }
    }
}

/// One gradient stop, offset in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba,
}

/// The source of paint for a draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Solid(Rgba),
    LinearGradient {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
        matrix: Matrix,
    },
    RadialGradient {
        start_center: Point,
        start_radius: f32,
        end_center: Point,
        end_radius: f32,
        stops: Vec<GradientStop>,
        matrix: Matrix,
    },
    /// Tiled replay of a recorded pattern cell.
    Tile {
        picture: Arc<Picture>,
        tile: Rect,
        matrix: Matrix,
    },
}

/// A resolved paint: shader plus compositing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub shader: Shader,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub composite: CompositeMode,
    /// Convert the drawn content's luminance into alpha (soft-mask groups).
    pub luminance_to_alpha: bool,
}

impl Paint {
    pub fn solid(color: Rgba) -> Self {
        Paint {
            shader: Shader::Solid(color),
            alpha: 1.0,
            blend_mode: BlendMode::Normal,
            composite: CompositeMode::SourceOver,
            luminance_to_alpha: false,
        }
    }
}

impl Default for Paint {
    fn default() -> Self {
        Paint::solid(Rgba::BLACK)
    }
}

/// Stroke geometry parameters for `draw_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeParams {
    pub width: f32,
    pub cap: LineCapStyle,
    pub join: LineJoinStyle,
    pub miter_limit: f32,
    pub dash: LineDashPattern,
}

impl Default for StrokeParams {
    fn default() -> Self {
        StrokeParams {
            width: 1.0,
            cap: LineCapStyle::Butt,
            join: LineJoinStyle::Miter,
            miter_limit: 10.0,
            dash: LineDashPattern::solid(),
        }
    }
}

/// Pixel data handed to the backend, always 8-bit.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Interleaved RGBA, premultiplication is the backend's business.
    Rgba8(Vec<u8>),
    /// Alpha-only (stencil masks, soft masks).
    Alpha8(Vec<u8>),
}

/// A decoded raster image ready for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

impl RasterImage {
    pub fn rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        RasterImage { width, height, data: ImageData::Rgba8(data) }
    }

    pub fn alpha8(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        RasterImage { width, height, data: ImageData::Alpha8(data) }
    }
}

/// One positioned glyph of a text run, origin in text space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedGlyph {
    pub gid: u16,
    pub origin: Point,
}

/// A shaped glyph run: glyph ids with origins, the font program to rasterize
/// them from, and the text-space-to-user-space matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub glyphs: Vec<PositionedGlyph>,
    pub font_data: Option<Arc<Vec<u8>>>,
    pub font_index: u32,
    pub font_size: f32,
    pub matrix: Matrix,
}

/// One vertex of a Gouraud or tessellated mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub point: Point,
    pub color: Rgba,
}

/// The abstract 2D backend the interpreter draws against.
///
/// `save`/`restore` must nest strictly; the interpreter guarantees balance at
/// end of stream. All coordinates are in the space established by `concat`
/// calls (the CTM is applied by the canvas, not by the caller).
pub trait Canvas {
    fn save(&mut self);
    fn restore(&mut self);
    fn concat(&mut self, m: &Matrix);
    /// Intersects the current clip with `path`.
    fn clip_path(&mut self, path: &PdfPath, rule: WindingOrder);
    fn draw_path(
        &mut self,
        path: &PdfPath,
        paint: &Paint,
        rule: WindingOrder,
        stroke: Option<&StrokeParams>,
    );
    fn draw_image(
        &mut self,
        image: &RasterImage,
        dst: &Rect,
        sampling: SamplingOptions,
        paint: &Paint,
    );
    fn draw_glyph_run(&mut self, run: &GlyphRun, paint: &Paint, stroke: Option<&StrokeParams>);
    fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>);
    fn restore_layer(&mut self);
    /// Triangle list; `vertices.len()` is a multiple of 3.
    fn draw_vertices(&mut self, vertices: &[MeshVertex], paint: &Paint);
    /// A Coons patch primitive: 12 control points in boundary order and one
    /// color per corner.
    fn draw_patch(&mut self, points: &[Point; 12], colors: &[Rgba; 4], paint: &Paint);
    fn draw_picture(&mut self, picture: &Picture, paint: &Paint);
    /// Current clip bounds in device space, used to size mask layers.
    fn device_clip_bounds(&self) -> Rect;
    /// Current save depth; the interpreter rebalances against this.
    fn save_count(&self) -> usize;
}

/// A single recorded canvas call.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasOp {
    Save,
    Restore,
    Concat(Matrix),
    ClipPath { path: PdfPath, rule: WindingOrder },
    DrawPath { path: PdfPath, paint: Paint, rule: WindingOrder, stroke: Option<StrokeParams> },
    DrawImage { image: RasterImage, dst: Rect, sampling: SamplingOptions, paint: Paint },
    DrawGlyphRun { run: GlyphRun, paint: Paint, stroke: Option<StrokeParams> },
    SaveLayer { bounds: Option<Rect>, paint: Option<Paint> },
    RestoreLayer,
    DrawVertices { vertices: Vec<MeshVertex>, paint: Paint },
    DrawPatch { points: Box<[Point; 12]>, colors: [Rgba; 4], paint: Paint },
    DrawPicture { picture: Arc<Picture>, paint: Paint },
}

/// An immutable recorded display list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Picture {
    pub ops: Vec<CanvasOp>,
    pub bounds: Rect,
}

impl Picture {
    /// Replays the recording onto another canvas inside a save scope.
    pub fn playback(&self, canvas: &mut dyn Canvas) {
        canvas.save();
        for op in &self.ops {
            match op {
                CanvasOp::Save => canvas.save(),
                CanvasOp::Restore => canvas.restore(),
                CanvasOp::Concat(m) => canvas.concat(m),
                CanvasOp::ClipPath { path, rule } => canvas.clip_path(path, *rule),
                CanvasOp::DrawPath { path, paint, rule, stroke } => {
                    canvas.draw_path(path, paint, *rule, stroke.as_ref())
                }
                CanvasOp::DrawImage { image, dst, sampling, paint } => {
                    canvas.draw_image(image, dst, *sampling, paint)
                }
                CanvasOp::DrawGlyphRun { run, paint, stroke } => {
                    canvas.draw_glyph_run(run, paint, stroke.as_ref())
                }
                CanvasOp::SaveLayer { bounds, paint } => {
                    canvas.save_layer(bounds.as_ref(), paint.as_ref())
                }
                CanvasOp::RestoreLayer => canvas.restore_layer(),
                CanvasOp::DrawVertices { vertices, paint } => {
                    canvas.draw_vertices(vertices, paint)
                }
                CanvasOp::DrawPatch { points, colors, paint } => {
                    canvas.draw_patch(points, colors, paint)
                }
                CanvasOp::DrawPicture { picture, paint } => canvas.draw_picture(picture, paint),
            }
        }
        canvas.restore();
    }
}

/// Records every call for later replay or inspection.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub ops: Vec<CanvasOp>,
    bounds: Rect,
    save_depth: usize,
}

impl RecordingCanvas {
    pub fn new(bounds: Rect) -> Self {
        RecordingCanvas { ops: Vec::new(), bounds, save_depth: 0 }
    }

    pub fn finish(self) -> Picture {
        Picture { ops: self.ops, bounds: self.bounds }
    }

    /// Records `f` into a fresh picture with the given cull bounds.
    pub fn record<F>(bounds: Rect, f: F) -> Picture
    where
        F: FnOnce(&mut RecordingCanvas),
    {
        let mut canvas = RecordingCanvas::new(bounds);
        f(&mut canvas);
        canvas.finish()
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.save_depth += 1;
        self.ops.push(CanvasOp::Save);
    }

    fn restore(&mut self) {
        self.save_depth = self.save_depth.saturating_sub(1);
        self.ops.push(CanvasOp::Restore);
    }

    fn concat(&mut self, m: &Matrix) {
        self.ops.push(CanvasOp::Concat(*m));
    }

    fn clip_path(&mut self, path: &PdfPath, rule: WindingOrder) {
        self.ops.push(CanvasOp::ClipPath { path: path.clone(), rule });
    }

    fn draw_path(
        &mut self,
        path: &PdfPath,
        paint: &Paint,
        rule: WindingOrder,
        stroke: Option<&StrokeParams>,
    ) {
        self.ops.push(CanvasOp::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
            rule,
            stroke: stroke.cloned(),
        });
    }

    fn draw_image(
        &mut self,
        image: &RasterImage,
        dst: &Rect,
        sampling: SamplingOptions,
        paint: &Paint,
    ) {
        self.ops.push(CanvasOp::DrawImage {
            image: image.clone(),
            dst: *dst,
            sampling,
            paint: paint.clone(),
        });
    }

    fn draw_glyph_run(&mut self, run: &GlyphRun, paint: &Paint, stroke: Option<&StrokeParams>) {
        self.ops.push(CanvasOp::DrawGlyphRun {
            run: run.clone(),
            paint: paint.clone(),
            stroke: stroke.cloned(),
        });
    }

    fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>) {
        self.save_depth += 1;
        self.ops.push(CanvasOp::SaveLayer { bounds: bounds.copied(), paint: paint.cloned() });
    }

    fn restore_layer(&mut self) {
        self.save_depth = self.save_depth.saturating_sub(1);
        self.ops.push(CanvasOp::RestoreLayer);
    }

    fn draw_vertices(&mut self, vertices: &[MeshVertex], paint: &Paint) {
        self.ops.push(CanvasOp::DrawVertices { vertices: vertices.to_vec(), paint: paint.clone() });
    }

    fn draw_patch(&mut self, points: &[Point; 12], colors: &[Rgba; 4], paint: &Paint) {
        self.ops.push(CanvasOp::DrawPatch {
            points: Box::new(*points),
            colors: *colors,
            paint: paint.clone(),
        });
    }

    fn draw_picture(&mut self, picture: &Picture, paint: &Paint) {
        self.ops.push(CanvasOp::DrawPicture {
            picture: Arc::new(picture.clone()),
            paint: paint.clone(),
        });
    }

    fn device_clip_bounds(&self) -> Rect {
        self.bounds
    }

    fn save_count(&self) -> usize {
        self.save_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_playback_roundtrip() {
        let mut path = PdfPath::new();
        path.rect(Rect::from_xywh(0.0, 0.0, 10.0, 10.0));
        let pic = RecordingCanvas::record(Rect::from_wh(10.0, 10.0), |c| {
            c.concat(&Matrix::translate(1.0, 2.0));
            c.draw_path(&path, &Paint::default(), WindingOrder::NonZero, None);
        });
        assert_eq!(pic.ops.len(), 2);

        let mut replay = RecordingCanvas::new(Rect::from_wh(10.0, 10.0));
        pic.playback(&mut replay);
        // save + recorded ops + restore
        assert_eq!(replay.ops.len(), 4);
        assert_eq!(replay.save_count(), 0);
    }
}
