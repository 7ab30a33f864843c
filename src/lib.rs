//! # rasterpdf
//!
//! rasterpdf is a read-only PDF page rendering core: given a parsed document
//! and a page index it reproduces that page onto a 2D canvas backend.
//!
//! The crate owns the three central subsystems of a renderer — the
//! content-stream interpreter, the text/font machinery and the image/color
//! pipeline — and consumes everything else from collaborators: `lopdf`
//! provides the object graph, tokenization and stream filters, the concrete
//! 2D backend implements the [`Canvas`] contract.
//!
//! # Rendering a page
//!
//! ```no_run
//! use rasterpdf::{CancelToken, PdfRenderer, RecordingCanvas, RenderOptions};
//!
//! let bytes = std::fs::read("input.pdf").unwrap();
//! let renderer = PdfRenderer::from_bytes(&bytes).unwrap();
//!
//! let options = RenderOptions::default();
//! let (w, h) = renderer.page_size(0, &options).unwrap();
//! let mut canvas = RecordingCanvas::new(rasterpdf::Rect::from_wh(w, h));
//!
//! let warnings = renderer
//!     .render_page(0, &mut canvas, &options, CancelToken::new())
//!     .unwrap();
//! for warning in &warnings {
//!     eprintln!("{}: {}", warning.severity, warning.msg);
//! }
//! let picture = canvas.finish();
//! // replay `picture` onto the real backend
//! ```
//!
//! Rendering is best effort: malformed operators become warnings, decode
//! failures skip the object, and the output reflects whatever could be
//! painted. Long decodes honor a [`CancelToken`] at row and patch
//! boundaries.

pub mod canvas;
pub mod ccitt;
pub mod cmap;
pub mod color;
pub mod encoding;
pub mod error;
pub mod font;
pub mod function;
pub mod graphics;
pub mod gstate;
pub mod icc_profile;
pub mod image;
pub mod interpreter;
pub mod jpeg;
pub mod matrix;
pub mod pattern;
pub mod predictor;
pub mod render;
pub mod resources;
pub mod shading;
pub mod text;
pub mod xobject;

pub use canvas::{
    Canvas, CanvasOp, CompositeMode, GlyphRun, GradientStop, ImageData, MeshVertex, Paint,
    Picture, PositionedGlyph, RasterImage, RecordingCanvas, SamplingOptions, Shader,
    StrokeParams,
};
pub use cmap::{CharCode, Cmap};
pub use color::{srgb_compand, srgb_decompand, ColorSpaceConv, Rgba};
pub use error::{CancelToken, RenderError, RenderWarnMsg};
pub use font::{CharInfo, PdfFont};
pub use graphics::{
    BlendMode, LineCapStyle, LineDashPattern, LineJoinStyle, PathCommand, PdfPath, Point, Rect,
    RenderingIntent, TextRenderingMode, WindingOrder,
};
pub use gstate::{GraphicsState, PaintSource};
pub use image::PdfImage;
pub use interpreter::ContentInterpreter;
pub use matrix::Matrix;
pub use render::{PdfRenderer, RenderOptions};
pub use resources::{DocumentCache, PageResources};
pub use shading::ShadingDefinition;
