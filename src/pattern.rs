//! Pattern dictionaries: tiling cells (PatternType 1) and shading patterns
//! (PatternType 2). Cell execution is interpreter recursion; this module
//! only owns the parsed model.

use lopdf::{Dictionary, Document, Object};

use crate::graphics::{Point, Rect};
use crate::matrix::Matrix;
use crate::resources::{get_dict, get_f32_array, get_stream_data, resolve, to_f32, DocumentCache};
use crate::shading::ShadingDefinition;

#[derive(Debug, Clone)]
pub struct TilingPattern {
    /// 1 = colored, 2 = uncolored (tinted by the base-space color).
    pub paint_type: u8,
    pub tiling_type: u8,
    pub bbox: Rect,
    pub x_step: f32,
    pub y_step: f32,
    pub matrix: Matrix,
    pub resources: Option<Dictionary>,
    pub content: Vec<u8>,
}

impl TilingPattern {
    pub fn is_colored(&self) -> bool {
        self.paint_type == 1
    }
}

#[derive(Debug, Clone)]
pub struct ShadingPattern {
    pub shading: ShadingDefinition,
    pub matrix: Matrix,
    /// `/ExtGState` applied while painting the pattern.
    pub ext_gstate: Option<Dictionary>,
}

#[derive(Debug, Clone)]
pub enum PdfPattern {
    Tiling(TilingPattern),
    Shading(Box<ShadingPattern>),
}

impl PdfPattern {
    pub fn parse(doc: &Document, obj: &Object, cache: &DocumentCache) -> Result<Self, String> {
        let resolved = resolve(doc, obj);
        let dict = get_dict(doc, resolved).ok_or("pattern is not a dictionary")?;
        let pattern_type = dict
            .get(b"PatternType")
            .map(|o| to_f32(resolve(doc, o)) as u8)
            .map_err(|_| "pattern without PatternType")?;
        let matrix = get_f32_array(doc, dict.get(b"Matrix").ok())
            .filter(|v| v.len() == 6)
            .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
            .unwrap_or_default();

        match pattern_type {
            1 => {
                let bbox = get_f32_array(doc, dict.get(b"BBox").ok())
                    .filter(|v| v.len() == 4)
                    .map(|v| {
                        Rect::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3]))
                    })
                    .ok_or("tiling pattern without BBox")?;
                let content =
                    get_stream_data(doc, resolved).ok_or("tiling pattern is not a stream")?;
                let x_step = dict
                    .get(b"XStep")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)))
                    .filter(|v| *v != 0.0)
                    .unwrap_or(bbox.width);
                let y_step = dict
                    .get(b"YStep")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)))
                    .filter(|v| *v != 0.0)
                    .unwrap_or(bbox.height);
                Ok(PdfPattern::Tiling(TilingPattern {
                    paint_type: dict
                        .get(b"PaintType")
                        .ok()
                        .map(|o| to_f32(resolve(doc, o)) as u8)
                        .unwrap_or(1),
                    tiling_type: dict
                        .get(b"TilingType")
                        .ok()
                        .map(|o| to_f32(resolve(doc, o)) as u8)
                        .unwrap_or(1),
                    bbox,
                    x_step,
                    y_step,
                    matrix,
                    resources: dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| get_dict(doc, o))
                        .cloned(),
                    content,
                }))
            }
            2 => {
                let shading_obj = dict
                    .get(b"Shading")
                    .map_err(|_| "shading pattern without Shading")?;
                let shading = ShadingDefinition::parse(doc, shading_obj, cache)?;
                let ext_gstate = dict
                    .get(b"ExtGState")
                    .ok()
                    .and_then(|o| get_dict(doc, o))
                    .cloned();
                Ok(PdfPattern::Shading(Box::new(ShadingPattern {
                    shading,
                    matrix,
                    ext_gstate,
                })))
            }
            other => Err(format!("unknown PatternType {other}")),
        }
    }
}
