//! Image XObjects: the model, the decoder factory and the row processor.
//!
//! Decoders produce rows at the source bit depth; the row processor expands
//! packed samples, applies `/Decode`, color-key masking and palette
//! expansion, then hands components to the color-space converter. The result
//! is an 8-bit RGBA (or alpha-only) [`RasterImage`] for the backend.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object};

use crate::canvas::RasterImage;
use crate::ccitt::{CcittDecoder, CcittParams};
use crate::color::ColorSpaceConv;
use crate::error::CancelToken;
use crate::graphics::RenderingIntent;
use crate::jpeg::{JpegColorModel, JpegDecoder};
use crate::predictor::{PredictorDecoder, PredictorParams};
use crate::resources::{
    as_name_string, get_dict, get_f32_array, resolve, to_f32, DocumentCache, PageResources,
};

/// Derived from the tail of the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raw,
    Jpeg,
    Jpeg2000,
    Ccitt,
    Jbig2,
}

/// `/Mask` entry: absent, a color-key range array, or a stencil mask image.
#[derive(Debug, Clone)]
pub enum MaskKind {
    None,
    /// `2N` inclusive range bounds on raw samples.
    ColorKey(Vec<u32>),
    /// An explicit 1-bpc masking image.
    Stencil(Box<PdfImage>),
}

#[derive(Debug, Clone)]
pub struct PdfImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u16,
    /// `None` for image masks.
    pub color_space: Option<Arc<ColorSpaceConv>>,
    /// Filter-chain result: raw samples, a JPEG stream, or CCITT data.
    pub data: Vec<u8>,
    pub decode: Option<Vec<f32>>,
    pub mask: MaskKind,
    pub smask: Option<Box<PdfImage>>,
    pub decode_parms: Option<Dictionary>,
    pub interpolate: bool,
    pub intent: Option<RenderingIntent>,
    pub is_image_mask: bool,
    pub kind: ImageKind,
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Ok(obj) = dict.get(b"Filter").or_else(|_| dict.get(b"F")) else {
        return Vec::new();
    };
    match resolve(doc, obj) {
        name @ Object::Name(_) => as_name_string(name).map(|n| vec![n]).unwrap_or_default(),
        Object::Array(arr) => arr
            .iter()
            .map(|o| resolve(doc, o))
            .filter_map(as_name_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Inline-image filter abbreviations to their full names.
fn expand_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

fn kind_from_filters(filters: &[String]) -> ImageKind {
    match filters.last().map(|s| s.as_str()) {
        Some("DCTDecode") | Some("DCT") => ImageKind::Jpeg,
        Some("JPXDecode") => ImageKind::Jpeg2000,
        Some("CCITTFaxDecode") | Some("CCF") => ImageKind::Ccitt,
        Some("JBIG2Decode") => ImageKind::Jbig2,
        _ => ImageKind::Raw,
    }
}

impl PdfImage {
    /// Builds the model from an image XObject stream.
    pub fn from_xobject(
        doc: &Document,
        obj: &Object,
        resources: &PageResources,
        cache: &DocumentCache,
    ) -> Result<PdfImage, String> {
        let stream = match resolve(doc, obj) {
            Object::Stream(s) => s,
            _ => return Err("image XObject is not a stream".to_string()),
        };
        let dict = &stream.dict;
        let filters = filter_names(doc, dict);
        let kind = kind_from_filters(&filters);
        // the stream filter chain up to the image codec is collaborator
        // territory; image codecs consume the raw tail
        let data = match kind {
            ImageKind::Raw => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            _ => stream.content.clone(),
        };
        Self::from_dict_and_data(doc, dict, data, kind, resources, cache)
    }

    /// Shared tail of XObject and inline-image construction.
    pub fn from_dict_and_data(
        doc: &Document,
        dict: &Dictionary,
        data: Vec<u8>,
        kind: ImageKind,
        resources: &PageResources,
        cache: &DocumentCache,
    ) -> Result<PdfImage, String> {
        let width = dict
            .get(b"Width")
            .or_else(|_| dict.get(b"W"))
            .map(|o| to_f32(resolve(doc, o)) as u32)
            .map_err(|_| "image without Width")?;
        let height = dict
            .get(b"Height")
            .or_else(|_| dict.get(b"H"))
            .map(|o| to_f32(resolve(doc, o)) as u32)
            .map_err(|_| "image without Height")?;
        if width == 0 || height == 0 {
            return Err("empty image".to_string());
        }

        let is_image_mask = dict
            .get(b"ImageMask")
            .or_else(|_| dict.get(b"IM"))
            .map(|o| matches!(resolve(doc, o), Object::Boolean(true)))
            .unwrap_or(false);

        let bits_per_component = dict
            .get(b"BitsPerComponent")
            .or_else(|_| dict.get(b"BPC"))
            .map(|o| to_f32(resolve(doc, o)) as u16)
            .unwrap_or(if is_image_mask { 1 } else { 8 });

        let color_space = if is_image_mask {
            None
        } else {
            let cs_obj = dict.get(b"ColorSpace").or_else(|_| dict.get(b"CS")).ok();
            let cs = match cs_obj {
                Some(o) => ColorSpaceConv::from_operand(doc, o, resources, cache)
                    .map_err(|e| format!("image color space: {e}"))?,
                None => ColorSpaceConv::DeviceGray,
            };
            Some(Arc::new(cs))
        };

        let decode = get_f32_array(doc, dict.get(b"Decode").or_else(|_| dict.get(b"D")).ok());

        let mask = match dict.get(b"Mask").map(|o| resolve(doc, o)) {
            Ok(Object::Array(arr)) => MaskKind::ColorKey(
                arr.iter()
                    .map(|o| to_f32(resolve(doc, o)).max(0.0) as u32)
                    .collect(),
            ),
            Ok(stream @ Object::Stream(_)) => {
                match PdfImage::from_xobject(doc, stream, resources, cache) {
                    Ok(m) => MaskKind::Stencil(Box::new(m)),
                    Err(e) => {
                        log::warn!("stencil /Mask skipped: {e}");
                        MaskKind::None
                    }
                }
            }
            _ => MaskKind::None,
        };

        // /Matte premultiplication is recognized but not undone
        if dict.get(b"Matte").is_ok() {
            log::warn!("/Matte premultiplied soft mask is not dematted");
        }

        let smask = match dict.get(b"SMask") {
            Ok(obj) => match PdfImage::from_xobject(doc, obj, resources, cache) {
                Ok(m) => Some(Box::new(m)),
                Err(e) => {
                    log::warn!("/SMask skipped: {e}");
                    None
                }
            },
            Err(_) => None,
        };

        let decode_parms = dict
            .get(b"DecodeParms")
            .or_else(|_| dict.get(b"DP"))
            .ok()
            .and_then(|o| match resolve(doc, o) {
                Object::Dictionary(d) => Some(d.clone()),
                // only the first entry drives the image codec
                Object::Array(arr) => arr.iter().find_map(|e| get_dict(doc, e)).cloned(),
                _ => None,
            });

        let interpolate = dict
            .get(b"Interpolate")
            .or_else(|_| dict.get(b"I"))
            .map(|o| matches!(resolve(doc, o), Object::Boolean(true)))
            .unwrap_or(false);

        let intent = dict
            .get(b"Intent")
            .ok()
            .and_then(as_name_string)
            .and_then(|n| RenderingIntent::from_name(&n));

        Ok(PdfImage {
            width,
            height,
            bits_per_component,
            color_space,
            data,
            decode,
            mask,
            smask,
            decode_parms,
            interpolate,
            intent,
            is_image_mask,
            kind,
        })
    }

    /// Builds an inline image (`BI ... ID ... EI`). Abbreviated keys are
    /// understood by the shared constructor; abbreviated filter names are
    /// expanded so the stream machinery can decode compressed payloads.
    pub fn from_inline(
        doc: &Document,
        dict: &Dictionary,
        data: Vec<u8>,
        resources: &PageResources,
        cache: &DocumentCache,
    ) -> Result<PdfImage, String> {
        let filters = filter_names(doc, dict);
        let kind = kind_from_filters(&filters);
        let data = if kind == ImageKind::Raw && !filters.is_empty() {
            let mut full = dict.clone();
            full.remove(b"F");
            let expanded: Vec<Object> = filters
                .iter()
                .map(|f| Object::Name(expand_filter_name(f).as_bytes().to_vec()))
                .collect();
            full.set(
                "Filter",
                if expanded.len() == 1 {
                    expanded[0].clone()
                } else {
                    Object::Array(expanded)
                },
            );
            let stream = lopdf::Stream::new(full, data);
            stream
                .decompressed_content()
                .map_err(|e| format!("inline image filters: {e}"))?
        } else {
            data
        };
        Self::from_dict_and_data(doc, dict, data, kind, resources, cache)
    }

    fn n_components(&self) -> usize {
        if self.is_image_mask {
            1
        } else {
            self.color_space.as_ref().map(|c| c.components()).unwrap_or(1)
        }
    }

    fn effective_decode(&self) -> Vec<f32> {
        if let Some(d) = &self.decode {
            if !d.is_empty() {
                return d.clone();
            }
        }
        if self.is_image_mask {
            // 1 = transparent, 0 = paint
            return vec![1.0, 0.0];
        }
        self.color_space
            .as_ref()
            .map(|c| c.default_decode(self.bits_per_component))
            .unwrap_or_else(|| vec![0.0, 1.0])
    }

    fn ccitt_params(&self) -> CcittParams {
        let mut params = CcittParams {
            columns: self.width as usize,
            rows: self.height as usize,
            ..CcittParams::default()
        };
        if let Some(dp) = &self.decode_parms {
            let get_num = |key: &[u8]| dp.get(key).ok().map(to_f32);
            let get_bool = |key: &[u8]| {
                dp.get(key)
                    .ok()
                    .map(|o| matches!(o, Object::Boolean(true)))
            };
            if let Some(k) = get_num(b"K") {
                params.k = k as i32;
            }
            if let Some(c) = get_num(b"Columns") {
                params.columns = c.max(1.0) as usize;
            }
            if let Some(r) = get_num(b"Rows") {
                params.rows = r.max(0.0) as usize;
            }
            if let Some(v) = get_bool(b"EndOfLine") {
                params.end_of_line = v;
            }
            if let Some(v) = get_bool(b"EncodedByteAlign") {
                params.encoded_byte_align = v;
            }
            if let Some(v) = get_bool(b"EndOfBlock") {
                params.end_of_block = v;
            }
            if let Some(v) = get_bool(b"BlackIs1") {
                params.black_is_1 = v;
            }
        }
        if params.rows == 0 {
            params.rows = self.height as usize;
        }
        params
    }

    fn predictor_params(&self) -> PredictorParams {
        let mut params = PredictorParams {
            predictor: 1,
            colors: self.n_components(),
            bits_per_component: self.bits_per_component,
            columns: self.width as usize,
        };
        if let Some(dp) = &self.decode_parms {
            if let Ok(p) = dp.get(b"Predictor") {
                params.predictor = to_f32(p).max(1.0) as u8;
            }
            if let Ok(c) = dp.get(b"Colors") {
                params.colors = to_f32(c).max(1.0) as usize;
            }
            if let Ok(b) = dp.get(b"BitsPerComponent") {
                params.bits_per_component = to_f32(b).max(1.0) as u16;
            }
            if let Ok(c) = dp.get(b"Columns") {
                params.columns = to_f32(c).max(1.0) as usize;
            }
        }
        params
    }
}

/// Expands one packed row into integer samples, `bpc` in {1,2,4,8,16}.
fn expand_row_samples(row: &[u8], bpc: u16, count: usize, out: &mut Vec<u32>) {
    out.clear();
    match bpc {
        8 => out.extend(row.iter().take(count).map(|b| *b as u32)),
        1 | 2 | 4 => {
            let per_byte = 8 / bpc as usize;
            let mask = (1u32 << bpc) - 1;
            for i in 0..count {
                let byte = row.get(i / per_byte).copied().unwrap_or(0) as u32;
                let shift = 8 - bpc as usize * (i % per_byte + 1);
                out.push((byte >> shift) & mask);
            }
        }
        16 => {
            for i in 0..count {
                let hi = row.get(i * 2).copied().unwrap_or(0) as u32;
                let lo = row.get(i * 2 + 1).copied().unwrap_or(0) as u32;
                out.push((hi << 8) | lo);
            }
        }
        _ => out.extend(std::iter::repeat(0).take(count)),
    }
}

/// The decoded result: RGBA pixels or an alpha-only stencil.
pub enum DecodedImage {
    Pixels(RasterImage),
    Stencil(RasterImage),
}

impl DecodedImage {
    pub fn raster(self) -> RasterImage {
        match self {
            DecodedImage::Pixels(r) | DecodedImage::Stencil(r) => r,
        }
    }
}

/// Decodes a full image through the row processor.
///
/// Cancellation is honored at row boundaries. `Err` values are decode
/// errors; the caller decides between fallback and skip.
pub fn decode_image(
    image: &PdfImage,
    intent: RenderingIntent,
    cancel: &CancelToken,
) -> Result<DecodedImage, String> {
    let intent = image.intent.unwrap_or(intent);
    match image.kind {
        ImageKind::Raw => decode_raw(image, intent, cancel),
        ImageKind::Jpeg => decode_jpeg(image, intent, cancel),
        ImageKind::Ccitt => decode_ccitt(image, intent, cancel),
        ImageKind::Jpeg2000 => Err("JPXDecode is not built in".to_string()),
        ImageKind::Jbig2 => Err("JBIG2Decode is not built in".to_string()),
    }
}

struct RowProcessor<'a> {
    image: &'a PdfImage,
    intent: RenderingIntent,
    decode: Vec<f32>,
    n_comp: usize,
    max_sample: f32,
    /// RGBA8 output, or A8 for image masks.
    out: Vec<u8>,
    samples: Vec<u32>,
    comps: Vec<f32>,
    y: usize,
}

impl<'a> RowProcessor<'a> {
    fn new(image: &'a PdfImage, intent: RenderingIntent) -> Self {
        let n_comp = image.n_components();
        let bytes = if image.is_image_mask {
            image.width as usize * image.height as usize
        } else {
            image.width as usize * image.height as usize * 4
        };
        RowProcessor {
            image,
            intent,
            decode: image.effective_decode(),
            n_comp,
            max_sample: ((1u32 << image.bits_per_component.min(16)) - 1) as f32,
            out: vec![0; bytes],
            samples: Vec::new(),
            comps: vec![0.0; n_comp],
            y: 0,
        }
    }

    fn decode_component(&self, i: usize, s: u32) -> f32 {
        let lo = self.decode.get(2 * i).copied().unwrap_or(0.0);
        let hi = self.decode.get(2 * i + 1).copied().unwrap_or(1.0);
        lo + s as f32 * (hi - lo) / self.max_sample
    }

    fn color_key_hit(&self, px: usize) -> bool {
        let MaskKind::ColorKey(ranges) = &self.image.mask else {
            return false;
        };
        if ranges.len() < 2 * self.n_comp {
            return false;
        }
        (0..self.n_comp).all(|i| {
            let s = self.samples[px * self.n_comp + i];
            s >= ranges[2 * i] && s <= ranges[2 * i + 1]
        })
    }

    /// Consumes one expanded row of raw samples.
    fn push_row(&mut self) {
        let width = self.image.width as usize;
        if self.y >= self.image.height as usize {
            return;
        }
        if self.image.is_image_mask {
            for x in 0..width {
                let s = self.samples.get(x).copied().unwrap_or(0);
                let decoded = self.decode_component(0, s);
                // decoded 1 = opaque paint, 0 = transparent
                self.out[self.y * width + x] =
                    (decoded.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
            }
        } else {
            let cs = self.image.color_space.as_ref().cloned()
                .unwrap_or_else(|| Arc::new(ColorSpaceConv::DeviceGray));
            for x in 0..width {
                let dst = (self.y * width + x) * 4;
                if self.color_key_hit(x) {
                    self.out[dst..dst + 4].copy_from_slice(&[0, 0, 0, 0]);
                    continue;
                }
                for i in 0..self.n_comp {
                    let s = self.samples.get(x * self.n_comp + i).copied().unwrap_or(0);
                    self.comps[i] = self.decode_component(i, s);
                }
                let rgba = cs.to_srgb(&self.comps, self.intent).to_rgba8();
                self.out[dst..dst + 4].copy_from_slice(&rgba);
            }
        }
        self.y += 1;
    }

    fn finish(self) -> DecodedImage {
        let image = self.image;
        if image.is_image_mask {
            DecodedImage::Stencil(RasterImage::alpha8(image.width, image.height, self.out))
        } else {
            DecodedImage::Pixels(RasterImage::rgba8(image.width, image.height, self.out))
        }
    }
}

fn decode_raw(
    image: &PdfImage,
    intent: RenderingIntent,
    cancel: &CancelToken,
) -> Result<DecodedImage, String> {
    let params = image.predictor_params();
    let mut decoder = PredictorDecoder::new(image.data.clone(), params);
    let mut proc = RowProcessor::new(image, intent);
    let count = image.width as usize * image.n_components();
    for _ in 0..image.height {
        if cancel.is_cancelled() {
            return Err("cancelled".to_string());
        }
        let Some(row) = decoder.next_row() else { break };
        expand_row_samples(row, image.bits_per_component, count, &mut proc.samples);
        proc.push_row();
    }
    Ok(proc.finish())
}

fn decode_ccitt(
    image: &PdfImage,
    intent: RenderingIntent,
    cancel: &CancelToken,
) -> Result<DecodedImage, String> {
    let params = image.ccitt_params();
    let mut decoder = CcittDecoder::new(&image.data, params);
    let mut proc = RowProcessor::new(image, intent);
    let count = image.width as usize * image.n_components();
    for _ in 0..image.height {
        if cancel.is_cancelled() {
            return Err("cancelled".to_string());
        }
        let row = match decoder.next_row() {
            Some(Ok(row)) => row,
            Some(Err(e)) => return Err(format!("CCITT: {e}")),
            None => break,
        };
        expand_row_samples(&row, 1, count, &mut proc.samples);
        proc.push_row();
    }
    Ok(proc.finish())
}

fn decode_jpeg(
    image: &PdfImage,
    intent: RenderingIntent,
    cancel: &CancelToken,
) -> Result<DecodedImage, String> {
    let mut decoder = JpegDecoder::new(&image.data);
    let info = decoder.read_info()?;
    if info.width != image.width || info.height != image.height {
        log::warn!(
            "JPEG dimensions {}x{} disagree with dictionary {}x{}",
            info.width, info.height, image.width, image.height
        );
    }

    // reconcile the converter with the stream's component count; device
    // spaces switch, everything else stays as declared
    let declared = image.color_space.as_deref();
    let declared_device = matches!(
        declared,
        None | Some(ColorSpaceConv::DeviceGray)
            | Some(ColorSpaceConv::DeviceRgb)
            | Some(ColorSpaceConv::DeviceCmyk { .. })
    );
    let mut cs: Arc<ColorSpaceConv> = match image.color_space.as_ref() {
        Some(cs) if !declared_device || cs.components() == info.components => cs.clone(),
        _ => Arc::new(match info.color_model {
            JpegColorModel::Gray => ColorSpaceConv::DeviceGray,
            JpegColorModel::Rgb => ColorSpaceConv::DeviceRgb,
            JpegColorModel::Cmyk => ColorSpaceConv::DeviceCmyk { profile: None },
        }),
    };

    // an APP2 ICC profile upgrades a device space to ICCBased
    if declared_device {
        if let Some(icc_bytes) = &info.icc_profile {
            if let Ok(profile) = crate::icc_profile::IccProfile::parse(icc_bytes) {
                if profile.channels() == info.components {
                    cs = Arc::new(ColorSpaceConv::IccBased {
                        n: info.components,
                        profile: Some(Arc::new(profile)),
                        alternate: None,
                    });
                }
            }
        }
    }

    let width = image.width as usize;
    let src_width = info.width as usize;
    let n = info.components;
    let mut row = vec![0u8; src_width * n];

    // fast path: 8-bit device gray/RGB stream with neither mask nor /Decode
    let fast = matches!(
        cs.as_ref(),
        ColorSpaceConv::DeviceGray | ColorSpaceConv::DeviceRgb
    ) && image.decode.is_none()
        && matches!(image.mask, MaskKind::None);

    let mut out = vec![0u8; width * image.height as usize * 4];
    let decode = image.decode.clone().unwrap_or_else(|| {
        (0..n).flat_map(|_| [0.0f32, 1.0]).collect()
    });
    let mut comps = vec![0.0f32; n];

    for y in 0..image.height as usize {
        if cancel.is_cancelled() {
            return Err("cancelled".to_string());
        }
        if !decoder.read_row(&mut row)? {
            break;
        }
        for x in 0..width.min(src_width) {
            let dst = (y * width + x) * 4;
            if fast {
                let (r, g, b) = if n == 1 {
                    let v = row[x];
                    (v, v, v)
                } else {
                    (row[x * n], row[x * n + 1], row[x * n + 2])
                };
                out[dst..dst + 4].copy_from_slice(&[r, g, b, 255]);
            } else {
                for i in 0..n {
                    let s = row[x * n + i] as f32 / 255.0;
                    let lo = decode.get(2 * i).copied().unwrap_or(0.0);
                    let hi = decode.get(2 * i + 1).copied().unwrap_or(1.0);
                    comps[i] = lo + s * (hi - lo);
                }
                let rgba = cs.to_srgb(&comps, image.intent.unwrap_or(intent)).to_rgba8();
                out[dst..dst + 4].copy_from_slice(&rgba);
            }
        }
    }
    Ok(DecodedImage::Pixels(RasterImage::rgba8(
        image.width,
        image.height,
        out,
    )))
}

/// Fallback JPEG decode through the `image` crate; used once when the
/// built-in decoder rejects a stream.
pub fn decode_jpeg_fallback(image: &PdfImage) -> Result<DecodedImage, String> {
    use image::ImageDecoder;
    let cursor = std::io::Cursor::new(image.data.as_slice());
    let decoder = image::codecs::jpeg::JpegDecoder::new(cursor)
        .map_err(|e| format!("fallback decoder: {e}"))?;
    let (w, h) = decoder.dimensions();
    let color = decoder.color_type();
    let mut buf = vec![0u8; decoder.total_bytes() as usize];
    decoder
        .read_image(&mut buf)
        .map_err(|e| format!("fallback decode: {e}"))?;

    let mut out = vec![0u8; w as usize * h as usize * 4];
    match color {
        image::ColorType::L8 => {
            for (i, v) in buf.iter().enumerate() {
                let dst = i * 4;
                out[dst..dst + 4].copy_from_slice(&[*v, *v, *v, 255]);
            }
        }
        image::ColorType::Rgb8 => {
            for (i, px) in buf.chunks_exact(3).enumerate() {
                let dst = i * 4;
                out[dst..dst + 4].copy_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        other => return Err(format!("fallback color type {other:?} unsupported")),
    }
    Ok(DecodedImage::Pixels(RasterImage::rgba8(w, h, out)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::ImageData;
    use pretty_assertions::assert_eq;

    fn gray_image(data: Vec<u8>, width: u32, height: u32, bpc: u16) -> PdfImage {
        PdfImage {
            width,
            height,
            bits_per_component: bpc,
            color_space: Some(Arc::new(ColorSpaceConv::DeviceGray)),
            data,
            decode: None,
            mask: MaskKind::None,
            smask: None,
            decode_parms: None,
            interpolate: false,
            intent: None,
            is_image_mask: false,
            kind: ImageKind::Raw,
        }
    }

    #[test]
    fn raw_gray_row_to_rgba() {
        let img = gray_image(vec![0, 128, 255], 3, 1, 8);
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Rgba8(px) = decoded.data else { panic!("expected pixels") };
        assert_eq!(&px[0..4], &[0, 0, 0, 255]);
        assert_eq!(&px[8..12], &[255, 255, 255, 255]);
    }

    #[test]
    fn decode_array_inverts() {
        let mut img = gray_image(vec![0], 1, 1, 8);
        img.decode = Some(vec![1.0, 0.0]);
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Rgba8(px) = decoded.data else { panic!() };
        assert_eq!(&px[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn image_mask_default_decode() {
        // 2x1 stencil, samples 0 and 1: 0 paints (opaque), 1 transparent
        let mut img = gray_image(vec![0b0100_0000], 2, 1, 1);
        img.is_image_mask = true;
        img.color_space = None;
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Alpha8(a) = decoded.data else { panic!("expected stencil") };
        assert_eq!(a, vec![255, 0]);
    }

    #[test]
    fn color_key_mask_blanks_pixels() {
        let mut img = gray_image(vec![10, 200], 2, 1, 8);
        img.mask = MaskKind::ColorKey(vec![0, 50]);
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Rgba8(px) = decoded.data else { panic!() };
        assert_eq!(px[3], 0); // masked out
        assert_eq!(px[7], 255);
    }

    #[test]
    fn indexed_palette_pipeline() {
        let cs = ColorSpaceConv::Indexed {
            base: Box::new(ColorSpaceConv::DeviceRgb),
            hival: 1,
            palette: vec![255, 0, 0, 0, 255, 0],
        };
        let mut img = gray_image(vec![0b0100_0000], 2, 1, 1);
        img.color_space = Some(Arc::new(cs));
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Rgba8(px) = decoded.data else { panic!() };
        assert_eq!(&px[0..3], &[255, 0, 0]);
        assert_eq!(&px[4..7], &[0, 255, 0]);
    }

    #[test]
    fn cancellation_stops_decoding() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let img = gray_image(vec![0; 100], 10, 10, 8);
        assert!(decode_image(&img, RenderingIntent::default(), &cancel).is_err());
    }

    #[test]
    fn sixteen_bit_samples() {
        let img = {
            let mut i = gray_image(vec![0xFF, 0xFF, 0x00, 0x00], 2, 1, 16);
            i.bits_per_component = 16;
            i
        };
        let decoded = decode_image(&img, RenderingIntent::default(), &CancelToken::new())
            .unwrap()
            .raster();
        let ImageData::Rgba8(px) = decoded.data else { panic!() };
        assert_eq!(&px[0..4], &[255, 255, 255, 255]);
        assert_eq!(&px[4..8], &[0, 0, 0, 255]);
    }
}
