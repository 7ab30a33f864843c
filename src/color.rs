//! Color spaces and conversion to sRGB.
//!
//! Every color space is represented by one [`ColorSpaceConv`] value exposing
//! `components()` and `to_srgb()`. Converters are parsed once per document
//! and shared by reference; graphics states hold `Arc`s to them.

use std::sync::Arc;

use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use serde_derive::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::function::PdfFunction;
use crate::graphics::RenderingIntent;
use crate::icc_profile::{IccProfile, Pcs};
use crate::resources::{
    as_name_string, get_dict, get_f32_array, get_stream_data, resolve, to_f32, DocumentCache,
    PageResources,
};

/// A color in (non-linear) sRGB with alpha, all components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Rgba = Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const TRANSPARENT: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Rgba {
        Rgba { r, g, b, a: 1.0 }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
            (self.g.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
            (self.b.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
            (self.a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        ]
    }

    /// Rec. 709 luma, used for luminosity soft masks.
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

const SRGB_LUT_SIZE: usize = 2048;

/// Precomputed sRGB companding curve over linear `[0, 1]`.
static SRGB_COMPAND_LUT: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..SRGB_LUT_SIZE)
        .map(|i| {
            let x = i as f32 / (SRGB_LUT_SIZE - 1) as f32;
            if x <= 0.0031308 {
                12.92 * x
            } else {
                1.055 * x.powf(1.0 / 2.4) - 0.055
            }
        })
        .collect()
});

/// Linear-light value to the sRGB transfer curve.
pub fn srgb_compand(linear: f32) -> f32 {
    let x = linear.clamp(0.0, 1.0);
    let p = x * (SRGB_LUT_SIZE - 1) as f32;
    let i = p as usize;
    if i >= SRGB_LUT_SIZE - 1 {
        return SRGB_COMPAND_LUT[SRGB_LUT_SIZE - 1];
    }
    let frac = p - i as f32;
    SRGB_COMPAND_LUT[i] + (SRGB_COMPAND_LUT[i + 1] - SRGB_COMPAND_LUT[i]) * frac
}

/// Inverse of the transfer curve (used by gradient stop interpolation).
pub fn srgb_decompand(encoded: f32) -> f32 {
    let x = encoded.clamp(0.0, 1.0);
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// D50 reference white.
pub const D50: [f32; 3] = [0.96422, 1.0, 0.82521];

/// Bradford-adapted D50 -> D65 matrix, row major.
const ADAPT_D50_TO_D65: [f32; 9] = [
    0.955577, -0.023039, 0.063164,
    -0.028290, 1.009942, 0.021008,
    0.012298, -0.020483, 1.329910,
];

/// XYZ (D65) -> linear sRGB, row major.
const XYZ_D65_TO_SRGB: [f32; 9] = [
    3.240454, -1.537139, -0.498531,
    -0.969266, 1.876011, 0.041556,
    0.055643, -0.204026, 1.057225,
];

fn mat3_apply(m: &[f32; 9], v: [f32; 3]) -> [f32; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// XYZ relative to D50 into companded sRGB.
pub fn xyz_d50_to_srgb(xyz: [f32; 3]) -> Rgba {
    let d65 = mat3_apply(&ADAPT_D50_TO_D65, xyz);
    let lin = mat3_apply(&XYZ_D65_TO_SRGB, d65);
    Rgba::rgb(srgb_compand(lin[0]), srgb_compand(lin[1]), srgb_compand(lin[2]))
}

fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE L*a*b* (relative to `white`) to XYZ.
pub fn lab_to_xyz(l: f32, a: f32, b: f32, white: [f32; 3]) -> [f32; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    [
        white[0] * lab_f_inv(fx),
        white[1] * lab_f_inv(fy),
        white[2] * lab_f_inv(fz),
    ]
}

fn xyz_to_lab_l(y: f32, white_y: f32) -> f32 {
    116.0 * lab_f(y / white_y.max(1e-6)) - 16.0
}

/// CalGray parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CalGray {
    pub white_point: [f32; 3],
    pub gamma: f32,
}

/// CalRGB parameters; `matrix` is the PDF column-major `[XA YA ZA XB ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalRgb {
    pub white_point: [f32; 3],
    pub gamma: [f32; 3],
    pub matrix: [f32; 9],
}

/// A color-space converter. `to_srgb` is the single public contract: given
/// `components()` values it returns an sRGB color.
#[derive(Debug, Clone)]
pub enum ColorSpaceConv {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk {
        profile: Option<Arc<IccProfile>>,
    },
    CalGray(CalGray),
    CalRgb(CalRgb),
    Lab {
        white_point: [f32; 3],
        range: [f32; 4],
    },
    IccBased {
        n: usize,
        profile: Option<Arc<IccProfile>>,
        alternate: Option<Box<ColorSpaceConv>>,
    },
    Indexed {
        base: Box<ColorSpaceConv>,
        hival: u32,
        palette: Vec<u8>,
    },
    /// Separation and DeviceN share the tint-transform shape.
    Separation {
        n: usize,
        tint: Arc<PdfFunction>,
        alternate: Box<ColorSpaceConv>,
    },
    /// Placeholder for pattern selection; the optional base space carries the
    /// color of uncolored tiling patterns.
    Pattern {
        base: Option<Box<ColorSpaceConv>>,
    },
}

impl ColorSpaceConv {
    pub fn components(&self) -> usize {
        match self {
            ColorSpaceConv::DeviceGray | ColorSpaceConv::CalGray(_) => 1,
            ColorSpaceConv::DeviceRgb | ColorSpaceConv::CalRgb(_) => 3,
            ColorSpaceConv::Lab { .. } => 3,
            ColorSpaceConv::DeviceCmyk { .. } => 4,
            ColorSpaceConv::IccBased { n, .. } => *n,
            ColorSpaceConv::Indexed { .. } => 1,
            ColorSpaceConv::Separation { n, .. } => *n,
            ColorSpaceConv::Pattern { base } => {
                base.as_ref().map(|b| b.components()).unwrap_or(1)
            }
        }
    }

    /// Valid input range per component, `[lo, hi]` pairs.
    pub fn component_ranges(&self) -> Vec<[f32; 2]> {
        match self {
            ColorSpaceConv::Lab { range, .. } => vec![
                [0.0, 100.0],
                [range[0], range[1]],
                [range[2], range[3]],
            ],
            ColorSpaceConv::Indexed { hival, .. } => vec![[0.0, *hival as f32]],
            other => vec![[0.0, 1.0]; other.components()],
        }
    }

    /// The initial (black) color of this space.
    pub fn initial_color(&self) -> Vec<f32> {
        match self {
            ColorSpaceConv::DeviceCmyk { .. } => vec![0.0, 0.0, 0.0, 1.0],
            ColorSpaceConv::Lab { .. } => vec![0.0, 0.0, 0.0],
            other => vec![0.0; other.components()],
        }
    }

    /// Default `/Decode` array for image samples in this space.
    pub fn default_decode(&self, bits_per_component: u16) -> Vec<f32> {
        match self {
            ColorSpaceConv::Indexed { .. } => {
                let max = ((1u32 << bits_per_component.min(16)) - 1) as f32;
                vec![0.0, max]
            }
            ColorSpaceConv::Lab { range, .. } => {
                vec![0.0, 100.0, range[0], range[1], range[2], range[3]]
            }
            other => (0..other.components()).flat_map(|_| [0.0, 1.0]).collect(),
        }
    }

    /// Converts component values to sRGB; inputs are clamped per channel.
    pub fn to_srgb(&self, comps: &[f32], intent: RenderingIntent) -> Rgba {
        let ranges = self.component_ranges();
        let mut clamped: SmallVec<[f32; 4]> = SmallVec::with_capacity(ranges.len());
        for (i, r) in ranges.iter().enumerate() {
            clamped.push(comps.get(i).copied().unwrap_or(0.0).clamp(r[0], r[1]));
        }
        self.to_srgb_clamped(&clamped, intent)
    }

    fn to_srgb_clamped(&self, c: &[f32], intent: RenderingIntent) -> Rgba {
        match self {
            ColorSpaceConv::DeviceGray => {
                let g = c[0];
                Rgba::rgb(g, g, g)
            }
            ColorSpaceConv::DeviceRgb => Rgba::rgb(c[0], c[1], c[2]),
            ColorSpaceConv::DeviceCmyk { profile } => {
                if let Some(p) = profile {
                    if let Some(rgba) = icc_to_srgb(p, c, intent) {
                        return rgba;
                    }
                }
                let k = c[3];
                Rgba::rgb(
                    1.0 - (c[0] + k).min(1.0),
                    1.0 - (c[1] + k).min(1.0),
                    1.0 - (c[2] + k).min(1.0),
                )
            }
            ColorSpaceConv::CalGray(cal) => {
                let a = c[0].powf(cal.gamma);
                xyz_d50_to_srgb([
                    cal.white_point[0] * a,
                    cal.white_point[1] * a,
                    cal.white_point[2] * a,
                ])
            }
            ColorSpaceConv::CalRgb(cal) => {
                let a = c[0].powf(cal.gamma[0]);
                let b = c[1].powf(cal.gamma[1]);
                let cc = c[2].powf(cal.gamma[2]);
                // PDF stores the colorant matrix column-major
                let m = &cal.matrix;
                xyz_d50_to_srgb([
                    m[0] * a + m[3] * b + m[6] * cc,
                    m[1] * a + m[4] * b + m[7] * cc,
                    m[2] * a + m[5] * b + m[8] * cc,
                ])
            }
            ColorSpaceConv::Lab { white_point, .. } => {
                xyz_d50_to_srgb(lab_to_xyz(c[0], c[1], c[2], *white_point))
            }
            ColorSpaceConv::IccBased { profile, alternate, n } => {
                if let Some(p) = profile {
                    if let Some(rgba) = icc_to_srgb(p, c, intent) {
                        return rgba;
                    }
                }
                if let Some(alt) = alternate {
                    return alt.to_srgb(c, intent);
                }
                // device fallback by channel count
                match n {
                    1 => ColorSpaceConv::DeviceGray.to_srgb(c, intent),
                    4 => ColorSpaceConv::DeviceCmyk { profile: None }.to_srgb(c, intent),
                    _ => {
                        if c.len() >= 3 {
                            Rgba::rgb(c[0], c[1], c[2])
                        } else {
                            Rgba::BLACK
                        }
                    }
                }
            }
            ColorSpaceConv::Indexed { base, hival, palette } => {
                let i = (c[0].round().max(0.0) as u32).min(*hival) as usize;
                let n = base.components();
                let ranges = base.component_ranges();
                let mut comps = Vec::with_capacity(n);
                for j in 0..n {
                    let byte = palette.get(i * n + j).copied().unwrap_or(0) as f32 / 255.0;
                    let [lo, hi] = ranges[j];
                    comps.push(lo + byte * (hi - lo));
                }
                base.to_srgb(&comps, intent)
            }
            ColorSpaceConv::Separation { tint, alternate, .. } => {
                let alt_comps = tint.eval(c);
                alternate.to_srgb(&alt_comps, intent)
            }
            ColorSpaceConv::Pattern { base } => match base {
                Some(b) => b.to_srgb(c, intent),
                None => Rgba::BLACK,
            },
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, ColorSpaceConv::Pattern { .. })
    }

    /// Parses a color space from an operand or resource object.
    pub fn parse(doc: &Document, obj: &Object, cache: &DocumentCache) -> Result<Self, String> {
        let obj = resolve(doc, obj);
        if let Some(name) = as_name_string(obj) {
            return Self::from_device_name(&name)
                .ok_or_else(|| format!("unknown color space name /{name}"));
        }
        let arr = obj
            .as_array()
            .map_err(|_| "color space is neither name nor array".to_string())?;
        let family = arr
            .first()
            .and_then(as_name_string)
            .ok_or("color space array without family name")?;

        match family.as_str() {
            "ICCBased" => {
                let stream_obj = arr.get(1).ok_or("ICCBased without stream")?;
                let stream_dict = get_dict(doc, stream_obj).ok_or("ICCBased stream missing")?;
                let n = stream_dict
                    .get(b"N")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)) as usize)
                    .unwrap_or(3);
                let alternate = stream_dict
                    .get(b"Alternate")
                    .ok()
                    .and_then(|alt| Self::parse(doc, alt, cache).ok())
                    .map(Box::new);
                let profile = parse_icc_stream(doc, stream_obj, cache);
                Ok(ColorSpaceConv::IccBased { n, profile, alternate })
            }
            "Indexed" | "I" => {
                let base = Self::parse(doc, arr.get(1).ok_or("Indexed without base")?, cache)?;
                let hival = to_f32(resolve(doc, arr.get(2).ok_or("Indexed without hival")?))
                    .max(0.0) as u32;
                let lookup_obj = arr.get(3).ok_or("Indexed without lookup")?;
                let palette = match resolve(doc, lookup_obj) {
                    Object::String(bytes, _) => bytes.clone(),
                    other => get_stream_data(doc, other)
                        .ok_or("Indexed lookup is neither string nor stream")?,
                };
                Ok(ColorSpaceConv::Indexed { base: Box::new(base), hival, palette })
            }
            "CalGray" => {
                let dict = arr
                    .get(1)
                    .and_then(|o| get_dict(doc, o))
                    .ok_or("CalGray without dictionary")?;
                let white_point = get_f32_array(doc, dict.get(b"WhitePoint").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or(D50);
                let gamma = dict
                    .get(b"Gamma")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)))
                    .unwrap_or(1.0);
                Ok(ColorSpaceConv::CalGray(CalGray { white_point, gamma }))
            }
            "CalRGB" => {
                let dict = arr
                    .get(1)
                    .and_then(|o| get_dict(doc, o))
                    .ok_or("CalRGB without dictionary")?;
                let white_point = get_f32_array(doc, dict.get(b"WhitePoint").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or(D50);
                let gamma = get_f32_array(doc, dict.get(b"Gamma").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or([1.0, 1.0, 1.0]);
                let matrix = get_f32_array(doc, dict.get(b"Matrix").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
                Ok(ColorSpaceConv::CalRgb(CalRgb {
                    white_point,
                    gamma,
                    matrix,
                }))
            }
            "Lab" => {
                let dict = arr
                    .get(1)
                    .and_then(|o| get_dict(doc, o))
                    .ok_or("Lab without dictionary")?;
                let white_point = get_f32_array(doc, dict.get(b"WhitePoint").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or(D50);
                let range = get_f32_array(doc, dict.get(b"Range").ok())
                    .and_then(|v| v.try_into().ok())
                    .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
                Ok(ColorSpaceConv::Lab { white_point, range })
            }
            "Separation" => {
                let alternate =
                    Self::parse(doc, arr.get(2).ok_or("Separation without alternate")?, cache)?;
                let tint = PdfFunction::parse(doc, arr.get(3).ok_or("Separation without tint")?)?;
                Ok(ColorSpaceConv::Separation {
                    n: 1,
                    tint: Arc::new(tint),
                    alternate: Box::new(alternate),
                })
            }
            "DeviceN" => {
                let names = resolve(doc, arr.get(1).ok_or("DeviceN without names")?)
                    .as_array()
                    .map_err(|_| "DeviceN names is not an array")?
                    .len();
                let alternate =
                    Self::parse(doc, arr.get(2).ok_or("DeviceN without alternate")?, cache)?;
                let tint = PdfFunction::parse(doc, arr.get(3).ok_or("DeviceN without tint")?)?;
                Ok(ColorSpaceConv::Separation {
                    n: names,
                    tint: Arc::new(tint),
                    alternate: Box::new(alternate),
                })
            }
            "Pattern" => {
                let base = match arr.get(1) {
                    Some(b) => Some(Box::new(Self::parse(doc, b, cache)?)),
                    None => None,
                };
                Ok(ColorSpaceConv::Pattern { base })
            }
            other => Self::from_device_name(other)
                .ok_or_else(|| format!("unknown color space family /{other}")),
        }
    }

    /// Device names plus the inline-image abbreviations.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(ColorSpaceConv::DeviceGray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpaceConv::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Some(ColorSpaceConv::DeviceCmyk { profile: None }),
            "Pattern" => Some(ColorSpaceConv::Pattern { base: None }),
            _ => None,
        }
    }

    /// Resolves a `cs`/`CS` operand: device name, `/DefaultXxx` override, or
    /// a named entry of the resource `/ColorSpace` dictionary.
    pub fn from_operand(
        doc: &Document,
        obj: &Object,
        resources: &PageResources,
        cache: &DocumentCache,
    ) -> Result<Self, String> {
        if let Some(name) = as_name_string(resolve(doc, obj)) {
            if let Some(device) = Self::from_device_name(&name) {
                let default_name = match name.as_str() {
                    "DeviceGray" => Some("DefaultGray"),
                    "DeviceRGB" => Some("DefaultRGB"),
                    "DeviceCMYK" => Some("DefaultCMYK"),
                    _ => None,
                };
                if let Some(default) =
                    default_name.and_then(|dn| resources.color_space(dn))
                {
                    if let Ok(cs) = Self::parse(doc, default, cache) {
                        return Ok(cs);
                    }
                }
                return Ok(device);
            }
            if let Some(entry) = resources.color_space(&name) {
                return Self::parse(doc, entry, cache);
            }
            return Err(format!("color space /{name} not found in resources"));
        }
        Self::parse(doc, obj, cache)
    }
}

/// Parses (and caches, when the stream is an indirect object) an ICC stream.
pub fn parse_icc_stream(
    doc: &Document,
    obj: &Object,
    cache: &DocumentCache,
) -> Option<Arc<IccProfile>> {
    let compute = || -> Option<Arc<IccProfile>> {
        let data = get_stream_data(doc, obj)?;
        match IccProfile::parse(&data) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                log::info!("ICC profile rejected: {e}");
                None
            }
        }
    };
    match obj {
        Object::Reference(id) => cache.icc_profile(*id, compute),
        _ => compute(),
    }
}

fn icc_to_srgb(profile: &IccProfile, comps: &[f32], intent: RenderingIntent) -> Option<Rgba> {
    let (pcs_val, pcs) = profile.to_pcs(comps, intent)?;
    let mut xyz = match pcs {
        Pcs::Xyz => pcs_val,
        Pcs::Lab => lab_to_xyz(pcs_val[0], pcs_val[1], pcs_val[2], D50),
    };
    // black-point compensation: rescale L* so the profile black lands at 0
    if let Some(bp) = profile.usable_black_point() {
        let bp_l = xyz_to_lab_l(bp[1], D50[1]);
        if bp_l > 0.0 && bp_l < 50.0 {
            let l = xyz_to_lab_l(xyz[1], D50[1]);
            let scaled = ((l - bp_l) * 100.0 / (100.0 - bp_l)).max(0.0);
            if l > 0.0 {
                let target_y = D50[1] * lab_f_inv((scaled + 16.0) / 116.0);
                let cur_y = xyz[1].max(1e-6);
                let ratio = target_y / cur_y;
                xyz = [xyz[0] * ratio, xyz[1] * ratio, xyz[2] * ratio];
            }
        }
    }
    Some(xyz_d50_to_srgb(xyz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn device_gray_replicates() {
        let cs = ColorSpaceConv::DeviceGray;
        let c = cs.to_srgb(&[0.25], RenderingIntent::default());
        assert_eq!((c.r, c.g, c.b), (0.25, 0.25, 0.25));
    }

    #[test]
    fn cmyk_naive_formula() {
        let cs = ColorSpaceConv::DeviceCmyk { profile: None };
        let c = cs.to_srgb(&[1.0, 0.0, 0.0, 0.0], RenderingIntent::default());
        assert_eq!((c.r, c.g, c.b), (0.0, 1.0, 1.0));
        let k = cs.to_srgb(&[0.0, 0.0, 0.0, 1.0], RenderingIntent::default());
        assert_eq!((k.r, k.g, k.b), (0.0, 0.0, 0.0));
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let cs = ColorSpaceConv::DeviceRgb;
        let c = cs.to_srgb(&[2.0, -1.0, 0.5], RenderingIntent::default());
        assert_eq!((c.r, c.g, c.b), (1.0, 0.0, 0.5));
    }

    #[test]
    fn indexed_palette_lookup() {
        let cs = ColorSpaceConv::Indexed {
            base: Box::new(ColorSpaceConv::DeviceRgb),
            hival: 1,
            palette: vec![255, 0, 0, 0, 0, 255],
        };
        let red = cs.to_srgb(&[0.0], RenderingIntent::default());
        assert_eq!((red.r, red.g, red.b), (1.0, 0.0, 0.0));
        let blue = cs.to_srgb(&[1.0], RenderingIntent::default());
        assert_eq!((blue.r, blue.g, blue.b), (0.0, 0.0, 1.0));
        // index clamps to hival
        let clamped = cs.to_srgb(&[9.0], RenderingIntent::default());
        assert_eq!((clamped.r, clamped.g, clamped.b), (0.0, 0.0, 1.0));
    }

    #[test]
    fn srgb_companding_endpoints() {
        assert_eq!(srgb_compand(0.0), 0.0);
        assert!((srgb_compand(1.0) - 1.0).abs() < 1e-6);
        let mid = srgb_compand(0.5);
        assert!((mid - 0.7354).abs() < 2e-3);
        assert!((srgb_decompand(srgb_compand(0.18)) - 0.18).abs() < 1e-3);
    }

    #[test]
    fn lab_white_is_white() {
        let cs = ColorSpaceConv::Lab { white_point: D50, range: [-100.0, 100.0, -100.0, 100.0] };
        let c = cs.to_srgb(&[100.0, 0.0, 0.0], RenderingIntent::default());
        assert!(c.r > 0.98 && c.g > 0.98 && c.b > 0.98);
    }
}
