//! Font model for rendering: Simple (Type1/TrueType/MMType1), Type 3 and
//! Composite (Type 0 + CID) fonts.
//!
//! Each font resolves character codes to `(unicode, glyph id, width)` through
//! a per-font memo. Embedded font programs are parsed on demand with
//! `ttf-parser`; the raw bytes are owned by the document cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use bitflags::bitflags;
use lopdf::{Dictionary, Document, Object};

use crate::cmap::{CharCode, Cmap};
use crate::encoding::{standard_glyph_name, unicode_for_glyph_name, BaseEncoding};
use crate::graphics::{PdfPath, Point, Rect};
use crate::matrix::Matrix;
use crate::resources::{
    as_name_string, get_dict, get_f32_array, get_stream_data, resolve, to_f32, DocumentCache,
};

bitflags! {
    /// Font descriptor `/Flags` word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FontFlags: u32 {
        const FIXED_PITCH = 1 << 0;
        const SERIF = 1 << 1;
        const SYMBOLIC = 1 << 2;
        const SCRIPT = 1 << 3;
        const NONSYMBOLIC = 1 << 5;
        const ITALIC = 1 << 6;
        const ALL_CAP = 1 << 16;
        const SMALL_CAP = 1 << 17;
        const FORCE_BOLD = 1 << 18;
    }
}

/// Format of an embedded font program, decided by which `FontFile*` key the
/// descriptor carries (and `/Subtype` for `FontFile3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedFontFormat {
    TrueType,
    Type1,
    Type1C,
    CidFontType0C,
    OpenType,
}

#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    pub data: Arc<Vec<u8>>,
    pub format: EmbeddedFontFormat,
}

#[derive(Debug, Clone, Default)]
pub struct FontDescriptor {
    pub ascent: f32,
    pub descent: f32,
    pub bbox: Rect,
    pub flags: FontFlags,
    pub missing_width: f32,
    pub font_file: Option<EmbeddedFont>,
}

impl FontDescriptor {
    fn parse(doc: &Document, dict: &Dictionary, cache: &DocumentCache) -> Self {
        let num = |key: &[u8]| {
            dict.get(key)
                .ok()
                .map(|o| to_f32(resolve(doc, o)))
                .unwrap_or(0.0)
        };
        let bbox = get_f32_array(doc, dict.get(b"FontBBox").ok())
            .filter(|v| v.len() == 4)
            .map(|v| Rect::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3])))
            .unwrap_or_default();

        // exactly one embedded program, FontFile2 > FontFile3 > FontFile
        let font_file = Self::embedded(doc, dict, b"FontFile2", cache)
            .map(|data| EmbeddedFont { data, format: EmbeddedFontFormat::TrueType })
            .or_else(|| {
                let obj = dict.get(b"FontFile3").ok()?;
                let format = get_dict(doc, obj)
                    .and_then(|d| d.get(b"Subtype").ok())
                    .and_then(as_name_string)
                    .map(|s| match s.as_str() {
                        "CIDFontType0C" => EmbeddedFontFormat::CidFontType0C,
                        "OpenType" => EmbeddedFontFormat::OpenType,
                        _ => EmbeddedFontFormat::Type1C,
                    })
                    .unwrap_or(EmbeddedFontFormat::Type1C);
                Self::embedded(doc, dict, b"FontFile3", cache)
                    .map(|data| EmbeddedFont { data, format })
            })
            .or_else(|| {
                Self::embedded(doc, dict, b"FontFile", cache)
                    .map(|data| EmbeddedFont { data, format: EmbeddedFontFormat::Type1 })
            });

        FontDescriptor {
            ascent: num(b"Ascent"),
            descent: num(b"Descent"),
            bbox,
            flags: FontFlags::from_bits_truncate(num(b"Flags") as u32),
            missing_width: num(b"MissingWidth"),
            font_file,
        }
    }

    fn embedded(
        doc: &Document,
        dict: &Dictionary,
        key: &[u8],
        cache: &DocumentCache,
    ) -> Option<Arc<Vec<u8>>> {
        let obj = dict.get(key).ok()?;
        let compute = || get_stream_data(doc, obj).map(Arc::new);
        match obj {
            Object::Reference(id) => cache.font_file(*id, compute),
            _ => compute(),
        }
    }
}

/// The `/Encoding` of a simple or Type 3 font.
#[derive(Debug, Clone, Default)]
pub struct EncodingSpec {
    pub base: Option<BaseEncoding>,
    pub differences: BTreeMap<u8, String>,
}

impl EncodingSpec {
    fn parse(doc: &Document, obj: Option<&Object>) -> Self {
        let mut spec = EncodingSpec::default();
        let Some(obj) = obj else { return spec };
        let obj = resolve(doc, obj);
        if let Some(name) = as_name_string(obj) {
            spec.base = BaseEncoding::from_name(&name);
            return spec;
        }
        if let Some(dict) = get_dict(doc, obj) {
            spec.base = dict
                .get(b"BaseEncoding")
                .ok()
                .and_then(as_name_string)
                .and_then(|n| BaseEncoding::from_name(&n));
            if let Ok(diffs) = dict.get(b"Differences") {
                if let Ok(arr) = resolve(doc, diffs).as_array() {
                    let mut code = 0u32;
                    for item in arr {
                        match resolve(doc, item) {
                            Object::Integer(i) => code = (*i).max(0) as u32,
                            Object::Real(r) => code = (*r).max(0.0) as u32,
                            name => {
                                if let Some(n) = as_name_string(name) {
                                    if code <= 255 {
                                        spec.differences.insert(code as u8, n);
                                    }
                                    code += 1;
                                }
                            }
                        }
                    }
                }
            }
        }
        spec
    }

    /// Glyph name for a code: `/Differences` first, then the base table.
    pub fn glyph_name(&self, code: u8) -> Option<&str> {
        if let Some(name) = self.differences.get(&code) {
            return Some(name.as_str());
        }
        standard_glyph_name(self.base.unwrap_or_default(), code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleFontSubtype {
    Type1,
    TrueType,
    MMType1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidFontSubtype {
    CidFontType0,
    CidFontType2,
}

/// CID to glyph id mapping of a CIDFontType2.
#[derive(Debug, Clone)]
pub enum CidToGid {
    Identity,
    /// Big-endian pairs from a `/CIDToGIDMap` stream, indexed by CID.
    Map(Vec<u16>),
}

impl CidToGid {
    pub fn gid(&self, cid: u32) -> u16 {
        match self {
            CidToGid::Identity => cid.min(u16::MAX as u32) as u16,
            CidToGid::Map(map) => map.get(cid as usize).copied().unwrap_or(0),
        }
    }
}

/// Fields shared by every font dictionary.
#[derive(Debug, Clone)]
pub struct FontCommon {
    pub base_font: String,
    pub descriptor: Option<FontDescriptor>,
    pub to_unicode: Option<Arc<Cmap>>,
}

#[derive(Debug, Clone)]
pub struct SimpleFont {
    pub common: FontCommon,
    pub subtype: SimpleFontSubtype,
    pub encoding: EncodingSpec,
    pub first_char: u32,
    pub widths: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Type3Font {
    pub common: FontCommon,
    pub font_matrix: Matrix,
    pub encoding: EncodingSpec,
    pub char_procs: Dictionary,
    pub resources: Option<Dictionary>,
    pub first_char: u32,
    pub widths: Vec<f32>,
}

impl Type3Font {
    /// The content stream of the glyph procedure for `code`.
    pub fn char_proc(&self, doc: &Document, code: u8) -> Option<Vec<u8>> {
        let name = self.encoding.glyph_name(code)?;
        let obj = self.char_procs.get(name.as_bytes()).ok()?;
        get_stream_data(doc, obj)
    }
}

/// A descendant CID font of a Type 0 font.
#[derive(Debug, Clone)]
pub struct CidFont {
    pub subtype: CidFontSubtype,
    pub base_font: String,
    pub default_width: f32,
    pub widths: HashMap<u32, f32>,
    pub cid_to_gid: CidToGid,
    pub descriptor: Option<FontDescriptor>,
}

impl CidFont {
    fn parse(doc: &Document, dict: &Dictionary, cache: &DocumentCache) -> Result<Self, String> {
        let subtype = match dict.get(b"Subtype").ok().and_then(as_name_string).as_deref() {
            Some("CIDFontType0") => CidFontSubtype::CidFontType0,
            Some("CIDFontType2") => CidFontSubtype::CidFontType2,
            other => return Err(format!("unknown CID font subtype {other:?}")),
        };
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(as_name_string)
            .unwrap_or_default();
        let default_width = dict
            .get(b"DW")
            .ok()
            .map(|o| to_f32(resolve(doc, o)))
            .unwrap_or(1000.0);

        let mut widths = HashMap::new();
        if let Ok(w) = dict.get(b"W") {
            if let Ok(arr) = resolve(doc, w).as_array() {
                parse_cid_widths(doc, arr, &mut widths);
            }
        }

        let cid_to_gid = match dict.get(b"CIDToGIDMap") {
            Ok(obj) => match resolve(doc, obj) {
                Object::Name(n) if n == b"Identity" => CidToGid::Identity,
                stream @ Object::Stream(_) => {
                    let data = get_stream_data(doc, stream).unwrap_or_default();
                    let map = data
                        .chunks_exact(2)
                        .map(|c| u16::from_be_bytes([c[0], c[1]]))
                        .collect();
                    CidToGid::Map(map)
                }
                _ => CidToGid::Identity,
            },
            Err(_) => CidToGid::Identity,
        };

        let descriptor = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| get_dict(doc, o))
            .map(|d| FontDescriptor::parse(doc, d, cache));

        Ok(CidFont { subtype, base_font, default_width, widths, cid_to_gid, descriptor })
    }

    pub fn width(&self, cid: u32) -> f32 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width)
    }
}

/// `/W` array: `c [w1 w2 ...]` or `cFirst cLast w`.
fn parse_cid_widths(doc: &Document, arr: &[Object], out: &mut HashMap<u32, f32>) {
    let mut i = 0;
    while i < arr.len() {
        let c = to_f32(resolve(doc, &arr[i])) as u32;
        match arr.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(ws)) => {
                for (j, w) in ws.iter().enumerate() {
                    out.insert(c + j as u32, to_f32(resolve(doc, w)));
                }
                i += 2;
            }
            Some(last) => {
                let c_last = to_f32(last) as u32;
                let Some(w_obj) = arr.get(i + 2) else { break };
                let w = to_f32(resolve(doc, w_obj));
                // cap runaway ranges from malformed files
                for cid in c..=c_last.min(c + 0xFFFF) {
                    out.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompositeFont {
    pub common: FontCommon,
    /// Name of a predefined encoding CMap, when `/Encoding` is a name.
    pub encoding_name: Option<String>,
    /// The code -> CID CMap; `None` means not mapped (codes stay unmapped).
    pub cmap: Option<Arc<Cmap>>,
    pub descendants: Vec<CidFont>,
}

impl CompositeFont {
    pub fn primary(&self) -> Option<&CidFont> {
        self.descendants.first()
    }

    pub fn vertical(&self) -> bool {
        self.cmap.as_ref().map(|c| c.vertical).unwrap_or(false)
            || self
                .encoding_name
                .as_deref()
                .map(|n| n.ends_with("-V"))
                .unwrap_or(false)
    }
}

/// Resolved info for one character code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharInfo {
    pub unicode: Option<String>,
    pub gid: u16,
    /// Horizontal advance per unit font size (glyph-space width already
    /// scaled into text space).
    pub width: f32,
}

#[derive(Debug)]
pub enum FontKind {
    Simple(SimpleFont),
    Type3(Type3Font),
    Composite(CompositeFont),
}

/// A parsed font plus its per-code memo.
#[derive(Debug)]
pub struct PdfFont {
    pub kind: FontKind,
    char_cache: RwLock<HashMap<CharCode, CharInfo>>,
}

impl PdfFont {
    /// Parses any `/Font` dictionary.
    pub fn parse(
        doc: &Document,
        dict: &Dictionary,
        cache: &DocumentCache,
    ) -> Result<PdfFont, String> {
        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(as_name_string)
            .ok_or("font without Subtype")?;
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(as_name_string)
            .unwrap_or_default();

        let to_unicode = dict.get(b"ToUnicode").ok().and_then(|obj| {
            let compute = || {
                let data = get_stream_data(doc, obj)?;
                match Cmap::parse(&data) {
                    Ok(c) => Some(Arc::new(c)),
                    Err(e) => {
                        log::info!("ToUnicode CMap rejected: {e}");
                        None
                    }
                }
            };
            match obj {
                Object::Reference(id) => cache.cmap(*id, compute),
                _ => compute(),
            }
        });

        let descriptor = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| get_dict(doc, o))
            .map(|d| FontDescriptor::parse(doc, d, cache));

        let common = FontCommon { base_font, descriptor, to_unicode };

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .map(|o| to_f32(resolve(doc, o)).max(0.0) as u32)
            .unwrap_or(0);
        let widths = get_f32_array(doc, dict.get(b"Widths").ok()).unwrap_or_default();

        let kind = match subtype.as_str() {
            "Type1" | "TrueType" | "MMType1" => {
                let subtype = match subtype.as_str() {
                    "TrueType" => SimpleFontSubtype::TrueType,
                    "MMType1" => SimpleFontSubtype::MMType1,
                    _ => SimpleFontSubtype::Type1,
                };
                FontKind::Simple(SimpleFont {
                    common,
                    subtype,
                    encoding: EncodingSpec::parse(doc, dict.get(b"Encoding").ok()),
                    first_char,
                    widths,
                })
            }
            "Type3" => {
                let font_matrix = get_f32_array(doc, dict.get(b"FontMatrix").ok())
                    .filter(|v| v.len() == 6)
                    .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
                    .unwrap_or_else(|| Matrix::scale(0.001, 0.001));
                let char_procs = dict
                    .get(b"CharProcs")
                    .ok()
                    .and_then(|o| get_dict(doc, o))
                    .cloned()
                    .ok_or("Type3 font without CharProcs")?;
                let resources = dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| get_dict(doc, o))
                    .cloned();
                FontKind::Type3(Type3Font {
                    common,
                    font_matrix,
                    encoding: EncodingSpec::parse(doc, dict.get(b"Encoding").ok()),
                    char_procs,
                    resources,
                    first_char,
                    widths,
                })
            }
            "Type0" => {
                let descendants_arr = dict
                    .get(b"DescendantFonts")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok().cloned())
                    .ok_or("Type0 font without DescendantFonts")?;
                let mut descendants = Vec::with_capacity(descendants_arr.len());
                for d in &descendants_arr {
                    if let Some(dd) = get_dict(doc, d) {
                        match CidFont::parse(doc, dd, cache) {
                            Ok(f) => descendants.push(f),
                            Err(e) => log::warn!("descendant font skipped: {e}"),
                        }
                    }
                }

                let mut encoding_name = None;
                let cmap = match dict.get(b"Encoding") {
                    Ok(enc) => match resolve(doc, enc) {
                        Object::Name(n) => {
                            let name = String::from_utf8_lossy(n).to_string();
                            let parsed = Cmap::predefined(&name);
                            encoding_name = Some(name);
                            parsed.map(Arc::new)
                        }
                        stream @ Object::Stream(_) => get_stream_data(doc, stream)
                            .and_then(|data| Cmap::parse(&data).ok())
                            .map(Arc::new),
                        _ => None,
                    },
                    // no Encoding entry behaves as Identity-H
                    Err(_) => {
                        encoding_name = Some("Identity-H".to_string());
                        Some(Arc::new(Cmap::identity(false)))
                    }
                };
                FontKind::Composite(CompositeFont { common, encoding_name, cmap, descendants })
            }
            other => return Err(format!("unknown font subtype /{other}")),
        };

        Ok(PdfFont { kind, char_cache: RwLock::new(HashMap::new()) })
    }

    pub fn is_type3(&self) -> bool {
        matches!(self.kind, FontKind::Type3(_))
    }

    pub fn type3(&self) -> Option<&Type3Font> {
        match &self.kind {
            FontKind::Type3(f) => Some(f),
            _ => None,
        }
    }

    pub fn vertical(&self) -> bool {
        match &self.kind {
            FontKind::Composite(c) => c.vertical(),
            _ => false,
        }
    }

    pub fn common(&self) -> &FontCommon {
        match &self.kind {
            FontKind::Simple(f) => &f.common,
            FontKind::Type3(f) => &f.common,
            FontKind::Composite(f) => &f.common,
        }
    }

    fn descriptor(&self) -> Option<&FontDescriptor> {
        match &self.kind {
            FontKind::Composite(c) => c
                .primary()
                .and_then(|d| d.descriptor.as_ref())
                .or(c.common.descriptor.as_ref()),
            _ => self.common().descriptor.as_ref(),
        }
    }

    /// The embedded font program, for the backend to rasterize from.
    pub fn embedded_font_data(&self) -> Option<Arc<Vec<u8>>> {
        self.descriptor().and_then(|d| d.font_file.as_ref()).map(|f| f.data.clone())
    }

    fn with_face<T>(&self, f: impl FnOnce(&ttf_parser::Face) -> T) -> Option<T> {
        let data = self.embedded_font_data()?;
        let face = ttf_parser::Face::parse(&data, 0).ok()?;
        Some(f(&face))
    }

    /// Splits a raw show-text string into character codes, font-directed.
    pub fn segment(&self, bytes: &[u8]) -> Vec<CharCode> {
        match &self.kind {
            FontKind::Simple(_) | FontKind::Type3(_) => {
                bytes.iter().map(|b| CharCode::one_byte(*b)).collect()
            }
            FontKind::Composite(composite) => {
                // a ToUnicode CMap with declared ranges drives segmentation
                if let Some(tu) = composite.common.to_unicode.as_ref() {
                    if tu.has_codespaces() {
                        return segment_by_cmap(tu, bytes);
                    }
                }
                // an embedded encoding CMap stream brings its own ranges;
                // name-selected encodings use the fixed-stride rule below
                if composite.encoding_name.is_none() {
                    if let Some(cmap) = composite.cmap.as_ref() {
                        if cmap.has_codespaces() {
                            return segment_by_cmap(cmap, bytes);
                        }
                    }
                }
                let two_byte = composite
                    .encoding_name
                    .as_deref()
                    .map(|n| {
                        n == "Identity-H"
                            || n == "Identity-V"
                            || (n.starts_with("Uni") && n.contains("-UTF16-"))
                    })
                    .unwrap_or(false);
                if two_byte && bytes.len() % 2 == 0 {
                    bytes
                        .chunks_exact(2)
                        .map(CharCode::from_bytes)
                        .collect()
                } else {
                    bytes.iter().map(|b| CharCode::one_byte(*b)).collect()
                }
            }
        }
    }

    /// The CID a code maps to, for composite fonts.
    pub fn cid_for(&self, code: CharCode) -> Option<u32> {
        match &self.kind {
            FontKind::Composite(c) => c.cmap.as_ref().and_then(|m| m.cid_for(code)),
            _ => None,
        }
    }

    /// Resolved `(unicode, gid, width)` for one code, memoized.
    pub fn char_info(&self, code: CharCode) -> CharInfo {
        if let Ok(cache) = self.char_cache.read() {
            if let Some(info) = cache.get(&code) {
                return info.clone();
            }
        }
        let info = self.compute_char_info(code);
        if let Ok(mut cache) = self.char_cache.write() {
            cache.entry(code).or_insert_with(|| info.clone());
        }
        info
    }

    fn compute_char_info(&self, code: CharCode) -> CharInfo {
        let mut unicode = self
            .common()
            .to_unicode
            .as_ref()
            .and_then(|tu| tu.unicode_for(code))
            .map(|s| s.to_string());

        let mut gid: u16 = 0;
        let mut width: Option<f32> = None;

        match &self.kind {
            FontKind::Simple(font) => {
                let byte = code.value as u8;
                let name = font.encoding.glyph_name(byte);
                if unicode.is_none() {
                    unicode = name.and_then(unicode_for_glyph_name);
                }
                // name -> GID via the embedded program's name table
                gid = self
                    .with_face(|face| {
                        if let Some(n) = name {
                            if let Some(id) = face.glyph_index_by_name(n) {
                                return id.0;
                            }
                        }
                        0
                    })
                    .unwrap_or(0);
                let idx = code.value.checked_sub(font.first_char).map(|i| i as usize);
                width = idx
                    .and_then(|i| font.widths.get(i))
                    .copied()
                    .map(|w| w / 1000.0);
                if width.is_none() {
                    let missing = font
                        .common
                        .descriptor
                        .as_ref()
                        .map(|d| d.missing_width)
                        .unwrap_or(0.0);
                    if missing > 0.0 {
                        width = Some(missing / 1000.0);
                    }
                }
            }
            FontKind::Type3(font) => {
                let byte = code.value as u8;
                if unicode.is_none() {
                    unicode = font
                        .encoding
                        .glyph_name(byte)
                        .and_then(unicode_for_glyph_name);
                }
                // widths are in glyph space, taken to text space by FontMatrix
                let idx = code.value.checked_sub(font.first_char).map(|i| i as usize);
                width = idx
                    .and_then(|i| font.widths.get(i))
                    .map(|w| font.font_matrix.transform_vector(Point::new(*w, 0.0)).x);
            }
            FontKind::Composite(composite) => {
                if let Some(cid) = composite.cmap.as_ref().and_then(|m| m.cid_for(code)) {
                    if let Some(descendant) = composite.primary() {
                        width = Some(descendant.width(cid) / 1000.0);
                        gid = match descendant.subtype {
                            CidFontSubtype::CidFontType2 => descendant.cid_to_gid.gid(cid),
                            // CID-keyed CFF subset fonts are written with
                            // CID == GID; the charset-based remap is left to
                            // the font program
                            CidFontSubtype::CidFontType0 => {
                                cid.min(u16::MAX as u32) as u16
                            }
                        };
                    }
                }
            }
        }

        // measurement fallback through the font program, unicode-keyed
        if (gid == 0 || width.is_none()) && unicode.is_some() {
            let ch = unicode.as_ref().and_then(|s| s.chars().next());
            if let Some(ch) = ch {
                if let Some((fallback_gid, fallback_width)) = self.with_face(|face| {
                    let id = face.glyph_index(ch)?;
                    let upem = face.units_per_em() as f32;
                    let adv = face
                        .glyph_hor_advance(id)
                        .map(|a| a as f32 / upem);
                    Some((id.0, adv))
                }).flatten() {
                    if gid == 0 {
                        gid = fallback_gid;
                    }
                    if width.is_none() {
                        width = fallback_width;
                    }
                }
            }
        }

        CharInfo { unicode, gid, width: width.unwrap_or(0.0) }
    }

    /// Outline of a glyph in text space (units scaled by 1/unitsPerEm),
    /// when the embedded program provides one.
    pub fn glyph_outline(&self, gid: u16) -> Option<PdfPath> {
        self.with_face(|face| {
            let mut builder = PathOutlineBuilder::new(1.0 / face.units_per_em() as f32);
            face.outline_glyph(ttf_parser::GlyphId(gid), &mut builder)?;
            Some(builder.path)
        })
        .flatten()
    }
}

/// Builds a [`PdfPath`] from `ttf-parser` outline callbacks.
struct PathOutlineBuilder {
    path: PdfPath,
    scale: f32,
}

impl PathOutlineBuilder {
    fn new(scale: f32) -> Self {
        PathOutlineBuilder { path: PdfPath::new(), scale }
    }

    fn pt(&self, x: f32, y: f32) -> Point {
        Point::new(x * self.scale, y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for PathOutlineBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.pt(x, y);
        self.path.move_to(p);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.pt(x, y);
        self.path.line_to(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        // quadratic raised to cubic
        let c = self.pt(x1, y1);
        let end = self.pt(x, y);
        let start = self.path.last_point().unwrap_or(end);
        let c1 = Point::new(
            start.x + 2.0 / 3.0 * (c.x - start.x),
            start.y + 2.0 / 3.0 * (c.y - start.y),
        );
        let c2 = Point::new(end.x + 2.0 / 3.0 * (c.x - end.x), end.y + 2.0 / 3.0 * (c.y - end.y));
        self.path.curve_to(c1, c2, end);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.pt(x1, y1);
        let c2 = self.pt(x2, y2);
        let end = self.pt(x, y);
        self.path.curve_to(c1, c2, end);
    }

    fn close(&mut self) {
        self.path.close();
    }
}

fn segment_by_cmap(cmap: &Cmap, bytes: &[u8]) -> Vec<CharCode> {
    let mut codes = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let code = cmap.next_code(bytes, pos);
        pos += code.byte_len as usize;
        codes.push(code);
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn simple_font(widths: Vec<f32>, first_char: u32) -> PdfFont {
        PdfFont {
            kind: FontKind::Simple(SimpleFont {
                common: FontCommon { base_font: "Helvetica".into(), descriptor: None, to_unicode: None },
                subtype: SimpleFontSubtype::Type1,
                encoding: EncodingSpec::default(),
                first_char,
                widths,
            }),
            char_cache: RwLock::new(HashMap::new()),
        }
    }

    fn identity_composite(widths: HashMap<u32, f32>, default_width: f32) -> PdfFont {
        PdfFont {
            kind: FontKind::Composite(CompositeFont {
                common: FontCommon { base_font: "Test".into(), descriptor: None, to_unicode: None },
                encoding_name: Some("Identity-H".into()),
                cmap: Some(Arc::new(Cmap::identity(false))),
                descendants: vec![CidFont {
                    subtype: CidFontSubtype::CidFontType2,
                    base_font: "Test".into(),
                    default_width,
                    widths,
                    cid_to_gid: CidToGid::Identity,
                    descriptor: None,
                }],
            }),
            char_cache: RwLock::new(HashMap::new()),
        }
    }

    #[test]
    fn simple_font_is_one_byte_per_code() {
        let font = simple_font(vec![500.0; 3], 65);
        let codes = font.segment(b"ABC");
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| c.byte_len == 1));
    }

    #[test]
    fn simple_width_lookup_scales_by_1000() {
        let font = simple_font(vec![722.0, 556.0], 72);
        assert_eq!(font.char_info(CharCode::one_byte(72)).width, 0.722);
        assert_eq!(font.char_info(CharCode::one_byte(73)).width, 0.556);
        // out of range: no width
        assert_eq!(font.char_info(CharCode::one_byte(200)).width, 0.0);
    }

    #[test]
    fn identity_h_segments_and_maps() {
        let font = identity_composite(HashMap::new(), 1000.0);
        let codes = font.segment(&[0x00, 0x41, 0x01, 0x02]);
        assert_eq!(codes.len(), 2);
        assert_eq!((codes[0].byte_len, codes[0].value), (2, 0x0041));
        assert_eq!((codes[1].byte_len, codes[1].value), (2, 0x0102));
        assert_eq!(font.cid_for(codes[0]), Some(65));
        assert_eq!(font.cid_for(codes[1]), Some(258));
    }

    #[test]
    fn identity_h_odd_length_falls_back_to_single_bytes() {
        let font = identity_composite(HashMap::new(), 1000.0);
        let codes = font.segment(&[0x00, 0x41, 0x01]);
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| c.byte_len == 1));
    }

    #[test]
    fn composite_width_default_and_override() {
        let mut widths = HashMap::new();
        widths.insert(65u32, 600.0f32);
        let font = identity_composite(widths, 1000.0);
        let code_a = CharCode::from_bytes(&[0x00, 0x41]);
        let code_b = CharCode::from_bytes(&[0x00, 0x42]);
        assert_eq!(font.char_info(code_a).width, 0.6);
        assert_eq!(font.char_info(code_b).width, 1.0);
    }

    #[test]
    fn to_unicode_fallback_via_differences_and_agl() {
        let mut diffs = BTreeMap::new();
        diffs.insert(65u8, "Adieresis".to_string());
        let font = PdfFont {
            kind: FontKind::Simple(SimpleFont {
                common: FontCommon { base_font: "F".into(), descriptor: None, to_unicode: None },
                subtype: SimpleFontSubtype::Type1,
                encoding: EncodingSpec { base: None, differences: diffs },
                first_char: 0,
                widths: vec![],
            }),
            char_cache: RwLock::new(HashMap::new()),
        };
        let info = font.char_info(CharCode::one_byte(65));
        assert_eq!(info.unicode.as_deref(), Some("Ä"));
    }

    #[test]
    fn char_info_is_deterministic() {
        let font = identity_composite(HashMap::new(), 1000.0);
        let bytes = [0x00, 0x41, 0x20, 0x01, 0x02];
        let first = font.segment(&bytes);
        let second = font.segment(&bytes);
        assert_eq!(first, second);
        let covered: usize = first.iter().map(|c| c.byte_len as usize).sum();
        assert_eq!(covered, bytes.len());
    }
}
