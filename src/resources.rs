//! Resource resolution and document-wide caches.
//!
//! Pages and forms carry resource dictionaries (`/Font`, `/XObject`,
//! `/ExtGState`, ...). The interpreter looks names up here; parsed fonts,
//! color spaces, CMaps and embedded font programs are cached per document and
//! are read-only after first publication.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::cmap::Cmap;
use crate::color::ColorSpaceConv;
use crate::font::PdfFont;
use crate::icc_profile::IccProfile;

/// Follows reference chains to the referenced object. Returns the input
/// unchanged when it is not a reference or the chain is broken.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut cur = obj;
    // bounded walk so reference cycles cannot hang the renderer
    for _ in 0..32 {
        match cur {
            Object::Reference(r) => match doc.get_object(*r) {
                Ok(next) => cur = next,
                Err(_) => return cur,
            },
            _ => return cur,
        }
    }
    cur
}

/// Numeric operand to f32; non-numbers become 0.0.
pub fn to_f32(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(r) => *r,
        _ => 0.0,
    }
}

/// PDF name bytes as an owned string.
pub fn as_name_string(obj: &Object) -> Option<String> {
    if let Object::Name(ref bytes) = obj {
        Some(String::from_utf8_lossy(bytes).to_string())
    } else {
        None
    }
}

/// Resolves `obj` into an array of f32, dereferencing elements as needed.
pub fn get_f32_array(doc: &Document, obj: Option<&Object>) -> Option<Vec<f32>> {
    let arr = resolve(doc, obj?).as_array().ok()?;
    Some(arr.iter().map(|o| to_f32(resolve(doc, o))).collect())
}

/// Resolves `obj` to a stream and returns its decoded content. Falls back to
/// the raw bytes when the filter chain cannot be decoded.
pub fn get_stream_data(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match resolve(doc, obj) {
        Object::Stream(s) => Some(s.decompressed_content().unwrap_or_else(|_| s.content.clone())),
        _ => None,
    }
}

/// Resolves `obj` to a dictionary (either a plain dictionary or the
/// dictionary of a stream).
pub fn get_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// The resource dictionaries visible to one content stream.
///
/// Forms and Type 3 fonts carry their own resources; missing categories fall
/// back to the parent scope by constructing the child with
/// [`PageResources::merged_with`].
#[derive(Debug, Clone)]
pub struct PageResources {
    pub fonts: Dictionary,
    pub xobjects: Dictionary,
    pub ext_gstates: Dictionary,
    pub shadings: Dictionary,
    pub patterns: Dictionary,
    pub color_spaces: Dictionary,
    pub properties: Dictionary,
}

impl Default for PageResources {
    fn default() -> Self {
        PageResources {
            fonts: Dictionary::new(),
            xobjects: Dictionary::new(),
            ext_gstates: Dictionary::new(),
            shadings: Dictionary::new(),
            patterns: Dictionary::new(),
            color_spaces: Dictionary::new(),
            properties: Dictionary::new(),
        }
    }
}

impl PageResources {
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let sub = |key: &[u8]| -> Dictionary {
            dict.get(key)
                .ok()
                .and_then(|o| get_dict(doc, o))
                .cloned()
                .unwrap_or_else(Dictionary::new)
        };
        PageResources {
            fonts: sub(b"Font"),
            xobjects: sub(b"XObject"),
            ext_gstates: sub(b"ExtGState"),
            shadings: sub(b"Shading"),
            patterns: sub(b"Pattern"),
            color_spaces: sub(b"ColorSpace"),
            properties: sub(b"Properties"),
        }
    }

    /// Child resources for a form or Type 3 glyph: the child's own entries
    /// win, empty categories inherit from `parent`.
    pub fn merged_with(mut self, parent: &PageResources) -> Self {
        fn fill(dst: &mut Dictionary, src: &Dictionary) {
            if dst.is_empty() {
                *dst = src.clone();
            }
        }
        fill(&mut self.fonts, &parent.fonts);
        fill(&mut self.xobjects, &parent.xobjects);
        fill(&mut self.ext_gstates, &parent.ext_gstates);
        fill(&mut self.shadings, &parent.shadings);
        fill(&mut self.patterns, &parent.patterns);
        fill(&mut self.color_spaces, &parent.color_spaces);
        fill(&mut self.properties, &parent.properties);
        self
    }

    pub fn font(&self, name: &str) -> Option<&Object> {
        self.fonts.get(name.as_bytes()).ok()
    }

    pub fn xobject(&self, name: &str) -> Option<&Object> {
        self.xobjects.get(name.as_bytes()).ok()
    }

    pub fn ext_gstate(&self, name: &str) -> Option<&Object> {
        self.ext_gstates.get(name.as_bytes()).ok()
    }

    pub fn shading(&self, name: &str) -> Option<&Object> {
        self.shadings.get(name.as_bytes()).ok()
    }

    pub fn pattern(&self, name: &str) -> Option<&Object> {
        self.patterns.get(name.as_bytes()).ok()
    }

    pub fn color_space(&self, name: &str) -> Option<&Object> {
        self.color_spaces.get(name.as_bytes()).ok()
    }
}

/// Per-document caches, keyed by the defining object id.
///
/// Writers serialize per map; a reader observing a missing entry recomputes
/// locally and the first published value wins.
#[derive(Debug, Default)]
pub struct DocumentCache {
    fonts: RwLock<BTreeMap<ObjectId, Arc<PdfFont>>>,
    color_spaces: RwLock<BTreeMap<ObjectId, Arc<ColorSpaceConv>>>,
    cmaps: RwLock<BTreeMap<ObjectId, Arc<Cmap>>>,
    icc_profiles: RwLock<BTreeMap<ObjectId, Option<Arc<IccProfile>>>>,
    font_files: RwLock<BTreeMap<ObjectId, Arc<Vec<u8>>>>,
}

fn cached<V: Clone>(
    lock: &RwLock<BTreeMap<ObjectId, V>>,
    key: ObjectId,
    compute: impl FnOnce() -> Option<V>,
) -> Option<V> {
    if let Some(v) = lock.read().ok()?.get(&key) {
        return Some(v.clone());
    }
    let value = compute()?;
    let mut map = lock.write().ok()?;
    Some(map.entry(key).or_insert(value).clone())
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(
        &self,
        key: ObjectId,
        compute: impl FnOnce() -> Option<Arc<PdfFont>>,
    ) -> Option<Arc<PdfFont>> {
        cached(&self.fonts, key, compute)
    }

    pub fn color_space(
        &self,
        key: ObjectId,
        compute: impl FnOnce() -> Option<Arc<ColorSpaceConv>>,
    ) -> Option<Arc<ColorSpaceConv>> {
        cached(&self.color_spaces, key, compute)
    }

    pub fn cmap(
        &self,
        key: ObjectId,
        compute: impl FnOnce() -> Option<Arc<Cmap>>,
    ) -> Option<Arc<Cmap>> {
        cached(&self.cmaps, key, compute)
    }

    /// ICC parses can fail permanently; the failure is cached too so the
    /// profile is not re-parsed per draw.
    pub fn icc_profile(
        &self,
        key: ObjectId,
        compute: impl FnOnce() -> Option<Arc<IccProfile>>,
    ) -> Option<Arc<IccProfile>> {
        cached(&self.icc_profiles, key, || Some(compute()))?
    }

    pub fn font_file(
        &self,
        key: ObjectId,
        compute: impl FnOnce() -> Option<Arc<Vec<u8>>>,
    ) -> Option<Arc<Vec<u8>>> {
        cached(&self.font_files, key, compute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_follows_references() {
        let mut doc = Document::with_version("1.7");
        let id = doc.add_object(Object::Integer(42));
        let r = Object::Reference(id);
        assert_eq!(resolve(&doc, &r), &Object::Integer(42));
        let plain = Object::Real(1.5);
        assert_eq!(resolve(&doc, &plain), &plain);
    }

    #[test]
    fn cache_publishes_once() {
        let cache = DocumentCache::new();
        let first = cache.font_file((1, 0), || Some(Arc::new(vec![1u8])));
        let second = cache.font_file((1, 0), || Some(Arc::new(vec![2u8])));
        assert_eq!(first.unwrap().as_slice(), &[1u8]);
        assert_eq!(second.unwrap().as_slice(), &[1u8]);
    }
}
