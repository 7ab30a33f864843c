//! XObject classification and the Form XObject model.
//!
//! Forms re-enter the content interpreter with their own matrix, bbox clip
//! and resources; recursion is guarded by a visited set of form object
//! identities in the interpreter.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::graphics::{Point, Rect};
use crate::matrix::Matrix;
use crate::resources::{as_name_string, get_dict, get_f32_array, get_stream_data, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image,
    Form,
    PostScript,
}

/// Classifies a resource `/XObject` entry by `/Subtype`.
pub fn classify(doc: &Document, obj: &Object) -> Option<XObjectKind> {
    let dict = get_dict(doc, resolve(doc, obj))?;
    match dict.get(b"Subtype").ok().and_then(as_name_string)?.as_str() {
        "Image" => Some(XObjectKind::Image),
        "Form" => Some(XObjectKind::Form),
        "PS" => Some(XObjectKind::PostScript),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct FormXObject {
    pub bbox: Option<Rect>,
    pub matrix: Matrix,
    pub resources: Option<Dictionary>,
    pub content: Vec<u8>,
    /// Set when `/Group` declares a transparency group.
    pub transparency_group: bool,
    /// Identity used for the recursion guard; `None` for inline objects.
    pub object_id: Option<ObjectId>,
}

impl FormXObject {
    pub fn parse(doc: &Document, obj: &Object) -> Result<FormXObject, String> {
        let object_id = match obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let resolved = resolve(doc, obj);
        let dict = get_dict(doc, resolved).ok_or("form XObject is not a stream")?;
        let content = get_stream_data(doc, resolved).ok_or("form XObject without content")?;

        let bbox = get_f32_array(doc, dict.get(b"BBox").ok())
            .filter(|v| v.len() == 4)
            .map(|v| Rect::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3])));
        let matrix = get_f32_array(doc, dict.get(b"Matrix").ok())
            .filter(|v| v.len() == 6)
            .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
            .unwrap_or_default();
        let resources = dict
            .get(b"Resources")
            .ok()
            .and_then(|o| get_dict(doc, o))
            .cloned();
        let transparency_group = dict
            .get(b"Group")
            .ok()
            .and_then(|o| get_dict(doc, o))
            .and_then(|g| g.get(b"S").ok())
            .and_then(as_name_string)
            .map(|s| s == "Transparency")
            .unwrap_or(false);

        Ok(FormXObject {
            bbox,
            matrix,
            resources,
            content,
            transparency_group,
            object_id,
        })
    }
}
