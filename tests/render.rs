//! End-to-end page rendering through the public API: documents are built in
//! memory with lopdf and rendered onto a recording canvas.

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use rasterpdf::{
    srgb_compand, CancelToken, Canvas, CanvasOp, CompositeMode, ImageData, PdfRenderer,
    RecordingCanvas, Rect, RenderOptions, Shader,
};

/// One-page document with the given content stream and resources.
fn single_page(content: &[u8], resources: Dictionary) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
    let resources_id = doc.add_object(Object::Dictionary(resources));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

fn render(doc: Document) -> (RecordingCanvas, Vec<rasterpdf::RenderWarnMsg>) {
    let renderer = PdfRenderer::new(doc);
    let options = RenderOptions::default();
    let (w, h) = renderer.page_size(0, &options).unwrap();
    let mut canvas = RecordingCanvas::new(Rect::from_wh(w, h));
    let warnings = renderer
        .render_page(0, &mut canvas, &options, CancelToken::new())
        .unwrap();
    (canvas, warnings)
}

#[test]
fn page_render_balances_canvas_saves() {
    let content = b"q q 1 0 0 RG 0 0 100 100 re S Q Q Q Q";
    let doc = single_page(content, Dictionary::new());
    let (canvas, _) = render(doc);
    assert_eq!(canvas.save_count(), 0);
    assert!(canvas
        .ops
        .iter()
        .any(|op| matches!(op, CanvasOp::DrawPath { stroke: Some(_), .. })));
}

#[test]
fn hello_emits_one_glyph_run() {
    let mut widths = vec![0i64; 40];
    widths[0] = 722;
    widths[29] = 556;
    widths[36] = 222;
    widths[39] = 556;
    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "FirstChar" => 72,
                "LastChar" => 111,
                "Widths" => widths.into_iter().map(Object::Integer).collect::<Vec<_>>(),
            },
        },
    };
    let content = b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET";
    let doc = single_page(content, resources);
    let (canvas, warnings) = render(doc);
    assert!(warnings.iter().all(|w| w.severity != "error"), "{warnings:?}");

    let runs: Vec<_> = canvas
        .ops
        .iter()
        .filter_map(|op| match op {
            CanvasOp::DrawGlyphRun { run, .. } => Some(run),
            _ => None,
        })
        .collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].glyphs.len(), 5);
    assert_eq!(runs[0].font_size, 12.0);
    // the run is positioned at the Td origin in user space
    assert_eq!((runs[0].matrix.e, runs[0].matrix.f), (72.0, 720.0));
}

#[test]
fn axial_shading_paints_gradient_with_transparent_sentinels() {
    let resources = dictionary! {
        "Shading" => dictionary! {
            "S1" => dictionary! {
                "ShadingType" => 2,
                "ColorSpace" => "DeviceRGB",
                "Coords" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(0),
                ],
                "Domain" => vec![Object::Integer(0), Object::Integer(1)],
                "Function" => dictionary! {
                    "FunctionType" => 2,
                    "Domain" => vec![Object::Integer(0), Object::Integer(1)],
                    "C0" => vec![Object::Integer(1), Object::Integer(0), Object::Integer(0)],
                    "C1" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(1)],
                    "N" => 1,
                },
            },
        },
    };
    let content = b"/S1 sh";
    let doc = single_page(content, resources);
    let (canvas, _) = render(doc);

    let gradient = canvas
        .ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawPath { paint, .. } => match &paint.shader {
                Shader::LinearGradient { start, end, stops, .. } => {
                    Some((*start, *end, stops.clone()))
                }
                _ => None,
            },
            _ => None,
        })
        .expect("a linear gradient draw");
    let (start, end, stops) = gradient;
    assert_eq!((start.x, start.y), (0.0, 0.0));
    assert_eq!((end.x, end.y), (100.0, 0.0));
    // both /Extend flags default false: transparent sentinels at the edges
    assert_eq!(stops.first().unwrap().color.a, 0.0);
    assert_eq!(stops.last().unwrap().color.a, 0.0);
    // midpoint stop carries linear (0.5, 0, 0.5) through the transfer curve
    let mid = stops
        .iter()
        .min_by(|a, b| {
            (a.offset - 0.5).abs().partial_cmp(&(b.offset - 0.5).abs()).unwrap()
        })
        .unwrap();
    assert!((mid.color.r - srgb_compand(0.5)).abs() < 0.02);
    assert!(mid.color.g < 0.01);
    assert!((mid.color.b - srgb_compand(0.5)).abs() < 0.02);
}

fn image_mask_doc(sample: u8) -> Document {
    let mut doc = Document::with_version("1.7");
    let mask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ImageMask" => true,
        },
        vec![sample],
    ));
    let pages_id = doc.new_object_id();
    let content: &[u8] = b"1 0 0 rg q 10 0 0 10 0 0 cm /M1 Do Q";
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
    let resources_id = doc.add_object(Object::Dictionary(dictionary! {
        "XObject" => dictionary! { "M1" => Object::Reference(mask_id) },
    }));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(100),
            Object::Integer(100),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

#[test]
fn image_mask_zero_paints_fill_color() {
    // sample bit 0: opaque stencil, red fill composed source-in
    let (canvas, _) = render(image_mask_doc(0x00));
    let mask_alpha = canvas
        .ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawImage { image, .. } => match &image.data {
                ImageData::Alpha8(a) => Some(a.clone()),
                _ => None,
            },
            _ => None,
        })
        .expect("stencil draw");
    assert_eq!(mask_alpha, vec![255]);

    let fill = canvas
        .ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawPath { paint, .. }
                if paint.composite == CompositeMode::SourceIn =>
            {
                Some(paint.clone())
            }
            _ => None,
        })
        .expect("source-in fill");
    match fill.shader {
        Shader::Solid(c) => {
            assert!(c.r > 0.99 && c.g < 0.01 && c.b < 0.01);
        }
        other => panic!("expected solid fill, got {other:?}"),
    }
}

#[test]
fn image_mask_one_is_transparent() {
    // sample bit 1 (high bit of the single byte): transparent after the
    // default [1 0] decode
    let (canvas, _) = render(image_mask_doc(0x80));
    let mask_alpha = canvas
        .ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawImage { image, .. } => match &image.data {
                ImageData::Alpha8(a) => Some(a.clone()),
                _ => None,
            },
            _ => None,
        })
        .expect("stencil draw");
    assert_eq!(mask_alpha, vec![0]);
}

#[test]
fn inline_image_draws_into_unit_square() {
    let content: Vec<u8> =
        b"q 20 0 0 20 40 40 cm BI /W 2 /H 2 /BPC 8 /CS /G ID \x00\x40\x80\xFF EI Q".to_vec();
    let doc = single_page(&content, Dictionary::new());
    let (canvas, warnings) = render(doc);
    assert!(warnings.iter().all(|w| w.severity != "error"), "{warnings:?}");

    let image = canvas
        .ops
        .iter()
        .find_map(|op| match op {
            CanvasOp::DrawImage { image, dst, .. } => Some((image.clone(), *dst)),
            _ => None,
        })
        .expect("inline image draw");
    assert_eq!((image.0.width, image.0.height), (2, 2));
    assert_eq!(image.1, Rect::from_wh(1.0, 1.0));
    let ImageData::Rgba8(px) = image.0.data else { panic!("expected pixels") };
    assert_eq!(&px[0..4], &[0, 0, 0, 255]);
    assert_eq!(&px[12..16], &[255, 255, 255, 255]);
}

#[test]
fn form_xobject_concats_matrix_and_clips_bbox() {
    let mut doc = Document::with_version("1.7");
    let form_content: &[u8] = b"0 0 1 rg 0 0 50 50 re f";
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(50),
                Object::Integer(50),
            ],
            "Matrix" => vec![
                Object::Integer(2),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(2),
                Object::Integer(0),
                Object::Integer(0),
            ],
        },
        form_content.to_vec(),
    ));
    let pages_id = doc.new_object_id();
    let content: &[u8] = b"/Fm1 Do";
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
    let resources_id = doc.add_object(Object::Dictionary(dictionary! {
        "XObject" => dictionary! { "Fm1" => Object::Reference(form_id) },
    }));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(200),
            Object::Integer(200),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let (canvas, _) = render(doc);
    assert_eq!(canvas.save_count(), 0);
    let concats: Vec<_> = canvas
        .ops
        .iter()
        .filter_map(|op| match op {
            CanvasOp::Concat(m) => Some(*m),
            _ => None,
        })
        .collect();
    assert!(concats.iter().any(|m| m.a == 2.0 && m.d == 2.0));
    assert!(canvas.ops.iter().any(|op| matches!(op, CanvasOp::ClipPath { .. })));
    assert!(canvas.ops.iter().any(|op| matches!(op, CanvasOp::DrawPath { .. })));
}

#[test]
fn cancellation_returns_cleanly() {
    let content = b"q 0 0 100 100 re f Q";
    let doc = single_page(content, Dictionary::new());
    let renderer = PdfRenderer::new(doc);
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut canvas = RecordingCanvas::new(Rect::from_wh(612.0, 792.0));
    let result = renderer.render_page(0, &mut canvas, &RenderOptions::default(), cancel);
    assert!(matches!(result, Err(rasterpdf::RenderError::Cancelled)));
    // the canvas is left balanced even on the error path
    assert_eq!(canvas.save_count(), 0);
}
