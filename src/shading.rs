//! Shadings (`sh` operator and PatternType 2): function-based, axial,
//! radial, Gouraud meshes, Coons and tensor-product patch meshes.
//!
//! Axial and radial shadings sample their functions at 64 stops and become
//! backend gradients; meshes decode the packed vertex stream and batch into
//! one `draw_vertices` call; Coons patches go to the backend patch
//! primitive; tensor patches are tessellated here.

use std::sync::Arc;

use lopdf::{Document, Object};

use crate::canvas::{Canvas, GradientStop, MeshVertex, Paint, Shader};
use crate::color::{ColorSpaceConv, Rgba};
use crate::error::{CancelToken, RenderError};
use crate::function::{BitReader, PdfFunction};
use crate::graphics::{PdfPath, Point, Rect, RenderingIntent, WindingOrder};
use crate::matrix::Matrix;
use crate::resources::{
    get_dict, get_f32_array, get_stream_data, resolve, to_f32, DocumentCache,
};

const GRADIENT_STOPS: usize = 64;

#[derive(Debug, Clone)]
pub struct ShadingDefinition {
    pub shading_type: u8,
    pub color_space: Arc<ColorSpaceConv>,
    pub functions: Vec<Arc<PdfFunction>>,
    pub coords: Vec<f32>,
    pub domain: Vec<f32>,
    pub extend: (bool, bool),
    pub background: Option<Vec<f32>>,
    pub bbox: Option<Rect>,
    /// Function-based shadings (`/Matrix`).
    pub matrix: Matrix,
    pub bits_per_coord: u32,
    pub bits_per_component: u32,
    pub bits_per_flag: u32,
    pub vertices_per_row: usize,
    pub decode: Vec<f32>,
    pub mesh_data: Vec<u8>,
}

impl ShadingDefinition {
    pub fn parse(doc: &Document, obj: &Object, cache: &DocumentCache) -> Result<Self, String> {
        let resolved = resolve(doc, obj);
        let dict = get_dict(doc, resolved).ok_or("shading is not a dictionary")?;
        let mesh_data = get_stream_data(doc, resolved).unwrap_or_default();

        let shading_type = dict
            .get(b"ShadingType")
            .map(|o| to_f32(resolve(doc, o)) as u8)
            .map_err(|_| "shading without ShadingType")?;
        if !(1..=7).contains(&shading_type) {
            return Err(format!("invalid ShadingType {shading_type}"));
        }

        let color_space = dict
            .get(b"ColorSpace")
            .map_err(|_| "shading without ColorSpace")
            .and_then(|o| {
                ColorSpaceConv::parse(doc, o, cache).map_err(|_| "bad shading color space")
            })?;

        let mut functions = Vec::new();
        if let Ok(f) = dict.get(b"Function") {
            match resolve(doc, f) {
                Object::Array(arr) => {
                    for child in arr.clone() {
                        functions.push(Arc::new(PdfFunction::parse(doc, &child)?));
                    }
                }
                other => functions.push(Arc::new(PdfFunction::parse(doc, other)?)),
            }
        }

        let coords = get_f32_array(doc, dict.get(b"Coords").ok()).unwrap_or_default();
        let domain = get_f32_array(doc, dict.get(b"Domain").ok())
            .unwrap_or_else(|| vec![0.0, 1.0]);
        let extend = dict
            .get(b"Extend")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                let b = |i: usize| matches!(arr.get(i), Some(Object::Boolean(true)));
                (b(0), b(1))
            })
            .unwrap_or((false, false));
        let background = get_f32_array(doc, dict.get(b"Background").ok());
        let bbox = get_f32_array(doc, dict.get(b"BBox").ok())
            .filter(|v| v.len() == 4)
            .map(|v| Rect::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3])));
        let matrix = get_f32_array(doc, dict.get(b"Matrix").ok())
            .filter(|v| v.len() == 6)
            .map(|v| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
            .unwrap_or_default();

        let int_of = |key: &[u8], default: u32| {
            dict.get(key)
                .ok()
                .map(|o| to_f32(resolve(doc, o)) as u32)
                .unwrap_or(default)
        };

        Ok(ShadingDefinition {
            shading_type,
            color_space: Arc::new(color_space),
            functions,
            coords,
            domain,
            extend,
            background,
            bbox,
            matrix,
            bits_per_coord: int_of(b"BitsPerCoordinate", 16),
            bits_per_component: int_of(b"BitsPerComponent", 8),
            bits_per_flag: int_of(b"BitsPerFlag", 8),
            vertices_per_row: int_of(b"VerticesPerRow", 2) as usize,
            decode: get_f32_array(doc, dict.get(b"Decode").ok()).unwrap_or_default(),
            mesh_data,
        })
    }

    /// Color for one parametric value `t` in the shading domain.
    fn color_at(&self, t: f32, intent: RenderingIntent) -> Rgba {
        let comps = self.eval_functions(&[t]);
        self.color_space.to_srgb(&comps, intent)
    }

    fn eval_functions(&self, inputs: &[f32]) -> Vec<f32> {
        match self.functions.len() {
            0 => inputs.to_vec(),
            1 => self.functions[0].eval(inputs),
            _ => self
                .functions
                .iter()
                .map(|f| f.eval(inputs).first().copied().unwrap_or(0.0))
                .collect(),
        }
    }

    fn sample_stops(&self, intent: RenderingIntent, reversed: bool) -> Vec<GradientStop> {
        let t0 = self.domain.first().copied().unwrap_or(0.0);
        let t1 = self.domain.get(1).copied().unwrap_or(1.0);
        let mut stops = Vec::with_capacity(GRADIENT_STOPS + 2);
        for i in 0..GRADIENT_STOPS {
            let offset = i as f32 / (GRADIENT_STOPS - 1) as f32;
            let t = t0 + (t1 - t0) * offset;
            let color = self.color_at(t, intent);
            stops.push(GradientStop { offset, color });
        }
        if reversed {
            stops.reverse();
            for (i, stop) in stops.iter_mut().enumerate() {
                stop.offset = i as f32 / (GRADIENT_STOPS - 1) as f32;
            }
        }
        stops
    }

    /// Pad-vs-transparent sentinels for the `/Extend` flags.
    fn apply_extend(&self, stops: &mut Vec<GradientStop>, extend: (bool, bool)) {
        if !extend.0 {
            if let Some(first) = stops.first().copied() {
                let mut t = first;
                t.color.a = 0.0;
                stops.insert(0, GradientStop { offset: 0.0, color: t.color });
            }
        }
        if !extend.1 {
            if let Some(last) = stops.last().copied() {
                let mut t = last;
                t.color.a = 0.0;
                stops.push(GradientStop { offset: 1.0, color: t.color });
            }
        }
    }

    /// Paints the shading over `target` (user-space rect covering the clip).
    pub fn draw(
        &self,
        canvas: &mut dyn Canvas,
        target: &Rect,
        base_paint: &Paint,
        intent: RenderingIntent,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        canvas.save();
        if let Some(bbox) = &self.bbox {
            let mut clip = PdfPath::new();
            clip.rect(*bbox);
            canvas.clip_path(&clip, WindingOrder::NonZero);
        }
        if let Some(bg) = &self.background {
            let color = self.color_space.to_srgb(bg, intent);
            let mut paint = base_paint.clone();
            paint.shader = Shader::Solid(color);
            let mut path = PdfPath::new();
            path.rect(*target);
            canvas.draw_path(&path, &paint, WindingOrder::NonZero, None);
        }

        let result = match self.shading_type {
            1 => self.draw_function_grid(canvas, base_paint, intent, cancel),
            2 => self.draw_axial(canvas, target, base_paint, intent),
            3 => self.draw_radial(canvas, target, base_paint, intent),
            4 | 5 => self.draw_gouraud(canvas, base_paint, intent, cancel),
            6 => self.draw_coons(canvas, base_paint, intent, cancel),
            7 => self.draw_tensor(canvas, base_paint, intent, cancel),
            _ => Ok(()),
        };
        canvas.restore();
        result
    }

    /// Type 1: sample the 2-in function over its domain on a coarse grid.
    fn draw_function_grid(
        &self,
        canvas: &mut dyn Canvas,
        base_paint: &Paint,
        intent: RenderingIntent,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        const GRID: usize = 24;
        let d = if self.domain.len() == 4 {
            [self.domain[0], self.domain[1], self.domain[2], self.domain[3]]
        } else {
            [0.0, 1.0, 0.0, 1.0]
        };
        canvas.save();
        canvas.concat(&self.matrix);
        let mut vertices = Vec::with_capacity(GRID * GRID * 6);
        for iy in 0..GRID {
            cancel.check()?;
            for ix in 0..GRID {
                let x0 = d[0] + (d[1] - d[0]) * ix as f32 / GRID as f32;
                let x1 = d[0] + (d[1] - d[0]) * (ix + 1) as f32 / GRID as f32;
                let y0 = d[2] + (d[3] - d[2]) * iy as f32 / GRID as f32;
                let y1 = d[2] + (d[3] - d[2]) * (iy + 1) as f32 / GRID as f32;
                let comps = self.eval_functions(&[(x0 + x1) * 0.5, (y0 + y1) * 0.5]);
                let color = self.color_space.to_srgb(&comps, intent);
                let quad = [
                    Point::new(x0, y0),
                    Point::new(x1, y0),
                    Point::new(x1, y1),
                    Point::new(x0, y1),
                ];
                for idx in [0, 1, 2, 0, 2, 3] {
                    vertices.push(MeshVertex { point: quad[idx], color });
                }
            }
        }
        canvas.draw_vertices(&vertices, base_paint);
        canvas.restore();
        Ok(())
    }

    fn draw_axial(
        &self,
        canvas: &mut dyn Canvas,
        target: &Rect,
        base_paint: &Paint,
        intent: RenderingIntent,
    ) -> Result<(), RenderError> {
        if self.coords.len() < 4 {
            return Ok(());
        }
        let mut stops = self.sample_stops(intent, false);
        self.apply_extend(&mut stops, self.extend);
        let mut paint = base_paint.clone();
        paint.shader = Shader::LinearGradient {
            start: Point::new(self.coords[0], self.coords[1]),
            end: Point::new(self.coords[2], self.coords[3]),
            stops,
            matrix: Matrix::identity(),
        };
        let mut path = PdfPath::new();
        path.rect(*target);
        canvas.draw_path(&path, &paint, WindingOrder::NonZero, None);
        Ok(())
    }

    fn draw_radial(
        &self,
        canvas: &mut dyn Canvas,
        target: &Rect,
        base_paint: &Paint,
        intent: RenderingIntent,
    ) -> Result<(), RenderError> {
        if self.coords.len() < 6 {
            return Ok(());
        }
        let (mut c0, mut r0) = (Point::new(self.coords[0], self.coords[1]), self.coords[2]);
        let (mut c1, mut r1) = (Point::new(self.coords[3], self.coords[4]), self.coords[5]);
        let mut extend = self.extend;
        let reversed = r0 > r1;
        if reversed {
            std::mem::swap(&mut c0, &mut c1);
            std::mem::swap(&mut r0, &mut r1);
            extend = (extend.1, extend.0);
        }
        let mut stops = self.sample_stops(intent, reversed);
        self.apply_extend(&mut stops, extend);
        let mut paint = base_paint.clone();
        paint.shader = Shader::RadialGradient {
            start_center: c0,
            start_radius: r0.max(0.0),
            end_center: c1,
            end_radius: r1.max(0.0),
            stops,
            matrix: Matrix::identity(),
        };
        let mut path = PdfPath::new();
        path.rect(*target);
        canvas.draw_path(&path, &paint, WindingOrder::NonZero, None);
        Ok(())
    }

    fn mesh_reader(&self) -> MeshReader<'_> {
        MeshReader {
            reader: BitReader::new(&self.mesh_data),
            bits_per_coord: self.bits_per_coord,
            bits_per_component: self.bits_per_component,
            bits_per_flag: self.bits_per_flag,
            decode: &self.decode,
            n_color: if self.functions.is_empty() {
                self.color_space.components()
            } else {
                1
            },
        }
    }

    fn vertex_color(&self, comps: &[f32], intent: RenderingIntent) -> Rgba {
        if self.functions.is_empty() {
            self.color_space.to_srgb(comps, intent)
        } else {
            self.color_at(comps.first().copied().unwrap_or(0.0), intent)
        }
    }

    /// Types 4 and 5: free-form and lattice-form Gouraud triangle meshes.
    fn draw_gouraud(
        &self,
        canvas: &mut dyn Canvas,
        base_paint: &Paint,
        intent: RenderingIntent,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        let mut reader = self.mesh_reader();
        let mut triangles: Vec<MeshVertex> = Vec::new();

        if self.shading_type == 4 {
            let mut prev: Vec<MeshVertex> = Vec::new();
            while !reader.at_end() {
                cancel.check()?;
                let Some((flag, vertex)) = reader.read_vertex(self, intent, true) else {
                    break;
                };
                match flag {
                    0 => {
                        let Some((_, b)) = reader.read_vertex(self, intent, true) else { break };
                        let Some((_, c)) = reader.read_vertex(self, intent, true) else { break };
                        prev = vec![vertex, b, c];
                        triangles.extend_from_slice(&prev);
                    }
                    1 | 2 if prev.len() == 3 => {
                        // reuse an edge of the previous triangle
                        let (a, b) = if flag == 1 {
                            (prev[1], prev[2])
                        } else {
                            (prev[0], prev[2])
                        };
                        prev = vec![a, b, vertex];
                        triangles.extend_from_slice(&prev);
                    }
                    _ => break,
                }
            }
        } else {
            // lattice: triangulate consecutive rows
            let per_row = self.vertices_per_row.max(2);
            let mut rows: Vec<Vec<MeshVertex>> = Vec::new();
            'rows: loop {
                cancel.check()?;
                let mut row = Vec::with_capacity(per_row);
                for _ in 0..per_row {
                    match reader.read_vertex(self, intent, false) {
                        Some((_, v)) => row.push(v),
                        None => break 'rows,
                    }
                }
                rows.push(row);
            }
            for pair in rows.windows(2) {
                for x in 0..per_row - 1 {
                    let (r0, r1) = (&pair[0], &pair[1]);
                    triangles.extend_from_slice(&[
                        r0[x], r0[x + 1], r1[x], r0[x + 1], r1[x + 1], r1[x],
                    ]);
                }
            }
        }

        if !triangles.is_empty() {
            canvas.draw_vertices(&triangles, base_paint);
        }
        Ok(())
    }

    /// Type 6: Coons patches via the backend patch primitive.
    fn draw_coons(
        &self,
        canvas: &mut dyn Canvas,
        base_paint: &Paint,
        intent: RenderingIntent,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        let mut reader = self.mesh_reader();
        let mut prev: Option<([Point; 12], [Rgba; 4])> = None;
        while !reader.at_end() {
            cancel.check()?;
            let Some(patch) = reader.read_patch(self, intent, &prev) else { break };
            canvas.draw_patch(&patch.0, &patch.1, base_paint);
            prev = Some(patch);
        }
        Ok(())
    }

    /// Type 7: tensor-product patches, tessellated into one vertex buffer.
    fn draw_tensor(
        &self,
        canvas: &mut dyn Canvas,
        base_paint: &Paint,
        intent: RenderingIntent,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        let mut reader = self.mesh_reader();
        let mut patches: Vec<([Point; 16], [Rgba; 4])> = Vec::new();
        let mut prev_boundary: Option<([Point; 12], [Rgba; 4])> = None;
        while !reader.at_end() {
            cancel.check()?;
            let Some(patch) = reader.read_tensor_patch(self, intent, &prev_boundary) else {
                break;
            };
            let mut boundary = [Point::default(); 12];
            boundary.copy_from_slice(&patch.0[0..12]);
            prev_boundary = Some((boundary, patch.1));
            patches.push(patch);
        }

        // tessellation density shrinks as the patch count grows
        let n = patches.len();
        if n == 0 {
            return Ok(());
        }
        let t = if n >= 500 {
            1
        } else {
            ((24.0 * (1.0 - n as f32 / 500.0)).round() as usize).max(1)
        };

        let mut vertices = Vec::with_capacity(n * t * t * 6);
        for (points, colors) in &patches {
            cancel.check()?;
            tessellate_tensor(points, colors, t, &mut vertices);
        }
        canvas.draw_vertices(&vertices, base_paint);
        Ok(())
    }
}

/// Bit-packed mesh stream reader shared by types 4..7.
struct MeshReader<'a> {
    reader: BitReader<'a>,
    bits_per_coord: u32,
    bits_per_component: u32,
    bits_per_flag: u32,
    decode: &'a [f32],
    n_color: usize,
}

impl<'a> MeshReader<'a> {
    fn at_end(&self) -> bool {
        self.reader.at_end()
    }

    fn decode_value(&self, raw: u32, bits: u32, pair: usize) -> f32 {
        let lo = self.decode.get(2 * pair).copied().unwrap_or(0.0);
        let hi = self.decode.get(2 * pair + 1).copied().unwrap_or(1.0);
        let max = if bits >= 32 { u32::MAX as f32 } else { ((1u64 << bits) - 1) as f32 };
        lo + raw as f32 * (hi - lo) / max
    }

    fn read_flag(&mut self) -> Option<u32> {
        self.reader.read(self.bits_per_flag)
    }

    fn read_point(&mut self) -> Option<Point> {
        let x = self.reader.read(self.bits_per_coord)?;
        let y = self.reader.read(self.bits_per_coord)?;
        Some(Point::new(
            self.decode_value(x, self.bits_per_coord, 0),
            self.decode_value(y, self.bits_per_coord, 1),
        ))
    }

    fn read_color(&mut self, shading: &ShadingDefinition, intent: RenderingIntent) -> Option<Rgba> {
        let mut comps = Vec::with_capacity(self.n_color);
        for i in 0..self.n_color {
            let raw = self.reader.read(self.bits_per_component)?;
            comps.push(self.decode_value(raw, self.bits_per_component, 2 + i));
        }
        Some(shading.vertex_color(&comps, intent))
    }

    fn read_vertex(
        &mut self,
        shading: &ShadingDefinition,
        intent: RenderingIntent,
        with_flag: bool,
    ) -> Option<(u32, MeshVertex)> {
        let flag = if with_flag { self.read_flag()? } else { 0 };
        let point = self.read_point()?;
        let color = self.read_color(shading, intent)?;
        Some((flag, MeshVertex { point, color }))
    }

    /// Coons patch: 12 boundary points; flags 1..3 reuse the shared edge of
    /// the previous patch (4 points, 2 colors).
    fn read_patch(
        &mut self,
        shading: &ShadingDefinition,
        intent: RenderingIntent,
        prev: &Option<([Point; 12], [Rgba; 4])>,
    ) -> Option<([Point; 12], [Rgba; 4])> {
        let flag = self.read_flag()?;
        let mut points = [Point::default(); 12];
        let mut colors = [Rgba::BLACK; 4];

        let reused = self.reuse_edge(flag, prev, &mut points, &mut colors)?;
        let new_points = if reused { 8 } else { 12 };
        let new_colors = if reused { 2 } else { 4 };
        for p in points.iter_mut().skip(12 - new_points) {
            *p = self.read_point()?;
        }
        for c in colors.iter_mut().skip(4 - new_colors) {
            *c = self.read_color(shading, intent)?;
        }
        Some((points, colors))
    }

    fn read_tensor_patch(
        &mut self,
        shading: &ShadingDefinition,
        intent: RenderingIntent,
        prev: &Option<([Point; 12], [Rgba; 4])>,
    ) -> Option<([Point; 16], [Rgba; 4])> {
        let flag = self.read_flag()?;
        let mut boundary = [Point::default(); 12];
        let mut colors = [Rgba::BLACK; 4];
        let reused = self.reuse_edge(flag, prev, &mut boundary, &mut colors)?;
        let new_points = if reused { 8 } else { 12 };
        let new_colors = if reused { 2 } else { 4 };
        for p in boundary.iter_mut().skip(12 - new_points) {
            *p = self.read_point()?;
        }
        let mut internal = [Point::default(); 4];
        for p in internal.iter_mut() {
            *p = self.read_point()?;
        }
        for c in colors.iter_mut().skip(4 - new_colors) {
            *c = self.read_color(shading, intent)?;
        }
        let mut points = [Point::default(); 16];
        points[0..12].copy_from_slice(&boundary);
        points[12..16].copy_from_slice(&internal);
        Some((points, colors))
    }

    /// Fills the first 4 points / 2 colors from the previous patch's edge.
    /// Returns `Some(true)` when an edge was reused.
    fn reuse_edge(
        &mut self,
        flag: u32,
        prev: &Option<([Point; 12], [Rgba; 4])>,
        points: &mut [Point; 12],
        colors: &mut [Rgba; 4],
    ) -> Option<bool> {
        if flag == 0 {
            return Some(false);
        }
        let (pp, pc) = prev.as_ref()?;
        let (edge, ca, cb) = match flag {
            1 => ([pp[3], pp[4], pp[5], pp[6]], pc[1], pc[2]),
            2 => ([pp[6], pp[7], pp[8], pp[9]], pc[2], pc[3]),
            3 => ([pp[9], pp[10], pp[11], pp[0]], pc[3], pc[0]),
            _ => return None,
        };
        points[0..4].copy_from_slice(&edge);
        colors[0] = ca;
        colors[1] = cb;
        Some(true)
    }
}

/// PDF spiral order of the 16 tensor control points to `(row, col)` grid
/// positions.
const TENSOR_SPIRAL: [(usize, usize); 16] = [
    (0, 0), (0, 1), (0, 2), (0, 3), (1, 3), (2, 3), (3, 3), (3, 2), (3, 1), (3, 0), (2, 0),
    (1, 0), (1, 1), (1, 2), (2, 1), (2, 2),
];

fn bernstein3(i: usize, t: f32) -> f32 {
    let u = 1.0 - t;
    match i {
        0 => u * u * u,
        1 => 3.0 * t * u * u,
        2 => 3.0 * t * t * u,
        _ => t * t * t,
    }
}

fn tensor_point(grid: &[[Point; 4]; 4], s: f32, t: f32) -> Point {
    let mut x = 0.0;
    let mut y = 0.0;
    for (i, row) in grid.iter().enumerate() {
        let bs = bernstein3(i, s);
        for (j, p) in row.iter().enumerate() {
            let w = bs * bernstein3(j, t);
            x += w * p.x;
            y += w * p.y;
        }
    }
    Point::new(x, y)
}

fn bilerp_color(c: &[Rgba; 4], s: f32, t: f32) -> Rgba {
    let mix = |a: f32, b: f32, w: f32| a + (b - a) * w;
    // corners: c0 at (0,0), c1 at (0,1), c2 at (1,1), c3 at (1,0)
    let top = |f: fn(&Rgba) -> f32| mix(f(&c[0]), f(&c[1]), t);
    let bot = |f: fn(&Rgba) -> f32| mix(f(&c[3]), f(&c[2]), t);
    Rgba {
        r: mix(top(|c| c.r), bot(|c| c.r), s),
        g: mix(top(|c| c.g), bot(|c| c.g), s),
        b: mix(top(|c| c.b), bot(|c| c.b), s),
        a: mix(top(|c| c.a), bot(|c| c.a), s),
    }
}

/// Uniform `t×t` tessellation of one tensor patch into triangles.
fn tessellate_tensor(
    points: &[Point; 16],
    colors: &[Rgba; 4],
    t: usize,
    out: &mut Vec<MeshVertex>,
) {
    let mut grid = [[Point::default(); 4]; 4];
    for (spiral, (r, c)) in TENSOR_SPIRAL.iter().enumerate() {
        grid[*r][*c] = points[spiral];
    }
    let steps = t.max(1);
    for i in 0..steps {
        for j in 0..steps {
            let s0 = i as f32 / steps as f32;
            let s1 = (i + 1) as f32 / steps as f32;
            let t0 = j as f32 / steps as f32;
            let t1 = (j + 1) as f32 / steps as f32;
            let quad = [
                (s0, t0),
                (s1, t0),
                (s1, t1),
                (s0, t1),
            ];
            let verts: Vec<MeshVertex> = quad
                .iter()
                .map(|(s, tt)| MeshVertex {
                    point: tensor_point(&grid, *s, *tt),
                    color: bilerp_color(colors, *s, *tt),
                })
                .collect();
            for idx in [0, 1, 2, 0, 2, 3] {
                out.push(verts[idx]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasOp, RecordingCanvas};
    use pretty_assertions::assert_eq;

    fn axial_red_blue() -> ShadingDefinition {
        use crate::function::{ExponentialFunction, PdfFunction};
        ShadingDefinition {
            shading_type: 2,
            color_space: Arc::new(ColorSpaceConv::DeviceRgb),
            functions: vec![Arc::new(PdfFunction::Exponential(ExponentialFunction {
                domain: vec![0.0, 1.0],
                c0: vec![1.0, 0.0, 0.0],
                c1: vec![0.0, 0.0, 1.0],
                n: 1.0,
            }))],
            coords: vec![0.0, 0.0, 100.0, 0.0],
            domain: vec![0.0, 1.0],
            extend: (false, false),
            background: None,
            bbox: None,
            matrix: Matrix::identity(),
            bits_per_coord: 16,
            bits_per_component: 8,
            bits_per_flag: 8,
            vertices_per_row: 2,
            decode: vec![],
            mesh_data: vec![],
        }
    }

    #[test]
    fn axial_midpoint_color() {
        let sh = axial_red_blue();
        let mid = sh.color_at(0.5, RenderingIntent::default());
        assert!((mid.r - 0.5).abs() < 1e-5);
        assert_eq!(mid.g, 0.0);
        assert!((mid.b - 0.5).abs() < 1e-5);
    }

    #[test]
    fn axial_draw_builds_linear_gradient() {
        let sh = axial_red_blue();
        let mut canvas = RecordingCanvas::new(Rect::from_wh(200.0, 200.0));
        sh.draw(
            &mut canvas,
            &Rect::from_wh(200.0, 200.0),
            &Paint::default(),
            RenderingIntent::default(),
            &CancelToken::new(),
        )
        .unwrap();
        let gradient = canvas.ops.iter().find_map(|op| match op {
            CanvasOp::DrawPath { paint, .. } => match &paint.shader {
                Shader::LinearGradient { start, end, stops, .. } => {
                    Some((*start, *end, stops.clone()))
                }
                _ => None,
            },
            _ => None,
        });
        let (start, end, stops) = gradient.expect("a linear gradient draw");
        assert_eq!((start.x, start.y), (0.0, 0.0));
        assert_eq!((end.x, end.y), (100.0, 0.0));
        // no extension: transparent sentinels on both sides
        assert_eq!(stops.first().unwrap().color.a, 0.0);
        assert_eq!(stops.last().unwrap().color.a, 0.0);
        // endpoints keep the function colors
        assert!((stops[1].color.r - 1.0).abs() < 1e-5);
        assert!((stops[stops.len() - 2].color.b - 1.0).abs() < 1e-5);
    }

    #[test]
    fn radial_swaps_when_r0_larger() {
        let mut sh = axial_red_blue();
        sh.shading_type = 3;
        sh.coords = vec![0.0, 0.0, 50.0, 10.0, 10.0, 5.0];
        let mut canvas = RecordingCanvas::new(Rect::from_wh(100.0, 100.0));
        sh.draw(
            &mut canvas,
            &Rect::from_wh(100.0, 100.0),
            &Paint::default(),
            RenderingIntent::default(),
            &CancelToken::new(),
        )
        .unwrap();
        let radial = canvas.ops.iter().find_map(|op| match op {
            CanvasOp::DrawPath { paint, .. } => match &paint.shader {
                Shader::RadialGradient { start_radius, end_radius, stops, .. } => {
                    Some((*start_radius, *end_radius, stops.clone()))
                }
                _ => None,
            },
            _ => None,
        });
        let (r0, r1, stops) = radial.expect("a radial gradient draw");
        assert!(r0 <= r1);
        // colors were reversed together with the endpoints
        assert!((stops[1].color.b - 1.0).abs() < 1e-5);
    }

    #[test]
    fn gouraud_free_form_decodes_triangles() {
        // one triangle, 8-bit flags/coords/components, decode to unit square
        let mut sh = axial_red_blue();
        sh.shading_type = 4;
        sh.functions = vec![];
        sh.bits_per_coord = 8;
        sh.bits_per_component = 8;
        sh.bits_per_flag = 8;
        sh.decode = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        // flag, x, y, r, g, b per vertex
        sh.mesh_data = vec![
            0, 0, 0, 255, 0, 0,
            0, 255, 0, 0, 255, 0,
            0, 0, 255, 0, 0, 255,
        ];
        let mut canvas = RecordingCanvas::new(Rect::from_wh(1.0, 1.0));
        sh.draw(
            &mut canvas,
            &Rect::from_wh(1.0, 1.0),
            &Paint::default(),
            RenderingIntent::default(),
            &CancelToken::new(),
        )
        .unwrap();
        let verts = canvas.ops.iter().find_map(|op| match op {
            CanvasOp::DrawVertices { vertices, .. } => Some(vertices.clone()),
            _ => None,
        });
        let verts = verts.expect("one mesh draw");
        assert_eq!(verts.len(), 3);
        assert_eq!(verts[0].color.r, 1.0);
        assert!((verts[1].point.x - 1.0).abs() < 1e-4);
        assert_eq!(verts[2].color.b, 1.0);
    }

    #[test]
    fn tensor_tessellation_covers_corners() {
        // flat unit-square patch expressed as a degenerate tensor grid
        let mut points = [Point::default(); 16];
        for (spiral, (r, c)) in TENSOR_SPIRAL.iter().enumerate() {
            points[spiral] = Point::new(*c as f32 / 3.0, *r as f32 / 3.0);
        }
        let colors = [Rgba::rgb(1.0, 0.0, 0.0), Rgba::rgb(0.0, 1.0, 0.0),
            Rgba::rgb(0.0, 0.0, 1.0), Rgba::WHITE];
        let mut out = Vec::new();
        tessellate_tensor(&points, &colors, 2, &mut out);
        assert_eq!(out.len(), 2 * 2 * 6);
        // first vertex is the (0,0) corner with color c0
        assert_eq!(out[0].point, Point::new(0.0, 0.0));
        assert_eq!(out[0].color, Rgba::rgb(1.0, 0.0, 0.0));
    }
}
