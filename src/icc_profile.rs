//! ICC profile subset: header, tone reproduction curves, matrix/TRC sets and
//! A2B LUT pipelines (legacy `mft1`/`mft2` and multi-process `mAB`).
//!
//! Only the parts a renderer needs survive the parse; everything is read-only
//! afterwards and shared per document. Output of [`IccProfile::to_pcs`] is
//! the profile connection space (XYZ or Lab, D50-referenced); the color module
//! owns the way to sRGB.

use crate::graphics::RenderingIntent;

/// Tone reproduction curve.
#[derive(Debug, Clone, PartialEq)]
pub enum Trc {
    Identity,
    Gamma(f32),
    Sampled(Vec<f32>),
    /// ICC `para` curve: function type 0..=4 plus parameters.
    Parametric { kind: u8, params: Vec<f32> },
}

impl Trc {
    /// Evaluates the curve. Inputs are nominal `[0, 1]`; outputs are *not*
    /// clamped here, callers clamp where the pipeline requires it.
    pub fn eval(&self, x: f32) -> f32 {
        match self {
            Trc::Identity => x,
            Trc::Gamma(g) => x.max(0.0).powf(*g),
            Trc::Sampled(samples) => {
                let n = samples.len();
                if n == 0 {
                    return x;
                }
                let p = x * (n - 1) as f32;
                let i = p.floor();
                if i < 0.0 {
                    return samples[0];
                }
                let i = i as usize;
                if i >= n - 1 {
                    return samples[n - 1];
                }
                let frac = p - i as f32;
                samples[i] + (samples[i + 1] - samples[i]) * frac
            }
            Trc::Parametric { kind, params } => eval_parametric(*kind, params, x),
        }
    }
}

fn eval_parametric(kind: u8, p: &[f32], x: f32) -> f32 {
    let get = |i: usize| p.get(i).copied().unwrap_or(0.0);
    match kind {
        0 => x.max(0.0).powf(get(0)),
        1 => {
            let (g, a, b) = (get(0), get(1), get(2));
            let t = if a.abs() < 1e-9 { 0.0 } else { -b / a };
            if x < t {
                0.0
            } else {
                (a * x + b).max(0.0).powf(g)
            }
        }
        2 => {
            let (g, a, b, c) = (get(0), get(1), get(2), get(3));
            let t = if a.abs() < 1e-9 { 0.0 } else { -b / a };
            if x < t {
                c
            } else {
                (a * x + b).max(0.0).powf(g) + c
            }
        }
        3 => {
            let (g, a, b, c, d) = (get(0), get(1), get(2), get(3), get(4));
            if x < d {
                c * x
            } else {
                (a * x + b).max(0.0).powf(g)
            }
        }
        4 => {
            let (g, a, b, c, d, e, f) = (get(0), get(1), get(2), get(3), get(4), get(5), get(6));
            if x < d {
                c * x + f
            } else {
                (a * x + b).max(0.0).powf(g) + e
            }
        }
        _ => x,
    }
}

/// Multi-dimensional color lookup table. The innermost axis is the last
/// input component; that matches the flattening order of the ICC parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Clut {
    pub grid_points: Vec<u32>,
    pub out_channels: usize,
    pub samples: Vec<f32>,
}

impl Clut {
    /// Multi-linear interpolation over the `2^N` hypercube corners.
    pub fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let n = self.grid_points.len();
        let mut idx0 = vec![0i64; n];
        let mut frac = vec![0.0f32; n];
        for d in 0..n {
            let g = self.grid_points[d].max(1);
            let p = (inputs.get(d).copied().unwrap_or(0.0) * (g - 1) as f32)
                .clamp(0.0, (g - 1) as f32);
            idx0[d] = p.floor() as i64;
            frac[d] = p - p.floor();
        }

        // innermost dimension has stride out_channels
        let mut strides = vec![0usize; n];
        let mut acc = self.out_channels;
        for d in (0..n).rev() {
            strides[d] = acc;
            acc *= self.grid_points[d] as usize;
        }

        let mut out = vec![0.0f32; self.out_channels];
        for corner in 0..(1usize << n) {
            let mut weight = 1.0f32;
            let mut offset = 0usize;
            let mut in_range = true;
            for d in 0..n {
                let bit = (corner >> d) & 1;
                let idx = idx0[d] + bit as i64;
                if idx < 0 || idx >= self.grid_points[d] as i64 {
                    in_range = false;
                    break;
                }
                weight *= if bit == 1 { frac[d] } else { 1.0 - frac[d] };
                offset += idx as usize * strides[d];
            }
            if !in_range || weight == 0.0 {
                continue;
            }
            for c in 0..self.out_channels {
                out[c] += weight * self.samples.get(offset + c).copied().unwrap_or(0.0);
            }
        }
        out
    }
}

/// One stage of an A2B pipeline, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStage {
    Curves(Vec<Trc>),
    /// 3×3 matrix (row major) plus offset vector.
    Matrix([f32; 9], [f32; 3]),
    Clut(Clut),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LutPipeline {
    pub stages: Vec<PipelineStage>,
    pub in_channels: usize,
    pub out_channels: usize,
}

impl LutPipeline {
    pub fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let mut values: Vec<f32> = inputs.to_vec();
        for stage in &self.stages {
            match stage {
                PipelineStage::Curves(curves) => {
                    for (i, v) in values.iter_mut().enumerate() {
                        if let Some(trc) = curves.get(i) {
                            *v = trc.eval(v.clamp(0.0, 1.0));
                        }
                    }
                }
                PipelineStage::Matrix(m, off) => {
                    if values.len() >= 3 {
                        let (x, y, z) = (values[0], values[1], values[2]);
                        values[0] = m[0] * x + m[1] * y + m[2] * z + off[0];
                        values[1] = m[3] * x + m[4] * y + m[5] * z + off[1];
                        values[2] = m[6] * x + m[7] * y + m[8] * z + off[2];
                    }
                }
                PipelineStage::Clut(clut) => {
                    values = clut.eval(&values);
                }
            }
        }
        values
    }
}

/// The profile connection space of a pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pcs {
    Xyz,
    Lab,
}

/// Device color space declared by the profile header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IccColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Lab,
    Other(u32),
}

impl IccColorSpace {
    pub fn channels(&self) -> usize {
        match self {
            IccColorSpace::Gray => 1,
            IccColorSpace::Rgb | IccColorSpace::Lab => 3,
            IccColorSpace::Cmyk => 4,
            IccColorSpace::Other(_) => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IccHeader {
    pub data_space: IccColorSpace,
    pub pcs: Pcs,
    pub intent_hint: u32,
    pub illuminant: [f32; 3],
}

/// Matrix/TRC model: per-channel curves plus the rXYZ/gXYZ/bXYZ columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixTrc {
    /// Column-major colorant matrix: result XYZ = M · linearized RGB.
    pub matrix: [f32; 9],
    pub r: Trc,
    pub g: Trc,
    pub b: Trc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IccProfile {
    pub header: IccHeader,
    pub matrix_trc: Option<MatrixTrc>,
    /// kTRC of monochrome profiles.
    pub gray_trc: Option<Trc>,
    pub chad: Option<[f32; 9]>,
    pub white_point: Option<[f32; 3]>,
    pub black_point: Option<[f32; 3]>,
    /// A2B0 / A2B1 / A2B2.
    pub a2b: [Option<LutPipeline>; 3],
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_s15f16(data: &[u8], at: usize) -> Option<f32> {
    Some(read_u32(data, at)? as i32 as f32 / 65536.0)
}

impl IccProfile {
    pub fn parse(data: &[u8]) -> Result<IccProfile, String> {
        if data.len() < 132 {
            return Err("ICC data shorter than header".to_string());
        }
        let data_space = match read_u32(data, 16).unwrap_or(0) {
            0x47524159 => IccColorSpace::Gray, // 'GRAY'
            0x52474220 => IccColorSpace::Rgb,  // 'RGB '
            0x434D594B => IccColorSpace::Cmyk, // 'CMYK'
            0x4C616220 => IccColorSpace::Lab,  // 'Lab '
            other => IccColorSpace::Other(other),
        };
        let pcs = match read_u32(data, 20).unwrap_or(0) {
            0x4C616220 => Pcs::Lab,
            _ => Pcs::Xyz,
        };
        let intent_hint = read_u32(data, 64).unwrap_or(0);
        let illuminant = [
            read_s15f16(data, 68).unwrap_or(0.9642),
            read_s15f16(data, 72).unwrap_or(1.0),
            read_s15f16(data, 76).unwrap_or(0.8249),
        ];

        let tag_count = read_u32(data, 128).ok_or("truncated tag table")? as usize;
        if tag_count > 1024 {
            return Err("implausible tag count".to_string());
        }

        let mut profile = IccProfile {
            header: IccHeader { data_space, pcs, intent_hint, illuminant },
            matrix_trc: None,
            gray_trc: None,
            chad: None,
            white_point: None,
            black_point: None,
            a2b: [None, None, None],
        };

        let mut r_xyz = None;
        let mut g_xyz = None;
        let mut b_xyz = None;
        let mut r_trc = None;
        let mut g_trc = None;
        let mut b_trc = None;

        for i in 0..tag_count {
            let entry = 132 + i * 12;
            let sig = match read_u32(data, entry) {
                Some(s) => s,
                None => break,
            };
            let offset = read_u32(data, entry + 4).unwrap_or(0) as usize;
            let size = read_u32(data, entry + 8).unwrap_or(0) as usize;
            if offset + size > data.len() {
                continue;
            }
            let tag = &data[offset..offset + size];
            match sig {
                0x7258595A => r_xyz = parse_xyz_tag(tag),        // rXYZ
                0x6758595A => g_xyz = parse_xyz_tag(tag),        // gXYZ
                0x6258595A => b_xyz = parse_xyz_tag(tag),        // bXYZ
                0x77747074 => profile.white_point = parse_xyz_tag(tag), // wtpt
                0x626B7074 => profile.black_point = parse_xyz_tag(tag), // bkpt
                0x72545243 => r_trc = parse_curve_tag(tag),      // rTRC
                0x67545243 => g_trc = parse_curve_tag(tag),      // gTRC
                0x62545243 => b_trc = parse_curve_tag(tag),      // bTRC
                0x6B545243 => profile.gray_trc = parse_curve_tag(tag), // kTRC
                0x63686164 => profile.chad = parse_sf32_tag(tag), // chad
                0x41324230 => profile.a2b[0] = parse_lut_tag(tag, data_space.channels()), // A2B0
                0x41324231 => profile.a2b[1] = parse_lut_tag(tag, data_space.channels()), // A2B1
                0x41324232 => profile.a2b[2] = parse_lut_tag(tag, data_space.channels()), // A2B2
                _ => {}
            }
        }

        if let (Some(r), Some(g), Some(b)) = (r_xyz, g_xyz, b_xyz) {
            profile.matrix_trc = Some(MatrixTrc {
                matrix: [r[0], g[0], b[0], r[1], g[1], b[1], r[2], g[2], b[2]],
                r: r_trc.clone().unwrap_or(Trc::Identity),
                g: g_trc.clone().unwrap_or(Trc::Identity),
                b: b_trc.clone().unwrap_or(Trc::Identity),
            });
        }

        if profile.matrix_trc.is_none() && profile.gray_trc.is_none()
            && profile.a2b.iter().all(|p| p.is_none())
        {
            return Err("profile carries no usable transform".to_string());
        }
        Ok(profile)
    }

    pub fn channels(&self) -> usize {
        self.header.data_space.channels()
    }

    /// Picks an A2B pipeline with the ordered per-intent fallback.
    pub fn a2b_for_intent(&self, intent: RenderingIntent) -> Option<&LutPipeline> {
        let order: [usize; 3] = match intent {
            RenderingIntent::Perceptual => [0, 1, 2],
            RenderingIntent::RelativeColorimetric => [1, 0, 2],
            RenderingIntent::Saturation => [2, 0, 1],
            RenderingIntent::AbsoluteColorimetric => [1, 0, 2],
        };
        order.iter().find_map(|i| self.a2b[*i].as_ref())
    }

    /// Transforms device components to the PCS. Returns the PCS triple and
    /// which connection space it is in.
    pub fn to_pcs(&self, comps: &[f32], intent: RenderingIntent) -> Option<([f32; 3], Pcs)> {
        if let Some(pipeline) = self.a2b_for_intent(intent) {
            let out = pipeline.eval(comps);
            if out.len() < 3 {
                return None;
            }
            let triple = match self.header.pcs {
                // PCSXYZ pipelines encode XYZ with 1.0 + 32767/32768 headroom
                Pcs::Xyz => [out[0] * 1.99997, out[1] * 1.99997, out[2] * 1.99997],
                Pcs::Lab => [out[0] * 100.0, out[1] * 255.0 - 128.0, out[2] * 255.0 - 128.0],
            };
            return Some((triple, self.header.pcs));
        }
        if let Some(mt) = &self.matrix_trc {
            let r = mt.r.eval(comps.first().copied().unwrap_or(0.0).clamp(0.0, 1.0));
            let g = mt.g.eval(comps.get(1).copied().unwrap_or(0.0).clamp(0.0, 1.0));
            let b = mt.b.eval(comps.get(2).copied().unwrap_or(0.0).clamp(0.0, 1.0));
            let m = &mt.matrix;
            return Some((
                [
                    m[0] * r + m[1] * g + m[2] * b,
                    m[3] * r + m[4] * g + m[5] * b,
                    m[6] * r + m[7] * g + m[8] * b,
                ],
                Pcs::Xyz,
            ));
        }
        if let Some(trc) = &self.gray_trc {
            let y = trc.eval(comps.first().copied().unwrap_or(0.0).clamp(0.0, 1.0));
            let wp = self.white_point.unwrap_or([0.9642, 1.0, 0.8249]);
            return Some(([wp[0] * y, wp[1] * y, wp[2] * y], Pcs::Xyz));
        }
        None
    }

    /// A black point suitable for compensation, when the profile has one.
    pub fn usable_black_point(&self) -> Option<[f32; 3]> {
        let bp = self.black_point?;
        if bp[1] > 0.0 && bp[1] < 0.5 {
            Some(bp)
        } else {
            None
        }
    }
}

fn parse_xyz_tag(tag: &[u8]) -> Option<[f32; 3]> {
    if read_u32(tag, 0)? != 0x58595A20 {
        return None; // 'XYZ '
    }
    Some([
        read_s15f16(tag, 8)?,
        read_s15f16(tag, 12)?,
        read_s15f16(tag, 16)?,
    ])
}

fn parse_sf32_tag(tag: &[u8]) -> Option<[f32; 9]> {
    if read_u32(tag, 0)? != 0x73663332 {
        return None; // 'sf32'
    }
    let mut m = [0.0f32; 9];
    for (i, v) in m.iter_mut().enumerate() {
        *v = read_s15f16(tag, 8 + i * 4)?;
    }
    Some(m)
}

fn parse_curve_tag(tag: &[u8]) -> Option<Trc> {
    match read_u32(tag, 0)? {
        0x63757276 => {
            // 'curv'
            let count = read_u32(tag, 8)? as usize;
            match count {
                0 => Some(Trc::Identity),
                1 => Some(Trc::Gamma(read_u16(tag, 12)? as f32 / 256.0)),
                _ => {
                    let mut samples = Vec::with_capacity(count);
                    for i in 0..count {
                        samples.push(read_u16(tag, 12 + i * 2)? as f32 / 65535.0);
                    }
                    Some(Trc::Sampled(samples))
                }
            }
        }
        0x70617261 => {
            // 'para'
            let kind = read_u16(tag, 8)? as u8;
            let n_params = match kind {
                0 => 1,
                1 => 3,
                2 => 4,
                3 => 5,
                4 => 7,
                _ => return None,
            };
            let mut params = Vec::with_capacity(n_params);
            for i in 0..n_params {
                params.push(read_s15f16(tag, 12 + i * 4)?);
            }
            Some(Trc::Parametric { kind, params })
        }
        _ => None,
    }
}

/// Size in bytes of one curve element (curv/para) including 4-byte padding.
fn curve_element_len(tag: &[u8]) -> Option<usize> {
    let raw = match read_u32(tag, 0)? {
        0x63757276 => 12 + read_u32(tag, 8)? as usize * 2,
        0x70617261 => {
            let kind = read_u16(tag, 8)? as usize;
            let n = [1, 3, 4, 5, 7].get(kind).copied()?;
            12 + n * 4
        }
        _ => return None,
    };
    Some((raw + 3) / 4 * 4)
}

fn parse_curve_list(data: &[u8], mut at: usize, count: usize) -> Option<Vec<Trc>> {
    let mut curves = Vec::with_capacity(count);
    for _ in 0..count {
        let slice = data.get(at..)?;
        curves.push(parse_curve_tag(slice)?);
        at += curve_element_len(slice)?;
    }
    Some(curves)
}

fn parse_lut_tag(tag: &[u8], expected_inputs: usize) -> Option<LutPipeline> {
    match read_u32(tag, 0)? {
        0x6D667431 => parse_legacy_lut(tag, false, expected_inputs), // 'mft1'
        0x6D667432 => parse_legacy_lut(tag, true, expected_inputs),  // 'mft2'
        0x6D414220 => parse_mab_lut(tag),                            // 'mAB '
        _ => None,
    }
}

/// lut8/lut16: input curves -> 3×3 matrix (3-channel input only) -> uniform
/// CLUT -> output curves.
fn parse_legacy_lut(tag: &[u8], wide: bool, expected_inputs: usize) -> Option<LutPipeline> {
    let in_ch = *tag.get(8)? as usize;
    let out_ch = *tag.get(9)? as usize;
    let grid = *tag.get(10)? as usize;
    if in_ch == 0 || out_ch == 0 || grid == 0 || in_ch != expected_inputs {
        return None;
    }

    let mut matrix = [0.0f32; 9];
    for (i, v) in matrix.iter_mut().enumerate() {
        *v = read_s15f16(tag, 12 + i * 4)?;
    }
    let identity = matrix == [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    let (in_entries, out_entries, mut at) = if wide {
        let ie = read_u16(tag, 48)? as usize;
        let oe = read_u16(tag, 50)? as usize;
        (ie, oe, 52usize)
    } else {
        (256usize, 256usize, 48usize)
    };

    let mut read_value = |tag: &[u8], at: &mut usize| -> Option<f32> {
        if wide {
            let v = read_u16(tag, *at)? as f32 / 65535.0;
            *at += 2;
            Some(v)
        } else {
            let v = *tag.get(*at)? as f32 / 255.0;
            *at += 1;
            Some(v)
        }
    };

    let mut input_curves = Vec::with_capacity(in_ch);
    for _ in 0..in_ch {
        let mut samples = Vec::with_capacity(in_entries);
        for _ in 0..in_entries {
            samples.push(read_value(tag, &mut at)?);
        }
        input_curves.push(Trc::Sampled(samples));
    }

    let clut_len = grid.checked_pow(in_ch as u32)?.checked_mul(out_ch)?;
    if clut_len > 1 << 26 {
        return None;
    }
    let mut samples = Vec::with_capacity(clut_len);
    for _ in 0..clut_len {
        samples.push(read_value(tag, &mut at)?);
    }

    let mut output_curves = Vec::with_capacity(out_ch);
    for _ in 0..out_ch {
        let mut curve = Vec::with_capacity(out_entries);
        for _ in 0..out_entries {
            curve.push(read_value(tag, &mut at)?);
        }
        output_curves.push(Trc::Sampled(curve));
    }

    let mut stages = vec![PipelineStage::Curves(input_curves)];
    if in_ch == 3 && !identity {
        stages.push(PipelineStage::Matrix(matrix, [0.0; 3]));
    }
    stages.push(PipelineStage::Clut(Clut {
        grid_points: vec![grid as u32; in_ch],
        out_channels: out_ch,
        samples,
    }));
    stages.push(PipelineStage::Curves(output_curves));

    Some(LutPipeline { stages, in_channels: in_ch, out_channels: out_ch })
}

/// mAB: A curves -> CLUT -> M curves -> matrix + offset -> B curves.
/// Absent elements are skipped.
fn parse_mab_lut(tag: &[u8]) -> Option<LutPipeline> {
    let in_ch = *tag.get(8)? as usize;
    let out_ch = *tag.get(9)? as usize;
    if in_ch == 0 || out_ch == 0 {
        return None;
    }
    let b_off = read_u32(tag, 12)? as usize;
    let matrix_off = read_u32(tag, 16)? as usize;
    let m_off = read_u32(tag, 20)? as usize;
    let clut_off = read_u32(tag, 24)? as usize;
    let a_off = read_u32(tag, 28)? as usize;

    let mut stages = Vec::new();

    if a_off != 0 {
        stages.push(PipelineStage::Curves(parse_curve_list(tag, a_off, in_ch)?));
    }
    if clut_off != 0 {
        let grid_points: Vec<u32> = (0..in_ch)
            .map(|d| *tag.get(clut_off + d).unwrap_or(&0) as u32)
            .collect();
        if grid_points.iter().any(|g| *g == 0) {
            return None;
        }
        let precision = *tag.get(clut_off + 16)? as usize;
        let count: usize = grid_points
            .iter()
            .try_fold(out_ch, |acc, g| acc.checked_mul(*g as usize))?;
        if count > 1 << 26 {
            return None;
        }
        let data_at = clut_off + 20;
        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let v = match precision {
                1 => *tag.get(data_at + i)? as f32 / 255.0,
                2 => read_u16(tag, data_at + i * 2)? as f32 / 65535.0,
                _ => return None,
            };
            samples.push(v);
        }
        stages.push(PipelineStage::Clut(Clut { grid_points, out_channels: out_ch, samples }));
    }
    if m_off != 0 {
        stages.push(PipelineStage::Curves(parse_curve_list(tag, m_off, out_ch)?));
    }
    if matrix_off != 0 {
        let mut m = [0.0f32; 9];
        for (i, v) in m.iter_mut().enumerate() {
            *v = read_s15f16(tag, matrix_off + i * 4)?;
        }
        let mut off = [0.0f32; 3];
        for (i, v) in off.iter_mut().enumerate() {
            *v = read_s15f16(tag, matrix_off + 36 + i * 4)?;
        }
        stages.push(PipelineStage::Matrix(m, off));
    }
    if b_off != 0 {
        stages.push(PipelineStage::Curves(parse_curve_list(tag, b_off, out_ch)?));
    }

    if stages.is_empty() {
        return None;
    }
    Some(LutPipeline { stages, in_channels: in_ch, out_channels: out_ch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn gamma_trc_endpoints_and_monotonicity() {
        let trc = Trc::Gamma(2.2);
        assert_eq!(trc.eval(0.0), 0.0);
        assert_eq!(trc.eval(1.0), 1.0);
        let mut prev = -1.0f32;
        for i in 0..=2048 {
            let v = trc.eval(i as f32 / 2048.0);
            assert!(v >= prev, "gamma TRC must be non-decreasing");
            prev = v;
        }
    }

    #[test]
    fn sampled_trc_boundaries() {
        let trc = Trc::Sampled(vec![0.0, 0.5, 1.0]);
        assert_eq!(trc.eval(0.0), 0.0);
        assert_eq!(trc.eval(1.0), 1.0);
        assert!((trc.eval(0.25) - 0.25).abs() < 1e-6);
        // empty sample set is identity
        assert_eq!(Trc::Sampled(vec![]).eval(0.3), 0.3);
    }

    #[test]
    fn parametric_type3_srgb_like() {
        // sRGB-style curve: g=2.4, a=1/1.055, b=0.055/1.055, c=1/12.92, d=0.04045
        let trc = Trc::Parametric {
            kind: 3,
            params: vec![2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045],
        };
        assert!((trc.eval(0.02) - 0.02 / 12.92).abs() < 1e-6);
        assert!((trc.eval(1.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn clut_exact_at_grid_points() {
        // 2x2 grid, 1 output channel, values 0,1,2,3 scaled to [0,1]
        let clut = Clut {
            grid_points: vec![2, 2],
            out_channels: 1,
            samples: vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
        };
        assert_eq!(clut.eval(&[0.0, 0.0]), vec![0.0]);
        assert_eq!(clut.eval(&[0.0, 1.0]), vec![1.0 / 3.0]);
        assert_eq!(clut.eval(&[1.0, 0.0]), vec![2.0 / 3.0]);
        assert_eq!(clut.eval(&[1.0, 1.0]), vec![1.0]);
        // center interpolates all four corners
        let mid = clut.eval(&[0.5, 0.5]);
        assert!((mid[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn intent_fallback_order() {
        let pipe = |tag: f32| LutPipeline {
            stages: vec![PipelineStage::Matrix([tag; 9], [0.0; 3])],
            in_channels: 3,
            out_channels: 3,
        };
        let mut profile = IccProfile {
            header: IccHeader {
                data_space: IccColorSpace::Rgb,
                pcs: Pcs::Xyz,
                intent_hint: 0,
                illuminant: [0.9642, 1.0, 0.8249],
            },
            matrix_trc: None,
            gray_trc: None,
            chad: None,
            white_point: None,
            black_point: None,
            a2b: [None, Some(pipe(2.0)), None],
        };
        // perceptual falls back to A2B1 when A2B0 is missing
        assert!(profile.a2b_for_intent(RenderingIntent::Perceptual).is_some());
        profile.a2b = [Some(pipe(1.0)), Some(pipe(2.0)), None];
        let chosen = profile.a2b_for_intent(RenderingIntent::RelativeColorimetric).unwrap();
        assert_eq!(chosen.stages, vec![PipelineStage::Matrix([2.0; 9], [0.0; 3])]);
    }
}
