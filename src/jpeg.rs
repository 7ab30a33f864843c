//! Baseline and progressive JPEG decoding for `/DCTDecode` images.
//!
//! The decoder parses the frame header, buffers entropy-coded coefficients
//! (one pass covers baseline, repeated scans cover progressive), then emits
//! interleaved rows in the declared device space: YCbCr is folded to RGB,
//! Adobe YCCK to CMYK, gray and CMYK pass through. An ICC profile split
//! across APP2 segments is reassembled and surfaced on the info struct.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Zig-zag order of coefficients inside an 8×8 block.
const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// What the emitted rows mean after mandatory conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorModel {
    Gray,
    Rgb,
    Cmyk,
}

#[derive(Debug, Clone)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: usize,
    pub color_model: JpegColorModel,
    pub icc_profile: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameComponent {
    id: u8,
    h: usize,
    v: usize,
    tq: usize,
}

#[derive(Debug, Clone, Default)]
struct Component {
    frame: FrameComponent,
    /// Coefficient grid sized to the interleaved MCU layout.
    blocks_w: usize,
    blocks_h: usize,
    coeffs: Vec<i32>,
    /// Reconstructed samples, `blocks_w * 8` per row.
    plane: Vec<u8>,
    samples_w: usize,
    samples_h: usize,
}

#[derive(Debug, Clone, Default)]
struct HuffTable {
    /// `(code length, code)` to symbol.
    lookup: HashMap<(u8, u16), u8>,
}

impl HuffTable {
    fn build(bits: &[u8; 16], values: &[u8]) -> HuffTable {
        let mut lookup = HashMap::new();
        let mut code: u16 = 0;
        let mut k = 0;
        for (len_idx, count) in bits.iter().enumerate() {
            for _ in 0..*count {
                if let Some(v) = values.get(k) {
                    lookup.insert((len_idx as u8 + 1, code), *v);
                }
                code = code.wrapping_add(1);
                k += 1;
            }
            code <<= 1;
        }
        HuffTable { lookup }
    }
}

struct ScanComponent {
    comp_index: usize,
    dc_table: usize,
    ac_table: usize,
}

struct EntropyReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u32,
    bit_count: u32,
    /// Set when a non-RST marker terminated the segment.
    marker_hit: bool,
}

impl<'a> EntropyReader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        EntropyReader { data, pos, bit_buf: 0, bit_count: 0, marker_hit: false }
    }

    fn fill(&mut self) -> bool {
        while self.bit_count <= 24 {
            if self.marker_hit || self.pos >= self.data.len() {
                return self.bit_count > 0;
            }
            let byte = self.data[self.pos];
            if byte == 0xFF {
                match self.data.get(self.pos + 1) {
                    Some(0x00) => {
                        self.pos += 2;
                        self.bit_buf = (self.bit_buf << 8) | 0xFF;
                        self.bit_count += 8;
                    }
                    Some(m) if (0xD0..=0xD7).contains(m) => {
                        // restart markers are consumed by reset_restart()
                        self.marker_hit = true;
                        return self.bit_count > 0;
                    }
                    _ => {
                        self.marker_hit = true;
                        return self.bit_count > 0;
                    }
                }
            } else {
                self.pos += 1;
                self.bit_buf = (self.bit_buf << 8) | byte as u32;
                self.bit_count += 8;
            }
        }
        true
    }

    fn read_bit(&mut self) -> Option<u8> {
        if self.bit_count == 0 && !self.fill() {
            return None;
        }
        if self.bit_count == 0 {
            return None;
        }
        self.bit_count -= 1;
        Some(((self.bit_buf >> self.bit_count) & 1) as u8)
    }

    fn receive(&mut self, n: u8) -> Option<u16> {
        let mut v: u16 = 0;
        for _ in 0..n {
            v = (v << 1) | self.read_bit()? as u16;
        }
        Some(v)
    }

    fn decode_huff(&mut self, table: &HuffTable) -> Option<u8> {
        let mut code: u16 = 0;
        for len in 1..=16u8 {
            code = (code << 1) | self.read_bit()? as u16;
            if let Some(v) = table.lookup.get(&(len, code)) {
                return Some(*v);
            }
        }
        None
    }

    /// Byte-aligns and consumes an RSTn marker if one is next.
    fn reset_restart(&mut self) {
        self.bit_buf = 0;
        self.bit_count = 0;
        if self.marker_hit {
            if let (Some(0xFF), Some(m)) =
                (self.data.get(self.pos).copied(), self.data.get(self.pos + 1).copied())
            {
                if (0xD0..=0xD7).contains(&m) {
                    self.pos += 2;
                    self.marker_hit = false;
                }
            }
        }
    }
}

fn extend(v: u16, s: u8) -> i32 {
    if s == 0 {
        return 0;
    }
    let v = v as i32;
    if v < (1 << (s - 1)) {
        v - (1 << s) + 1
    } else {
        v
    }
}

pub struct JpegDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    progressive: bool,
    width: usize,
    height: usize,
    components: Vec<Component>,
    quant: [[u16; 64]; 4],
    dc_tables: [HuffTable; 4],
    ac_tables: [HuffTable; 4],
    restart_interval: usize,
    adobe_transform: Option<u8>,
    adobe_seen: bool,
    icc_chunks: Vec<(u8, Vec<u8>)>,
    icc_total: u8,
    hmax: usize,
    vmax: usize,
    decoded: bool,
    next_row: usize,
}

impl<'a> JpegDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        JpegDecoder {
            data,
            pos: 0,
            progressive: false,
            width: 0,
            height: 0,
            components: Vec::new(),
            quant: [[0; 64]; 4],
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            adobe_transform: None,
            adobe_seen: false,
            icc_chunks: Vec::new(),
            icc_total: 0,
            hmax: 1,
            vmax: 1,
            decoded: false,
            next_row: 0,
        }
    }

    /// Parses markers up to (and including) the frame header.
    pub fn read_info(&mut self) -> Result<JpegInfo, String> {
        if self.data.get(0..2) != Some(&[0xFF, 0xD8]) {
            return Err("missing SOI".to_string());
        }
        self.pos = 2;
        while self.width == 0 {
            let marker = self.next_marker()?;
            self.handle_marker(marker)?;
            if marker == 0xD9 {
                return Err("EOI before frame header".to_string());
            }
        }
        Ok(self.info())
    }

    fn info(&self) -> JpegInfo {
        let components = self.components.len();
        let color_model = match components {
            1 => JpegColorModel::Gray,
            4 => JpegColorModel::Cmyk,
            _ => JpegColorModel::Rgb,
        };
        let icc_profile = if !self.icc_chunks.is_empty()
            && self.icc_total as usize == self.icc_chunks.len()
        {
            let mut chunks = self.icc_chunks.clone();
            chunks.sort_by_key(|(seq, _)| *seq);
            Some(chunks.into_iter().flat_map(|(_, d)| d).collect())
        } else {
            None
        };
        JpegInfo {
            width: self.width as u32,
            height: self.height as u32,
            components,
            color_model,
            icc_profile,
        }
    }

    /// Emits the next interleaved row into `out` (`width * components`
    /// bytes). Returns `false` after the last row.
    pub fn read_row(&mut self, out: &mut [u8]) -> Result<bool, String> {
        if !self.decoded {
            self.decode_image()?;
            self.decoded = true;
        }
        if self.next_row >= self.height {
            return Ok(false);
        }
        let y = self.next_row;
        let ncomp = self.components.len();
        let needed = self.width * ncomp;
        if out.len() < needed {
            return Err("row buffer too small".to_string());
        }

        for x in 0..self.width {
            for (c, comp) in self.components.iter().enumerate() {
                // box upsampling back to full resolution
                let sx = x * comp.frame.h / self.hmax;
                let sy = y * comp.frame.v / self.vmax;
                let sx = sx.min(comp.samples_w.saturating_sub(1));
                let sy = sy.min(comp.samples_h.saturating_sub(1));
                out[x * ncomp + c] = comp.plane[sy * comp.blocks_w * 8 + sx];
            }
        }
        self.color_convert_row(&mut out[..needed]);
        self.next_row += 1;
        Ok(true)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn color_convert_row(&self, row: &mut [u8]) {
        let ncomp = self.components.len();
        let transform = self.adobe_transform.unwrap_or(match ncomp {
            3 => 1,
            4 => 0,
            _ => 0,
        });
        match (ncomp, transform) {
            (3, 1 | 2) => {
                for px in row.chunks_exact_mut(3) {
                    let (r, g, b) = ycbcr_to_rgb(px[0], px[1], px[2]);
                    px[0] = r;
                    px[1] = g;
                    px[2] = b;
                }
            }
            (4, 2) => {
                // YCCK: chroma transform on the first three, K inverted with
                // the rest of the Adobe plane
                for px in row.chunks_exact_mut(4) {
                    let (r, g, b) = ycbcr_to_rgb(px[0], px[1], px[2]);
                    px[0] = r;
                    px[1] = g;
                    px[2] = b;
                    px[3] = 255 - px[3];
                }
            }
            (4, _) if self.adobe_seen => {
                // Adobe CMYK stores ink coverage inverted
                for v in row.iter_mut() {
                    *v = 255 - *v;
                }
            }
            _ => {}
        }
    }

    fn next_marker(&mut self) -> Result<u8, String> {
        while self.pos + 1 < self.data.len() {
            if self.data[self.pos] == 0xFF && self.data[self.pos + 1] != 0x00 {
                let m = self.data[self.pos + 1];
                self.pos += 2;
                // fill bytes
                if m == 0xFF {
                    self.pos -= 1;
                    continue;
                }
                return Ok(m);
            }
            self.pos += 1;
        }
        Err("unexpected end of JPEG data".to_string())
    }

    fn segment(&mut self) -> Result<&'a [u8], String> {
        let len = u16::from_be_bytes(
            self.data
                .get(self.pos..self.pos + 2)
                .ok_or("truncated segment")?
                .try_into()
                .unwrap(),
        ) as usize;
        if len < 2 || self.pos + len > self.data.len() {
            return Err("bad segment length".to_string());
        }
        let seg = &self.data[self.pos + 2..self.pos + len];
        self.pos += len;
        Ok(seg)
    }

    fn handle_marker(&mut self, marker: u8) -> Result<(), String> {
        match marker {
            0xC0 | 0xC1 | 0xC2 => {
                self.progressive = marker == 0xC2;
                let seg = self.segment()?;
                self.parse_frame(seg)?;
            }
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(format!("unsupported SOF marker 0xFF{marker:02X}"));
            }
            0xC4 => {
                let seg = self.segment()?;
                self.parse_dht(seg)?;
            }
            0xDB => {
                let seg = self.segment()?;
                self.parse_dqt(seg)?;
            }
            0xDD => {
                let seg = self.segment()?;
                self.restart_interval = u16::from_be_bytes(
                    seg.get(0..2).ok_or("bad DRI")?.try_into().unwrap(),
                ) as usize;
            }
            0xE2 => {
                let seg = self.segment()?;
                if seg.starts_with(b"ICC_PROFILE\0") && seg.len() > 14 {
                    let seq = seg[12];
                    self.icc_total = seg[13];
                    self.icc_chunks.push((seq, seg[14..].to_vec()));
                }
            }
            0xEE => {
                let seg = self.segment()?;
                if seg.starts_with(b"Adobe") {
                    self.adobe_seen = true;
                    self.adobe_transform = seg.get(11).copied();
                }
            }
            0xD8 => {}
            0xD9 => {}
            0xDA => {
                let seg = self.segment()?;
                let scan = self.parse_sos(seg)?;
                self.decode_scan(scan)?;
            }
            // APPn, COM and anything else with a length word
            _ => {
                self.segment()?;
            }
        }
        Ok(())
    }

    fn parse_frame(&mut self, seg: &[u8]) -> Result<(), String> {
        let precision = *seg.first().ok_or("bad SOF")?;
        if precision != 8 {
            return Err(format!("unsupported sample precision {precision}"));
        }
        self.height = u16::from_be_bytes(seg[1..3].try_into().unwrap()) as usize;
        self.width = u16::from_be_bytes(seg[3..5].try_into().unwrap()) as usize;
        let n = *seg.get(5).ok_or("bad SOF")? as usize;
        if !matches!(n, 1 | 3 | 4) {
            return Err(format!("unsupported component count {n}"));
        }
        if self.width == 0 || self.height == 0 {
            return Err("empty frame".to_string());
        }
        self.components.clear();
        for i in 0..n {
            let at = 6 + i * 3;
            let id = *seg.get(at).ok_or("bad SOF component")?;
            let hv = *seg.get(at + 1).ok_or("bad SOF component")?;
            let tq = *seg.get(at + 2).ok_or("bad SOF component")? as usize;
            let (h, v) = ((hv >> 4) as usize, (hv & 0x0F) as usize);
            if h == 0 || v == 0 || h > 4 || v > 4 {
                return Err("bad sampling factors".to_string());
            }
            self.components.push(Component {
                frame: FrameComponent { id, h, v, tq },
                ..Default::default()
            });
        }
        self.hmax = self.components.iter().map(|c| c.frame.h).max().unwrap_or(1);
        self.vmax = self.components.iter().map(|c| c.frame.v).max().unwrap_or(1);
        let mcus_x = (self.width + 8 * self.hmax - 1) / (8 * self.hmax);
        let mcus_y = (self.height + 8 * self.vmax - 1) / (8 * self.vmax);
        for comp in &mut self.components {
            comp.blocks_w = mcus_x * comp.frame.h;
            comp.blocks_h = mcus_y * comp.frame.v;
            comp.coeffs = vec![0; comp.blocks_w * comp.blocks_h * 64];
            comp.samples_w =
                (self.width * comp.frame.h + self.hmax - 1) / self.hmax;
            comp.samples_h =
                (self.height * comp.frame.v + self.vmax - 1) / self.vmax;
        }
        Ok(())
    }

    fn parse_dqt(&mut self, mut seg: &[u8]) -> Result<(), String> {
        while !seg.is_empty() {
            let pq_tq = seg[0];
            let (pq, tq) = ((pq_tq >> 4) as usize, (pq_tq & 0x0F) as usize);
            if tq >= 4 {
                return Err("bad DQT id".to_string());
            }
            let entry_len = if pq == 0 { 1 } else { 2 };
            if seg.len() < 1 + 64 * entry_len {
                return Err("truncated DQT".to_string());
            }
            for k in 0..64 {
                let v = if pq == 0 {
                    seg[1 + k] as u16
                } else {
                    u16::from_be_bytes([seg[1 + k * 2], seg[2 + k * 2]])
                };
                self.quant[tq][k] = v;
            }
            seg = &seg[1 + 64 * entry_len..];
        }
        Ok(())
    }

    fn parse_dht(&mut self, mut seg: &[u8]) -> Result<(), String> {
        while seg.len() >= 17 {
            let tc_th = seg[0];
            let (tc, th) = ((tc_th >> 4) as usize, (tc_th & 0x0F) as usize);
            if th >= 4 {
                return Err("bad DHT id".to_string());
            }
            let mut bits = [0u8; 16];
            bits.copy_from_slice(&seg[1..17]);
            let total: usize = bits.iter().map(|b| *b as usize).sum();
            if seg.len() < 17 + total {
                return Err("truncated DHT".to_string());
            }
            let table = HuffTable::build(&bits, &seg[17..17 + total]);
            if tc == 0 {
                self.dc_tables[th] = table;
            } else {
                self.ac_tables[th] = table;
            }
            seg = &seg[17 + total..];
        }
        Ok(())
    }

    fn parse_sos(&mut self, seg: &[u8]) -> Result<Scan, String> {
        let ns = *seg.first().ok_or("bad SOS")? as usize;
        let mut comps = Vec::with_capacity(ns);
        for i in 0..ns {
            let cs = *seg.get(1 + i * 2).ok_or("bad SOS component")?;
            let tables = *seg.get(2 + i * 2).ok_or("bad SOS component")?;
            let comp_index = self
                .components
                .iter()
                .position(|c| c.frame.id == cs)
                .ok_or("SOS references unknown component")?;
            comps.push(ScanComponent {
                comp_index,
                dc_table: (tables >> 4) as usize,
                ac_table: (tables & 0x0F) as usize,
            });
        }
        let base = 1 + ns * 2;
        let ss = *seg.get(base).ok_or("bad SOS")? as usize;
        let se = *seg.get(base + 1).ok_or("bad SOS")? as usize;
        let ah_al = *seg.get(base + 2).ok_or("bad SOS")?;
        Ok(Scan {
            components: comps,
            ss,
            se: se.min(63),
            ah: ah_al >> 4,
            al: ah_al & 0x0F,
        })
    }

    fn decode_scan(&mut self, scan: Scan) -> Result<(), String> {
        let mut reader = EntropyReader::new(self.data, self.pos);
        let mut dc_pred = vec![0i32; self.components.len()];
        let mut eob_run: u32 = 0;

        let interleaved = scan.components.len() > 1;
        let (units_x, units_y) = if interleaved {
            let mcus_x = (self.width + 8 * self.hmax - 1) / (8 * self.hmax);
            let mcus_y = (self.height + 8 * self.vmax - 1) / (8 * self.vmax);
            (mcus_x, mcus_y)
        } else {
            let comp = &self.components[scan.components[0].comp_index];
            (
                (comp.samples_w + 7) / 8,
                (comp.samples_h + 7) / 8,
            )
        };

        let mut units_done = 0usize;
        'outer: for uy in 0..units_y {
            for ux in 0..units_x {
                if self.restart_interval > 0
                    && units_done > 0
                    && units_done % self.restart_interval == 0
                {
                    reader.reset_restart();
                    dc_pred.fill(0);
                    eob_run = 0;
                }
                let ok = self.decode_unit(
                    &mut reader,
                    &scan,
                    interleaved,
                    ux,
                    uy,
                    &mut dc_pred,
                    &mut eob_run,
                );
                if !ok {
                    log::info!("entropy data ended early at unit {units_done}");
                    break 'outer;
                }
                units_done += 1;
            }
        }

        self.pos = reader.pos;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_unit(
        &mut self,
        reader: &mut EntropyReader,
        scan: &Scan,
        interleaved: bool,
        ux: usize,
        uy: usize,
        dc_pred: &mut [i32],
        eob_run: &mut u32,
    ) -> bool {
        for sc in &scan.components {
            let (h, v) = if interleaved {
                let c = &self.components[sc.comp_index];
                (c.frame.h, c.frame.v)
            } else {
                (1, 1)
            };
            for by in 0..v {
                for bx in 0..h {
                    let comp = &self.components[sc.comp_index];
                    let (row, col) = if interleaved {
                        (uy * comp.frame.v + by, ux * comp.frame.h + bx)
                    } else {
                        (uy, ux)
                    };
                    if row >= comp.blocks_h || col >= comp.blocks_w {
                        continue;
                    }
                    let offset = (row * comp.blocks_w + col) * 64;
                    let ok = if self.progressive {
                        self.decode_block_progressive(reader, scan, sc, offset, dc_pred, eob_run)
                    } else {
                        self.decode_block_baseline(reader, scan, sc, offset, dc_pred)
                    };
                    if !ok {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn decode_block_baseline(
        &mut self,
        reader: &mut EntropyReader,
        _scan: &Scan,
        sc: &ScanComponent,
        offset: usize,
        dc_pred: &mut [i32],
    ) -> bool {
        let dc_tbl = &self.dc_tables[sc.dc_table];
        let ac_tbl = &self.ac_tables[sc.ac_table];
        let Some(s) = reader.decode_huff(dc_tbl) else { return false };
        let Some(bits) = reader.receive(s) else { return false };
        dc_pred[sc.comp_index] += extend(bits, s);
        let coeffs = &mut self.components[sc.comp_index].coeffs;
        coeffs[offset] = dc_pred[sc.comp_index];

        let mut k = 1;
        while k < 64 {
            let Some(rs) = reader.decode_huff(ac_tbl) else { return false };
            let r = (rs >> 4) as usize;
            let s = rs & 0x0F;
            if s == 0 {
                if r != 15 {
                    break; // EOB
                }
                k += 16;
            } else {
                k += r;
                if k >= 64 {
                    break;
                }
                let Some(bits) = reader.receive(s) else { return false };
                coeffs[offset + ZIGZAG[k]] = extend(bits, s);
                k += 1;
            }
        }
        true
    }

    fn decode_block_progressive(
        &mut self,
        reader: &mut EntropyReader,
        scan: &Scan,
        sc: &ScanComponent,
        offset: usize,
        dc_pred: &mut [i32],
        eob_run: &mut u32,
    ) -> bool {
        if scan.ss == 0 {
            // DC scan
            if scan.ah == 0 {
                let dc_tbl = &self.dc_tables[sc.dc_table];
                let Some(s) = reader.decode_huff(dc_tbl) else { return false };
                let Some(bits) = reader.receive(s) else { return false };
                dc_pred[sc.comp_index] += extend(bits, s);
                self.components[sc.comp_index].coeffs[offset] =
                    dc_pred[sc.comp_index] << scan.al;
            } else {
                let Some(bit) = reader.read_bit() else { return false };
                if bit == 1 {
                    self.components[sc.comp_index].coeffs[offset] |= 1 << scan.al;
                }
            }
            return true;
        }

        // AC scans
        if scan.ah == 0 {
            if *eob_run > 0 {
                *eob_run -= 1;
                return true;
            }
            let ac_tbl = self.ac_tables[sc.ac_table].clone();
            let coeffs = &mut self.components[sc.comp_index].coeffs;
            let mut k = scan.ss;
            while k <= scan.se {
                let Some(rs) = reader.decode_huff(&ac_tbl) else { return false };
                let r = (rs >> 4) as u32;
                let s = rs & 0x0F;
                if s == 0 {
                    if r != 15 {
                        *eob_run = (1 << r) - 1;
                        if r > 0 {
                            let Some(extra) = reader.receive(r as u8) else { return false };
                            *eob_run += extra as u32;
                        }
                        break;
                    }
                    k += 16;
                } else {
                    k += r as usize;
                    if k > scan.se {
                        break;
                    }
                    let Some(bits) = reader.receive(s) else { return false };
                    coeffs[offset + ZIGZAG[k]] = extend(bits, s) << scan.al;
                    k += 1;
                }
            }
            true
        } else {
            self.refine_ac_block(reader, scan, sc, offset, eob_run)
        }
    }

    /// Successive-approximation AC refinement (T.81 G.1.2.3).
    fn refine_ac_block(
        &mut self,
        reader: &mut EntropyReader,
        scan: &Scan,
        sc: &ScanComponent,
        offset: usize,
        eob_run: &mut u32,
    ) -> bool {
        let p1: i32 = 1 << scan.al;
        let m1: i32 = -1 << scan.al;
        let ac_tbl = self.ac_tables[sc.ac_table].clone();
        let coeffs = &mut self.components[sc.comp_index].coeffs;
        let mut k = scan.ss;

        if *eob_run == 0 {
            while k <= scan.se {
                let Some(rs) = reader.decode_huff(&ac_tbl) else { return false };
                let mut r = (rs >> 4) as i32;
                let s = rs & 0x0F;
                let mut coef_delta = 0i32;
                if s == 0 {
                    if r != 15 {
                        *eob_run = (1 << r) - 1;
                        if r > 0 {
                            let Some(extra) = reader.receive(r as u8) else { return false };
                            *eob_run += extra as u32;
                        }
                        break;
                    }
                } else {
                    let Some(bit) = reader.read_bit() else { return false };
                    coef_delta = if bit == 1 { p1 } else { m1 };
                }
                while k <= scan.se {
                    let pos = offset + ZIGZAG[k];
                    if coeffs[pos] != 0 {
                        let Some(bit) = reader.read_bit() else { return false };
                        if bit == 1 && (coeffs[pos] & p1) == 0 {
                            coeffs[pos] += if coeffs[pos] >= 0 { p1 } else { m1 };
                        }
                    } else {
                        if r == 0 {
                            if coef_delta != 0 {
                                coeffs[pos] = coef_delta;
                            }
                            k += 1;
                            break;
                        }
                        r -= 1;
                    }
                    k += 1;
                }
            }
        }

        if *eob_run > 0 {
            while k <= scan.se {
                let pos = offset + ZIGZAG[k];
                if coeffs[pos] != 0 {
                    let Some(bit) = reader.read_bit() else { return false };
                    if bit == 1 && (coeffs[pos] & p1) == 0 {
                        coeffs[pos] += if coeffs[pos] >= 0 { p1 } else { m1 };
                    }
                }
                k += 1;
            }
            *eob_run -= 1;
        }
        true
    }

    /// Runs the marker loop to the end of the stream, then reconstructs all
    /// planes from the buffered coefficients.
    fn decode_image(&mut self) -> Result<(), String> {
        if self.width == 0 {
            self.read_info()?;
        }
        loop {
            let marker = match self.next_marker() {
                Ok(m) => m,
                Err(_) => break,
            };
            if marker == 0xD9 {
                break;
            }
            if (0xD0..=0xD7).contains(&marker) {
                continue;
            }
            self.handle_marker(marker)?;
        }

        for ci in 0..self.components.len() {
            self.reconstruct_component(ci);
        }
        Ok(())
    }

    fn reconstruct_component(&mut self, ci: usize) {
        let comp = &mut self.components[ci];
        let quant = &self.quant[comp.frame.tq.min(3)];
        let plane_w = comp.blocks_w * 8;
        comp.plane = vec![0; plane_w * comp.blocks_h * 8];
        let mut block = [0f32; 64];
        for brow in 0..comp.blocks_h {
            for bcol in 0..comp.blocks_w {
                let offset = (brow * comp.blocks_w + bcol) * 64;
                for k in 0..64 {
                    block[ZIGZAG[k]] =
                        comp.coeffs[offset + ZIGZAG[k]] as f32 * quant[k] as f32;
                }
                idct_8x8(&mut block);
                for y in 0..8 {
                    for x in 0..8 {
                        let v = (block[y * 8 + x] + 128.0).round().clamp(0.0, 255.0) as u8;
                        comp.plane[(brow * 8 + y) * plane_w + bcol * 8 + x] = v;
                    }
                }
            }
        }
        comp.coeffs = Vec::new();
    }
}

struct Scan {
    components: Vec<ScanComponent>,
    ss: usize,
    se: usize,
    ah: u8,
    al: u8,
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    (
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    )
}

/// Separable float inverse DCT; input/output in natural (row-major) order.
fn idct_8x8(block: &mut [f32; 64]) {
    static COS: Lazy<[[f32; 8]; 8]> = Lazy::new(|| {
        let mut t = [[0f32; 8]; 8];
        for (u, row) in t.iter_mut().enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                let cu = if u == 0 { 1.0 / 2f32.sqrt() } else { 1.0 };
                *v = cu * ((2 * x + 1) as f32 * u as f32 * std::f32::consts::PI / 16.0).cos();
            }
        }
        t
    });

    let mut tmp = [0f32; 64];
    // rows
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0;
            for u in 0..8 {
                sum += COS[u][x] * block[y * 8 + u];
            }
            tmp[y * 8 + x] = sum * 0.5;
        }
    }
    // columns
    for x in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0;
            for v in 0..8 {
                sum += COS[v][y] * tmp[v * 8 + x];
            }
            block[y * 8 + x] = sum * 0.5;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn huffman_canonical_codes() {
        // two codes of length 1 and 2: 0 -> 5, 10 -> 6
        let mut bits = [0u8; 16];
        bits[0] = 1;
        bits[1] = 1;
        let table = HuffTable::build(&bits, &[5, 6]);
        assert_eq!(table.lookup.get(&(1, 0b0)), Some(&5));
        assert_eq!(table.lookup.get(&(2, 0b10)), Some(&6));
    }

    #[test]
    fn extend_sign_extension() {
        assert_eq!(extend(0b0, 1), -1);
        assert_eq!(extend(0b1, 1), 1);
        assert_eq!(extend(0b01, 2), -2);
        assert_eq!(extend(0b11, 2), 3);
        assert_eq!(extend(0, 0), 0);
    }

    #[test]
    fn idct_dc_only_block_is_flat() {
        let mut block = [0f32; 64];
        block[0] = 64.0;
        idct_8x8(&mut block);
        let expect = 64.0 / 8.0;
        for v in block {
            assert!((v - expect).abs() < 1e-3);
        }
    }

    #[test]
    fn entropy_reader_destuffs_ff00() {
        let data = [0xFF, 0x00, 0x80];
        let mut r = EntropyReader::new(&data, 0);
        // first byte is a destuffed 0xFF
        for _ in 0..8 {
            assert_eq!(r.read_bit(), Some(1));
        }
        assert_eq!(r.read_bit(), Some(1));
        assert_eq!(r.read_bit(), Some(0));
    }

    #[test]
    fn entropy_reader_stops_at_marker() {
        let data = [0xAA, 0xFF, 0xD9];
        let mut r = EntropyReader::new(&data, 0);
        for _ in 0..8 {
            assert!(r.read_bit().is_some());
        }
        assert_eq!(r.read_bit(), None);
        assert!(r.marker_hit);
    }

    #[test]
    fn gray_minimal_jpeg_roundtrip() {
        // hand-assembled 8x8 baseline grayscale JPEG with a flat DC value
        let mut jpg: Vec<u8> = vec![0xFF, 0xD8];
        // DQT: all ones
        jpg.extend([0xFF, 0xDB, 0x00, 0x43, 0x00]);
        jpg.extend([1u8; 64]);
        // SOF0: 8x8, 1 component, no subsampling, q-table 0
        jpg.extend([0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x08, 0x00, 0x08, 0x01, 0x11, 0x00]);
        // DHT DC table 0: one code of length 2 -> symbol 4 (4 magnitude bits)
        let mut dht = vec![0xFF, 0xC4, 0x00, 0x00, 0x00];
        let mut bits = [0u8; 16];
        bits[1] = 1;
        dht.extend(bits);
        dht.push(0x04);
        let dht_len = (dht.len() - 2) as u16;
        dht[2] = (dht_len >> 8) as u8;
        dht[3] = dht_len as u8;
        jpg.extend(&dht);
        // DHT AC table 0: one code of length 2 -> symbol 0 (EOB)
        let mut dht_ac = vec![0xFF, 0xC4, 0x00, 0x00, 0x10];
        dht_ac.extend(bits);
        dht_ac.push(0x00);
        let dht_ac_len = (dht_ac.len() - 2) as u16;
        dht_ac[2] = (dht_ac_len >> 8) as u8;
        dht_ac[3] = dht_ac_len as u8;
        jpg.extend(&dht_ac);
        // SOS
        jpg.extend([0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        // entropy: DC code 00 + 4 bits 1111 (diff = 15), AC EOB code 00, pad
        // 00 1111 00 -> 0b0011_1100
        jpg.push(0b0011_1100);
        jpg.extend([0xFF, 0xD9]);

        let mut dec = JpegDecoder::new(&jpg);
        let info = dec.read_info().unwrap();
        assert_eq!((info.width, info.height, info.components), (8, 8, 1));
        assert_eq!(info.color_model, JpegColorModel::Gray);
        let mut row = vec![0u8; 8];
        let mut rows = 0;
        while dec.read_row(&mut row).unwrap() {
            rows += 1;
            // DC 15 * q 1 -> idct flat 15/8? no: dc=15 -> value 15/8*? flat
            // block = dc/8 + 128 rounded; all samples equal
            assert!(row.iter().all(|v| *v == row[0]));
        }
        assert_eq!(rows, 8);
    }
}
