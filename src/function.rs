//! PDF function objects (types 0, 2, 3 and 4).
//!
//! Functions drive shading colors and tint transforms. All evaluators take a
//! slice of clamped inputs and return a component vector.

use lopdf::{Document, Object};

use crate::resources::{get_f32_array, resolve, to_f32};

/// Reads big-endian bit fields out of a byte stream; used for sampled
/// function data and for the packed vertex streams of mesh shadings.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    /// Reads `bits` (1..=32) as an unsigned big-endian value.
    pub fn read(&mut self, bits: u32) -> Option<u32> {
        debug_assert!(bits >= 1 && bits <= 32);
        let mut value: u64 = 0;
        let mut remaining = bits as usize;
        while remaining > 0 {
            let byte_idx = self.bit_pos / 8;
            if byte_idx >= self.data.len() {
                return None;
            }
            let bit_in_byte = self.bit_pos % 8;
            let available = 8 - bit_in_byte;
            let take = available.min(remaining);
            let byte = self.data[byte_idx] as u64;
            let shifted = (byte >> (available - take)) & ((1u64 << take) - 1);
            value = (value << take) | shifted;
            self.bit_pos += take;
            remaining -= take;
        }
        Some(value as u32)
    }

    /// Skips forward to the next byte boundary.
    pub fn align(&mut self) {
        self.bit_pos = (self.bit_pos + 7) / 8 * 8;
    }

    pub fn at_end(&self) -> bool {
        self.bit_pos / 8 >= self.data.len()
    }
}

/// Type 0: sampled values on a regular grid with multi-linear interpolation.
#[derive(Debug, Clone)]
pub struct SampledFunction {
    pub domain: Vec<f32>,
    pub range: Vec<f32>,
    pub size: Vec<u32>,
    pub bits_per_sample: u32,
    pub encode: Vec<f32>,
    pub decode: Vec<f32>,
    /// Samples already widened to f32 in `[0, 1]`, innermost axis is the
    /// last input component, outputs interleaved per grid point.
    samples: Vec<f32>,
}

/// Type 2: exponential interpolation between two component vectors.
#[derive(Debug, Clone)]
pub struct ExponentialFunction {
    pub domain: Vec<f32>,
    pub c0: Vec<f32>,
    pub c1: Vec<f32>,
    pub n: f32,
}

/// Type 3: stitching of child functions over a partitioned domain.
#[derive(Debug, Clone)]
pub struct StitchingFunction {
    pub domain: Vec<f32>,
    pub functions: Vec<PdfFunction>,
    pub bounds: Vec<f32>,
    pub encode: Vec<f32>,
}

/// Type 4: a minimal PostScript calculator.
#[derive(Debug, Clone)]
pub struct PostScriptFunction {
    pub domain: Vec<f32>,
    pub range: Vec<f32>,
    program: Vec<PsOp>,
}

#[derive(Debug, Clone)]
enum PsOp {
    Num(f32),
    Block(Vec<PsOp>),
    Op(&'static str),
}

#[derive(Debug, Clone)]
pub enum PdfFunction {
    Sampled(SampledFunction),
    Exponential(ExponentialFunction),
    Stitching(Box<StitchingFunction>),
    PostScript(PostScriptFunction),
}

impl PdfFunction {
    /// Parses a function from a dictionary or stream object.
    pub fn parse(doc: &Document, obj: &Object) -> Result<PdfFunction, String> {
        let obj = resolve(doc, obj);
        let (dict, stream_data) = match obj {
            Object::Stream(s) => {
                let data = s
                    .decompressed_content()
                    .unwrap_or_else(|_| s.content.clone());
                (s.dict.clone(), Some(data))
            }
            Object::Dictionary(d) => (d.clone(), None),
            _ => return Err("function is not a dictionary or stream".to_string()),
        };

        let function_type = dict
            .get(b"FunctionType")
            .ok()
            .map(|o| to_f32(resolve(doc, o)) as i64)
            .ok_or("function missing FunctionType")?;
        let domain = get_f32_array(doc, dict.get(b"Domain").ok())
            .ok_or("function missing Domain")?;
        let range = get_f32_array(doc, dict.get(b"Range").ok()).unwrap_or_default();

        match function_type {
            0 => {
                let data = stream_data.ok_or("sampled function without stream data")?;
                let size: Vec<u32> = get_f32_array(doc, dict.get(b"Size").ok())
                    .ok_or("sampled function missing Size")?
                    .into_iter()
                    .map(|v| v.max(1.0) as u32)
                    .collect();
                let bits_per_sample = dict
                    .get(b"BitsPerSample")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)) as u32)
                    .ok_or("sampled function missing BitsPerSample")?;
                if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
                    return Err(format!("invalid BitsPerSample {bits_per_sample}"));
                }
                if range.is_empty() {
                    return Err("sampled function missing Range".to_string());
                }
                let n_inputs = domain.len() / 2;
                let n_outputs = range.len() / 2;
                let encode = get_f32_array(doc, dict.get(b"Encode").ok()).unwrap_or_else(|| {
                    size.iter()
                        .flat_map(|s| [0.0, (*s as f32) - 1.0])
                        .collect()
                });
                let decode =
                    get_f32_array(doc, dict.get(b"Decode").ok()).unwrap_or_else(|| range.clone());

                // widen all samples up front; sample streams are small
                let total: usize = size.iter().map(|s| *s as usize).product::<usize>() * n_outputs;
                let mut reader = BitReader::new(&data);
                let max = ((1u64 << bits_per_sample) - 1) as f32;
                let mut samples = Vec::with_capacity(total);
                for _ in 0..total {
                    let raw = reader.read(bits_per_sample).unwrap_or(0);
                    samples.push(raw as f32 / max);
                }
                if size.len() != n_inputs {
                    return Err("sampled function Size/Domain mismatch".to_string());
                }
                Ok(PdfFunction::Sampled(SampledFunction {
                    domain,
                    range,
                    size,
                    bits_per_sample,
                    encode,
                    decode,
                    samples,
                }))
            }
            2 => {
                let c0 = get_f32_array(doc, dict.get(b"C0").ok()).unwrap_or_else(|| vec![0.0]);
                let c1 = get_f32_array(doc, dict.get(b"C1").ok()).unwrap_or_else(|| vec![1.0]);
                let n = dict
                    .get(b"N")
                    .ok()
                    .map(|o| to_f32(resolve(doc, o)))
                    .unwrap_or(1.0);
                Ok(PdfFunction::Exponential(ExponentialFunction { domain, c0, c1, n }))
            }
            3 => {
                let funcs_obj = dict
                    .get(b"Functions")
                    .map_err(|_| "stitching function missing Functions")?;
                let arr = resolve(doc, funcs_obj)
                    .as_array()
                    .map_err(|_| "Functions is not an array")?
                    .clone();
                let mut functions = Vec::with_capacity(arr.len());
                for f in &arr {
                    functions.push(PdfFunction::parse(doc, f)?);
                }
                let bounds = get_f32_array(doc, dict.get(b"Bounds").ok()).unwrap_or_default();
                let encode = get_f32_array(doc, dict.get(b"Encode").ok()).unwrap_or_else(|| {
                    (0..functions.len()).flat_map(|_| [0.0, 1.0]).collect()
                });
                Ok(PdfFunction::Stitching(Box::new(StitchingFunction {
                    domain,
                    functions,
                    bounds,
                    encode,
                })))
            }
            4 => {
                let data = stream_data.ok_or("calculator function without stream data")?;
                let text = String::from_utf8_lossy(&data);
                let program = parse_postscript(&text)?;
                Ok(PdfFunction::PostScript(PostScriptFunction { domain, range, program }))
            }
            other => Err(format!("unsupported FunctionType {other}")),
        }
    }

    pub fn n_inputs(&self) -> usize {
        match self {
            PdfFunction::Sampled(f) => f.domain.len() / 2,
            PdfFunction::Exponential(f) => f.domain.len() / 2,
            PdfFunction::Stitching(f) => f.domain.len() / 2,
            PdfFunction::PostScript(f) => f.domain.len() / 2,
        }
    }

    pub fn n_outputs(&self) -> usize {
        match self {
            PdfFunction::Sampled(f) => f.range.len() / 2,
            PdfFunction::Exponential(f) => f.c0.len().max(f.c1.len()),
            PdfFunction::Stitching(f) => {
                f.functions.first().map(|c| c.n_outputs()).unwrap_or(0)
            }
            PdfFunction::PostScript(f) => f.range.len() / 2,
        }
    }

    /// Evaluates the function; inputs are clamped to the domain.
    pub fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        match self {
            PdfFunction::Sampled(f) => f.eval(inputs),
            PdfFunction::Exponential(f) => f.eval(inputs),
            PdfFunction::Stitching(f) => f.eval(inputs),
            PdfFunction::PostScript(f) => f.eval(inputs),
        }
    }
}

fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if lo > hi {
        return lo;
    }
    x.max(lo).min(hi)
}

fn interpolate(x: f32, x0: f32, x1: f32, y0: f32, y1: f32) -> f32 {
    if (x1 - x0).abs() < f32::EPSILON {
        y0
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

impl SampledFunction {
    fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let n_in = self.size.len();
        let n_out = self.range.len() / 2;

        // map each input through domain -> encode -> grid coordinate
        let mut coords = Vec::with_capacity(n_in);
        for d in 0..n_in {
            let x = clamp(
                inputs.get(d).copied().unwrap_or(0.0),
                self.domain[2 * d],
                self.domain[2 * d + 1],
            );
            let e = interpolate(
                x,
                self.domain[2 * d],
                self.domain[2 * d + 1],
                self.encode[2 * d],
                self.encode[2 * d + 1],
            );
            coords.push(clamp(e, 0.0, (self.size[d] - 1) as f32));
        }

        // strides: innermost axis is the last input component
        let mut strides = vec![0usize; n_in];
        let mut acc = n_out;
        for d in (0..n_in).rev() {
            strides[d] = acc;
            acc *= self.size[d] as usize;
        }

        let mut out = vec![0.0f32; n_out];
        let corners = 1usize << n_in;
        for corner in 0..corners {
            let mut weight = 1.0f32;
            let mut offset = 0usize;
            let mut in_range = true;
            for d in 0..n_in {
                let i0 = coords[d].floor();
                let frac = coords[d] - i0;
                let bit = (corner >> d) & 1;
                let idx = i0 as i64 + bit as i64;
                if idx < 0 || idx >= self.size[d] as i64 {
                    in_range = false;
                    break;
                }
                weight *= if bit == 1 { frac } else { 1.0 - frac };
                offset += idx as usize * strides[d];
            }
            if !in_range || weight == 0.0 {
                continue;
            }
            for c in 0..n_out {
                out[c] += weight * self.samples.get(offset + c).copied().unwrap_or(0.0);
            }
        }

        // decode back to the output range
        for c in 0..n_out {
            let v = interpolate(out[c], 0.0, 1.0, self.decode[2 * c], self.decode[2 * c + 1]);
            out[c] = clamp(v, self.range[2 * c], self.range[2 * c + 1]);
        }
        out
    }
}

impl ExponentialFunction {
    fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let x = clamp(inputs.first().copied().unwrap_or(0.0), 0.0, 1.0);
        let n = self.c0.len().max(self.c1.len());
        let mut out = Vec::with_capacity(n);
        let xn = x.powf(self.n);
        for i in 0..n {
            let c0 = self.c0.get(i).copied().unwrap_or(0.0);
            let c1 = self.c1.get(i).copied().unwrap_or(1.0);
            out.push(c0 + xn * (c1 - c0));
        }
        out
    }
}

impl StitchingFunction {
    fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let d0 = self.domain[0];
        let d1 = self.domain[1];
        let x = clamp(inputs.first().copied().unwrap_or(0.0), d0, d1);
        let k = self.functions.len();
        if k == 0 {
            return Vec::new();
        }

        // find the subdomain: x in [bounds[i-1], bounds[i])
        let mut idx = 0;
        while idx < self.bounds.len() && x >= self.bounds[idx] {
            idx += 1;
        }
        let idx = idx.min(k - 1);

        let low = if idx == 0 { d0 } else { self.bounds[idx - 1] };
        let high = if idx == self.bounds.len() { d1 } else { self.bounds[idx] };
        let e0 = self.encode.get(2 * idx).copied().unwrap_or(0.0);
        let e1 = self.encode.get(2 * idx + 1).copied().unwrap_or(1.0);
        let encoded = interpolate(x, low, high, e0, e1);
        self.functions[idx].eval(&[encoded])
    }
}

impl PostScriptFunction {
    fn eval(&self, inputs: &[f32]) -> Vec<f32> {
        let n_in = self.domain.len() / 2;
        let mut stack: Vec<f32> = Vec::with_capacity(32);
        for d in 0..n_in {
            stack.push(clamp(
                inputs.get(d).copied().unwrap_or(0.0),
                self.domain[2 * d],
                self.domain[2 * d + 1],
            ));
        }
        if exec_ps(&self.program, &mut stack).is_err() {
            log::warn!("PostScript function aborted, returning zeros");
            stack.clear();
        }

        let n_out = self.range.len() / 2;
        let mut out = vec![0.0f32; n_out];
        // outputs are the top n_out stack entries, bottom first
        let start = stack.len().saturating_sub(n_out);
        for (c, v) in stack[start..].iter().enumerate() {
            out[c] = clamp(*v, self.range[2 * c], self.range[2 * c + 1]);
        }
        out
    }
}

fn exec_ps(program: &[PsOp], stack: &mut Vec<f32>) -> Result<(), ()> {
    let mut blocks: Vec<&Vec<PsOp>> = Vec::new();
    for op in program {
        match op {
            PsOp::Num(v) => stack.push(*v),
            PsOp::Block(b) => blocks.push(b),
            PsOp::Op(name) => exec_ps_op(name, stack, &mut blocks)?,
        }
    }
    Ok(())
}

fn pop(stack: &mut Vec<f32>) -> Result<f32, ()> {
    stack.pop().ok_or(())
}

fn exec_ps_op<'a>(
    name: &str,
    stack: &mut Vec<f32>,
    blocks: &mut Vec<&'a Vec<PsOp>>,
) -> Result<(), ()> {
    match name {
        "add" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(a + b);
        }
        "sub" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(a - b);
        }
        "mul" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(a * b);
        }
        "div" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(if b == 0.0 { 0.0 } else { a / b });
        }
        "idiv" => {
            let (b, a) = (pop(stack)? as i64, pop(stack)? as i64);
            stack.push(if b == 0 { 0.0 } else { (a / b) as f32 });
        }
        "mod" => {
            let (b, a) = (pop(stack)? as i64, pop(stack)? as i64);
            stack.push(if b == 0 { 0.0 } else { (a % b) as f32 });
        }
        "neg" => {
            let a = pop(stack)?;
            stack.push(-a);
        }
        "abs" => {
            let a = pop(stack)?;
            stack.push(a.abs());
        }
        "ceiling" => {
            let a = pop(stack)?;
            stack.push(a.ceil());
        }
        "floor" => {
            let a = pop(stack)?;
            stack.push(a.floor());
        }
        "round" => {
            let a = pop(stack)?;
            stack.push(a.round());
        }
        "truncate" => {
            let a = pop(stack)?;
            stack.push(a.trunc());
        }
        "sqrt" => {
            let a = pop(stack)?;
            stack.push(a.max(0.0).sqrt());
        }
        "sin" => {
            let a = pop(stack)?;
            stack.push(a.to_radians().sin());
        }
        "cos" => {
            let a = pop(stack)?;
            stack.push(a.to_radians().cos());
        }
        "atan" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            let mut deg = a.atan2(b).to_degrees();
            if deg < 0.0 {
                deg += 360.0;
            }
            stack.push(deg);
        }
        "exp" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(a.powf(b));
        }
        "ln" => {
            let a = pop(stack)?;
            stack.push(if a > 0.0 { a.ln() } else { 0.0 });
        }
        "log" => {
            let a = pop(stack)?;
            stack.push(if a > 0.0 { a.log10() } else { 0.0 });
        }
        "cvi" => {
            let a = pop(stack)?;
            stack.push(a.trunc());
        }
        "cvr" => {}
        "eq" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a == b));
        }
        "ne" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a != b));
        }
        "gt" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a > b));
        }
        "ge" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a >= b));
        }
        "lt" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a < b));
        }
        "le" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(bool_val(a <= b));
        }
        "and" => {
            let (b, a) = (pop(stack)? as i64, pop(stack)? as i64);
            stack.push((a & b) as f32);
        }
        "or" => {
            let (b, a) = (pop(stack)? as i64, pop(stack)? as i64);
            stack.push((a | b) as f32);
        }
        "xor" => {
            let (b, a) = (pop(stack)? as i64, pop(stack)? as i64);
            stack.push((a ^ b) as f32);
        }
        "not" => {
            let a = pop(stack)?;
            // logical on booleans, bitwise on integers
            if a == 0.0 || a == 1.0 {
                stack.push(bool_val(a == 0.0));
            } else {
                stack.push(!(a as i64) as f32);
            }
        }
        "bitshift" => {
            let (shift, a) = (pop(stack)? as i64, pop(stack)? as i64);
            let v = if shift >= 0 { a << shift } else { a >> (-shift) };
            stack.push(v as f32);
        }
        "true" => stack.push(1.0),
        "false" => stack.push(0.0),
        "pop" => {
            pop(stack)?;
        }
        "exch" => {
            let (b, a) = (pop(stack)?, pop(stack)?);
            stack.push(b);
            stack.push(a);
        }
        "dup" => {
            let a = *stack.last().ok_or(())?;
            stack.push(a);
        }
        "copy" => {
            let n = pop(stack)? as usize;
            let len = stack.len();
            if n > len {
                return Err(());
            }
            for i in 0..n {
                stack.push(stack[len - n + i]);
            }
        }
        "index" => {
            let n = pop(stack)? as usize;
            let len = stack.len();
            if n >= len {
                return Err(());
            }
            stack.push(stack[len - 1 - n]);
        }
        "roll" => {
            let j = pop(stack)? as i64;
            let n = pop(stack)? as usize;
            let len = stack.len();
            if n > len || n == 0 {
                return if n == 0 { Ok(()) } else { Err(()) };
            }
            let window = &mut stack[len - n..];
            let j = j.rem_euclid(n as i64) as usize;
            window.rotate_right(j);
        }
        "if" => {
            let proc1 = blocks.pop().ok_or(())?;
            let cond = pop(stack)?;
            if cond != 0.0 {
                exec_ps(proc1, stack)?;
            }
        }
        "ifelse" => {
            let proc2 = blocks.pop().ok_or(())?;
            let proc1 = blocks.pop().ok_or(())?;
            let cond = pop(stack)?;
            if cond != 0.0 {
                exec_ps(proc1, stack)?;
            } else {
                exec_ps(proc2, stack)?;
            }
        }
        _ => return Err(()),
    }
    Ok(())
}

fn bool_val(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

const PS_OPERATORS: &[&str] = &[
    "add", "sub", "mul", "div", "idiv", "mod", "neg", "abs", "ceiling", "floor", "round",
    "truncate", "sqrt", "sin", "cos", "atan", "exp", "ln", "log", "cvi", "cvr", "eq", "ne", "gt",
    "ge", "lt", "le", "and", "or", "xor", "not", "bitshift", "true", "false", "pop", "exch",
    "dup", "copy", "index", "roll", "if", "ifelse",
];

fn parse_postscript(text: &str) -> Result<Vec<PsOp>, String> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        match ch {
            '{' | '}' => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        tokens.push(cur);
    }

    let mut iter = tokens.iter().map(|s| s.as_str());
    match iter.next() {
        Some("{") => {}
        _ => return Err("calculator program must start with '{'".to_string()),
    }
    let (ops, rest) = parse_ps_block(&tokens[1..])?;
    if !rest.is_empty() {
        return Err("trailing tokens after calculator program".to_string());
    }
    Ok(ops)
}

fn parse_ps_block<'a>(mut tokens: &'a [String]) -> Result<(Vec<PsOp>, &'a [String]), String> {
    let mut ops = Vec::new();
    while let Some((tok, rest)) = tokens.split_first() {
        tokens = rest;
        match tok.as_str() {
            "}" => return Ok((ops, tokens)),
            "{" => {
                let (inner, rest) = parse_ps_block(tokens)?;
                tokens = rest;
                ops.push(PsOp::Block(inner));
            }
            t => {
                if let Ok(num) = t.parse::<f32>() {
                    ops.push(PsOp::Num(num));
                } else if let Some(known) = PS_OPERATORS.iter().find(|o| **o == t) {
                    ops.push(PsOp::Op(*known));
                } else {
                    return Err(format!("unknown calculator operator '{t}'"));
                }
            }
        }
    }
    Err("unterminated calculator block".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_reader_crosses_byte_boundaries() {
        let data = [0b1011_0110, 0b0100_0000];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(3), Some(0b101));
        assert_eq!(r.read(6), Some(0b101_100));
        assert_eq!(r.read(3), Some(0b100));
    }

    #[test]
    fn exponential_midpoint() {
        let f = ExponentialFunction {
            domain: vec![0.0, 1.0],
            c0: vec![1.0, 0.0, 0.0],
            c1: vec![0.0, 0.0, 1.0],
            n: 1.0,
        };
        let out = f.eval(&[0.5]);
        assert_eq!(out, vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn stitching_selects_subdomain() {
        let child = |c0: f32, c1: f32| {
            PdfFunction::Exponential(ExponentialFunction {
                domain: vec![0.0, 1.0],
                c0: vec![c0],
                c1: vec![c1],
                n: 1.0,
            })
        };
        let f = StitchingFunction {
            domain: vec![0.0, 1.0],
            functions: vec![child(0.0, 1.0), child(10.0, 11.0)],
            bounds: vec![0.5],
            encode: vec![0.0, 1.0, 0.0, 1.0],
        };
        assert_eq!(f.eval(&[0.25]), vec![0.5]);
        assert_eq!(f.eval(&[0.75]), vec![10.5]);
    }

    #[test]
    fn postscript_roll_and_ifelse() {
        let program = parse_postscript("{ 2 copy lt { pop } { exch pop } ifelse }").unwrap();
        let mut stack = vec![3.0, 7.0];
        exec_ps(&program, &mut stack).unwrap();
        // keeps the smaller of the two
        assert_eq!(stack, vec![3.0]);
    }

    #[test]
    fn sampled_grid_point_is_exact() {
        // 2-point 1D ramp, 8 bits: samples 0 and 255 decode to 0 and 1
        let f = SampledFunction {
            domain: vec![0.0, 1.0],
            range: vec![0.0, 1.0],
            size: vec![2],
            bits_per_sample: 8,
            encode: vec![0.0, 1.0],
            decode: vec![0.0, 1.0],
            samples: vec![0.0, 1.0],
        };
        assert_eq!(f.eval(&[0.0]), vec![0.0]);
        assert_eq!(f.eval(&[1.0]), vec![1.0]);
        assert!((f.eval(&[0.5])[0] - 0.5).abs() < 1e-6);
    }
}
