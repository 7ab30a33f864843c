//! CMap parsing and lookup.
//!
//! A CMap serves two roles: an *encoding* CMap maps character codes to CIDs
//! for composite fonts, a *ToUnicode* CMap maps character codes to Unicode
//! text. Both share the same stream syntax (`begincodespacerange`,
//! `begincidrange`, `beginbfchar`, ...) and both are immutable after parse.

use std::collections::BTreeMap;

use crate::encoding::unicode_for_glyph_name;

/// An inclusive code-space range; `byte_len` is the code width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodespaceRange {
    pub low: u32,
    pub high: u32,
    pub byte_len: u8,
}

impl CodespaceRange {
    fn contains(&self, value: u32, len: u8) -> bool {
        self.byte_len == len && value >= self.low && value <= self.high
    }
}

/// A length-aware character code: up to 4 bytes, compared by bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharCode {
    pub value: u32,
    pub byte_len: u8,
}

impl CharCode {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut value = 0u32;
        for b in bytes.iter().take(4) {
            value = (value << 8) | *b as u32;
        }
        CharCode { value, byte_len: bytes.len().min(4) as u8 }
    }

    pub fn one_byte(b: u8) -> Self {
        CharCode { value: b as u32, byte_len: 1 }
    }

    /// True for the single-byte space code that word spacing applies to.
    pub fn is_word_break(&self) -> bool {
        self.byte_len == 1 && self.value == 0x20
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cmap {
    pub name: Option<String>,
    pub vertical: bool,
    /// Identity mapping: CID = big-endian code value (Identity-H/V).
    identity: bool,
    codespaces: Vec<CodespaceRange>,
    cids: BTreeMap<(u8, u32), u32>,
    unicode: BTreeMap<(u8, u32), String>,
    max_code_len: u8,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Name(String),
    Number(f64),
    ArrayStart,
    ArrayEnd,
    Op(String),
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && data[end] != b'>' {
                    end += 1;
                }
                let hex: Vec<u8> = data[start..end]
                    .iter()
                    .copied()
                    .filter(|c| c.is_ascii_hexdigit())
                    .collect();
                let mut bytes = Vec::with_capacity(hex.len() / 2 + 1);
                let mut chunk = hex.chunks_exact(2);
                for pair in chunk.by_ref() {
                    let s = std::str::from_utf8(pair).unwrap_or("00");
                    bytes.push(u8::from_str_radix(s, 16).unwrap_or(0));
                }
                if let [odd] = chunk.remainder() {
                    // trailing odd digit is padded with zero, as in strings
                    let s = (*odd as char).to_digit(16).unwrap_or(0) as u8;
                    bytes.push(s << 4);
                }
                tokens.push(Token::Hex(bytes));
                i = end + 1;
            }
            b'/' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && !is_delim(data[end]) {
                    end += 1;
                }
                tokens.push(Token::Name(
                    String::from_utf8_lossy(&data[start..end]).to_string(),
                ));
                i = end;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                let mut end = i;
                while end < data.len() && !is_delim(data[end]) {
                    end += 1;
                }
                let word = String::from_utf8_lossy(&data[start..end]).to_string();
                if let Ok(num) = word.parse::<f64>() {
                    tokens.push(Token::Number(num));
                } else {
                    tokens.push(Token::Op(word));
                }
                i = end.max(start + 1);
            }
        }
    }
    tokens
}

fn is_delim(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'<' | b'>' | b'[' | b']' | b'/' | b'(' | b')' | b'%')
}

fn code_of(bytes: &[u8]) -> (u8, u32) {
    let code = CharCode::from_bytes(bytes);
    (code.byte_len, code.value)
}

fn utf16_be_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    if units.is_empty() && bytes.len() == 1 {
        // single-byte destination: treat as Latin-1
        return (bytes[0] as char).to_string();
    }
    String::from_utf16_lossy(&units)
}

impl Cmap {
    /// Parses a CMap program from decoded stream bytes.
    pub fn parse(data: &[u8]) -> Result<Cmap, String> {
        let tokens = tokenize(data);
        let mut cmap = Cmap::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Op(op) => match op.as_str() {
                    "begincodespacerange" => {
                        i += 1;
                        while i + 1 < tokens.len() {
                            match (&tokens[i], &tokens[i + 1]) {
                                (Token::Hex(lo), Token::Hex(hi)) => {
                                    let (len, low) = code_of(lo);
                                    let (_, high) = code_of(hi);
                                    cmap.codespaces.push(CodespaceRange {
                                        low,
                                        high,
                                        byte_len: len,
                                    });
                                    i += 2;
                                }
                                _ => break,
                            }
                        }
                        i = skip_to_end(&tokens, i, "endcodespacerange");
                    }
                    "begincidchar" => {
                        i += 1;
                        while i + 1 < tokens.len() {
                            match (&tokens[i], &tokens[i + 1]) {
                                (Token::Hex(code), Token::Number(cid)) => {
                                    cmap.cids.insert(code_of(code), *cid as u32);
                                    i += 2;
                                }
                                _ => break,
                            }
                        }
                        i = skip_to_end(&tokens, i, "endcidchar");
                    }
                    "begincidrange" => {
                        i += 1;
                        while i + 2 < tokens.len() {
                            match (&tokens[i], &tokens[i + 1], &tokens[i + 2]) {
                                (Token::Hex(lo), Token::Hex(hi), Token::Number(cid)) => {
                                    let (len, low) = code_of(lo);
                                    let (_, high) = code_of(hi);
                                    let base = *cid as u32;
                                    for (offset, v) in (low..=high.min(low + 0xFFFF)).enumerate() {
                                        cmap.cids.insert((len, v), base + offset as u32);
                                    }
                                    i += 3;
                                }
                                _ => break,
                            }
                        }
                        i = skip_to_end(&tokens, i, "endcidrange");
                    }
                    "beginbfchar" => {
                        i += 1;
                        while i + 1 < tokens.len() {
                            match (&tokens[i], &tokens[i + 1]) {
                                (Token::Hex(code), Token::Hex(dst)) => {
                                    cmap.unicode.insert(code_of(code), utf16_be_to_string(dst));
                                    i += 2;
                                }
                                (Token::Hex(code), Token::Name(name)) => {
                                    if let Some(s) = unicode_for_glyph_name(name) {
                                        cmap.unicode.insert(code_of(code), s);
                                    }
                                    i += 2;
                                }
                                _ => break,
                            }
                        }
                        i = skip_to_end(&tokens, i, "endbfchar");
                    }
                    "beginbfrange" => {
                        i += 1;
                        loop {
                            let (lo, hi) = match (tokens.get(i), tokens.get(i + 1)) {
                                (Some(Token::Hex(lo)), Some(Token::Hex(hi))) => {
                                    (lo.clone(), hi.clone())
                                }
                                _ => break,
                            };
                            let (len, low) = code_of(&lo);
                            let (_, high) = code_of(&hi);
                            match tokens.get(i + 2) {
                                Some(Token::Hex(dst)) => {
                                    // incrementing destination: bump the last
                                    // UTF-16 unit per step
                                    let base = utf16_be_to_string(dst);
                                    let mut units: Vec<u16> = base.encode_utf16().collect();
                                    for v in low..=high.min(low + 0xFFFF) {
                                        cmap.unicode
                                            .insert((len, v), String::from_utf16_lossy(&units));
                                        if let Some(last) = units.last_mut() {
                                            *last = last.wrapping_add(1);
                                        }
                                    }
                                    i += 3;
                                }
                                Some(Token::ArrayStart) => {
                                    let mut j = i + 3;
                                    let mut v = low;
                                    while let Some(tok) = tokens.get(j) {
                                        match tok {
                                            Token::Hex(dst) => {
                                                if v <= high {
                                                    cmap.unicode.insert(
                                                        (len, v),
                                                        utf16_be_to_string(dst),
                                                    );
                                                    v += 1;
                                                }
                                                j += 1;
                                            }
                                            Token::ArrayEnd => {
                                                j += 1;
                                                break;
                                            }
                                            _ => break,
                                        }
                                    }
                                    i = j;
                                }
                                _ => break,
                            }
                        }
                        i = skip_to_end(&tokens, i, "endbfrange");
                    }
                    "usecmap" => {
                        log::info!("usecmap is not resolved; partial CMap");
                        i += 1;
                    }
                    "def" => {
                        // /CMapName /X def, /WMode 1 def
                        i += 1;
                    }
                    _ => i += 1,
                },
                Token::Name(name) => {
                    match name.as_str() {
                        "CMapName" => {
                            if let Some(Token::Name(v)) = tokens.get(i + 1) {
                                cmap.name = Some(v.clone());
                                i += 1;
                            }
                        }
                        "WMode" => {
                            if let Some(Token::Number(v)) = tokens.get(i + 1) {
                                cmap.vertical = *v as i64 == 1;
                                i += 1;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        cmap.max_code_len = cmap
            .codespaces
            .iter()
            .map(|r| r.byte_len)
            .chain(cmap.cids.keys().map(|(l, _)| *l))
            .chain(cmap.unicode.keys().map(|(l, _)| *l))
            .max()
            .unwrap_or(0);
        Ok(cmap)
    }

    /// Identity-H / Identity-V: two-byte codes, CID = code value.
    pub fn identity(vertical: bool) -> Cmap {
        Cmap {
            name: Some(if vertical { "Identity-V" } else { "Identity-H" }.to_string()),
            vertical,
            identity: true,
            codespaces: vec![CodespaceRange { low: 0, high: 0xFFFF, byte_len: 2 }],
            cids: BTreeMap::new(),
            unicode: BTreeMap::new(),
            max_code_len: 2,
        }
    }

    /// The predefined CMaps this crate knows the *code width* of. The
    /// UTF-16 family segments two bytes at a time; CID tables for the
    /// non-identity names are not bundled, so their codes stay unmapped.
    pub fn predefined(name: &str) -> Option<Cmap> {
        match name {
            "Identity-H" => Some(Cmap::identity(false)),
            "Identity-V" => Some(Cmap::identity(true)),
            "UniJIS-UTF16-H" | "UniGB-UTF16-H" | "UniCNS-UTF16-H" | "UniKS-UTF16-H"
            | "UniJIS-UTF16-V" | "UniGB-UTF16-V" | "UniCNS-UTF16-V" | "UniKS-UTF16-V" => {
                let vertical = name.ends_with("-V");
                Some(Cmap {
                    name: Some(name.to_string()),
                    vertical,
                    identity: false,
                    codespaces: vec![CodespaceRange { low: 0, high: 0xFFFF, byte_len: 2 }],
                    cids: BTreeMap::new(),
                    unicode: BTreeMap::new(),
                    max_code_len: 2,
                })
            }
            _ => None,
        }
    }

    pub fn has_codespaces(&self) -> bool {
        !self.codespaces.is_empty()
    }

    pub fn max_code_len(&self) -> u8 {
        self.max_code_len
    }

    /// Longest matching prefix of `bytes[pos..]` within the code-space
    /// ranges; 1 byte when nothing matches.
    pub fn next_code(&self, bytes: &[u8], pos: usize) -> CharCode {
        let remaining = bytes.len() - pos;
        let mut best: Option<CharCode> = None;
        let max = (self.max_code_len.max(1) as usize).min(4).min(remaining);
        for len in 1..=max {
            let code = CharCode::from_bytes(&bytes[pos..pos + len]);
            if self
                .codespaces
                .iter()
                .any(|r| r.contains(code.value, code.byte_len))
            {
                best = Some(code);
            }
        }
        best.unwrap_or_else(|| CharCode::one_byte(bytes[pos]))
    }

    pub fn cid_for(&self, code: CharCode) -> Option<u32> {
        if self.identity {
            return Some(code.value);
        }
        self.cids.get(&(code.byte_len, code.value)).copied()
    }

    pub fn unicode_for(&self, code: CharCode) -> Option<&str> {
        self.unicode
            .get(&(code.byte_len, code.value))
            .map(|s| s.as_str())
    }
}

fn skip_to_end(tokens: &[Token], mut i: usize, end: &str) -> usize {
    while i < tokens.len() {
        if let Token::Op(op) = &tokens[i] {
            if op == end {
                return i + 1;
            }
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TO_UNICODE: &[u8] = br#"
/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0041> <0041>
<0042> <00480065006C006C006F>
endbfchar
1 beginbfrange
<0061> <0063> <0061>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
"#;

    #[test]
    fn parse_to_unicode() {
        let cmap = Cmap::parse(TO_UNICODE).unwrap();
        assert!(cmap.has_codespaces());
        assert_eq!(cmap.max_code_len(), 2);
        let code = |v: u32| CharCode { value: v, byte_len: 2 };
        assert_eq!(cmap.unicode_for(code(0x41)), Some("A"));
        assert_eq!(cmap.unicode_for(code(0x42)), Some("Hello"));
        assert_eq!(cmap.unicode_for(code(0x62)), Some("b"));
    }

    #[test]
    fn identity_cid_is_code_value() {
        let cmap = Cmap::identity(false);
        let code = CharCode::from_bytes(&[0x01, 0x02]);
        assert_eq!(cmap.cid_for(code), Some(258));
        let code = CharCode::from_bytes(&[0x00, 0x41]);
        assert_eq!(cmap.cid_for(code), Some(65));
    }

    #[test]
    fn longest_prefix_segmentation() {
        let mut cmap = Cmap::default();
        cmap.codespaces.push(CodespaceRange { low: 0x00, high: 0x7F, byte_len: 1 });
        cmap.codespaces.push(CodespaceRange { low: 0x8000, high: 0xFFFF, byte_len: 2 });
        cmap.max_code_len = 2;
        // 0x41 matches the 1-byte range; 0x80 0x01 the 2-byte range
        let c0 = cmap.next_code(&[0x41, 0x80, 0x01], 0);
        assert_eq!((c0.byte_len, c0.value), (1, 0x41));
        let c1 = cmap.next_code(&[0x41, 0x80, 0x01], 1);
        assert_eq!((c1.byte_len, c1.value), (2, 0x8001));
        // bytes outside every range consume one byte
        let c2 = cmap.next_code(&[0xFE], 0);
        assert_eq!((c2.byte_len, c2.value), (1, 0xFE));
    }

    #[test]
    fn cidrange_maps_consecutively() {
        let data = br#"
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 begincidrange
<0010> <0012> 5
endcidrange
"#;
        let cmap = Cmap::parse(data).unwrap();
        let code = |v: u32| CharCode { value: v, byte_len: 2 };
        assert_eq!(cmap.cid_for(code(0x10)), Some(5));
        assert_eq!(cmap.cid_for(code(0x12)), Some(7));
        assert_eq!(cmap.cid_for(code(0x13)), None);
    }
}
