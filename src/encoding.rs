//! Simple-font encodings: the base encoding tables of PDF Annex D and the
//! Adobe Glyph List subset used for ToUnicode fallback.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Base encoding selected by a simple font's `/Encoding` entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    #[default]
    Standard,
    WinAnsi,
    MacRoman,
    MacExpert,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            "MacExpertEncoding" => Some(BaseEncoding::MacExpert),
            _ => None,
        }
    }
}

/// The printable-ASCII block shared by Standard, WinAnsi and MacRoman.
/// Standard differs at 0x27 (quoteright) and 0x60 (quoteleft); that is
/// patched in below.
const ASCII_NAMES: &[(u8, &str)] = &[
    (32, "space"), (33, "exclam"), (34, "quotedbl"), (35, "numbersign"), (36, "dollar"),
    (37, "percent"), (38, "ampersand"), (39, "quotesingle"), (40, "parenleft"),
    (41, "parenright"), (42, "asterisk"), (43, "plus"), (44, "comma"), (45, "hyphen"),
    (46, "period"), (47, "slash"), (48, "zero"), (49, "one"), (50, "two"), (51, "three"),
    (52, "four"), (53, "five"), (54, "six"), (55, "seven"), (56, "eight"), (57, "nine"),
    (58, "colon"), (59, "semicolon"), (60, "less"), (61, "equal"), (62, "greater"),
    (63, "question"), (64, "at"), (65, "A"), (66, "B"), (67, "C"), (68, "D"), (69, "E"),
    (70, "F"), (71, "G"), (72, "H"), (73, "I"), (74, "J"), (75, "K"), (76, "L"), (77, "M"),
    (78, "N"), (79, "O"), (80, "P"), (81, "Q"), (82, "R"), (83, "S"), (84, "T"), (85, "U"),
    (86, "V"), (87, "W"), (88, "X"), (89, "Y"), (90, "Z"), (91, "bracketleft"),
    (92, "backslash"), (93, "bracketright"), (94, "asciicircum"), (95, "underscore"),
    (96, "grave"), (97, "a"), (98, "b"), (99, "c"), (100, "d"), (101, "e"), (102, "f"),
    (103, "g"), (104, "h"), (105, "i"), (106, "j"), (107, "k"), (108, "l"), (109, "m"),
    (110, "n"), (111, "o"), (112, "p"), (113, "q"), (114, "r"), (115, "s"), (116, "t"),
    (117, "u"), (118, "v"), (119, "w"), (120, "x"), (121, "y"), (122, "z"),
    (123, "braceleft"), (124, "bar"), (125, "braceright"), (126, "asciitilde"),
];

const STANDARD_HIGH: &[(u8, &str)] = &[
    (39, "quoteright"), (96, "quoteleft"),
    (161, "exclamdown"), (162, "cent"), (163, "sterling"), (164, "fraction"), (165, "yen"),
    (166, "florin"), (167, "section"), (168, "currency"), (169, "quotesingle"),
    (170, "quotedblleft"), (171, "guillemotleft"), (172, "guilsinglleft"),
    (173, "guilsinglright"), (174, "fi"), (175, "fl"), (177, "endash"), (178, "dagger"),
    (179, "daggerdbl"), (180, "periodcentered"), (182, "paragraph"), (183, "bullet"),
    (184, "quotesinglbase"), (185, "quotedblbase"), (186, "quotedblright"),
    (187, "guillemotright"), (188, "ellipsis"), (189, "perthousand"), (191, "questiondown"),
    (193, "grave"), (194, "acute"), (195, "circumflex"), (196, "tilde"), (197, "macron"),
    (198, "breve"), (199, "dotaccent"), (200, "dieresis"), (202, "ring"), (203, "cedilla"),
    (205, "hungarumlaut"), (206, "ogonek"), (207, "caron"), (208, "emdash"), (225, "AE"),
    (227, "ordfeminine"), (232, "Lslash"), (233, "Oslash"), (234, "OE"),
    (235, "ordmasculine"), (241, "ae"), (245, "dotlessi"), (248, "lslash"), (249, "oslash"),
    (250, "oe"), (251, "germandbls"),
];

const WIN_ANSI_HIGH: &[(u8, &str)] = &[
    (128, "Euro"), (130, "quotesinglbase"), (131, "florin"), (132, "quotedblbase"),
    (133, "ellipsis"), (134, "dagger"), (135, "daggerdbl"), (136, "circumflex"),
    (137, "perthousand"), (138, "Scaron"), (139, "guilsinglleft"), (140, "OE"),
    (142, "Zcaron"), (145, "quoteleft"), (146, "quoteright"), (147, "quotedblleft"),
    (148, "quotedblright"), (149, "bullet"), (150, "endash"), (151, "emdash"),
    (152, "tilde"), (153, "trademark"), (154, "scaron"), (155, "guilsinglright"),
    (156, "oe"), (158, "zcaron"), (159, "Ydieresis"), (160, "space"), (161, "exclamdown"),
    (162, "cent"), (163, "sterling"), (164, "currency"), (165, "yen"), (166, "brokenbar"),
    (167, "section"), (168, "dieresis"), (169, "copyright"), (170, "ordfeminine"),
    (171, "guillemotleft"), (172, "logicalnot"), (173, "hyphen"), (174, "registered"),
    (175, "macron"), (176, "degree"), (177, "plusminus"), (178, "twosuperior"),
    (179, "threesuperior"), (180, "acute"), (181, "mu"), (182, "paragraph"),
    (183, "periodcentered"), (184, "cedilla"), (185, "onesuperior"), (186, "ordmasculine"),
    (187, "guillemotright"), (188, "onequarter"), (189, "onehalf"), (190, "threequarters"),
    (191, "questiondown"), (192, "Agrave"), (193, "Aacute"), (194, "Acircumflex"),
    (195, "Atilde"), (196, "Adieresis"), (197, "Aring"), (198, "AE"), (199, "Ccedilla"),
    (200, "Egrave"), (201, "Eacute"), (202, "Ecircumflex"), (203, "Edieresis"),
    (204, "Igrave"), (205, "Iacute"), (206, "Icircumflex"), (207, "Idieresis"),
    (208, "Eth"), (209, "Ntilde"), (210, "Ograve"), (211, "Oacute"), (212, "Ocircumflex"),
    (213, "Otilde"), (214, "Odieresis"), (215, "multiply"), (216, "Oslash"),
    (217, "Ugrave"), (218, "Uacute"), (219, "Ucircumflex"), (220, "Udieresis"),
    (221, "Yacute"), (222, "Thorn"), (223, "germandbls"), (224, "agrave"), (225, "aacute"),
    (226, "acircumflex"), (227, "atilde"), (228, "adieresis"), (229, "aring"), (230, "ae"),
    (231, "ccedilla"), (232, "egrave"), (233, "eacute"), (234, "ecircumflex"),
    (235, "edieresis"), (236, "igrave"), (237, "iacute"), (238, "icircumflex"),
    (239, "idieresis"), (240, "eth"), (241, "ntilde"), (242, "ograve"), (243, "oacute"),
    (244, "ocircumflex"), (245, "otilde"), (246, "odieresis"), (247, "divide"),
    (248, "oslash"), (249, "ugrave"), (250, "uacute"), (251, "ucircumflex"),
    (252, "udieresis"), (253, "yacute"), (254, "thorn"), (255, "ydieresis"),
];

const MAC_ROMAN_HIGH: &[(u8, &str)] = &[
    (128, "Adieresis"), (129, "Aring"), (130, "Ccedilla"), (131, "Eacute"), (132, "Ntilde"),
    (133, "Odieresis"), (134, "Udieresis"), (135, "aacute"), (136, "agrave"),
    (137, "acircumflex"), (138, "adieresis"), (139, "atilde"), (140, "aring"),
    (141, "ccedilla"), (142, "eacute"), (143, "egrave"), (144, "ecircumflex"),
    (145, "edieresis"), (146, "iacute"), (147, "igrave"), (148, "icircumflex"),
    (149, "idieresis"), (150, "ntilde"), (151, "oacute"), (152, "ograve"),
    (153, "ocircumflex"), (154, "odieresis"), (155, "otilde"), (156, "uacute"),
    (157, "ugrave"), (158, "ucircumflex"), (159, "udieresis"), (160, "dagger"),
    (161, "degree"), (162, "cent"), (163, "sterling"), (164, "section"), (165, "bullet"),
    (166, "paragraph"), (167, "germandbls"), (168, "registered"), (169, "copyright"),
    (170, "trademark"), (171, "acute"), (172, "dieresis"), (173, "notequal"), (174, "AE"),
    (175, "Oslash"), (176, "infinity"), (177, "plusminus"), (178, "lessequal"),
    (179, "greaterequal"), (180, "yen"), (181, "mu"), (182, "partialdiff"),
    (183, "summation"), (184, "product"), (185, "pi"), (186, "integral"),
    (187, "ordfeminine"), (188, "ordmasculine"), (189, "Omega"), (190, "ae"),
    (191, "oslash"), (192, "questiondown"), (193, "exclamdown"), (194, "logicalnot"),
    (195, "radical"), (196, "florin"), (197, "approxequal"), (198, "Delta"),
    (199, "guillemotleft"), (200, "guillemotright"), (201, "ellipsis"), (202, "space"),
    (203, "Agrave"), (204, "Atilde"), (205, "Otilde"), (206, "OE"), (207, "oe"),
    (208, "endash"), (209, "emdash"), (210, "quotedblleft"), (211, "quotedblright"),
    (212, "quoteleft"), (213, "quoteright"), (214, "divide"), (215, "lozenge"),
    (216, "ydieresis"), (217, "Ydieresis"), (218, "fraction"), (219, "currency"),
    (220, "guilsinglleft"), (221, "guilsinglright"), (222, "fi"), (223, "fl"),
    (224, "daggerdbl"), (225, "periodcentered"), (226, "quotesinglbase"),
    (227, "quotedblbase"), (228, "perthousand"), (229, "Acircumflex"),
    (230, "Ecircumflex"), (231, "Aacute"), (232, "Edieresis"), (233, "Egrave"),
    (234, "Iacute"), (235, "Icircumflex"), (236, "Idieresis"), (237, "Igrave"),
    (238, "Oacute"), (239, "Ocircumflex"), (240, "apple"), (241, "Ograve"), (242, "Uacute"),
    (243, "Ucircumflex"), (244, "Ugrave"), (245, "dotlessi"), (246, "circumflex"),
    (247, "tilde"), (248, "macron"), (249, "breve"), (250, "dotaccent"), (251, "ring"),
    (252, "cedilla"), (253, "hungarumlaut"), (254, "ogonek"), (255, "caron"),
];

fn build_table(overrides: &[(u8, &'static str)]) -> [&'static str; 256] {
    let mut table = [""; 256];
    for (code, name) in ASCII_NAMES {
        table[*code as usize] = name;
    }
    for (code, name) in overrides {
        table[*code as usize] = name;
    }
    table
}

static STANDARD_TABLE: Lazy<[&'static str; 256]> = Lazy::new(|| build_table(STANDARD_HIGH));
static WIN_ANSI_TABLE: Lazy<[&'static str; 256]> = Lazy::new(|| build_table(WIN_ANSI_HIGH));
static MAC_ROMAN_TABLE: Lazy<[&'static str; 256]> = Lazy::new(|| build_table(MAC_ROMAN_HIGH));

/// The glyph name a base encoding assigns to `code`, if any.
pub fn standard_glyph_name(encoding: BaseEncoding, code: u8) -> Option<&'static str> {
    let table = match encoding {
        BaseEncoding::Standard => &*STANDARD_TABLE,
        BaseEncoding::WinAnsi => &*WIN_ANSI_TABLE,
        BaseEncoding::MacRoman => &*MAC_ROMAN_TABLE,
        // expert sets are symbolic; no useful unicode mapping
        BaseEncoding::MacExpert => return None,
    };
    let name = table[code as usize];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Adobe Glyph List subset: every name the base encoding tables can produce,
/// plus a few common extras seen in `/Differences` arrays.
const AGL_PAIRS: &[(&str, char)] = &[
    ("A", 'A'), ("AE", 'Æ'), ("Aacute", 'Á'), ("Acircumflex", 'Â'), ("Adieresis", 'Ä'),
    ("Agrave", 'À'), ("Aring", 'Å'), ("Atilde", 'Ã'), ("B", 'B'), ("C", 'C'),
    ("Ccedilla", 'Ç'), ("D", 'D'), ("Delta", 'Δ'), ("E", 'E'), ("Eacute", 'É'),
    ("Ecircumflex", 'Ê'), ("Edieresis", 'Ë'), ("Egrave", 'È'), ("Eth", 'Ð'),
    ("Euro", '€'), ("F", 'F'), ("G", 'G'), ("H", 'H'), ("I", 'I'), ("Iacute", 'Í'),
    ("Icircumflex", 'Î'), ("Idieresis", 'Ï'), ("Igrave", 'Ì'), ("J", 'J'), ("K", 'K'),
    ("L", 'L'), ("Lslash", 'Ł'), ("M", 'M'), ("N", 'N'), ("Ntilde", 'Ñ'), ("O", 'O'),
    ("OE", 'Œ'), ("Oacute", 'Ó'), ("Ocircumflex", 'Ô'), ("Odieresis", 'Ö'),
    ("Ograve", 'Ò'), ("Omega", 'Ω'), ("Oslash", 'Ø'), ("Otilde", 'Õ'), ("P", 'P'),
    ("Q", 'Q'), ("R", 'R'), ("S", 'S'), ("Scaron", 'Š'), ("T", 'T'), ("Thorn", 'Þ'),
    ("U", 'U'), ("Uacute", 'Ú'), ("Ucircumflex", 'Û'), ("Udieresis", 'Ü'),
    ("Ugrave", 'Ù'), ("V", 'V'), ("W", 'W'), ("X", 'X'), ("Y", 'Y'), ("Yacute", 'Ý'),
    ("Ydieresis", 'Ÿ'), ("Z", 'Z'), ("Zcaron", 'Ž'), ("a", 'a'), ("aacute", 'á'),
    ("acircumflex", 'â'), ("acute", '´'), ("adieresis", 'ä'), ("ae", 'æ'),
    ("agrave", 'à'), ("ampersand", '&'), ("apple", '\u{f8ff}'), ("approxequal", '≈'),
    ("aring", 'å'), ("asciicircum", '^'), ("asciitilde", '~'), ("asterisk", '*'),
    ("at", '@'), ("atilde", 'ã'), ("b", 'b'), ("backslash", '\\'), ("bar", '|'),
    ("braceleft", '{'), ("braceright", '}'), ("bracketleft", '['), ("bracketright", ']'),
    ("breve", '˘'), ("brokenbar", '¦'), ("bullet", '•'), ("c", 'c'), ("caron", 'ˇ'),
    ("ccedilla", 'ç'), ("cedilla", '¸'), ("cent", '¢'), ("circumflex", 'ˆ'),
    ("colon", ':'), ("comma", ','), ("copyright", '©'), ("currency", '¤'), ("d", 'd'),
    ("dagger", '†'), ("daggerdbl", '‡'), ("degree", '°'), ("dieresis", '¨'),
    ("divide", '÷'), ("dollar", '$'), ("dotaccent", '˙'), ("dotlessi", 'ı'), ("e", 'e'),
    ("eacute", 'é'), ("ecircumflex", 'ê'), ("edieresis", 'ë'), ("egrave", 'è'),
    ("eight", '8'), ("ellipsis", '…'), ("emdash", '—'), ("endash", '–'), ("equal", '='),
    ("eth", 'ð'), ("exclam", '!'), ("exclamdown", '¡'), ("f", 'f'), ("fi", 'ﬁ'),
    ("five", '5'), ("fl", 'ﬂ'), ("florin", 'ƒ'), ("four", '4'), ("fraction", '⁄'),
    ("g", 'g'), ("germandbls", 'ß'), ("grave", '`'), ("greater", '>'),
    ("greaterequal", '≥'), ("guillemotleft", '«'), ("guillemotright", '»'),
    ("guilsinglleft", '‹'), ("guilsinglright", '›'), ("h", 'h'), ("hungarumlaut", '˝'),
    ("hyphen", '-'), ("i", 'i'), ("iacute", 'í'), ("icircumflex", 'î'),
    ("idieresis", 'ï'), ("igrave", 'ì'), ("infinity", '∞'), ("integral", '∫'),
    ("j", 'j'), ("k", 'k'), ("l", 'l'), ("less", '<'), ("lessequal", '≤'),
    ("logicalnot", '¬'), ("lozenge", '◊'), ("lslash", 'ł'), ("m", 'm'), ("macron", '¯'),
    ("minus", '−'), ("mu", 'µ'), ("multiply", '×'), ("n", 'n'), ("nine", '9'),
    ("notequal", '≠'), ("ntilde", 'ñ'), ("numbersign", '#'), ("o", 'o'), ("oacute", 'ó'),
    ("ocircumflex", 'ô'), ("odieresis", 'ö'), ("oe", 'œ'), ("ogonek", '˛'),
    ("ograve", 'ò'), ("one", '1'), ("onehalf", '½'), ("onequarter", '¼'),
    ("onesuperior", '¹'), ("ordfeminine", 'ª'), ("ordmasculine", 'º'), ("oslash", 'ø'),
    ("otilde", 'õ'), ("p", 'p'), ("paragraph", '¶'), ("parenleft", '('),
    ("parenright", ')'), ("partialdiff", '∂'), ("percent", '%'), ("period", '.'),
    ("periodcentered", '·'), ("perthousand", '‰'), ("pi", 'π'), ("plus", '+'),
    ("plusminus", '±'), ("product", '∏'), ("q", 'q'), ("question", '?'),
    ("questiondown", '¿'), ("quotedbl", '"'), ("quotedblbase", '„'),
    ("quotedblleft", '“'), ("quotedblright", '”'), ("quoteleft", '‘'),
    ("quoteright", '’'), ("quotesinglbase", '‚'), ("quotesingle", '\''), ("r", 'r'),
    ("radical", '√'), ("registered", '®'), ("ring", '˚'), ("s", 's'), ("scaron", 'š'),
    ("section", '§'), ("semicolon", ';'), ("seven", '7'), ("six", '6'), ("slash", '/'),
    ("space", ' '), ("sterling", '£'), ("summation", '∑'), ("t", 't'), ("thorn", 'þ'),
    ("three", '3'), ("threequarters", '¾'), ("threesuperior", '³'), ("tilde", '˜'),
    ("trademark", '™'), ("two", '2'), ("twosuperior", '²'), ("u", 'u'), ("uacute", 'ú'),
    ("ucircumflex", 'û'), ("udieresis", 'ü'), ("ugrave", 'ù'), ("underscore", '_'),
    ("v", 'v'), ("w", 'w'), ("x", 'x'), ("y", 'y'), ("yacute", 'ý'), ("ydieresis", 'ÿ'),
    ("yen", '¥'), ("z", 'z'), ("zcaron", 'ž'), ("zero", '0'),
];

static AGL: Lazy<HashMap<&'static str, char>> =
    Lazy::new(|| AGL_PAIRS.iter().copied().collect());

/// Resolves a glyph name to Unicode text: AGL lookup first, then the
/// `uniXXXX` / `uXXXX[XX]` conventions, then a retry with any `.suffix`
/// stripped (e.g. `a.sc`).
pub fn unicode_for_glyph_name(name: &str) -> Option<String> {
    if let Some(ch) = AGL.get(name) {
        return Some(ch.to_string());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 && hex.len() % 4 == 0 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let units: Vec<u16> = (0..hex.len() / 4)
                .filter_map(|i| u16::from_str_radix(&hex[i * 4..i * 4 + 4], 16).ok())
                .collect();
            let s = String::from_utf16_lossy(&units);
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(ch.to_string());
            }
        }
    }
    if let Some((stem, _)) = name.split_once('.') {
        if !stem.is_empty() && stem != name {
            return unicode_for_glyph_name(stem);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn win_ansi_euro_and_quotes() {
        assert_eq!(standard_glyph_name(BaseEncoding::WinAnsi, 0x80), Some("Euro"));
        assert_eq!(standard_glyph_name(BaseEncoding::WinAnsi, 0x27), Some("quotesingle"));
        assert_eq!(standard_glyph_name(BaseEncoding::Standard, 0x27), Some("quoteright"));
    }

    #[test]
    fn agl_resolution() {
        assert_eq!(unicode_for_glyph_name("Adieresis"), Some("Ä".to_string()));
        assert_eq!(unicode_for_glyph_name("uni0041"), Some("A".to_string()));
        assert_eq!(unicode_for_glyph_name("u1F600"), Some("😀".to_string()));
        assert_eq!(unicode_for_glyph_name("a.sc"), Some("a".to_string()));
        assert_eq!(unicode_for_glyph_name("glyph999"), None);
    }

    #[test]
    fn unmapped_codes_are_none() {
        assert_eq!(standard_glyph_name(BaseEncoding::Standard, 0x00), None);
        assert_eq!(standard_glyph_name(BaseEncoding::Standard, 0x90), None);
    }
}
