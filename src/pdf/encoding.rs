//! Simple-font base encodings and glyph-name resolution

use std::collections::HashMap;
use std::sync::LazyLock;

/// Named base encodings a simple font may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    pub(crate) fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"StandardEncoding" => Some(Self::Standard),
            b"WinAnsiEncoding" => Some(Self::WinAnsi),
            b"MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    /// Text for a single-byte code, `None` when the code is unassigned
    pub(crate) fn decode(self, code: u8) -> Option<String> {
        let text = match self {
            Self::WinAnsi => decode_single_byte(encoding_rs::WINDOWS_1252, code),
            Self::MacRoman => decode_single_byte(encoding_rs::MACINTOSH, code),
            Self::Standard => standard_encoding(code).map(String::from),
        }?;
        (!text.chars().any(char::is_control)).then_some(text)
    }
}

fn decode_single_byte(encoding: &'static encoding_rs::Encoding, code: u8) -> Option<String> {
    let bytes = [code];
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes);
    (!had_errors).then(|| text.into_owned())
}

/// Adobe StandardEncoding: ASCII with curly quotes, plus a sparse upper half
fn standard_encoding(code: u8) -> Option<char> {
    match code {
        0x27 => Some('\u{2019}'),
        0x60 => Some('\u{2018}'),
        0x20..=0x7e => Some(code as char),
        _ => STANDARD_UPPER
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ch)| *ch),
    }
}

const STANDARD_UPPER: &[(u8, char)] = &[
    (0xa1, '¡'),
    (0xa2, '¢'),
    (0xa3, '£'),
    (0xa4, '\u{2044}'),
    (0xa5, '¥'),
    (0xa6, 'ƒ'),
    (0xa7, '§'),
    (0xa8, '¤'),
    (0xa9, '\''),
    (0xaa, '\u{201c}'),
    (0xab, '«'),
    (0xac, '\u{2039}'),
    (0xad, '\u{203a}'),
    (0xae, '\u{fb01}'),
    (0xaf, '\u{fb02}'),
    (0xb1, '\u{2013}'),
    (0xb2, '\u{2020}'),
    (0xb3, '\u{2021}'),
    (0xb4, '·'),
    (0xb6, '¶'),
    (0xb7, '\u{2022}'),
    (0xb8, '\u{201a}'),
    (0xb9, '\u{201e}'),
    (0xba, '\u{201d}'),
    (0xbb, '»'),
    (0xbc, '\u{2026}'),
    (0xbd, '\u{2030}'),
    (0xbf, '¿'),
    (0xc1, '`'),
    (0xc2, '´'),
    (0xc3, 'ˆ'),
    (0xc4, '˜'),
    (0xc5, '¯'),
    (0xc6, '˘'),
    (0xc7, '˙'),
    (0xc8, '¨'),
    (0xca, '˚'),
    (0xcb, '¸'),
    (0xcd, '˝'),
    (0xce, '˛'),
    (0xcf, 'ˇ'),
    (0xd0, '\u{2014}'),
    (0xe1, 'Æ'),
    (0xe3, 'ª'),
    (0xe8, 'Ł'),
    (0xe9, 'Ø'),
    (0xea, 'Œ'),
    (0xeb, 'º'),
    (0xf1, 'æ'),
    (0xf5, 'ı'),
    (0xf8, 'ł'),
    (0xf9, 'ø'),
    (0xfa, 'œ'),
    (0xfb, 'ß'),
];

/// Adobe Glyph List entries seen in report fonts. Single ASCII letters are
/// resolved without a lookup.
static GLYPH_NAMES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("space", " "),
        ("nbspace", "\u{a0}"),
        ("exclam", "!"),
        ("quotedbl", "\""),
        ("numbersign", "#"),
        ("dollar", "$"),
        ("percent", "%"),
        ("ampersand", "&"),
        ("quotesingle", "'"),
        ("quoteright", "\u{2019}"),
        ("quoteleft", "\u{2018}"),
        ("parenleft", "("),
        ("parenright", ")"),
        ("asterisk", "*"),
        ("plus", "+"),
        ("comma", ","),
        ("hyphen", "-"),
        ("sfthyphen", "\u{ad}"),
        ("period", "."),
        ("slash", "/"),
        ("zero", "0"),
        ("one", "1"),
        ("two", "2"),
        ("three", "3"),
        ("four", "4"),
        ("five", "5"),
        ("six", "6"),
        ("seven", "7"),
        ("eight", "8"),
        ("nine", "9"),
        ("colon", ":"),
        ("semicolon", ";"),
        ("less", "<"),
        ("equal", "="),
        ("greater", ">"),
        ("question", "?"),
        ("at", "@"),
        ("bracketleft", "["),
        ("backslash", "\\"),
        ("bracketright", "]"),
        ("asciicircum", "^"),
        ("underscore", "_"),
        ("grave", "`"),
        ("braceleft", "{"),
        ("bar", "|"),
        ("braceright", "}"),
        ("asciitilde", "~"),
        ("exclamdown", "¡"),
        ("cent", "¢"),
        ("sterling", "£"),
        ("currency", "¤"),
        ("yen", "¥"),
        ("brokenbar", "¦"),
        ("section", "§"),
        ("dieresis", "¨"),
        ("copyright", "©"),
        ("ordfeminine", "ª"),
        ("guillemotleft", "«"),
        ("logicalnot", "¬"),
        ("registered", "®"),
        ("macron", "¯"),
        ("degree", "°"),
        ("plusminus", "±"),
        ("twosuperior", "²"),
        ("threesuperior", "³"),
        ("acute", "´"),
        ("mu", "µ"),
        ("paragraph", "¶"),
        ("periodcentered", "·"),
        ("cedilla", "¸"),
        ("onesuperior", "¹"),
        ("ordmasculine", "º"),
        ("guillemotright", "»"),
        ("onequarter", "¼"),
        ("onehalf", "½"),
        ("threequarters", "¾"),
        ("questiondown", "¿"),
        ("Agrave", "À"),
        ("Aacute", "Á"),
        ("Acircumflex", "Â"),
        ("Atilde", "Ã"),
        ("Adieresis", "Ä"),
        ("Aring", "Å"),
        ("AE", "Æ"),
        ("Ccedilla", "Ç"),
        ("Egrave", "È"),
        ("Eacute", "É"),
        ("Ecircumflex", "Ê"),
        ("Edieresis", "Ë"),
        ("Igrave", "Ì"),
        ("Iacute", "Í"),
        ("Icircumflex", "Î"),
        ("Idieresis", "Ï"),
        ("Eth", "Ð"),
        ("Ntilde", "Ñ"),
        ("Ograve", "Ò"),
        ("Oacute", "Ó"),
        ("Ocircumflex", "Ô"),
        ("Otilde", "Õ"),
        ("Odieresis", "Ö"),
        ("multiply", "×"),
        ("Oslash", "Ø"),
        ("Ugrave", "Ù"),
        ("Uacute", "Ú"),
        ("Ucircumflex", "Û"),
        ("Udieresis", "Ü"),
        ("Yacute", "Ý"),
        ("Thorn", "Þ"),
        ("germandbls", "ß"),
        ("agrave", "à"),
        ("aacute", "á"),
        ("acircumflex", "â"),
        ("atilde", "ã"),
        ("adieresis", "ä"),
        ("aring", "å"),
        ("ae", "æ"),
        ("ccedilla", "ç"),
        ("egrave", "è"),
        ("eacute", "é"),
        ("ecircumflex", "ê"),
        ("edieresis", "ë"),
        ("igrave", "ì"),
        ("iacute", "í"),
        ("icircumflex", "î"),
        ("idieresis", "ï"),
        ("eth", "ð"),
        ("ntilde", "ñ"),
        ("ograve", "ò"),
        ("oacute", "ó"),
        ("ocircumflex", "ô"),
        ("otilde", "õ"),
        ("odieresis", "ö"),
        ("divide", "÷"),
        ("oslash", "ø"),
        ("ugrave", "ù"),
        ("uacute", "ú"),
        ("ucircumflex", "û"),
        ("udieresis", "ü"),
        ("yacute", "ý"),
        ("thorn", "þ"),
        ("ydieresis", "ÿ"),
        ("dotlessi", "ı"),
        ("Lslash", "Ł"),
        ("lslash", "ł"),
        ("OE", "Œ"),
        ("oe", "œ"),
        ("Scaron", "Š"),
        ("scaron", "š"),
        ("Zcaron", "Ž"),
        ("zcaron", "ž"),
        ("Ydieresis", "Ÿ"),
        ("florin", "ƒ"),
        ("circumflex", "ˆ"),
        ("tilde", "˜"),
        ("endash", "\u{2013}"),
        ("emdash", "\u{2014}"),
        ("quotesinglbase", "\u{201a}"),
        ("quotedblleft", "\u{201c}"),
        ("quotedblright", "\u{201d}"),
        ("quotedblbase", "\u{201e}"),
        ("dagger", "\u{2020}"),
        ("daggerdbl", "\u{2021}"),
        ("bullet", "\u{2022}"),
        ("ellipsis", "\u{2026}"),
        ("perthousand", "\u{2030}"),
        ("guilsinglleft", "\u{2039}"),
        ("guilsinglright", "\u{203a}"),
        ("fraction", "\u{2044}"),
        ("Euro", "\u{20ac}"),
        ("trademark", "\u{2122}"),
        ("minus", "\u{2212}"),
        ("lessequal", "\u{2264}"),
        ("greaterequal", "\u{2265}"),
        ("arrowright", "\u{2192}"),
        ("arrowleft", "\u{2190}"),
        ("ff", "\u{fb00}"),
        ("fi", "\u{fb01}"),
        ("fl", "\u{fb02}"),
        ("ffi", "\u{fb03}"),
        ("ffl", "\u{fb04}"),
    ]
    .into_iter()
    .collect()
});

/// Resolve a PostScript glyph name to Unicode text.
///
/// Handles Adobe Glyph List names, `uniXXXX[XXXX...]`, `uXXXX[XX]`, variant
/// suffixes (`a.sc`) and ligature components joined by `_` (`f_i`).
pub(crate) fn glyph_name_to_unicode(name: &str) -> Option<String> {
    let base = name.split('.').next().unwrap_or_default();
    if base.is_empty() {
        return None;
    }

    if base.contains('_') {
        let parts: Option<Vec<String>> = base.split('_').map(component_to_unicode).collect();
        return parts.map(|parts| parts.concat()).filter(|text| !text.is_empty());
    }
    component_to_unicode(base)
}

fn component_to_unicode(name: &str) -> Option<String> {
    if let Some(text) = GLYPH_NAMES.get(name) {
        return Some(text.to_string());
    }
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return Some(name.to_string());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if !hex.is_empty() && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = hex
                .as_bytes()
                .chunks(4)
                .map(|chunk| {
                    let chunk = std::str::from_utf8(chunk).ok()?;
                    u16::from_str_radix(chunk, 16).ok()
                })
                .collect();
            return units.and_then(|units| {
                units
                    .into_iter()
                    .map(|unit| char::from_u32(u32::from(unit)))
                    .collect()
            });
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    None
}
