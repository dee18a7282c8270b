//! Font decoding: codes to text, widths, and per-font caches

use super::encoding::{glyph_name_to_unicode, BaseEncoding};
use super::glyph::{load_glyph_map, CidToGid, GlyphMap};
use super::object::{
    display_name, lookup, lookup_array, lookup_dict, lookup_name, lookup_number, number, resolve,
    stream_bytes,
};
use super::spacing::estimate_space_width;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Default glyph width of a composite font without `/DW`
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Longest `/W` range expanded when collecting metrics for space estimation
const MAX_METRIC_RANGE: u32 = 0xffff;

/// One character code read from a shown string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Glyph {
    pub code: u32,
    pub cid: u32,
    /// The code was one byte wide, which makes code 32 subject to word spacing
    pub single_byte: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeSpace {
    width: usize,
    start: u32,
    end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CidRange {
    code_lo: u32,
    code_hi: u32,
    cid_lo: u32,
}

/// Code-to-CID mapping of a composite font
#[derive(Debug, Clone, PartialEq)]
struct CMap {
    codespace: Vec<CodeSpace>,
    cids: Vec<CidRange>,
}

impl CMap {
    fn identity() -> Self {
        Self {
            codespace: vec![CodeSpace {
                width: 2,
                start: 0,
                end: 0xffff,
            }],
            cids: vec![CidRange {
                code_lo: 0,
                code_hi: 0xffff,
                cid_lo: 0,
            }],
        }
    }

    fn from_byte_mapping(mapping: adobe_cmap_parser::ByteMapping) -> Self {
        let codespace: Vec<CodeSpace> = mapping
            .codespace
            .iter()
            .map(|range| CodeSpace {
                width: range.width as usize,
                start: range.start,
                end: range.end,
            })
            .collect();
        if codespace.is_empty() {
            return Self::identity();
        }
        Self {
            codespace,
            cids: mapping
                .cid
                .iter()
                .map(|range| CidRange {
                    code_lo: range.src_code_lo,
                    code_hi: range.src_code_hi,
                    cid_lo: range.dst_CID_lo,
                })
                .collect(),
        }
    }

    /// Read the next code; returns it with its byte length (always at least 1)
    fn next_code(&self, bytes: &[u8]) -> (u32, usize) {
        let longest = bytes.len().min(4);
        let mut code = 0u32;
        for len in 1..=longest {
            code = (code << 8) | u32::from(bytes[len - 1]);
            let matched = self
                .codespace
                .iter()
                .any(|range| range.width == len && (range.start..=range.end).contains(&code));
            if matched {
                return (code, len);
            }
        }

        let len = self
            .codespace
            .iter()
            .map(|range| range.width)
            .min()
            .unwrap_or(1)
            .clamp(1, longest.max(1));
        let code = bytes[..len]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        (code, len)
    }

    fn cid(&self, code: u32) -> u32 {
        self.cids
            .iter()
            .find(|range| (range.code_lo..=range.code_hi).contains(&code))
            .map(|range| range.cid_lo.saturating_add(code - range.code_lo))
            .unwrap_or(0)
    }
}

/// Where the glyph-name fallback of a CIDFontType2 font comes from
#[derive(Debug, Clone, PartialEq)]
enum GlyphSource {
    Identity { font_file: ObjectId },
    Stream { font_file: ObjectId, map: ObjectId },
}

#[derive(Debug)]
enum FontKind {
    /// One byte per code, text from the encoding table when ToUnicode is silent
    Simple { encoding: Vec<Option<String>> },
    Composite {
        cmap: CMap,
        cid_ranges: Vec<(u32, u32, f64)>,
        glyph_source: Option<GlyphSource>,
    },
}

/// A decoded font resource
#[derive(Debug)]
pub(crate) struct Font {
    base_font: String,
    kind: FontKind,
    to_unicode: HashMap<u32, String>,
    /// Simple fonts key by code, composite fonts by CID
    widths: HashMap<u32, f64>,
    default_width: f64,
    glyph_map: OnceLock<GlyphMap>,
    space_width: OnceLock<f64>,
}

impl Font {
    /// Decode a font dictionary. Never fails: anything unreadable degrades
    /// to missing text or zero widths.
    pub(crate) fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = lookup_name(doc, dict, b"BaseFont")
            .map(display_name)
            .unwrap_or_default();
        let to_unicode = read_to_unicode(doc, dict, &base_font);

        match lookup_name(doc, dict, b"Subtype") {
            Some(b"Type0") => Self::composite(doc, dict, base_font, to_unicode),
            _ => Self::simple(doc, dict, base_font, to_unicode),
        }
    }

    fn simple(
        doc: &Document,
        dict: &Dictionary,
        base_font: String,
        to_unicode: HashMap<u32, String>,
    ) -> Self {
        let encoding = read_simple_encoding(doc, dict, &base_font);

        let scale = match lookup_name(doc, dict, b"Subtype") {
            Some(b"Type3") => lookup_array(doc, dict, b"FontMatrix")
                .and_then(|matrix| matrix.first())
                .and_then(number)
                .map_or(1.0, |a| a * 1000.0),
            _ => 1.0,
        };

        let mut widths = HashMap::new();
        if let (Some(first), Some(array)) = (
            lookup_number(doc, dict, b"FirstChar"),
            lookup_array(doc, dict, b"Widths"),
        ) {
            let first = first.max(0.0) as u32;
            for (offset, width) in array.iter().enumerate() {
                if let Some(width) = number(resolve(doc, width)) {
                    widths.insert(first.saturating_add(offset as u32), width * scale);
                }
            }
        }

        let default_width = lookup_dict(doc, dict, b"FontDescriptor")
            .and_then(|descriptor| lookup_number(doc, descriptor, b"MissingWidth"))
            .or_else(|| lookup_number(doc, dict, b"MissingWidth"))
            .map_or(0.0, |width| width * scale);

        Self {
            base_font,
            kind: FontKind::Simple { encoding },
            to_unicode,
            widths,
            default_width,
            glyph_map: OnceLock::new(),
            space_width: OnceLock::new(),
        }
    }

    fn composite(
        doc: &Document,
        dict: &Dictionary,
        base_font: String,
        to_unicode: HashMap<u32, String>,
    ) -> Self {
        let cmap = read_cmap(doc, dict, &base_font);
        let descendant = lookup_array(doc, dict, b"DescendantFonts")
            .and_then(|fonts| fonts.first())
            .and_then(|font| resolve(doc, font).as_dict().ok());

        let (widths, cid_ranges, default_width, glyph_source) = match descendant {
            Some(cid_font) => {
                let (widths, ranges) = read_cid_widths(doc, cid_font);
                let default_width =
                    lookup_number(doc, cid_font, b"DW").unwrap_or(DEFAULT_CID_WIDTH);
                (widths, ranges, default_width, glyph_source(doc, cid_font))
            }
            None => {
                tracing::warn!(font = %base_font, "composite font without descendant font");
                (HashMap::new(), Vec::new(), DEFAULT_CID_WIDTH, None)
            }
        };

        Self {
            base_font,
            kind: FontKind::Composite {
                cmap,
                cid_ranges,
                glyph_source,
            },
            to_unicode,
            widths,
            default_width,
            glyph_map: OnceLock::new(),
            space_width: OnceLock::new(),
        }
    }

    pub(crate) fn base_font(&self) -> &str {
        &self.base_font
    }

    /// Split a shown string into character codes
    pub(crate) fn glyphs(&self, bytes: &[u8]) -> Vec<Glyph> {
        match &self.kind {
            FontKind::Simple { .. } => bytes
                .iter()
                .map(|&b| Glyph {
                    code: u32::from(b),
                    cid: u32::from(b),
                    single_byte: true,
                })
                .collect(),
            FontKind::Composite { cmap, .. } => {
                let mut glyphs = Vec::new();
                let mut rest = bytes;
                while !rest.is_empty() {
                    let (code, len) = cmap.next_code(rest);
                    glyphs.push(Glyph {
                        code,
                        cid: cmap.cid(code),
                        single_byte: len == 1,
                    });
                    rest = &rest[len..];
                }
                glyphs
            }
        }
    }

    /// Glyph width in thousandths of text space
    pub(crate) fn width(&self, glyph: &Glyph) -> f64 {
        let width = match &self.kind {
            FontKind::Simple { .. } => self.widths.get(&glyph.code).copied(),
            FontKind::Composite { cid_ranges, .. } => {
                self.widths.get(&glyph.cid).copied().or_else(|| {
                    cid_ranges
                        .iter()
                        .find(|(first, last, _)| (*first..=*last).contains(&glyph.cid))
                        .map(|(_, _, width)| *width)
                })
            }
        };
        width.unwrap_or(self.default_width)
    }

    /// Text the font itself declares for a code (ToUnicode, then encoding)
    fn declared_text(&self, code: u32) -> Option<&str> {
        if let Some(text) = self.to_unicode.get(&code) {
            return Some(text);
        }
        match &self.kind {
            FontKind::Simple { encoding } => usize::try_from(code)
                .ok()
                .and_then(|index| encoding.get(index))
                .and_then(Option::as_deref),
            FontKind::Composite { .. } => None,
        }
    }

    /// Text for a glyph; empty when neither the font nor its embedded
    /// program can name it
    pub(crate) fn text(&self, doc: &Document, glyph: &Glyph) -> String {
        if let Some(text) = self.declared_text(glyph.code).filter(|text| !text.is_empty()) {
            return text.to_string();
        }
        self.glyph_map(doc)
            .get(glyph.cid)
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// CID → text fallback, built on first use
    pub(crate) fn glyph_map(&self, doc: &Document) -> &GlyphMap {
        self.glyph_map.get_or_init(|| {
            let FontKind::Composite {
                glyph_source: Some(source),
                ..
            } = &self.kind
            else {
                return GlyphMap::None;
            };
            let map = build_from_source(doc, source);
            tracing::debug!(font = %self.base_font, glyphs = map.len(), "glyph map built");
            map
        })
    }

    /// Expected space width in thousandths of text space, estimated once
    pub(crate) fn space_width(&self, doc: &Document) -> f64 {
        *self.space_width.get_or_init(|| {
            let estimate = estimate_space_width(self.metrics(doc));
            tracing::debug!(
                font = %self.base_font,
                space_width = estimate,
                "space width estimated"
            );
            estimate
        })
    }

    /// `(character, width)` for every single-character glyph with a known width
    fn metrics(&self, doc: &Document) -> Vec<(char, f64)> {
        let mut entries: Vec<(u32, f64)> = self.widths.iter().map(|(&k, &w)| (k, w)).collect();
        if let FontKind::Composite { cid_ranges, .. } = &self.kind {
            for &(first, last, width) in cid_ranges {
                if last.saturating_sub(first) <= MAX_METRIC_RANGE {
                    entries.extend((first..=last).map(|cid| (cid, width)));
                }
            }
        }

        entries
            .into_iter()
            .filter_map(|(key, width)| {
                let glyph = Glyph {
                    code: key,
                    cid: key,
                    single_byte: true,
                };
                let text = self.text(doc, &glyph);
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some((ch, width)),
                    _ => None,
                }
            })
            .collect()
    }
}

fn build_from_source(doc: &Document, source: &GlyphSource) -> GlyphMap {
    let (font_file, cid_to_gid) = match source {
        GlyphSource::Identity { font_file } => (*font_file, CidToGid::Identity),
        GlyphSource::Stream { font_file, map } => {
            let Ok(stream) = doc.get_object(*map).and_then(Object::as_stream) else {
                return GlyphMap::None;
            };
            (*font_file, CidToGid::from_stream(&stream_bytes(stream)))
        }
    };

    match doc.get_object(font_file).and_then(Object::as_stream) {
        Ok(stream) => load_glyph_map(&stream_bytes(stream), &cid_to_gid),
        Err(_) => GlyphMap::None,
    }
}

/// Fonts of a CIDFontType2 with an embedded program and a CID→GID map
fn glyph_source(doc: &Document, cid_font: &Dictionary) -> Option<GlyphSource> {
    if lookup_name(doc, cid_font, b"Subtype") != Some(&b"CIDFontType2"[..]) {
        return None;
    }
    let descriptor = lookup_dict(doc, cid_font, b"FontDescriptor")?;
    let font_file = descriptor.get(b"FontFile2").ok()?.as_reference().ok()?;

    match cid_font.get(b"CIDToGIDMap").ok()? {
        Object::Name(name) if name == b"Identity" => Some(GlyphSource::Identity { font_file }),
        Object::Reference(map) => Some(GlyphSource::Stream {
            font_file,
            map: *map,
        }),
        _ => None,
    }
}

/// Parse a `/ToUnicode` CMap into code → text
fn read_to_unicode(doc: &Document, dict: &Dictionary, base_font: &str) -> HashMap<u32, String> {
    let Some(Object::Stream(stream)) = lookup(doc, dict, b"ToUnicode") else {
        return HashMap::new();
    };
    let contents = stream_bytes(stream);

    let parsed = std::panic::catch_unwind(|| adobe_cmap_parser::get_unicode_map(&contents));
    let cmap = match parsed {
        Ok(Ok(cmap)) => cmap,
        Ok(Err(e)) => {
            tracing::warn!(font = %base_font, error = ?e, "unparseable ToUnicode CMap");
            return HashMap::new();
        }
        Err(_) => {
            tracing::warn!(font = %base_font, "ToUnicode CMap parser panicked");
            return HashMap::new();
        }
    };

    cmap.into_iter()
        .filter_map(|(code, utf16be)| decode_utf16be(&utf16be).map(|text| (code, text)))
        .collect()
}

fn decode_utf16be(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
        .filter(|text| !text.chars().any(char::is_control))
}

/// Encoding CMap of a composite font
fn read_cmap(doc: &Document, dict: &Dictionary, base_font: &str) -> CMap {
    match lookup(doc, dict, b"Encoding") {
        Some(Object::Name(name)) if name == b"Identity-H" || name == b"Identity-V" => {
            CMap::identity()
        }
        Some(Object::Name(name)) => {
            tracing::warn!(
                font = %base_font,
                encoding = %display_name(name),
                "unsupported predefined CMap, using Identity-H"
            );
            CMap::identity()
        }
        Some(Object::Stream(stream)) => {
            let contents = stream_bytes(stream);
            let parsed =
                std::panic::catch_unwind(|| adobe_cmap_parser::get_byte_mapping(&contents));
            match parsed {
                Ok(Ok(mapping)) => CMap::from_byte_mapping(mapping),
                Ok(Err(e)) => {
                    tracing::warn!(
                        font = %base_font,
                        error = ?e,
                        "unparseable encoding CMap, using Identity-H"
                    );
                    CMap::identity()
                }
                Err(_) => {
                    tracing::warn!(
                        font = %base_font,
                        "encoding CMap parser panicked, using Identity-H"
                    );
                    CMap::identity()
                }
            }
        }
        _ => CMap::identity(),
    }
}

/// Per-code text of a simple font: base encoding overlaid with `/Differences`
fn read_simple_encoding(doc: &Document, dict: &Dictionary, base_font: &str) -> Vec<Option<String>> {
    let (base_name, differences) = match lookup(doc, dict, b"Encoding") {
        Some(Object::Name(name)) => (Some(name.as_slice()), None),
        Some(Object::Dictionary(encoding)) => (
            lookup_name(doc, encoding, b"BaseEncoding"),
            lookup_array(doc, encoding, b"Differences"),
        ),
        _ => (None, None),
    };

    let base = match base_name {
        Some(name) => BaseEncoding::from_name(name).unwrap_or_else(|| {
            tracing::warn!(
                font = %base_font,
                encoding = %display_name(name),
                "unknown base encoding, using StandardEncoding"
            );
            BaseEncoding::Standard
        }),
        None => BaseEncoding::Standard,
    };

    let mut table: Vec<Option<String>> = (0..=255u8).map(|code| base.decode(code)).collect();

    if let Some(differences) = differences {
        let mut code: Option<usize> = None;
        for entry in differences {
            match resolve(doc, entry) {
                Object::Integer(start) => code = usize::try_from(*start).ok(),
                Object::Name(name) => {
                    if let Some(index) = code.filter(|&index| index < table.len()) {
                        table[index] = glyph_name_to_unicode(&display_name(name));
                        code = Some(index + 1);
                    }
                }
                _ => {}
            }
        }
    }
    table
}

/// `/W` of a CID font: individual widths plus `first last width` ranges
fn read_cid_widths(
    doc: &Document,
    cid_font: &Dictionary,
) -> (HashMap<u32, f64>, Vec<(u32, u32, f64)>) {
    let mut widths = HashMap::new();
    let mut ranges = Vec::new();
    let Some(entries) = lookup_array(doc, cid_font, b"W") else {
        return (widths, ranges);
    };

    let cid_of = |object: &Object| number(resolve(doc, object)).map(|n| n.max(0.0) as u32);
    let mut i = 0;
    while i + 1 < entries.len() {
        let Some(first) = cid_of(&entries[i]) else {
            break;
        };
        match resolve(doc, &entries[i + 1]) {
            Object::Array(run) => {
                for (offset, width) in run.iter().enumerate() {
                    if let Some(width) = number(resolve(doc, width)) {
                        widths.insert(first.saturating_add(offset as u32), width);
                    }
                }
                i += 2;
            }
            last => {
                let (Some(last), Some(width)) = (
                    number(last).map(|n| n.max(0.0) as u32),
                    entries.get(i + 2).and_then(|w| number(resolve(doc, w))),
                ) else {
                    break;
                };
                ranges.push((first, last, width));
                i += 3;
            }
        }
    }
    (widths, ranges)
}

/// Where a font resource lives: an indirect object, or a dictionary written
/// inline in one page's resources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum FontKey {
    Object(ObjectId),
    Inline { page: u32, name: Vec<u8> },
}

/// Fonts decoded for one open document
#[derive(Debug, Default)]
pub(crate) struct FontCache {
    fonts: HashMap<FontKey, Arc<Font>>,
}

impl FontCache {
    pub(crate) fn get_or_load(
        &mut self,
        doc: &Document,
        key: FontKey,
        dict: &Dictionary,
    ) -> Arc<Font> {
        self.fonts
            .entry(key)
            .or_insert_with(|| {
                let font = Font::from_dict(doc, dict);
                tracing::debug!(font = %font.base_font(), "font loaded");
                Arc::new(font)
            })
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.fonts.len()
    }
}
