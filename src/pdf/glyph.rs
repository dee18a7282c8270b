//! CID to Unicode fallback through embedded TrueType glyph names

use super::encoding::glyph_name_to_unicode;
use std::collections::HashMap;

/// Unicode text per CID, recovered from an embedded font program
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum GlyphMap {
    /// The font has no usable outlines or glyph names
    #[default]
    None,
    Mapped(HashMap<u32, String>),
}

impl GlyphMap {
    pub(crate) fn get(&self, cid: u32) -> Option<&str> {
        match self {
            GlyphMap::None => None,
            GlyphMap::Mapped(map) => map.get(&cid).map(String::as_str),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            GlyphMap::None => 0,
            GlyphMap::Mapped(map) => map.len(),
        }
    }
}

/// A CIDFontType2 `/CIDToGIDMap`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CidToGid {
    Identity,
    /// GID per CID, decoded from a stream of big-endian u16 values
    Table(Vec<u16>),
}

impl CidToGid {
    pub(crate) fn from_stream(bytes: &[u8]) -> Self {
        CidToGid::Table(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}

/// Map every CID whose glyph carries a resolvable name to its Unicode text
pub(crate) fn build_glyph_map<F>(cid_to_gid: &CidToGid, glyph_count: u16, glyph_name: F) -> GlyphMap
where
    F: Fn(u16) -> Option<String>,
{
    let pairs: Box<dyn Iterator<Item = (u32, u16)>> = match cid_to_gid {
        CidToGid::Identity => Box::new((1..glyph_count).map(|gid| (u32::from(gid), gid))),
        CidToGid::Table(gids) => Box::new(
            gids.iter()
                .enumerate()
                .filter_map(|(cid, &gid)| Some((u32::try_from(cid).ok()?, gid))),
        ),
    };

    let map: HashMap<u32, String> = pairs
        .filter(|&(_, gid)| gid != 0 && gid < glyph_count)
        .filter_map(|(cid, gid)| {
            let name = glyph_name(gid)?;
            let text = glyph_name_to_unicode(&name)?;
            Some((cid, text))
        })
        .collect();

    if map.is_empty() {
        GlyphMap::None
    } else {
        GlyphMap::Mapped(map)
    }
}

/// Parse an embedded TrueType program and map its glyph names
pub(crate) fn load_glyph_map(font_program: &[u8], cid_to_gid: &CidToGid) -> GlyphMap {
    let face = match ttf_parser::Face::parse(font_program, 0) {
        Ok(face) => face,
        Err(e) => {
            tracing::warn!(error = %e, "embedded TrueType program could not be parsed");
            return GlyphMap::None;
        }
    };

    build_glyph_map(cid_to_gid, face.number_of_glyphs(), |gid| {
        face.glyph_name(ttf_parser::GlyphId(gid)).map(str::to_string)
    })
}
