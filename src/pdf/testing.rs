//! In-memory documents for unit tests

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Uniform advance of every printable glyph of the test font
pub(crate) const GLYPH_WIDTH: i64 = 500;
/// Advance of the space glyph of the test font
pub(crate) const SPACE_WIDTH: i64 = 250;

/// Type1 font with WinAnsi encoding and explicit widths for codes 32..=126
pub(crate) fn add_font(doc: &mut Document) -> ObjectId {
    let widths: Vec<Object> = (32..=126)
        .map(|code| Object::Integer(if code == 32 { SPACE_WIDTH } else { GLYPH_WIDTH }))
        .collect();
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
        "FirstChar" => 32,
        "LastChar" => 126,
        "Widths" => widths,
    })
}

/// Document whose pages carry the given raw content streams. The font `F1`
/// is inherited from the page tree root; `extra_resources` is merged into
/// that shared resource dictionary.
pub(crate) fn document(
    contents: &[&str],
    extra_resources: impl FnOnce(&mut Document) -> Dictionary,
) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = add_font(&mut doc);

    let mut resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    resources.extend(&extra_resources(&mut doc));
    let resources_id = doc.add_object(resources);

    let kids: Vec<Object> = contents
        .iter()
        .map(|content| {
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub(crate) fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("in-memory save");
    bytes
}

/// TrueType program whose `post` table names glyphs 1..=4
/// `H`, `uni0069`, `f_f` and `a.sc`
pub(crate) const GLYPH_NAMES_TTF: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/glyph_names.ttf"));

/// Identity-H Type0 font over a CIDFontType2 embedding [`GLYPH_NAMES_TTF`],
/// without a ToUnicode map. `cid_to_gid` is the descendant's `/CIDToGIDMap`.
pub(crate) fn add_glyph_name_font(doc: &mut Document, cid_to_gid: Object) -> ObjectId {
    let font_file = doc.add_object(Stream::new(dictionary! {}, GLYPH_NAMES_TTF.to_vec()));
    let descriptor = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "GlyphNames",
        "FontFile2" => font_file,
    });
    let cid_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "GlyphNames",
        "FontDescriptor" => descriptor,
        "CIDToGIDMap" => cid_to_gid,
        "DW" => 600,
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "GlyphNames",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font.into()],
    })
}
