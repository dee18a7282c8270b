//! Small accessors over lopdf objects

use lopdf::{Dictionary, Document, Object, Stream};

/// Follow an indirect reference, leaving direct objects untouched
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Look up `key` in `dict`, following a reference
pub(crate) fn lookup<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().map(|object| resolve(doc, object))
}

pub(crate) fn lookup_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    lookup(doc, dict, key).and_then(|object| object.as_dict().ok())
}

pub(crate) fn lookup_name<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a [u8]> {
    lookup(doc, dict, key).and_then(|object| object.as_name().ok())
}

pub(crate) fn lookup_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    lookup(doc, dict, key).and_then(number)
}

pub(crate) fn lookup_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a [Object]> {
    lookup(doc, dict, key)
        .and_then(|object| object.as_array().ok())
        .map(Vec::as_slice)
}

/// Numeric value of an integer or real operand
pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Stream payload with filters applied; unfiltered streams are returned as stored
pub(crate) fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Lossy name for logging
pub(crate) fn display_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_lookup_follows_references() {
        let mut doc = Document::with_version("1.5");
        let width_id = doc.add_object(Object::Integer(42));
        let dict = dictionary! {
            "Width" => width_id,
            "Scale" => 0.5,
            "Name" => "Helvetica",
        };
        assert_eq!(lookup_number(&doc, &dict, b"Width"), Some(42.0));
        assert_eq!(lookup_number(&doc, &dict, b"Scale"), Some(0.5));
        assert_eq!(lookup_name(&doc, &dict, b"Name"), Some(&b"Helvetica"[..]));
        assert_eq!(lookup_number(&doc, &dict, b"Missing"), None);
    }
}
