//! Control value plumbing over `ldap3::asn1`.
//!
//! Encoding builds an `asn1::Tag` tree and serializes it. Decoding parses one
//! `StructureTag` and walks it with `Option`-returning accessors, so a
//! malformed server value becomes `None` instead of a panic.

use bytes::BytesMut;
use ldap3::asn1::{ASNTag, StructureTag, Tag, TagClass, Types, parse_tag, parse_uint, write};

/// Serialize a tag tree.
pub(crate) fn encode(tag: Tag) -> Vec<u8> {
    let mut buf = BytesMut::new();
    // Writing into an in-memory buffer cannot fail.
    let _ = write::encode_into(&mut buf, tag.into_structure());
    buf.to_vec()
}

/// Parse exactly one element spanning the whole value.
pub(crate) fn parse(value: &[u8]) -> Option<StructureTag> {
    match parse_tag(value) {
        Ok((rest, tag)) if rest.is_empty() => Some(tag),
        _ => None,
    }
}

/// Children of a universal SEQUENCE or SET.
pub(crate) fn universal_constructed(tag: StructureTag, id: Types) -> Option<Vec<StructureTag>> {
    tag.match_class(TagClass::Universal)?
        .match_id(id as u64)?
        .expect_constructed()
}

/// Children of a SEQUENCE.
pub(crate) fn sequence(tag: StructureTag) -> Option<Vec<StructureTag>> {
    universal_constructed(tag, Types::Sequence)
}

/// Content of a primitive with the given class and number.
pub(crate) fn primitive(tag: StructureTag, class: TagClass, id: u64) -> Option<Vec<u8>> {
    tag.match_class(class)?.match_id(id)?.expect_primitive()
}

pub(crate) fn octet_string(tag: StructureTag) -> Option<Vec<u8>> {
    primitive(tag, TagClass::Universal, Types::OctetString as u64)
}

pub(crate) fn string(tag: StructureTag) -> Option<String> {
    String::from_utf8(octet_string(tag)?).ok()
}

/// Context-specific string `[id]`.
pub(crate) fn context_string(tag: StructureTag, id: u64) -> Option<String> {
    String::from_utf8(primitive(tag, TagClass::Context, id)?).ok()
}

/// Non-negative INTEGER or ENUMERATED content that fits `u32`.
fn unsigned(tag: StructureTag, id: Types) -> Option<u32> {
    let content = primitive(tag, TagClass::Universal, id as u64)?;
    match content.first() {
        None => return None,
        Some(first) if first & 0x80 != 0 => return None,
        Some(_) => {}
    }
    match parse_uint(&content) {
        Ok((_, value)) => u32::try_from(value).ok(),
        Err(_) => None,
    }
}

pub(crate) fn integer(tag: StructureTag) -> Option<u32> {
    unsigned(tag, Types::Integer)
}

pub(crate) fn enumerated(tag: StructureTag) -> Option<u32> {
    unsigned(tag, Types::Enumerated)
}

/// Context-specific BOOLEAN `[id]`.
pub(crate) fn context_boolean(tag: StructureTag, id: u64) -> Option<bool> {
    match primitive(tag, TagClass::Context, id)?.as_slice() {
        [byte] => Some(*byte != 0),
        _ => None,
    }
}

/// Whether `tag` carries the given class and number.
pub(crate) fn is(tag: &StructureTag, class: TagClass, id: u64) -> bool {
    tag.class == class && tag.id == id
}
