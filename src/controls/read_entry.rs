//! Pre-read and post-read entry controls (RFC 4527).
//!
//! The request value selects attributes; the response value is a complete
//! `SearchResultEntry` describing the target entry immediately before or
//! after the update.
//!
//! ```text
//! AttributeSelection ::= SEQUENCE OF selector LDAPString
//!
//! SearchResultEntry ::= [APPLICATION 4] SEQUENCE {
//!     objectName      LDAPDN,
//!     attributes      SEQUENCE OF SEQUENCE {
//!         type    AttributeDescription,
//!         vals    SET OF AttributeValue } }
//! ```
//!
//! Requests are `ldap3`'s `PreRead`/`PostRead`. Responses are decoded here
//! into a [`SearchEntry`].

use super::{RawControl, oid, value};
use crate::protocol::{Dn, SearchEntry};
use ldap3::asn1::{OctetString, Sequence, Set, Tag, TagClass, Types};
use ldap3::controls::{PostRead, PreRead};

const SEARCH_RESULT_ENTRY: u64 = 4;

/// Which side of the update the control reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadEntryKind {
    Before,
    After,
}

impl ReadEntryKind {
    pub fn oid(self) -> &'static str {
        match self {
            Self::Before => oid::PRE_READ,
            Self::After => oid::POST_READ,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEntryRequest {
    pub kind: ReadEntryKind,
    pub attributes: Vec<String>,
}

impl ReadEntryRequest {
    pub fn new(kind: ReadEntryKind, attributes: Vec<String>) -> Self {
        Self { kind, attributes }
    }

    pub fn to_control(&self, critical: bool) -> RawControl {
        let mut control: RawControl = match self.kind {
            ReadEntryKind::Before => PreRead::new(self.attributes.clone()).into(),
            ReadEntryKind::After => PostRead::new(self.attributes.clone()).into(),
        };
        control.crit = critical;
        control
    }

    /// Server side: read the attribute selection.
    pub fn decode(kind: ReadEntryKind, value: &[u8]) -> Option<Self> {
        let attributes = value::sequence(value::parse(value)?)?
            .into_iter()
            .map(value::string)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { kind, attributes })
    }
}

/// Decoded response value: the entry as it looked at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEntryResponse {
    pub entry: SearchEntry,
}

impl ReadEntryResponse {
    pub fn decode(value: &[u8]) -> Option<Self> {
        let mut body = value::parse(value)?
            .match_class(TagClass::Application)?
            .match_id(SEARCH_RESULT_ENTRY)?
            .expect_constructed()?
            .into_iter();
        let mut entry = SearchEntry::new(Dn::new(value::string(body.next()?)?));
        let attributes = value::sequence(body.next()?)?;
        if body.next().is_some() {
            return None;
        }
        for attribute in attributes {
            let mut parts = value::sequence(attribute)?.into_iter();
            let name = value::string(parts.next()?)?;
            let values = value::universal_constructed(parts.next()?, Types::Set)?
                .into_iter()
                .map(value::string)
                .collect::<Option<Vec<_>>>()?;
            if parts.next().is_some() {
                return None;
            }
            entry.attributes.insert(name, values);
        }
        Some(Self { entry })
    }

    pub fn encode_value(&self) -> Vec<u8> {
        let attributes = self
            .entry
            .attributes
            .iter()
            .map(|(name, values)| {
                Tag::Sequence(Sequence {
                    inner: vec![
                        octets(name),
                        Tag::Set(Set {
                            inner: values.iter().map(|v| octets(v)).collect(),
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                })
            })
            .collect();
        value::encode(Tag::Sequence(Sequence {
            class: TagClass::Application,
            id: SEARCH_RESULT_ENTRY,
            inner: vec![
                octets(self.entry.dn.as_str()),
                Tag::Sequence(Sequence {
                    inner: attributes,
                    ..Default::default()
                }),
            ],
        }))
    }
}

fn octets(text: &str) -> Tag {
    Tag::OctetString(OctetString {
        inner: text.as_bytes().to_vec(),
        ..Default::default()
    })
}
