//! Virtual list view request and response controls
//! (draft-ietf-ldapext-ldapv3-vlv-09).
//!
//! ```text
//! VirtualListViewRequest ::= SEQUENCE {
//!     beforeCount    INTEGER (0..maxInt),
//!     afterCount     INTEGER (0..maxInt),
//!     target       CHOICE {
//!         byOffset        [0] SEQUENCE {
//!             offset          INTEGER (1 .. maxInt),
//!             contentCount    INTEGER (0 .. maxInt) },
//!         greaterThanOrEqual [1] AssertionValue },
//!     contextID     OCTET STRING OPTIONAL }
//!
//! VirtualListViewResponse ::= SEQUENCE {
//!     targetPosition    INTEGER (0 .. maxInt),
//!     contentCount      INTEGER (0 .. maxInt),
//!     virtualListViewResult ENUMERATED,
//!     contextID     OCTET STRING OPTIONAL }
//! ```

use super::{RequestControl, oid, value};
use crate::controls::token::ContextId;
use crate::protocol::ResultCode;
use ldap3::asn1::{Enumerated, Integer, OctetString, Sequence, Tag, TagClass};

const BY_OFFSET: u64 = 0;
const GREATER_THAN_OR_EQUAL: u64 = 1;

/// Where the requested window is anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlvTarget {
    /// 1-based offset; `content_count` is the client's current estimate of
    /// the list size (0 when unknown).
    ByOffset { offset: u32, content_count: u32 },
    /// First entry whose primary sort value is at least the assertion value.
    GreaterThanOrEqual(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvRequest {
    pub before_count: u32,
    pub after_count: u32,
    pub target: VlvTarget,
    pub context_id: Option<ContextId>,
}

impl VlvRequest {
    /// Server side: read the window request.
    pub fn decode(value: &[u8]) -> Option<Self> {
        let mut parts = value::sequence(value::parse(value)?)?.into_iter();
        let before_count = value::integer(parts.next()?)?;
        let after_count = value::integer(parts.next()?)?;
        let target = parts.next()?;
        let target = if value::is(&target, TagClass::Context, BY_OFFSET) {
            let mut by_offset = target.expect_constructed()?.into_iter();
            let offset = value::integer(by_offset.next()?)?;
            let content_count = value::integer(by_offset.next()?)?;
            if by_offset.next().is_some() {
                return None;
            }
            VlvTarget::ByOffset {
                offset,
                content_count,
            }
        } else {
            VlvTarget::GreaterThanOrEqual(value::context_string(target, GREATER_THAN_OR_EQUAL)?)
        };
        let context_id = match parts.next() {
            Some(tag) => Some(ContextId::from(value::octet_string(tag)?)),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            before_count,
            after_count,
            target,
            context_id,
        })
    }
}

impl RequestControl for VlvRequest {
    fn oid(&self) -> &'static str {
        oid::VLV_REQUEST
    }

    fn encode_value(&self) -> Vec<u8> {
        let target = match &self.target {
            VlvTarget::ByOffset {
                offset,
                content_count,
            } => Tag::Sequence(Sequence {
                class: TagClass::Context,
                id: BY_OFFSET,
                inner: vec![integer(*offset), integer(*content_count)],
            }),
            VlvTarget::GreaterThanOrEqual(assertion) => Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: GREATER_THAN_OR_EQUAL,
                inner: assertion.as_bytes().to_vec(),
            }),
        };
        let mut parts = vec![integer(self.before_count), integer(self.after_count), target];
        if let Some(context_id) = &self.context_id {
            parts.push(octets(context_id.as_bytes()));
        }
        value::encode(Tag::Sequence(Sequence {
            inner: parts,
            ..Default::default()
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvResponse {
    pub target_position: u32,
    pub content_count: u32,
    pub result: ResultCode,
    pub context_id: Option<ContextId>,
}

impl VlvResponse {
    pub fn decode(value: &[u8]) -> Option<Self> {
        let mut parts = value::sequence(value::parse(value)?)?.into_iter();
        let target_position = value::integer(parts.next()?)?;
        let content_count = value::integer(parts.next()?)?;
        let result = ResultCode(value::enumerated(parts.next()?)?);
        let context_id = match parts.next() {
            Some(tag) => Some(ContextId::from(value::octet_string(tag)?)),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            target_position,
            content_count,
            result,
            context_id,
        })
    }

    pub fn encode_value(&self) -> Vec<u8> {
        let mut parts = vec![
            integer(self.target_position),
            integer(self.content_count),
            Tag::Enumerated(Enumerated {
                inner: self.result.value() as i64,
                ..Default::default()
            }),
        ];
        if let Some(context_id) = &self.context_id {
            parts.push(octets(context_id.as_bytes()));
        }
        value::encode(Tag::Sequence(Sequence {
            inner: parts,
            ..Default::default()
        }))
    }
}

fn integer(value: u32) -> Tag {
    Tag::Integer(Integer {
        inner: value as i64,
        ..Default::default()
    })
}

fn octets(bytes: &[u8]) -> Tag {
    Tag::OctetString(OctetString {
        inner: bytes.to_vec(),
        ..Default::default()
    })
}
