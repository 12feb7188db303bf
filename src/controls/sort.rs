//! Server-side sort request and response controls (RFC 2891).
//!
//! ```text
//! SortKeyList ::= SEQUENCE OF SEQUENCE {
//!     attributeType   AttributeDescription,
//!     orderingRule    [0] MatchingRuleId OPTIONAL,
//!     reverseOrder    [1] BOOLEAN DEFAULT FALSE }
//!
//! SortResult ::= SEQUENCE {
//!     sortResult      ENUMERATED,
//!     attributeType   [0] AttributeDescription OPTIONAL }
//! ```

use super::{RequestControl, oid, value};
use crate::protocol::ResultCode;
use ldap3::asn1::{Boolean, Enumerated, OctetString, Sequence, Tag, TagClass};
use serde::{Deserialize, Serialize};

/// One attribute of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    pub attribute: String,
    #[serde(default)]
    pub ordering_rule: Option<String>,
    #[serde(default)]
    pub reverse: bool,
}

impl SortKey {
    /// Ascending order on `attribute` using its default ordering rule.
    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ordering_rule: None,
            reverse: false,
        }
    }

    pub fn descending(attribute: impl Into<String>) -> Self {
        Self {
            reverse: true,
            ..Self::ascending(attribute)
        }
    }

    pub fn with_ordering_rule(mut self, rule: impl Into<String>) -> Self {
        self.ordering_rule = Some(rule.into());
        self
    }
}

/// Sort request control value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSideSort {
    pub keys: Vec<SortKey>,
}

impl ServerSideSort {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Server side: read the key list.
    pub fn decode(value: &[u8]) -> Option<Self> {
        let mut keys = Vec::new();
        for key in value::sequence(value::parse(value)?)? {
            let mut parts = value::sequence(key)?.into_iter().peekable();
            let attribute = value::string(parts.next()?)?;
            let ordering_rule = match parts.next_if(|t| value::is(t, TagClass::Context, 0)) {
                Some(tag) => Some(value::context_string(tag, 0)?),
                None => None,
            };
            let reverse = match parts.next() {
                Some(tag) => value::context_boolean(tag, 1)?,
                None => false,
            };
            if parts.next().is_some() {
                return None;
            }
            keys.push(SortKey {
                attribute,
                ordering_rule,
                reverse,
            });
        }
        Some(Self { keys })
    }
}

impl RequestControl for ServerSideSort {
    fn oid(&self) -> &'static str {
        oid::SORT_REQUEST
    }

    fn encode_value(&self) -> Vec<u8> {
        let keys = self
            .keys
            .iter()
            .map(|key| {
                let mut parts = vec![Tag::OctetString(OctetString {
                    inner: key.attribute.as_bytes().to_vec(),
                    ..Default::default()
                })];
                if let Some(rule) = &key.ordering_rule {
                    parts.push(Tag::OctetString(OctetString {
                        class: TagClass::Context,
                        id: 0,
                        inner: rule.as_bytes().to_vec(),
                    }));
                }
                // DEFAULT FALSE is omitted on the wire.
                if key.reverse {
                    parts.push(Tag::Boolean(Boolean {
                        class: TagClass::Context,
                        id: 1,
                        inner: true,
                    }));
                }
                Tag::Sequence(Sequence {
                    inner: parts,
                    ..Default::default()
                })
            })
            .collect();
        value::encode(Tag::Sequence(Sequence {
            inner: keys,
            ..Default::default()
        }))
    }
}

/// Sort response control value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortResponse {
    pub result: ResultCode,
    pub attribute: Option<String>,
}

impl SortResponse {
    pub fn decode(value: &[u8]) -> Option<Self> {
        let mut parts = value::sequence(value::parse(value)?)?.into_iter();
        let result = ResultCode(value::enumerated(parts.next()?)?);
        let attribute = match parts.next() {
            Some(tag) => Some(value::context_string(tag, 0)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { result, attribute })
    }

    pub fn encode_value(&self) -> Vec<u8> {
        let mut parts = vec![Tag::Enumerated(Enumerated {
            inner: self.result.value() as i64,
            ..Default::default()
        })];
        if let Some(attribute) = &self.attribute {
            parts.push(Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: 0,
                inner: attribute.as_bytes().to_vec(),
            }));
        }
        value::encode(Tag::Sequence(Sequence {
            inner: parts,
            ..Default::default()
        }))
    }
}
