//! Opaque continuation tokens.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Server-issued continuation state, round-tripped verbatim.
///
/// The client never parses or fabricates token contents. The only questions
/// it may ask are equality and emptiness. A zero-length token means
/// "no continuation". Displayed as base64 so tokens can be logged.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct OpaqueToken(Vec<u8>);

/// Cookie from the simple paged results control.
pub type PageToken = OpaqueToken;

/// Context identifier from the virtual list view response control.
pub type ContextId = OpaqueToken;

impl OpaqueToken {
    /// The zero-length token.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Some(self)` unless the token is empty.
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl From<Vec<u8>> for OpaqueToken {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for OpaqueToken {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(&self.0))
    }
}

impl fmt::Debug for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueToken({})", self)
    }
}
