//! Typed LDAP controls.
//!
//! Controls travel as `ldap3`'s [`RawControl`]. Paged results and the
//! pre/post-read request controls come straight from `ldap3::controls`; sort
//! and virtual list view values are built on `ldap3::asn1`. Response values
//! are decoded here without panicking on malformed input.
//!
//! | Control                  | OID                         |
//! |--------------------------|-----------------------------|
//! | Simple paged results     | `1.2.840.113556.1.4.319`    |
//! | Server-side sort request | `1.2.840.113556.1.4.473`    |
//! | Server-side sort result  | `1.2.840.113556.1.4.474`    |
//! | Virtual list view        | `2.16.840.1.113730.3.4.9`   |
//! | Virtual list view result | `2.16.840.1.113730.3.4.10`  |
//! | Pre-read entry           | `1.3.6.1.1.13.1`            |
//! | Post-read entry          | `1.3.6.1.1.13.2`            |

pub mod paged;
pub mod read_entry;
pub mod sort;
pub mod token;
pub(crate) mod value;
pub mod vlv;

pub use ldap3::controls::RawControl;
pub use paged::{PagedResults, paged_control};
pub use read_entry::{ReadEntryKind, ReadEntryRequest, ReadEntryResponse};
pub use sort::{ServerSideSort, SortKey, SortResponse};
pub use token::{ContextId, OpaqueToken, PageToken};
pub use vlv::{VlvRequest, VlvResponse, VlvTarget};

use crate::error::ProtocolError;
use crate::protocol::find_control;

/// Control OIDs.
pub mod oid {
    pub const PAGED_RESULTS: &str = "1.2.840.113556.1.4.319";
    pub const SORT_REQUEST: &str = "1.2.840.113556.1.4.473";
    pub const SORT_RESPONSE: &str = "1.2.840.113556.1.4.474";
    pub const VLV_REQUEST: &str = "2.16.840.1.113730.3.4.9";
    pub const VLV_RESPONSE: &str = "2.16.840.1.113730.3.4.10";
    pub const PRE_READ: &str = "1.3.6.1.1.13.1";
    pub const POST_READ: &str = "1.3.6.1.1.13.2";
}

/// A control value this crate encodes itself.
pub trait RequestControl {
    fn oid(&self) -> &'static str;

    fn encode_value(&self) -> Vec<u8>;

    fn to_control(&self, critical: bool) -> RawControl {
        raw_control(self.oid(), critical, self.encode_value())
    }
}

/// Wrap an encoded value.
pub fn raw_control(oid: &str, critical: bool, value: Vec<u8>) -> RawControl {
    RawControl {
        ctype: oid.to_string(),
        crit: critical,
        val: Some(value),
    }
}

/// Decode the value of the first control with `oid`.
///
/// Returns `Ok(None)` when the control is absent. A control that is present
/// without a value, or whose value does not decode, is a protocol error.
pub fn decode_control<T, F>(
    controls: &[RawControl],
    oid: &str,
    decode: F,
) -> Result<Option<T>, ProtocolError>
where
    F: FnOnce(&[u8]) -> Option<T>,
{
    let Some(control) = find_control(controls, oid) else {
        return Ok(None);
    };
    control
        .val
        .as_deref()
        .and_then(decode)
        .map(Some)
        .ok_or_else(|| ProtocolError::malformed(oid))
}
