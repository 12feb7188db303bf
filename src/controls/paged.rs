//! Simple paged results control (RFC 2696).
//!
//! ```text
//! realSearchControlValue ::= SEQUENCE {
//!     size    INTEGER (0..maxInt),
//!     cookie  OCTET STRING }
//! ```
//!
//! On a request `size` is the page size; on a response it is the server's
//! estimate of the total result count (zero when unknown). Encoding is
//! `ldap3`'s own `PagedResults`.

use super::RawControl;
use super::value;
use crate::controls::token::PageToken;

pub use ldap3::controls::PagedResults;

/// Paged results control carrying `size` and `cookie`.
pub fn paged_control(size: u32, cookie: &PageToken, critical: bool) -> RawControl {
    let mut control: RawControl = PagedResults {
        size: i32::try_from(size).unwrap_or(i32::MAX),
        cookie: cookie.as_bytes().to_vec(),
    }
    .into();
    control.crit = critical;
    control
}

/// Decode a paged results value. A negative size is malformed.
pub fn decode_paged(value: &[u8]) -> Option<PagedResults> {
    let mut items = value::sequence(value::parse(value)?)?.into_iter();
    let size = value::integer(items.next()?)?;
    let cookie = value::octet_string(items.next()?)?;
    if items.next().is_some() {
        return None;
    }
    Some(PagedResults {
        size: i32::try_from(size).ok()?,
        cookie,
    })
}
