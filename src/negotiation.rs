//! Capability negotiation against the server's root DSE.
//!
//! Support is always determined from a fresh metadata read. Nothing is
//! cached between calls: pooled sessions may land on servers that advertise
//! different sets, so a pure function over `(session, capability)` is the
//! only safe answer.
//!
//! # Example
//!
//! ```rust
//! use directory_toolkit::negotiation::{self, Capability};
//! use directory_toolkit::session::InMemoryDirectory;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! assert!(negotiation::supports(&mut session, &Capability::PAGED_RESULTS)?);
//! assert!(!negotiation::supports(&mut session, &Capability::control("1.2.3.4"))?);
//! # Ok(())
//! # }
//! ```

use crate::controls::oid;
use crate::error::{ToolkitError, ToolkitResult};
use crate::protocol::RootMetadata;
use crate::session::DirectorySession;
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// How a capability is advertised in the root DSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityKind {
    /// Listed under `supportedControl`.
    Control,
    /// Listed under `supportedExtension`.
    ExtendedOperation,
}

/// An optional protocol feature identified by its OID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub id: Cow<'static, str>,
    pub kind: CapabilityKind,
}

impl Capability {
    pub const PAGED_RESULTS: Self = Self::control(oid::PAGED_RESULTS);
    pub const SERVER_SIDE_SORT: Self = Self::control(oid::SORT_REQUEST);
    pub const VIRTUAL_LIST_VIEW: Self = Self::control(oid::VLV_REQUEST);
    pub const PRE_READ: Self = Self::control(oid::PRE_READ);
    pub const POST_READ: Self = Self::control(oid::POST_READ);
    pub const WHO_AM_I: Self = Self::extended_operation("1.3.6.1.4.1.4203.1.11.3");
    pub const PASSWORD_MODIFY: Self = Self::extended_operation("1.3.6.1.4.1.4203.1.11.1");

    pub const fn control(id: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            kind: CapabilityKind::Control,
        }
    }

    pub const fn extended_operation(id: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            kind: CapabilityKind::ExtendedOperation,
        }
    }

    /// Capability with an identifier known only at runtime.
    pub fn new(id: impl Into<String>, kind: CapabilityKind) -> Self {
        Self {
            id: Cow::Owned(id.into()),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CapabilityKind::Control => write!(f, "control {}", self.id),
            CapabilityKind::ExtendedOperation => write!(f, "extended operation {}", self.id),
        }
    }
}

/// The capability sets one metadata read returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisedCapabilities {
    controls: BTreeSet<String>,
    extensions: BTreeSet<String>,
}

impl AdvertisedCapabilities {
    pub fn contains(&self, capability: &Capability) -> bool {
        let set = match capability.kind {
            CapabilityKind::Control => &self.controls,
            CapabilityKind::ExtendedOperation => &self.extensions,
        };
        set.contains(capability.id())
    }

    /// First capability in `required` that is not advertised.
    pub fn first_missing<'a>(&self, required: &'a [Capability]) -> Option<&'a Capability> {
        required.iter().find(|capability| !self.contains(capability))
    }

    /// Fail with `UnsupportedFeature` for the first capability not advertised.
    pub fn require_all(&self, required: &[Capability]) -> ToolkitResult<()> {
        match self.first_missing(required) {
            Some(missing) => Err(ToolkitError::unsupported(missing.clone())),
            None => Ok(()),
        }
    }
}

impl From<&RootMetadata> for AdvertisedCapabilities {
    fn from(metadata: &RootMetadata) -> Self {
        Self {
            controls: metadata.supported_controls.clone(),
            extensions: metadata.supported_extensions.clone(),
        }
    }
}

/// Read the root DSE, mapping transport failures to `SessionError`.
pub fn read_root_metadata<S>(session: &mut S) -> ToolkitResult<RootMetadata>
where
    S: DirectorySession + ?Sized,
{
    session
        .read_root_metadata()
        .map_err(|e| ToolkitError::session("read root metadata", e))
}

/// Fetch the capability sets with a single metadata read.
pub fn advertised<S>(session: &mut S) -> ToolkitResult<AdvertisedCapabilities>
where
    S: DirectorySession + ?Sized,
{
    let metadata = read_root_metadata(session)?;
    Ok(AdvertisedCapabilities::from(&metadata))
}

/// Whether `capability` is usable on this session.
///
/// An unadvertised capability is a normal `Ok(false)`; only a failed
/// metadata read is an error.
pub fn supports<S>(session: &mut S, capability: &Capability) -> ToolkitResult<bool>
where
    S: DirectorySession + ?Sized,
{
    let supported = advertised(session)?.contains(capability);
    debug!("server {} {}", if supported { "supports" } else { "lacks" }, capability);
    Ok(supported)
}

/// Fail with `UnsupportedFeature` unless every capability is advertised.
pub fn require_all<S>(session: &mut S, required: &[Capability]) -> ToolkitResult<()>
where
    S: DirectorySession + ?Sized,
{
    advertised(session)?.require_all(required)
}
