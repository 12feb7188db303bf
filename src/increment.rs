//! Atomic increment (RFC 4525) with optional before/after snapshots.
//!
//! The modify request is sent exactly once. Pre-read and post-read controls
//! (RFC 4527) are attached as critical controls when, and only when, the
//! server advertises them; each side of the resulting snapshot is optional.
//!
//! Retrying is left to the caller. An increment is not idempotent.
//!
//! # Example
//!
//! ```rust
//! use directory_toolkit::increment::{AtomicIncrement, IncrementRequest};
//! use directory_toolkit::protocol::SearchEntry;
//! use directory_toolkit::session::InMemoryDirectory;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! session.add_entry(
//!     SearchEntry::new("uid=jdoe,dc=example,dc=com").with_attribute("uidNumber", ["1500"]),
//! );
//!
//! let request = IncrementRequest::new("uid=jdoe,dc=example,dc=com", "uidNumber", 5)?;
//! let outcome = AtomicIncrement::new().increment(&mut session, &request)?;
//! assert_eq!(outcome.snapshot.before.as_deref(), Some("1500"));
//! assert_eq!(outcome.snapshot.after.as_deref(), Some("1505"));
//! # Ok(())
//! # }
//! ```

use crate::controls::{ReadEntryKind, ReadEntryRequest, ReadEntryResponse, decode_control};
use crate::error::{ProtocolError, ToolkitError, ToolkitResult};
use crate::negotiation::{self, AdvertisedCapabilities, Capability};
use crate::protocol::{self, Dn, ModifyRequest, ModifyResponse, ResultCode, Scope, SearchRequest};
use crate::schema::SchemaCatalog;
use crate::session::{DirectorySession, ensure_success, send_modify, send_search};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Snapshot controls and the capability that gates each of them.
const READ_CONTROLS: [(Capability, ReadEntryKind); 2] = [
    (Capability::PRE_READ, ReadEntryKind::Before),
    (Capability::POST_READ, ReadEntryKind::After),
];

/// What to do with one snapshot control on this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Attach,
    Skip,
}

impl ControlAction {
    fn decide(advertised: &AdvertisedCapabilities, capability: &Capability) -> Self {
        if advertised.contains(capability) {
            Self::Attach
        } else {
            Self::Skip
        }
    }
}

/// Target entry, attribute and signed delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementRequest {
    pub dn: Dn,
    pub attribute: String,
    pub delta: i64,
}

impl IncrementRequest {
    pub fn new(dn: impl Into<Dn>, attribute: impl Into<String>, delta: i64) -> ToolkitResult<Self> {
        let attribute = attribute.into();
        if attribute.trim().is_empty() {
            return Err(ToolkitError::invalid_request("attribute name must not be empty"));
        }
        Ok(Self {
            dn: dn.into(),
            attribute,
            delta,
        })
    }
}

/// Attribute value immediately before and after the increment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeforeAfterSnapshot {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl BeforeAfterSnapshot {
    fn set(&mut self, kind: ReadEntryKind, value: Option<String>) {
        match kind {
            ReadEntryKind::Before => self.before = value,
            ReadEntryKind::After => self.after = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementOutcome {
    pub snapshot: BeforeAfterSnapshot,
    pub result_code: ResultCode,
    /// False when the existence probe found no entry and no modify was sent.
    pub applied: bool,
}

/// Increment modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicIncrement {
    probe_existence: bool,
}

impl Default for AtomicIncrement {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicIncrement {
    /// Modifier that probes for the entry before modifying it.
    pub fn new() -> Self {
        Self {
            probe_existence: true,
        }
    }

    /// Enable or disable the existence probe.
    pub fn with_probe(mut self, probe_existence: bool) -> Self {
        self.probe_existence = probe_existence;
        self
    }

    /// Apply `request.delta` to `request.attribute` on `request.dn`.
    pub fn increment<S>(&self, session: &mut S, request: &IncrementRequest) -> ToolkitResult<IncrementOutcome>
    where
        S: DirectorySession + ?Sized,
    {
        if self.probe_existence && !entry_exists(session, &request.dn)? {
            info!("{} does not exist, nothing to increment", request.dn);
            return Ok(IncrementOutcome {
                snapshot: BeforeAfterSnapshot::default(),
                result_code: ResultCode::SUCCESS,
                applied: false,
            });
        }

        let advertised = negotiation::advertised(session)?;
        let mut modify = ModifyRequest::new(
            request.dn.clone(),
            vec![protocol::increment(request.attribute.clone(), request.delta)],
        );
        let mut attached = Vec::new();
        for (capability, kind) in &READ_CONTROLS {
            match ControlAction::decide(&advertised, capability) {
                ControlAction::Attach => {
                    let control = ReadEntryRequest::new(*kind, vec![request.attribute.clone()]);
                    modify.set_control(control.to_control(true));
                    attached.push(*kind);
                }
                ControlAction::Skip => debug!("{} not advertised, skipping", capability),
            }
        }

        let response = send_modify(session, &modify)?;
        ensure_success("increment", &response.result)?;

        let mut snapshot = BeforeAfterSnapshot::default();
        let mut catalog = None;
        for kind in attached {
            let value = read_snapshot(session, &response, kind, request, &mut catalog)?;
            snapshot.set(kind, value);
        }
        info!(
            "incremented {} on {} by {} ({:?} -> {:?})",
            request.attribute, request.dn, request.delta, snapshot.before, snapshot.after
        );

        Ok(IncrementOutcome {
            snapshot,
            result_code: response.result.code,
            applied: true,
        })
    }
}

/// Zero-attribute base search for the target entry.
fn entry_exists<S>(session: &mut S, dn: &Dn) -> ToolkitResult<bool>
where
    S: DirectorySession + ?Sized,
{
    let probe = SearchRequest::new(dn.clone(), Scope::Base, "(objectClass=*)").with_attributes(["1.1"]);
    let response = send_search(session, &probe)?;
    if response.result.code == ResultCode::NO_SUCH_OBJECT {
        return Ok(false);
    }
    ensure_success("existence probe", &response.result)?;
    Ok(!response.entries.is_empty())
}

/// First value of the attribute from one read-entry response control.
///
/// The server may name the attribute by another of its schema names. The
/// subschema is read at most once per increment, on the first such miss.
fn read_snapshot<S>(
    session: &mut S,
    response: &ModifyResponse,
    kind: ReadEntryKind,
    request: &IncrementRequest,
    catalog: &mut Option<SchemaCatalog>,
) -> ToolkitResult<Option<String>>
where
    S: DirectorySession + ?Sized,
{
    let Some(read) = decode_control(&response.controls, kind.oid(), ReadEntryResponse::decode)? else {
        warn!("server accepted {} but did not return it", kind.oid());
        return Ok(None);
    };
    if !read.entry.dn.matches(&request.dn) {
        return Err(ProtocolError::UnexpectedEntry {
            dn: read.entry.dn.to_string(),
        }
        .into());
    }
    if let Some(value) = read.entry.first_value(&request.attribute) {
        return Ok(Some(value.to_string()));
    }
    if read.entry.attributes.is_empty() {
        return Ok(None);
    }

    let catalog = catalog.get_or_insert_with(|| match SchemaCatalog::fetch(session) {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!("cannot resolve aliases of {}: {}", request.attribute, err);
            SchemaCatalog::default()
        }
    });
    Ok(read
        .entry
        .attributes
        .iter()
        .find(|(name, _)| catalog.same_type(name, &request.attribute))
        .and_then(|(_, values)| values.first().cloned()))
}
