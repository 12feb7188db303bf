//! Wire-level request and response model.
//!
//! These are the typed messages a [`DirectorySession`](crate::session::DirectorySession)
//! exchanges with the server. Scope, modifications and controls are `ldap3`'s
//! own types, so a session backed by an `ldap3` connection passes them
//! through unchanged. Control values stay as raw BER bytes here; the
//! [`controls`](crate::controls) module gives them structure.

pub mod result_code;

pub use ldap3::controls::RawControl;
pub use ldap3::{Mod, Scope};
pub use result_code::ResultCode;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Distinguished name of a directory entry.
///
/// The empty DN names the root DSE. Comparison through [`Dn::matches`]
/// ignores case and whitespace around RDN separators, which is enough for
/// the equality checks the toolkit performs. No further DN parsing is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dn(String);

impl Dn {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The root DSE.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive comparison with normalized separators.
    pub fn matches(&self, other: &Dn) -> bool {
        self.normalized() == other.normalized()
    }

    /// Whether `self` equals `base` or sits anywhere below it.
    pub fn is_within(&self, base: &Dn) -> bool {
        if base.is_root() {
            return true;
        }
        let own = self.normalized();
        let base = base.normalized();
        own == base || own.ends_with(&format!(",{}", base))
    }

    /// Number of RDN components between `self` and `base` (0 for the base
    /// itself). `None` when `self` is not within `base`.
    pub fn depth_below(&self, base: &Dn) -> Option<usize> {
        if !self.is_within(base) {
            return None;
        }
        let own = self.normalized().split(',').filter(|s| !s.is_empty()).count();
        let base = base.normalized().split(',').filter(|s| !s.is_empty()).count();
        Some(own - base)
    }

    pub(crate) fn normalized(&self) -> String {
        self.0
            .split(',')
            .map(|rdn| rdn.trim().to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dn {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Dn {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Find the first control with the given OID.
pub fn find_control<'a>(controls: &'a [RawControl], oid: &str) -> Option<&'a RawControl> {
    controls.iter().find(|c| c.ctype == oid)
}

/// Replace any control with the same OID, or append.
fn upsert_control(controls: &mut Vec<RawControl>, control: RawControl) {
    if let Some(existing) = controls.iter_mut().find(|c| c.ctype == control.ctype) {
        *existing = control;
    } else {
        controls.push(control);
    }
}

/// Outcome of an operation as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapResult {
    pub code: ResultCode,
    pub matched_dn: String,
    pub message: String,
}

impl LdapResult {
    pub fn success() -> Self {
        Self::with_code(ResultCode::SUCCESS, "")
    }

    pub fn with_code(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            matched_dn: String::new(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// A search request.
///
/// Size and time limits are passed through to the server unchanged; zero
/// means "no client-requested limit".
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub base: Dn,
    pub scope: Scope,
    pub filter: String,
    pub attributes: Vec<String>,
    pub size_limit: u32,
    pub time_limit: u32,
    pub controls: Vec<RawControl>,
}

impl SearchRequest {
    /// Create a request with no limits, attributes or controls.
    pub fn new(base: impl Into<Dn>, scope: Scope, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope,
            filter: filter.into(),
            attributes: Vec::new(),
            size_limit: 0,
            time_limit: 0,
            controls: Vec::new(),
        }
    }

    /// Request the given attributes.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_size_limit(mut self, size_limit: u32) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Set the time limit in seconds.
    pub fn with_time_limit(mut self, time_limit: u32) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_control(mut self, control: RawControl) -> Self {
        self.set_control(control);
        self
    }

    /// Attach a control, replacing any earlier one with the same OID.
    pub fn set_control(&mut self, control: RawControl) {
        upsert_control(&mut self.controls, control);
    }

    pub fn control(&self, oid: &str) -> Option<&RawControl> {
        find_control(&self.controls, oid)
    }
}

/// An entry returned by a search or a read-entry control.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchEntry {
    pub dn: Dn,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl SearchEntry {
    pub fn new(dn: impl Into<Dn>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Values of an attribute, matched case-insensitively.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Binary-valued attributes are not carried; the toolkit only reads
/// textual values.
impl From<ldap3::SearchEntry> for SearchEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        Self {
            dn: Dn::new(entry.dn),
            attributes: entry.attrs.into_iter().collect(),
        }
    }
}

/// The server's answer to one search round trip.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub entries: Vec<SearchEntry>,
    pub result: LdapResult,
    pub controls: Vec<RawControl>,
}

impl SearchResponse {
    pub fn control(&self, oid: &str) -> Option<&RawControl> {
        find_control(&self.controls, oid)
    }
}

/// RFC 4525 increment of `attribute` by `delta`, carried in its textual form.
pub fn increment(attribute: impl Into<String>, delta: i64) -> Mod<String> {
    Mod::Increment(attribute.into(), delta.to_string())
}

/// Replace all values of `attribute`.
pub fn replace<I, S>(attribute: impl Into<String>, values: I) -> Mod<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Mod::Replace(attribute.into(), values.into_iter().map(Into::into).collect::<HashSet<_>>())
}

/// A modify request.
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    pub dn: Dn,
    pub changes: Vec<Mod<String>>,
    pub controls: Vec<RawControl>,
}

impl ModifyRequest {
    pub fn new(dn: impl Into<Dn>, changes: Vec<Mod<String>>) -> Self {
        Self {
            dn: dn.into(),
            changes,
            controls: Vec::new(),
        }
    }

    pub fn set_control(&mut self, control: RawControl) {
        upsert_control(&mut self.controls, control);
    }

    pub fn control(&self, oid: &str) -> Option<&RawControl> {
        find_control(&self.controls, oid)
    }
}

/// The server's answer to a modify request.
#[derive(Debug, Clone)]
pub struct ModifyResponse {
    pub result: LdapResult,
    pub controls: Vec<RawControl>,
}

impl ModifyResponse {
    pub fn control(&self, oid: &str) -> Option<&RawControl> {
        find_control(&self.controls, oid)
    }
}

/// What the root DSE advertises.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootMetadata {
    #[serde(default)]
    pub supported_controls: BTreeSet<String>,
    #[serde(default)]
    pub supported_extensions: BTreeSet<String>,
    #[serde(default)]
    pub naming_contexts: Vec<Dn>,
    #[serde(default)]
    pub subschema_subentry: Option<Dn>,
    #[serde(default)]
    pub vendor_name: Option<String>,
}

impl RootMetadata {
    pub fn with_control(mut self, oid: impl Into<String>) -> Self {
        self.supported_controls.insert(oid.into());
        self
    }

    pub fn with_extension(mut self, oid: impl Into<String>) -> Self {
        self.supported_extensions.insert(oid.into());
        self
    }
}
