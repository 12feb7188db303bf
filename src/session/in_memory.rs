//! In-memory directory implementing [`DirectorySession`].
//!
//! A complete, single-process directory intended for tests, benchmarks and
//! demonstrations. It understands every control the toolkit sends:
//!
//! * Simple paged results with server-issued cookies
//! * Server-side sorting with integer-aware ordering
//! * Virtual list view by offset or by assertion value
//! * Pre-read and post-read entry controls on modify
//! * RFC 4525 increment modifications
//!
//! It records every request it observes so callers can assert on exactly
//! what went over the "wire", and it can inject directory failures and
//! transport failures on demand.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
//! use directory_toolkit::session::{DirectorySession, InMemoryDirectory};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut directory = InMemoryDirectory::new().with_page_size_limit(50);
//! directory.add_entry(SearchEntry::new("dc=example,dc=com"));
//! directory.add_entry(
//!     SearchEntry::new("uid=jdoe,ou=people,dc=example,dc=com").with_attribute("uid", ["jdoe"]),
//! );
//!
//! let request = SearchRequest::new("dc=example,dc=com", Scope::Subtree, "(uid=jdoe)");
//! let response = directory.search(&request)?;
//! assert_eq!(response.entries.len(), 1);
//! assert_eq!(directory.search_requests().len(), 1);
//! # Ok(())
//! # }
//! ```

use super::DirectorySession;
use super::filter::{Filter, compare_values};
use crate::controls::paged::decode_paged;
use crate::controls::{
    ContextId, PageToken, PagedResults, RawControl, ReadEntryKind, ReadEntryRequest,
    ReadEntryResponse, ServerSideSort, SortResponse, VlvRequest, VlvResponse, VlvTarget,
    decode_control, oid, paged_control, raw_control,
};
use crate::negotiation::Capability;
use crate::protocol::{
    Dn, LdapResult, Mod, ModifyRequest, ModifyResponse, ResultCode, RootMetadata, Scope,
    SearchEntry, SearchRequest, SearchResponse, find_control,
};
use crate::schema::{DEFAULT_SUBSCHEMA_DN, SchemaCatalog};
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

const COOKIE_PREFIX: &[u8] = b"page:";

/// Attribute types the directory starts with.
const DEFAULT_ATTRIBUTE_TYPES: &[&str] = &[
    "( 2.5.4.0 NAME 'objectClass' EQUALITY objectIdentifierMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.38 )",
    "( 2.5.4.41 NAME 'name' EQUALITY caseIgnoreMatch SUBSTR caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{32768} )",
    "( 2.5.4.3 NAME ( 'cn' 'commonName' ) SUP name )",
    "( 2.5.4.4 NAME ( 'sn' 'surname' ) SUP name )",
    "( 2.5.4.42 NAME ( 'givenName' 'gn' ) SUP name )",
    "( 2.5.4.11 NAME ( 'ou' 'organizationalUnitName' ) SUP name )",
    "( 2.5.4.13 NAME 'description' EQUALITY caseIgnoreMatch SUBSTR caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{1024} )",
    "( 0.9.2342.19200300.100.1.1 NAME ( 'uid' 'userid' ) EQUALITY caseIgnoreMatch SUBSTR caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{256} )",
    "( 0.9.2342.19200300.100.1.3 NAME ( 'mail' 'rfc822Mailbox' ) EQUALITY caseIgnoreIA5Match SUBSTR caseIgnoreIA5SubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.26{256} )",
    "( 0.9.2342.19200300.100.1.25 NAME ( 'dc' 'domainComponent' ) EQUALITY caseIgnoreIA5Match SUBSTR caseIgnoreIA5SubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.26 SINGLE-VALUE )",
    "( 2.16.840.1.113730.3.1.3 NAME 'employeeNumber' EQUALITY caseIgnoreMatch SUBSTR caseIgnoreSubstringsMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.15 SINGLE-VALUE )",
    "( 1.3.6.1.1.1.1.0 NAME 'uidNumber' EQUALITY integerMatch ORDERING integerOrderingMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE )",
    "( 1.3.6.1.1.1.1.1 NAME 'gidNumber' EQUALITY integerMatch ORDERING integerOrderingMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE )",
];

/// Transport failures the in-memory directory can simulate.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("Connection to in-memory directory is closed")]
    Disconnected,
}

/// A request the directory observed, in arrival order.
#[derive(Debug, Clone)]
pub enum RecordedRequest {
    RootMetadata,
    Search(SearchRequest),
    Modify(ModifyRequest),
}

#[derive(Debug, Clone)]
struct SearchFault {
    remaining: usize,
    code: ResultCode,
}

/// In-process directory server.
///
/// Entries are keyed by normalized DN, so iteration order (and therefore the
/// order of unsorted results) is stable.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    entries: BTreeMap<String, SearchEntry>,
    metadata: RootMetadata,
    attribute_types: Vec<String>,
    page_size_limit: Option<u32>,
    search_fault: Option<SearchFault>,
    modify_fault: Option<ResultCode>,
    connected: bool,
    next_context: u32,
    requests: Vec<RecordedRequest>,
}

impl InMemoryDirectory {
    /// Create an empty directory advertising every control the toolkit uses.
    pub fn new() -> Self {
        let metadata = RootMetadata {
            subschema_subentry: Some(Dn::new(DEFAULT_SUBSCHEMA_DN)),
            vendor_name: Some("directory-toolkit in-memory".to_string()),
            ..RootMetadata::default()
        }
        .with_control(oid::PAGED_RESULTS)
        .with_control(oid::SORT_REQUEST)
        .with_control(oid::VLV_REQUEST)
        .with_control(oid::PRE_READ)
        .with_control(oid::POST_READ)
        .with_extension(Capability::WHO_AM_I.id());

        Self {
            entries: BTreeMap::new(),
            metadata,
            attribute_types: DEFAULT_ATTRIBUTE_TYPES.iter().map(|d| d.to_string()).collect(),
            page_size_limit: None,
            search_fault: None,
            modify_fault: None,
            connected: true,
            next_context: 1,
            requests: Vec::new(),
        }
    }

    /// Stop advertising (and honouring) a control.
    pub fn without_control(mut self, control_oid: &str) -> Self {
        self.metadata.supported_controls.remove(control_oid);
        self
    }

    pub fn with_metadata(mut self, metadata: RootMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace the root DSE contents.
    pub fn set_metadata(&mut self, metadata: RootMetadata) {
        self.metadata = metadata;
    }

    /// Add an `attributeTypes` definition to the subschema.
    pub fn with_attribute_type(mut self, definition: impl Into<String>) -> Self {
        self.attribute_types.push(definition.into());
        self
    }

    /// Cap the page size the server honours, like a server-side limit.
    pub fn with_page_size_limit(mut self, limit: u32) -> Self {
        self.page_size_limit = Some(limit);
        self
    }

    pub fn with_entries<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = SearchEntry>,
    {
        for entry in entries {
            self.add_entry(entry);
        }
        self
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, entry: SearchEntry) {
        self.entries.insert(entry.dn.normalized(), entry);
    }

    pub fn entry(&self, dn: &Dn) -> Option<&SearchEntry> {
        self.entries.get(&dn.normalized())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Let `successful` more searches through, then answer the next one
    /// with `code`.
    pub fn fail_search_after(&mut self, successful: usize, code: ResultCode) {
        self.search_fault = Some(SearchFault {
            remaining: successful,
            code,
        });
    }

    /// Answer the next modify with `code`.
    pub fn fail_next_modify(&mut self, code: ResultCode) {
        self.modify_fault = Some(code);
    }

    /// Simulate a dropped connection: every call fails at the transport level.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    /// Every request observed while connected.
    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn search_requests(&self) -> Vec<&SearchRequest> {
        self.requests
            .iter()
            .filter_map(|r| match r {
                RecordedRequest::Search(search) => Some(search),
                _ => None,
            })
            .collect()
    }

    pub fn modify_requests(&self) -> Vec<&ModifyRequest> {
        self.requests
            .iter()
            .filter_map(|r| match r {
                RecordedRequest::Modify(modify) => Some(modify),
                _ => None,
            })
            .collect()
    }

    pub fn metadata_reads(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| matches!(r, RecordedRequest::RootMetadata))
            .count()
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    fn catalog(&self) -> SchemaCatalog {
        SchemaCatalog::from_definitions(&self.attribute_types)
    }

    fn check_connected(&self) -> Result<(), InMemoryError> {
        if self.connected {
            Ok(())
        } else {
            Err(InMemoryError::Disconnected)
        }
    }

    /// OID of the first critical control the directory does not support.
    fn unsupported_critical<'a>(&self, controls: &'a [RawControl]) -> Option<&'a str> {
        controls
            .iter()
            .find(|c| c.crit && !self.metadata.supported_controls.contains(&c.ctype))
            .map(|c| c.ctype.as_str())
    }

    /// Decode a request control the directory supports. Unsupported
    /// non-critical controls are ignored.
    fn request_control<T, F>(&self, controls: &[RawControl], control_oid: &str, decode: F) -> Result<Option<T>, LdapResult>
    where
        F: FnOnce(&[u8]) -> Option<T>,
    {
        if !self.metadata.supported_controls.contains(control_oid) {
            return Ok(None);
        }
        decode_control(controls, control_oid, decode)
            .map_err(|e| LdapResult::with_code(ResultCode::PROTOCOL_ERROR, e.to_string()))
    }

    fn execute_search(&mut self, request: &SearchRequest) -> SearchResponse {
        if let Some(fault) = self.search_fault.as_mut() {
            if fault.remaining == 0 {
                let code = fault.code;
                self.search_fault = None;
                return failed_search(LdapResult::with_code(code, "injected failure"), Vec::new());
            }
            fault.remaining -= 1;
        }

        if let Some(response) = self.special_entry(request) {
            return response;
        }
        if let Some(unsupported) = self.unsupported_critical(&request.controls) {
            return failed_search(
                LdapResult::with_code(
                    ResultCode::UNAVAILABLE_CRITICAL_EXTENSION,
                    format!("critical control {} is not supported", unsupported),
                ),
                Vec::new(),
            );
        }
        let Some(filter) = Filter::parse(&request.filter) else {
            return failed_search(
                LdapResult::with_code(ResultCode::PROTOCOL_ERROR, "malformed search filter"),
                Vec::new(),
            );
        };
        if !request.base.is_root() && !self.entries.contains_key(&request.base.normalized()) {
            return failed_search(
                LdapResult::with_code(ResultCode::NO_SUCH_OBJECT, format!("{} does not exist", request.base)),
                Vec::new(),
            );
        }

        let mut candidates: Vec<SearchEntry> = self
            .entries
            .values()
            .filter(|entry| in_scope(&entry.dn, &request.base, request.scope))
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        match self.search_with_controls(request, &mut candidates) {
            Ok((entries, result, controls)) => SearchResponse {
                entries: entries
                    .iter()
                    .map(|entry| project(entry, &request.attributes))
                    .collect(),
                result,
                controls,
            },
            Err((result, controls)) => failed_search(result, controls),
        }
    }

    #[allow(clippy::type_complexity)]
    fn search_with_controls(
        &mut self,
        request: &SearchRequest,
        candidates: &mut Vec<SearchEntry>,
    ) -> Result<(Vec<SearchEntry>, LdapResult, Vec<RawControl>), (LdapResult, Vec<RawControl>)> {
        let mut controls = Vec::new();

        let sort = self
            .request_control(&request.controls, oid::SORT_REQUEST, ServerSideSort::decode)
            .map_err(|result| (result, Vec::new()))?;
        if let Some(sort) = &sort {
            let catalog = self.catalog();
            let unknown = sort.keys.iter().find(|key| !catalog.is_defined(&key.attribute));
            match unknown {
                Some(key) => {
                    let response = SortResponse {
                        result: ResultCode::NO_SUCH_ATTRIBUTE,
                        attribute: Some(key.attribute.clone()),
                    };
                    controls.push(raw_control(oid::SORT_RESPONSE, false, response.encode_value()));
                    let critical = find_control(&request.controls, oid::SORT_REQUEST).is_some_and(|c| c.crit);
                    if critical {
                        return Err((
                            LdapResult::with_code(
                                ResultCode::UNAVAILABLE_CRITICAL_EXTENSION,
                                format!("cannot sort on {}", key.attribute),
                            ),
                            controls,
                        ));
                    }
                }
                None => {
                    candidates.sort_by(|a, b| compare_entries(a, b, sort));
                    let response = SortResponse {
                        result: ResultCode::SUCCESS,
                        attribute: None,
                    };
                    controls.push(raw_control(oid::SORT_RESPONSE, false, response.encode_value()));
                }
            }
        }

        let vlv = self
            .request_control(&request.controls, oid::VLV_REQUEST, VlvRequest::decode)
            .map_err(|result| (result, controls.clone()))?;
        if let Some(vlv) = vlv {
            return self.vlv_window(&vlv, sort.as_ref(), candidates, controls);
        }

        let paged = self
            .request_control(&request.controls, oid::PAGED_RESULTS, decode_paged)
            .map_err(|result| (result, controls.clone()))?;
        if let Some(paged) = paged {
            return self.paged_window(&paged, candidates, controls);
        }

        let limit = request.size_limit as usize;
        if limit > 0 && candidates.len() > limit {
            let returned = candidates[..limit].to_vec();
            return Ok((
                returned,
                LdapResult::with_code(ResultCode::SIZE_LIMIT_EXCEEDED, "size limit exceeded"),
                controls,
            ));
        }
        Ok((candidates.clone(), LdapResult::success(), controls))
    }

    #[allow(clippy::type_complexity)]
    fn paged_window(
        &self,
        paged: &PagedResults,
        candidates: &[SearchEntry],
        mut controls: Vec<RawControl>,
    ) -> Result<(Vec<SearchEntry>, LdapResult, Vec<RawControl>), (LdapResult, Vec<RawControl>)> {
        let total = candidates.len();
        let estimate = u32::try_from(total).unwrap_or(u32::MAX);
        let requested = u32::try_from(paged.size).unwrap_or(0);

        // A zero page size abandons the paged search.
        if requested == 0 {
            controls.push(paged_control(estimate, &PageToken::empty(), false));
            return Ok((Vec::new(), LdapResult::success(), controls));
        }

        let start = if paged.cookie.is_empty() {
            0
        } else {
            match decode_cookie(&paged.cookie) {
                Some(start) if start <= total => start,
                _ => {
                    return Err((
                        LdapResult::with_code(ResultCode::UNWILLING_TO_PERFORM, "invalid paged results cookie"),
                        controls,
                    ));
                }
            }
        };

        let size = self
            .page_size_limit
            .map_or(requested, |limit| requested.min(limit)) as usize;
        let end = (start + size).min(total);
        let cookie = if end < total {
            encode_cookie(end)
        } else {
            PageToken::empty()
        };
        trace!("paged window {}..{} of {}", start, end, total);

        controls.push(paged_control(estimate, &cookie, false));
        Ok((candidates[start..end].to_vec(), LdapResult::success(), controls))
    }

    #[allow(clippy::type_complexity)]
    fn vlv_window(
        &mut self,
        vlv: &VlvRequest,
        sort: Option<&ServerSideSort>,
        candidates: &[SearchEntry],
        mut controls: Vec<RawControl>,
    ) -> Result<(Vec<SearchEntry>, LdapResult, Vec<RawControl>), (LdapResult, Vec<RawControl>)> {
        let count = candidates.len() as u64;
        let respond = |position: u64, result: ResultCode, context_id: Option<ContextId>| {
            VlvResponse {
                target_position: u32::try_from(position).unwrap_or(u32::MAX),
                content_count: u32::try_from(count).unwrap_or(u32::MAX),
                result,
                context_id,
            }
            .encode_value()
        };

        let Some(sort) = sort else {
            controls.push(raw_control(
                oid::VLV_RESPONSE,
                false,
                respond(0, ResultCode::SORT_CONTROL_MISSING, None),
            ));
            return Err((
                LdapResult::with_code(ResultCode::SORT_CONTROL_MISSING, "virtual list view requires sorting"),
                controls,
            ));
        };

        let target = match &vlv.target {
            VlvTarget::ByOffset {
                offset,
                content_count,
            } => {
                if *offset == 0 {
                    controls.push(raw_control(
                        oid::VLV_RESPONSE,
                        false,
                        respond(0, ResultCode::OFFSET_RANGE_ERROR, None),
                    ));
                    return Err((
                        LdapResult::with_code(ResultCode::OFFSET_RANGE_ERROR, "offset must be at least 1"),
                        controls,
                    ));
                }
                let offset = *offset as u64;
                let client_count = *content_count as u64;
                if client_count == 0 || client_count == count {
                    offset
                } else {
                    // Scale the client's position onto the current list size.
                    (offset * count / client_count).max(1)
                }
            }
            VlvTarget::GreaterThanOrEqual(assertion) => {
                let Some(key) = sort.keys.first() else {
                    return Err((
                        LdapResult::with_code(ResultCode::PROTOCOL_ERROR, "sort request has no keys"),
                        controls,
                    ));
                };
                candidates
                    .iter()
                    .position(|entry| {
                        let value = entry.first_value(&key.attribute).unwrap_or_default();
                        let ordering = compare_values(value, assertion);
                        if key.reverse {
                            ordering != Ordering::Greater
                        } else {
                            ordering != Ordering::Less
                        }
                    })
                    .map_or(count + 1, |index| index as u64 + 1)
            }
        };
        let target = target.min(count + 1);

        let first = target.saturating_sub(vlv.before_count as u64).max(1);
        let last = (target + vlv.after_count as u64).min(count);
        let window = if first <= last {
            candidates[(first - 1) as usize..last as usize].to_vec()
        } else {
            Vec::new()
        };

        let context_id = ContextId::from(format!("vlv-{}", self.next_context).into_bytes());
        self.next_context += 1;
        debug!(
            "vlv target {} window {}..={} of {} ({} entries)",
            target,
            first,
            last,
            count,
            window.len()
        );

        controls.push(raw_control(
            oid::VLV_RESPONSE,
            false,
            respond(target, ResultCode::SUCCESS, Some(context_id)),
        ));
        Ok((window, LdapResult::success(), controls))
    }

    /// Root DSE and subschema subentry, which live outside the entry tree.
    fn special_entry(&self, request: &SearchRequest) -> Option<SearchResponse> {
        if !matches!(request.scope, Scope::Base) {
            return None;
        }
        let entry = if request.base.is_root() {
            let mut root = SearchEntry::new(Dn::root())
                .with_attribute("supportedControl", self.metadata.supported_controls.iter().cloned())
                .with_attribute("supportedExtension", self.metadata.supported_extensions.iter().cloned())
                .with_attribute(
                    "namingContexts",
                    self.metadata.naming_contexts.iter().map(|dn| dn.to_string()),
                );
            if let Some(subschema) = &self.metadata.subschema_subentry {
                root = root.with_attribute("subschemaSubentry", [subschema.to_string()]);
            }
            root
        } else {
            let subschema = self.metadata.subschema_subentry.as_ref()?;
            if !request.base.matches(subschema) {
                return None;
            }
            SearchEntry::new(subschema.clone())
                .with_attribute("objectClass", ["top", "subschema"])
                .with_attribute("attributeTypes", self.attribute_types.iter().cloned())
        };
        Some(SearchResponse {
            entries: vec![project(&entry, &request.attributes)],
            result: LdapResult::success(),
            controls: Vec::new(),
        })
    }

    fn execute_modify(&mut self, request: &ModifyRequest) -> ModifyResponse {
        if let Some(code) = self.modify_fault.take() {
            return failed_modify(LdapResult::with_code(code, "injected failure"));
        }
        if let Some(unsupported) = self.unsupported_critical(&request.controls) {
            return failed_modify(LdapResult::with_code(
                ResultCode::UNAVAILABLE_CRITICAL_EXTENSION,
                format!("critical control {} is not supported", unsupported),
            ));
        }

        let mut reads = Vec::new();
        for kind in [ReadEntryKind::Before, ReadEntryKind::After] {
            match self.request_control(&request.controls, kind.oid(), |value| {
                ReadEntryRequest::decode(kind, value)
            }) {
                Ok(Some(read)) => reads.push(read),
                Ok(None) => {}
                Err(result) => return failed_modify(result),
            }
        }

        let key = request.dn.normalized();
        let Some(current) = self.entries.get(&key) else {
            return failed_modify(LdapResult::with_code(
                ResultCode::NO_SUCH_OBJECT,
                format!("{} does not exist", request.dn),
            ));
        };

        let catalog = self.catalog();
        let mut updated = current.clone();
        for change in &request.changes {
            if let Err(result) = apply_change(&mut updated, change, &catalog) {
                return failed_modify(result);
            }
        }

        let controls = reads
            .iter()
            .map(|read| {
                let snapshot = match read.kind {
                    ReadEntryKind::Before => current,
                    ReadEntryKind::After => &updated,
                };
                let response = ReadEntryResponse {
                    entry: project(snapshot, &read.attributes),
                };
                raw_control(read.kind.oid(), false, response.encode_value())
            })
            .collect();

        debug!("modified {} ({} changes)", request.dn, request.changes.len());
        self.entries.insert(key, updated);
        ModifyResponse {
            result: LdapResult::success(),
            controls,
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectorySession for InMemoryDirectory {
    type Error = InMemoryError;

    fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, Self::Error> {
        self.check_connected()?;
        self.requests.push(RecordedRequest::Search(request.clone()));
        Ok(self.execute_search(request))
    }

    fn modify(&mut self, request: &ModifyRequest) -> Result<ModifyResponse, Self::Error> {
        self.check_connected()?;
        self.requests.push(RecordedRequest::Modify(request.clone()));
        Ok(self.execute_modify(request))
    }

    fn read_root_metadata(&mut self) -> Result<RootMetadata, Self::Error> {
        self.check_connected()?;
        self.requests.push(RecordedRequest::RootMetadata);
        Ok(self.metadata.clone())
    }
}

fn failed_search(result: LdapResult, controls: Vec<RawControl>) -> SearchResponse {
    SearchResponse {
        entries: Vec::new(),
        result,
        controls,
    }
}

fn failed_modify(result: LdapResult) -> ModifyResponse {
    ModifyResponse {
        result,
        controls: Vec::new(),
    }
}

fn in_scope(dn: &Dn, base: &Dn, scope: Scope) -> bool {
    match (scope, dn.depth_below(base)) {
        (Scope::Base, Some(depth)) => depth == 0,
        (Scope::OneLevel, Some(depth)) => depth == 1,
        (Scope::Subtree, Some(_)) => true,
        (_, None) => false,
    }
}

fn encode_cookie(position: usize) -> PageToken {
    let mut bytes = COOKIE_PREFIX.to_vec();
    bytes.extend_from_slice(&(position as u64).to_be_bytes());
    PageToken::from(bytes)
}

fn decode_cookie(cookie: &[u8]) -> Option<usize> {
    let position = cookie.strip_prefix(COOKIE_PREFIX)?;
    let position: [u8; 8] = position.try_into().ok()?;
    usize::try_from(u64::from_be_bytes(position)).ok()
}

fn compare_entries(a: &SearchEntry, b: &SearchEntry, sort: &ServerSideSort) -> Ordering {
    for key in &sort.keys {
        let ordering = match (a.first_value(&key.attribute), b.first_value(&key.attribute)) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y);
                if key.reverse { ordering.reverse() } else { ordering }
            }
            // Entries without a value sort last in either direction.
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Restrict an entry to the requested attributes (`*` or empty for all,
/// `1.1` for none).
fn project(entry: &SearchEntry, attributes: &[String]) -> SearchEntry {
    if attributes.is_empty() || attributes.iter().any(|a| a == "*") {
        return entry.clone();
    }
    let mut projected = SearchEntry::new(entry.dn.clone());
    for (name, values) in &entry.attributes {
        if attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            projected.attributes.insert(name.clone(), values.clone());
        }
    }
    projected
}

fn attribute_key(entry: &SearchEntry, attribute: &str) -> Option<String> {
    entry
        .attributes
        .keys()
        .find(|name| name.eq_ignore_ascii_case(attribute))
        .cloned()
}

fn apply_change(
    entry: &mut SearchEntry,
    change: &Mod<String>,
    catalog: &SchemaCatalog,
) -> Result<(), LdapResult> {
    match change {
        Mod::Add(attribute, added) => {
            let key = attribute_key(entry, attribute).unwrap_or_else(|| attribute.clone());
            let values = entry.attributes.entry(key).or_default();
            for value in sorted(added) {
                if values.iter().any(|v| compare_values(v, &value) == Ordering::Equal) {
                    return Err(LdapResult::with_code(
                        ResultCode::ATTRIBUTE_OR_VALUE_EXISTS,
                        format!("{} already has value {}", attribute, value),
                    ));
                }
                values.push(value);
            }
        }
        Mod::Delete(attribute, removed) => {
            let Some(key) = attribute_key(entry, attribute) else {
                return Err(no_such_attribute(attribute));
            };
            if removed.is_empty() {
                entry.attributes.remove(&key);
            } else {
                let values = entry.attributes.entry(key.clone()).or_default();
                for value in removed {
                    let position = values
                        .iter()
                        .position(|v| compare_values(v, value) == Ordering::Equal)
                        .ok_or_else(|| no_such_attribute(attribute))?;
                    values.remove(position);
                }
                if values.is_empty() {
                    entry.attributes.remove(&key);
                }
            }
        }
        Mod::Replace(attribute, replacement) => {
            let existing = attribute_key(entry, attribute);
            if let Some(key) = &existing {
                entry.attributes.remove(key);
            }
            if !replacement.is_empty() {
                let key = existing.unwrap_or_else(|| attribute.clone());
                entry.attributes.insert(key, sorted(replacement));
            }
        }
        Mod::Increment(attribute, delta) => {
            let delta = delta.trim().parse::<i64>().map_err(|_| {
                LdapResult::with_code(ResultCode::INVALID_ATTRIBUTE_SYNTAX, "increment value is not an integer")
            })?;
            match catalog.get(attribute) {
                None => {
                    return Err(LdapResult::with_code(
                        ResultCode::UNDEFINED_ATTRIBUTE_TYPE,
                        format!("{} is not defined", attribute),
                    ));
                }
                Some(definition) if definition.syntax.is_some() && !definition.is_integer() => {
                    return Err(not_incrementable(attribute));
                }
                Some(_) => {}
            }

            let key = attribute_key(entry, attribute).unwrap_or_else(|| attribute.clone());
            let values = entry.attributes.entry(key).or_default();
            if values.is_empty() {
                // An absent value increments from zero.
                values.push(delta.to_string());
            } else {
                for value in values.iter_mut() {
                    let current = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| not_incrementable(attribute))?;
                    let next = current
                        .checked_add(delta)
                        .ok_or_else(|| not_incrementable(attribute))?;
                    *value = next.to_string();
                }
            }
        }
    }
    Ok(())
}

/// Set values in a stable order.
fn sorted(values: &HashSet<String>) -> Vec<String> {
    let mut values: Vec<String> = values.iter().cloned().collect();
    values.sort();
    values
}

fn no_such_attribute(attribute: &str) -> LdapResult {
    LdapResult::with_code(
        ResultCode::NO_SUCH_ATTRIBUTE,
        format!("{} has no such value", attribute),
    )
}

fn not_incrementable(attribute: &str) -> LdapResult {
    LdapResult::with_code(
        ResultCode::CONSTRAINT_VIOLATION,
        format!("{} cannot be incremented", attribute),
    )
}
