//! Virtual list view paging over a server-side sorted result set.
//!
//! The client asks for a window around a 1-based target offset; the server
//! answers with the window, the current list size and an optional context
//! identifier to send back on the next request. The walk advances the
//! target by the window size until it passes the last reported list size.
//!
//! Capability and schema checks happen once, before the first search:
//!
//! 1. One root metadata read decides both the sort and VLV controls.
//! 2. The subschema named by that metadata must define every sort attribute.
//!
//! # Example
//!
//! ```rust
//! use directory_toolkit::paging::{SortSpec, VirtualListSearch, WindowParams};
//! use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
//! use directory_toolkit::session::InMemoryDirectory;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! session.add_entry(SearchEntry::new("dc=example,dc=com"));
//! for i in 0..23 {
//!     session.add_entry(
//!         SearchEntry::new(format!("uid=u{},dc=example,dc=com", i))
//!             .with_attribute("uidNumber", [(1000 + i).to_string()]),
//!     );
//! }
//!
//! let search = VirtualListSearch::new(SortSpec::ascending(["uidNumber"])?, WindowParams::new(0, 9));
//! let request = SearchRequest::new("dc=example,dc=com", Scope::OneLevel, "(uidNumber=*)");
//! let mut seen = 0;
//! let outcome = search.run(&mut session, &request, |_| seen += 1)?;
//! assert_eq!(outcome.requests, 3);
//! assert_eq!(seen, 23);
//! # Ok(())
//! # }
//! ```

use crate::controls::{
    ContextId, RawControl, RequestControl, ServerSideSort, SortKey, SortResponse, VlvRequest,
    VlvResponse, VlvTarget, decode_control, oid,
};
use crate::error::{ProtocolError, ToolkitError, ToolkitResult};
use crate::negotiation::{self, AdvertisedCapabilities, Capability};
use crate::protocol::{ResultCode, SearchEntry, SearchRequest};
use crate::schema::SchemaCatalog;
use crate::session::{DirectorySession, ensure_success, send_search};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Ordered, non-empty list of sort keys sent with every window request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SortKey>", into = "Vec<SortKey>")]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    pub fn new(keys: Vec<SortKey>) -> ToolkitResult<Self> {
        if keys.is_empty() {
            return Err(ToolkitError::invalid_request("sort specification needs at least one key"));
        }
        if let Some(key) = keys.iter().find(|key| key.attribute.trim().is_empty()) {
            return Err(ToolkitError::invalid_request(format!(
                "sort key has an empty attribute name: {:?}",
                key
            )));
        }
        Ok(Self(keys))
    }

    /// Ascending order on each attribute in turn.
    pub fn ascending<I, S>(attributes: I) -> ToolkitResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(attributes.into_iter().map(SortKey::ascending).collect())
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|key| key.attribute.as_str())
    }

    fn control(&self) -> ServerSideSort {
        ServerSideSort::new(self.0.clone())
    }
}

impl TryFrom<Vec<SortKey>> for SortSpec {
    type Error = ToolkitError;

    fn try_from(keys: Vec<SortKey>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<SortSpec> for Vec<SortKey> {
    fn from(spec: SortSpec) -> Self {
        spec.0
    }
}

/// Entries requested before and after the target in each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    pub before_count: u32,
    pub after_count: u32,
}

impl WindowParams {
    pub fn new(before_count: u32, after_count: u32) -> Self {
        Self {
            before_count,
            after_count,
        }
    }

    /// Offset step between consecutive requests.
    pub fn size(&self) -> u64 {
        self.before_count as u64 + self.after_count as u64 + 1
    }
}

/// List size as last reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentCount {
    /// No response has been processed yet.
    #[default]
    Unknown,
    Known(u32),
}

impl ContentCount {
    pub fn known(self) -> Option<u32> {
        match self {
            Self::Unknown => None,
            Self::Known(count) => Some(count),
        }
    }

    /// Value for the request control, where 0 means "no estimate".
    fn as_estimate(self) -> u32 {
        self.known().unwrap_or(0)
    }
}

/// Position of the walk between round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    /// Next 1-based target offset.
    pub target_offset: u64,
    pub content_count: ContentCount,
    pub context_id: Option<ContextId>,
    /// Sent unchanged with every window request.
    pub sort: SortSpec,
}

impl WindowState {
    pub fn initial(sort: SortSpec) -> Self {
        Self {
            target_offset: 1,
            content_count: ContentCount::Unknown,
            context_id: None,
            sort,
        }
    }

    /// Whether another window remains to be requested.
    pub fn has_more(&self) -> bool {
        match self.content_count {
            ContentCount::Unknown => true,
            ContentCount::Known(count) => self.target_offset <= count as u64,
        }
    }

    fn request_control(&self, window: WindowParams) -> ToolkitResult<VlvRequest> {
        let offset = u32::try_from(self.target_offset)
            .map_err(|_| ToolkitError::invalid_request("window offset exceeds the protocol range"))?;
        Ok(VlvRequest {
            before_count: window.before_count,
            after_count: window.after_count,
            target: VlvTarget::ByOffset {
                offset,
                content_count: self.content_count.as_estimate(),
            },
            context_id: self.context_id.clone(),
        })
    }

    /// Sort and VLV controls for the next window, both critical.
    pub fn request_controls(&self, window: WindowParams) -> ToolkitResult<[RawControl; 2]> {
        Ok([
            self.sort.control().to_control(true),
            self.request_control(window)?.to_control(true),
        ])
    }

    /// Fold in the server's answer and step to the next window.
    fn advance(&mut self, response: VlvResponse, window: WindowParams) {
        self.content_count = ContentCount::Known(response.content_count);
        self.context_id = response.context_id.and_then(ContextId::non_empty);
        self.target_offset += window.size();
    }
}

/// Result of a completed window walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    pub result_code: ResultCode,
    pub content_count: ContentCount,
    /// Number of window requests sent.
    pub requests: u32,
    /// Target offset the walk stopped at; always past the content count.
    pub final_offset: u64,
    pub entries_delivered: u64,
}

/// Offset-addressed pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualListSearch {
    sort: SortSpec,
    window: WindowParams,
}

impl VirtualListSearch {
    pub fn new(sort: SortSpec, window: WindowParams) -> Self {
        Self { sort, window }
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn window(&self) -> WindowParams {
        self.window
    }

    /// Walk the sorted result set window by window, passing each entry to
    /// `on_entry` as it arrives.
    ///
    /// Entries delivered before a failure are not retracted.
    pub fn run<S, F>(
        &self,
        session: &mut S,
        request: &SearchRequest,
        mut on_entry: F,
    ) -> ToolkitResult<WindowOutcome>
    where
        S: DirectorySession + ?Sized,
        F: FnMut(&SearchEntry),
    {
        let metadata = negotiation::read_root_metadata(session)?;
        AdvertisedCapabilities::from(&metadata)
            .require_all(&[Capability::SERVER_SIDE_SORT, Capability::VIRTUAL_LIST_VIEW])?;
        SchemaCatalog::fetch_with(session, &metadata)?.require_defined(self.sort.attributes())?;

        let mut request = request.clone();
        let mut state = WindowState::initial(self.sort.clone());
        let mut requests: u32 = 0;
        let mut delivered: u64 = 0;
        let mut result_code = ResultCode::SUCCESS;

        while state.has_more() {
            for control in state.request_controls(self.window)? {
                request.set_control(control);
            }
            requests += 1;
            debug!(
                "requesting window at offset {} (before {}, after {}, content count {:?})",
                state.target_offset, self.window.before_count, self.window.after_count, state.content_count
            );

            let response = send_search(session, &request)?;
            if let Some(sort) = decode_control(&response.controls, oid::SORT_RESPONSE, SortResponse::decode)? {
                if !sort.result.is_success() {
                    let message = sort
                        .attribute
                        .map(|attribute| format!("server could not sort on {}", attribute))
                        .unwrap_or_else(|| "server could not sort".to_string());
                    return Err(ToolkitError::directory("server-side sort", sort.result, message));
                }
            }
            ensure_success("virtual list view search", &response.result)?;
            result_code = response.result.code;

            for entry in &response.entries {
                on_entry(entry);
            }
            delivered += response.entries.len() as u64;

            let vlv = decode_control(&response.controls, oid::VLV_RESPONSE, VlvResponse::decode)?;
            let Some(vlv) = vlv else {
                return Err(match state.content_count {
                    ContentCount::Unknown => ProtocolError::MissingControl {
                        oid: oid::VLV_RESPONSE,
                    },
                    ContentCount::Known(_) => ProtocolError::MissingContentCount {
                        offset: u32::try_from(state.target_offset).unwrap_or(u32::MAX),
                    },
                }
                .into());
            };
            if !vlv.result.is_success() {
                return Err(ToolkitError::directory(
                    "virtual list view",
                    vlv.result,
                    format!("window at offset {} rejected", state.target_offset),
                ));
            }

            debug!(
                "window at offset {} returned {} entries, server position {} of {}",
                state.target_offset,
                response.entries.len(),
                vlv.target_position,
                vlv.content_count
            );
            state.advance(vlv, self.window);
        }

        info!(
            "virtual list view delivered {} entries in {} requests",
            delivered, requests
        );
        Ok(WindowOutcome {
            result_code,
            content_count: state.content_count,
            requests,
            final_offset: state.target_offset,
            entries_delivered: delivered,
        })
    }
}
