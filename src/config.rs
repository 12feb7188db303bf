//! Invocation parameters.
//!
//! Callers that drive the toolkit from a file or another process describe a
//! search and an increment as JSON. Every field has a default except the
//! ones that name something in the directory.
//!
//! ```json
//! {
//!   "search": {
//!     "baseDn": "ou=people,dc=example,dc=com",
//!     "filter": "(uid=*)",
//!     "pageSize": 50,
//!     "sortAttributes": ["uidNumber"]
//!   },
//!   "increment": {
//!     "entryDn": "uid=jdoe,ou=people,dc=example,dc=com",
//!     "attribute": "loginCount",
//!     "delta": 1
//!   }
//! }
//! ```
//!
//! Conversions into request types validate values and fail with
//! `InvalidRequest`.

use crate::error::{ToolkitError, ToolkitResult};
use crate::increment::{AtomicIncrement, IncrementRequest};
use crate::paging::{CookiePagedSearch, SortSpec, VirtualListSearch, WindowParams};
use crate::controls::SortKey;
use crate::protocol::{Dn, Scope, SearchRequest};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_FILTER: &str = "(objectClass=*)";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_AFTER_COUNT: u32 = 9;

/// Search scope as written in settings. Converts into `ldap3`'s [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Base,
    #[serde(alias = "one")]
    OneLevel,
    #[default]
    #[serde(alias = "sub")]
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Parameters for either pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    pub base_dn: Dn,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub size_limit: u32,
    #[serde(default)]
    pub time_limit_secs: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub sort_attributes: Vec<String>,
    #[serde(default)]
    pub reverse_sort: bool,
    #[serde(default)]
    pub before_count: u32,
    #[serde(default = "default_after_count")]
    pub after_count: u32,
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_after_count() -> u32 {
    DEFAULT_AFTER_COUNT
}

impl SearchSettings {
    /// Defaults for everything but the base.
    pub fn new(base_dn: impl Into<Dn>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: SearchScope::default(),
            filter: default_filter(),
            attributes: Vec::new(),
            size_limit: 0,
            time_limit_secs: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort_attributes: Vec::new(),
            reverse_sort: false,
            before_count: 0,
            after_count: DEFAULT_AFTER_COUNT,
        }
    }

    pub fn search_request(&self) -> ToolkitResult<SearchRequest> {
        if self.filter.trim().is_empty() {
            return Err(ToolkitError::invalid_request("search filter must not be empty"));
        }
        Ok(SearchRequest::new(self.base_dn.clone(), self.scope.into(), self.filter.clone())
            .with_attributes(self.attributes.iter().cloned())
            .with_size_limit(self.size_limit)
            .with_time_limit(self.time_limit_secs))
    }

    pub fn sort_spec(&self) -> ToolkitResult<SortSpec> {
        let keys = self
            .sort_attributes
            .iter()
            .map(|attribute| {
                if self.reverse_sort {
                    SortKey::descending(attribute.clone())
                } else {
                    SortKey::ascending(attribute.clone())
                }
            })
            .collect();
        SortSpec::new(keys)
    }

    pub fn window_params(&self) -> WindowParams {
        WindowParams::new(self.before_count, self.after_count)
    }

    pub fn cookie_pager(&self) -> ToolkitResult<CookiePagedSearch> {
        CookiePagedSearch::new(self.page_size)
    }

    pub fn window_pager(&self) -> ToolkitResult<VirtualListSearch> {
        Ok(VirtualListSearch::new(self.sort_spec()?, self.window_params()))
    }
}

/// Parameters for an increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementSettings {
    pub entry_dn: Dn,
    pub attribute: String,
    #[serde(default = "default_delta")]
    pub delta: i64,
    #[serde(default = "default_probe")]
    pub probe_existence: bool,
}

fn default_delta() -> i64 {
    1
}

fn default_probe() -> bool {
    true
}

impl IncrementSettings {
    pub fn increment_request(&self) -> ToolkitResult<IncrementRequest> {
        IncrementRequest::new(self.entry_dn.clone(), self.attribute.clone(), self.delta)
    }

    pub fn modifier(&self) -> AtomicIncrement {
        AtomicIncrement::new().with_probe(self.probe_existence)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolkitConfig {
    #[serde(default)]
    pub search: Option<SearchSettings>,
    #[serde(default)]
    pub increment: Option<IncrementSettings>,
}

impl ToolkitConfig {
    pub fn from_json_str(json: &str) -> ToolkitResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ToolkitError::invalid_request(format!("invalid configuration: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ToolkitResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ToolkitError::invalid_request(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
