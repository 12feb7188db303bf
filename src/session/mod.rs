//! Session abstraction over an open directory connection.
//!
//! The toolkit never connects, binds or negotiates TLS itself. It consumes an
//! already-authenticated channel through the [`DirectorySession`] trait and
//! leaves the session's lifecycle to whoever owns it.
//!
//! # Design Principles
//!
//! - **Blocking round trips**: each call suspends the caller until the
//!   response or a transport error arrives.
//! - **Exclusive use**: methods take `&mut self`, so one session serves one
//!   in-flight operation at a time. Parallel work needs separate sessions.
//! - **Transport vs. directory failures**: `Err` is reserved for the channel
//!   failing. A directory-level failure is an `Ok` response whose
//!   [`LdapResult`](crate::protocol::LdapResult) carries a non-success code.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
//! use directory_toolkit::session::{DirectorySession, InMemoryDirectory};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! session.add_entry(SearchEntry::new("dc=example,dc=com").with_attribute("dc", ["example"]));
//!
//! let request = SearchRequest::new("dc=example,dc=com", Scope::Base, "(objectClass=*)");
//! let response = session.search(&request)?;
//! assert_eq!(response.entries.len(), 1);
//! # Ok(())
//! # }
//! ```

mod filter;
pub mod in_memory;

pub use in_memory::{InMemoryDirectory, InMemoryError, RecordedRequest};

use crate::error::{ToolkitError, ToolkitResult};
use crate::protocol::{
    LdapResult, ModifyRequest, ModifyResponse, RootMetadata, SearchRequest, SearchResponse,
};

/// Contract for an open, authenticated directory channel.
pub trait DirectorySession {
    /// Transport-level error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one search request and collect its complete response.
    fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, Self::Error>;

    /// Send one modify request.
    fn modify(&mut self, request: &ModifyRequest) -> Result<ModifyResponse, Self::Error>;

    /// Read the root DSE.
    fn read_root_metadata(&mut self) -> Result<RootMetadata, Self::Error>;
}

impl<S> DirectorySession for &mut S
where
    S: DirectorySession + ?Sized,
{
    type Error = S::Error;

    fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, Self::Error> {
        (**self).search(request)
    }

    fn modify(&mut self, request: &ModifyRequest) -> Result<ModifyResponse, Self::Error> {
        (**self).modify(request)
    }

    fn read_root_metadata(&mut self) -> Result<RootMetadata, Self::Error> {
        (**self).read_root_metadata()
    }
}

/// Send a search, mapping transport failures to `SessionError`.
pub(crate) fn send_search<S>(session: &mut S, request: &SearchRequest) -> ToolkitResult<SearchResponse>
where
    S: DirectorySession + ?Sized,
{
    session
        .search(request)
        .map_err(|e| ToolkitError::session("search", e))
}

/// Send a modify, mapping transport failures to `SessionError`.
pub(crate) fn send_modify<S>(session: &mut S, request: &ModifyRequest) -> ToolkitResult<ModifyResponse>
where
    S: DirectorySession + ?Sized,
{
    session
        .modify(request)
        .map_err(|e| ToolkitError::session("modify", e))
}

/// Turn a non-success result into `DirectoryResultError`.
pub(crate) fn ensure_success(operation: &'static str, result: &LdapResult) -> ToolkitResult<()> {
    if result.is_success() {
        Ok(())
    } else {
        Err(ToolkitError::directory(
            operation,
            result.code,
            result.message.clone(),
        ))
    }
}
