//! LDAP directory client core for Rust.
//!
//! Capability negotiation, cookie-based paging, virtual list view paging and
//! atomic increments over an already-open directory session.
//!
//! # Core Components
//!
//! - [`negotiation`] - Decide from the root DSE whether a control is usable
//! - [`CookiePagedSearch`] - Simple paged results walk
//! - [`VirtualListSearch`] - Sorted, offset-addressed window walk
//! - [`AtomicIncrement`] - Increment with pre-read/post-read snapshots
//! - [`DirectorySession`] - Trait the caller implements over its connection
//!
//! # Quick Start
//!
//! ```rust
//! use directory_toolkit::{CookiePagedSearch, InMemoryDirectory};
//! use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! session.add_entry(SearchEntry::new("dc=example,dc=com"));
//!
//! let request = SearchRequest::new("dc=example,dc=com", Scope::Subtree, "(objectClass=*)");
//! let outcome = CookiePagedSearch::new(100)?.run(&mut session, &request)?;
//! println!("{} entries", outcome.total_entries);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controls;
pub mod error;
pub mod increment;
pub mod negotiation;
pub mod paging;
pub mod protocol;
pub mod report;
pub mod schema;
pub mod session;

// Re-export commonly used types for convenience
pub use config::{IncrementSettings, SearchScope, SearchSettings, ToolkitConfig};
pub use controls::{ContextId, PageToken, SortKey};
pub use error::{ProtocolError, ToolkitError, ToolkitResult};
pub use increment::{AtomicIncrement, BeforeAfterSnapshot, IncrementOutcome, IncrementRequest};
pub use negotiation::{Capability, CapabilityKind};
pub use paging::{
    ContentCount, CookiePagedSearch, PagedSearchOutcome, SortSpec, VirtualListSearch,
    WindowOutcome, WindowParams, WindowState,
};
pub use protocol::{Dn, ResultCode};
pub use report::{CollectingSink, ErrorSink, LogSink, report_error};
pub use schema::SchemaCatalog;
pub use session::{DirectorySession, InMemoryDirectory};
