//! Multi-round-trip search strategies.
//!
//! Two ways to walk a result set larger than one response:
//!
//! * [`CookiePagedSearch`]: simple paged results, where the server hands back
//!   an opaque continuation cookie after every page.
//! * [`VirtualListSearch`]: virtual list view over a server-side sorted
//!   result, addressed by numeric offset.
//!
//! Round trips within one run are strictly sequential. Each request depends
//! on state extracted from the previous response.

pub mod cookie;
pub mod window;

pub use cookie::{CookiePagedSearch, PagedSearchOutcome};
pub use window::{ContentCount, SortSpec, VirtualListSearch, WindowOutcome, WindowParams, WindowState};
