//! Simple paged results (RFC 2696).
//!
//! The pager keeps asking for pages until the server returns an absent or
//! empty cookie. Termination depends on the cookie alone: a page with zero
//! entries and a non-empty cookie is legal and the walk continues.
//!
//! # Example
//!
//! ```rust
//! use directory_toolkit::paging::CookiePagedSearch;
//! use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
//! use directory_toolkit::session::InMemoryDirectory;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = InMemoryDirectory::new();
//! session.add_entry(SearchEntry::new("dc=example,dc=com"));
//! for i in 0..25 {
//!     session.add_entry(SearchEntry::new(format!("uid=u{},dc=example,dc=com", i)));
//! }
//!
//! let request = SearchRequest::new("dc=example,dc=com", Scope::OneLevel, "(objectClass=*)");
//! let outcome = CookiePagedSearch::new(10)?.run(&mut session, &request)?;
//! assert_eq!(outcome.total_entries, 25);
//! assert_eq!(outcome.pages, 3);
//! # Ok(())
//! # }
//! ```

use crate::controls::paged::decode_paged;
use crate::controls::{PageToken, decode_control, oid, paged_control};
use crate::error::{ToolkitError, ToolkitResult};
use crate::negotiation::{self, Capability};
use crate::protocol::{ResultCode, SearchEntry, SearchRequest};
use crate::session::{DirectorySession, ensure_success, send_search};
use log::{debug, info, warn};

/// Result of a completed cookie-paged search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedSearchOutcome {
    /// Entries received across all pages.
    pub total_entries: u64,
    /// Result code of the final page.
    pub result_code: ResultCode,
    /// Number of round trips made.
    pub pages: u32,
    /// The server's result set size estimate from the last page, when it
    /// sent a non-zero one.
    pub size_estimate: Option<u32>,
}

/// Where the walk stands between round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    Ready,
    HasMore(PageToken),
    Done,
}

/// Cookie-based pager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePagedSearch {
    page_size: u32,
}

impl CookiePagedSearch {
    /// Create a pager requesting `page_size` entries per round trip.
    pub fn new(page_size: u32) -> ToolkitResult<Self> {
        if page_size == 0 {
            return Err(ToolkitError::invalid_request("page size must be at least 1"));
        }
        Ok(Self { page_size })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Walk every page, counting entries.
    pub fn run<S>(&self, session: &mut S, request: &SearchRequest) -> ToolkitResult<PagedSearchOutcome>
    where
        S: DirectorySession + ?Sized,
    {
        self.run_with(session, request, |_| {})
    }

    /// Walk every page, handing each entry to `on_entry` as its page arrives.
    ///
    /// Entries already delivered stay delivered if a later page fails, but the
    /// call then returns the error and no totals.
    pub fn run_with<S, F>(
        &self,
        session: &mut S,
        request: &SearchRequest,
        mut on_entry: F,
    ) -> ToolkitResult<PagedSearchOutcome>
    where
        S: DirectorySession + ?Sized,
        F: FnMut(&SearchEntry),
    {
        if !negotiation::supports(session, &Capability::PAGED_RESULTS)? {
            return Err(ToolkitError::unsupported(Capability::PAGED_RESULTS));
        }

        let mut request = request.clone();
        let mut state = PageState::Ready;
        let mut total: u64 = 0;
        let mut pages: u32 = 0;
        let mut result_code = ResultCode::SUCCESS;
        let mut size_estimate = None;

        loop {
            let cookie = match state {
                PageState::Ready => PageToken::empty(),
                PageState::HasMore(token) => token,
                PageState::Done => break,
            };
            request.set_control(paged_control(self.page_size, &cookie, true));
            pages += 1;
            debug!(
                "requesting page {} (size {}, cookie {} bytes)",
                pages,
                self.page_size,
                cookie.len()
            );

            let response = send_search(session, &request)?;
            ensure_success("paged search", &response.result)?;
            result_code = response.result.code;

            for entry in &response.entries {
                on_entry(entry);
            }
            total += response.entries.len() as u64;

            let paged = decode_control(&response.controls, oid::PAGED_RESULTS, decode_paged)?;
            let (estimate, cookie) = match paged {
                Some(paged) => (u32::try_from(paged.size).unwrap_or(0), PageToken::from(paged.cookie)),
                None => (0, PageToken::empty()),
            };
            if estimate > 0 {
                size_estimate = Some(estimate);
            }

            state = match cookie.non_empty() {
                Some(cookie) => {
                    if response.entries.is_empty() {
                        warn!("page {} was empty but carried cookie {}", pages, cookie);
                    }
                    PageState::HasMore(cookie)
                }
                None => PageState::Done,
            };
        }

        info!("paged search returned {} entries in {} pages", total, pages);
        Ok(PagedSearchOutcome {
            total_entries: total,
            result_code,
            pages,
            size_estimate,
        })
    }
}
