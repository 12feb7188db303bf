//! Simple paged results walks.

use crate::common::fixtures::{directory_with_people, people_search};
use crate::common::init_logging;
use crate::common::scripted::{ScriptedSession, page, search_response};
use directory_toolkit::controls::{PagedResults, decode_control, oid, raw_control};
use directory_toolkit::controls::paged::decode_paged;
use directory_toolkit::paging::CookiePagedSearch;
use directory_toolkit::protocol::ResultCode;
use directory_toolkit::{ProtocolError, ToolkitError};

#[test]
fn test_total_is_independent_of_page_size() {
    init_logging();
    for page_size in [1, 2, 5, 10, 25, 50, 100] {
        let mut session = directory_with_people(50);
        let outcome = CookiePagedSearch::new(page_size)
            .unwrap()
            .run(&mut session, &people_search())
            .unwrap();
        assert_eq!(outcome.total_entries, 50, "page size {}", page_size);
        assert!(outcome.result_code.is_success());
    }
}

#[test]
fn test_no_request_after_empty_cookie() {
    init_logging();
    let mut session = directory_with_people(40);
    let outcome = CookiePagedSearch::new(10)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();
    assert_eq!(outcome.pages, 4);
    assert_eq!(session.search_requests().len(), 4);
}

#[test]
fn test_first_request_carries_empty_cookie_then_server_cookie() {
    init_logging();
    let mut session = directory_with_people(6);
    CookiePagedSearch::new(3)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();

    let controls: Vec<PagedResults> = session
        .search_requests()
        .iter()
        .map(|r| {
            decode_control(&r.controls, oid::PAGED_RESULTS, decode_paged)
                .unwrap()
                .unwrap()
        })
        .collect();
    assert_eq!(controls.len(), 2);
    assert!(controls[0].cookie.is_empty());
    assert!(!controls[1].cookie.is_empty());
    assert!(controls.iter().all(|c| c.size == 3));
}

#[test]
fn test_limits_repeated_on_every_page() {
    init_logging();
    let mut session = directory_with_people(25);
    let request = people_search().with_size_limit(500).with_time_limit(7);
    let outcome = CookiePagedSearch::new(10)
        .unwrap()
        .run(&mut session, &request)
        .unwrap();
    assert_eq!(outcome.pages, 3);

    let limits: Vec<(u32, u32)> = session
        .search_requests()
        .iter()
        .map(|r| (r.size_limit, r.time_limit))
        .collect();
    assert_eq!(limits, vec![(500, 7); 3]);
}

#[test]
fn test_server_page_cap_does_not_change_total() {
    init_logging();
    let mut session = directory_with_people(30).with_page_size_limit(7);
    let outcome = CookiePagedSearch::new(100)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();
    assert_eq!(outcome.total_entries, 30);
    assert_eq!(outcome.pages, 5);
    assert_eq!(outcome.size_estimate, Some(30));
}

#[test]
fn test_empty_page_with_cookie_keeps_walking() {
    init_logging();
    let mut session = ScriptedSession::new()
        .then_search(page(3, "a", b"\x00\x01"))
        .then_search(page(0, "b", b"\x00\x02"))
        .then_search(page(2, "c", b""));
    let outcome = CookiePagedSearch::new(3)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();
    assert_eq!(outcome.total_entries, 5);
    assert_eq!(outcome.pages, 3);
    assert_eq!(session.remaining_searches(), 0);
}

#[test]
fn test_cookie_round_tripped_verbatim() {
    init_logging();
    let cookie = [0xff, 0x00, 0x7f, b'x', 0x80];
    let mut session = ScriptedSession::new()
        .then_search(page(1, "a", &cookie))
        .then_search(page(1, "b", b""));
    CookiePagedSearch::new(1)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();

    let sent = decode_control(&session.search_log[1].controls, oid::PAGED_RESULTS, decode_paged)
        .unwrap()
        .unwrap();
    assert_eq!(sent.cookie, cookie);
}

#[test]
fn test_absent_control_ends_walk() {
    init_logging();
    let mut session = ScriptedSession::new().then_search(search_response(
        crate::common::scripted::entries(4, "a"),
        Vec::new(),
    ));
    let outcome = CookiePagedSearch::new(10)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap();
    assert_eq!(outcome.total_entries, 4);
    assert_eq!(outcome.size_estimate, None);
}

#[test]
fn test_malformed_cookie_control_is_protocol_error() {
    init_logging();
    let garbage = raw_control(oid::PAGED_RESULTS, false, vec![0x30, 0x84, 0xff]);
    let mut session = ScriptedSession::new().then_search(search_response(Vec::new(), vec![garbage]));
    let err = CookiePagedSearch::new(10)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap_err();
    assert!(matches!(
        err,
        ToolkitError::Protocol(ProtocolError::MalformedControl { .. })
    ));
    assert_eq!(err.result_code(), None);
}

#[test]
fn test_failure_discards_partial_total() {
    init_logging();
    let mut session = directory_with_people(30);
    session.fail_search_after(2, ResultCode::ADMIN_LIMIT_EXCEEDED);
    let mut delivered = 0;
    let err = CookiePagedSearch::new(10)
        .unwrap()
        .run_with(&mut session, &people_search(), |_| delivered += 1)
        .unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::ADMIN_LIMIT_EXCEEDED));
    assert_eq!(delivered, 20);
    assert_eq!(session.search_requests().len(), 3);
}

#[test]
fn test_transport_failure_is_session_error() {
    init_logging();
    let mut session = ScriptedSession::new().then_search(page(2, "a", b"more"));
    let err = CookiePagedSearch::new(2)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap_err();
    assert!(matches!(err, ToolkitError::Session { operation: "search", .. }));
}
