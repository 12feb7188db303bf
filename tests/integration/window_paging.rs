//! Virtual list view walks.

use crate::common::fixtures::{directory_with_people, people_search};
use crate::common::init_logging;
use crate::common::scripted::{
    ScriptedSession, UID_NUMBER_TYPE, entries, search_response, subschema, vlv_control,
};
use directory_toolkit::controls::{SortKey, VlvRequest, VlvTarget, decode_control, oid};
use directory_toolkit::paging::{ContentCount, SortSpec, VirtualListSearch, WindowParams};
use directory_toolkit::protocol::{ResultCode, SearchEntry};
use directory_toolkit::{ProtocolError, ToolkitError};

fn by_uid_number(before: u32, after: u32) -> VirtualListSearch {
    VirtualListSearch::new(SortSpec::ascending(["uidNumber"]).unwrap(), WindowParams::new(before, after))
}

fn requested_offsets(requests: &[&directory_toolkit::protocol::SearchRequest]) -> Vec<u32> {
    requests
        .iter()
        .filter_map(|r| decode_control(&r.controls, oid::VLV_REQUEST, VlvRequest::decode).unwrap())
        .map(|vlv| match vlv.target {
            VlvTarget::ByOffset { offset, .. } => offset,
            VlvTarget::GreaterThanOrEqual(_) => panic!("walk must address by offset"),
        })
        .collect()
}

#[test]
fn test_twenty_three_entries_in_windows_of_ten() {
    init_logging();
    let mut session = directory_with_people(23);
    let mut delivered = Vec::new();
    let outcome = by_uid_number(0, 9)
        .run(&mut session, &people_search(), |entry| delivered.push(entry.dn.clone()))
        .unwrap();

    assert_eq!(outcome.requests, 3);
    assert_eq!(outcome.content_count, ContentCount::Known(23));
    assert_eq!(outcome.final_offset, 31);
    assert_eq!(delivered.len(), 23);
    assert_eq!(requested_offsets(&session.search_requests()), vec![1, 11, 21]);
}

#[test]
fn test_round_trips_are_ceil_of_count_over_window() {
    init_logging();
    for (count, before, after) in [(1, 0, 0), (10, 0, 9), (11, 0, 9), (50, 2, 2), (7, 3, 3), (0, 0, 4)] {
        let mut session = directory_with_people(count);
        let outcome = by_uid_number(before, after)
            .run(&mut session, &people_search(), |_| {})
            .unwrap();
        let window = (before + after + 1) as usize;
        let expected = count.div_ceil(window).max(1);
        assert_eq!(outcome.requests as usize, expected, "count {} window {}", count, window);
        assert!(outcome.final_offset > count as u64);
    }
}

#[test]
fn test_content_count_estimate_follows_server() {
    init_logging();
    let mut session = directory_with_people(15);
    by_uid_number(0, 4).run(&mut session, &people_search(), |_| {}).unwrap();

    let estimates: Vec<u32> = session
        .search_requests()
        .iter()
        .filter_map(|r| decode_control(&r.controls, oid::VLV_REQUEST, VlvRequest::decode).unwrap())
        .map(|vlv| match vlv.target {
            VlvTarget::ByOffset { content_count, .. } => content_count,
            VlvTarget::GreaterThanOrEqual(_) => unreachable!(),
        })
        .collect();
    assert_eq!(estimates, vec![0, 15, 15]);
}

#[test]
fn test_sort_control_accompanies_every_window() {
    init_logging();
    let mut session = directory_with_people(12);
    let sort = SortSpec::new(vec![SortKey::descending("uidNumber"), SortKey::ascending("uid")]).unwrap();
    let search = VirtualListSearch::new(sort, WindowParams::new(0, 3));
    let mut numbers = Vec::new();
    search
        .run(&mut session, &people_search(), |entry| {
            numbers.push(entry.first_value("uidNumber").unwrap().to_string())
        })
        .unwrap();

    let windows: Vec<_> = session
        .search_requests()
        .into_iter()
        .filter(|r| r.control(oid::VLV_REQUEST).is_some())
        .collect();
    assert_eq!(windows.len(), 3);
    assert!(windows.iter().all(|r| r.control(oid::SORT_REQUEST).is_some_and(|c| c.crit)));
    assert_eq!(numbers.first().map(String::as_str), Some("10011"));
    assert_eq!(numbers.last().map(String::as_str), Some("10000"));
}

#[test]
fn test_limits_repeated_on_every_window() {
    init_logging();
    let mut session = directory_with_people(25);
    let request = people_search().with_size_limit(500).with_time_limit(7);
    let outcome = by_uid_number(0, 9).run(&mut session, &request, |_| {}).unwrap();
    assert_eq!(outcome.requests, 3);

    let limits: Vec<(u32, u32)> = session
        .search_requests()
        .into_iter()
        .filter(|r| r.control(oid::VLV_REQUEST).is_some())
        .map(|r| (r.size_limit, r.time_limit))
        .collect();
    assert_eq!(limits, vec![(500, 7); 3]);
}

#[test]
fn test_undefined_sort_attribute_is_schema_error() {
    init_logging();
    let mut session = directory_with_people(5);
    let search = VirtualListSearch::new(
        SortSpec::ascending(["uidNumber", "favouriteColour"]).unwrap(),
        WindowParams::new(0, 9),
    );
    let err = search.run(&mut session, &people_search(), |_| {}).unwrap_err();
    assert!(matches!(err, ToolkitError::Schema { ref attribute } if attribute == "favouriteColour"));
    assert!(!err.is_unsupported());
    assert!(requested_offsets(&session.search_requests()).is_empty());
}

#[test]
fn test_alias_names_satisfy_schema_check() {
    init_logging();
    let mut session = directory_with_people(4);
    let search = VirtualListSearch::new(SortSpec::ascending(["commonName"]).unwrap(), WindowParams::new(0, 9));
    let outcome = search.run(&mut session, &people_search(), |_| {}).unwrap();
    assert_eq!(outcome.content_count, ContentCount::Known(4));
}

#[test]
fn test_dropped_content_count_mid_walk_aborts() {
    init_logging();
    let mut session = ScriptedSession::new()
        .then_search(subschema(&[UID_NUMBER_TYPE]))
        .then_search(search_response(
            entries(5, "a"),
            vec![vlv_control(1, 20, ResultCode::SUCCESS, Some(b"ctx-1"))],
        ))
        .then_search(search_response(entries(5, "b"), Vec::new()));

    let mut delivered = 0;
    let err = by_uid_number(0, 4)
        .run(&mut session, &people_search(), |_| delivered += 1)
        .unwrap_err();
    assert!(matches!(
        err,
        ToolkitError::Protocol(ProtocolError::MissingContentCount { offset: 6 })
    ));
    assert_eq!(delivered, 10, "delivered entries are not retracted");
}

#[test]
fn test_missing_control_on_first_response() {
    init_logging();
    let mut session = ScriptedSession::new()
        .then_search(subschema(&[UID_NUMBER_TYPE]))
        .then_search(search_response(entries(3, "a"), Vec::new()));
    let err = by_uid_number(0, 4).run(&mut session, &people_search(), |_| {}).unwrap_err();
    assert!(matches!(
        err,
        ToolkitError::Protocol(ProtocolError::MissingControl { oid: oid::VLV_RESPONSE })
    ));
}

#[test]
fn test_context_id_from_server_is_sent_back() {
    init_logging();
    let mut session = ScriptedSession::new()
        .then_search(subschema(&[UID_NUMBER_TYPE]))
        .then_search(search_response(
            entries(2, "a"),
            vec![vlv_control(1, 4, ResultCode::SUCCESS, Some(b"\x01\x02\x03"))],
        ))
        .then_search(search_response(
            entries(2, "b"),
            vec![vlv_control(3, 4, ResultCode::SUCCESS, None)],
        ));
    let outcome = by_uid_number(0, 1).run(&mut session, &people_search(), |_| {}).unwrap();
    assert_eq!(outcome.requests, 2);

    let second = decode_control(&session.search_log[2].controls, oid::VLV_REQUEST, VlvRequest::decode)
        .unwrap()
        .unwrap();
    assert_eq!(second.context_id.unwrap().as_bytes(), b"\x01\x02\x03");
}

#[test]
fn test_vlv_result_code_is_surfaced() {
    init_logging();
    let mut session = ScriptedSession::new()
        .then_search(subschema(&[UID_NUMBER_TYPE]))
        .then_search(search_response(
            Vec::new(),
            vec![vlv_control(0, 0, ResultCode::OFFSET_RANGE_ERROR, None)],
        ));
    let err = by_uid_number(0, 4).run(&mut session, &people_search(), |_| {}).unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::OFFSET_RANGE_ERROR));
}

#[test]
fn test_server_error_mid_walk() {
    init_logging();
    let mut session = directory_with_people(30);
    // The subschema read and the first window succeed.
    session.fail_search_after(2, ResultCode::TIME_LIMIT_EXCEEDED);
    let mut delivered: Vec<SearchEntry> = Vec::new();
    let err = by_uid_number(0, 9)
        .run(&mut session, &people_search(), |entry| delivered.push(entry.clone()))
        .unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::TIME_LIMIT_EXCEEDED));
    assert_eq!(delivered.len(), 10);
}
