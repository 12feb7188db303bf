//! Runs assembled from JSON settings, with failures handed to a sink.

use crate::common::fixtures::{PEOPLE_BASE, directory_with_people, person_dn};
use crate::common::init_logging;
use directory_toolkit::controls::oid;
use directory_toolkit::protocol::ResultCode;
use directory_toolkit::report::{CollectingSink, report_error};
use directory_toolkit::ToolkitConfig;

fn config(page_size: u32, sort: &str) -> ToolkitConfig {
    ToolkitConfig::from_json_str(&format!(
        r#"{{
            "search": {{
                "baseDn": "{}",
                "scope": "one",
                "filter": "(uid=*)",
                "pageSize": {},
                "sortAttributes": ["{}"],
                "afterCount": 4
            }},
            "increment": {{
                "entryDn": "{}",
                "attribute": "uidNumber",
                "delta": 10
            }}
        }}"#,
        PEOPLE_BASE,
        page_size,
        sort,
        person_dn(3)
    ))
    .unwrap()
}

#[test]
fn test_both_pagers_agree() {
    init_logging();
    let settings = config(4, "uidNumber").search.unwrap();
    let request = settings.search_request().unwrap();

    let mut session = directory_with_people(18);
    let cookie = settings.cookie_pager().unwrap().run(&mut session, &request).unwrap();

    let mut windowed = 0u64;
    let window = settings
        .window_pager()
        .unwrap()
        .run(&mut session, &request, |_| windowed += 1)
        .unwrap();

    assert_eq!(cookie.total_entries, 18);
    assert_eq!(windowed, 18);
    assert_eq!(window.entries_delivered, 18);
    assert_eq!(window.requests, 4);
}

#[test]
fn test_increment_from_settings() {
    init_logging();
    let settings = config(10, "uidNumber").increment.unwrap();
    let mut session = directory_with_people(5);
    let outcome = settings
        .modifier()
        .increment(&mut session, &settings.increment_request().unwrap())
        .unwrap();
    assert_eq!(outcome.snapshot.after.as_deref(), Some("10013"));
}

#[test]
fn test_failures_reach_the_sink() {
    init_logging();
    let sink = CollectingSink::new();
    let settings = config(10, "shoeSize").search.unwrap();
    let request = settings.search_request().unwrap();

    let mut session = directory_with_people(5).without_control(oid::PAGED_RESULTS);
    if let Err(e) = settings.cookie_pager().unwrap().run(&mut session, &request) {
        report_error(&sink, &e);
    }
    if let Err(e) = settings.window_pager().unwrap().run(&mut session, &request, |_| {}) {
        report_error(&sink, &e);
    }

    let mut session = directory_with_people(5);
    session.fail_next_modify(ResultCode::INSUFFICIENT_ACCESS_RIGHTS);
    let increment = config(10, "uidNumber").increment.unwrap();
    if let Err(e) = increment
        .modifier()
        .increment(&mut session, &increment.increment_request().unwrap())
    {
        report_error(&sink, &e);
    }

    let reports = sink.reports();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].code, None);
    assert!(reports[1].message.contains("shoeSize"));
    assert_eq!(reports[2].code, Some(ResultCode::INSUFFICIENT_ACCESS_RIGHTS));
}
