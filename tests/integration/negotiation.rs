//! Capability negotiation against the root DSE.

use crate::common::fixtures::{directory_with_people, people_search};
use crate::common::init_logging;
use directory_toolkit::controls::oid;
use directory_toolkit::increment::{AtomicIncrement, IncrementRequest};
use directory_toolkit::negotiation::{self, Capability, CapabilityKind};
use directory_toolkit::paging::{CookiePagedSearch, SortSpec, VirtualListSearch, WindowParams};
use directory_toolkit::protocol::RootMetadata;
use directory_toolkit::ToolkitError;

#[test]
fn test_advertised_controls_are_supported() {
    init_logging();
    let mut session = directory_with_people(0);
    for capability in [
        Capability::PAGED_RESULTS,
        Capability::SERVER_SIDE_SORT,
        Capability::VIRTUAL_LIST_VIEW,
        Capability::PRE_READ,
        Capability::POST_READ,
    ] {
        assert!(negotiation::supports(&mut session, &capability).unwrap(), "{}", capability);
    }
    assert!(negotiation::supports(&mut session, &Capability::WHO_AM_I).unwrap());
}

#[test]
fn test_extended_operations_follow_supported_extension() {
    init_logging();
    let mut session = directory_with_people(0);
    assert!(negotiation::supports(&mut session, &Capability::WHO_AM_I).unwrap());
    assert!(!negotiation::supports(&mut session, &Capability::PASSWORD_MODIFY).unwrap());

    session.set_metadata(RootMetadata::default().with_extension(Capability::PASSWORD_MODIFY.id()));
    assert!(negotiation::supports(&mut session, &Capability::PASSWORD_MODIFY).unwrap());
    assert!(!negotiation::supports(&mut session, &Capability::WHO_AM_I).unwrap());
}

#[test]
fn test_unadvertised_capability_is_false_not_error() {
    init_logging();
    let mut session = directory_with_people(0);
    let unknown = Capability::control("1.3.6.1.4.1.99999.1.2");
    assert!(!negotiation::supports(&mut session, &unknown).unwrap());
}

#[test]
fn test_kind_must_match() {
    init_logging();
    let mut session = directory_with_people(0);
    let as_extension = Capability::new(oid::PAGED_RESULTS, CapabilityKind::ExtendedOperation);
    assert!(!negotiation::supports(&mut session, &as_extension).unwrap());
}

#[test]
fn test_every_call_reads_fresh_metadata() {
    init_logging();
    let mut session = directory_with_people(0);
    assert!(negotiation::supports(&mut session, &Capability::PAGED_RESULTS).unwrap());

    session.set_metadata(RootMetadata::default());
    assert!(!negotiation::supports(&mut session, &Capability::PAGED_RESULTS).unwrap());
    assert_eq!(session.metadata_reads(), 2);
}

#[test]
fn test_failed_metadata_read_is_session_error() {
    init_logging();
    let mut session = directory_with_people(0);
    session.disconnect();
    let err = negotiation::supports(&mut session, &Capability::PAGED_RESULTS).unwrap_err();
    assert!(matches!(err, ToolkitError::Session { .. }));
    assert!(!err.is_unsupported());
}

#[test]
fn test_require_all_names_first_missing() {
    init_logging();
    let mut session = directory_with_people(0).without_control(oid::VLV_REQUEST);
    let err = negotiation::require_all(
        &mut session,
        &[Capability::SERVER_SIDE_SORT, Capability::VIRTUAL_LIST_VIEW],
    )
    .unwrap_err();
    match err {
        ToolkitError::UnsupportedFeature { capability } => {
            assert_eq!(capability, Capability::VIRTUAL_LIST_VIEW)
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_cookie_pager_fails_before_any_search() {
    init_logging();
    let mut session = directory_with_people(10).without_control(oid::PAGED_RESULTS);
    let err = CookiePagedSearch::new(5)
        .unwrap()
        .run(&mut session, &people_search())
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(session.search_requests().is_empty());
}

#[test]
fn test_window_pager_fails_before_any_search() {
    init_logging();
    for missing in [oid::SORT_REQUEST, oid::VLV_REQUEST] {
        let mut session = directory_with_people(10).without_control(missing);
        let search = VirtualListSearch::new(SortSpec::ascending(["uidNumber"]).unwrap(), WindowParams::new(0, 4));
        let err = search.run(&mut session, &people_search(), |_| {}).unwrap_err();
        assert!(err.is_unsupported(), "{} should be reported unsupported", missing);
        assert!(session.search_requests().is_empty());
        assert_eq!(session.metadata_reads(), 1);
    }
}

#[test]
fn test_modifier_never_attaches_unadvertised_controls() {
    init_logging();
    let mut session = directory_with_people(1)
        .without_control(oid::PRE_READ)
        .without_control(oid::POST_READ);
    let request = IncrementRequest::new(crate::common::fixtures::person_dn(0), "uidNumber", 1).unwrap();
    AtomicIncrement::new()
        .with_probe(false)
        .increment(&mut session, &request)
        .unwrap();
    assert_eq!(session.metadata_reads(), 1);
    assert!(session.modify_requests()[0].controls.is_empty());
}
