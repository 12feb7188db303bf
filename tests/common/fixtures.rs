//! Directory fixtures.

use directory_toolkit::protocol::{Scope, SearchEntry, SearchRequest};
use directory_toolkit::session::InMemoryDirectory;

pub const SUFFIX: &str = "dc=example,dc=com";
pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=com";

/// DN of the `index`-th fixture user.
pub fn person_dn(index: usize) -> String {
    format!("uid=user{:04},{}", index, PEOPLE_BASE)
}

/// A user with a unique, numeric `uidNumber`.
pub fn person(index: usize) -> SearchEntry {
    SearchEntry::new(person_dn(index))
        .with_attribute("objectClass", ["top", "person", "posixAccount"])
        .with_attribute("uid", [format!("user{:04}", index)])
        .with_attribute("cn", [format!("User {}", index)])
        .with_attribute("uidNumber", [(10_000 + index).to_string()])
}

/// Suffix, people container and `count` users.
pub fn directory_with_people(count: usize) -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    directory.add_entry(SearchEntry::new(SUFFIX).with_attribute("dc", ["example"]));
    directory.add_entry(SearchEntry::new(PEOPLE_BASE).with_attribute("ou", ["people"]));
    for index in 0..count {
        directory.add_entry(person(index));
    }
    directory
}

/// One-level search for every fixture user.
pub fn people_search() -> SearchRequest {
    SearchRequest::new(PEOPLE_BASE, Scope::OneLevel, "(uid=*)").with_attributes(["uid", "uidNumber"])
}
