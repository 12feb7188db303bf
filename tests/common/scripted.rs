//! Canned-response session.
//!
//! Replays queued responses in order and logs every request, so tests can
//! drive the toolkit through server behaviour that is legal but unusual
//! (empty pages with cookies, dropped response controls, garbage values).

use directory_toolkit::controls::{
    ContextId, PageToken, RawControl, ReadEntryKind, ReadEntryResponse, VlvResponse, oid,
    paged_control, raw_control,
};
use directory_toolkit::protocol::{
    LdapResult, ModifyRequest, ModifyResponse, ResultCode, RootMetadata, SearchEntry, SearchRequest,
    SearchResponse,
};
use directory_toolkit::schema::DEFAULT_SUBSCHEMA_DN;
use directory_toolkit::session::DirectorySession;
use std::collections::VecDeque;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("No scripted {0} response left")]
    Exhausted(&'static str),
}

#[derive(Debug, Default)]
pub struct ScriptedSession {
    pub metadata: RootMetadata,
    searches: VecDeque<SearchResponse>,
    modifies: VecDeque<ModifyResponse>,
    pub search_log: Vec<SearchRequest>,
    pub modify_log: Vec<ModifyRequest>,
    pub metadata_reads: usize,
}

impl ScriptedSession {
    /// A session advertising every control the toolkit uses.
    pub fn new() -> Self {
        Self {
            metadata: RootMetadata::default()
                .with_control(oid::PAGED_RESULTS)
                .with_control(oid::SORT_REQUEST)
                .with_control(oid::VLV_REQUEST)
                .with_control(oid::PRE_READ)
                .with_control(oid::POST_READ),
            ..Self::default()
        }
    }

    pub fn then_search(mut self, response: SearchResponse) -> Self {
        self.searches.push_back(response);
        self
    }

    pub fn then_modify(mut self, response: ModifyResponse) -> Self {
        self.modifies.push_back(response);
        self
    }

    pub fn remaining_searches(&self) -> usize {
        self.searches.len()
    }
}

impl DirectorySession for ScriptedSession {
    type Error = ScriptError;

    fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, Self::Error> {
        self.search_log.push(request.clone());
        self.searches.pop_front().ok_or(ScriptError::Exhausted("search"))
    }

    fn modify(&mut self, request: &ModifyRequest) -> Result<ModifyResponse, Self::Error> {
        self.modify_log.push(request.clone());
        self.modifies.pop_front().ok_or(ScriptError::Exhausted("modify"))
    }

    fn read_root_metadata(&mut self) -> Result<RootMetadata, Self::Error> {
        self.metadata_reads += 1;
        Ok(self.metadata.clone())
    }
}

/// `count` placeholder entries.
pub fn entries(count: usize, prefix: &str) -> Vec<SearchEntry> {
    (0..count)
        .map(|i| SearchEntry::new(format!("uid={}{},ou=people,dc=example,dc=com", prefix, i)))
        .collect()
}

pub fn search_response(entries: Vec<SearchEntry>, controls: Vec<RawControl>) -> SearchResponse {
    SearchResponse {
        entries,
        result: LdapResult::success(),
        controls,
    }
}

/// One page carrying a paged results control with `cookie`.
pub fn page(count: usize, prefix: &str, cookie: &[u8]) -> SearchResponse {
    let control = paged_control(0, &PageToken::from(cookie), false);
    search_response(entries(count, prefix), vec![control])
}

/// VLV response control value.
pub fn vlv_control(target_position: u32, content_count: u32, result: ResultCode, context: Option<&[u8]>) -> RawControl {
    let value = VlvResponse {
        target_position,
        content_count,
        result,
        context_id: context.map(ContextId::from),
    }
    .encode_value();
    raw_control(oid::VLV_RESPONSE, false, value)
}

/// The subschema entry the window pager reads before its first search.
pub fn subschema(definitions: &[&str]) -> SearchResponse {
    let entry = SearchEntry::new(DEFAULT_SUBSCHEMA_DN).with_attribute("attributeTypes", definitions.iter().copied());
    search_response(vec![entry], Vec::new())
}

pub const UID_NUMBER_TYPE: &str = "( 1.3.6.1.1.1.1.0 NAME 'uidNumber' EQUALITY integerMatch ORDERING integerOrderingMatch SYNTAX 1.3.6.1.4.1.1466.115.121.1.27 SINGLE-VALUE )";

/// A successful modify carrying a read-entry control for `entry`.
pub fn modify_with_read(kind: ReadEntryKind, entry: SearchEntry) -> ModifyResponse {
    let value = ReadEntryResponse { entry }.encode_value();
    ModifyResponse {
        result: LdapResult::success(),
        controls: vec![raw_control(kind.oid(), false, value)],
    }
}
