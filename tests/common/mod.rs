//! Common test utilities for directory toolkit testing.
//!
//! - `fixtures` - Populated in-memory directories and standard requests
//! - `scripted` - A session that replays canned responses, for server
//!   behaviour the in-memory directory never produces

pub mod fixtures;
pub mod scripted;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger` once per test binary. Honours `RUST_LOG`.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
