//! Integration tests, one module per toolkit operation.

pub mod config_driven;
pub mod cookie_paging;
pub mod negotiation;
pub mod window_paging;
