//! API client module
//!
//! HTTP transport that delivers chunks to the collection endpoint.

pub mod client;
pub mod headers;

pub use client::{HttpMethod, HttpTransport, DEFAULT_REQUEST_TIMEOUT_SECS, USER_AGENT};
