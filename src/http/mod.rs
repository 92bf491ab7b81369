//! HTTP client module with registry error handling.

mod client;
mod status;

pub use client::HttpClient;
pub use status::{check_status, classify_status, transport_error};
