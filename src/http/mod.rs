//! HTTP client module with attempt policy and error handling.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{DEFAULT_ATTEMPTS, NonRetryableError, check_retryable, classify_error};
