//! REST client for the signal backend.
//!
//! Wraps every backend endpoint in a typed async method. Requests go through
//! [`with_retry`], which retries network failures, HTTP 5xx and HTTP 429
//! with capped exponential backoff.

pub mod client;
pub mod error;
pub mod retry;

pub use client::{ApiConfig, SignalApiClient};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use retry::{with_retry, RetryPolicy};
