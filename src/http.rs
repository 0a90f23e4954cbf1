//! HTTP responses and headers for admission decisions.
//!
//! # Examples
//!
//! ```rust,no_run
//! use quota_gate::http::{RateLimitGuard, StoreFailureMode};
//! ```

#[cfg(feature = "http")]
pub use quota_gate_http::*;
