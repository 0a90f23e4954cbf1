//! Rate limit tables loaded from TOML or JSON.
//!
//! # Examples
//!
//! ```rust,no_run
//! use quota_gate::conf::{ThrottleSettings, load_from_env};
//! ```

#[cfg(feature = "conf")]
pub use quota_gate_conf::*;
