//! Admission and degradation engine.
//!
//! # Examples
//!
//! ```rust,no_run
//! use quota_gate::throttling::{AdmissionPolicy, EndpointPolicyRegistry};
//! ```

pub use quota_gate_throttling::*;
