//! Security Primitives
//!
//! - Zeroization of staged arguments and other transient secrets
//! - Fault assertions that re-check security decisions
//!
//! # Security Properties
//! - Clearing uses volatile writes that the compiler cannot elide
//! - Critical checks are evaluated twice with a fence in between

pub mod fault;
pub mod zeroize;

pub use fault::fault_detected;
pub use zeroize::Zeroize;
