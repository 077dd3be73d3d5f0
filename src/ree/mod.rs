//! Normal-World (REE) Memory Validation
//!
//! Secure services receive raw addresses from the normal world. Before a
//! service touches one, the whole range must sit inside a single REE region
//! with the access the service needs.
//!
//! # Security Principles
//! - Validate ALL caller pointers before use
//! - Fail-secure: anything outside the layout is rejected
//! - Secure-world memory is never reachable through a validated buffer

mod layout;
mod validate;

pub use layout::{Access, MemRegion, ReeLayout};
pub use validate::{validate_ree_read, validate_ree_write, ReeBuffer, ReeBufferMut, ReeError};
