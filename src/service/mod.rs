//! Secure Service Table
//!
//! Maps small integer ids to trusted service entry points.
//!
//! # Design
//! - Fixed-capacity table, assembled once by [`ServiceTableBuilder`]
//! - Immutable after `build()`; lookups need no locking
//! - Every slot resolves to a real entry point: unregistered ids land on
//!   [`invalid_service`], which rejects the call
//! - [`ServiceRegistry`] holds the process-wide table with a single
//!   initialization

mod entry;
mod registry;
mod table;

pub use entry::{invalid_service, SecureService, ServiceAddr, ServiceEntry};
pub use registry::{RegistryError, ServiceRegistry};
pub use table::{ServiceId, ServiceTable, ServiceTableBuilder, TableError};

/// Table sized for the default service id space.
pub type DefaultServiceTable = ServiceTable<{ crate::config::MAX_SERVICES }>;
