//! Secure Service Dispatch
//!
//! The privilege-crossing path of a service call:
//! `Received → Validated → Marshaled → Invoked → Returned`.
//!
//! # Security Model
//! - `argc` is bounded before any word is read from the caller
//! - The service id is the first word of the argument stream
//! - Unknown ids never reach an entry point
//! - The argument stream is released exactly once on every path
//! - Rejections collapse to [`DISPATCH_FAILED`](crate::config::DISPATCH_FAILED)

mod cursor;
mod handler;
mod marshal;
mod transfer;

pub use cursor::{ArgSource, ArgumentCursor, SliceArgs};
pub use handler::{DispatchError, Dispatcher};
pub use marshal::{marshal, ArgumentFrame};
pub use transfer::transfer;
