//! TEE Dispatcher - Secure-World Service Call Dispatch
//!
//! Receives service requests from the normal world (REE), validates them and
//! forwards them to a fixed table of trusted service entry points.
//!
//! # Call Flow
//! ```text
//!  REE ecall ──► trap::handle_service_call
//!                   │
//!                   ▼
//!            Dispatcher::dispatch ──► ServiceTable::lookup
//!                   │
//!                   ▼
//!            marshal (ArgumentCursor ──► ArgumentFrame)
//!                   │
//!                   ▼
//!            transfer (registers + stack spill, indirect call)
//!                   │
//!                   ▼
//!            secure service ──► single word result back to a0
//! ```
//!
//! # Security Features
//! - Argument count bounded before anything is read from the caller
//! - Service ids bounds-checked against an immutable table
//! - Every table slot resolves to a real entry point, never null
//! - The argument stream is released on every exit path
//! - Normal-world buffers validated against the REE memory layout
//! - Staged arguments zeroized after each call
//!
//! # Boundary Contract
//! The normal world only ever sees one machine word. Rejections collapse
//! into [`DISPATCH_FAILED`], which a service may also return on its own.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod dispatch;
pub mod drivers;
pub mod logger;
pub mod ree;
pub mod security;
pub mod service;
pub mod trap;

pub use config::{is_reserved, Word, DISPATCH_FAILED, MAX_ARGS, MAX_FORWARDED_ARGS, MAX_SERVICES};
pub use dispatch::{ArgSource, DispatchError, Dispatcher, SliceArgs};
pub use ree::ReeLayout;
pub use service::{
    DefaultServiceTable, SecureService, ServiceEntry, ServiceId, ServiceRegistry, ServiceTable,
    ServiceTableBuilder,
};
pub use trap::{handle_service_call, TrapFrame, TrapOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    type W = Word;

    extern "C" fn add2(a: W, b: W) -> W {
        a + b
    }

    extern "C" fn sum8(a: W, b: W, c: W, d: W, e: W, f: W, g: W, h: W) -> W {
        a + b + c + d + e + f + g + h
    }

    #[test]
    fn test_three_service_scenario() {
        let add = add2 as extern "C" fn(W, W) -> W;
        let table: ServiceTable<3> = ServiceTableBuilder::new()
            .register(0, "add2", add)
            .and_then(|b| b.register(1, "add2", add))
            .and_then(|b| b.register(2, "sum8", sum8 as extern "C" fn(W, W, W, W, W, W, W, W) -> W))
            .unwrap()
            .build();
        let dispatcher = Dispatcher::new(&table);

        assert_eq!(dispatcher.dispatch(3, SliceArgs::new(&[0, 5, 7])), 12);
        assert_eq!(dispatcher.dispatch(3, SliceArgs::new(&[5, 5, 7])), DISPATCH_FAILED);
        assert_eq!(DISPATCH_FAILED as isize, -1);

        let oversized: [W; 12] = [0, 5, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            dispatcher.try_dispatch(12, SliceArgs::new(&oversized)),
            Err(DispatchError::ArgumentCountExceeded {
                received: 12,
                permitted: MAX_ARGS
            })
        );

        let eight: [W; 9] = [2, 1, 1, 1, 1, 1, 1, 1, 1];
        assert_eq!(dispatcher.dispatch(9, SliceArgs::new(&eight)), 8);
    }
}
