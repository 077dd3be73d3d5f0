//! Secure-world device drivers
//!
//! Only the console is owned by the secure world in this crate; all other
//! peripherals are reached through the secure services themselves.

pub mod uart;
