//! Compile-Time Configuration
//!
//! Limits of the service call boundary and the default normal-world
//! memory map. Everything here is fixed at build time; runtime state
//! (service tables, REE layouts) is assembled once and passed by reference.

/// Machine word crossing the privilege boundary.
pub type Word = usize;

/// Signed view of a [`Word`], as seen by C callers returning `int`.
pub type SignedWord = isize;

/// Maximum `argc` accepted from the normal world, service id slot included.
pub const MAX_ARGS: usize = 10;

/// Maximum number of words forwarded to a secure service.
pub const MAX_FORWARDED_ARGS: usize = MAX_ARGS - 1;

/// Capacity of the default service table.
pub const MAX_SERVICES: usize = 96;

/// Sentinel returned to the normal world when a call is rejected.
///
/// This is `-1` in the caller's signed view. A secure service that itself
/// returns `-1` is indistinguishable from a rejected call; the boundary has
/// one word of status and no richer channel.
pub const DISPATCH_FAILED: Word = (-1 as SignedWord) as Word;

/// Returns true if `word` falls in the reserved status range.
///
/// Callers receiving a reserved word must treat it as "call failed, or the
/// service legitimately returned this bit pattern".
#[inline]
pub const fn is_reserved(word: Word) -> bool {
    word == DISPATCH_FAILED
}

/// Number of argument registers in the target's C calling convention.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64", target_arch = "aarch64"))]
pub const REGISTER_ARGS: usize = 8;

/// Number of argument registers in the target's C calling convention.
#[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
pub const REGISTER_ARGS: usize = 6;

/// Number of argument registers in the target's C calling convention.
#[cfg(not(any(
    target_arch = "riscv32",
    target_arch = "riscv64",
    target_arch = "aarch64",
    all(target_arch = "x86_64", not(target_os = "windows"))
)))]
pub const REGISTER_ARGS: usize = 8;

/// Forwarded words that can land on the stack.
pub const SPILL_SLOTS: usize = MAX_FORWARDED_ARGS.saturating_sub(REGISTER_ARGS);

/// Stack alignment required at a call site.
pub const STACK_ALIGN: usize = 16;

/// Bytes reserved below the stack pointer for spilled arguments.
pub const SPILL_RESERVE: usize = {
    let bytes = SPILL_SLOTS * core::mem::size_of::<Word>();
    (bytes + STACK_ALIGN - 1) & !(STACK_ALIGN - 1)
};

/// Words in the spill area, all cleared before each call.
pub const SPILL_RESERVE_WORDS: usize = SPILL_RESERVE / core::mem::size_of::<Word>();

/// Normal-world memory windows of the default layout.
///
/// The secure world owns the low part of SRAM and the flash mapping
/// reserved by the MMU; the REE may hand over pointers into these windows only.
pub mod regions {
    /// Start of normal-world instruction/data SRAM.
    pub const NS_IDRAM_START: usize = 0x4082_0000;
    /// End of normal-world instruction/data SRAM.
    pub const NS_IDRAM_END: usize = 0x4088_0000;
    /// Start of the normal-world flash data mapping.
    pub const NS_DROM_START: usize = 0x4202_0000;
    /// Start of the MMU range reserved for the secure world.
    pub const S_MMU_RESV_START: usize = 0x427F_0000;
    /// Start of RTC data memory.
    pub const RTC_DATA_LOW: usize = 0x5000_0000;
    /// End of RTC data memory.
    pub const RTC_DATA_HIGH: usize = 0x5000_4000;
}
