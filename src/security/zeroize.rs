//! Secure Memory Zeroization
//!
//! Arguments staged for a secure service come from the normal world and may
//! carry key handles, nonces or buffer addresses. They are cleared once the
//! service returns so the secure stack does not keep them around.
//!
//! # Design
//! - `Zeroize` trait for types that can be securely cleared
//! - Volatile writes prevent compiler optimization of zeroing

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::config::Word;

/// Trait for types that can be securely zeroed.
///
/// Implementations must ensure that all data is overwritten
/// with zeros in a way that cannot be optimized away.
pub trait Zeroize {
    /// Overwrite this value with zeros.
    fn zeroize(&mut self);
}

impl Zeroize for [u8] {
    fn zeroize(&mut self) {
        // SAFETY: We have a valid mutable reference to the slice
        unsafe {
            volatile_set(self.as_mut_ptr(), 0u8, self.len());
        }
        compiler_fence(Ordering::SeqCst);
    }
}

impl Zeroize for [Word] {
    fn zeroize(&mut self) {
        // SAFETY: We have a valid mutable reference to the slice
        unsafe {
            volatile_set(self.as_mut_ptr(), 0 as Word, self.len());
        }
        compiler_fence(Ordering::SeqCst);
    }
}

impl<const N: usize> Zeroize for [u8; N] {
    fn zeroize(&mut self) {
        self.as_mut_slice().zeroize();
    }
}

impl<const N: usize> Zeroize for [Word; N] {
    fn zeroize(&mut self) {
        self.as_mut_slice().zeroize();
    }
}

impl Zeroize for Word {
    fn zeroize(&mut self) {
        // SAFETY: `self` is a valid, aligned, exclusive reference
        unsafe {
            ptr::write_volatile(self, 0);
        }
        compiler_fence(Ordering::SeqCst);
    }
}

/// Volatile fill that cannot be optimized away.
///
/// # Safety
/// - `dst` must be valid for writes of `count` elements
/// - `dst` must be properly aligned
#[inline]
unsafe fn volatile_set<T: Copy>(dst: *mut T, val: T, count: usize) {
    for i in 0..count {
        // SAFETY: Caller guarantees dst is valid for count elements
        unsafe {
            ptr::write_volatile(dst.add(i), val);
        }
    }
}
