//! REE Buffer Validation
//!
//! # Security Checks
//! 1. Pointer is not null
//! 2. Pointer + length doesn't overflow
//! 3. The whole range lies in one REE region
//! 4. The region grants the required access
//! 5. The positive decision is re-checked against fault injection

use core::fmt;

use crate::config::Word;
use crate::fault_assert;

use super::layout::{Access, ReeLayout};

/// Reasons a normal-world buffer is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReeError {
    /// Null pointer with a non-zero length.
    NullPointer,
    /// `ptr + len` wraps around the address space.
    Overflow,
    /// The range is not inside a single REE region.
    OutOfBounds,
    /// The region does not grant the required access.
    AccessDenied,
}

impl fmt::Display for ReeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullPointer => write!(f, "null buffer pointer"),
            Self::Overflow => write!(f, "buffer range overflows"),
            Self::OutOfBounds => write!(f, "buffer outside normal-world memory"),
            Self::AccessDenied => write!(f, "region does not permit this access"),
        }
    }
}

/// A validated, read-only normal-world buffer
///
/// Only constructed by [`validate_ree_read`].
#[derive(Debug)]
pub struct ReeBuffer {
    ptr: *const u8,
    len: usize,
}

impl ReeBuffer {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole words in the buffer.
    pub fn word_count(&self) -> usize {
        self.len / core::mem::size_of::<Word>()
    }

    /// Get the buffer as a byte slice
    ///
    /// The normal world may still change the contents while the secure world
    /// reads them; copy before validating anything derived from the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY:
        // - The range was checked to lie inside an REE region
        // - REE regions are mapped for the secure world
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Read the `index`-th word. The buffer need not be word aligned.
    pub fn read_word(&self, index: usize) -> Option<Word> {
        let size = core::mem::size_of::<Word>();
        let offset = index.checked_mul(size)?;
        if offset.checked_add(size)? > self.len {
            return None;
        }
        // SAFETY: offset + size <= len, inside the validated range
        Some(unsafe { core::ptr::read_unaligned(self.ptr.add(offset) as *const Word) })
    }
}

/// A validated, writable normal-world buffer
///
/// Only constructed by [`validate_ree_write`].
#[derive(Debug)]
pub struct ReeBufferMut {
    ptr: *mut u8,
    len: usize,
}

impl ReeBufferMut {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the buffer as a mutable byte slice
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: Same as ReeBuffer::as_bytes, and the region is writable
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Copy `data` into the buffer at `offset`.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), ReeError> {
        let end = offset.checked_add(data.len()).ok_or(ReeError::Overflow)?;
        let dst = self
            .as_bytes_mut()
            .get_mut(offset..end)
            .ok_or(ReeError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

fn check_range(
    layout: &ReeLayout<'_>,
    ptr: usize,
    len: usize,
    required: Access,
) -> Result<(), ReeError> {
    if ptr == 0 {
        return Err(ReeError::NullPointer);
    }

    let end = ptr.checked_add(len).ok_or(ReeError::Overflow)?;

    let region = layout.region_of(ptr).ok_or(ReeError::OutOfBounds)?;
    if end > region.end {
        return Err(ReeError::OutOfBounds);
    }
    if !region.access.contains(required) {
        return Err(ReeError::AccessDenied);
    }

    fault_assert!(layout.covers(ptr, end, required));
    Ok(())
}

/// Validate a normal-world buffer the secure world will read.
pub fn validate_ree_read(
    layout: &ReeLayout<'_>,
    ptr: usize,
    len: usize,
) -> Result<ReeBuffer, ReeError> {
    // Zero-length reads are valid
    if len == 0 {
        return Ok(ReeBuffer {
            ptr: ptr as *const u8,
            len: 0,
        });
    }

    check_range(layout, ptr, len, Access::READ)?;

    Ok(ReeBuffer {
        ptr: ptr as *const u8,
        len,
    })
}

/// Validate a normal-world buffer the secure world will write.
pub fn validate_ree_write(
    layout: &ReeLayout<'_>,
    ptr: usize,
    len: usize,
) -> Result<ReeBufferMut, ReeError> {
    if len == 0 {
        return Ok(ReeBufferMut {
            ptr: ptr as *mut u8,
            len: 0,
        });
    }

    check_range(layout, ptr, len, Access::WRITE)?;

    Ok(ReeBufferMut {
        ptr: ptr as *mut u8,
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::regions;
    use crate::ree::MemRegion;

    #[test]
    fn test_zero_length() {
        assert!(validate_ree_read(&ReeLayout::DEFAULT, 0, 0).is_ok());
        assert!(validate_ree_write(&ReeLayout::DEFAULT, 0x1000, 0).is_ok());
    }

    #[test]
    fn test_null_pointer() {
        assert_eq!(
            validate_ree_read(&ReeLayout::DEFAULT, 0, 100).unwrap_err(),
            ReeError::NullPointer
        );
    }

    #[test]
    fn test_overflow() {
        assert_eq!(
            validate_ree_read(&ReeLayout::DEFAULT, usize::MAX - 10, 100).unwrap_err(),
            ReeError::Overflow
        );
    }

    #[test]
    fn test_secure_memory_rejected() {
        let secure_sram = regions::NS_IDRAM_START - 0x100;
        assert_eq!(
            validate_ree_read(&ReeLayout::DEFAULT, secure_sram, 16).unwrap_err(),
            ReeError::OutOfBounds
        );
        // Straddling the end of the window
        assert_eq!(
            validate_ree_read(&ReeLayout::DEFAULT, regions::NS_IDRAM_END - 4, 16).unwrap_err(),
            ReeError::OutOfBounds
        );
    }

    #[test]
    fn test_flash_is_read_only() {
        assert_eq!(
            validate_ree_write(&ReeLayout::DEFAULT, regions::NS_DROM_START, 32).unwrap_err(),
            ReeError::AccessDenied
        );
    }

    #[test]
    fn test_read_and_write_through_buffers() {
        let mut backing = [0u8; 64];
        let start = backing.as_mut_ptr() as usize;
        let window = [MemRegion::new(start, start + 64, Access::READ | Access::WRITE)];
        let layout = ReeLayout::new(&window);

        let mut out = validate_ree_write(&layout, start + 8, 16).unwrap();
        out.write_at(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(out.write_at(14, &[0; 4]), Err(ReeError::OutOfBounds));

        let input = validate_ree_read(&layout, start + 8, 16).unwrap();
        assert_eq!(&input.as_bytes()[..5], &[1, 2, 3, 4, 0]);
        assert_eq!(input.word_count(), 16 / core::mem::size_of::<Word>());
        assert!(input.read_word(input.word_count()).is_none());
    }
}
