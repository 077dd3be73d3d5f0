//! Calling-Convention Transfer
//!
//! Places a marshaled [`ArgumentFrame`] where the target ABI expects it and
//! calls the service through a register.
//!
//! # Staging Sequence
//! ```text
//!  frame: [w0 .. w(R-1)] [wR .. wn-1]
//!           │               │
//!           ▼               ▼
//!     argument regs     spill area below sp (ABI aligned, in order)
//!                           │
//!                           ▼
//!                indirect call ──► result register
//! ```
//!
//! On riscv32, riscv64, aarch64 and System V x86_64 the register loads, the stack
//! spill and the call are one `asm!` block, so the compiler can neither
//! reorder nor split them. The whole spill area is cleared before the spilled
//! words are copied in, and argument registers past `frame.len()` hold zero. Other targets call through an `extern "C"`
//! pointer of the matching arity.

use core::sync::atomic::{compiler_fence, Ordering};

use crate::config::{Word, REGISTER_ARGS};
use crate::security::Zeroize;
use crate::service::ServiceAddr;

use super::marshal::ArgumentFrame;

/// Call `entry` with exactly the words of `frame` and return its result.
///
/// The result is returned as-is; no value is interpreted here.
///
/// # Safety
/// `entry` must be an `extern "C"` function taking at most `frame.len()`
/// words and returning one word. On the `asm!` targets a function declaring
/// more words reads zero for each missing one.
pub unsafe fn transfer(entry: ServiceAddr, frame: &ArgumentFrame) -> Word {
    let mut regs = [0 as Word; REGISTER_ARGS];
    let staged = frame.registers();
    regs[..staged.len()].copy_from_slice(staged);

    compiler_fence(Ordering::SeqCst);
    // SAFETY: forwarded from the caller
    let ret = unsafe { arch::invoke(entry, &regs, frame) };
    compiler_fence(Ordering::SeqCst);

    regs.zeroize();
    ret
}

#[cfg(target_arch = "riscv32")]
mod arch {
    use core::arch::asm;

    use super::{ArgumentFrame, ServiceAddr, Word, REGISTER_ARGS};
    use crate::config::{SPILL_RESERVE, SPILL_RESERVE_WORDS};

    #[inline(never)]
    pub(super) unsafe fn invoke(
        entry: ServiceAddr,
        regs: &[Word; REGISTER_ARGS],
        frame: &ArgumentFrame,
    ) -> Word {
        let spill = frame.spill();
        let ret: Word;
        // SAFETY: the spill area is reserved and released inside the block,
        // sp stays 16-byte aligned at the call.
        unsafe {
            asm!(
                "addi sp, sp, -{reserve}",
                "li t1, {slots}",
                "mv t2, sp",
                "beqz t1, 5f",
                "4:",
                "sw zero, 0(t2)",
                "addi t2, t2, 4",
                "addi t1, t1, -1",
                "bnez t1, 4b",
                "5:",
                "beqz t0, 3f",
                "mv t2, sp",
                "2:",
                "lw t1, 0(t3)",
                "sw t1, 0(t2)",
                "addi t3, t3, 4",
                "addi t2, t2, 4",
                "addi t0, t0, -1",
                "bnez t0, 2b",
                "3:",
                "jalr {target}",
                "addi sp, sp, {reserve}",
                target = in(reg) entry as usize,
                reserve = const SPILL_RESERVE,
                slots = const SPILL_RESERVE_WORDS,
                inlateout("a0") regs[0] => ret,
                in("a1") regs[1],
                in("a2") regs[2],
                in("a3") regs[3],
                in("a4") regs[4],
                in("a5") regs[5],
                in("a6") regs[6],
                in("a7") regs[7],
                inout("t0") spill.len() => _,
                inout("t3") spill.as_ptr() => _,
                out("t1") _,
                out("t2") _,
                clobber_abi("C"),
            );
        }
        ret
    }
}

#[cfg(target_arch = "riscv64")]
mod arch {
    use core::arch::asm;

    use super::{ArgumentFrame, ServiceAddr, Word, REGISTER_ARGS};
    use crate::config::{SPILL_RESERVE, SPILL_RESERVE_WORDS};

    #[inline(never)]
    pub(super) unsafe fn invoke(
        entry: ServiceAddr,
        regs: &[Word; REGISTER_ARGS],
        frame: &ArgumentFrame,
    ) -> Word {
        let spill = frame.spill();
        let ret: Word;
        // SAFETY: see riscv32
        unsafe {
            asm!(
                "addi sp, sp, -{reserve}",
                "li t1, {slots}",
                "mv t2, sp",
                "beqz t1, 5f",
                "4:",
                "sd zero, 0(t2)",
                "addi t2, t2, 8",
                "addi t1, t1, -1",
                "bnez t1, 4b",
                "5:",
                "beqz t0, 3f",
                "mv t2, sp",
                "2:",
                "ld t1, 0(t3)",
                "sd t1, 0(t2)",
                "addi t3, t3, 8",
                "addi t2, t2, 8",
                "addi t0, t0, -1",
                "bnez t0, 2b",
                "3:",
                "jalr {target}",
                "addi sp, sp, {reserve}",
                target = in(reg) entry as usize,
                reserve = const SPILL_RESERVE,
                slots = const SPILL_RESERVE_WORDS,
                inlateout("a0") regs[0] => ret,
                in("a1") regs[1],
                in("a2") regs[2],
                in("a3") regs[3],
                in("a4") regs[4],
                in("a5") regs[5],
                in("a6") regs[6],
                in("a7") regs[7],
                inout("t0") spill.len() => _,
                inout("t3") spill.as_ptr() => _,
                out("t1") _,
                out("t2") _,
                clobber_abi("C"),
            );
        }
        ret
    }
}

#[cfg(target_arch = "aarch64")]
mod arch {
    use core::arch::asm;

    use super::{ArgumentFrame, ServiceAddr, Word, REGISTER_ARGS};
    use crate::config::{SPILL_RESERVE, SPILL_RESERVE_WORDS};

    #[inline(never)]
    pub(super) unsafe fn invoke(
        entry: ServiceAddr,
        regs: &[Word; REGISTER_ARGS],
        frame: &ArgumentFrame,
    ) -> Word {
        let spill = frame.spill();
        let ret: Word;
        // SAFETY: the spill area is reserved and released inside the block,
        // sp stays 16-byte aligned at the call.
        unsafe {
            asm!(
                "sub sp, sp, #{reserve}",
                "mov x11, sp",
                "mov x12, #{slots}",
                "cbz x12, 5f",
                "4:",
                "str xzr, [x11], #8",
                "subs x12, x12, #1",
                "b.ne 4b",
                "5:",
                "cbz x9, 3f",
                "mov x11, sp",
                "2:",
                "ldr x12, [x10], #8",
                "str x12, [x11], #8",
                "subs x9, x9, #1",
                "b.ne 2b",
                "3:",
                "blr {target}",
                "add sp, sp, #{reserve}",
                target = in(reg) entry as usize,
                reserve = const SPILL_RESERVE,
                slots = const SPILL_RESERVE_WORDS,
                inlateout("x0") regs[0] => ret,
                in("x1") regs[1],
                in("x2") regs[2],
                in("x3") regs[3],
                in("x4") regs[4],
                in("x5") regs[5],
                in("x6") regs[6],
                in("x7") regs[7],
                inout("x9") spill.len() => _,
                inout("x10") spill.as_ptr() => _,
                out("x11") _,
                out("x12") _,
                clobber_abi("C"),
            );
        }
        ret
    }
}

#[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
mod arch {
    use core::arch::asm;

    use super::{ArgumentFrame, ServiceAddr, Word, REGISTER_ARGS};
    use crate::config::{SPILL_RESERVE, SPILL_RESERVE_WORDS};

    #[inline(never)]
    pub(super) unsafe fn invoke(
        entry: ServiceAddr,
        regs: &[Word; REGISTER_ARGS],
        frame: &ArgumentFrame,
    ) -> Word {
        let spill = frame.spill();
        let ret: Word;
        // SAFETY: rsp is 16-byte aligned on entry to the block and
        // SPILL_RESERVE keeps it aligned at the call; the callee finds the
        // spilled words right above its return address.
        unsafe {
            asm!(
                "sub rsp, {reserve}",
                "mov rax, {slots}",
                "test rax, rax",
                "jz 5f",
                "4:",
                "mov qword ptr [rsp + rax*8 - 8], 0",
                "dec rax",
                "jnz 4b",
                "5:",
                "test r11, r11",
                "jz 3f",
                "2:",
                "mov rax, qword ptr [r10 + r11*8 - 8]",
                "mov qword ptr [rsp + r11*8 - 8], rax",
                "dec r11",
                "jnz 2b",
                "3:",
                "call {target}",
                "add rsp, {reserve}",
                target = in(reg) entry as usize,
                reserve = const SPILL_RESERVE,
                slots = const SPILL_RESERVE_WORDS,
                in("rdi") regs[0],
                in("rsi") regs[1],
                in("rdx") regs[2],
                in("rcx") regs[3],
                in("r8") regs[4],
                in("r9") regs[5],
                in("r10") spill.as_ptr(),
                inout("r11") spill.len() => _,
                out("rax") ret,
                clobber_abi("C"),
            );
        }
        ret
    }
}

#[cfg(not(any(
    target_arch = "riscv32",
    target_arch = "riscv64",
    target_arch = "aarch64",
    all(target_arch = "x86_64", not(target_os = "windows"))
)))]
mod arch {
    use core::mem::transmute;

    use super::{ArgumentFrame, ServiceAddr, Word, REGISTER_ARGS};

    type W = Word;

    pub(super) unsafe fn invoke(
        entry: ServiceAddr,
        _regs: &[Word; REGISTER_ARGS],
        frame: &ArgumentFrame,
    ) -> Word {
        let w = frame.as_slice();
        // SAFETY: the caller guarantees entry takes w.len() words
        unsafe {
            match w.len() {
                0 => transmute::<ServiceAddr, unsafe extern "C" fn() -> W>(entry)(),
                1 => transmute::<ServiceAddr, unsafe extern "C" fn(W) -> W>(entry)(w[0]),
                2 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W) -> W>(entry)(w[0], w[1]),
                3 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W) -> W>(entry)(
                    w[0], w[1], w[2],
                ),
                4 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W, W) -> W>(entry)(
                    w[0], w[1], w[2], w[3],
                ),
                5 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W, W, W) -> W>(entry)(
                    w[0], w[1], w[2], w[3], w[4],
                ),
                6 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W, W, W, W) -> W>(
                    entry,
                )(w[0], w[1], w[2], w[3], w[4], w[5]),
                7 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W, W, W, W, W) -> W>(
                    entry,
                )(w[0], w[1], w[2], w[3], w[4], w[5], w[6]),
                8 => transmute::<ServiceAddr, unsafe extern "C" fn(W, W, W, W, W, W, W, W) -> W>(
                    entry,
                )(w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]),
                _ => transmute::<
                    ServiceAddr,
                    unsafe extern "C" fn(W, W, W, W, W, W, W, W, W) -> W,
                >(entry)(w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7], w[8]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FORWARDED_ARGS;
    use crate::service::SecureService;

    type W = Word;

    /// Position-weighted sum, so a swapped or shifted word changes the result.
    fn checksum(words: &[Word]) -> Word {
        words
            .iter()
            .enumerate()
            .fold(0 as Word, |acc, (i, &w)| {
                acc.wrapping_mul(31).wrapping_add(w ^ (i as Word + 1))
            })
    }

    extern "C" fn echo0() -> W {
        checksum(&[])
    }
    extern "C" fn echo1(a: W) -> W {
        checksum(&[a])
    }
    extern "C" fn echo2(a: W, b: W) -> W {
        checksum(&[a, b])
    }
    extern "C" fn echo3(a: W, b: W, c: W) -> W {
        checksum(&[a, b, c])
    }
    extern "C" fn echo4(a: W, b: W, c: W, d: W) -> W {
        checksum(&[a, b, c, d])
    }
    extern "C" fn echo5(a: W, b: W, c: W, d: W, e: W) -> W {
        checksum(&[a, b, c, d, e])
    }
    extern "C" fn echo6(a: W, b: W, c: W, d: W, e: W, f: W) -> W {
        checksum(&[a, b, c, d, e, f])
    }
    extern "C" fn echo7(a: W, b: W, c: W, d: W, e: W, f: W, g: W) -> W {
        checksum(&[a, b, c, d, e, f, g])
    }
    extern "C" fn echo8(a: W, b: W, c: W, d: W, e: W, f: W, g: W, h: W) -> W {
        checksum(&[a, b, c, d, e, f, g, h])
    }
    extern "C" fn echo9(a: W, b: W, c: W, d: W, e: W, f: W, g: W, h: W, i: W) -> W {
        checksum(&[a, b, c, d, e, f, g, h, i])
    }

    fn echo_entry(arity: usize) -> ServiceAddr {
        match arity {
            0 => (echo0 as extern "C" fn() -> W).entry(),
            1 => (echo1 as extern "C" fn(W) -> W).entry(),
            2 => (echo2 as extern "C" fn(W, W) -> W).entry(),
            3 => (echo3 as extern "C" fn(W, W, W) -> W).entry(),
            4 => (echo4 as extern "C" fn(W, W, W, W) -> W).entry(),
            5 => (echo5 as extern "C" fn(W, W, W, W, W) -> W).entry(),
            6 => (echo6 as extern "C" fn(W, W, W, W, W, W) -> W).entry(),
            7 => (echo7 as extern "C" fn(W, W, W, W, W, W, W) -> W).entry(),
            8 => (echo8 as extern "C" fn(W, W, W, W, W, W, W, W) -> W).entry(),
            _ => (echo9 as extern "C" fn(W, W, W, W, W, W, W, W, W) -> W).entry(),
        }
    }

    #[test]
    fn test_every_arity_sees_its_words_in_order() {
        for n in 0..=MAX_FORWARDED_ARGS {
            let words: Vec<Word> = (0..n).map(|i| 0x1000 * (i as Word + 1) + 7).collect();
            let frame = ArgumentFrame::from_words(&words).unwrap();

            // SAFETY: echo{n} takes exactly n words
            let ret = unsafe { transfer(echo_entry(n), &frame) };
            assert_eq!(ret, checksum(&words), "arity {}", n);
        }
    }

    #[test]
    fn test_register_boundary() {
        let n = REGISTER_ARGS.min(MAX_FORWARDED_ARGS);
        let words: Vec<Word> = (1..=n as Word).collect();
        let frame = ArgumentFrame::from_words(&words).unwrap();
        assert!(frame.spill().is_empty());

        // SAFETY: echo{n} takes exactly n words
        let ret = unsafe { transfer(echo_entry(n), &frame) };
        assert_eq!(ret, checksum(&words));
    }

    #[cfg(any(
        target_arch = "riscv32",
        target_arch = "riscv64",
        target_arch = "aarch64",
        all(target_arch = "x86_64", not(target_os = "windows"))
    ))]
    #[test]
    fn test_unused_slots_read_as_zero() {
        let seed: Vec<Word> = (0..MAX_FORWARDED_ARGS as Word).map(|i| 0xa5a5_0000 + i).collect();
        let seeded = ArgumentFrame::from_words(&seed).unwrap();
        let nine = echo_entry(MAX_FORWARDED_ARGS);

        for n in [REGISTER_ARGS.min(MAX_FORWARDED_ARGS), 2] {
            // Leave a known pattern in the spill slots
            // SAFETY: echo9 takes nine words
            assert_eq!(unsafe { transfer(nine, &seeded) }, checksum(&seed));

            let words: Vec<Word> = (1..=n as Word).collect();
            let frame = ArgumentFrame::from_words(&words).unwrap();
            assert!(frame.spill().is_empty());

            let mut padded = words.clone();
            padded.resize(MAX_FORWARDED_ARGS, 0);
            // SAFETY: on these targets the registers and spill slots past
            // frame.len() are staged as zero
            let ret = unsafe { transfer(nine, &frame) };
            assert_eq!(ret, checksum(&padded), "{} words", n);
        }
    }

    #[test]
    fn test_stack_spill_order() {
        let words: Vec<Word> = [9, 8, 7, 6, 5, 4, 3, 2, 1][..MAX_FORWARDED_ARGS].to_vec();
        let frame = ArgumentFrame::from_words(&words).unwrap();

        // SAFETY: echo9 takes nine words
        let ret = unsafe { transfer(echo_entry(MAX_FORWARDED_ARGS), &frame) };
        assert_eq!(ret, checksum(&words));

        let mut reversed = words.clone();
        reversed.reverse();
        assert_ne!(ret, checksum(&reversed));
    }

    #[test]
    fn test_result_passed_through_unchanged() {
        extern "C" fn minus_one() -> W {
            crate::config::DISPATCH_FAILED
        }
        let frame = ArgumentFrame::empty();
        let entry = (minus_one as extern "C" fn() -> W).entry();
        // SAFETY: minus_one takes no words
        assert_eq!(unsafe { transfer(entry, &frame) }, crate::config::DISPATCH_FAILED);
    }
}
