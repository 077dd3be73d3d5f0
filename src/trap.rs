//! RISC-V Service Call Trap Entry
//!
//! The normal world requests a secure service with
//! `ecall` after loading `argc` into `a0` and the variadic words
//! `service_id, arg0, ...` into `a1..a7`, with any further words on its stack.
//!
//! # Privilege Levels
//! - U-mode: normal world (REE)
//! - M-mode: secure world, where this handler runs
//!
//! # Security Considerations
//! - Only ecalls from U-mode are serviced
//! - The stack part of the argument stream is validated as REE memory
//!   before a single word is read from it
//! - The frame is only modified for serviced calls

use crate::config::{Word, DISPATCH_FAILED, MAX_ARGS};
use crate::dispatch::{ArgSource, DispatchError, Dispatcher};
use crate::ree::{validate_ree_read, ReeBuffer, ReeLayout};

/// Register indices in [`TrapFrame::gpr`]
pub mod reg {
    pub const SP: usize = 2;
    pub const A0: usize = 10;
    pub const A1: usize = 11;
    pub const A7: usize = 17;
}

/// Argument words passed in registers after `argc` (`a1..a7`).
pub const REG_STREAM_WORDS: usize = reg::A7 - reg::A1 + 1;

/// Length of the `ecall` instruction.
const ECALL_INSN_LEN: Word = 4;

/// Register state saved by the trap vector
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    /// General purpose registers x0-x31
    pub gpr: [Word; 32],
    /// Machine exception program counter
    pub mepc: Word,
    /// Machine trap cause
    pub mcause: Word,
    /// Machine trap value
    pub mtval: Word,
}

impl TrapFrame {
    pub const fn zeroed() -> Self {
        Self {
            gpr: [0; 32],
            mepc: 0,
            mcause: 0,
            mtval: 0,
        }
    }
}

/// Trap cause decoded from `mcause`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    EcallFromUser,
    EcallFromSupervisor,
    EcallFromMachine,
    /// Any other synchronous exception code
    Exception(Word),
    /// Interrupt with its code
    Interrupt(Word),
}

impl From<Word> for TrapCause {
    fn from(mcause: Word) -> Self {
        let interrupt_bit: Word = 1 << (Word::BITS - 1);
        let code = mcause & !interrupt_bit;
        if mcause & interrupt_bit != 0 {
            return TrapCause::Interrupt(code);
        }
        match code {
            8 => TrapCause::EcallFromUser,
            9 => TrapCause::EcallFromSupervisor,
            11 => TrapCause::EcallFromMachine,
            _ => TrapCause::Exception(code),
        }
    }
}

/// What the trap handler did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// A service call was handled; the word was written to `a0`.
    Serviced(Word),
    /// Not a service call. The frame is untouched.
    Unhandled(TrapCause),
}

/// Argument stream of a trapped service call: `a1..a7`, then the caller stack.
pub struct TrapArgs {
    regs: [Word; REG_STREAM_WORDS],
    stack: ReeBuffer,
    pos: usize,
}

impl TrapArgs {
    /// Build the stream for `argc` words.
    ///
    /// The stack part is only looked at when `argc` is within bounds; an
    /// oversized `argc` is left for the dispatcher to reject.
    pub fn new(
        frame: &TrapFrame,
        argc: usize,
        layout: &ReeLayout<'_>,
    ) -> Result<Self, DispatchError> {
        let mut regs = [0; REG_STREAM_WORDS];
        regs.copy_from_slice(&frame.gpr[reg::A1..=reg::A7]);

        let stack_words = if argc <= MAX_ARGS {
            argc.saturating_sub(REG_STREAM_WORDS)
        } else {
            0
        };
        let stack_bytes = stack_words * core::mem::size_of::<Word>();
        let stack = validate_ree_read(layout, frame.gpr[reg::SP], stack_bytes)
            .map_err(|_| DispatchError::InvalidCallerStack)?;

        Ok(Self {
            regs,
            stack,
            pos: 0,
        })
    }

    fn len(&self) -> usize {
        REG_STREAM_WORDS + self.stack.word_count()
    }
}

impl ArgSource for TrapArgs {
    fn next_word(&mut self) -> Word {
        let word = if self.pos < REG_STREAM_WORDS {
            self.regs[self.pos]
        } else {
            match self.stack.read_word(self.pos - REG_STREAM_WORDS) {
                Some(word) => word,
                None => return 0,
            }
        };
        self.pos += 1;
        word
    }

    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos)
    }

    fn release(&mut self) {
        self.pos = self.len();
    }
}

/// Handle a trap that may be a service call from the normal world.
///
/// For a U-mode ecall the dispatch result is written to `a0` and `mepc`
/// is moved past the `ecall`.
pub fn handle_service_call<const N: usize>(
    frame: &mut TrapFrame,
    dispatcher: &Dispatcher<'_, N>,
    layout: &ReeLayout<'_>,
) -> TrapOutcome {
    let cause = TrapCause::from(frame.mcause);
    if cause != TrapCause::EcallFromUser {
        log::warn!("unhandled trap {:?} at 0x{:08x}", cause, frame.mepc);
        return TrapOutcome::Unhandled(cause);
    }

    let argc = frame.gpr[reg::A0];
    let result = match TrapArgs::new(frame, argc, layout) {
        Ok(args) => dispatcher.dispatch(argc, args),
        Err(err) => {
            log::error!("{}", err);
            DISPATCH_FAILED
        }
    };

    frame.gpr[reg::A0] = result;
    frame.mepc = frame.mepc.wrapping_add(ECALL_INSN_LEN);
    TrapOutcome::Serviced(result)
}
