//! Secure Console UART
//!
//! Transmit-only driver for the UART reserved to the secure world. It backs
//! the `kprint!`/`kprintln!` macros and the [`log`] backend in
//! [`crate::logger`].
//!
//! # Memory Map
//! - UART0 base address: 0x6000_0000
//! - FIFO register at offset 0x00, status register at offset 0x1C
//!
//! # Security Considerations
//! - Output only; the normal world never writes through this driver
//! - Uses spinlock for access from multiple harts

use core::fmt::{self, Write};
use spin::Mutex;

/// Secure console UART base address
const UART_BASE: usize = 0x6000_0000;

/// Register offsets
mod regs {
    /// TX/RX FIFO data register
    pub const FIFO: usize = 0x00;
    /// Status register
    pub const STATUS: usize = 0x1C;
}

/// Status register fields
mod status {
    /// Shift of the TX FIFO fill level
    pub const TXFIFO_CNT_SHIFT: u32 = 16;
    /// Mask of the TX FIFO fill level
    pub const TXFIFO_CNT_MASK: u32 = 0x3FF;
    /// Hardware TX FIFO depth
    pub const TXFIFO_DEPTH: u32 = 128;
}

/// Console UART driver
pub struct Uart {
    base: usize,
    initialized: bool,
}

impl Uart {
    /// Create a new UART instance (not yet initialized)
    pub const fn new(base: usize) -> Self {
        Self {
            base,
            initialized: false,
        }
    }

    /// Initialize the UART
    ///
    /// # Safety
    /// - `base` must be the MMIO address of a UART owned by the secure world
    /// - The bootloader has already configured baud rate and pins
    pub unsafe fn init(&mut self) {
        self.initialized = true;
    }

    /// Returns true once [`Uart::init`] has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn write_byte(&self, byte: u8) {
        if !self.initialized {
            return;
        }

        // SAFETY: base was handed to init() as a valid secure-world UART;
        // both registers are 32-bit MMIO words.
        unsafe {
            let status_reg = (self.base + regs::STATUS) as *const u32;
            let fifo = (self.base + regs::FIFO) as *mut u32;

            // Wait for room in the TX FIFO
            loop {
                let level = (core::ptr::read_volatile(status_reg) >> status::TXFIFO_CNT_SHIFT)
                    & status::TXFIFO_CNT_MASK;
                if level < status::TXFIFO_DEPTH - 1 {
                    break;
                }
                core::hint::spin_loop();
            }

            core::ptr::write_volatile(fifo, byte as u32);
        }
    }

    /// Write a string to the UART
    pub fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Uart::write_str(self, s);
        Ok(())
    }
}

/// Global console instance protected by spinlock
pub static UART: Mutex<Uart> = Mutex::new(Uart::new(UART_BASE));

/// Print to the secure console
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut uart = $crate::drivers::uart::UART.lock();
        let _ = write!(uart, $($arg)*);
    }};
}

/// Print a line to the secure console
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::kprint!($($arg)*);
        $crate::kprint!("\n");
    }};
}
