//! # Loader Diagnostic Output
//!
//! Operator-visible progress and error lines for both loader stages. Nothing
//! here is machine readable; the output exists so a human watching a serial
//! console or QEMU's `-debugcon` can tell which step a boot stopped at.
//!
//! ## Sinks
//!
//! * **QEMU debug port** (`0x402`, feature `qemu`): every byte written shows
//!   up on the host, e.g. with `-debugcon stdio`. Silently ignored on real
//!   hardware.
//! * **16550 UART** on COM1 (`0x3F8`, feature `serial`): programmed for
//!   38400 baud 8N1 by [`serial::Uart16550::init`], every byte waits for
//!   the transmit holding register to drain.
//!
//! ## Logging
//!
//! [`ConsoleLogger`] implements [`log::Log`] and writes one
//! `[LEVEL] target: message` line per record to every enabled sink.
//!
//! ```rust,no_run
//! use guaboot_console::ConsoleLogger;
//! use log::{LevelFilter, info};
//!
//! ConsoleLogger::new(LevelFilter::Debug).init().ok();
//! info!("stage 2 up");
//! ```
//!
//! [`qemu_trace!`] bypasses the logger for raw, unformatted tracing;
//! [`trace_boot_info`] uses it to dump a finished boot record.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod format;
mod logger;
pub mod port;
pub mod serial;
mod trace;

pub use format::write_record;
pub use logger::ConsoleLogger;
pub use trace::{trace_boot_info, write_boot_info};

#[cfg(feature = "qemu")]
#[doc(hidden)]
pub mod qemu_fmt {
    use crate::port::{CpuPorts, PortIo};
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug port.
    pub const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Writes straight to the debug port; never blocks.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                // SAFETY: port 0x402 has no side effects outside QEMU.
                unsafe { CpuPorts.outb(QEMU_DEBUG_PORT, b) };
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "qemu"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// Formatted output to the QEMU debug port, without going through `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
