//! # GuaBoot Stage 2 (BIOS)
//!
//! Stage 1 runs in real mode, reads the kernel file to
//! [`KERNEL_IMAGE_ADDR`](guaboot_info::memory::KERNEL_IMAGE_ADDR), collects
//! the E820 map and enters this stage in 32-bit protected mode with a
//! [`StageHandoff`](guaboot_info::handoff::StageHandoff) in `esi`.
//!
//! Everything stage 2 needs from BIOS has been gathered by then, so the
//! [`Firmware`](guaboot_core::firmware::Firmware) implemented here only
//! replays the handoff ([`BiosFirmware`]), and memory access is plain
//! identity-mapped RAM that keeps its hands off the staged kernel file
//! ([`StagedMemory`]).
//!
//! The binary (`guaboot2`) is built for the `i686-guaboot.json` target next
//! to this crate:
//!
//! ```text
//! cargo +nightly build -p guaboot-bios --bin guaboot2 --release \
//!     --target os/firmware/guaboot-bios/i686-guaboot.json \
//!     -Zbuild-std=core -Zbuild-std-features=compiler-builtins-mem
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod firmware;
mod memory;

pub use firmware::BiosFirmware;
pub use memory::StagedMemory;

/// Command line used when the handoff carries none.
pub const DEFAULT_COMMAND_LINE: &str = "root=/dev/ram0 debug=true";
