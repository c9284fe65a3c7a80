//! # GuaBoot Core
//!
//! The firmware-independent half of the loader. A firmware target provides
//! a [`Firmware`](firmware::Firmware) (kernel bytes, memory map, exit from
//! service mode), a [`PhysicalMemory`](memory::PhysicalMemory) and a
//! [`Machine`](machine::Machine); everything else lives here:
//!
//! | Module | Role |
//! |--------|------|
//! | [`elf`] | Verify 64-bit (and legacy 32-bit) kernel images |
//! | [`loader`] | Copy `PT_LOAD` segments above 1 MiB, zero BSS |
//! | [`crc32`] | Checksum of the loaded range |
//! | [`memory_map`] | E820 / UEFI map to usable/reserved entries and totals |
//! | [`boot_info`] | Fill the kernel's [`BootInfo`](guaboot_info::boot::BootInfo) |
//! | [`config`] | `key = value` loader settings |
//! | [`pipeline`] | Run the above in order |
//! | [`transition`] | Protected mode to long mode |
//! | [`dispatch`] | Call the kernel, halt on return or failure |
//!
//! ```rust
//! use guaboot_core::crc32::crc32;
//! assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot_info;
pub mod config;
pub mod crc32;
pub mod dispatch;
pub mod elf;
pub mod firmware;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod memory_map;
pub mod pipeline;
pub mod transition;
