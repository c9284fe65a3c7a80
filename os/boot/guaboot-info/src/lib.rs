//! # Boot Handoff Interface
//!
//! The contracts shared between the loader stages and the kernel. Nothing in
//! here executes; the crate only pins down layouts and addresses so that
//! independently compiled binaries agree on them.
//!
//! ## Modules
//!
//! ### Boot Information ([`boot`])
//! The record the kernel receives as its second argument:
//! * [`BootInfo`](boot::BootInfo) with magic, version and self-size so a kernel
//!   can reject a record it does not understand
//! * the normalized memory map ([`MemoryMapEntry`](boot::MemoryMapEntry))
//! * the module list ([`Module`](boot::Module))
//! * [`BootInfoPage`](boot::BootInfoPage), the single allocation holding the
//!   record together with everything its pointers refer to
//!
//! ### Stage Handoff ([`handoff`])
//! The versioned record stage 1 leaves for stage 2 at a fixed physical
//! address, and which stage 2 completes with the discovered entry point and
//! boot-record address before the mode switch.
//!
//! ### Physical Layout ([`memory`])
//! The fixed physical addresses both stages are built against.
//!
//! ```text
//! 0x0000_0000 ┌──────────────────────────────┐
//!             │ IVT / BDA / stage 1          │
//! 0x0000_8000 ├──────────────────────────────┤ TRANSITION_STUB_ADDR
//! 0x0000_9000 ├──────────────────────────────┤ STAGE_HANDOFF_ADDR
//! 0x0000_A000 ├──────────────────────────────┤ BOOT_INFO_ADDR (BootInfoPage)
//! 0x0001_0000 ├──────────────────────────────┤ PAGE_TABLE_ADDR (PML4, PDPT, PD)
//! 0x0001_3000 ├──────────────────────────────┤ stub stack (grows down from STUB_STACK_TOP)
//! 0x0002_0000 ├──────────────────────────────┤ STAGE2_LOAD_ADDR
//!             │ stage 2, E820 buffer, BIOS   │
//! 0x0010_0000 ├──────────────────────────────┤ LOW_MEMORY_LIMIT: kernel segments start here
//!             │ kernel                       │
//! 0x0100_0000 ├──────────────────────────────┤ KERNEL_IMAGE_ADDR: raw ELF staged by stage 1
//!             └──────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod handoff;
pub mod memory;
