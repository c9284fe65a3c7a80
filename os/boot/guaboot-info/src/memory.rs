//! # Physical Memory Layout
//!
//! Fixed addresses shared by stage 1, stage 2 and the transition stub.
//! These form a private protocol between binaries built together; changing
//! one means rebuilding all of them.

use crate::boot::BootInfoPage;
use guaboot_addresses::PhysicalAddress;

/// Segments may not be loaded below this address; the firmware data
/// structures and the loader itself live there.
pub const LOW_MEMORY_LIMIT: PhysicalAddress = PhysicalAddress::new(0x0010_0000); // 1 MiB

/// Where the linker places the 64-bit transition stub.
///
/// # Stage 2 Build
/// Sourced by the BIOS stage's `build.rs` to configure the linker.
pub const TRANSITION_STUB_ADDR: PhysicalAddress = PhysicalAddress::new(0x0000_8000);

/// The [`StageHandoff`](crate::handoff::StageHandoff) record.
pub const STAGE_HANDOFF_ADDR: PhysicalAddress = PhysicalAddress::new(0x0000_9000);

/// The [`BootInfoPage`] the BIOS stage fills in.
pub const BOOT_INFO_ADDR: PhysicalAddress = PhysicalAddress::new(0x0000_A000);

/// The identity map's three tables (PML4, PDPT, PD), consecutive pages.
pub const PAGE_TABLE_ADDR: PhysicalAddress = PhysicalAddress::new(0x0001_0000);

/// Initial stack pointer loaded by the transition stub.
pub const STUB_STACK_TOP: PhysicalAddress = PhysicalAddress::new(0x0002_0000);

/// Where stage 1 loads stage 2 and jumps to, in 32-bit protected mode.
///
/// # Stage 2 Build
/// Sourced by the BIOS stage's `build.rs` to configure the linker.
pub const STAGE2_LOAD_ADDR: PhysicalAddress = PhysicalAddress::new(0x0002_0000);

/// Where stage 1 stages the raw kernel ELF file.
pub const KERNEL_IMAGE_ADDR: PhysicalAddress = PhysicalAddress::new(0x0100_0000); // 16 MiB

/// Largest kernel file stage 1 will stage (256 sectors of 2 KiB).
pub const KERNEL_IMAGE_MAX: u64 = 256 * 2048;

/// Bytes covered by the loader's identity map.
pub const IDENTITY_MAP_BYTES: u64 = 0x4000_0000; // 1 GiB

const _: () = {
    const PAGE: u64 = 4096;
    assert!(TRANSITION_STUB_ADDR.as_u64() + PAGE <= STAGE_HANDOFF_ADDR.as_u64());
    assert!(STAGE_HANDOFF_ADDR.as_u64() + PAGE <= BOOT_INFO_ADDR.as_u64());
    assert!(
        BOOT_INFO_ADDR.as_u64() + (BootInfoPage::PAGES as u64) * PAGE <= PAGE_TABLE_ADDR.as_u64()
    );
    assert!(PAGE_TABLE_ADDR.as_u64() + 3 * PAGE < STUB_STACK_TOP.as_u64());
    assert!(STUB_STACK_TOP.as_u64() <= STAGE2_LOAD_ADDR.as_u64());
    assert!(STAGE2_LOAD_ADDR.as_u64() < LOW_MEMORY_LIMIT.as_u64());
    assert!(PAGE_TABLE_ADDR.as_u64().is_multiple_of(PAGE));
    assert!(BOOT_INFO_ADDR.as_u64().is_multiple_of(PAGE));
    assert!(KERNEL_IMAGE_ADDR.as_u64() + KERNEL_IMAGE_MAX <= IDENTITY_MAP_BYTES);
};
