//! # Hardware Access
//!
//! Everything the loader does to the CPU goes through [`Machine`]: one
//! implementation per ISA drives the real registers, and tests substitute a
//! recorder. The methods are deliberately low level; ordering lives in
//! [`transition`](crate::transition) and [`dispatch`](crate::dispatch).

use crate::transition::gdt::{DescriptorTablePointer, SegmentSelector};
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_registers::cr0::Cr0;
use guaboot_registers::cr3::Cr3;
use guaboot_registers::cr4::Cr4;
use guaboot_registers::efer::Efer;

#[cfg(all(feature = "asm", target_arch = "x86"))]
mod x86;
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
mod x86_64;

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use x86::NativeMachine;
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use x86_64::NativeMachine;

/// Target of the final far jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarPointer {
    pub selector: SegmentSelector,
    pub offset: PhysicalAddress,
}

/// Register arguments handed to the transition stub.
///
/// The stub expects `edi = magic`, `esi = boot_info`, `edx:eax = entry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubArguments {
    pub magic: u32,
    pub boot_info: PhysicalAddress,
    pub entry: VirtualAddress,
}

/// Privileged CPU operations.
///
/// Every method except [`Machine::halt`] is `unsafe` to call and assumes
/// CPL 0 with interrupts masked by [`Machine::disable_interrupts`].
pub trait Machine {
    /// `cli` and mask every line on both legacy PICs.
    ///
    /// # Safety
    /// No interrupt will be serviced until the kernel re-enables them.
    unsafe fn disable_interrupts(&mut self);

    /// `lgdt`.
    ///
    /// # Safety
    /// The table must stay resident and valid for as long as it is loaded.
    unsafe fn load_gdt(&mut self, pointer: DescriptorTablePointer);

    /// Reload `ds`, `es`, `fs`, `gs` and `ss` with `selector`.
    ///
    /// # Safety
    /// `selector` must name a present data descriptor in the loaded GDT.
    unsafe fn load_data_segments(&mut self, selector: SegmentSelector);

    /// # Safety
    /// Privileged.
    unsafe fn read_cr0(&mut self) -> Cr0;
    /// # Safety
    /// Writing `CR0` changes how every following instruction executes.
    unsafe fn write_cr0(&mut self, value: Cr0);
    /// # Safety
    /// Privileged.
    unsafe fn read_cr4(&mut self) -> Cr4;
    /// # Safety
    /// Writing `CR4` changes how every following instruction executes.
    unsafe fn write_cr4(&mut self, value: Cr4);
    /// # Safety
    /// The root must point to a valid PML4 that maps the running code.
    unsafe fn write_cr3(&mut self, value: Cr3);
    /// # Safety
    /// Privileged.
    unsafe fn read_efer(&mut self) -> Efer;
    /// # Safety
    /// Changing `EFER` while paging is on is undefined.
    unsafe fn write_efer(&mut self, value: Efer);

    /// Far jump to `target` with `args` in registers. Never returns.
    ///
    /// # Safety
    /// `target.offset` must hold code valid for the mode `target.selector`
    /// selects.
    unsafe fn far_jump(&mut self, target: FarPointer, args: StubArguments) -> !;

    /// Disable interrupts and halt forever.
    fn halt(&mut self) -> !;
}

/// Calling the kernel directly; only possible from 64-bit mode.
pub trait KernelCall: Machine {
    /// Call `entry(magic, boot_info)` with the System V ABI.
    ///
    /// Returns only if the kernel does.
    ///
    /// # Safety
    /// `entry` must be the entry point of a loaded 64-bit kernel.
    unsafe fn call_kernel(&mut self, entry: VirtualAddress, magic: u32, boot_info: PhysicalAddress);
}
