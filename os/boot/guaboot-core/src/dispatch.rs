//! # Kernel Dispatch

use crate::machine::{KernelCall, Machine};
use crate::pipeline::BootError;
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_info::boot::BOOT_MAGIC;
use log::{error, info};

/// Call `entry(BOOT_MAGIC, boot_info)`; halt if the kernel returns.
///
/// # Safety
/// `entry` must be the entry point of a loaded 64-bit kernel and
/// `boot_info` the address of a finished boot record.
pub unsafe fn dispatch<M: KernelCall + ?Sized>(
    machine: &mut M,
    entry: VirtualAddress,
    boot_info: PhysicalAddress,
) -> ! {
    info!("Entering kernel at {entry} with boot info at {boot_info}");
    unsafe { machine.call_kernel(entry, BOOT_MAGIC, boot_info) };
    error!("The kernel returned to the loader; halting");
    machine.halt()
}

/// Report `error` with the step that failed, then halt.
pub fn fail_stop<M: Machine + ?Sized>(machine: &mut M, error: &BootError) -> ! {
    error!("Boot failed while {}: {error}", error.step());
    machine.halt()
}
