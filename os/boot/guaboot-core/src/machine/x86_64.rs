//! Long mode, as left by UEFI firmware.

use crate::machine::{FarPointer, KernelCall, Machine, StubArguments};
use crate::transition::gdt::{DescriptorTablePointer, SegmentSelector};
use core::arch::asm;
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_info::boot::{BootInfo, KernelEntryFn};
use guaboot_registers::cr0::Cr0;
use guaboot_registers::cr3::Cr3;
use guaboot_registers::cr4::Cr4;
use guaboot_registers::efer::Efer;
use guaboot_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

const PIC1_DATA: u16 = 0x21;
const PIC2_DATA: u16 = 0xA1;

/// The CPU the loader is running on.
pub struct NativeMachine {
    _private: (),
}

impl NativeMachine {
    /// # Safety
    /// Only one instance may exist; it must be used at CPL 0.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

unsafe fn outb(port: u16, value: u8) {
    unsafe {
        asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
    }
}

impl Machine for NativeMachine {
    unsafe fn disable_interrupts(&mut self) {
        unsafe {
            asm!("cli", options(nomem, nostack));
            outb(PIC1_DATA, 0xFF);
            outb(PIC2_DATA, 0xFF);
        }
    }

    unsafe fn load_gdt(&mut self, pointer: DescriptorTablePointer) {
        unsafe {
            asm!(
                "lgdt [{}]",
                in(reg) &raw const pointer,
                options(readonly, nostack, preserves_flags)
            );
        }
    }

    unsafe fn load_data_segments(&mut self, selector: SegmentSelector) {
        unsafe {
            asm!(
                "mov ds, {0:x}",
                "mov es, {0:x}",
                "mov fs, {0:x}",
                "mov gs, {0:x}",
                "mov ss, {0:x}",
                in(reg) selector.bits(),
                options(nostack, preserves_flags)
            );
        }
    }

    unsafe fn read_cr0(&mut self) -> Cr0 {
        unsafe { Cr0::load_unsafe() }
    }

    unsafe fn write_cr0(&mut self, value: Cr0) {
        unsafe { value.store_unsafe() }
    }

    unsafe fn read_cr4(&mut self) -> Cr4 {
        unsafe { Cr4::load_unsafe() }
    }

    unsafe fn write_cr4(&mut self, value: Cr4) {
        unsafe { value.store_unsafe() }
    }

    unsafe fn write_cr3(&mut self, value: Cr3) {
        unsafe { value.store_unsafe() }
    }

    unsafe fn read_efer(&mut self) -> Efer {
        unsafe { Efer::load_unsafe() }
    }

    unsafe fn write_efer(&mut self, value: Efer) {
        unsafe { value.store_unsafe() }
    }

    #[allow(clippy::cast_possible_truncation)]
    unsafe fn far_jump(&mut self, target: FarPointer, args: StubArguments) -> ! {
        let entry = args.entry.as_u64();
        unsafe {
            asm!(
                "push {sel}",
                "push {off}",
                "retfq",
                sel = in(reg) u64::from(target.selector.bits()),
                off = in(reg) target.offset.as_u64(),
                in("edi") args.magic,
                in("rsi") args.boot_info.as_u64(),
                in("eax") entry as u32,
                in("edx") (entry >> 32) as u32,
                options(noreturn)
            )
        }
    }

    fn halt(&mut self) -> ! {
        loop {
            // SAFETY: masking interrupts and halting cannot break any invariant.
            unsafe { asm!("cli", "hlt", options(nomem, nostack)) };
        }
    }
}

impl KernelCall for NativeMachine {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn call_kernel(&mut self, entry: VirtualAddress, magic: u32, boot_info: PhysicalAddress) {
        // SAFETY: the caller guarantees `entry` is 64-bit code following the System V ABI.
        let kernel: KernelEntryFn = unsafe { core::mem::transmute(entry.as_u64() as usize) };
        let record = core::ptr::with_exposed_provenance::<BootInfo>(boot_info.as_u64() as usize);
        kernel(magic, record);
    }
}
