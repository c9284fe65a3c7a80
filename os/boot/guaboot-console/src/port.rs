//! # Port I/O

/// Byte-wide x86 port I/O.
pub trait PortIo {
    /// # Safety
    /// Writing an I/O port can reprogram arbitrary hardware.
    unsafe fn outb(&self, port: u16, value: u8);

    /// # Safety
    /// Reading some I/O ports has side effects (e.g. acknowledging status).
    unsafe fn inb(&self, port: u16) -> u8;
}

/// The CPU's `in`/`out` instructions.
///
/// On targets without port I/O writes are dropped and reads return `0xFF`,
/// like a floating ISA bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuPorts;

impl PortIo for CpuPorts {
    #[inline]
    #[allow(unused_variables)]
    unsafe fn outb(&self, port: u16, value: u8) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        };
    }

    #[inline]
    #[allow(unused_variables)]
    unsafe fn inb(&self, port: u16) -> u8 {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let value = {
            let value: u8;
            unsafe {
                core::arch::asm!(
                    "in al, dx",
                    in("dx") port,
                    out("al") value,
                    options(nomem, nostack, preserves_flags)
                );
            }
            value
        };
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let value = 0xFF;
        value
    }
}
