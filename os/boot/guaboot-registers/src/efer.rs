use bitfield_struct::bitfield;

/// `IA32_EFER` (MSR `0xC000_0080`).
///
/// The loader sets LME and NXE before enabling paging; LMA is reported back
/// by the CPU once long mode is active.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0: SCE: System Call Extensions.
    pub sce: bool,

    /// Bits 1–7: Reserved or vendor specific.
    #[bits(7)]
    pub reserved0: u8,

    /// Bit 8: LME: Long Mode Enable.
    pub lme: bool,

    /// Bit 9: Reserved.
    #[bits(access = RO)]
    pub reserved1: bool,

    /// Bit 10: LMA: Long Mode Active (read-only).
    pub lma: bool,

    /// Bit 11: NXE: No-Execute Enable.
    pub nxe: bool,

    /// Bits 12–63: not used by the loader.
    #[bits(52)]
    pub upper: u64,
}

impl Efer {
    /// MSR index for `IA32_EFER`.
    pub const MSR_EFER: u32 = 0xC000_0080;
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
impl crate::LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        let (lo, hi): (u32, u32);
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") Self::MSR_EFER,
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits((u64::from(hi) << 32) | u64::from(lo))
    }
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
impl crate::StoreRegisterUnsafe for Efer {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn store_unsafe(self) {
        let efer = self.into_bits();
        let lo = efer as u32;
        let hi = (efer >> 32) as u32;
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") Self::MSR_EFER,
                in("eax") lo,
                in("edx") hi,
                options(nostack, preserves_flags)
            );
        }
    }
}
