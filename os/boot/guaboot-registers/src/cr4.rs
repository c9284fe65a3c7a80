use bitfield_struct::bitfield;

/// CR4: Control Register 4.
///
/// The loader sets PAE and nothing else; the other defined bits are kept so
/// that read-modify-write preserves the firmware's choices.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Cr4 {
    /// Bit 0: VME: Virtual-8086 Mode Extensions.
    pub vme: bool,

    /// Bit 1: PVI: Protected-Mode Virtual Interrupts.
    pub pvi: bool,

    /// Bit 2: TSD: Time Stamp Disable.
    pub tsd: bool,

    /// Bit 3: DE: Debugging Extensions.
    pub de: bool,

    /// Bit 4: PSE: Page Size Extensions.
    pub pse: bool,

    /// Bit 5: PAE: Physical Address Extension.
    ///
    /// Must be set before CR3 receives a PML4 and before long mode activates.
    pub pae: bool,

    /// Bit 6: MCE: Machine-Check Enable.
    pub mce: bool,

    /// Bit 7: PGE: Page Global Enable.
    pub pge: bool,

    /// Bit 8: PCE: Performance-Monitoring Counter Enable.
    pub pce: bool,

    /// Bit 9: OSFXSR: OS supports FXSAVE/FXRSTOR.
    pub osfxsr: bool,

    /// Bit 10: OSXMMEXCPT: OS supports unmasked SIMD FP exceptions.
    pub osxmmexcpt: bool,

    /// Bit 11: UMIP: User-Mode Instruction Prevention.
    pub umip: bool,

    /// Bit 12: LA57: 5-level paging. Must stay clear for the loader's tables.
    pub la57: bool,

    /// Bits 13–63: not used by the loader.
    #[bits(51)]
    pub upper: u64,
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
control_register_asm!(Cr4, "cr4");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pae_is_bit_5() {
        assert_eq!(Cr4::new().with_pae(true).into_bits(), 1 << 5);
    }
}
