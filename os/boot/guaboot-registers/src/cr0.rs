use bitfield_struct::bitfield;

/// Architectural model of CR0.
///
/// Only PE and PG matter for the mode switch; the remaining bits are modeled
/// so a read-modify-write keeps whatever the firmware configured. Reserved
/// bits are private and stay 0.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr0 {
    /// Bit 0: Protection Enable (PE).
    ///
    /// Set by stage 1 before entering stage 2; long mode requires it.
    pub pe_protection_enable: bool,

    /// Bit 1: Monitor Coprocessor (MP).
    pub mp_monitor_coprocessor: bool,

    /// Bit 2: Emulation (EM).
    pub em_emulation: bool,

    /// Bit 3: Task Switched (TS).
    pub ts_task_switched: bool,

    /// Bit 4: Extension Type (ET). Hardwired to 1 on modern CPUs.
    pub et_extension_type: bool,

    /// Bit 5: Numeric Error (NE).
    pub ne_numeric_error: bool,

    /// Bits 6–15: Reserved.
    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16: Write Protect (WP).
    pub wp_write_protect: bool,

    /// Bit 17: Reserved.
    #[bits(default = 0)]
    _reserved_17: bool,

    /// Bit 18: Alignment Mask (AM).
    pub am_alignment_mask: bool,

    /// Bits 19–28: Reserved.
    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29: Not-Write-Through (NW).
    pub nw_not_write_through: bool,

    /// Bit 30: Cache Disable (CD).
    pub cd_cache_disable: bool,

    /// Bit 31: Paging (PG).
    ///
    /// With `EFER.LME` set, turning this on activates long mode (`EFER.LMA`).
    pub pg_paging: bool,

    /// Bits 32–63: Reserved.
    #[bits(32, default = 0)]
    _reserved_32_63: u32,
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
control_register_asm!(Cr0, "cr0");
