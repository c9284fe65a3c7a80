//! # Stage 1 → Stage 2 Handoff
//!
//! Stage 1 runs in real mode, reads the kernel file and the E820 map with
//! BIOS services, fills in the first half of a [`StageHandoff`] at
//! [`STAGE_HANDOFF_ADDR`](crate::memory::STAGE_HANDOFF_ADDR) and jumps to
//! stage 2 in 32-bit protected mode with the record's address in `esi`.
//!
//! Stage 2 validates magic and version, reads the stage-1 fields, and writes
//! the stage-2 fields before the far jump. The transition stub reads
//! [`StageHandoff::kernel_entry`] and [`StageHandoff::boot_info`] from here
//! again if its register arguments were lost.

/// `"GBS2"` in memory order.
pub const STAGE_HANDOFF_MAGIC: u32 = u32::from_le_bytes(*b"GBS2");

/// Current layout revision.
pub const STAGE_HANDOFF_VERSION: u32 = 1;

/// The inter-stage record.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageHandoff {
    /// Always [`STAGE_HANDOFF_MAGIC`].
    pub magic: u32,
    /// Always [`STAGE_HANDOFF_VERSION`].
    pub version: u32,

    /// Physical address of the raw kernel file (stage 1).
    pub kernel_image_base: u64,
    /// Length of the raw kernel file in bytes (stage 1).
    pub kernel_image_len: u64,
    /// Physical address of the E820 entries, 24 bytes each (stage 1).
    pub e820_base: u64,
    /// Number of E820 entries; 0 if the query failed (stage 1).
    pub e820_count: u32,
    /// BIOS drive number the loader was started from (stage 1).
    pub boot_drive: u32,

    /// Lowest physical address of the loaded kernel (stage 2).
    pub kernel_phys_base: u64,
    /// Kernel entry point (stage 2).
    pub kernel_entry: u64,
    /// Physical address of the boot record (stage 2).
    pub boot_info: u64,
}

impl StageHandoff {
    /// A record as stage 1 leaves it, stage-2 slots cleared.
    #[must_use]
    pub const fn from_stage1(
        kernel_image_base: u64,
        kernel_image_len: u64,
        e820_base: u64,
        e820_count: u32,
        boot_drive: u32,
    ) -> Self {
        Self {
            magic: STAGE_HANDOFF_MAGIC,
            version: STAGE_HANDOFF_VERSION,
            kernel_image_base,
            kernel_image_len,
            e820_base,
            e820_count,
            boot_drive,
            kernel_phys_base: 0,
            kernel_entry: 0,
            boot_info: 0,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic == STAGE_HANDOFF_MAGIC && self.version == STAGE_HANDOFF_VERSION
    }

    /// Record what stage 2 discovered.
    pub const fn complete(&mut self, kernel_phys_base: u64, kernel_entry: u64, boot_info: u64) {
        self.kernel_phys_base = kernel_phys_base;
        self.kernel_entry = kernel_entry;
        self.boot_info = boot_info;
    }
}

const _: () = {
    assert!(size_of::<StageHandoff>() == 64);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_valid() {
        let h = StageHandoff::from_stage1(0x0100_0000, 0x4000, 0x2_0000, 12, 0x80);
        assert!(h.is_valid());
        assert_eq!(h.kernel_entry, 0);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut h = StageHandoff::from_stage1(0, 0, 0, 0, 0);
        h.version = 2;
        assert!(!h.is_valid());
    }

    #[test]
    fn complete_fills_stage2_slots() {
        let mut h = StageHandoff::from_stage1(0x0100_0000, 0x4000, 0x2_0000, 12, 0x80);
        h.complete(0x10_0000, 0x10_0040, 0xA000);
        assert_eq!(h.kernel_phys_base, 0x10_0000);
        assert_eq!(h.kernel_entry, 0x10_0040);
        assert_eq!(h.boot_info, 0xA000);
        assert_eq!(h.boot_drive, 0x80);
    }
}
