use bitfield_struct::bitfield;
use guaboot_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// CR3: page-table root (PCID disabled).
///
/// Holds the physical base of the top-level table. In PAE and 4-level paging
/// the base is 4 KiB-aligned; the loader's PML4 always is.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr3 {
    /// Bits 0–2: Reserved.
    #[bits(3)]
    _reserved0: u8,

    /// Bit 3: PWT: page-level write-through for the root table.
    pub pwt: bool,

    /// Bit 4: PCD: page-level cache disable for the root table.
    pub pcd: bool,

    /// Bits 5–11: Reserved.
    #[bits(7)]
    _reserved1: u8,

    /// Bits 12–51: root table physical base >> 12.
    #[bits(40)]
    pml4_base_4k: u64,

    /// Bits 52–63: Reserved.
    #[bits(12)]
    _reserved2: u16,
}

impl Cr3 {
    /// Point CR3 at `pml4` with write-back caching.
    #[must_use]
    pub const fn from_pml4(pml4: PhysicalPage<Size4K>) -> Self {
        Self::new().with_pml4_base_4k(pml4.base().as_u64() >> 12)
    }

    /// Physical address of the root table.
    #[must_use]
    pub const fn pml4_phys(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.pml4_base_4k() << 12)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "x86", target_arch = "x86_64")))]
control_register_asm!(Cr3, "cr3");
