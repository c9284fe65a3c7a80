//! # Page Map Level 4 (PML4 / L4)
//!
//! A PML4E never maps memory; it points at a PDPT. Index bits `[47:39]`.

use crate::page_table::{ENTRIES, index_bits};
use bitfield_struct::bitfield;
use guaboot_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// L4 entry, pointer to a PDPT (`PS` must be 0).
#[doc(alias = "PML4E")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Pml4Entry {
    /// Present (bit 0).
    pub present: bool,
    /// Writable (bit 1).
    pub writable: bool,
    /// User (bit 2).
    pub user: bool,
    /// Write-Through (bit 3).
    pub write_through: bool,
    /// Cache Disable (bit 4).
    pub cache_disable: bool,
    /// Accessed (bit 5).
    pub accessed: bool,
    /// Bit 6 ignored, bit 7 (PS) must be 0, bits 8..11 ignored.
    #[bits(6)]
    __: u8,
    /// Next-level table physical address >> 12 (bits 12..51).
    #[bits(40)]
    phys_addr_51_12: u64,
    /// OS-available (bits 52..62).
    #[bits(11)]
    pub os_available: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl Pml4Entry {
    /// Present, writable, supervisor entry pointing at `pdpt`.
    #[inline]
    #[must_use]
    pub const fn present_rw(pdpt: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_phys_addr_51_12(pdpt.base().as_u64() >> 12)
    }

    /// Physical address of the referenced PDPT.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }
}

/// Index into the PML4 (VA bits `[47:39]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct L4Index(u16);

impl L4Index {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(index_bits(va.as_u64(), 39))
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 512);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// The PML4: 512 entries, 4 KiB-aligned.
#[doc(alias = "PML4")]
#[repr(C, align(4096))]
pub struct PageMapLevel4 {
    entries: [Pml4Entry; ENTRIES],
}

impl PageMapLevel4 {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [Pml4Entry::new(); ENTRIES],
        }
    }

    /// Clear every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(Pml4Entry::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: L4Index) -> Pml4Entry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: L4Index, e: Pml4Entry) {
        self.entries[i.as_usize()] = e;
    }
}
