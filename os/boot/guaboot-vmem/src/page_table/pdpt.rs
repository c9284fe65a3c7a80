//! # Page Directory Pointer Table (PDPT / L3)
//!
//! The identity map only uses the non-leaf form: each present entry points
//! at a page directory. Index bits `[38:30]`.

use crate::page_table::{ENTRIES, index_bits};
use bitfield_struct::bitfield;
use guaboot_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};

/// L3 entry pointing at a page directory (`PS = 0`).
#[doc(alias = "PDPTE")]
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PdptEntry {
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
    /// Bit 6 ignored.
    #[bits(1)]
    __d_ignored: u8,
    /// Page Size (bit 7): 0 here, a 1 GiB leaf otherwise.
    pub page_size: bool,
    /// Bits 8..11 ignored.
    #[bits(4)]
    __: u8,
    /// Page directory physical address >> 12 (bits 12..51).
    #[bits(40)]
    phys_addr_51_12: u64,
    /// OS-available (bits 52..62).
    #[bits(11)]
    pub os_available: u16,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl PdptEntry {
    /// Present, writable, supervisor entry pointing at `pd`.
    #[inline]
    #[must_use]
    pub const fn present_rw(pd: PhysicalPage<Size4K>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_phys_addr_51_12(pd.base().as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn next_table(self) -> PhysicalPage<Size4K> {
        PhysicalPage::from_addr(PhysicalAddress::new(self.phys_addr_51_12() << 12))
    }
}

/// Index into the PDPT (VA bits `[38:30]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct L3Index(u16);

impl L3Index {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(index_bits(va.as_u64(), 30))
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

/// The PDPT: 512 entries, 4 KiB-aligned.
#[doc(alias = "PDPT")]
#[repr(C, align(4096))]
pub struct PageDirectoryPointerTable {
    entries: [PdptEntry; ENTRIES],
}

impl PageDirectoryPointerTable {
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PdptEntry::new(); ENTRIES],
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(PdptEntry::new());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: L3Index) -> PdptEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: L3Index, e: PdptEntry) {
        self.entries[i.as_usize()] = e;
    }
}
