//! # Page Directory (PD / L2)
//!
//! The identity map fills the page directory with 2 MiB leaves
//! ([`Pde2M`], `PS = 1`). Index bits `[29:21]`.

use crate::page_table::{ENTRIES, index_bits};
use bitfield_struct::bitfield;
use guaboot_addresses::{PhysicalAddress, PhysicalPage, Size2M, VirtualAddress};

/// L2 **PDE (2 MiB leaf)**: maps a single 2 MiB page (`PS = 1`).
///
/// - **PAT** selector lives at bit **12** in this form.
/// - Physical address uses bits **51:21** and must be **2 MiB aligned**.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Pde2M {
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
    /// Dirty (bit 6).
    pub dirty: bool,
    /// Page Size (bit 7): **must be 1** for a 2 MiB leaf.
    #[bits(default = true)]
    pub page_size: bool,
    /// Global (bit 8).
    pub global: bool,
    /// OS-available low (bits 9..11).
    #[bits(3)]
    pub os_available_low: u8,
    /// PAT selector (bit 12).
    pub pat_large: bool,
    /// Reserved (bits 13..20): must be 0.
    #[bits(8)]
    __res13_20: u8,
    /// Physical address bits **51:21**.
    #[bits(31)]
    phys_addr_51_21: u32,
    /// OS-available high (bits 52..58).
    #[bits(7)]
    pub os_available_high: u8,
    /// Protection Key (59..62).
    #[bits(4)]
    pub protection_key: u8,
    /// No-Execute (bit 63).
    pub no_execute: bool,
}

impl Pde2M {
    /// Present, writable, executable supervisor leaf for `page`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn present_rw(page: PhysicalPage<Size2M>) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_page_size(true)
            .with_no_execute(false)
            .with_phys_addr_51_21((page.base().as_u64() >> 21) as u32)
    }

    /// The mapped 2 MiB page.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage<Size2M> {
        PhysicalPage::from_addr(PhysicalAddress::new((self.phys_addr_51_21() as u64) << 21))
    }
}

/// Index into the page directory (VA bits `[29:21]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct L2Index(u16);

impl L2Index {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(index_bits(va.as_u64(), 21))
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

/// The page directory: 512 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [Pde2M; ENTRIES],
}

impl PageDirectory {
    /// A directory with every entry non-present.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [Pde2M::from_bits(0); ENTRIES],
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.fill(Pde2M::from_bits(0));
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: L2Index) -> Pde2M {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: L2Index, e: Pde2M) {
        self.entries[i.as_usize()] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn leaf_sets_ps_and_base() {
        let page = PhysicalPage::<Size2M>::from_index(2);
        let e = Pde2M::present_rw(page);
        assert!(e.present());
        assert!(e.writable());
        assert!(!e.no_execute());
        assert_ne!(e.into_bits() & (1 << 7), 0, "must be PS=1");
        assert_eq!(e.physical_page().base().as_u64(), 0x40_0000);
        assert_eq!(e.into_bits(), 0x40_0000 | 0x83);
    }

    #[test]
    fn zeroed_directory_is_not_present() {
        let pd = PageDirectory::zeroed();
        assert_eq!(pd.get(L2Index::new(0)).into_bits(), 0);
    }
}
