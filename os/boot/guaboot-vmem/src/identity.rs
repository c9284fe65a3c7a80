//! # Identity Map
//!
//! Three consecutive tables mapping physical `[0, 1 GiB)` onto itself with
//! 2 MiB pages:
//!
//! ```text
//! PML4[0] ──▶ PDPT[0] ──▶ PD[0..512] ──▶ 512 × 2 MiB leaves
//! ```
//!
//! All other PML4 and PDPT entries are left non-present. Every leaf is
//! present and writable; NX is never set.

use crate::page_table::ENTRIES;
use crate::page_table::pd::{L2Index, Pde2M, PageDirectory};
use crate::page_table::pdpt::{L3Index, PageDirectoryPointerTable, PdptEntry};
use crate::page_table::pml4::{L4Index, PageMapLevel4, Pml4Entry};
use guaboot_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size2M, Size4K, VirtualAddress};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentityMapError {
    #[error("page tables at {0} are not 4 KiB aligned")]
    Misaligned(PhysicalAddress),
    #[error("page tables at {0} do not fit in physical memory")]
    OutOfRange(PhysicalAddress),
}

/// The loader's identity map.
///
/// The three tables are laid out back to back, so the whole map occupies
/// exactly three pages starting at its own (physical) address.
#[repr(C, align(4096))]
pub struct IdentityMap {
    pml4: PageMapLevel4,
    pdpt: PageDirectoryPointerTable,
    pd: PageDirectory,
}

impl IdentityMap {
    /// Bytes mapped by [`IdentityMap::build`].
    pub const COVERAGE: u64 = ENTRIES as u64 * Size2M::SIZE;

    /// Size of the map in 4 KiB pages.
    pub const PAGES: u64 = 3;

    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            pml4: PageMapLevel4::zeroed(),
            pdpt: PageDirectoryPointerTable::zeroed(),
            pd: PageDirectory::zeroed(),
        }
    }

    /// (Re)build the map in place and return the root for CR3.
    ///
    /// `location` is the physical address of `self`; table links are derived
    /// from it. All entries are cleared first, so calling this again yields
    /// the same tables.
    ///
    /// # Errors
    /// Fails if `location` is not page aligned or the tables would wrap.
    pub fn build(
        &mut self,
        location: PhysicalAddress,
    ) -> Result<PhysicalPage<Size4K>, IdentityMapError> {
        if !location.is_aligned::<Size4K>() {
            return Err(IdentityMapError::Misaligned(location));
        }
        let pdpt_phys = location
            .checked_add(Size4K::SIZE)
            .ok_or(IdentityMapError::OutOfRange(location))?;
        let pd_phys = location
            .checked_add(2 * Size4K::SIZE)
            .ok_or(IdentityMapError::OutOfRange(location))?;

        self.pml4.clear();
        self.pdpt.clear();
        self.pd.clear();

        for i in 0..ENTRIES {
            #[allow(clippy::cast_possible_truncation)]
            let index = L2Index::new(i as u16);
            let page = PhysicalPage::<Size2M>::from_index(i as u64);
            self.pd.set(index, Pde2M::present_rw(page));
        }

        self.pdpt
            .set(L3Index::new(0), PdptEntry::present_rw(pd_phys.page()));
        self.pml4
            .set(L4Index::new(0), Pml4Entry::present_rw(pdpt_phys.page()));

        debug!(
            "Identity map built at {location}: PML4[0] -> {pdpt_phys}, PDPT[0] -> {pd_phys}, {} x 2 MiB",
            ENTRIES
        );

        Ok(location.page())
    }

    /// Resolve `va` through the tables, or `None` if it is not mapped.
    ///
    /// Walks this map's own tables; only [`IdentityMap::build`] writes links,
    /// so a present PML4/PDPT entry always refers to `self.pdpt` / `self.pd`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        // Non-canonical or above the 4-level range.
        if va.as_u64() >> 47 != 0 {
            return None;
        }
        if !self.pml4.get(L4Index::from(va)).present() {
            return None;
        }
        if !self.pdpt.get(L3Index::from(va)).present() {
            return None;
        }
        let leaf = self.pd.get(L2Index::from(va));
        if !leaf.present() || !leaf.page_size() {
            return None;
        }
        leaf.physical_page()
            .base()
            .checked_add(va.offset::<Size2M>())
    }

    #[must_use]
    pub const fn pml4_entry(&self, i: L4Index) -> Pml4Entry {
        self.pml4.get(i)
    }

    #[must_use]
    pub const fn pdpt_entry(&self, i: L3Index) -> PdptEntry {
        self.pdpt.get(i)
    }

    #[must_use]
    pub const fn pd_entry(&self, i: L2Index) -> Pde2M {
        self.pd.get(i)
    }
}

const _: () = {
    assert!(size_of::<IdentityMap>() as u64 == IdentityMap::PAGES * 4096);
    assert!(IdentityMap::COVERAGE == 1 << 30);
};
