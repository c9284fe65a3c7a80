//! # Memory Map Translation
//!
//! Firmware reports memory in its own vocabulary: E820 entries under BIOS,
//! `EFI_MEMORY_DESCRIPTOR`s under UEFI. Both collapse into the two-kind
//! [`MemoryMapEntry`] of the boot record, in firmware order, plus usable
//! totals below and above 1 MiB.

use guaboot_addresses::{KIB, PhysicalAddress};
use guaboot_info::boot::{MAX_MEMORY_MAP_ENTRIES, MemoryKind, MemoryMapEntry};
use guaboot_info::memory::LOW_MEMORY_LIMIT;
use log::warn;

/// E820 type code for free RAM.
pub const E820_USABLE: u32 = 1;

/// `EfiConventionalMemory`.
pub const EFI_CONVENTIONAL_MEMORY: u32 = 7;

/// Size of a UEFI page; descriptor lengths are counted in these.
pub const EFI_PAGE_SIZE: u64 = 4096;

/// Upper bound on merged entries a [`FirmwareMap`] holds.
pub const MAX_FIRMWARE_REGIONS: usize = MAX_MEMORY_MAP_ENTRIES;

/// One entry as returned by `INT 15h, EAX=E820h` (ACPI 3.0 layout).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E820Entry {
    pub base: u64,
    pub length: u64,
    pub kind: u32,
    pub acpi_attributes: u32,
}

impl E820Entry {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: u32) -> Self {
        Self {
            base,
            length,
            kind,
            acpi_attributes: 0,
        }
    }
}

/// The `EFI_MEMORY_DESCRIPTOR` fields translation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfiDescriptor {
    pub ty: u32,
    pub physical_start: u64,
    pub page_count: u64,
}

/// A firmware memory map entry of either flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareRegion {
    E820(E820Entry),
    Efi(EfiDescriptor),
}

impl FirmwareRegion {
    #[must_use]
    pub const fn base(&self) -> u64 {
        match self {
            Self::E820(e) => e.base,
            Self::Efi(d) => d.physical_start,
        }
    }

    /// Length in bytes; saturates for nonsensical UEFI page counts.
    #[must_use]
    pub const fn length(&self) -> u64 {
        match self {
            Self::E820(e) => e.length,
            Self::Efi(d) => d.page_count.saturating_mul(EFI_PAGE_SIZE),
        }
    }

    /// Usable only if firmware reports exactly its "available" code.
    #[must_use]
    pub const fn kind(&self) -> MemoryKind {
        let usable = match self {
            Self::E820(e) => {
                let kind = e.kind;
                kind == E820_USABLE
            }
            Self::Efi(d) => d.ty == EFI_CONVENTIONAL_MEMORY,
        };
        if usable {
            MemoryKind::Usable
        } else {
            MemoryKind::Reserved
        }
    }

    #[must_use]
    pub const fn normalize(&self) -> MemoryMapEntry {
        MemoryMapEntry::new(self.base(), self.length(), self.kind())
    }

    /// Grow `self` by `next` if both translate to one contiguous entry.
    ///
    /// Regions only merge within the same flavour and kind, and never across
    /// [`LOW_MEMORY_LIMIT`], so the totals come out as if they were apart.
    fn absorb(&mut self, next: &Self) -> bool {
        let adjacent = self.base().checked_add(self.length()) == Some(next.base());
        let same_side = (PhysicalAddress::new(self.base()) < LOW_MEMORY_LIMIT)
            == (PhysicalAddress::new(next.base()) < LOW_MEMORY_LIMIT);
        if !adjacent || !same_side || self.kind() != next.kind() {
            return false;
        }

        match (self, next) {
            (Self::E820(a), Self::E820(b)) => {
                let (current, extra) = (a.length, b.length);
                match current.checked_add(extra) {
                    Some(length) => {
                        a.length = length;
                        true
                    }
                    None => false,
                }
            }
            (Self::Efi(a), Self::Efi(b)) => match a.page_count.checked_add(b.page_count) {
                Some(pages) => {
                    a.page_count = pages;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl From<E820Entry> for FirmwareRegion {
    fn from(value: E820Entry) -> Self {
        Self::E820(value)
    }
}

impl From<EfiDescriptor> for FirmwareRegion {
    fn from(value: EfiDescriptor) -> Self {
        Self::Efi(value)
    }
}

/// Usable bytes below and at/above [`LOW_MEMORY_LIMIT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct UsableBytes {
    lower: u64,
    upper: u64,
}

impl UsableBytes {
    /// An entry whose base lies below 1 MiB counts entirely as lower.
    fn add(&mut self, entry: &MemoryMapEntry) {
        if !entry.is_usable() {
            return;
        }
        if PhysicalAddress::new(entry.base) < LOW_MEMORY_LIMIT {
            self.lower = self.lower.saturating_add(entry.length);
        } else {
            self.upper = self.upper.saturating_add(entry.length);
        }
    }

    const fn totals(self) -> MemoryTotals {
        MemoryTotals {
            lower_kib: self.lower / KIB,
            upper_kib: self.upper / KIB,
        }
    }
}

/// The buffer firmware primitives fill in.
///
/// Pushing never fails. A region that continues the previous one with the
/// same kind is merged into it. Once [`MAX_FIRMWARE_REGIONS`] entries are
/// held, further regions are only counted toward the usable totals.
#[derive(Debug, Clone, Default)]
pub struct FirmwareMap {
    regions: heapless::Vec<FirmwareRegion, MAX_FIRMWARE_REGIONS>,
    spilled: usize,
    spilled_usable: UsableBytes,
}

impl FirmwareMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: heapless::Vec::new(),
            spilled: 0,
            spilled_usable: UsableBytes { lower: 0, upper: 0 },
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn push(&mut self, region: FirmwareRegion) {
        if self.spilled == 0 {
            if let Some(last) = self.regions.last_mut()
                && last.absorb(&region)
            {
                return;
            }
            if self.regions.push(region).is_ok() {
                return;
            }
        }
        self.spilled += 1;
        self.spilled_usable.add(&region.normalize());
    }

    /// The regions held, in firmware order.
    #[must_use]
    pub fn regions(&self) -> &[FirmwareRegion] {
        &self.regions
    }

    /// Number of regions held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Regions that did not fit and only count toward the totals.
    #[must_use]
    pub const fn spilled(&self) -> usize {
        self.spilled
    }

    /// Whether firmware reported nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.spilled == 0
    }
}

impl FromIterator<FirmwareRegion> for FirmwareMap {
    fn from_iter<I: IntoIterator<Item = FirmwareRegion>>(iter: I) -> Self {
        let mut map = Self::new();
        for region in iter {
            map.push(region);
        }
        map
    }
}

/// Usable memory below and at/above [`LOW_MEMORY_LIMIT`], in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryTotals {
    pub lower_kib: u64,
    pub upper_kib: u64,
}

impl MemoryTotals {
    /// Reported when firmware supplied no map: 640 KiB conventional memory
    /// and 31 MiB extended memory.
    pub const FALLBACK: Self = Self {
        lower_kib: 640,
        upper_kib: 31 * 1024,
    };
}

/// Normalize `map` into the front of `out` and total the usable bytes.
///
/// Returns the number of entries written and the totals. Regions that do
/// not fit in `out`, and those the map already spilled, still count toward
/// the totals. With no regions at all the totals are
/// [`MemoryTotals::FALLBACK`] and a warning is logged.
pub fn translate(map: &FirmwareMap, out: &mut [MemoryMapEntry]) -> (usize, MemoryTotals) {
    if map.is_empty() {
        warn!(
            "No firmware memory map; assuming {} KiB low and {} KiB high memory",
            MemoryTotals::FALLBACK.lower_kib,
            MemoryTotals::FALLBACK.upper_kib
        );
        return (0, MemoryTotals::FALLBACK);
    }

    let mut usable = map.spilled_usable;
    let mut written = 0;
    for region in map.regions() {
        let entry = region.normalize();
        usable.add(&entry);
        if let Some(slot) = out.get_mut(written) {
            *slot = entry;
            written += 1;
        }
    }

    let dropped = map.spilled() + (map.len() - written);
    if dropped > 0 {
        warn!("{dropped} memory regions did not fit in the boot record; counted in the totals only");
    }

    let totals = usable.totals();
    log::debug!(
        "Memory map: {written} entries, {} KiB low, {} KiB high",
        totals.lower_kib,
        totals.upper_kib
    );
    (written, totals)
}
