//! # Physical Memory under Boot Services
//!
//! Firmware identity maps all of RAM, so the loader writes physical
//! addresses directly, but only after claiming them with
//! `AllocatePages(AllocateAddress)`. Anything the firmware already uses
//! fails the claim and the load stops before a byte is copied.

use alloc::vec::Vec;
use core::ptr::{self, NonNull};
use guaboot_addresses::{PageSize, PhysicalAddress, Size4K};
use guaboot_core::boot_info::ModuleSpec;
use guaboot_core::memory::{IdentityMemory, MemoryError, PhysicalMemory};
use guaboot_info::boot::{BootInfoPage, MAX_MODULES};
use guaboot_info::memory::LOW_MEMORY_LIMIT;
use log::{debug, info, warn};
use uefi::boot::{self, AllocateType, MemoryType};

use crate::file_system::{FileError, load_file};

/// RAM from 1 MiB up, claimed page-wise from the firmware.
pub struct UefiMemory {
    ram: IdentityMemory,
    /// Page-aligned `[start, end)` ranges already allocated.
    claimed: Vec<(u64, u64)>,
}

impl UefiMemory {
    #[must_use]
    pub fn new() -> Self {
        // SAFETY: firmware identity maps all memory, and `reserve` makes sure
        // nothing else owns a range before it is written.
        let ram = unsafe { IdentityMemory::new(LOW_MEMORY_LIMIT, PhysicalAddress::new(u64::MAX)) };
        Self {
            ram,
            claimed: Vec::new(),
        }
    }
}

/// The part of the page range `[first, end)` not yet claimed.
///
/// Adjacent segments may share a page; the shared page is only allocated
/// once.
fn unclaimed(mut first: u64, mut end: u64, claimed: &[(u64, u64)]) -> (u64, u64) {
    for &(a, b) in claimed {
        if a <= first && first < b {
            first = b;
        }
        if a < end && end <= b {
            end = a;
        }
    }
    (first, end.max(first))
}

impl PhysicalMemory for UefiMemory {
    fn contains(&self, start: PhysicalAddress, len: u64) -> bool {
        self.ram.contains(start, len)
    }

    fn reserve(&mut self, start: PhysicalAddress, len: u64) -> Result<(), MemoryError> {
        let failed = MemoryError::ReservationFailed { start, len };
        let end = start
            .checked_add(len)
            .and_then(PhysicalAddress::align_up::<Size4K>)
            .ok_or(failed)?;
        let (first, end) = unclaimed(
            start.align_down::<Size4K>().as_u64(),
            end.as_u64(),
            &self.claimed,
        );
        if first == end {
            return Ok(());
        }

        let pages = usize::try_from((end - first) / Size4K::SIZE).map_err(|_| failed)?;
        boot::allocate_pages(AllocateType::Address(first), MemoryType::LOADER_DATA, pages)
            .map_err(|e| {
                warn!(
                    "AllocatePages at {first:#x} ({pages} pages) failed: {:?}",
                    e.status()
                );
                failed
            })?;
        debug!("Claimed {pages} pages at {first:#x}");
        self.claimed.push((first, end));
        Ok(())
    }

    // Pointers are 64 bits wide on every UEFI target this runs on.
    #[allow(clippy::cast_possible_truncation)]
    fn release(&mut self, start: PhysicalAddress, len: u64) {
        let first = start.align_down::<Size4K>().as_u64();
        let end = start
            .checked_add(len)
            .and_then(PhysicalAddress::align_up::<Size4K>)
            .map_or(u64::MAX, PhysicalAddress::as_u64);

        // Only claims made for this range lie entirely inside it; a page
        // shared with an earlier range stays with that one.
        let (freed, kept) = self
            .claimed
            .drain(..)
            .partition::<Vec<_>, _>(|&(a, b)| first <= a && b <= end);
        self.claimed = kept;

        for (a, b) in freed {
            let Some(ptr) = NonNull::new(ptr::with_exposed_provenance_mut::<u8>(a as usize)) else {
                continue;
            };
            let pages = ((b - a) / Size4K::SIZE) as usize;
            // SAFETY: `[a, b)` was allocated by `reserve` and nothing has
            // been written there yet.
            if let Err(e) = unsafe { boot::free_pages(ptr, pages) } {
                warn!("FreePages at {a:#x} ({pages} pages) failed: {:?}", e.status());
            } else {
                debug!("Released {pages} pages at {a:#x}");
            }
        }
    }

    fn write(&mut self, start: PhysicalAddress, bytes: &[u8]) -> Result<(), MemoryError> {
        self.ram.write(start, bytes)
    }

    fn fill(&mut self, start: PhysicalAddress, len: u64, value: u8) -> Result<(), MemoryError> {
        self.ram.fill(start, len, value)
    }

    fn read(&self, start: PhysicalAddress, len: u64) -> Result<&[u8], MemoryError> {
        self.ram.read(start, len)
    }
}

/// Pages for the boot record, cleared and ready for the builder.
///
/// # Errors
/// The firmware's allocation error.
pub fn allocate_boot_info_page() -> uefi::Result<(&'static mut BootInfoPage, PhysicalAddress)> {
    let pages = boot::allocate_pages(
        AllocateType::AnyPages,
        MemoryType::LOADER_DATA,
        BootInfoPage::PAGES,
    )?;
    let page: NonNull<BootInfoPage> = pages.cast();
    let location = PhysicalAddress::from_ptr(page.as_ptr());

    // SAFETY: freshly allocated, page aligned and large enough; written
    // before the reference is formed.
    let page = unsafe {
        page.write(BootInfoPage::zeroed());
        &mut *page.as_ptr()
    };
    Ok((page, location))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("Module {path}: {source}")]
    File {
        path: &'static str,
        #[source]
        source: FileError,
    },
    #[error("More than {MAX_MODULES} modules configured")]
    TooMany,
}

impl From<ModuleError> for uefi::Status {
    fn from(value: ModuleError) -> Self {
        match value {
            ModuleError::File { source, .. } => source.into(),
            ModuleError::TooMany => Self::BUFFER_TOO_SMALL,
        }
    }
}

/// Read every configured module into loader memory.
///
/// Each module is named by its path in the boot record.
///
/// # Errors
/// The first module that cannot be read.
pub fn load_modules(
    paths: &[&'static str],
) -> Result<heapless::Vec<ModuleSpec<'static>, MAX_MODULES>, ModuleError> {
    let mut modules = heapless::Vec::new();
    for &path in paths {
        let bytes = load_file(path).map_err(|source| ModuleError::File { path, source })?;
        let range = bytes.as_ptr_range();
        let start = PhysicalAddress::from_ptr(range.start);
        let end = PhysicalAddress::from_ptr(range.end);
        info!("Module {path} at {start}..{end}");
        modules
            .push(ModuleSpec {
                start,
                end,
                name: path,
            })
            .map_err(|_| ModuleError::TooMany)?;
    }
    Ok(modules)
}
