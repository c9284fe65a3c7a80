//! # ELF Segment Loader
//!
//! Copies the `PT_LOAD` segments of a verified [`ElfImage`] to their
//! physical load addresses and zero-fills the BSS tail of each.
//!
//! Loading is all-or-nothing: every segment is checked before the first
//! byte is written, so a rejected image leaves memory untouched.

use crate::elf::{ElfError, ElfImage, PFlags, ProgramHeader};
use crate::memory::{MemoryError, PhysicalMemory};
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_info::memory::LOW_MEMORY_LIMIT;
use log::{debug, info};

/// Upper bound on `PT_LOAD` entries the loader tracks.
pub const MAX_LOAD_SEGMENTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Elf(#[from] ElfError),
    #[error("Segment {index} targets {paddr}, below the 1 MiB boundary")]
    BelowLowMemory { index: usize, paddr: PhysicalAddress },
    #[error("Segment {index} has a file size larger than its memory size")]
    FileSizeExceedsMemorySize { index: usize },
    #[error("Segment {index} refers to bytes outside the image")]
    SourceOutOfBounds { index: usize },
    #[error("Segment {index} wraps around the physical address space")]
    AddressOverflow { index: usize },
    #[error("The image has more than {MAX_LOAD_SEGMENTS} loadable segments")]
    TooManySegments,
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// One segment as it was placed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedSegment {
    pub paddr: PhysicalAddress,
    pub vaddr: VirtualAddress,
    pub offset: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub flags: PFlags,
}

impl LoadedSegment {
    /// One past the last byte of the segment in memory.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.paddr.as_u64().saturating_add(self.memsz))
    }
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// `e_entry`, unmodified.
    pub entry: VirtualAddress,
    /// Lowest physical address written.
    pub base: PhysicalAddress,
    /// One past the highest physical address written.
    pub end: PhysicalAddress,
    pub segments: heapless::Vec<LoadedSegment, MAX_LOAD_SEGMENTS>,
}

impl LoadedImage {
    /// Bytes from [`base`](Self::base) to [`end`](Self::end), gaps included.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.end.as_u64() - self.base.as_u64()
    }
}

/// Load every `PT_LOAD` segment of `image` into `memory`.
///
/// Segments with a zero memory size are skipped once their address has been
/// checked. For each remaining one the
/// first `filesz` bytes come from the file and the rest up to `memsz` are
/// zeroed. Segments are written in program header order; overlapping
/// segments are not detected.
///
/// # Errors
/// Fails before writing anything if a segment targets memory below 1 MiB,
/// has `filesz > memsz`, reads past the image, wraps the address space,
/// is not backed by `memory` or cannot be reserved. Ranges already reserved
/// for earlier segments are released again in that last case.
pub fn load_image<M>(image: &ElfImage<'_>, memory: &mut M) -> Result<LoadedImage, LoadError>
where
    M: PhysicalMemory + ?Sized,
{
    let plan = plan_segments(image, memory)?;

    let Some(base) = plan.iter().map(|s| s.paddr).min() else {
        return Err(ElfError::NoLoadableSegments.into());
    };
    let end = plan
        .iter()
        .map(LoadedSegment::end)
        .max()
        .unwrap_or(base);

    for (reserved, seg) in plan.iter().enumerate() {
        if let Err(e) = memory.reserve(seg.paddr, seg.memsz) {
            for seg in plan[..reserved].iter().rev() {
                memory.release(seg.paddr, seg.memsz);
            }
            return Err(e.into());
        }
    }

    for (index, seg) in plan.iter().enumerate() {
        let src = image
            .file_range(seg.offset, seg.filesz)
            .ok_or(LoadError::SourceOutOfBounds { index })?;
        memory.write(seg.paddr, src)?;
        if seg.memsz > seg.filesz {
            memory.fill(seg.paddr + seg.filesz, seg.memsz - seg.filesz, 0)?;
        }
        debug!(
            "Loaded segment {} at {}: {} file bytes, {} zeroed",
            seg.flags.as_str(),
            seg.paddr,
            seg.filesz,
            seg.memsz - seg.filesz
        );
    }

    info!(
        "Kernel image occupies {base}..{end} ({} bytes, {} segments)",
        end.as_u64() - base.as_u64(),
        plan.len()
    );

    Ok(LoadedImage {
        entry: image.entry(),
        base,
        end,
        segments: plan,
    })
}

/// Validate every loadable segment and collect the ones to write.
fn plan_segments<M>(
    image: &ElfImage<'_>,
    memory: &M,
) -> Result<heapless::Vec<LoadedSegment, MAX_LOAD_SEGMENTS>, LoadError>
where
    M: PhysicalMemory + ?Sized,
{
    let mut plan = heapless::Vec::new();

    for (index, ph) in image.loadable_segments().enumerate() {
        // Empty segments are not exempt from the low-memory rule.
        let paddr = PhysicalAddress::new(ph.paddr);
        if paddr < LOW_MEMORY_LIMIT {
            return Err(LoadError::BelowLowMemory { index, paddr });
        }

        if ph.memsz == 0 {
            debug!("Skipping empty segment {index}");
            continue;
        }

        let seg = check_segment(image, memory, index, &ph)?;
        plan.push(seg).map_err(|_| LoadError::TooManySegments)?;
    }

    Ok(plan)
}

fn check_segment<M>(
    image: &ElfImage<'_>,
    memory: &M,
    index: usize,
    ph: &ProgramHeader,
) -> Result<LoadedSegment, LoadError>
where
    M: PhysicalMemory + ?Sized,
{
    let paddr = PhysicalAddress::new(ph.paddr);
    if ph.filesz > ph.memsz {
        return Err(LoadError::FileSizeExceedsMemorySize { index });
    }

    if image.file_range(ph.offset, ph.filesz).is_none() {
        return Err(LoadError::SourceOutOfBounds { index });
    }

    if paddr.checked_add(ph.memsz).is_none() {
        return Err(LoadError::AddressOverflow { index });
    }

    if !memory.contains(paddr, ph.memsz) {
        return Err(MemoryError::Unmapped {
            start: paddr,
            len: ph.memsz,
        }
        .into());
    }

    Ok(LoadedSegment {
        paddr,
        vaddr: VirtualAddress::new(ph.vaddr),
        offset: ph.offset,
        filesz: ph.filesz,
        memsz: ph.memsz,
        flags: ph.flags,
    })
}
