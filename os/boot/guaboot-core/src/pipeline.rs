//! # Boot Pipeline
//!
//! The firmware-independent part of booting, from reading the kernel to a
//! finished boot record:
//!
//! 1. read the kernel file ([`Firmware::read_kernel`])
//! 2. verify it ([`ElfImage::parse`])
//! 3. load its segments ([`load_image`])
//! 4. checksum the loaded range ([`checksum_image`])
//! 5. fetch the memory map, retrying once ([`fetch_memory_map`])
//! 6. leave firmware service mode, taking the final map if there is one
//!    ([`Firmware::exit_services`])
//! 7. build the boot record ([`BootInfoBuilder`])
//!
//! What follows (the mode transition under BIOS, a direct call under UEFI)
//! depends on the firmware and is left to the caller.

use crate::boot_info::{BootInfoBuilder, BootInfoError, BootParameters};
use crate::crc32::checksum_image;
use crate::elf::{ElfError, ElfImage, ElfTarget};
use crate::firmware::{Firmware, FirmwareError, fetch_memory_map};
use crate::loader::{LoadError, LoadedImage, load_image};
use crate::memory::{MemoryError, PhysicalMemory};
use crate::memory_map::FirmwareMap;
use core::fmt;
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_info::boot::{BootInfo, BootInfoPage};
use guaboot_info::handoff::StageHandoff;
use log::info;

/// The steps of [`prepare`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    ReadKernel,
    Verify,
    Load,
    Checksum,
    MemoryMap,
    ExitFirmware,
    BootInfo,
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadKernel => "reading the kernel image",
            Self::Verify => "verifying the kernel image",
            Self::Load => "loading kernel segments",
            Self::Checksum => "checksumming the kernel",
            Self::MemoryMap => "reading the memory map",
            Self::ExitFirmware => "exiting firmware services",
            Self::BootInfo => "building the boot record",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    ReadKernel(FirmwareError),
    #[error(transparent)]
    Verify(#[from] ElfError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Checksum(MemoryError),
    #[error(transparent)]
    MemoryMap(FirmwareError),
    #[error(transparent)]
    ExitFirmware(FirmwareError),
    #[error(transparent)]
    BootInfo(#[from] BootInfoError),
}

impl BootError {
    #[must_use]
    pub const fn step(&self) -> BootStep {
        match self {
            Self::ReadKernel(_) => BootStep::ReadKernel,
            Self::Verify(_) => BootStep::Verify,
            Self::Load(_) => BootStep::Load,
            Self::Checksum(_) => BootStep::Checksum,
            Self::MemoryMap(_) => BootStep::MemoryMap,
            Self::ExitFirmware(_) => BootStep::ExitFirmware,
            Self::BootInfo(_) => BootStep::BootInfo,
        }
    }
}

/// A kernel ready to be entered.
#[derive(Debug)]
pub struct PreparedBoot<'p> {
    pub image: LoadedImage,
    pub kernel_crc32: u32,
    pub boot_info: &'p BootInfo,
    /// Physical address of [`boot_info`](Self::boot_info).
    pub boot_info_addr: PhysicalAddress,
}

impl PreparedBoot<'_> {
    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        self.image.entry
    }

    /// Fill in the stage-2 slots of the inter-stage record.
    pub const fn record_in(&self, handoff: &mut StageHandoff) {
        handoff.complete(
            self.image.base.as_u64(),
            self.image.entry.as_u64(),
            self.boot_info_addr.as_u64(),
        );
    }
}

/// Run steps 1 to 7.
///
/// `storage` is filled in as the boot record and must be readable by the
/// kernel at `storage_addr`.
///
/// # Errors
/// The first failing step, wrapped in the matching [`BootError`] variant.
pub fn prepare<'p, F, M>(
    firmware: &mut F,
    memory: &mut M,
    target: ElfTarget,
    storage: &'p mut BootInfoPage,
    storage_addr: PhysicalAddress,
    params: &BootParameters<'_>,
) -> Result<PreparedBoot<'p>, BootError>
where
    F: Firmware + ?Sized,
    M: PhysicalMemory + ?Sized,
{
    let bytes = firmware.read_kernel().map_err(BootError::ReadKernel)?;
    if bytes.is_empty() {
        return Err(BootError::ReadKernel(FirmwareError::EmptyKernel));
    }
    info!("Kernel image is {} bytes", bytes.len());

    let elf = ElfImage::parse(bytes, target)?;
    info!(
        "Kernel verified: entry {}, {} program headers",
        elf.entry(),
        elf.program_header_count()
    );

    let image = load_image(&elf, memory)?;
    let kernel_crc32 = checksum_image(memory, &image).map_err(BootError::Checksum)?;
    info!("Kernel CRC32 {kernel_crc32:#010x}");

    let mut regions = FirmwareMap::new();
    fetch_memory_map(firmware, &mut regions).map_err(BootError::MemoryMap)?;
    info!("Firmware memory map holds {} regions", regions.len());

    firmware
        .exit_services(&mut regions)
        .map_err(BootError::ExitFirmware)?;

    let boot_info = BootInfoBuilder::new(storage, storage_addr)
        .with_image(&image, kernel_crc32)
        .with_memory(&regions)
        .finish(params)?;

    Ok(PreparedBoot {
        image,
        kernel_crc32,
        boot_info,
        boot_info_addr: storage_addr,
    })
}
