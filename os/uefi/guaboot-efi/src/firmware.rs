//! # UEFI Boot Services as [`Firmware`]

use crate::file_system::load_file;
use crate::logger::UefiLogger;
use guaboot_core::firmware::{Firmware, FirmwareError};
use guaboot_core::memory_map::{EfiDescriptor, FirmwareMap, FirmwareRegion};
use log::info;
use uefi::boot::{self, MemoryType};
use uefi::mem::memory_map::MemoryMap;
use uefi::Status;

pub struct UefiFirmware {
    kernel_path: &'static str,
    logger: &'static UefiLogger,
}

impl UefiFirmware {
    #[must_use]
    pub const fn new(kernel_path: &'static str, logger: &'static UefiLogger) -> Self {
        Self {
            kernel_path,
            logger,
        }
    }
}

/// Refill `out` from a firmware memory map.
fn replace_with(out: &mut FirmwareMap, map: &impl MemoryMap) {
    out.clear();
    for desc in map.entries() {
        out.push(FirmwareRegion::from(EfiDescriptor {
            ty: desc.ty.0,
            physical_start: desc.phys_start,
            page_count: desc.page_count,
        }));
    }
}

impl Firmware for UefiFirmware {
    fn read_kernel(&mut self) -> Result<&'static [u8], FirmwareError> {
        info!("Loading {} ...", self.kernel_path);
        Ok(load_file(self.kernel_path)?)
    }

    fn read_memory_map(&mut self, out: &mut FirmwareMap) -> Result<(), FirmwareError> {
        let map = boot::memory_map(MemoryType::LOADER_DATA).map_err(|e| {
            if e.status() == Status::BUFFER_TOO_SMALL {
                // The firmware does not tell us by how much.
                FirmwareError::BufferTooSmall { required: 0 }
            } else {
                FirmwareError::ReadFailed
            }
        })?;

        replace_with(out, &map);
        Ok(())
    }

    fn exit_services(&mut self, map: &mut FirmwareMap) -> Result<(), FirmwareError> {
        info!("Exiting boot services ...");
        self.logger.exit_boot_services();

        // SAFETY: nothing after this point allocates or calls boot services.
        let final_map = unsafe { boot::exit_boot_services(None) };
        replace_with(map, &final_map);

        // Its buffer was allocated by a service that no longer exists.
        core::mem::forget(final_map);
        Ok(())
    }
}
