use core::{ptr, slice};
use guaboot_core::firmware::{Firmware, FirmwareError};
use guaboot_core::memory_map::{E820Entry, FirmwareMap, FirmwareRegion};
use guaboot_info::handoff::StageHandoff;
use guaboot_info::memory::KERNEL_IMAGE_MAX;
use log::debug;

/// What stage 1 collected, presented as [`Firmware`].
#[derive(Debug)]
pub struct BiosFirmware {
    kernel: Result<&'static [u8], FirmwareError>,
    e820: &'static [E820Entry],
}

impl BiosFirmware {
    #[must_use]
    pub const fn new(
        kernel: Result<&'static [u8], FirmwareError>,
        e820: &'static [E820Entry],
    ) -> Self {
        Self { kernel, e820 }
    }

    /// Borrow the kernel file and E820 buffer stage 1 describes.
    ///
    /// A zero image base means stage 1 never found the kernel; a length
    /// above [`KERNEL_IMAGE_MAX`] means it overran its buffer.
    ///
    /// # Safety
    /// Both ranges named by `handoff` must be readable and unchanged for the
    /// rest of the boot.
    #[must_use]
    pub unsafe fn from_handoff(handoff: &StageHandoff) -> Self {
        let kernel = match (handoff.kernel_image_base, handoff.kernel_image_len) {
            (0, _) => Err(FirmwareError::KernelNotFound),
            (_, len) if len > KERNEL_IMAGE_MAX => Err(FirmwareError::ReadFailed),
            // SAFETY: forwarded from the caller.
            (base, len) => unsafe { borrow::<u8>(base, len) }.ok_or(FirmwareError::ReadFailed),
        };

        let e820 = if handoff.e820_base == 0 {
            &[][..]
        } else {
            // SAFETY: forwarded from the caller.
            unsafe { borrow::<E820Entry>(handoff.e820_base, u64::from(handoff.e820_count)) }
                .unwrap_or(&[])
        };

        debug!(
            "Stage 1 handoff: kernel file at {:#x} ({} bytes), {} E820 entries, drive {:#04x}",
            handoff.kernel_image_base,
            handoff.kernel_image_len,
            e820.len(),
            handoff.boot_drive
        );

        Self { kernel, e820 }
    }
}

/// `count` values of `T` at physical address `base`.
unsafe fn borrow<T>(base: u64, count: u64) -> Option<&'static [T]> {
    let addr = usize::try_from(base).ok()?;
    let count = usize::try_from(count).ok()?;
    let data = ptr::with_exposed_provenance::<T>(addr);
    // SAFETY: the caller guarantees the range is readable for 'static.
    Some(unsafe { slice::from_raw_parts(data, count) })
}

impl Firmware for BiosFirmware {
    fn read_kernel(&mut self) -> Result<&'static [u8], FirmwareError> {
        self.kernel
    }

    fn read_memory_map(&mut self, out: &mut FirmwareMap) -> Result<(), FirmwareError> {
        out.clear();
        for entry in self.e820 {
            out.push(FirmwareRegion::from(*entry));
        }
        Ok(())
    }

    /// BIOS services were left behind with real mode; the E820 map stays.
    fn exit_services(&mut self, _map: &mut FirmwareMap) -> Result<(), FirmwareError> {
        Ok(())
    }
}
