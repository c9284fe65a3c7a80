//! # Firmware Primitives
//!
//! The three services the shared pipeline needs from whatever started it.
//! Each firmware target provides one [`Firmware`] implementation; nothing
//! else in the core knows which firmware it runs on.

use crate::memory_map::FirmwareMap;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareError {
    #[error("The memory map buffer is too small; {required} bytes are required")]
    BufferTooSmall { required: usize },
    #[error("The kernel image was not found")]
    KernelNotFound,
    #[error("The kernel image is empty")]
    EmptyKernel,
    #[error("Reading from the boot device failed")]
    ReadFailed,
    #[error("Firmware could not allocate memory")]
    AllocationFailed,
    #[error("Firmware refused to exit boot services")]
    ExitRefused,
}

pub trait Firmware {
    /// The raw kernel file.
    ///
    /// # Errors
    /// [`FirmwareError::KernelNotFound`], [`FirmwareError::EmptyKernel`] or
    /// [`FirmwareError::ReadFailed`].
    fn read_kernel(&mut self) -> Result<&'static [u8], FirmwareError>;

    /// Replace the contents of `out` with the current firmware memory map.
    ///
    /// An empty map means firmware has none to offer.
    ///
    /// # Errors
    /// [`FirmwareError::BufferTooSmall`] if the map changed size between
    /// sizing and retrieval; any other error is permanent.
    fn read_memory_map(&mut self, out: &mut FirmwareMap) -> Result<(), FirmwareError>;

    /// Leave firmware service mode. After this only memory and CPU remain.
    ///
    /// Firmware that hands out a final memory map on exit replaces the
    /// contents of `map` with it; otherwise `map` is left as it is.
    ///
    /// # Errors
    /// [`FirmwareError::ExitRefused`].
    fn exit_services(&mut self, map: &mut FirmwareMap) -> Result<(), FirmwareError>;
}

/// [`Firmware::read_memory_map`], retried exactly once after
/// [`FirmwareError::BufferTooSmall`].
///
/// # Errors
/// The second failure, or the first one of any other kind.
pub fn fetch_memory_map<F>(firmware: &mut F, out: &mut FirmwareMap) -> Result<(), FirmwareError>
where
    F: Firmware + ?Sized,
{
    match firmware.read_memory_map(out) {
        Err(FirmwareError::BufferTooSmall { required }) => {
            warn!("Memory map grew to {required} bytes while being read; fetching it again");
            out.clear();
            firmware.read_memory_map(out)
        }
        result => result,
    }
}
