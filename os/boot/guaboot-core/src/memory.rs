//! # Physical Memory Access
//!
//! The loader never dereferences a physical address directly. It goes
//! through a [`PhysicalMemory`] so the same load and checksum code runs
//! against raw RAM on the firmware paths and against a byte buffer in tests.

use core::ptr;
use guaboot_addresses::PhysicalAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("Physical range at {start} ({len} bytes) is not backed by this memory")]
    Unmapped { start: PhysicalAddress, len: u64 },
    #[error("Physical range at {start} ({len} bytes) could not be reserved")]
    ReservationFailed { start: PhysicalAddress, len: u64 },
}

/// Byte-level access to physical memory.
pub trait PhysicalMemory {
    /// Whether all of `[start, start + len)` is accessible.
    fn contains(&self, start: PhysicalAddress, len: u64) -> bool;

    /// Claim `[start, start + len)` before anything is written there.
    ///
    /// # Errors
    /// [`MemoryError::ReservationFailed`] if the range is owned by someone else.
    fn reserve(&mut self, start: PhysicalAddress, len: u64) -> Result<(), MemoryError> {
        let _ = (start, len);
        Ok(())
    }

    /// Give back a range claimed with [`reserve`](Self::reserve).
    ///
    /// Called with exactly the arguments of an earlier successful
    /// `reserve`, most recent first.
    fn release(&mut self, start: PhysicalAddress, len: u64) {
        let _ = (start, len);
    }

    /// Copy `bytes` to `start`.
    ///
    /// # Errors
    /// [`MemoryError::Unmapped`] if the target range is not accessible.
    fn write(&mut self, start: PhysicalAddress, bytes: &[u8]) -> Result<(), MemoryError>;

    /// Set `len` bytes at `start` to `value`.
    ///
    /// # Errors
    /// [`MemoryError::Unmapped`] if the target range is not accessible.
    fn fill(&mut self, start: PhysicalAddress, len: u64, value: u8) -> Result<(), MemoryError>;

    /// Borrow `len` bytes at `start`.
    ///
    /// # Errors
    /// [`MemoryError::Unmapped`] if the range is not accessible.
    fn read(&self, start: PhysicalAddress, len: u64) -> Result<&[u8], MemoryError>;
}

/// Identity-mapped RAM in `[start, end)`.
///
/// Valid wherever a pointer value equals the physical address: under UEFI
/// before and after `ExitBootServices`, and in stage 2 with paging off.
#[derive(Debug)]
pub struct IdentityMemory {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl IdentityMemory {
    /// # Safety
    /// All of `[start, end)` must be identity mapped RAM that nothing else
    /// uses while this value is alive, other than ranges the caller
    /// arranges to claim through [`PhysicalMemory::reserve`].
    #[must_use]
    pub const unsafe fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self { start, end }
    }

    fn pointer(&self, start: PhysicalAddress, len: u64) -> Result<(*mut u8, usize), MemoryError> {
        if !self.contains(start, len) {
            return Err(MemoryError::Unmapped { start, len });
        }
        let addr =
            usize::try_from(start.as_u64()).map_err(|_| MemoryError::Unmapped { start, len })?;
        let len = usize::try_from(len).map_err(|_| MemoryError::Unmapped { start, len })?;
        Ok((ptr::with_exposed_provenance_mut(addr), len))
    }
}

impl PhysicalMemory for IdentityMemory {
    fn contains(&self, start: PhysicalAddress, len: u64) -> bool {
        start >= self.start
            && start
                .checked_add(len)
                .is_some_and(|end| end <= self.end)
    }

    fn write(&mut self, start: PhysicalAddress, bytes: &[u8]) -> Result<(), MemoryError> {
        let (dst, len) = self.pointer(start, bytes.len() as u64)?;
        // SAFETY: the range lies in the identity-mapped window handed to `new`.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, len) };
        Ok(())
    }

    fn fill(&mut self, start: PhysicalAddress, len: u64, value: u8) -> Result<(), MemoryError> {
        let (dst, len) = self.pointer(start, len)?;
        // SAFETY: the range lies in the identity-mapped window handed to `new`.
        unsafe { ptr::write_bytes(dst, value, len) };
        Ok(())
    }

    fn read(&self, start: PhysicalAddress, len: u64) -> Result<&[u8], MemoryError> {
        let (src, len) = self.pointer(start, len)?;
        // SAFETY: the range lies in the identity-mapped window handed to `new`.
        Ok(unsafe { core::slice::from_raw_parts(src.cast_const(), len) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_window_bounds() {
        // SAFETY: only `contains` is exercised; nothing is dereferenced.
        let mem = unsafe {
            IdentityMemory::new(PhysicalAddress::new(0x10_0000), PhysicalAddress::new(0x20_0000))
        };
        assert!(mem.contains(PhysicalAddress::new(0x10_0000), 0x10_0000));
        assert!(mem.contains(PhysicalAddress::new(0x1F_FFFF), 1));
        assert!(!mem.contains(PhysicalAddress::new(0x1F_FFFF), 2));
        assert!(!mem.contains(PhysicalAddress::new(0xF_FFFF), 1));
        assert!(!mem.contains(PhysicalAddress::new(u64::MAX), 2));
    }

    #[test]
    fn out_of_window_access_is_refused() {
        // SAFETY: every access below is outside the window and never dereferenced.
        let mut mem = unsafe {
            IdentityMemory::new(PhysicalAddress::new(0x10_0000), PhysicalAddress::new(0x20_0000))
        };
        let start = PhysicalAddress::new(0x1000);
        assert_eq!(
            mem.write(start, &[1, 2, 3]),
            Err(MemoryError::Unmapped { start, len: 3 })
        );
        assert!(mem.fill(start, 8, 0).is_err());
        assert!(mem.read(start, 8).is_err());
    }
}
