use guaboot_addresses::PhysicalAddress;
use guaboot_core::memory::{IdentityMemory, MemoryError, PhysicalMemory};
use log::warn;

/// RAM from 1 MiB up, minus the staged kernel file.
///
/// Stage 1 leaves the raw ELF at a fixed address inside the window the
/// loader writes to. Segments are reserved before anything is copied, so a
/// kernel whose segments would overwrite their own source is refused
/// without touching either.
#[derive(Debug)]
pub struct StagedMemory {
    ram: IdentityMemory,
    staged: PhysicalAddress,
    staged_len: u64,
}

impl StagedMemory {
    #[must_use]
    pub const fn new(ram: IdentityMemory, staged: PhysicalAddress, staged_len: u64) -> Self {
        Self {
            ram,
            staged,
            staged_len,
        }
    }

    fn overlaps_staged(&self, start: PhysicalAddress, len: u64) -> bool {
        let (a, b) = (start.as_u64(), start.as_u64().saturating_add(len));
        let (c, d) = (
            self.staged.as_u64(),
            self.staged.as_u64().saturating_add(self.staged_len),
        );
        a < d && c < b
    }
}

impl PhysicalMemory for StagedMemory {
    fn contains(&self, start: PhysicalAddress, len: u64) -> bool {
        self.ram.contains(start, len)
    }

    fn reserve(&mut self, start: PhysicalAddress, len: u64) -> Result<(), MemoryError> {
        if self.overlaps_staged(start, len) {
            warn!(
                "Segment at {start} ({len} bytes) overlaps the staged kernel file at {}",
                self.staged
            );
            return Err(MemoryError::ReservationFailed { start, len });
        }
        self.ram.reserve(start, len)
    }

    fn release(&mut self, start: PhysicalAddress, len: u64) {
        self.ram.release(start, len);
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
