//! Test doubles shared by the integration tests.

#![allow(dead_code, clippy::cast_possible_truncation)]

use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_core::firmware::{Firmware, FirmwareError};
use guaboot_core::machine::{FarPointer, KernelCall, Machine, StubArguments};
use guaboot_core::memory::{MemoryError, PhysicalMemory};
use guaboot_core::memory_map::{FirmwareMap, FirmwareRegion};
use guaboot_core::transition::gdt::{DescriptorTablePointer, SegmentSelector};
use guaboot_registers::cr0::Cr0;
use guaboot_registers::cr3::Cr3;
use guaboot_registers::cr4::Cr4;
use guaboot_registers::efer::Efer;
use std::collections::VecDeque;

pub const PT_LOAD: u32 = 1;

/// A segment for [`build_elf64`] / [`build_elf32`].
#[derive(Debug, Clone)]
pub struct Segment {
    pub p_type: u32,
    pub paddr: u64,
    pub memsz: u64,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn load(paddr: u64, data: Vec<u8>, memsz: u64) -> Self {
        Self {
            p_type: PT_LOAD,
            paddr,
            memsz,
            data,
        }
    }
}

/// An `ET_EXEC`, `EM_X86_64` image; segment data follows the headers in order.
pub fn build_elf64(entry: u64, segments: &[Segment]) -> Vec<u8> {
    let phoff = 64usize;
    let data_start = phoff + 56 * segments.len();

    let mut out = vec![0u8; data_start];
    out[..4].copy_from_slice(b"\x7FELF");
    out[4] = 2; // ELFCLASS64
    out[5] = 1; // little-endian
    out[6] = 1; // EV_CURRENT
    out[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    out[20..24].copy_from_slice(&1u32.to_le_bytes());
    out[24..32].copy_from_slice(&entry.to_le_bytes());
    out[32..40].copy_from_slice(&(phoff as u64).to_le_bytes());
    out[52..54].copy_from_slice(&64u16.to_le_bytes());
    out[54..56].copy_from_slice(&56u16.to_le_bytes());
    out[56..58].copy_from_slice(&(segments.len() as u16).to_le_bytes());

    let mut offset = data_start;
    for (i, seg) in segments.iter().enumerate() {
        let ph = phoff + i * 56;
        out[ph..ph + 4].copy_from_slice(&seg.p_type.to_le_bytes());
        out[ph + 4..ph + 8].copy_from_slice(&0b101u32.to_le_bytes());
        out[ph + 8..ph + 16].copy_from_slice(&(offset as u64).to_le_bytes());
        out[ph + 16..ph + 24].copy_from_slice(&seg.paddr.to_le_bytes());
        out[ph + 24..ph + 32].copy_from_slice(&seg.paddr.to_le_bytes());
        out[ph + 32..ph + 40].copy_from_slice(&(seg.data.len() as u64).to_le_bytes());
        out[ph + 40..ph + 48].copy_from_slice(&seg.memsz.to_le_bytes());
        out[ph + 48..ph + 56].copy_from_slice(&0x1000u64.to_le_bytes());
        offset += seg.data.len();
    }
    for seg in segments {
        out.extend_from_slice(&seg.data);
    }
    out
}

/// An `ET_EXEC`, `EM_386` image laid out like [`build_elf64`].
pub fn build_elf32(entry: u32, segments: &[Segment]) -> Vec<u8> {
    let phoff = 52usize;
    let data_start = phoff + 32 * segments.len();

    let mut out = vec![0u8; data_start];
    out[..4].copy_from_slice(b"\x7FELF");
    out[4] = 1; // ELFCLASS32
    out[5] = 1;
    out[6] = 1;
    out[16..18].copy_from_slice(&2u16.to_le_bytes());
    out[18..20].copy_from_slice(&3u16.to_le_bytes()); // EM_386
    out[20..24].copy_from_slice(&1u32.to_le_bytes());
    out[24..28].copy_from_slice(&entry.to_le_bytes());
    out[28..32].copy_from_slice(&(phoff as u32).to_le_bytes());
    out[40..42].copy_from_slice(&52u16.to_le_bytes());
    out[42..44].copy_from_slice(&32u16.to_le_bytes());
    out[44..46].copy_from_slice(&(segments.len() as u16).to_le_bytes());

    let mut offset = data_start;
    for (i, seg) in segments.iter().enumerate() {
        let ph = phoff + i * 32;
        out[ph..ph + 4].copy_from_slice(&seg.p_type.to_le_bytes());
        out[ph + 4..ph + 8].copy_from_slice(&(offset as u32).to_le_bytes());
        out[ph + 8..ph + 12].copy_from_slice(&(seg.paddr as u32).to_le_bytes());
        out[ph + 12..ph + 16].copy_from_slice(&(seg.paddr as u32).to_le_bytes());
        out[ph + 16..ph + 20].copy_from_slice(&(seg.data.len() as u32).to_le_bytes());
        out[ph + 20..ph + 24].copy_from_slice(&(seg.memsz as u32).to_le_bytes());
        out[ph + 24..ph + 28].copy_from_slice(&0b110u32.to_le_bytes());
        offset += seg.data.len();
    }
    for seg in segments {
        out.extend_from_slice(&seg.data);
    }
    out
}

/// `len` bytes of physical memory starting at `base`, filled with `0xA5`.
pub struct BufferMemory {
    pub base: u64,
    pub bytes: Vec<u8>,
    pub reservations: Vec<(u64, u64)>,
    pub writes: usize,
    /// Reservations starting here fail.
    pub refuse_reservation_at: Option<u64>,
    pub releases: Vec<(u64, u64)>,
}

pub const POISON: u8 = 0xA5;

impl BufferMemory {
    pub fn new(base: u64, len: usize) -> Self {
        Self {
            base,
            bytes: vec![POISON; len],
            reservations: Vec::new(),
            writes: 0,
            refuse_reservation_at: None,
            releases: Vec::new(),
        }
    }

    /// The bytes at physical `[start, start + len)`.
    pub fn at(&self, start: u64, len: usize) -> &[u8] {
        let offset = (start - self.base) as usize;
        &self.bytes[offset..offset + len]
    }

    pub fn untouched(&self) -> bool {
        self.writes == 0 && self.bytes.iter().all(|&b| b == POISON)
    }

    fn range(&self, start: PhysicalAddress, len: u64) -> Result<std::ops::Range<usize>, MemoryError> {
        if !self.contains(start, len) {
            return Err(MemoryError::Unmapped { start, len });
        }
        let offset = (start.as_u64() - self.base) as usize;
        Ok(offset..offset + len as usize)
    }
}

impl PhysicalMemory for BufferMemory {
    fn contains(&self, start: PhysicalAddress, len: u64) -> bool {
        let start = start.as_u64();
        start >= self.base
            && start
                .checked_add(len)
                .is_some_and(|end| end <= self.base + self.bytes.len() as u64)
    }

    fn reserve(&mut self, start: PhysicalAddress, len: u64) -> Result<(), MemoryError> {
        if self.refuse_reservation_at == Some(start.as_u64()) {
            return Err(MemoryError::ReservationFailed { start, len });
        }
        self.reservations.push((start.as_u64(), len));
        Ok(())
    }

    fn release(&mut self, start: PhysicalAddress, len: u64) {
        let range = (start.as_u64(), len);
        assert_eq!(self.reservations.pop(), Some(range), "released out of order");
        self.releases.push(range);
    }

    fn write(&mut self, start: PhysicalAddress, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(start, bytes.len() as u64)?;
        self.bytes[range].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }

    fn fill(&mut self, start: PhysicalAddress, len: u64, value: u8) -> Result<(), MemoryError> {
        let range = self.range(start, len)?;
        self.bytes[range].fill(value);
        self.writes += 1;
        Ok(())
    }

    fn read(&self, start: PhysicalAddress, len: u64) -> Result<&[u8], MemoryError> {
        let range = self.range(start, len)?;
        Ok(&self.bytes[range])
    }
}

/// What the fake CPU was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    DisableInterrupts,
    LoadGdt { base: u64, limit: u16 },
    LoadDataSegments(u16),
    WriteCr0(u64),
    WriteCr4(u64),
    WriteCr3(u64),
    WriteEfer(u64),
    FarJump(FarPointer, StubArguments),
    CallKernel { entry: u64, magic: u32, boot_info: u64 },
    Halt,
}

/// Payload of the panic that ends a fake `far_jump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jumped;

/// Payload of the panic that ends a fake `halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

/// Records every operation; register reads return the last value written.
#[derive(Debug, Default)]
pub struct FakeMachine {
    pub events: Vec<Event>,
    pub cr0: u64,
    pub cr4: u64,
    pub efer: u64,
}

impl FakeMachine {
    /// Register state as firmware leaves it in 32-bit protected mode.
    pub fn protected_mode() -> Self {
        Self {
            cr0: 0x11, // PE | ET
            ..Self::default()
        }
    }
}

impl Machine for FakeMachine {
    unsafe fn disable_interrupts(&mut self) {
        self.events.push(Event::DisableInterrupts);
    }

    unsafe fn load_gdt(&mut self, pointer: DescriptorTablePointer) {
        self.events.push(Event::LoadGdt {
            base: pointer.base,
            limit: pointer.limit,
        });
    }

    unsafe fn load_data_segments(&mut self, selector: SegmentSelector) {
        self.events.push(Event::LoadDataSegments(selector.bits()));
    }

    unsafe fn read_cr0(&mut self) -> Cr0 {
        Cr0::from_bits(self.cr0)
    }

    unsafe fn write_cr0(&mut self, value: Cr0) {
        self.cr0 = value.into_bits();
        self.events.push(Event::WriteCr0(self.cr0));
    }

    unsafe fn read_cr4(&mut self) -> Cr4 {
        Cr4::from_bits(self.cr4)
    }

    unsafe fn write_cr4(&mut self, value: Cr4) {
        self.cr4 = value.into_bits();
        self.events.push(Event::WriteCr4(self.cr4));
    }

    unsafe fn write_cr3(&mut self, value: Cr3) {
        self.events.push(Event::WriteCr3(value.into_bits()));
    }

    unsafe fn read_efer(&mut self) -> Efer {
        Efer::from_bits(self.efer)
    }

    unsafe fn write_efer(&mut self, value: Efer) {
        self.efer = value.into_bits();
        self.events.push(Event::WriteEfer(self.efer));
    }

    unsafe fn far_jump(&mut self, target: FarPointer, args: StubArguments) -> ! {
        self.events.push(Event::FarJump(target, args));
        std::panic::panic_any(Jumped)
    }

    fn halt(&mut self) -> ! {
        self.events.push(Event::Halt);
        std::panic::panic_any(Halted)
    }
}

impl KernelCall for FakeMachine {
    unsafe fn call_kernel(&mut self, entry: VirtualAddress, magic: u32, boot_info: PhysicalAddress) {
        self.events.push(Event::CallKernel {
            entry: entry.as_u64(),
            magic,
            boot_info: boot_info.as_u64(),
        });
    }
}

/// Run `f`, which must end in a fake `far_jump` or `halt`, and return the
/// panic payload.
pub fn run_terminal<F: FnOnce()>(f: F) -> Box<dyn std::any::Any + Send> {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    std::panic::set_hook(previous);
    match result {
        Ok(()) => panic!("terminal operation returned"),
        Err(payload) => payload,
    }
}

/// Scripted firmware.
pub struct FakeFirmware {
    pub kernel: Result<&'static [u8], FirmwareError>,
    pub map: Vec<FirmwareRegion>,
    /// Results handed out by successive `read_memory_map` calls before the
    /// map itself is returned.
    pub map_failures: VecDeque<FirmwareError>,
    pub map_calls: usize,
    pub exit_result: Result<(), FirmwareError>,
    pub exited: bool,
    /// Handed back on exit in place of the map read before.
    pub final_map: Option<Vec<FirmwareRegion>>,
}

impl FakeFirmware {
    pub fn new(kernel: Vec<u8>, map: Vec<FirmwareRegion>) -> Self {
        Self {
            kernel: Ok(Vec::leak(kernel)),
            map,
            map_failures: VecDeque::new(),
            map_calls: 0,
            exit_result: Ok(()),
            exited: false,
            final_map: None,
        }
    }
}

impl Firmware for FakeFirmware {
    fn read_kernel(&mut self) -> Result<&'static [u8], FirmwareError> {
        self.kernel
    }

    fn read_memory_map(&mut self, out: &mut FirmwareMap) -> Result<(), FirmwareError> {
        self.map_calls += 1;
        assert!(out.is_empty(), "memory map buffer must be empty on each attempt");
        if let Some(err) = self.map_failures.pop_front() {
            // Simulate a partially filled buffer.
            if let Some(first) = self.map.first() {
                out.push(*first);
            }
            return Err(err);
        }
        for region in &self.map {
            out.push(*region);
        }
        Ok(())
    }

    fn exit_services(&mut self, map: &mut FirmwareMap) -> Result<(), FirmwareError> {
        self.exited = true;
        self.exit_result?;
        if let Some(regions) = &self.final_map {
            *map = regions.iter().copied().collect();
        }
        Ok(())
    }
}
