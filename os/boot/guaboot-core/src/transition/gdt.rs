//! # Transition GDT
//!
//! The descriptor table loaded right before long mode is entered:
//!
//! Index | Selector | Descriptor
//! ------|----------|------------------------------------------------------
//! 0     | 0x00     | Null
//! 1     | 0x08     | 64-bit code, DPL 0 ([`CODE64_SELECTOR`]): `L=1`, `DB=0`
//! 2     | 0x10     | Flat 4 GiB read/write data, DPL 0 ([`DATA_SELECTOR`])
//!
//! The data descriptor is used both by the remaining 32-bit code after the
//! segment reload and by the 64-bit stub, where base and limit are ignored.

use bitfield_struct::bitfield;
use core::mem::size_of;
use guaboot_addresses::PhysicalAddress;

/// Code/data segment descriptor.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16, // [15:0]
    pub base_lo: u16,  // [31:16]
    pub base_mid: u8,  // [39:32]
    #[bits(4)]
    pub typ: u8, // [43:40]
    pub s: bool,       // [44] code/data
    #[bits(2)]
    pub dpl: u8, // [46:45]
    pub p: bool,       // [47]
    #[bits(4)]
    pub limit_hi: u8, // [51:48]
    pub avl: bool,     // [52]
    pub l: bool,       // [53] 64-bit code
    pub db: bool,      // [54] 32-bit default size; must be 0 with L=1
    pub g: bool,       // [55] 4 KiB limit granularity
    pub base_hi: u8,   // [63:56]
}

impl SegmentDescriptor {
    pub const NULL: Self = Self::new();

    /// Execute/read 64-bit code segment.
    #[must_use]
    pub const fn code64() -> Self {
        Self::new()
            .with_limit_lo(0xFFFF)
            .with_typ(0b1010)
            .with_s(true)
            .with_p(true)
            .with_limit_hi(0xF)
            .with_l(true)
            .with_db(false)
            .with_g(true)
    }

    /// Read/write data segment covering 4 GiB from base 0.
    #[must_use]
    pub const fn flat_data() -> Self {
        Self::new()
            .with_limit_lo(0xFFFF)
            .with_typ(0b0010)
            .with_s(true)
            .with_p(true)
            .with_limit_hi(0xF)
            .with_db(true)
            .with_g(true)
    }
}

/// A GDT selector: index, table indicator (always GDT here) and RPL.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSelector(u16);

impl SegmentSelector {
    #[must_use]
    pub const fn new(index: u16, rpl: u8) -> Self {
        Self((index << 3) | (rpl as u16 & 0b11))
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }
}

pub const CODE64_SELECTOR: SegmentSelector = SegmentSelector::new(1, 0);
pub const DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, 0);

/// Operand of `lgdt`.
///
/// In protected mode the CPU reads `limit` and the low 32 bits of `base`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTablePointer {
    /// Size of the table minus one.
    pub limit: u16,
    pub base: u64,
}

#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gdt {
    entries: [SegmentDescriptor; 3],
}

impl Gdt {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [
                SegmentDescriptor::NULL,
                SegmentDescriptor::code64(),
                SegmentDescriptor::flat_data(),
            ],
        }
    }

    #[must_use]
    pub const fn entry(&self, selector: SegmentSelector) -> Option<SegmentDescriptor> {
        let index = selector.index() as usize;
        if index < self.entries.len() {
            Some(self.entries[index])
        } else {
            None
        }
    }

    /// The `lgdt` operand for this table at its current address.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: PhysicalAddress::from_ptr(&raw const *self).as_u64(),
        }
    }
}

impl Default for Gdt {
    fn default() -> Self {
        Self::new()
    }
}

/// The table every transition loads.
pub static TRANSITION_GDT: Gdt = Gdt::new();

const _: () = {
    assert!(size_of::<SegmentDescriptor>() == 8);
    assert!(size_of::<Gdt>() == 24);
    assert!(size_of::<DescriptorTablePointer>() == 10);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code64_encoding() {
        // Canonical flat 64-bit code descriptor.
        assert_eq!(SegmentDescriptor::code64().into_bits(), 0x00AF_9A00_0000_FFFF);
    }

    #[test]
    fn flat_data_encoding() {
        assert_eq!(
            SegmentDescriptor::flat_data().into_bits(),
            0x00CF_9200_0000_FFFF
        );
    }

    #[test]
    fn selectors() {
        assert_eq!(CODE64_SELECTOR.bits(), 0x08);
        assert_eq!(DATA_SELECTOR.bits(), 0x10);
        assert_eq!(SegmentSelector::new(2, 3).bits(), 0x13);
    }

    #[test]
    fn table_layout() {
        let gdt = Gdt::new();
        assert_eq!(gdt.entry(SegmentSelector::new(0, 0)), Some(SegmentDescriptor::NULL));
        let code = gdt.entry(CODE64_SELECTOR).unwrap();
        assert!(code.l() && !code.db() && code.p());
        let data = gdt.entry(DATA_SELECTOR).unwrap();
        assert!(!data.l() && data.db() && data.g());
        assert_eq!(gdt.entry(SegmentSelector::new(3, 0)), None);
    }

    #[test]
    fn pointer_covers_table() {
        let ptr = TRANSITION_GDT.pointer();
        let limit = ptr.limit;
        let base = ptr.base;
        assert_eq!(usize::from(limit), size_of::<Gdt>() - 1);
        assert_eq!(base, PhysicalAddress::from_ptr(&raw const TRANSITION_GDT).as_u64());
    }
}
