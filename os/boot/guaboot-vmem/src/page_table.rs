//! # x86-64 Paging Structures
//!
//! Only the three levels the identity map needs: [`pml4`] (L4), [`pdpt`]
//! (L3) and [`pd`] (L2, 2 MiB leaves). Every table is 4 KiB-aligned and
//! holds 512 eight-byte entries.

pub mod pd;
pub mod pdpt;
pub mod pml4;

/// Entries per table at every level.
pub const ENTRIES: usize = 512;

/// Extract the 9-bit table index for the level whose entries cover `1 << shift` bytes.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn index_bits(va: u64, shift: u32) -> u16 {
    ((va >> shift) & 0x1FF) as u16
}
