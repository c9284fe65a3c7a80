//! # Physical and Virtual Address Types
//!
//! Thin, zero-cost wrappers that keep physical and virtual addresses apart
//! in the loader. Before paging is enabled (and throughout the identity map
//! the loader builds) both spaces coincide numerically, which is precisely
//! why mixing them up is easy and why they get separate types here.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM, MMIO, firmware tables). |
//! | [`VirtualAddress`] | A byte address as seen through the page tables. |
//! | [`PhysicalPage<S>`] | The page-aligned base of a physical page of size `S`. |
//!
//! Page sizes are marker types implementing [`PageSize`]: [`Size4K`],
//! [`Size2M`] and [`Size1G`].
//!
//! ```rust
//! # use guaboot_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2345);
//! assert_eq!(pa.page::<Size4K>().base().as_u64(), 0x0010_2000);
//! assert_eq!(pa.offset::<Size4K>(), 0x345);
//! assert_eq!(pa.align_up::<Size2M>(), Some(PhysicalAddress::new(0x0020_0000)));
//! ```
//!
//! All arithmetic that can leave the 64-bit range is exposed as `checked_*`
//! so that callers working on untrusted image headers never wrap silently.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod virtual_address;

pub use page_size::{PageSize, Size1G, Size2M, Size4K};
pub use physical_address::{PhysicalAddress, PhysicalPage};
pub use virtual_address::VirtualAddress;

/// One kibibyte.
pub const KIB: u64 = 1024;

/// One mebibyte.
pub const MIB: u64 = 1024 * KIB;

/// One gibibyte.
pub const GIB: u64 = 1024 * MIB;
