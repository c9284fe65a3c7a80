//! # Loader Page Tables
//!
//! Typed 4-level paging structures and the one address space the loader
//! ever builds: an [`IdentityMap`] of the first gigabyte using 2 MiB pages.
//! The kernel is expected to replace it with its own tables after handoff.
//!
//! ```rust
//! # use guaboot_vmem::IdentityMap;
//! # use guaboot_addresses::{PhysicalAddress, VirtualAddress};
//! let mut map = Box::new(IdentityMap::zeroed());
//! let root = map.build(PhysicalAddress::new(0x1_0000)).unwrap();
//! assert_eq!(root.base().as_u64(), 0x1_0000);
//! assert_eq!(
//!     map.translate(VirtualAddress::new(0x12_3456)),
//!     Some(PhysicalAddress::new(0x12_3456))
//! );
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod identity;
pub mod page_table;

pub use identity::{IdentityMap, IdentityMapError};
