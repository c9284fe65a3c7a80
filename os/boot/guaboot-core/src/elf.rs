//! # ELF Images
//!
//! Verification of kernel images for one of two target profiles:
//!
//! * [`ElfTarget::X86_64`]: 64-bit little-endian `EM_X86_64` executables.
//!   This is the canonical profile both firmware paths use.
//! * [`ElfTarget::I386`]: 32-bit little-endian `EM_386` executables, kept
//!   as a legacy profile for kernels linked for protected mode.
//!
//! [`ElfImage::parse`] is the only way to obtain a view of an image; every
//! accessor on [`ElfImage`] relies on the bounds it established.

mod header;
mod image;

pub use header::{PFlags, ProgramHeader};
pub use image::{ElfError, ElfImage};

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

pub const ELFCLASS32: u8 = 1;
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u8 = 1;

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;

pub const EM_386: u16 = 3;
pub const EM_X86_64: u16 = 62;

pub const PT_LOAD: u32 = 1;

/// Word size of an ELF image (`e_ident[EI_CLASS]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    /// The `EI_CLASS` byte.
    #[must_use]
    pub const fn ident(self) -> u8 {
        match self {
            Self::Elf32 => ELFCLASS32,
            Self::Elf64 => ELFCLASS64,
        }
    }
}

/// The (word size, machine) pair an image has to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfTarget {
    pub class: ElfClass,
    pub machine: u16,
}

impl ElfTarget {
    /// 64-bit x86 kernels.
    pub const X86_64: Self = Self {
        class: ElfClass::Elf64,
        machine: EM_X86_64,
    };

    /// 32-bit x86 kernels (legacy profile).
    pub const I386: Self = Self {
        class: ElfClass::Elf32,
        machine: EM_386,
    };
}
