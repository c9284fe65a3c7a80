//! # Raw ELF Headers

use crate::elf::ElfClass;
use core::mem::size_of;
use core::ptr::read_unaligned;

pub const EI_NIDENT: usize = 16;

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf32Ehdr {
    e_ident: [u8; EI_NIDENT],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf64Ehdr {
    e_ident: [u8; EI_NIDENT],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf32Phdr {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names, dead_code)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: u32,
    p_offset: u64,
    p_vaddr: u64,
    p_paddr: u64,
    p_filesz: u64,
    p_memsz: u64,
    p_align: u64,
}

/// The file-header fields the loader uses, widened to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub object_type: u16,
    pub machine: u16,
    pub entry: u64,
    pub phoff: u64,
    pub phentsize: u16,
    pub phnum: u16,
}

/// A program header, widened to 64 bits regardless of class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: PFlags,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl ElfClass {
    /// Size of the file header for this class.
    pub(crate) const fn header_size(self) -> usize {
        match self {
            Self::Elf32 => size_of::<Elf32Ehdr>(),
            Self::Elf64 => size_of::<Elf64Ehdr>(),
        }
    }

    /// Size of one program header for this class.
    pub(crate) const fn phdr_size(self) -> usize {
        match self {
            Self::Elf32 => size_of::<Elf32Phdr>(),
            Self::Elf64 => size_of::<Elf64Phdr>(),
        }
    }

    /// Decode the file header, or `None` if `bytes` is too short.
    pub(crate) fn read_header(self, bytes: &[u8]) -> Option<FileHeader> {
        if bytes.len() < self.header_size() {
            return None;
        }
        let header = match self {
            Self::Elf32 => {
                // SAFETY: length checked above; read_unaligned has no alignment requirement.
                let h = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf32Ehdr>()) };
                FileHeader {
                    object_type: h.e_type,
                    machine: h.e_machine,
                    entry: u64::from(h.e_entry),
                    phoff: u64::from(h.e_phoff),
                    phentsize: h.e_phentsize,
                    phnum: h.e_phnum,
                }
            }
            Self::Elf64 => {
                // SAFETY: length checked above; read_unaligned has no alignment requirement.
                let h = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf64Ehdr>()) };
                FileHeader {
                    object_type: h.e_type,
                    machine: h.e_machine,
                    entry: h.e_entry,
                    phoff: h.e_phoff,
                    phentsize: h.e_phentsize,
                    phnum: h.e_phnum,
                }
            }
        };
        Some(header)
    }

    /// Decode one program header, or `None` if `bytes` is too short.
    pub(crate) fn read_phdr(self, bytes: &[u8]) -> Option<ProgramHeader> {
        if bytes.len() < self.phdr_size() {
            return None;
        }
        let header = match self {
            Self::Elf32 => {
                // SAFETY: length checked above.
                let p = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf32Phdr>()) };
                ProgramHeader {
                    p_type: p.p_type,
                    flags: PFlags::from_bits(p.p_flags),
                    offset: u64::from(p.p_offset),
                    vaddr: u64::from(p.p_vaddr),
                    paddr: u64::from(p.p_paddr),
                    filesz: u64::from(p.p_filesz),
                    memsz: u64::from(p.p_memsz),
                    align: u64::from(p.p_align),
                }
            }
            Self::Elf64 => {
                // SAFETY: length checked above.
                let p = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf64Phdr>()) };
                ProgramHeader {
                    p_type: p.p_type,
                    flags: PFlags::from_bits(p.p_flags),
                    offset: p.p_offset,
                    vaddr: p.p_vaddr,
                    paddr: p.p_paddr,
                    filesz: p.p_filesz,
                    memsz: p.p_memsz,
                    align: p.p_align,
                }
            }
        };
        Some(header)
    }
}

/// Bitfield wrapper for `p_flags`.
///
/// Layout (LSB→MSB):
/// - bit 0: execute
/// - bit 1: write
/// - bit 2: read
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub read: bool,
    #[bits(29)]
    __: u32,
}

impl PFlags {
    /// `rwx`-style rendering for log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match (self.read(), self.write(), self.execute()) {
            (true, true, true) => "RWX",
            (true, true, false) => "RW-",
            (true, false, true) => "R-X",
            (true, false, false) => "R--",
            (false, true, true) => "-WX",
            (false, true, false) => "-W-",
            (false, false, true) => "--X",
            (false, false, false) => "---",
        }
    }
}

const _: () = {
    assert!(size_of::<Elf32Ehdr>() == 52);
    assert!(size_of::<Elf64Ehdr>() == 64);
    assert!(size_of::<Elf32Phdr>() == 32);
    assert!(size_of::<Elf64Phdr>() == 56);
};
