//! # ELF Verification

use crate::elf::header::{EI_NIDENT, FileHeader};
use crate::elf::{
    ELF_MAGIC, ELFDATA2LSB, ET_EXEC, EV_CURRENT, ElfTarget, PT_LOAD, ProgramHeader,
};
use guaboot_addresses::VirtualAddress;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ElfError {
    #[error("The image is {available} bytes long but at least {needed} are required")]
    TooShort { needed: usize, available: usize },
    #[error("The image does not start with the ELF magic")]
    BadMagic,
    #[error("ELF class {found} does not match the expected class {expected}")]
    WrongClass { expected: u8, found: u8 },
    #[error("ELF data encoding {0} is not little-endian")]
    NotLittleEndian(u8),
    #[error("ELF identification version {0} is not supported")]
    BadVersion(u8),
    #[error("ELF object type {0} is not an executable")]
    NotExecutable(u16),
    #[error("ELF machine {found} does not match the expected machine {expected}")]
    WrongMachine { expected: u16, found: u16 },
    #[error("Program header entries are {found} bytes, expected {expected}")]
    BadProgramHeaderSize { expected: usize, found: u16 },
    #[error("The program header table extends past the end of the image")]
    ProgramHeadersOutOfBounds,
    #[error("The image has no loadable segments")]
    NoLoadableSegments,
}

/// A verified ELF executable borrowed from a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ElfImage<'a> {
    bytes: &'a [u8],
    target: ElfTarget,
    header: FileHeader,
    /// Byte offset of the program header table; in bounds.
    phoff: usize,
}

impl<'a> ElfImage<'a> {
    /// Verify `bytes` against `target` and return a view of it.
    ///
    /// Checks, in order: identification length, magic, class, data encoding,
    /// identification version, header length, object type (`ET_EXEC`),
    /// machine, program header entry size, program header table bounds and
    /// finally the presence of at least one `PT_LOAD` entry. The first failing
    /// check is reported.
    ///
    /// # Errors
    /// One [`ElfError`] per failed check; nothing is loaded on failure.
    pub fn parse(bytes: &'a [u8], target: ElfTarget) -> Result<Self, ElfError> {
        if bytes.len() < EI_NIDENT {
            return Err(ElfError::TooShort {
                needed: EI_NIDENT,
                available: bytes.len(),
            });
        }

        if bytes[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }

        let class = target.class.ident();
        if bytes[EI_CLASS] != class {
            return Err(ElfError::WrongClass {
                expected: class,
                found: bytes[EI_CLASS],
            });
        }

        if bytes[EI_DATA] != ELFDATA2LSB {
            return Err(ElfError::NotLittleEndian(bytes[EI_DATA]));
        }

        if bytes[EI_VERSION] != EV_CURRENT {
            return Err(ElfError::BadVersion(bytes[EI_VERSION]));
        }

        let header = target
            .class
            .read_header(bytes)
            .ok_or(ElfError::TooShort {
                needed: target.class.header_size(),
                available: bytes.len(),
            })?;

        if header.object_type != ET_EXEC {
            return Err(ElfError::NotExecutable(header.object_type));
        }

        if header.machine != target.machine {
            return Err(ElfError::WrongMachine {
                expected: target.machine,
                found: header.machine,
            });
        }

        let phdr_size = target.class.phdr_size();
        if usize::from(header.phentsize) != phdr_size {
            return Err(ElfError::BadProgramHeaderSize {
                expected: phdr_size,
                found: header.phentsize,
            });
        }

        let phoff =
            usize::try_from(header.phoff).map_err(|_| ElfError::ProgramHeadersOutOfBounds)?;
        let table_end = phdr_size
            .checked_mul(usize::from(header.phnum))
            .and_then(|len| phoff.checked_add(len))
            .ok_or(ElfError::ProgramHeadersOutOfBounds)?;
        if table_end > bytes.len() {
            return Err(ElfError::ProgramHeadersOutOfBounds);
        }

        let image = Self {
            bytes,
            target,
            header,
            phoff,
        };

        if !image.program_headers().any(|ph| ph.p_type == PT_LOAD) {
            return Err(ElfError::NoLoadableSegments);
        }

        Ok(image)
    }

    /// The raw image.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[must_use]
    pub const fn target(&self) -> ElfTarget {
        self.target
    }

    /// `e_entry`.
    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        VirtualAddress::new(self.header.entry)
    }

    /// Number of program header entries.
    #[must_use]
    pub const fn program_header_count(&self) -> u16 {
        self.header.phnum
    }

    /// All program headers in table order.
    pub fn program_headers(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
        let class = self.target.class;
        let size = class.phdr_size();
        (0..usize::from(self.header.phnum)).filter_map(move |i| {
            let start = self.phoff + i * size;
            class.read_phdr(self.bytes.get(start..start + size)?)
        })
    }

    /// `PT_LOAD` program headers in table order.
    pub fn loadable_segments(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
        self.program_headers().filter(|ph| ph.p_type == PT_LOAD)
    }

    /// The file bytes `[offset, offset + len)`, or `None` if any part lies
    /// outside the image.
    #[must_use]
    pub fn file_range(&self, offset: u64, len: u64) -> Option<&'a [u8]> {
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(len).ok()?;
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::{ELFCLASS32, ELFCLASS64, EM_386, EM_X86_64, ET_DYN};

    /// A minimal ELF64 executable with one `PT_LOAD` entry.
    fn elf64() -> [u8; 120] {
        let mut b = [0u8; 120];
        b[..4].copy_from_slice(&ELF_MAGIC);
        b[4] = ELFCLASS64;
        b[5] = ELFDATA2LSB;
        b[6] = EV_CURRENT;
        b[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        b[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        b[20..24].copy_from_slice(&1u32.to_le_bytes());
        b[24..32].copy_from_slice(&0x10_0000u64.to_le_bytes());
        b[32..40].copy_from_slice(&64u64.to_le_bytes());
        b[52..54].copy_from_slice(&64u16.to_le_bytes());
        b[54..56].copy_from_slice(&56u16.to_le_bytes());
        b[56..58].copy_from_slice(&1u16.to_le_bytes());
        // program header at 64
        b[64..68].copy_from_slice(&PT_LOAD.to_le_bytes());
        b[68..72].copy_from_slice(&5u32.to_le_bytes());
        b[88..96].copy_from_slice(&0x10_0000u64.to_le_bytes());
        b[96..104].copy_from_slice(&8u64.to_le_bytes());
        b[104..112].copy_from_slice(&16u64.to_le_bytes());
        b
    }

    /// A minimal ELF32 executable with one `PT_LOAD` entry.
    fn elf32() -> [u8; 84] {
        let mut b = [0u8; 84];
        b[..4].copy_from_slice(&ELF_MAGIC);
        b[4] = ELFCLASS32;
        b[5] = ELFDATA2LSB;
        b[6] = EV_CURRENT;
        b[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        b[18..20].copy_from_slice(&EM_386.to_le_bytes());
        b[24..28].copy_from_slice(&0x10_0000u32.to_le_bytes());
        b[28..32].copy_from_slice(&52u32.to_le_bytes());
        b[42..44].copy_from_slice(&32u16.to_le_bytes());
        b[44..46].copy_from_slice(&1u16.to_le_bytes());
        b[52..56].copy_from_slice(&PT_LOAD.to_le_bytes());
        b[64..68].copy_from_slice(&0x20_0000u32.to_le_bytes());
        b[68..72].copy_from_slice(&4u32.to_le_bytes());
        b[72..76].copy_from_slice(&4u32.to_le_bytes());
        b
    }

    #[test]
    fn accepts_minimal_elf64() {
        let bytes = elf64();
        let image = ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap();
        assert_eq!(image.entry().as_u64(), 0x10_0000);
        let segs: Vec<_> = image.loadable_segments().collect();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].paddr, 0x10_0000);
        assert_eq!(segs[0].filesz, 8);
        assert_eq!(segs[0].memsz, 16);
        assert_eq!(segs[0].flags.as_str(), "R-X");
    }

    #[test]
    fn accepts_minimal_elf32_in_legacy_profile() {
        let bytes = elf32();
        let image = ElfImage::parse(&bytes, ElfTarget::I386).unwrap();
        let seg = image.loadable_segments().next().unwrap();
        assert_eq!(seg.paddr, 0x20_0000);
        assert_eq!(seg.memsz, 4);
    }

    #[test]
    fn profiles_do_not_cross() {
        assert_eq!(
            ElfImage::parse(&elf64(), ElfTarget::I386).unwrap_err(),
            ElfError::WrongClass {
                expected: ELFCLASS32,
                found: ELFCLASS64
            }
        );
        assert_eq!(
            ElfImage::parse(&elf32(), ElfTarget::X86_64).unwrap_err(),
            ElfError::WrongClass {
                expected: ELFCLASS64,
                found: ELFCLASS32
            }
        );
    }

    #[test]
    fn empty_buffer_is_too_short() {
        assert!(matches!(
            ElfImage::parse(&[], ElfTarget::X86_64),
            Err(ElfError::TooShort { available: 0, .. })
        ));
    }

    #[test]
    fn altered_magic_is_rejected() {
        let mut bytes = elf64();
        bytes[0] = 0x7E;
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::BadMagic
        );
    }

    #[test]
    fn unknown_ident_version_is_rejected() {
        let mut bytes = elf64();
        bytes[6] = 2;
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::BadVersion(2)
        );
    }

    #[test]
    fn magic_is_checked_before_class() {
        let mut bytes = elf64();
        bytes[1] = b'X';
        bytes[4] = 9;
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::BadMagic
        );
    }

    #[test]
    fn big_endian_is_rejected() {
        let mut bytes = elf64();
        bytes[5] = 2;
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::NotLittleEndian(2)
        );
    }

    #[test]
    fn shared_objects_are_rejected() {
        let mut bytes = elf64();
        bytes[16..18].copy_from_slice(&ET_DYN.to_le_bytes());
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::NotExecutable(ET_DYN)
        );
    }

    #[test]
    fn wrong_machine_is_rejected() {
        let mut bytes = elf64();
        bytes[18..20].copy_from_slice(&183u16.to_le_bytes());
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::WrongMachine {
                expected: EM_X86_64,
                found: 183
            }
        );
    }

    #[test]
    fn truncated_program_header_table_is_rejected() {
        let bytes = elf64();
        assert_eq!(
            ElfImage::parse(&bytes[..100], ElfTarget::X86_64).unwrap_err(),
            ElfError::ProgramHeadersOutOfBounds
        );
    }

    #[test]
    fn overflowing_phoff_is_rejected() {
        let mut bytes = elf64();
        bytes[32..40].copy_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::ProgramHeadersOutOfBounds
        );
    }

    #[test]
    fn odd_program_header_size_is_rejected() {
        let mut bytes = elf64();
        bytes[54..56].copy_from_slice(&48u16.to_le_bytes());
        assert!(matches!(
            ElfImage::parse(&bytes, ElfTarget::X86_64),
            Err(ElfError::BadProgramHeaderSize { found: 48, .. })
        ));
    }

    #[test]
    fn image_without_load_segments_is_rejected() {
        let mut bytes = elf64();
        bytes[64..68].copy_from_slice(&4u32.to_le_bytes()); // PT_NOTE
        assert_eq!(
            ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap_err(),
            ElfError::NoLoadableSegments
        );
    }

    #[test]
    fn file_range_is_bounds_checked() {
        let bytes = elf64();
        let image = ElfImage::parse(&bytes, ElfTarget::X86_64).unwrap();
        assert_eq!(image.file_range(0, 4), Some(&ELF_MAGIC[..]));
        assert!(image.file_range(100, 21).is_none());
        assert!(image.file_range(u64::MAX, 2).is_none());
    }
}
