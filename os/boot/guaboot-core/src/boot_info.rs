//! # Boot Record Construction
//!
//! [`BootInfoBuilder`] fills a [`BootInfoPage`] in dependency order. Each
//! stage is a distinct type, so a record cannot be finished before its image
//! and memory fields are set:
//!
//! ```text
//! new(page, at) ─► with_image(image, crc) ─► with_memory(regions) ─► finish(params)
//!  magic/version/size   base/size/crc32        mmap + totals          device, cmdline, modules
//! ```
//!
//! Pointers inside the record are computed from the page's physical
//! location, not from the Rust reference, so the record can be built in one
//! place and consumed at another (or checked in tests without touching the
//! real addresses).

use crate::loader::LoadedImage;
use crate::memory_map::{FirmwareMap, translate};
use core::marker::PhantomData;
use core::mem::offset_of;
use guaboot_addresses::PhysicalAddress;
use guaboot_info::boot::{
    BOOT_MAGIC, BOOT_VERSION, BootInfo, BootInfoPage, MAX_MODULES, Module, STRING_AREA_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BootInfoError {
    #[error("{0} modules were supplied; at most {MAX_MODULES} fit")]
    TooManyModules(usize),
    #[error("The command line and module names exceed {STRING_AREA_SIZE} bytes")]
    StringAreaExhausted,
}

/// An auxiliary payload already resident in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSpec<'a> {
    pub start: PhysicalAddress,
    pub end: PhysicalAddress,
    pub name: &'a str,
}

/// The caller-supplied fields of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootParameters<'a> {
    pub boot_device: u32,
    pub command_line: &'a str,
    pub modules: &'a [ModuleSpec<'a>],
}

pub mod stage {
    /// Only the fixed constants are set.
    pub struct Constants;
    /// Image location and checksum are set.
    pub struct Located;
    /// Memory map and totals are set.
    pub struct Mapped;
}

pub struct BootInfoBuilder<'p, S> {
    page: &'p mut BootInfoPage,
    location: PhysicalAddress,
    strings_used: usize,
    _stage: PhantomData<S>,
}

impl<'p> BootInfoBuilder<'p, stage::Constants> {
    /// Clear `page` and write magic, version and size.
    ///
    /// `location` is the physical address `page` will be read from.
    pub fn new(page: &'p mut BootInfoPage, location: PhysicalAddress) -> Self {
        *page = BootInfoPage::zeroed();
        page.info.magic = BOOT_MAGIC;
        page.info.version = BOOT_VERSION;
        page.info.size = BootInfo::SIZE;
        Self {
            page,
            location,
            strings_used: 0,
            _stage: PhantomData,
        }
    }

    /// Record where the kernel landed and its checksum.
    pub fn with_image(
        self,
        image: &LoadedImage,
        kernel_crc32: u32,
    ) -> BootInfoBuilder<'p, stage::Located> {
        self.page.info.kernel_base = image.base.as_u64();
        self.page.info.kernel_size = image.size();
        self.page.info.kernel_crc32 = kernel_crc32;
        self.advance()
    }
}

impl<'p> BootInfoBuilder<'p, stage::Located> {
    /// Translate `regions` into the page and record the totals.
    ///
    /// Regions that do not fit in the page are left out of the map but
    /// still counted in `mem_lower` and `mem_upper`.
    pub fn with_memory(self, regions: &FirmwareMap) -> BootInfoBuilder<'p, stage::Mapped> {
        let (count, totals) = translate(regions, &mut self.page.memory_map);
        let mmap = self.address_of(offset_of!(BootInfoPage, memory_map));
        let info = &mut self.page.info;
        info.mem_lower = totals.lower_kib;
        info.mem_upper = totals.upper_kib;
        info.mmap_count = u32::try_from(count).unwrap_or(u32::MAX);
        info.mmap = mmap;
        self.advance()
    }
}

impl<'p> BootInfoBuilder<'p, stage::Mapped> {
    /// Write device, command line and modules and hand out the record.
    ///
    /// # Errors
    /// [`BootInfoError::TooManyModules`] or
    /// [`BootInfoError::StringAreaExhausted`].
    pub fn finish(mut self, params: &BootParameters<'_>) -> Result<&'p BootInfo, BootInfoError> {
        if params.modules.len() > MAX_MODULES {
            return Err(BootInfoError::TooManyModules(params.modules.len()));
        }

        self.page.info.boot_device = params.boot_device;
        self.page.info.cmdline = self.push_string(params.command_line)?;

        for (slot, module) in params.modules.iter().enumerate() {
            let name = self.push_string(module.name)?;
            self.page.modules[slot] = Module {
                start: module.start.as_u64(),
                end: module.end.as_u64(),
                name,
                reserved: 0,
            };
        }

        self.page.info.mods_count = u32::try_from(params.modules.len()).unwrap_or(u32::MAX);
        self.page.info.mods = if params.modules.is_empty() {
            0
        } else {
            self.address_of(offset_of!(BootInfoPage, modules))
        };

        Ok(&self.page.info)
    }

    /// Copy `s` NUL-terminated into the string area; return its address.
    fn push_string(&mut self, s: &str) -> Result<u64, BootInfoError> {
        let start = self.strings_used;
        let end = start + s.len();
        if end >= STRING_AREA_SIZE {
            return Err(BootInfoError::StringAreaExhausted);
        }
        self.page.strings[start..end].copy_from_slice(s.as_bytes());
        self.page.strings[end] = 0;
        self.strings_used = end + 1;
        Ok(self.address_of(offset_of!(BootInfoPage, strings) + start))
    }
}

impl<'p, S> BootInfoBuilder<'p, S> {
    /// Physical address of the byte at `offset` within the page.
    const fn address_of(&self, offset: usize) -> u64 {
        self.location.as_u64() + offset as u64
    }

    fn advance<T>(self) -> BootInfoBuilder<'p, T> {
        BootInfoBuilder {
            page: self.page,
            location: self.location,
            strings_used: self.strings_used,
            _stage: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::{E820Entry, FirmwareRegion};
    use guaboot_addresses::VirtualAddress;
    use guaboot_info::boot::{MemoryKind, MemoryMapEntry};

    const AT: PhysicalAddress = PhysicalAddress::new(0xA000);

    fn image() -> LoadedImage {
        LoadedImage {
            entry: VirtualAddress::new(0x10_0000),
            base: PhysicalAddress::new(0x10_0000),
            end: PhysicalAddress::new(0x10_2000),
            segments: heapless::Vec::new(),
        }
    }

    fn regions() -> FirmwareMap {
        [
            E820Entry::new(0, 0x10_0000, 2),
            E820Entry::new(0x10_0000, 0x7F0_0000, 1),
        ]
        .into_iter()
        .map(FirmwareRegion::from)
        .collect()
    }

    fn build<'p>(
        page: &'p mut BootInfoPage,
        params: &BootParameters<'_>,
    ) -> Result<&'p BootInfo, BootInfoError> {
        BootInfoBuilder::new(page, AT)
            .with_image(&image(), 0xDEAD_BEEF)
            .with_memory(&regions())
            .finish(params)
    }

    fn c_str(page: &BootInfoPage, addr: u64) -> &str {
        let offset = usize::try_from(addr - AT.as_u64()).unwrap() - offset_of!(BootInfoPage, strings);
        let bytes = &page.strings[offset..];
        let len = bytes.iter().position(|&b| b == 0).unwrap();
        core::str::from_utf8(&bytes[..len]).unwrap()
    }

    #[test]
    fn fields_are_populated() {
        let mut page = Box::new(BootInfoPage::zeroed());
        let params = BootParameters {
            boot_device: 0x80,
            command_line: "root=/dev/ram0 debug=true",
            modules: &[],
        };
        let info = *build(&mut page, &params).unwrap();

        assert!(info.is_compatible());
        assert_eq!(info.magic, 0x4253_4447);
        assert_eq!(info.size as usize, size_of::<BootInfo>());
        assert_eq!(info.kernel_base, 0x10_0000);
        assert_eq!(info.kernel_size, 0x2000);
        assert_eq!(info.kernel_crc32, 0xDEAD_BEEF);
        assert_eq!(info.mem_lower, 0);
        assert_eq!(info.mem_upper, 130_048);
        assert_eq!(info.mmap_count, 2);
        assert_eq!(
            info.mmap,
            AT.as_u64() + offset_of!(BootInfoPage, memory_map) as u64
        );
        assert_eq!(info.boot_device, 0x80);
        assert_eq!(info.mods_count, 0);
        assert_eq!(info.mods, 0);
        assert_eq!(c_str(&page, info.cmdline), "root=/dev/ram0 debug=true");
        assert_eq!(
            page.memory_map[1],
            MemoryMapEntry::new(0x10_0000, 0x7F0_0000, MemoryKind::Usable)
        );
    }

    #[test]
    fn modules_and_names() {
        let mut page = Box::new(BootInfoPage::zeroed());
        let modules = [
            ModuleSpec {
                start: PhysicalAddress::new(0x40_0000),
                end: PhysicalAddress::new(0x40_1000),
                name: "uk_space",
            },
            ModuleSpec {
                start: PhysicalAddress::new(0x50_0000),
                end: PhysicalAddress::new(0x50_0800),
                name: "uk_time",
            },
        ];
        let params = BootParameters {
            boot_device: 0,
            command_line: "console=ttyS0",
            modules: &modules,
        };
        let info = *build(&mut page, &params).unwrap();

        assert_eq!(info.mods_count, 2);
        assert_eq!(
            info.mods,
            AT.as_u64() + offset_of!(BootInfoPage, modules) as u64
        );
        assert_eq!(page.modules[0].start, 0x40_0000);
        assert_eq!(page.modules[1].end, 0x50_0800);
        assert_eq!(c_str(&page, page.modules[0].name), "uk_space");
        assert_eq!(c_str(&page, page.modules[1].name), "uk_time");
        assert_eq!(c_str(&page, info.cmdline), "console=ttyS0");
    }

    #[test]
    fn previous_contents_are_cleared() {
        let mut page = Box::new(BootInfoPage::zeroed());
        page.info.reserved = 7;
        page.strings[500] = b'x';
        let params = BootParameters {
            boot_device: 0,
            command_line: "",
            modules: &[],
        };
        build(&mut page, &params).unwrap();
        assert_eq!(page.info.reserved, 0);
        assert_eq!(page.strings[500], 0);
    }

    #[test]
    fn oversized_command_line() {
        let mut page = Box::new(BootInfoPage::zeroed());
        let long = "x".repeat(STRING_AREA_SIZE);
        let params = BootParameters {
            boot_device: 0,
            command_line: &long,
            modules: &[],
        };
        assert_eq!(
            build(&mut page, &params).unwrap_err(),
            BootInfoError::StringAreaExhausted
        );
    }

    #[test]
    fn too_many_modules() {
        let mut page = Box::new(BootInfoPage::zeroed());
        let module = ModuleSpec {
            start: PhysicalAddress::new(0x40_0000),
            end: PhysicalAddress::new(0x40_1000),
            name: "m",
        };
        let modules = [module; MAX_MODULES + 1];
        let params = BootParameters {
            boot_device: 0,
            command_line: "",
            modules: &modules,
        };
        assert_eq!(
            build(&mut page, &params).unwrap_err(),
            BootInfoError::TooManyModules(MAX_MODULES + 1)
        );
    }

    #[test]
    fn missing_map_reports_fallback_totals() {
        let mut page = Box::new(BootInfoPage::zeroed());
        let info = *BootInfoBuilder::new(&mut page, AT)
            .with_image(&image(), 0)
            .with_memory(&FirmwareMap::new())
            .finish(&BootParameters {
                boot_device: 0,
                command_line: "",
                modules: &[],
            })
            .unwrap();
        assert_eq!(info.mem_lower, 640);
        assert_eq!(info.mem_upper, 31 * 1024);
        assert_eq!(info.mmap_count, 0);
    }
}
