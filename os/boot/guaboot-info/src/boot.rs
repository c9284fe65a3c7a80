//! # Kernel Boot Information

/// Tag in [`BootInfo::magic`] and the first kernel argument.
///
/// Distinguishes a populated record from uninitialized memory.
pub const BOOT_MAGIC: u32 = 0x4253_4447;

/// Record version, major/minor packed as `0xMMMM_mmmm` (1.0).
pub const BOOT_VERSION: u32 = 0x0001_0000;

/// Capacity of the normalized memory map in a [`BootInfoPage`].
pub const MAX_MEMORY_MAP_ENTRIES: usize = 256;

/// Capacity of the module list in a [`BootInfoPage`].
pub const MAX_MODULES: usize = 8;

/// Bytes available for the NUL-terminated command line and module names.
pub const STRING_AREA_SIZE: usize = 1024;

/// Kernel entry point.
///
/// # ABI
/// System V: the magic arrives in `edi`, the boot-record address in `rsi`.
/// The kernel is not expected to return; the loader halts if it does.
#[cfg(target_arch = "x86_64")]
pub type KernelEntryFn = extern "sysv64" fn(magic: u32, boot_info: *const BootInfo);

/// The handoff record.
///
/// Keep this `#[repr(C)]`; every pointer is a physical address stored as
/// `u64` so the layout is the same whichever stage fills it in.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootInfo {
    /// Always [`BOOT_MAGIC`].
    pub magic: u32,

    /// Always [`BOOT_VERSION`].
    pub version: u32,

    /// `size_of::<BootInfo>()`; compare against your own definition.
    pub size: u32,

    /// CRC32 (IEEE) over `[kernel_base, kernel_base + kernel_size)`.
    pub kernel_crc32: u32,

    /// Lowest physical address written by any loaded segment.
    pub kernel_base: u64,

    /// Span in bytes from `kernel_base` to the highest segment end.
    pub kernel_size: u64,

    /// Usable memory below 1 MiB, in KiB.
    pub mem_lower: u64,

    /// Usable memory at or above 1 MiB, in KiB.
    ///
    /// When no firmware map was available this holds a fixed fallback figure;
    /// the record does not say so.
    pub mem_upper: u64,

    /// Firmware boot device (BIOS drive number, 0 under UEFI).
    pub boot_device: u32,

    /// Number of [`Module`] entries at `mods`.
    pub mods_count: u32,

    /// NUL-terminated kernel command line.
    pub cmdline: u64,

    /// Array of `mods_count` [`Module`]s, or 0.
    pub mods: u64,

    /// Array of `mmap_count` [`MemoryMapEntry`]s.
    pub mmap: u64,

    /// Number of memory map entries.
    pub mmap_count: u32,

    pub reserved: u32,
}

impl BootInfo {
    /// The true byte size of this record.
    #[allow(clippy::cast_possible_truncation)]
    pub const SIZE: u32 = size_of::<Self>() as u32;

    /// An all-zero record; `magic` is not set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            magic: 0,
            version: 0,
            size: 0,
            kernel_crc32: 0,
            kernel_base: 0,
            kernel_size: 0,
            mem_lower: 0,
            mem_upper: 0,
            boot_device: 0,
            mods_count: 0,
            cmdline: 0,
            mods: 0,
            mmap: 0,
            mmap_count: 0,
            reserved: 0,
        }
    }

    /// Whether a consumer built against this definition may trust the record.
    #[must_use]
    pub const fn is_compatible(&self) -> bool {
        self.magic == BOOT_MAGIC && self.size == Self::SIZE && (self.version >> 16) == 1
    }
}

/// Classification of a [`MemoryMapEntry`].
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryKind {
    /// Free RAM the kernel may use.
    Usable = 1,
    /// Anything else: firmware, ACPI, MMIO, loader data, bad memory.
    Reserved = 2,
}

/// A normalized memory map entry.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: MemoryKind,
    pub reserved: u32,
}

impl MemoryMapEntry {
    pub const EMPTY: Self = Self::new(0, 0, MemoryKind::Reserved);

    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryKind) -> Self {
        Self {
            base,
            length,
            kind,
            reserved: 0,
        }
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.kind, MemoryKind::Usable)
    }
}

/// An auxiliary payload loaded next to the kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Module {
    /// First byte of the payload.
    pub start: u64,
    /// One past the last byte.
    pub end: u64,
    /// NUL-terminated name.
    pub name: u64,
    pub reserved: u64,
}

impl Module {
    pub const EMPTY: Self = Self {
        start: 0,
        end: 0,
        name: 0,
        reserved: 0,
    };
}

/// Backing storage for a [`BootInfo`] and everything it points to.
///
/// The loader places exactly one of these in memory that survives the
/// handoff (a fixed address under BIOS, firmware-allocated pages under UEFI)
/// and fills it in place.
#[repr(C, align(4096))]
pub struct BootInfoPage {
    pub info: BootInfo,
    pub memory_map: [MemoryMapEntry; MAX_MEMORY_MAP_ENTRIES],
    pub modules: [Module; MAX_MODULES],
    pub strings: [u8; STRING_AREA_SIZE],
}

impl BootInfoPage {
    /// Number of 4 KiB pages a `BootInfoPage` occupies.
    pub const PAGES: usize = size_of::<Self>().div_ceil(4096);

    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            info: BootInfo::empty(),
            memory_map: [MemoryMapEntry::EMPTY; MAX_MEMORY_MAP_ENTRIES],
            modules: [Module::EMPTY; MAX_MODULES],
            strings: [0; STRING_AREA_SIZE],
        }
    }
}

const _: () = {
    assert!(size_of::<BootInfo>() == 88);
    assert!(size_of::<MemoryMapEntry>() == 24);
    assert!(size_of::<Module>() == 32);
    assert!(BootInfoPage::PAGES == 2);
};
