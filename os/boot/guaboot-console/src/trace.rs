use crate::qemu_trace;
use core::fmt::{self, Write};
use guaboot_info::boot::BootInfo;

/// Dump every field of `info`, located at `at`, to the QEMU debug port.
pub fn trace_boot_info(info: &BootInfo, at: u64) {
    struct Trace;

    impl Write for Trace {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            qemu_trace!("{s}");
            Ok(())
        }
    }

    let _ = write_boot_info(&mut Trace, info, at);
}

/// The multi-line rendering [`trace_boot_info`] emits.
///
/// # Errors
/// Whatever `out` reports.
pub fn write_boot_info(out: &mut impl Write, info: &BootInfo, at: u64) -> fmt::Result {
    writeln!(out, "Boot info at {at:#018x}:")?;
    writeln!(
        out,
        "  magic = {:#010x}, version = {:#010x}, size = {}",
        info.magic, info.version, info.size
    )?;
    writeln!(
        out,
        "  kernel base = {:#018x}, size = {}, crc32 = {:#010x}",
        info.kernel_base, info.kernel_size, info.kernel_crc32
    )?;
    writeln!(
        out,
        "  mem lower = {} KiB, mem upper = {} KiB",
        info.mem_lower, info.mem_upper
    )?;
    writeln!(
        out,
        "  mmap ptr = {:#018x}, mmap count = {}",
        info.mmap, info.mmap_count
    )?;
    writeln!(
        out,
        "  boot device = {:#x}, cmdline ptr = {:#018x}",
        info.boot_device, info.cmdline
    )?;
    writeln!(
        out,
        "  mods ptr = {:#018x}, mods count = {}",
        info.mods, info.mods_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use guaboot_info::boot::{BOOT_MAGIC, BOOT_VERSION};

    #[test]
    fn renders_all_fields() {
        let mut info = BootInfo::empty();
        info.magic = BOOT_MAGIC;
        info.version = BOOT_VERSION;
        info.size = BootInfo::SIZE;
        info.kernel_base = 0x10_0000;
        info.kernel_size = 8192;
        info.kernel_crc32 = 0x1234_ABCD;
        info.mem_upper = 130_048;
        info.boot_device = 0x80;
        info.mmap_count = 2;

        let mut out = String::new();
        write_boot_info(&mut out, &info, 0xA000).unwrap();
        let lines: Vec<_> = out.lines().collect();

        assert_eq!(lines[0], "Boot info at 0x000000000000a000:");
        assert_eq!(
            lines[1],
            "  magic = 0x42534447, version = 0x00010000, size = 88"
        );
        assert_eq!(
            lines[2],
            "  kernel base = 0x0000000000100000, size = 8192, crc32 = 0x1234abcd"
        );
        assert_eq!(lines[3], "  mem lower = 0 KiB, mem upper = 130048 KiB");
        assert!(lines[4].ends_with("mmap count = 2"));
        assert!(lines[5].starts_with("  boot device = 0x80"));
        assert_eq!(lines.len(), 7);
    }
}
