use core::sync::atomic::{AtomicBool, Ordering};
use guaboot_console::{qemu_trace, write_record};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct UefiLogger {
    max_level: LevelFilter,
    boot_services_available: AtomicBool,
}

impl UefiLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            boot_services_available: AtomicBool::new(true),
        }
    }

    /// Call this once during early init.
    #[allow(static_mut_refs, clippy::missing_errors_doc)]
    pub fn init(self) -> Result<&'static Self, SetLoggerError> {
        // set_logger needs a &'static; the allocator may not outlive boot services.
        static mut LOGGER: Option<UefiLogger> = None;

        let max_level = self.max_level;
        let logger: &'static Self = unsafe { LOGGER.insert(self) };
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(logger)
    }

    /// Stop mirroring to the firmware console.
    pub fn exit_boot_services(&self) {
        self.boot_services_available.store(false, Ordering::Release);
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        qemu_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );

        // Mirror to the UEFI console as long as it exists.
        if self.boot_services_available.load(Ordering::Acquire) {
            uefi::system::with_stdout(|out| {
                let _ = write_record(out, record);
            });
        }
    }

    fn flush(&self) {}
}
