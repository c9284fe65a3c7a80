use crate::port::CpuPorts;
use crate::serial::{COM1, Uart16550};
use crate::write_record;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct ConsoleLogger {
    max_level: LevelFilter,
    serial: Option<Uart16550<CpuPorts>>,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            serial: None,
        }
    }

    /// Also write to COM1; programs the UART.
    ///
    /// Without the `serial` feature this is a no-op.
    #[must_use]
    pub fn with_serial(mut self) -> Self {
        if cfg!(feature = "serial") {
            let uart = Uart16550::new(CpuPorts, COM1);
            // SAFETY: COM1 is a 16550 on every PC-compatible target we boot on.
            unsafe { uart.init() };
            self.serial = Some(uart);
        }
        self
    }

    /// Call this once during early init.
    ///
    /// A second call leaves the installed logger and its level alone and
    /// fails.
    #[allow(
        static_mut_refs,
        clippy::missing_errors_doc,
        clippy::missing_panics_doc
    )]
    pub fn init(self) -> Result<(), SetLoggerError> {
        // set_logger needs a &'static; there is no allocator this early.
        static mut LOGGER: Option<ConsoleLogger> = None;

        let max_level = self.max_level;
        unsafe {
            // Never replaced once `log` may hold a reference to it.
            if LOGGER.is_none() {
                LOGGER = Some(self);
            }
            if let Some(logger) = LOGGER.as_ref() {
                log::set_logger(logger)?;
            }
        }
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        #[cfg(feature = "qemu")]
        {
            let _ = write_record(&mut crate::qemu_fmt::QemuSink, record);
        }

        if let Some(uart) = &self.serial {
            let _ = write_record(&mut &*uart, record);
        }
    }

    fn flush(&self) {}
}
