//! # GuaBoot UEFI Loader
//!
//! A UEFI application that loads a 64-bit ELF kernel from the boot volume
//! and calls it with a [`BootInfo`](guaboot_info::boot::BootInfo) record.
//! The firmware already runs in long mode with all of RAM identity mapped,
//! so unlike the BIOS path there is no mode switch: the loader calls the
//! kernel's entry point directly after `ExitBootServices`.
//!
//! ```text
//! efi_main
//!   ├─ read \boot\guaboot.conf (optional)
//!   ├─ read modules into LOADER_DATA pages
//!   ├─ prepare()                       guaboot-core pipeline
//!   │    ├─ read + verify kernel ELF
//!   │    ├─ claim segment pages (AllocateAddress), copy, zero BSS
//!   │    ├─ CRC32 over the loaded range
//!   │    ├─ memory map (retried once)
//!   │    ├─ ExitBootServices
//!   │    └─ fill the boot record
//!   └─ dispatch()                      kernel(BOOT_MAGIC, &boot_info)
//! ```
//!
//! ## Configuration
//! See [`guaboot_core::config`]. Without a configuration file the kernel is
//! read from [`DEFAULT_KERNEL_PATH`](guaboot_core::config::DEFAULT_KERNEL_PATH)
//! and gets [`DEFAULT_COMMAND_LINE`].
//!
//! ## Errors
//! Failures before `ExitBootServices` return a [`Status`] to the firmware
//! (usually dropping back into the boot menu); after it there is nobody to
//! return to and the loader halts.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
#![allow(unsafe_code)]
extern crate alloc;

mod allocator;
mod file_system;
mod firmware;
mod logger;
mod memory;

use crate::file_system::{FileError, load_file};
use crate::firmware::UefiFirmware;
use crate::logger::UefiLogger;
use crate::memory::{UefiMemory, allocate_boot_info_page, load_modules};
use guaboot_console::trace_boot_info;
use guaboot_core::boot_info::BootParameters;
use guaboot_core::config::{CONFIG_PATH, LoaderConfig};
use guaboot_core::dispatch::{dispatch, fail_stop};
use guaboot_core::elf::ElfTarget;
use guaboot_core::firmware::FirmwareError;
use guaboot_core::loader::LoadError;
use guaboot_core::machine::NativeMachine;
use guaboot_core::memory::MemoryError;
use guaboot_core::pipeline::{BootError, BootStep, prepare};
use log::{LevelFilter, error, info, warn};
use uefi::prelude::*;

/// Kernel command line when the configuration file sets none.
pub const DEFAULT_COMMAND_LINE: &str = "console=ttyS0";

#[entry]
fn efi_main() -> Status {
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }

    let Ok(logger) = UefiLogger::new(LevelFilter::Debug).init() else {
        return Status::ABORTED;
    };
    info!("GuaBoot UEFI loader");

    let config = match read_config() {
        Ok(config) => config,
        Err(status) => return status,
    };
    log::set_max_level(config.log_level());
    info!(
        "Kernel {}, command line \"{}\", {} modules",
        config.kernel_path,
        config.command_line,
        config.modules.len()
    );

    let modules = match load_modules(&config.modules) {
        Ok(modules) => modules,
        Err(e) => {
            error!("{e}");
            return e.into();
        }
    };

    let (storage, storage_addr) = match allocate_boot_info_page() {
        Ok(page) => page,
        Err(e) => {
            error!("Could not allocate the boot record: {:?}", e.status());
            return e.status();
        }
    };

    let params = BootParameters {
        boot_device: config.boot_device.unwrap_or(0),
        command_line: config.command_line,
        modules: &modules,
    };
    let mut firmware = UefiFirmware::new(config.kernel_path, logger);
    let mut memory = UefiMemory::new();

    // SAFETY: the only instance; UEFI applications run at CPL 0.
    let mut machine = unsafe { NativeMachine::new() };

    let prepared = match prepare(
        &mut firmware,
        &mut memory,
        ElfTarget::X86_64,
        storage,
        storage_addr,
        &params,
    ) {
        Ok(prepared) => prepared,
        Err(e) if services_available(&e) => {
            error!("Boot failed while {}: {e}", e.step());
            return status_of(&e);
        }
        Err(e) => fail_stop(&mut machine, &e),
    };

    trace_boot_info(prepared.boot_info, prepared.boot_info_addr.as_u64());

    // SAFETY: the pipeline loaded and verified a 64-bit kernel at this entry
    // and finished the boot record.
    unsafe { dispatch(&mut machine, prepared.entry(), prepared.boot_info_addr) }
}

/// Parse the configuration file; a missing file means defaults.
fn read_config() -> Result<LoaderConfig<'static>, Status> {
    let text = match load_file(CONFIG_PATH) {
        Ok(bytes) => core::str::from_utf8(bytes).unwrap_or_else(|_| {
            warn!("{CONFIG_PATH} is not UTF-8; using defaults");
            ""
        }),
        Err(FileError::NotFound) => {
            info!("No {CONFIG_PATH}; using defaults");
            ""
        }
        Err(e) => {
            warn!("Could not read {CONFIG_PATH}: {e}; using defaults");
            ""
        }
    };

    LoaderConfig::new(DEFAULT_COMMAND_LINE)
        .parse(text)
        .map_err(|e| {
            error!("{CONFIG_PATH}: {e}");
            Status::LOAD_ERROR
        })
}

/// Whether boot services were still up when `e` happened.
///
/// Only the boot record is built after `ExitBootServices`.
const fn services_available(e: &BootError) -> bool {
    !matches!(e.step(), BootStep::BootInfo)
}

const fn status_of(e: &BootError) -> Status {
    match e {
        BootError::ReadKernel(FirmwareError::KernelNotFound) => Status::NOT_FOUND,
        BootError::Verify(_) => Status::UNSUPPORTED,
        BootError::Load(LoadError::Memory(MemoryError::ReservationFailed { .. })) => {
            Status::OUT_OF_RESOURCES
        }
        BootError::MemoryMap(FirmwareError::BufferTooSmall { .. }) => Status::BUFFER_TOO_SMALL,
        BootError::ReadKernel(_)
        | BootError::Load(_)
        | BootError::Checksum(_)
        | BootError::MemoryMap(_)
        | BootError::ExitFirmware(_)
        | BootError::BootInfo(_) => Status::LOAD_ERROR,
    }
}
