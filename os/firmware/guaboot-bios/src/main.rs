//! # Stage 2 Entry Point
//!
//! Stage 1 jumps to the first byte of this image in 32-bit protected mode,
//! interrupts off, with flat code and data segments and the address of the
//! [`StageHandoff`] in `esi`. From there:
//!
//! 1. [`_start`] clears `.bss`, sets up a stack and calls [`stage2_main`]
//! 2. the shared pipeline loads and checksums the kernel and builds the boot
//!    record at [`BOOT_INFO_ADDR`]
//! 3. the identity map is built at [`PAGE_TABLE_ADDR`] and the 64-bit stub is
//!    copied to [`TRANSITION_STUB_ADDR`]
//! 4. the CPU is switched to long mode and far-jumps into the stub, which
//!    calls the kernel with `edi = BOOT_MAGIC`, `rsi = boot_info`
//!
//! Any failure is reported on the console and ends in a halt.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

use core::arch::{global_asm, naked_asm};
use core::mem::offset_of;
use core::ptr;
use guaboot_addresses::PhysicalAddress;
use guaboot_bios::{BiosFirmware, DEFAULT_COMMAND_LINE, StagedMemory};
use guaboot_console::{ConsoleLogger, qemu_trace, trace_boot_info};
use guaboot_core::boot_info::BootParameters;
use guaboot_core::dispatch::fail_stop;
use guaboot_core::elf::ElfTarget;
use guaboot_core::machine::{Machine, NativeMachine, StubArguments};
use guaboot_core::memory::IdentityMemory;
use guaboot_core::pipeline::prepare;
use guaboot_core::transition::enter_long_mode;
use guaboot_core::transition::gdt::DATA_SELECTOR;
use guaboot_info::boot::{BOOT_MAGIC, BootInfoPage};
use guaboot_info::handoff::StageHandoff;
use guaboot_info::memory::{
    BOOT_INFO_ADDR, IDENTITY_MAP_BYTES, LOW_MEMORY_LIMIT, PAGE_TABLE_ADDR, STAGE_HANDOFF_ADDR,
    STUB_STACK_TOP, TRANSITION_STUB_ADDR,
};
use guaboot_vmem::IdentityMap;
use log::{LevelFilter, error, info};

/// Stage 2 stack size.
const STACK_SIZE: usize = 64 * 1024;

/// 16-byte aligned stack
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

static mut STACK: Aligned<STACK_SIZE> = Aligned([0; STACK_SIZE]);

unsafe extern "C" {
    static __bss_start: u8;
    static __bss_end: u8;
    static __transition_stub_start: u8;
    static __transition_stub_end: u8;
    static __transition_stub_load: u8;
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    // SAFETY: nothing else touches the CPU once stage 2 has panicked.
    unsafe { NativeMachine::new() }.halt()
}

/// The stage 2 entry point.
///
/// # ABI
/// Entered by a plain jump from stage 1, not a call; `esi` holds the
/// handoff address and must survive until it is pushed as the argument of
/// [`stage2_main`]. `.bss` is not part of the flat image, so it is zeroed
/// here before anything can use it (the stack lives there).
#[unsafe(link_section = ".text.entry")]
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "C" fn _start() -> ! {
    naked_asm!(
        "cli",
        "cld",
        "mov edi, offset {bss_start}",
        "mov ecx, offset {bss_end}",
        "sub ecx, edi",
        "xor eax, eax",
        "rep stosb",
        "lea esp, [{stack} + {stack_size}]",
        "and esp, -16",
        // cdecl: one argument, 16-byte aligned at the call
        "sub esp, 12",
        "push esi",
        "call {main}",
        "2:",
        "hlt",
        "jmp 2b",
        bss_start = sym __bss_start,
        bss_end = sym __bss_end,
        stack = sym STACK,
        stack_size = const STACK_SIZE,
        main = sym stage2_main,
    );
}

extern "C" fn stage2_main(handoff: *mut StageHandoff) -> ! {
    // SAFETY: the only instance; stage 2 runs at CPL 0.
    let mut machine = unsafe { NativeMachine::new() };
    if ConsoleLogger::new(LevelFilter::Debug)
        .with_serial()
        .init()
        .is_err()
    {
        qemu_trace!("GuaBoot stage 2: logger already installed\n");
    }
    info!("GuaBoot stage 2, handoff at {:#x}", handoff.addr());

    // SAFETY: stage 1 passes the address of the record it filled in.
    let Some(handoff) = (unsafe { handoff.as_mut() }) else {
        error!("Stage 1 passed no handoff record; halting");
        machine.halt()
    };
    if !handoff.is_valid() {
        error!(
            "Unsupported stage handoff (magic {:#010x}, version {}); halting",
            handoff.magic, handoff.version
        );
        machine.halt()
    }

    // SAFETY: stage 1 describes ranges it wrote and nobody reuses.
    let mut firmware = unsafe { BiosFirmware::from_handoff(handoff) };

    // SAFETY: with paging off everything up to the end of the identity map
    // is plain RAM, and nothing of the loader's lives above 1 MiB apart from
    // the staged kernel file, which `StagedMemory` refuses to reserve.
    let ram =
        unsafe { IdentityMemory::new(LOW_MEMORY_LIMIT, PhysicalAddress::new(IDENTITY_MAP_BYTES)) };
    let mut memory = StagedMemory::new(
        ram,
        PhysicalAddress::new(handoff.kernel_image_base),
        handoff.kernel_image_len,
    );

    // SAFETY: BOOT_INFO_ADDR is set aside for the record and page aligned.
    let storage = unsafe {
        let page = ptr::with_exposed_provenance_mut::<BootInfoPage>(addr(BOOT_INFO_ADDR));
        page.write(BootInfoPage::zeroed());
        &mut *page
    };
    let params = BootParameters {
        boot_device: handoff.boot_drive,
        command_line: DEFAULT_COMMAND_LINE,
        modules: &[],
    };

    let prepared = match prepare(
        &mut firmware,
        &mut memory,
        ElfTarget::X86_64,
        storage,
        BOOT_INFO_ADDR,
        &params,
    ) {
        Ok(prepared) => prepared,
        Err(e) => fail_stop(&mut machine, &e),
    };
    prepared.record_in(handoff);
    trace_boot_info(prepared.boot_info, prepared.boot_info_addr.as_u64());

    // SAFETY: PAGE_TABLE_ADDR has three pages set aside for the map.
    let tables =
        unsafe { &mut *ptr::with_exposed_provenance_mut::<IdentityMap>(addr(PAGE_TABLE_ADDR)) };
    let root = match tables.build(PAGE_TABLE_ADDR) {
        Ok(root) => root,
        Err(e) => {
            error!("Could not build the identity map: {e}");
            machine.halt()
        }
    };

    install_transition_stub();

    let args = StubArguments {
        magic: BOOT_MAGIC,
        boot_info: prepared.boot_info_addr,
        entry: prepared.entry(),
    };
    info!(
        "Switching to long mode; kernel entry {}, stub at {TRANSITION_STUB_ADDR}",
        args.entry
    );

    // SAFETY: the identity map covers the stub, the stack below
    // STUB_STACK_TOP, the boot record and the loaded kernel.
    unsafe { enter_long_mode(&mut machine, root, TRANSITION_STUB_ADDR, args) }
}

#[allow(clippy::cast_possible_truncation)]
const fn addr(pa: PhysicalAddress) -> usize {
    // Every fixed address is below 1 MiB.
    pa.as_u64() as usize
}

/// Copy the stub from its load address in the image to where it was linked.
fn install_transition_stub() {
    // SAFETY: the symbols come from the linker script; the destination page
    // below the handoff record is reserved for the stub.
    unsafe {
        let start = (&raw const __transition_stub_start).addr();
        let end = (&raw const __transition_stub_end).addr();
        let len = end - start;
        ptr::copy_nonoverlapping(
            &raw const __transition_stub_load,
            ptr::with_exposed_provenance_mut::<u8>(addr(TRANSITION_STUB_ADDR)),
            len,
        );
    }
}

// The 64-bit half of the mode switch. Entered by far jump through the 64-bit
// code selector with edi = magic, esi = boot_info, edx:eax = kernel entry.
// The upper register halves are undefined after the switch; if the entry
// comes out as zero the arguments are taken from the stage handoff instead.
global_asm!(
    ".pushsection .transition_stub, \"ax\"",
    ".code64",
    ".global transition_stub",
    "transition_stub:",
    "mov cx, {data}",
    "mov ds, cx",
    "mov es, cx",
    "mov fs, cx",
    "mov gs, cx",
    "mov ss, cx",
    "mov esp, {stack_top}",
    "mov eax, eax",
    "shl rdx, 32",
    "or rax, rdx",
    "mov edi, edi",
    "mov esi, esi",
    "test rax, rax",
    "jnz 2f",
    "mov rax, qword ptr [{entry_slot}]",
    "mov rsi, qword ptr [{info_slot}]",
    "mov edi, {magic}",
    "2:",
    "xor ebp, ebp",
    "call rax",
    "3:",
    "cli",
    "hlt",
    "jmp 3b",
    ".code32",
    ".popsection",
    data = const DATA_SELECTOR.bits(),
    stack_top = const STUB_STACK_TOP.as_u64(),
    entry_slot = const STAGE_HANDOFF_ADDR.as_u64() + offset_of!(StageHandoff, kernel_entry) as u64,
    info_slot = const STAGE_HANDOFF_ADDR.as_u64() + offset_of!(StageHandoff, boot_info) as u64,
    magic = const BOOT_MAGIC,
);
