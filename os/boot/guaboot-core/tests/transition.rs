mod common;

use common::{Event, FakeMachine, Halted, Jumped, run_terminal};
use guaboot_addresses::{PhysicalAddress, VirtualAddress};
use guaboot_core::dispatch::{dispatch, fail_stop};
use guaboot_core::firmware::FirmwareError;
use guaboot_core::machine::{FarPointer, StubArguments};
use guaboot_core::pipeline::{BootError, BootStep};
use guaboot_core::transition::gdt::{CODE64_SELECTOR, TRANSITION_GDT};
use guaboot_core::transition::{ModeTransition, enter_long_mode};
use guaboot_info::boot::BOOT_MAGIC;
use guaboot_info::memory::{BOOT_INFO_ADDR, PAGE_TABLE_ADDR, TRANSITION_STUB_ADDR};
use guaboot_vmem::IdentityMap;

const CR0_PE: u64 = 1;
const CR0_PG: u64 = 1 << 31;
const CR4_PAE: u64 = 1 << 5;
const EFER_LME: u64 = 1 << 8;
const EFER_NXE: u64 = 1 << 11;

fn args() -> StubArguments {
    StubArguments {
        magic: BOOT_MAGIC,
        boot_info: BOOT_INFO_ADDR,
        entry: VirtualAddress::new(0x10_0000),
    }
}

#[test]
fn registers_are_written_in_order() {
    let mut map = Box::new(IdentityMap::zeroed());
    let root = map.build(PAGE_TABLE_ADDR).unwrap();

    let mut machine = FakeMachine::protected_mode();
    let payload = run_terminal(|| unsafe {
        enter_long_mode(&mut machine, root, TRANSITION_STUB_ADDR, args())
    });
    assert!(payload.downcast_ref::<Jumped>().is_some());

    let gdt = TRANSITION_GDT.pointer();
    assert_eq!(
        machine.events,
        vec![
            Event::DisableInterrupts,
            Event::LoadGdt {
                base: gdt.base,
                limit: gdt.limit
            },
            Event::LoadDataSegments(0x10),
            Event::WriteCr4(CR4_PAE),
            Event::WriteCr3(PAGE_TABLE_ADDR.as_u64()),
            Event::WriteEfer(EFER_LME | EFER_NXE),
            Event::WriteCr0(0x11 | CR0_PG),
            Event::FarJump(
                FarPointer {
                    selector: CODE64_SELECTOR,
                    offset: TRANSITION_STUB_ADDR
                },
                args()
            ),
        ]
    );
}

#[test]
fn existing_register_bits_are_preserved() {
    let mut machine = FakeMachine::protected_mode();
    machine.cr4 = 1 << 9; // OSFXSR
    machine.efer = 1; // SCE
    machine.cr0 = CR0_PE;

    let root = PhysicalAddress::new(0x1_0000).page();
    run_terminal(|| unsafe { enter_long_mode(&mut machine, root, TRANSITION_STUB_ADDR, args()) });

    assert_eq!(machine.cr4, (1 << 9) | CR4_PAE);
    assert_eq!(machine.efer, 1 | EFER_LME | EFER_NXE);
    assert_eq!(machine.cr0, CR0_PE | CR0_PG);
}

#[test]
fn pae_precedes_cr3_and_lme_precedes_paging() {
    let mut machine = FakeMachine::protected_mode();
    let root = PhysicalAddress::new(0x1_0000).page();
    run_terminal(|| unsafe {
        ModeTransition::begin(&mut machine)
            .load_segments(&TRANSITION_GDT)
            .configure_paging(root)
            .enable_pae()
            .install_page_table()
            .enable_long_mode()
            .enable_paging()
            .jump_to_stub(TRANSITION_STUB_ADDR, args())
    });

    let position = |pred: fn(&Event) -> bool| machine.events.iter().position(pred).unwrap();
    let gdt = position(|e| matches!(e, Event::LoadGdt { .. }));
    let pae = position(|e| matches!(e, Event::WriteCr4(_)));
    let cr3 = position(|e| matches!(e, Event::WriteCr3(_)));
    let lme = position(|e| matches!(e, Event::WriteEfer(_)));
    let pg = position(|e| matches!(e, Event::WriteCr0(_)));
    let jump = position(|e| matches!(e, Event::FarJump(..)));
    assert!(gdt < pae && pae < cr3 && cr3 < lme && lme < pg && pg < jump);
    assert_eq!(jump, machine.events.len() - 1);
}

#[test]
fn dispatch_passes_magic_and_record() {
    let mut machine = FakeMachine::default();
    let payload = run_terminal(|| unsafe {
        dispatch(&mut machine, VirtualAddress::new(0x10_0000), BOOT_INFO_ADDR)
    });
    assert!(payload.downcast_ref::<Halted>().is_some());
    assert_eq!(
        machine.events,
        vec![
            Event::CallKernel {
                entry: 0x10_0000,
                magic: 0x4253_4447,
                boot_info: BOOT_INFO_ADDR.as_u64()
            },
            Event::Halt,
        ]
    );
}

#[test]
fn fail_stop_halts() {
    let mut machine = FakeMachine::default();
    let error = BootError::ExitFirmware(FirmwareError::ExitRefused);
    assert_eq!(error.step(), BootStep::ExitFirmware);
    let payload = run_terminal(|| fail_stop(&mut machine, &error));
    assert!(payload.downcast_ref::<Halted>().is_some());
    assert_eq!(machine.events, vec![Event::Halt]);
}
