//! # Long Mode Transition
//!
//! The one-way walk from 32-bit protected mode into the 64-bit transition
//! stub, as a chain of states:
//!
//! ```text
//! RealOrProtected ─► SegmentsLoaded ─► PagingConfigured ─► PaeEnabled
//!   ─► PageTableInstalled ─► LongModeEnabled ─► PagingEnabled ─► (stub)
//! ```
//!
//! Every state owns the [`Machine`] and offers exactly one way forward, so
//! the register writes can only happen in this order. None of the steps can
//! fail in a way software would observe: a wrong sequence resets the CPU.
//! [`ModeTransition::jump_to_stub`] does not return.

pub mod gdt;

use crate::machine::{FarPointer, Machine, StubArguments};
use gdt::{CODE64_SELECTOR, DATA_SELECTOR, Gdt};
use guaboot_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use guaboot_registers::cr3::Cr3;
use log::debug;

/// Entered by [`ModeTransition::begin`]; interrupts are masked.
pub struct RealOrProtected;
/// The transition GDT is loaded and data segments reloaded.
pub struct SegmentsLoaded;
/// The page-table root to install is known.
pub struct PagingConfigured {
    root: PhysicalPage<Size4K>,
}
/// `CR4.PAE` is set.
pub struct PaeEnabled {
    root: PhysicalPage<Size4K>,
}
/// `CR3` points at the identity map.
pub struct PageTableInstalled;
/// `EFER.LME` and `EFER.NXE` are set.
pub struct LongModeEnabled;
/// `CR0.PG` is set; the CPU runs in compatibility mode.
pub struct PagingEnabled;

pub struct ModeTransition<'m, M: Machine + ?Sized, S> {
    machine: &'m mut M,
    state: S,
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, RealOrProtected> {
    /// Mask interrupts and start the transition.
    ///
    /// # Safety
    /// `machine` must be the running CPU in 32-bit protected mode at CPL 0
    /// with paging disabled, executing from identity-mapped memory below
    /// 1 GiB.
    pub unsafe fn begin(machine: &'m mut M) -> Self {
        unsafe { machine.disable_interrupts() };
        debug!("Interrupts masked; starting long mode transition");
        Self {
            machine,
            state: RealOrProtected,
        }
    }

    /// Load `gdt` and reload the data segment registers from it.
    pub fn load_segments(self, gdt: &'static Gdt) -> ModeTransition<'m, M, SegmentsLoaded> {
        let pointer = gdt.pointer();
        // SAFETY: the table is 'static and has a flat data descriptor at DATA_SELECTOR.
        unsafe {
            self.machine.load_gdt(pointer);
            self.machine.load_data_segments(DATA_SELECTOR);
        }
        debug!("GDT loaded; data segments reloaded");
        self.advance(SegmentsLoaded)
    }
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, SegmentsLoaded> {
    /// Select the PML4 to run on.
    ///
    /// The tables must be fully built and stay resident for as long as the
    /// kernel uses them.
    pub fn configure_paging(
        self,
        root: PhysicalPage<Size4K>,
    ) -> ModeTransition<'m, M, PagingConfigured> {
        debug!("Using page tables at {root:?}");
        self.advance(PagingConfigured { root })
    }
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, PagingConfigured> {
    /// Set `CR4.PAE`.
    pub fn enable_pae(self) -> ModeTransition<'m, M, PaeEnabled> {
        // SAFETY: paging is still off; PAE only affects table format.
        unsafe {
            let cr4 = self.machine.read_cr4();
            self.machine.write_cr4(cr4.with_pae(true));
        }
        debug!("CR4.PAE set");
        let root = self.state.root;
        self.advance(PaeEnabled { root })
    }
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, PaeEnabled> {
    /// Point `CR3` at the PML4.
    pub fn install_page_table(self) -> ModeTransition<'m, M, PageTableInstalled> {
        let cr3 = Cr3::from_pml4(self.state.root);
        // SAFETY: paging is still off; CR3 takes effect once CR0.PG is set.
        unsafe { self.machine.write_cr3(cr3) };
        debug!("CR3 = {:#x}", cr3.into_bits());
        self.advance(PageTableInstalled)
    }
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, PageTableInstalled> {
    /// Set `EFER.LME` and `EFER.NXE`.
    pub fn enable_long_mode(self) -> ModeTransition<'m, M, LongModeEnabled> {
        // SAFETY: paging is off, which EFER.LME requires.
        unsafe {
            let efer = self.machine.read_efer();
            self.machine.write_efer(efer.with_lme(true).with_nxe(true));
        }
        debug!("EFER.LME and EFER.NXE set");
        self.advance(LongModeEnabled)
    }
}

impl<'m, M: Machine + ?Sized> ModeTransition<'m, M, LongModeEnabled> {
    /// Set `CR0.PG` (and `CR0.PE`); the CPU activates long mode.
    pub fn enable_paging(self) -> ModeTransition<'m, M, PagingEnabled> {
        // SAFETY: PAE, CR3 and LME are in place and the running code is identity mapped.
        unsafe {
            let cr0 = self.machine.read_cr0();
            self.machine
                .write_cr0(cr0.with_pe_protection_enable(true).with_pg_paging(true));
        }
        debug!("CR0.PG set; compatibility mode active");
        self.advance(PagingEnabled)
    }
}

impl<M: Machine + ?Sized> ModeTransition<'_, M, PagingEnabled> {
    /// Far jump through [`CODE64_SELECTOR`] into the stub at `stub`.
    ///
    /// # Safety
    /// `stub` must hold the 64-bit transition stub and `args.entry` a loaded
    /// kernel entry point.
    pub unsafe fn jump_to_stub(self, stub: PhysicalAddress, args: StubArguments) -> ! {
        debug!(
            "Jumping to stub at {stub} (entry {}, boot info {})",
            args.entry, args.boot_info
        );
        let target = FarPointer {
            selector: CODE64_SELECTOR,
            offset: stub,
        };
        unsafe { self.machine.far_jump(target, args) }
    }
}

impl<'m, M: Machine + ?Sized, S> ModeTransition<'m, M, S> {
    fn advance<T>(self, state: T) -> ModeTransition<'m, M, T> {
        ModeTransition {
            machine: self.machine,
            state,
        }
    }
}

/// Run the whole transition and jump to the stub.
///
/// # Safety
/// See [`ModeTransition::begin`] and [`ModeTransition::jump_to_stub`];
/// `root` must be a built identity map.
pub unsafe fn enter_long_mode<M: Machine + ?Sized>(
    machine: &mut M,
    root: PhysicalPage<Size4K>,
    stub: PhysicalAddress,
    args: StubArguments,
) -> ! {
    unsafe {
        ModeTransition::begin(machine)
            .load_segments(&gdt::TRANSITION_GDT)
            .configure_paging(root)
            .enable_pae()
            .install_page_table()
            .enable_long_mode()
            .enable_paging()
            .jump_to_stub(stub, args)
    }
}
