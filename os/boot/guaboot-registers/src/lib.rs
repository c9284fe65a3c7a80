//! # Typed x86 Control Registers
//!
//! Bitfield models of the registers the loader touches on its way into long
//! mode: [`Cr0`](cr0::Cr0), [`Cr3`](cr3::Cr3), [`Cr4`](cr4::Cr4) and
//! [`Efer`](efer::Efer).
//!
//! The models are plain values and can be built and inspected anywhere,
//! including host tests. Moving them in and out of the CPU goes through
//! [`LoadRegisterUnsafe`] / [`StoreRegisterUnsafe`], implemented with inline
//! assembly when the `asm` feature is enabled and the target is `x86` or
//! `x86_64`. On `x86` the upper 32 bits of `CR0`, `CR3` and `CR4` do not
//! exist and are dropped on store.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

/// Implements the load/store traits for a control register with `mov`.
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
macro_rules! control_register_asm {
    ($ty:ty, $reg:literal) => {
        impl $crate::LoadRegisterUnsafe for $ty {
            unsafe fn load_unsafe() -> Self {
                let value: u64;
                unsafe {
                    core::arch::asm!(
                        concat!("mov {}, ", $reg),
                        out(reg) value,
                        options(nomem, nostack, preserves_flags)
                    );
                }
                Self::from_bits(value)
            }
        }

        impl $crate::StoreRegisterUnsafe for $ty {
            unsafe fn store_unsafe(self) {
                let value = self.into_bits();
                unsafe {
                    core::arch::asm!(
                        concat!("mov ", $reg, ", {}"),
                        in(reg) value,
                        options(nostack, preserves_flags)
                    );
                }
            }
        }
    };
}

/// Implements the load/store traits for a control register with `mov`.
///
/// Protected mode only has the low 32 bits.
#[cfg(all(feature = "asm", target_arch = "x86"))]
macro_rules! control_register_asm {
    ($ty:ty, $reg:literal) => {
        impl $crate::LoadRegisterUnsafe for $ty {
            unsafe fn load_unsafe() -> Self {
                let value: u32;
                unsafe {
                    core::arch::asm!(
                        concat!("mov {}, ", $reg),
                        out(reg) value,
                        options(nomem, nostack, preserves_flags)
                    );
                }
                Self::from_bits(u64::from(value))
            }
        }

        impl $crate::StoreRegisterUnsafe for $ty {
            #[allow(clippy::cast_possible_truncation)]
            unsafe fn store_unsafe(self) {
                let value = self.into_bits() as u32;
                unsafe {
                    core::arch::asm!(
                        concat!("mov ", $reg, ", {}"),
                        in(reg) value,
                        options(nostack, preserves_flags)
                    );
                }
            }
        }
    };
}

pub mod cr0;
pub mod cr3;
pub mod cr4;
pub mod efer;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register and MSR access is privileged and requires CPL 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register changes how every following instruction
    /// executes; an invalid combination resets the machine.
    unsafe fn store_unsafe(self);
}
