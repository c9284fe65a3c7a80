//! # Boot Services Pool Allocator
//!
//! Backs `alloc` (file buffers, path conversion) with `AllocatePool`. Every
//! allocation is `LOADER_DATA`, which firmware leaves alone after
//! `ExitBootServices`, so leaked buffers stay valid for the kernel.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull, null_mut};
use uefi::boot::{self, MemoryType};

/// A UEFI Boot Services pool allocation to back Rust's global allocator.
///
/// # Notes
/// - Valid only while Boot Services are active (before `ExitBootServices`).
/// - Over-allocates to satisfy alignment and stores the pool pointer just
///   before the returned block for deallocation.
pub struct UefiBootAllocator;

#[global_allocator]
static GLOBAL_ALLOC: UefiBootAllocator = UefiBootAllocator;

unsafe impl GlobalAlloc for UefiBootAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let align = layout.align().max(size_of::<usize>());
        let size = layout.size().max(1);
        let Some(total) = size
            .checked_add(align)
            .and_then(|v| v.checked_add(size_of::<usize>()))
        else {
            return null_mut();
        };

        let Ok(raw) = boot::allocate_pool(MemoryType::LOADER_DATA, total) else {
            return null_mut();
        };

        let raw = raw.as_ptr();
        let offset = (raw.addr() + size_of::<usize>()).next_multiple_of(align) - raw.addr();

        // SAFETY: `offset <= align + size_of::<usize>()`, inside the allocation,
        // and the header slot ends where the returned block starts.
        unsafe {
            let block = raw.add(offset);
            block
                .sub(size_of::<usize>())
                .cast::<*mut u8>()
                .write_unaligned(raw);
            block
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if ptr.is_null() {
            return;
        }

        // SAFETY: `alloc` stored the pool pointer right before `ptr`.
        let raw = unsafe { ptr.sub(size_of::<usize>()).cast::<*mut u8>().read_unaligned() };
        if let Some(raw) = NonNull::new(raw) {
            // SAFETY: `raw` came from `allocate_pool`.
            let _ = unsafe { boot::free_pool(raw) };
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let p = unsafe { self.alloc(layout) };
        if !p.is_null() {
            unsafe { ptr::write_bytes(p, 0, layout.size()) };
        }
        p
    }
}
