use core::{convert::TryFrom, ptr::NonNull};

use super::HeapSource;
use crate::{block::GRANULARITY, Init};

/// The process's program break, moved by `sbrk(2)`.
///
/// Other code in the process (e.g., the C library's own `malloc`) may move
/// the break as well. Blocks are then no longer contiguous, which the
/// allocator tolerates: a block is only returned to the system while it is
/// the last thing below the break.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk(());

impl Init for Sbrk {
    const INIT: Self = Self(());
}

impl_const_default_via_init!(Sbrk);

/// `sbrk` reports failure by returning `(void *) -1`.
#[inline]
fn is_failure(ptr: *mut libc::c_void) -> bool {
    ptr as usize == usize::MAX
}

unsafe impl HeapSource for Sbrk {
    #[inline]
    fn current_break(&self) -> *mut u8 {
        unsafe { libc::sbrk(0) as *mut u8 }
    }

    unsafe fn grow(&mut self, increment: usize) -> Option<NonNull<u8>> {
        let increment = libc::intptr_t::try_from(increment).ok()?;

        // Someone else might have left the break misaligned
        let pad = self.current_break().align_offset(GRANULARITY);
        if pad != 0 && is_failure(libc::sbrk(pad as libc::intptr_t)) {
            return None;
        }

        let old_break = libc::sbrk(increment);
        if is_failure(old_break) {
            return None;
        }

        // Someone else moved the break in the meantime. Giving the memory
        // back could release theirs, so it's leaked instead.
        if old_break as usize % GRANULARITY != 0 {
            return None;
        }

        NonNull::new(old_break as *mut u8)
    }

    #[inline]
    unsafe fn shrink(&mut self, decrement: usize) -> bool {
        match libc::intptr_t::try_from(decrement) {
            Ok(decrement) => !is_failure(libc::sbrk(-decrement)),
            Err(_) => false,
        }
    }
}
