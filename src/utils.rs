use core::ptr::NonNull;

use crate::block::GRANULARITY;

/// Round `size` up to a multiple of [`GRANULARITY`]. Returns `None` on
/// overflow.
#[inline]
pub const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(GRANULARITY - 1) {
        Some(x) => Some(x & !(GRANULARITY - 1)),
        None => None,
    }
}

/// Polyfill for <https://github.com/rust-lang/rust/issues/71146>
///
/// # Safety
///
/// `ptr` must be dereferencable. This is a limitation of the polyfill.
#[rustversion::before(1.63)]
#[inline]
pub unsafe fn nonnull_slice_len<T>(ptr: NonNull<[T]>) -> usize {
    use core::{cell::UnsafeCell, mem::MaybeUninit};
    // Safety: We are just reading the slice length embedded in the fat
    //         pointer and not dereferencing the pointer. We also convert it
    //         to `*mut [MaybeUninit<UnsafeCell<u8>>]` just in case because the
    //         slice might be uninitialized and there might be outstanding
    //         mutable references to the slice.
    (&*(ptr.as_ptr() as *const [MaybeUninit<UnsafeCell<T>>])).len()
}

/// Get the length of a slice pointer.
///
/// # Safety
///
/// None. The signature is kept `unsafe` to match the pre-1.63 polyfill.
#[rustversion::since(1.63)]
#[inline]
pub unsafe fn nonnull_slice_len<T>(ptr: NonNull<[T]>) -> usize {
    ptr.len()
}

// Polyfill for <https://github.com/rust-lang/rust/issues/74265>
#[inline]
pub fn nonnull_slice_start<T>(ptr: NonNull<[T]>) -> NonNull<T> {
    unsafe { NonNull::new_unchecked(ptr.as_ptr() as *mut T) }
}
