//! Overrides C memory allocation functions with [`::brkalloc`].
//!
//! Link this crate into a program (or `LD_PRELOAD` the `cdylib`) to have
//! `malloc`, `free`, `calloc`, `realloc` and friends served by a
//! [`GlobalBrkAlloc`]. The same instance is registered as Rust's
//! `#[global_allocator]`.
use brkalloc::{GlobalBrkAlloc, GRANULARITY};
use std::{
    os::raw::{c_int, c_void},
    ptr::{null_mut, NonNull},
};

#[global_allocator]
pub static ALLOC: GlobalBrkAlloc = GlobalBrkAlloc::new();

#[inline]
fn into_raw(ptr: Option<NonNull<u8>>) -> *mut c_void {
    ptr.map_or(null_mut(), |p| p.as_ptr() as *mut c_void)
}

#[no_mangle]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    into_raw(ALLOC.allocate(size))
}

#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    ALLOC.deallocate(NonNull::new(ptr.cast()));
}

#[no_mangle]
pub unsafe extern "C" fn calloc(number: usize, size: usize) -> *mut c_void {
    into_raw(ALLOC.allocate_zeroed(number, size))
}

#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    into_raw(ALLOC.reallocate(NonNull::new(ptr.cast()), size))
}

#[no_mangle]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    if let Some(ptr) = NonNull::new(ptr) {
        ALLOC.usable_size(ptr.cast())
    } else {
        0
    }
}

/// Every allocation is aligned to `GRANULARITY` and no more, so that's all we
/// can offer.
#[inline]
fn is_supported_alignment(alignment: usize) -> bool {
    alignment.is_power_of_two() && alignment <= GRANULARITY
}

#[no_mangle]
pub unsafe extern "C" fn aligned_alloc(alignment: usize, size: usize) -> *mut c_void {
    if is_supported_alignment(alignment) {
        malloc(size)
    } else {
        null_mut()
    }
}

#[no_mangle]
pub unsafe extern "C" fn memalign(alignment: usize, size: usize) -> *mut c_void {
    aligned_alloc(alignment, size)
}

#[no_mangle]
pub unsafe extern "C" fn posix_memalign(
    out_ptr: *mut *mut c_void,
    alignment: usize,
    size: usize,
) -> c_int {
    if !alignment.is_power_of_two() || alignment % std::mem::size_of::<*mut c_void>() != 0 {
        return libc::EINVAL;
    }

    let ptr = aligned_alloc(alignment, size);
    if ptr.is_null() && size != 0 {
        return libc::ENOMEM;
    }

    *out_ptr = ptr;
    0
}
