//! Providers of the program break the allocator is built on
use core::{marker::PhantomData, mem::MaybeUninit, ptr::NonNull};

use crate::{
    block::GRANULARITY,
    utils::{nonnull_slice_len, nonnull_slice_start},
};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod sbrk;
        pub use self::sbrk::Sbrk;
    }
}

/// A contiguous memory region whose upper end (the *break*) moves in one
/// direction at a time.
///
/// This is the only capability [`BrkAlloc`] consumes from its environment.
///
/// [`BrkAlloc`]: crate::BrkAlloc
///
/// # Safety
///
/// An implementation must meet the following requirements:
///
///  - When `grow(n)` succeeds, it returns the break prior to the call and the
///    `n` bytes starting there become exclusively owned by the caller until
///    they are given back by `shrink`.
///
///  - If `n` is a multiple of [`GRANULARITY`], the returned break is aligned
///    to [`GRANULARITY`].
///
///  - `grow` and `shrink` either complete fully or leave the break untouched.
///
///  - `current_break` reports the address one past the last byte handed out
///    by `grow` whenever the most recent `grow` was made through `self` and no
///    third party has moved the break since.
pub unsafe trait HeapSource {
    /// Get the current break.
    fn current_break(&self) -> *mut u8;

    /// Move the break up by `increment` bytes, returning the old break.
    /// Returns `None` if no more memory is available.
    ///
    /// # Safety
    ///
    /// `increment` must be a multiple of [`GRANULARITY`].
    unsafe fn grow(&mut self, increment: usize) -> Option<NonNull<u8>>;

    /// Move the break down by `decrement` bytes. Returns `false` if the break
    /// did not move.
    ///
    /// # Safety
    ///
    /// The `decrement` bytes below the current break must have been obtained
    /// from `self.grow` and must not be used anymore.
    unsafe fn shrink(&mut self, decrement: usize) -> bool;
}

/// A simulated break over a caller-provided memory pool.
///
/// The break starts at the pool's first [`GRANULARITY`]-aligned byte and can
/// never move past the pool's end.
///
/// # Examples
///
/// ```
/// use brkalloc::{HeapSource, SliceHeap};
/// use std::mem::MaybeUninit;
///
/// let mut pool = [MaybeUninit::uninit(); 1024];
/// let mut heap = SliceHeap::new(&mut pool);
/// let start = heap.current_break();
///
/// unsafe {
///     assert_eq!(heap.grow(64).map(|p| p.as_ptr()), Some(start));
///     assert_eq!(heap.used(), 64);
///     assert!(heap.shrink(64));
/// }
/// assert_eq!(heap.current_break(), start);
/// ```
#[derive(Debug)]
pub struct SliceHeap<'pool> {
    start: NonNull<u8>,
    len: usize,
    brk: usize,
    _phantom: PhantomData<&'pool mut [MaybeUninit<u8>]>,
}

// Safety: `SliceHeap` exclusively borrows its pool
unsafe impl Send for SliceHeap<'_> {}

impl<'pool> SliceHeap<'pool> {
    /// Construct a `SliceHeap` over `pool`.
    #[inline]
    pub fn new(pool: &'pool mut [MaybeUninit<u8>]) -> Self {
        // Safety: `pool` is a mutable reference, which guarantees the absence
        // of aliasing references. Being `'pool` means it will outlive `self`.
        unsafe {
            Self::from_ptr(NonNull::new_unchecked(
                pool as *mut [MaybeUninit<u8>] as *mut [u8],
            ))
        }
    }

    /// Construct a `SliceHeap` over the memory region specified by a slice
    /// pointer.
    ///
    /// # Safety
    ///
    /// The memory region will be considered owned by `self`. It must outlive
    /// `self`.
    pub unsafe fn from_ptr(pool: NonNull<[u8]>) -> Self {
        let len = nonnull_slice_len(pool);
        let unaligned_start = nonnull_slice_start(pool);

        // Round up the starting address
        let pad = unaligned_start.as_ptr().align_offset(GRANULARITY);
        let (start, len) = if pad <= len {
            (
                NonNull::new_unchecked(unaligned_start.as_ptr().add(pad)),
                (len - pad) & !(GRANULARITY - 1),
            )
        } else {
            // The pool is too small to contain even one aligned byte
            (unaligned_start, 0)
        };

        Self {
            start,
            len,
            brk: 0,
            _phantom: PhantomData,
        }
    }

    /// Get the number of bytes currently below the break.
    #[inline]
    pub fn used(&self) -> usize {
        self.brk
    }

    /// Get the number of bytes the break can move over.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Get the lowest address the break can take.
    #[inline]
    pub fn start(&self) -> NonNull<u8> {
        self.start
    }
}

unsafe impl HeapSource for SliceHeap<'_> {
    #[inline]
    fn current_break(&self) -> *mut u8 {
        self.start.as_ptr().wrapping_add(self.brk)
    }

    #[inline]
    unsafe fn grow(&mut self, increment: usize) -> Option<NonNull<u8>> {
        debug_assert_eq!(increment % GRANULARITY, 0);
        if increment > self.len - self.brk {
            return None;
        }

        let old_break = NonNull::new_unchecked(self.start.as_ptr().add(self.brk));
        self.brk += increment;
        Some(old_break)
    }

    #[inline]
    unsafe fn shrink(&mut self, decrement: usize) -> bool {
        if decrement > self.brk {
            return false;
        }
        self.brk -= decrement;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn slice_heap_aligns_start() {
        let mut pool = [MaybeUninit::uninit(); 256];
        for offset in 0..GRANULARITY {
            let heap = SliceHeap::new(&mut pool[offset..]);
            assert_eq!(heap.start().as_ptr() as usize % GRANULARITY, 0);
            assert_eq!(heap.capacity() % GRANULARITY, 0);
            assert!(heap.capacity() > 256 - offset - 2 * GRANULARITY);
            assert_eq!(heap.current_break(), heap.start().as_ptr());
        }
    }

    #[test]
    fn slice_heap_exhaustion() {
        let mut pool = [MaybeUninit::uninit(); 256];
        let mut heap = SliceHeap::new(&mut pool);
        let cap = heap.capacity();
        let mut breaks = Vec::new();
        unsafe {
            while let Some(p) = heap.grow(GRANULARITY) {
                breaks.push(p);
            }
            assert_eq!(heap.used(), cap);
            assert_eq!(breaks.len(), cap / GRANULARITY);
            assert!(heap.grow(GRANULARITY).is_none());
            assert_eq!(heap.used(), cap);

            assert!(!heap.shrink(cap + GRANULARITY));
            assert!(heap.shrink(cap));
            assert_eq!(heap.used(), 0);
        }
    }

    #[test]
    fn slice_heap_tiny_pool() {
        let mut pool = [MaybeUninit::uninit(); 1];
        let mut heap = SliceHeap::new(&mut pool);
        assert_eq!(heap.capacity(), 0);
        assert!(unsafe { heap.grow(GRANULARITY) }.is_none());
    }
}
