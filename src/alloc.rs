//! The allocator context
use core::{fmt, ptr::NonNull};

use crate::{
    block::Block,
    free_list::{Fit, FreeList},
    source::HeapSource,
    stats::Stats,
    Init,
};

/// The default value of [`Options::trim_threshold`].
pub const DEFAULT_TRIM_THRESHOLD: usize = 1024;

/// Construction-time parameters of [`BrkAlloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Options {
    /// The placement strategy.
    pub fit: Fit,
    /// The minimum size (header included) of a freed block at the top of
    /// the heap for it to be returned to the heap source. Smaller blocks go
    /// to the free list instead.
    pub trim_threshold: usize,
}

impl Init for Options {
    const INIT: Self = Self {
        fit: Fit::INIT,
        trim_threshold: DEFAULT_TRIM_THRESHOLD,
    };
}

impl_const_default_via_init!(Options);

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self::INIT
    }
}

/// The reason an allocation request returned nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocError {
    /// A zero-byte request. Not a failure as such; there is simply nothing to
    /// hand out.
    ZeroSize,
    /// The heap source could not supply more memory, or the request size is
    /// not representable.
    OutOfMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocError::ZeroSize => "zero-sized allocation request",
            AllocError::OutOfMemory => "out of memory",
        })
    }
}

#[cfg(feature = "std")]
#[cfg_attr(feature = "doc_cfg", doc(cfg(feature = "std")))]
impl std::error::Error for AllocError {}

/// A first/best/worst-fit allocator on top of a [`HeapSource`].
///
/// Every allocation is a block: a header followed by a payload whose
/// capacity is rounded up to [`GRANULARITY`]. Fresh blocks are carved from
/// the top of the heap. Freed blocks are returned to the heap source if they
/// are at the top of the heap and large enough (see
/// [`Options::trim_threshold`]), or else put on a free list, where they are
/// coalesced with an adjacent free block if there is one.
///
/// `BrkAlloc` is not thread-safe by itself. See [`GlobalBrkAlloc`] for a
/// locked, process-wide instance.
///
/// [`GRANULARITY`]: crate::GRANULARITY
/// [`GlobalBrkAlloc`]: crate::GlobalBrkAlloc
///
/// # Examples
///
/// ```rust
/// use brkalloc::{BrkAlloc, Fit, Options, SliceHeap};
/// use std::mem::MaybeUninit;
///
/// let mut pool = [MaybeUninit::uninit(); 4096];
/// let options = Options { fit: Fit::Best, ..Options::default() };
/// let mut alloc = BrkAlloc::new(SliceHeap::new(&mut pool), options);
///
/// let ptr1 = alloc.allocate(100).unwrap();
/// let ptr2 = alloc.allocate(200).unwrap();
/// unsafe {
///     alloc.deallocate(Some(ptr1));
///     alloc.deallocate(Some(ptr2));
/// }
///
/// // The two blocks were coalesced
/// assert_eq!(alloc.free_list_len(), 1);
/// assert_eq!(alloc.stats().merges, 1);
/// ```
pub struct BrkAlloc<S> {
    source: S,
    free_list: FreeList,
    stats: Stats,
    options: Options,
}

// Safety: The blocks are owned by `BrkAlloc`
unsafe impl<S: Send> Send for BrkAlloc<S> {}

impl<S: Init> Init for BrkAlloc<S> {
    const INIT: Self = Self::new(S::INIT, Options::INIT);
}

impl<S: fmt::Debug> fmt::Debug for BrkAlloc<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrkAlloc")
            .field("source", &self.source)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .field("free_list", &self.free_list)
            .finish()
    }
}

impl<S> BrkAlloc<S> {
    /// Construct an allocator with nothing allocated yet.
    #[inline]
    pub const fn new(source: S, options: Options) -> Self {
        Self {
            source,
            free_list: FreeList::INIT,
            stats: Stats::INIT,
            options,
        }
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[inline]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Count the blocks on the free list.
    ///
    /// This walks the whole list.
    #[inline]
    pub fn free_list_len(&self) -> usize {
        // Safety: The free list only contains blocks owned by `self`
        unsafe { self.free_list.len() }
    }

    /// Get the number of bytes usable at `ptr`, which is at least the size
    /// it was allocated (or last reallocated) with.
    ///
    /// # Safety
    ///
    /// `ptr` must denote a live allocation made by `self`.
    #[inline]
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        Block::from_data(ptr).capacity()
    }
}

impl<S: HeapSource> BrkAlloc<S> {
    /// Allocate `size` bytes.
    ///
    /// The free list is searched first according to [`Options::fit`]. A block
    /// found there is split down to `size`. Otherwise, a new block is carved
    /// from the heap source.
    ///
    /// The returned pointer is aligned to [`GRANULARITY`].
    ///
    /// [`GRANULARITY`]: crate::GRANULARITY
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        // Safety: The free list only contains blocks owned by `self`, and
        //         `self.source` hands out memory that nobody else owns
        let block = unsafe {
            match self.free_list.search(self.options.fit, size, &mut self.stats) {
                Some(block) => {
                    let block = self.free_list.split(block, &mut self.stats, size);
                    self.free_list.detach(block);
                    block
                }
                None => Block::grow(&mut self.source, &mut self.stats, size)
                    .ok_or(AllocError::OutOfMemory)?,
            }
        };

        // Safety: `block` is valid
        unsafe {
            debug_assert!(block.capacity() >= block.size());
            debug_assert_eq!(block.size(), size);
            debug_assert!(block.is_detached());
        }

        self.stats.mallocs += 1;
        self.stats.requested = self.stats.requested.wrapping_add(size);

        Ok(block.data())
    }

    /// Allocate `size` bytes. Returns `None` if `size` is zero or the memory
    /// is exhausted.
    ///
    /// See [`Self::try_allocate`].
    #[inline]
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.try_allocate(size).ok()
    }

    /// Deallocate a previously allocated memory block. `None` is a no-op.
    ///
    /// The block is returned to the heap source if possible. Otherwise, it is
    /// put on the free list.
    ///
    /// # Safety
    ///
    ///  - `ptr` must denote a memory block previously allocated by `self`.
    ///  - The memory block must not have been deallocated already.
    pub unsafe fn deallocate(&mut self, ptr: Option<NonNull<u8>>) {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return,
        };

        let block = Block::from_data(ptr);
        self.stats.frees += 1;

        if !block.release(&mut self.source, &mut self.stats, self.options.trim_threshold) {
            self.free_list.insert(block, &mut self.stats);
        }
    }

    /// Allocate an array of `count` elements of `size` bytes each, all
    /// zero-filled.
    ///
    /// Returns `None` if either argument is zero, the total size overflows
    /// `usize`, or the memory is exhausted.
    ///
    /// `count * size` is checked: an overflowing product returns `None`.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Option<NonNull<u8>> {
        if count == 0 || size == 0 {
            return None;
        }

        let total = count.checked_mul(size)?;
        let ptr = self.allocate(total)?;

        // Safety: `ptr` points to at least `total` bytes
        unsafe { ptr.as_ptr().write_bytes(0, total) };

        self.stats.callocs += 1;
        Some(ptr)
    }

    /// Resize a previously allocated memory block.
    ///
    /// `None` behaves like [`Self::allocate`]. If the block's recorded size
    /// already covers `new_size`, `ptr` is returned as it is. Otherwise, the
    /// contents are moved to a new allocation, and the old one is
    /// deallocated.
    ///
    /// On failure, `None` is returned, and the original memory block remains
    /// valid.
    ///
    /// # Safety
    ///
    ///  - `ptr` must denote a memory block previously allocated by `self`.
    ///  - The memory block must not have been deallocated already.
    pub unsafe fn reallocate(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return self.allocate(new_size),
        };

        let old_size = Block::from_data(ptr).size();
        if old_size >= new_size {
            return Some(ptr);
        }

        let new_ptr = self.allocate(new_size)?;
        self.stats.reallocs += 1;

        // Safety: Two live allocations never overlap, and the new one is
        //         larger than `old_size`
        new_ptr
            .as_ptr()
            .copy_from_nonoverlapping(ptr.as_ptr(), old_size);
        self.deallocate(Some(ptr));

        Some(new_ptr)
    }
}
