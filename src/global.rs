use core::{
    alloc,
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    ops,
    ptr::{self, NonNull},
};

use crate::{BrkAlloc, Fit, Init, Options, Stats, DEFAULT_TRIM_THRESHOLD, GRANULARITY};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use self::unix as os;

/// Compile-time parameters of [`GlobalBrkAlloc`].
pub trait GlobalOptions {
    /// The placement strategy.
    const FIT: Fit;

    /// See [`Options::trim_threshold`].
    const TRIM_THRESHOLD: usize = DEFAULT_TRIM_THRESHOLD;
}

/// [`GlobalOptions`] selecting [`Fit::First`].
#[derive(Debug)]
pub enum FirstFit {}

/// [`GlobalOptions`] selecting [`Fit::Best`].
#[derive(Debug)]
pub enum BestFit {}

/// [`GlobalOptions`] selecting [`Fit::Worst`].
#[derive(Debug)]
pub enum WorstFit {}

impl GlobalOptions for FirstFit {
    const FIT: Fit = Fit::First;
}

impl GlobalOptions for BestFit {
    const FIT: Fit = Fit::Best;
}

impl GlobalOptions for WorstFit {
    const FIT: Fit = Fit::Worst;
}

type TheAlloc = BrkAlloc<os::Source>;

// `doc(cfg(...))` needs to be attached to the type for it to be displayed
// on the docs.
if_supported_target! {
    /// [`BrkAlloc`] on the program break, protected by a mutex.
    ///
    /// All instances share the program break and the mutex. A process
    /// should have only one.
    ///
    /// Through [`GlobalAlloc`](core::alloc::GlobalAlloc), layouts aligned
    /// beyond [`GRANULARITY`] are served by over-allocating and storing the
    /// block's address in the word preceding the returned pointer.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use brkalloc::{GlobalBrkAlloc, BestFit};
    ///
    /// #[global_allocator]
    /// static A: GlobalBrkAlloc<BestFit> = GlobalBrkAlloc::new();
    ///
    /// let v = vec![1u32, 2, 3];
    /// assert!(A.stats().mallocs >= 1);
    /// # drop(v);
    /// ```
    pub struct GlobalBrkAlloc<O: GlobalOptions = FirstFit> {
        inner: UnsafeCell<TheAlloc>,
        mutex: os::Mutex,
        _phantom: PhantomData<fn() -> O>,
    }
}

impl<O: GlobalOptions> Init for GlobalBrkAlloc<O> {
    const INIT: Self = Self::new();
}

unsafe impl<O: GlobalOptions> Send for GlobalBrkAlloc<O> {}
unsafe impl<O: GlobalOptions> Sync for GlobalBrkAlloc<O> {}

impl<O: GlobalOptions> fmt::Debug for GlobalBrkAlloc<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Formatting may allocate, so don't hold the lock while doing it
        let stats = self.stats();
        f.debug_struct("GlobalBrkAlloc")
            .field("options", &Self::OPTIONS)
            .field("stats", &stats)
            .finish()
    }
}

impl<O: GlobalOptions> GlobalBrkAlloc<O> {
    /// The options the allocator is constructed with.
    pub const OPTIONS: Options = Options {
        fit: O::FIT,
        trim_threshold: O::TRIM_THRESHOLD,
    };

    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(BrkAlloc::new(Init::INIT, Self::OPTIONS)),
            mutex: Init::INIT,
            _phantom: PhantomData,
        }
    }

    #[inline]
    fn lock_inner(&self) -> impl ops::DerefMut<Target = TheAlloc> + '_ {
        struct LockGuard<'a, O: GlobalOptions>(&'a GlobalBrkAlloc<O>);

        impl<O: GlobalOptions> ops::Deref for LockGuard<'_, O> {
            type Target = TheAlloc;

            #[inline]
            fn deref(&self) -> &Self::Target {
                // Safety: Protected by `mutex`
                unsafe { &*self.0.inner.get() }
            }
        }

        impl<O: GlobalOptions> ops::DerefMut for LockGuard<'_, O> {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                // Safety: Protected by `mutex`
                unsafe { &mut *self.0.inner.get() }
            }
        }

        impl<O: GlobalOptions> Drop for LockGuard<'_, O> {
            #[inline]
            fn drop(&mut self) {
                self.0.mutex.unlock();
            }
        }

        self.mutex.lock();
        LockGuard(self)
    }

    /// See [`BrkAlloc::allocate`].
    #[inline]
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.lock_inner().allocate(size)
    }

    /// See [`BrkAlloc::deallocate`].
    ///
    /// # Safety
    ///
    /// See [`BrkAlloc::deallocate`].
    #[inline]
    pub unsafe fn deallocate(&self, ptr: Option<NonNull<u8>>) {
        self.lock_inner().deallocate(ptr)
    }

    /// See [`BrkAlloc::allocate_zeroed`].
    #[inline]
    pub fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        self.lock_inner().allocate_zeroed(count, size)
    }

    /// See [`BrkAlloc::reallocate`].
    ///
    /// # Safety
    ///
    /// See [`BrkAlloc::reallocate`].
    #[inline]
    pub unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        self.lock_inner().reallocate(ptr, new_size)
    }

    /// See [`BrkAlloc::usable_size`].
    ///
    /// # Safety
    ///
    /// See [`BrkAlloc::usable_size`].
    #[inline]
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        self.lock_inner().usable_size(ptr)
    }

    /// Get a snapshot of the statistics.
    #[inline]
    pub fn stats(&self) -> Stats {
        *self.lock_inner().stats()
    }

    /// See [`BrkAlloc::free_list_len`].
    #[inline]
    pub fn free_list_len(&self) -> usize {
        self.lock_inner().free_list_len()
    }
}

impl<O: GlobalOptions> GlobalBrkAlloc<O> {
    /// Allocate a block for `layout` whose alignment exceeds [`GRANULARITY`].
    ///
    /// The block is over-allocated by `layout.align()` bytes. The returned
    /// address is the first suitably aligned one past a word-sized slot, and
    /// that slot holds the address the underlying allocator handed out.
    unsafe fn allocate_overaligned(&self, layout: alloc::Layout) -> *mut u8 {
        let align = layout.align();
        debug_assert!(align > GRANULARITY);

        let size = match layout.size().checked_add(align) {
            Some(x) => x,
            None => return ptr::null_mut(),
        };
        let base = match self.allocate(size) {
            Some(x) => x.as_ptr(),
            None => return ptr::null_mut(),
        };

        // `base` is `GRANULARITY`-aligned, so the gap is in
        // `GRANULARITY..=align` and never reaches past the block.
        let slot = base as usize + core::mem::size_of::<*mut u8>();
        let offset = ((slot + align - 1) & !(align - 1)) - base as usize;
        debug_assert!(offset <= align);
        let ptr = base.add(offset);

        (ptr as *mut *mut u8).sub(1).write(base);
        ptr
    }

    /// Recover the address [`Self::allocate_overaligned`] got from the
    /// underlying allocator.
    #[inline]
    unsafe fn overaligned_base(ptr: *mut u8) -> *mut u8 {
        (ptr as *mut *mut u8).sub(1).read()
    }
}

unsafe impl<O: GlobalOptions> alloc::GlobalAlloc for GlobalBrkAlloc<O> {
    #[inline]
    unsafe fn alloc(&self, layout: alloc::Layout) -> *mut u8 {
        if layout.align() > GRANULARITY {
            return self.allocate_overaligned(layout);
        }
        self.allocate(layout.size())
            .map(NonNull::as_ptr)
            .unwrap_or(ptr::null_mut())
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: alloc::Layout) -> *mut u8 {
        if layout.align() > GRANULARITY {
            let ptr = self.allocate_overaligned(layout);
            if !ptr.is_null() {
                ptr.write_bytes(0, layout.size());
            }
            return ptr;
        }
        self.allocate_zeroed(1, layout.size())
            .map(NonNull::as_ptr)
            .unwrap_or(ptr::null_mut())
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: alloc::Layout) {
        if layout.align() > GRANULARITY {
            self.deallocate(NonNull::new(Self::overaligned_base(ptr)));
        } else {
            self.deallocate(NonNull::new(ptr));
        }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: alloc::Layout, new_size: usize) -> *mut u8 {
        if layout.align() > GRANULARITY {
            // The offset to the aligned address may differ in a moved block,
            // so always start over
            let new_layout = match alloc::Layout::from_size_align(new_size, layout.align()) {
                Ok(x) => x,
                Err(_) => return ptr::null_mut(),
            };
            let new_ptr = self.allocate_overaligned(new_layout);
            if !new_ptr.is_null() {
                ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
                self.dealloc(ptr, layout);
            }
            return new_ptr;
        }
        self.reallocate(NonNull::new(ptr), new_size)
            .map(NonNull::as_ptr)
            .unwrap_or(ptr::null_mut())
    }
}
