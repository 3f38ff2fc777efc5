//! This crate implements a general-purpose dynamic memory allocator on top of
//! a single-direction heap-growth primitive, i.e., the program break moved by
//! `sbrk(2)`.
//!
//!  - **It needs nothing but a break.** The memory comes from a
//!    [`HeapSource`], which can grow or shrink a contiguous region at its
//!    upper end. [`Sbrk`] is the real thing; [`SliceHeap`] simulates one over a
//!    caller-provided memory pool.
//!
//!  - **Three placement strategies.** Free blocks are kept in an unordered
//!    list searched by first-fit, best-fit, or worst-fit, chosen by [`Fit`]
//!    at construction time.
//!
//!  - **Memory goes back to the system.** A freed block at the top of the
//!    heap is returned to the heap source if it's large enough. Other freed
//!    blocks are coalesced with an adjacent free block where possible.
//!
//!  - **This crate supports `#![no_std]`.** [`GlobalBrkAlloc`] (Unix only)
//!    wraps the allocator in a mutex for use as `#[global_allocator]`, and
//!    the `brkalloc_override` crate exports it as the C `malloc` family.
//!
//! Each allocation carries a [`HEADER_SIZE`]-byte header and is aligned to
//! [`GRANULARITY`]. Larger alignments are only available through
//! [`GlobalBrkAlloc`]'s `GlobalAlloc` implementation.
//!
//! # Examples
//!
//! ```rust
//! use brkalloc::{BrkAlloc, Options, SliceHeap};
//! use std::mem::MaybeUninit;
//!
//! let mut pool = [MaybeUninit::uninit(); 65536];
//! let mut alloc = BrkAlloc::new(SliceHeap::new(&mut pool), Options::default());
//!
//! unsafe {
//!     let mut ptr1 = alloc.allocate(8).unwrap().cast::<u64>();
//!     let mut ptr2 = alloc.allocate_zeroed(1, 8).unwrap().cast::<u64>();
//!     *ptr1.as_mut() = 42;
//!     assert_eq!(*ptr2.as_ref(), 0);
//!     *ptr2.as_mut() = 56;
//!     assert_eq!(*ptr1.as_ref(), 42);
//!     assert_eq!(*ptr2.as_ref(), 56);
//!     alloc.deallocate(Some(ptr1.cast()));
//!     alloc.deallocate(Some(ptr2.cast()));
//! }
//!
//! assert_eq!(alloc.stats().mallocs, 2);
//! assert_eq!(alloc.stats().frees, 2);
//! ```
//!
//! # Cargo features
//!
//!  - `std`: Implements `std::error::Error` for [`AllocError`].
//!  - `log`: Emits `log::trace!` records from the allocator internals. Don't
//!    enable this if the logger itself allocates from a [`GlobalBrkAlloc`].
//!  - `doc_cfg`: Documentation niceties. Requires a nightly compiler.
#![no_std]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

#[macro_use]
mod init;

macro_rules! trace {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        {
            log::trace!($($tt)*);
        }
    };
}

/// Attaches `#[cfg(...)]` and `#[doc(cfg(...))]` to a given item definition
/// to conditionally compile it only when we have a `GlobalBrkAlloc`
/// implementation for the current target.
macro_rules! if_supported_target {
    (
        $($tt:tt)*
    ) => {
        #[cfg(unix)]
        #[cfg_attr(feature = "doc_cfg", doc(cfg(unix)))]
        $($tt)*
    };
}

mod alloc;
mod block;
mod free_list;
mod source;
mod stats;
mod utils;
pub use self::{
    alloc::{AllocError, BrkAlloc, Options, DEFAULT_TRIM_THRESHOLD},
    block::{GRANULARITY, HEADER_SIZE},
    free_list::Fit,
    init::*,
    source::*,
    stats::{Counter, Iter as StatsIter, Stats},
};

if_supported_target! { mod global; }
if_supported_target! { pub use self::global::*; }

#[cfg(any(test, feature = "std"))]
extern crate std;
