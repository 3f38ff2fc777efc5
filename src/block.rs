//! Block headers and the primitive operations on them
use core::{mem, ptr::NonNull};

use crate::{source::HeapSource, stats::Stats, utils::align_up};

/// The allocation granularity.
///
/// It is `size_of::<usize>() * 2` bytes. Every block's capacity is a multiple
/// of this, and so is every payload address handed out by [`BrkAlloc`].
///
/// [`BrkAlloc`]: crate::BrkAlloc
pub const GRANULARITY: usize = mem::size_of::<usize>() * 2;

/// The size of the header preceding every payload.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHdr>();

const _: () = assert!(HEADER_SIZE % GRANULARITY == 0);

/// A free list link. `None` designates the list's anchor.
pub(crate) type Link = Option<NonNull<BlockHdr>>;

/// A pair of free list links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub prev: Link,
    pub next: Link,
}

impl Links {
    /// The links of an empty list's anchor.
    pub const EMPTY: Self = Self {
        prev: None,
        next: None,
    };
}

#[doc = svgbobdoc::transform!(
/// The header of a memory block.
///
/// ```svgbob
///      Block
///   ,-----------+----------+-------+-------+------------------------------,
///   | capacity  |   size   | prev  | next  |  payload                     |
///   '-----------+----------+-------+-------+------------------------------'
///   ^                                      ^                              ^
///   |                                      |                              |
///   Block::addr                       Block::data                   Block::end
///                                          |<-------- capacity ---------->|
/// ```
///
/// `prev` and `next` are only meaningful while the block is on the free list.
/// Otherwise, they both point to the block itself.
)]
#[repr(C)]
#[derive(Debug)]
pub(crate) struct BlockHdr {
    /// The payload size. A multiple of [`GRANULARITY`].
    capacity: usize,
    /// The size requested by the current or most recent occupant. Never
    /// exceeds `capacity`.
    size: usize,
    links: Links,
}

/// A handle to a block header living in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(NonNull<BlockHdr>);

/// Get a mutable reference to the links designated by `link`.
///
/// # Safety
///
/// `link` must be `None` or point to a valid block header that is not
/// otherwise borrowed.
#[inline]
unsafe fn links_mut<'a>(anchor: &'a mut Links, link: Link) -> &'a mut Links {
    match link {
        None => anchor,
        Some(hdr) => &mut (*hdr.as_ptr()).links,
    }
}

impl Block {
    /// Find the block owning a payload address.
    ///
    /// # Safety
    ///
    /// `data` must have been obtained from [`Block::data`].
    #[inline]
    pub unsafe fn from_data(data: NonNull<u8>) -> Self {
        Self(NonNull::new_unchecked(data.as_ptr().sub(HEADER_SIZE)).cast())
    }

    #[inline]
    pub fn from_link(hdr: NonNull<BlockHdr>) -> Self {
        Self(hdr)
    }

    #[inline]
    pub fn as_link(self) -> Link {
        Some(self.0)
    }

    /// The links of a block that is not on any list.
    #[inline]
    fn detached_links(self) -> Links {
        Links {
            prev: self.as_link(),
            next: self.as_link(),
        }
    }

    /// Get the header's address.
    #[inline]
    pub fn addr(self) -> *mut u8 {
        self.0.as_ptr() as *mut u8
    }

    /// Get the payload's address.
    #[inline]
    pub fn data(self) -> NonNull<u8> {
        // Safety: The header never ends at the top of the address space
        unsafe { NonNull::new_unchecked(self.addr().wrapping_add(HEADER_SIZE)) }
    }

    /// Get the address one past the end of the payload.
    ///
    /// # Safety
    ///
    /// `self` must point to a valid block header.
    #[inline]
    pub unsafe fn end(self) -> *mut u8 {
        self.data().as_ptr().wrapping_add(self.capacity())
    }

    /// # Safety
    ///
    /// `self` must point to a valid block header.
    #[inline]
    pub unsafe fn capacity(self) -> usize {
        (*self.0.as_ptr()).capacity
    }

    /// # Safety
    ///
    /// `self` must point to a valid block header.
    #[inline]
    pub unsafe fn size(self) -> usize {
        (*self.0.as_ptr()).size
    }

    /// # Safety
    ///
    /// `self` must point to a valid block header.
    #[inline]
    pub unsafe fn links(self) -> Links {
        (*self.0.as_ptr()).links
    }

    /// Check whether the block is self-linked, i.e., not on any list.
    ///
    /// # Safety
    ///
    /// `self` must point to a valid block header.
    #[inline]
    pub unsafe fn is_detached(self) -> bool {
        self.links() == self.detached_links()
    }

    /// # Safety
    ///
    /// `self` must point to a valid block header that is not otherwise
    /// borrowed for `'a`.
    #[inline]
    unsafe fn hdr_mut<'a>(self) -> &'a mut BlockHdr {
        &mut *self.0.as_ptr()
    }

    /// Carve a new block for `size` bytes out of fresh heap memory.
    ///
    /// Returns `None` if `source` is out of memory or the block size is not
    /// representable.
    ///
    /// # Safety
    ///
    /// The memory `source` hands out must not be owned by anyone else.
    pub unsafe fn grow<S: HeapSource>(
        source: &mut S,
        stats: &mut Stats,
        size: usize,
    ) -> Option<Self> {
        let capacity = align_up(size)?;
        let total = capacity.checked_add(HEADER_SIZE)?;

        let hdr = source.grow(total)?.cast::<BlockHdr>();
        debug_assert_eq!(hdr.as_ptr() as usize % GRANULARITY, 0);

        let block = Self(hdr);
        hdr.as_ptr().write(BlockHdr {
            capacity,
            size,
            links: block.detached_links(),
        });

        stats.heap_size += total;
        stats.blocks += 1;
        stats.grows += 1;

        trace!("grow({}) = {:?} (total = {})", size, block, total);
        Some(block)
    }

    /// Return the block's memory to `source` if the block is the last thing
    /// below the break and is at least `trim_threshold` bytes long, header
    /// included.
    ///
    /// Returns `true` if the memory was returned. `self` is invalidated in
    /// that case.
    ///
    /// # Safety
    ///
    /// `self` must be a detached block created by [`Self::grow`] on
    /// `source`.
    pub unsafe fn release<S: HeapSource>(
        self,
        source: &mut S,
        stats: &mut Stats,
        trim_threshold: usize,
    ) -> bool {
        let total = HEADER_SIZE + self.capacity();

        if total < trim_threshold || self.end() != source.current_break() {
            return false;
        }

        if !source.shrink(total) {
            return false;
        }

        stats.blocks -= 1;
        stats.shrinks += 1;
        stats.heap_size -= total;

        trace!("release({:?}) (total = {})", self, total);
        true
    }

    /// Remove the block from whatever list it is on and make it self-linked.
    /// Does nothing to a block that is already self-linked.
    ///
    /// # Safety
    ///
    /// `self` must point to a valid block header. If it is on a list, the list
    /// must be anchored by `anchor`.
    pub unsafe fn detach(self, anchor: &mut Links) {
        let Links { prev, next } = self.links();
        links_mut(anchor, prev).next = next;
        links_mut(anchor, next).prev = prev;
        self.hdr_mut().links = self.detached_links();
    }

    /// Link the detached block `self` in the place `old` occupies. `old` is
    /// left with stale links.
    ///
    /// # Safety
    ///
    /// `self` must be detached. `old` must be on the list anchored by
    /// `anchor`.
    pub unsafe fn take_place_of(self, anchor: &mut Links, old: Block) {
        let links = old.links();
        links_mut(anchor, links.prev).next = self.as_link();
        links_mut(anchor, links.next).prev = self.as_link();
        self.hdr_mut().links = links;
    }

    /// Link the detached block `self` at the tail of the list anchored by
    /// `anchor`.
    ///
    /// # Safety
    ///
    /// `self` must be detached, and every block on the list must be valid.
    pub unsafe fn append(self, anchor: &mut Links) {
        let tail = anchor.prev;
        self.hdr_mut().links = Links { prev: tail, next: None };
        links_mut(anchor, tail).next = self.as_link();
        anchor.prev = self.as_link();
    }

    /// Absorb `src` into `self` if `src` immediately follows `self` in
    /// memory. Returns `true` on success; leaves both blocks untouched
    /// otherwise.
    ///
    /// This is intentionally one-directional. To coalesce two blocks of
    /// unknown order, try both `a.merge(b)` and `b.merge(a)`.
    ///
    /// # Safety
    ///
    /// `self` and `src` must point to valid block headers. On success, `src`
    /// is invalidated, and the caller is responsible for unlinking it from
    /// any list it was on.
    pub unsafe fn merge(self, src: Block, stats: &mut Stats) -> bool {
        if src.addr() != self.end() {
            return false;
        }

        self.hdr_mut().capacity += HEADER_SIZE + src.capacity();

        stats.merges += 1;
        stats.blocks -= 1;

        trace!("merge({:?}, {:?}) (capacity = {})", self, src, self.capacity());
        true
    }

    /// Shrink the block to fit `size` bytes, turning the excess into a new
    /// block linked right after `self`. If the excess can't hold another
    /// header and a payload, only the recorded size changes.
    ///
    /// Returns `self`.
    ///
    /// # Safety
    ///
    /// `self` must point to a valid block header with a capacity of at least
    /// `size` bytes. If it is on a list, the list must be anchored by
    /// `anchor`.
    pub unsafe fn split(self, anchor: &mut Links, stats: &mut Stats, size: usize) -> Self {
        let capacity = self.capacity();
        debug_assert!(size <= capacity);

        // `size <= capacity`, and `capacity` is already aligned
        let aligned = align_up(size).unwrap_or(capacity);

        if capacity > HEADER_SIZE + aligned {
            let new_hdr = NonNull::new_unchecked(self.data().as_ptr().add(aligned)).cast();
            let new_block = Self(new_hdr);
            let new_capacity = capacity - HEADER_SIZE - aligned;
            let next = self.links().next;

            new_hdr.as_ptr().write(BlockHdr {
                capacity: new_capacity,
                size: new_capacity,
                links: Links {
                    prev: self.as_link(),
                    next,
                },
            });
            links_mut(anchor, next).prev = new_block.as_link();

            let hdr = self.hdr_mut();
            hdr.links.next = new_block.as_link();
            hdr.capacity = aligned;
            hdr.size = size;

            stats.splits += 1;
            stats.blocks += 1;

            trace!("split({:?}, {}) = {:?}", self, size, new_block);
        } else {
            self.hdr_mut().size = size;
        }

        self
    }
}
