//! The free list
use core::{fmt, iter::FusedIterator, marker::PhantomData};

use crate::{
    block::{Block, Link, Links},
    stats::Stats,
    Init,
};

/// The placement strategy used to pick a free block for a request.
///
/// Note that the strategies disagree on which field of a free block they
/// look at. `First` accepts a block whose *capacity* covers the request,
/// whereas `Best` and `Worst` accept a block whose recorded *size* (the
/// request of its most recent occupant, or the whole capacity for a split
/// remainder) covers it. The latter two can therefore pass over a block that
/// `First` would take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fit {
    /// The first block in list order.
    First,
    /// The block with the smallest sufficient size. The earliest one wins
    /// ties.
    Best,
    /// The block with the largest sufficient size. The earliest one wins
    /// ties.
    Worst,
}

impl Init for Fit {
    const INIT: Self = Fit::First;
}

impl_const_default_via_init!(Fit);

impl Default for Fit {
    #[inline]
    fn default() -> Self {
        Self::INIT
    }
}

/// An unordered doubly linked list of free blocks, anchored by a sentinel
/// that lives outside the heap.
pub(crate) struct FreeList {
    anchor: Links,
}

impl Init for FreeList {
    const INIT: Self = Self {
        anchor: Links::EMPTY,
    };
}

impl fmt::Debug for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Safety: Every linked block is valid as long as `self` is
        f.debug_list().entries(unsafe { self.iter() }).finish()
    }
}

impl FreeList {
    /// Iterate over the blocks in list order.
    ///
    /// # Safety
    ///
    /// Every block on the list must be valid, and the list must not be
    /// modified while the iterator is alive.
    #[inline]
    pub unsafe fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.anchor.next,
            _phantom: PhantomData,
        }
    }

    /// Count the blocks on the list.
    ///
    /// # Safety
    ///
    /// See [`Self::iter`].
    #[inline]
    pub unsafe fn len(&self) -> usize {
        self.iter().count()
    }

    /// Find a block for a `size`-byte request according to `fit`.
    ///
    /// The block stays on the list. Counts a reuse on a hit.
    ///
    /// # Safety
    ///
    /// See [`Self::iter`].
    pub unsafe fn search(&self, fit: Fit, size: usize, stats: &mut Stats) -> Option<Block> {
        let found = match fit {
            Fit::First => self.iter().find(|block| block.capacity() >= size),
            Fit::Best => self
                .iter()
                .filter(|block| block.size() >= size)
                .fold(None, |best: Option<Block>, block| match best {
                    Some(best) if block.size() >= best.size() => Some(best),
                    _ => Some(block),
                }),
            Fit::Worst => self
                .iter()
                .filter(|block| block.size() >= size)
                .fold(None, |worst: Option<Block>, block| match worst {
                    Some(worst) if block.size() <= worst.size() => Some(worst),
                    _ => Some(block),
                }),
        };

        if found.is_some() {
            stats.reuses += 1;
        }

        trace!("search({:?}, {}) = {:?}", fit, size, found);

        found
    }

    /// Put a freed block on the list.
    ///
    /// The list is scanned for a block that is adjacent to `block` in memory.
    /// The first one found is coalesced with `block`, and the result takes
    /// over the list position of the existing member. Only one merge happens
    /// per call. If no member is adjacent, `block` is appended to the tail.
    ///
    /// # Safety
    ///
    /// `block` must be a valid detached block not on the list. Every block
    /// on the list must be valid.
    pub unsafe fn insert(&mut self, block: Block, stats: &mut Stats) {
        debug_assert!(block.is_detached());

        let mut cursor = self.anchor.next;
        while let Some(hdr) = cursor {
            let curr = Block::from_link(hdr);
            cursor = curr.links().next;

            if curr.merge(block, stats) {
                // `curr` keeps its position
                trace!("insert({:?}): merged into {:?}", block, curr);
                return;
            }

            if block.merge(curr, stats) {
                block.take_place_of(&mut self.anchor, curr);
                trace!("insert({:?}): absorbed {:?}", block, curr);
                return;
            }
        }

        block.append(&mut self.anchor);
        trace!("insert({:?}): appended", block);
    }

    /// Unlink `block` from the list. See [`Block::detach`].
    ///
    /// # Safety
    ///
    /// `block` must be a valid block that is on the list or detached.
    #[inline]
    pub unsafe fn detach(&mut self, block: Block) {
        block.detach(&mut self.anchor);
    }

    /// Split `block` in place. See [`Block::split`].
    ///
    /// # Safety
    ///
    /// `block` must be a valid block on the list with a capacity of at least
    /// `size` bytes.
    #[inline]
    pub unsafe fn split(&mut self, block: Block, stats: &mut Stats, size: usize) -> Block {
        block.split(&mut self.anchor, stats, size)
    }
}

/// Iterator returned by [`FreeList::iter`].
pub(crate) struct Iter<'a> {
    next: Link,
    _phantom: PhantomData<&'a FreeList>,
}

impl Iterator for Iter<'_> {
    type Item = Block;

    #[inline]
    fn next(&mut self) -> Option<Block> {
        let block = Block::from_link(self.next?);
        // Safety: Upheld by the caller of `FreeList::iter`
        self.next = unsafe { block.links().next };
        Some(block)
    }
}

impl FusedIterator for Iter<'_> {}
