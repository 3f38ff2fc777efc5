//! Allocator statistics
use core::{fmt, iter::FusedIterator};

use crate::Init;

/// Running counters maintained by [`BrkAlloc`].
///
/// `heap_size` and `blocks` are gauges; everything else only ever grows.
///
/// [`BrkAlloc`]: crate::BrkAlloc
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Successful `allocate` calls, including the ones made on behalf of
    /// `allocate_zeroed` and `reallocate`.
    pub mallocs: usize,
    /// `deallocate` calls with a non-null pointer.
    pub frees: usize,
    /// Successful `allocate_zeroed` calls.
    pub callocs: usize,
    /// `reallocate` calls that moved the allocation.
    pub reallocs: usize,
    /// Total bytes requested by successful `allocate` calls.
    pub requested: usize,
    /// Bytes currently obtained from the heap source, headers included.
    pub heap_size: usize,
    /// Blocks currently carved out of the heap, free or not.
    pub blocks: usize,
    /// Times the break was moved up.
    pub grows: usize,
    /// Times the break was moved down.
    pub shrinks: usize,
    /// Blocks split in two.
    pub splits: usize,
    /// Pairs of adjacent blocks coalesced.
    pub merges: usize,
    /// Allocations served from the free list.
    pub reuses: usize,
}

impl Init for Stats {
    const INIT: Self = Self {
        mallocs: 0,
        frees: 0,
        callocs: 0,
        reallocs: 0,
        requested: 0,
        heap_size: 0,
        blocks: 0,
        grows: 0,
        shrinks: 0,
        splits: 0,
        merges: 0,
        reuses: 0,
    };
}

impl_const_default_via_init!(Stats);

/// Names a field of [`Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    Mallocs,
    Frees,
    Callocs,
    Reallocs,
    Requested,
    HeapSize,
    Blocks,
    Grows,
    Shrinks,
    Splits,
    Merges,
    Reuses,
}

impl Counter {
    /// Every counter, in declaration order.
    pub const ALL: [Counter; 12] = [
        Counter::Mallocs,
        Counter::Frees,
        Counter::Callocs,
        Counter::Reallocs,
        Counter::Requested,
        Counter::HeapSize,
        Counter::Blocks,
        Counter::Grows,
        Counter::Shrinks,
        Counter::Splits,
        Counter::Merges,
        Counter::Reuses,
    ];

    /// Get the counter's name as used by diagnostic output.
    pub const fn name(self) -> &'static str {
        match self {
            Counter::Mallocs => "mallocs",
            Counter::Frees => "frees",
            Counter::Callocs => "callocs",
            Counter::Reallocs => "reallocs",
            Counter::Requested => "requested",
            Counter::HeapSize => "heap_size",
            Counter::Blocks => "blocks",
            Counter::Grows => "grows",
            Counter::Shrinks => "shrinks",
            Counter::Splits => "splits",
            Counter::Merges => "merges",
            Counter::Reuses => "reuses",
        }
    }

    /// Look up a counter by [name](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Stats {
    /// Read a counter.
    #[inline]
    pub const fn get(&self, counter: Counter) -> usize {
        match counter {
            Counter::Mallocs => self.mallocs,
            Counter::Frees => self.frees,
            Counter::Callocs => self.callocs,
            Counter::Reallocs => self.reallocs,
            Counter::Requested => self.requested,
            Counter::HeapSize => self.heap_size,
            Counter::Blocks => self.blocks,
            Counter::Grows => self.grows,
            Counter::Shrinks => self.shrinks,
            Counter::Splits => self.splits,
            Counter::Merges => self.merges,
            Counter::Reuses => self.reuses,
        }
    }

    /// Iterate over `(counter, value)` pairs in [`Counter::ALL`] order.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stats: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a Stats {
    type Item = (Counter, usize);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`Stats::iter`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    stats: &'a Stats,
    next: usize,
}

impl Iterator for Iter<'_> {
    type Item = (Counter, usize);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let counter = *Counter::ALL.get(self.next)?;
        self.next += 1;
        Some((counter, self.stats.get(counter)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = Counter::ALL.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn init_is_zero() {
        assert_eq!(Stats::INIT, Stats::default());
        assert!(Stats::INIT.iter().all(|(_, value)| value == 0));
    }

    #[test]
    fn names_round_trip() {
        for &counter in Counter::ALL.iter() {
            assert_eq!(Counter::from_name(counter.name()), Some(counter));
        }
        assert_eq!(Counter::from_name("bogus"), None);
    }

    #[test]
    fn iter_reads_fields() {
        let stats = Stats {
            mallocs: 1,
            heap_size: 4096,
            reuses: 7,
            ..Stats::INIT
        };
        let pairs: Vec<_> = stats.iter().collect();
        assert_eq!(pairs.len(), Counter::ALL.len());
        assert_eq!(pairs[0], (Counter::Mallocs, 1));
        assert_eq!(pairs[5], (Counter::HeapSize, 4096));
        assert_eq!(pairs[11], (Counter::Reuses, 7));
        assert_eq!(stats.get(Counter::Frees), 0);
    }
}
