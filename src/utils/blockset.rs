//! Compact sets of small integers for dataflow analysis.
//!
//! The passes in this crate track sets of basic blocks and registers, both
//! identified by dense small integers. [`BitSet`] is the dense
//! representation: one bit per element, 64 elements per word. [`BlockSet`]
//! wraps it with a sparse fallback so per-block collections (dominance
//! frontiers, definition-site sets) stay cheap on very large methods where
//! thousands of mostly-empty dense sets would waste memory.

use std::collections::BTreeSet;

/// A bit vector for efficient set operations over small integers.
#[derive(Clone, PartialEq, Eq)]
pub struct BitSet {
    /// The bits, stored as a vector of words.
    words: Vec<u64>,
    /// The number of bits in the set.
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(64);
        Self {
            words: vec![0; num_words],
            len: capacity,
        }
    }

    /// Returns the capacity of this bit set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bits are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at the given index, returning `true` if it was newly set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let word = index / 64;
        let bit = 1u64 << (index % 64);
        let was_set = (self.words[word] & bit) != 0;
        self.words[word] |= bit;
        !was_set
    }

    /// Clears the bit at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.len, "index out of bounds");
        let word = index / 64;
        self.words[word] &= !(1u64 << (index % 64));
    }

    /// Returns `true` if the bit at the given index is set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Unions `other` into `self`, returning `true` if any bit changed.
    ///
    /// # Panics
    ///
    /// Panics if the two sets have different capacities.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "capacity mismatch");
        let mut changed = false;
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            let new = *w | o;
            changed |= new != *w;
            *w = new;
        }
        changed
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..64)
                .filter(move |bit| (word >> bit) & 1 != 0)
                .map(move |bit| wi * 64 + bit)
        })
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Block-count threshold above which [`BlockSet`] switches to the sparse
/// representation.
const SPARSE_THRESHOLD: usize = 4096;

/// A set of block (or register) indices with a size-adaptive representation.
///
/// Below [`SPARSE_THRESHOLD`] elements of universe the set is a dense
/// [`BitSet`]; above it, a sorted sparse set. Methods commonly have a few
/// dozen blocks, but pathological generated code can reach thousands, and a
/// dense frontier set per block would then cost quadratic memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSet {
    /// Dense representation for small universes.
    Bits(BitSet),
    /// Sparse representation for large universes.
    Sparse(BTreeSet<usize>),
}

impl BlockSet {
    /// Creates an empty set over a universe of the given size, picking the
    /// representation by the default threshold.
    #[must_use]
    pub fn new(universe: usize) -> Self {
        Self::with_threshold(universe, SPARSE_THRESHOLD)
    }

    /// Creates an empty set, switching to the sparse representation when the
    /// universe exceeds `threshold`.
    #[must_use]
    pub fn with_threshold(universe: usize, threshold: usize) -> Self {
        if universe > threshold {
            Self::Sparse(BTreeSet::new())
        } else {
            Self::Bits(BitSet::new(universe))
        }
    }

    /// Inserts an index, returning `true` if it was not already present.
    pub fn insert(&mut self, index: usize) -> bool {
        match self {
            Self::Bits(bits) => bits.insert(index),
            Self::Sparse(set) => set.insert(index),
        }
    }

    /// Removes an index.
    pub fn remove(&mut self, index: usize) {
        match self {
            Self::Bits(bits) => bits.remove(index),
            Self::Sparse(set) => {
                set.remove(&index);
            }
        }
    }

    /// Returns `true` if the index is present.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        match self {
            Self::Bits(bits) => bits.contains(index),
            Self::Sparse(set) => set.contains(&index),
        }
    }

    /// Returns the number of elements in the set.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Bits(bits) => bits.count(),
            Self::Sparse(set) => set.len(),
        }
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bits(bits) => bits.is_empty(),
            Self::Sparse(set) => set.is_empty(),
        }
    }

    /// Iterates over the elements in ascending order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            Self::Bits(bits) => Box::new(bits.iter()),
            Self::Sparse(set) => Box::new(set.iter().copied()),
        }
    }
}
