//! A fixed-capacity bit vector.
//!
//! Used wherever the back end tracks sets of small dense indices: live-in and
//! live-out sets during liveness, adjacency rows and presence flags of the
//! interference graph, and loop membership.
//!
//! # Example
//!
//! ```rust
//! use ssaopt::utils::BitSet;
//!
//! // vregs 3 and 70 live out of some block
//! let mut live = BitSet::new(128);
//! live.insert(70);
//! live.insert(3);
//!
//! assert!(live.contains(70));
//! assert_eq!(live.count(), 2);
//! assert_eq!(live.iter().collect::<Vec<_>>(), vec![3, 70]);
//! ```

/// A bit vector for efficient set operations over indices `0..len`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// The bits, 64 per word.
    words: Vec<u64>,
    /// The number of addressable bits.
    len: usize,
}

impl BitSet {
    /// Creates a new empty bit set that can hold indices `0..capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Creates a new bit set with every index in `0..capacity` present.
    #[must_use]
    pub fn full(capacity: usize) -> Self {
        let mut set = Self::new(capacity);
        set.fill();
        set
    }

    /// Number of addressable indices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at `index`. Returns `true` if it was not set before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let was_set = *word & mask != 0;
        *word |= mask;
        !was_set
    }

    /// Clears the bit at `index`. Returns `true` if it was set before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn remove(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        let was_set = *word & mask != 0;
        *word &= !mask;
        was_set
    }

    /// Returns `true` if the bit at `index` is set.
    ///
    /// Indices beyond the capacity are reported as absent.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Number of members.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of members shared with `other`.
    #[must_use]
    pub fn intersection_count(&self, other: &Self) -> usize {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Empties the set, keeping its capacity.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Sets all bits in `0..len`.
    pub fn fill(&mut self) {
        self.words.iter_mut().for_each(|w| *w = u64::MAX);
        // Bits past `len` stay zero
        if !self.len.is_multiple_of(64) {
            if let Some(last) = self.words.last_mut() {
                *last = (1u64 << (self.len % 64)) - 1;
            }
        }
    }

    /// Unions `other` into `self`. Returns `true` if `self` changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a |= *b;
            changed |= old != *a;
        }
        changed
    }

    /// Removes every bit of `other` from `self`. Returns `true` if `self` changed.
    pub fn difference_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            let old = *a;
            *a &= !*b;
            changed |= old != *a;
        }
        changed
    }

    /// Returns an iterator over the indices of set bits, in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set bits in a [`BitSet`].
pub struct BitSetIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    /// Remaining (not yet yielded) bits of the current word.
    current: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * 64 + bit);
            }
            self.word_idx += 1;
            self.current = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_new_members() {
        let mut live = BitSet::new(65);
        assert!(live.is_empty());

        assert!(live.insert(64));
        assert!(live.insert(2));
        assert!(!live.insert(64));

        assert_eq!(live.count(), 2);
        assert!(live.contains(64));
        assert!(!live.contains(63));
        // Out of range reads are absent rather than a panic
        assert!(!live.contains(4096));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut live = BitSet::new(16);
        live.insert(7);
        live.insert(9);
        assert!(live.remove(7));
        assert!(!live.remove(7));
        assert_eq!(live.iter().collect::<Vec<_>>(), vec![9]);
        live.clear();
        assert!(live.is_empty());
        assert_eq!(live.len(), 16);
    }

    #[test]
    fn test_bitset_full_and_iter() {
        let bs = BitSet::full(70);
        assert_eq!(bs.count(), 70);
        assert_eq!(bs.iter().count(), 70);
        assert_eq!(bs.iter().last(), Some(69));
    }

    #[test]
    fn test_bitset_set_ops() {
        let mut a = BitSet::new(130);
        let mut b = BitSet::new(130);
        a.insert(1);
        a.insert(128);
        b.insert(128);
        b.insert(64);

        assert_eq!(a.intersection_count(&b), 1);
        assert!(a.union_with(&b));
        assert!(!a.union_with(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 64, 128]);

        assert!(a.difference_with(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1]);
    }
}
