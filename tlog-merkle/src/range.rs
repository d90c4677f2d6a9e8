//! Compact representation of a contiguous range of log leaves.
//!
//! A range `[begin, end)` is stored as the roots of its canonical
//! decomposition into perfect subtrees, each of the form
//! `[m * 2^k, (m+1) * 2^k)`. The decomposition holds at most
//! `2 * log2(end - begin)` entries, so appending a leaf or concatenating an
//! adjacent range is O(log n) hashing.

use crate::error::RangeError;
use crate::rfc6962::{empty_root, node_hash, Hash};

/// A compact range accumulator over the leaves `[begin, end)`.
///
/// Entries are `(size, hash)` pairs for the perfect subtrees of the canonical
/// decomposition, left to right. Every entry is node-aligned: a subtree of
/// `size` leaves starts at a multiple of `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactRange {
    begin: u64,
    end: u64,
    entries: Vec<(u64, Hash)>,
}

impl CompactRange {
    /// Create a zero-width range anchored at `begin`.
    pub fn new(begin: u64) -> Self {
        Self {
            begin,
            end: begin,
            entries: Vec::new(),
        }
    }

    /// Reconstruct a range from its decomposition hashes.
    ///
    /// `hashes` must hold exactly one root per subtree of the canonical
    /// decomposition of `[begin, end)`, left to right. This is how a single
    /// subtree root is reinterpreted as a commitment to a larger leaf span:
    /// a perfect aligned span decomposes into one subtree, so one hash.
    pub fn new_range(begin: u64, end: u64, hashes: &[Hash]) -> Result<Self, RangeError> {
        if end < begin {
            return Err(RangeError::InvalidBounds { begin, end });
        }
        let sizes = decompose(begin, end);
        if hashes.len() != sizes.len() {
            return Err(RangeError::WrongHashCount {
                begin,
                end,
                got: hashes.len(),
                want: sizes.len(),
            });
        }
        Ok(Self {
            begin,
            end,
            entries: sizes.into_iter().zip(hashes.iter().copied()).collect(),
        })
    }

    /// First leaf index covered by the range.
    pub fn begin(&self) -> u64 {
        self.begin
    }

    /// One past the last leaf index covered by the range.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of leaves covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    /// Whether the range covers no leaves.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// The subtree roots of the decomposition, left to right.
    pub fn hashes(&self) -> Vec<Hash> {
        self.entries.iter().map(|(_, h)| *h).collect()
    }

    /// Append a single leaf hash, extending the range by one leaf.
    ///
    /// Equal-size right neighbours are merged while the carry propagates, so
    /// the entry list stays canonical.
    pub fn append(&mut self, hash: Hash) {
        self.push_subtree(1, hash);
    }

    /// Concatenate a right-adjacent range onto this one.
    ///
    /// `other` must begin exactly where this range ends. The seam follows the
    /// same merge rule as [`append`](Self::append).
    pub fn append_range(&mut self, other: &CompactRange) -> Result<(), RangeError> {
        if other.begin != self.end {
            return Err(RangeError::NotAdjacent {
                left_end: self.end,
                right_begin: other.begin,
            });
        }
        for (size, hash) in &other.entries {
            self.push_subtree(*size, *hash);
        }
        Ok(())
    }

    /// Compute the RFC 6962 root committed to by the range.
    ///
    /// Only defined for ranges anchored at leaf 0. The empty range yields the
    /// empty-tree root. When the decomposition holds more than one subtree,
    /// roots are combined right-to-left, which is exactly the ephemeral-node
    /// rule for a tree whose rightmost subtrees are not yet full.
    pub fn root_hash(&self) -> Result<Hash, RangeError> {
        if self.begin != 0 {
            return Err(RangeError::NonZeroStart(self.begin));
        }
        match self.entries.split_last() {
            None => Ok(empty_root()),
            Some(((_, last), rest)) => {
                let mut root = *last;
                for (_, hash) in rest.iter().rev() {
                    root = node_hash(hash, &root);
                }
                Ok(root)
            }
        }
    }

    /// Append one aligned perfect subtree of `size` leaves, then merge the
    /// tail while the two rightmost entries are siblings.
    ///
    /// Two adjacent aligned subtrees of `size` leaves ending at `end` are
    /// siblings exactly when `end` is a multiple of `2 * size`.
    fn push_subtree(&mut self, size: u64, hash: Hash) {
        debug_assert!(size.is_power_of_two() && self.end % size == 0);
        self.entries.push((size, hash));
        self.end += size;
        while self.entries.len() >= 2 {
            let (right_size, right) = self.entries[self.entries.len() - 1];
            let (left_size, left) = self.entries[self.entries.len() - 2];
            if left_size != right_size || self.end % (2 * left_size) != 0 {
                break;
            }
            self.entries.truncate(self.entries.len() - 2);
            self.entries.push((2 * left_size, node_hash(&left, &right)));
        }
    }
}

/// Split `[begin, end)` into its canonical perfect-subtree decomposition.
///
/// Greedily takes the largest power-of-two span that is both aligned at the
/// current position and fits in the remainder. Returns the subtree sizes,
/// left to right.
fn decompose(begin: u64, end: u64) -> Vec<u64> {
    let mut sizes = Vec::new();
    let mut pos = begin;
    while pos < end {
        let align = if pos == 0 {
            u64::MAX
        } else {
            1u64 << pos.trailing_zeros()
        };
        let remaining = end - pos;
        // Largest power of two that fits in the remainder.
        let fit = 1u64 << (63 - remaining.leading_zeros());
        let size = align.min(fit);
        sizes.push(size);
        pos += size;
    }
    sizes
}
