use thiserror::Error;

/// Errors from compact range operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// The range bounds are inverted.
    #[error("invalid range bounds [{begin}, {end})")]
    InvalidBounds {
        /// First leaf index of the range.
        begin: u64,
        /// One past the last leaf index of the range.
        end: u64,
    },
    /// The hash count does not match the canonical decomposition of the
    /// range.
    #[error("range [{begin}, {end}) decomposes into {want} subtrees, got {got} hashes")]
    WrongHashCount {
        /// First leaf index of the range.
        begin: u64,
        /// One past the last leaf index of the range.
        end: u64,
        /// Number of hashes supplied.
        got: usize,
        /// Number of hashes the decomposition requires.
        want: usize,
    },
    /// Two ranges cannot be concatenated because they are not adjacent.
    #[error("ranges are not adjacent: left ends at {left_end}, right begins at {right_begin}")]
    NotAdjacent {
        /// End of the left-hand range.
        left_end: u64,
        /// Begin of the right-hand range.
        right_begin: u64,
    },
    /// A root hash was requested for a range that does not start at zero.
    #[error("root hash is only defined for ranges anchored at 0, this one begins at {0}")]
    NonZeroStart(u64),
}
