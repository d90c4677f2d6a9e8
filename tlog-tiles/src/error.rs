use thiserror::Error;

/// Errors from tile decoding and coordinate handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TileError {
    /// The tile header declares a hash size other than 32.
    #[error("invalid hash size {0}, only 32-byte SHA-256 tiles are supported")]
    InvalidHashSize(u8),
    /// The tile declares zero leaves.
    #[error("tile declares zero leaves")]
    EmptyTile,
    /// The tile declares more leaves than a full tile can hold.
    #[error("tile declares {got} leaves, at most {max} fit a tile")]
    TooManyLeaves {
        /// Declared leaf count.
        got: u16,
        /// Maximum leaf count of a full tile.
        max: u16,
    },
    /// The buffer ends before the tile header is complete.
    #[error("truncated tile header: {0} bytes")]
    TruncatedHeader(usize),
    /// The node payload length does not match the declared leaf count.
    #[error("tile with {num_leaves} leaves needs a {want}-byte node payload, got {got}")]
    PayloadLength {
        /// Declared leaf count.
        num_leaves: u16,
        /// Actual payload length in bytes.
        got: usize,
        /// Expected payload length in bytes.
        want: usize,
    },
    /// A tile height outside `1..=8`.
    #[error("tile height {0} out of range, must be within 1..=8")]
    InvalidHeight(u8),
    /// A store key that is not of the form `"<level>/<index>"`.
    #[error("malformed tile key {0:?}")]
    MalformedKey(String),
}
