//! Tile layout for RFC 6962 Merkle logs.
//!
//! A tile is a subtree of fixed height `H` serialized as a dense block of
//! node hashes. Level-0 tiles cover `2^H` leaves directly; a tile at level
//! `k` takes its children from the roots of level `k-1` tiles. Grouping
//! nodes into tiles keeps the number of stored objects small and lets new
//! leaves be integrated incrementally: only the rightmost tile of each level
//! is ever partial.
//!
//! The crate provides:
//!
//! - [`Tile`]: the in-order node array over `1..=2^H` leaf hashes, with the
//!   binary codec
//! - coordinate helpers mapping tree coordinates to tile coordinates and
//!   back ([`node_coords_to_tile_address`], [`TileAddress`])
//! - the canonical `"<level>/<index>"` store key ([`tile_key`],
//!   [`split_tile_key`])

mod coords;
mod error;
mod tile;

pub use coords::{
    node_coords_to_tile_address, split_tile_key, tile_key, tile_node_key, validate_height,
    TileAddress, MAX_TILE_HEIGHT,
};
pub use error::TileError;
pub use tile::Tile;
