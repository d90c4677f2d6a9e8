//! Mapping between tree coordinates and tile coordinates.
//!
//! A tree node is addressed by `(tree_level, tree_index)`: level 0 is the
//! leaf row, and index counts nodes left to right within a level. Tiles of
//! height `H` slice the tree into strata of `H` rows each; within a stratum
//! a node lives in the tile covering its index, at a row-relative position.

use crate::error::TileError;

/// Maximum supported tile height.
pub const MAX_TILE_HEIGHT: u8 = 8;

/// Validate that a tile height is in the supported range `1..=8`.
pub fn validate_height(height: u8) -> Result<(), TileError> {
    if !(1..=MAX_TILE_HEIGHT).contains(&height) {
        return Err(TileError::InvalidHeight(height));
    }
    Ok(())
}

/// The address of a tree node within the tile pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAddress {
    /// Tile stratum; stratum 0 covers the leaf rows.
    pub tile_level: u64,
    /// Tile position within the stratum.
    pub tile_index: u64,
    /// Node row within the tile, `0..height`.
    pub node_level: u8,
    /// Node position within the row.
    pub node_index: u64,
}

impl TileAddress {
    /// Map this tile address back to `(tree_level, tree_index)` coordinates.
    pub fn to_tree_coords(&self, height: u8) -> Result<(u64, u64), TileError> {
        validate_height(height)?;
        let h = u64::from(height);
        let row_width = 1u64 << (h - u64::from(self.node_level));
        Ok((
            self.tile_level * h + u64::from(self.node_level),
            self.tile_index * row_width + self.node_index,
        ))
    }
}

/// Locate the tile holding the tree node at `(tree_level, tree_index)` for
/// tiles of the given height, along with the node's position inside it.
pub fn node_coords_to_tile_address(
    tree_level: u64,
    tree_index: u64,
    height: u8,
) -> Result<TileAddress, TileError> {
    validate_height(height)?;
    let h = u64::from(height);
    let node_level = (tree_level % h) as u8;
    let row_width = 1u64 << (h - u64::from(node_level));
    Ok(TileAddress {
        tile_level: tree_level / h,
        tile_index: tree_index / row_width,
        node_level,
        node_index: tree_index % row_width,
    })
}

/// In-order slot of the node `(node_level, node_index)` within a tile's node
/// array: `2^(level+1) * index + 2^level - 1`.
pub fn tile_node_key(node_level: u8, node_index: u64) -> usize {
    ((1u64 << (node_level + 1)) * node_index + (1u64 << node_level) - 1) as usize
}

/// Canonical string key for the tile at `(level, index)`.
pub fn tile_key(level: u64, index: u64) -> String {
    format!("{level}/{index}")
}

/// Parse a key produced by [`tile_key`] back into `(level, index)`.
pub fn split_tile_key(key: &str) -> Result<(u64, u64), TileError> {
    let malformed = || TileError::MalformedKey(key.to_string());
    let (level, index) = key.split_once('/').ok_or_else(malformed)?;
    let level = level.parse::<u64>().map_err(|_| malformed())?;
    let index = index.parse::<u64>().map_err(|_| malformed())?;
    Ok((level, index))
}
