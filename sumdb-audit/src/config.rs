//! Audit run configuration.

use tlog_tiles::{validate_height, TileError};

use crate::backoff::BackoffConfig;

/// Configuration recognized by the auditor core.
///
/// Carried by the `Service` value passed to each phase; there is no
/// process-wide state.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Height of every tile stratum, `1..=8`. Height 8 gives the usual
    /// 256-leaf tiles.
    pub tile_height: u8,
    /// Upper bound on in-flight remote fetches during cloning.
    pub fetch_concurrency: usize,
    /// Whether to cross-check every local tile against the remote after the
    /// root check passes.
    pub verify_tiles: bool,
    /// Retry policy for remote fetches.
    pub backoff: BackoffConfig,
}

impl AuditConfig {
    /// Create a configuration with the given tile height and defaults for
    /// everything else.
    pub fn new(tile_height: u8) -> Result<Self, TileError> {
        validate_height(tile_height)?;
        Ok(Self {
            tile_height,
            ..Self::default()
        })
    }

    /// Validate field combinations set directly on the struct.
    pub fn validate(&self) -> Result<(), TileError> {
        validate_height(self.tile_height)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tile_height: 8,
            fetch_concurrency: 8,
            verify_tiles: false,
            backoff: BackoffConfig::default(),
        }
    }
}
