//! Phase 5: parse leaf bodies into structured metadata rows.

use crate::cancel::CancelToken;
use crate::error::AuditError;
use crate::remote::RemoteLog;
use crate::service::{Checkpoint, Service};
use crate::store::{LeafMetadata, LocalStore};

impl<S: LocalStore, R: RemoteLog> Service<S, R> {
    /// Parse every cloned leaf body and persist the semantic rows.
    ///
    /// Batched per tile; a leaf that fails the cross-check aborts the whole
    /// run with the offending index.
    pub fn process_metadata(
        &self,
        checkpoint: &Checkpoint,
        cancel: &CancelToken,
    ) -> Result<(), AuditError> {
        let tile_width = self.tile_width();
        // TODO: resume from the tile after the last stored metadata row
        // instead of reparsing from zero on every run.
        for offset in 0..checkpoint.tree_size / tile_width {
            cancel.check()?;
            let leaf_offset = (offset * tile_width) as i64;
            let leaves = self.store.leaves(leaf_offset, tile_width)?;
            let mut rows = Vec::with_capacity(leaves.len());
            for (i, leaf) in leaves.iter().enumerate() {
                rows.push(parse_leaf(leaf_offset as u64 + i as u64, leaf)?);
            }
            self.store.set_leaf_metadata(leaf_offset, &rows)?;
        }
        Ok(())
    }
}

/// Parse one leaf body of the form:
///
/// ```text
/// <module> <version> h1:<repoHash>
/// <module> <version>/go.mod h1:<modHash>
/// ```
///
/// The newline-delimited format is fragile, so any departure is a fatal
/// parse error rather than a best-effort row: both lines must carry exactly
/// three space-separated fields, the second line's module and version must
/// cross-check against the first, and both hash fields must carry the `h1:`
/// prefix (which is stripped from the stored row).
fn parse_leaf(index: u64, body: &[u8]) -> Result<LeafMetadata, AuditError> {
    let fail = |reason: String| AuditError::Metadata { index, reason };

    let text = std::str::from_utf8(body).map_err(|_| fail("leaf body is not UTF-8".into()))?;
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    let &[first, second] = lines.as_slice() else {
        return Err(fail(format!("expected 2 lines, got {}", lines.len())));
    };

    let [module, version, repo_field] = split_fields(first)
        .ok_or_else(|| fail(format!("line 1 is not `module version hash`: {first:?}")))?;
    let [mod_module, mod_version, mod_field] = split_fields(second)
        .ok_or_else(|| fail(format!("line 2 is not `module version hash`: {second:?}")))?;

    if mod_module != module {
        return Err(fail(format!(
            "mismatched module names: ({mod_module}, {module})"
        )));
    }
    let mod_version = mod_version
        .strip_suffix("/go.mod")
        .ok_or_else(|| fail(format!("line 2 version {mod_version:?} lacks /go.mod suffix")))?;
    if mod_version != version {
        return Err(fail(format!(
            "mismatched versions: ({mod_version}, {version})"
        )));
    }

    let repo_hash = repo_field
        .strip_prefix("h1:")
        .ok_or_else(|| fail(format!("hash field {repo_field:?} lacks h1: prefix")))?;
    let mod_hash = mod_field
        .strip_prefix("h1:")
        .ok_or_else(|| fail(format!("hash field {mod_field:?} lacks h1: prefix")))?;

    Ok(LeafMetadata {
        module: module.to_string(),
        version: version.to_string(),
        repo_hash: repo_hash.to_string(),
        mod_hash: mod_hash.to_string(),
    })
}

/// Split a line into exactly three non-empty space-separated fields.
fn split_fields(line: &str) -> Option<[&str; 3]> {
    let mut parts = line.split(' ');
    let fields = [parts.next()?, parts.next()?, parts.next()?];
    if parts.next().is_some() || fields.iter().any(|f| f.is_empty()) {
        return None;
    }
    Some(fields)
}
