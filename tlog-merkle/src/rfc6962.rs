//! RFC 6962 domain-separated SHA-256 hashing.
//!
//! - leaf (record) hash: `SHA256(0x00 || entry)`
//! - interior node hash: `SHA256(0x01 || left || right)`
//! - the empty tree hashes to `SHA256()` of no input

use sha2::{Digest, Sha256};

/// Size in bytes of every hash in the log.
pub const HASH_SIZE: usize = 32;

/// A SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// Domain-separation prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;
/// Domain-separation prefix for interior node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Hash a leaf entry: `SHA256(0x00 || entry)`.
pub fn record_hash(entry: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(entry);
    hasher.finalize().into()
}

/// Hash two child subtree roots: `SHA256(0x01 || left || right)`.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root hash of the empty tree.
pub fn empty_root() -> Hash {
    Sha256::digest(b"").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_is_sha256_of_nothing() {
        assert_eq!(
            hex(&empty_root()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn record_hash_known_vector() {
        // RFC 6962 test vector: MTH of the one-element tree over the empty
        // string is the leaf hash of the empty string.
        assert_eq!(
            hex(&record_hash(b"")),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn node_hash_is_order_sensitive() {
        let a = record_hash(b"a");
        let b = record_hash(b"b");
        assert_ne!(node_hash(&a, &b), node_hash(&b, &a));
    }

    #[test]
    fn leaf_and_node_domains_are_separated() {
        // A 64-byte entry hashed as a leaf must not collide with the node
        // hash of the two 32-byte halves.
        let a = record_hash(b"left");
        let b = record_hash(b"right");
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(&a);
        concat.extend_from_slice(&b);
        assert_ne!(record_hash(&concat), node_hash(&a, &b));
    }

    fn hex(h: &Hash) -> String {
        h.iter().map(|b| format!("{b:02x}")).collect()
    }
}
