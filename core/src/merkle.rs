//! Merkle-branch verifier (C2).
//!
//! Reconstructs a Merkle root from a leaf txid and an ordered sibling
//! branch, matching the wire format an Electrum-style server returns: each
//! sibling is transmitted hex-encoded in big-endian *display* order and must
//! be reversed into internal byte order before hashing.

use crate::codec::double_sha256;

/// Reconstructs a Merkle root.
///
/// * `leaf` is the target txid in internal byte order.
/// * `branch` is the ordered list of sibling hashes, each 32 bytes in
///   display (big-endian) order.
/// * `position_bitmask` has bit `i` set iff sibling `i` sits on the left of
///   the running hash.
///
/// Returns the reconstructed root in internal byte order. Compare it against
/// [`crate::adapters::Headers::merkle_root`], which is also internal-order,
/// to decide inclusion.
pub fn reconstruct_root(leaf: [u8; 32], branch: &[[u8; 32]], position_bitmask: u64) -> [u8; 32] {
    let mut working = leaf;
    for (i, sibling_display) in branch.iter().enumerate() {
        let mut sibling = *sibling_display;
        sibling.reverse();
        let sibling_on_left = (position_bitmask >> i) & 1 == 1;
        let mut concat = Vec::with_capacity(64);
        if sibling_on_left {
            concat.extend_from_slice(&sibling);
            concat.extend_from_slice(&working);
        } else {
            concat.extend_from_slice(&working);
            concat.extend_from_slice(&sibling);
        }
        working = double_sha256(&concat);
    }
    working
}

/// Convenience wrapper: `true` iff the reconstructed root equals `expected_root`
/// (both internal byte order).
pub fn verify(leaf: [u8; 32], branch: &[[u8; 32]], position_bitmask: u64, expected_root: &[u8; 32]) -> bool {
    // An empty branch means the leaf itself must already be the root: the
    // server is asserting this txid *is* the single-transaction tree.
    &reconstruct_root(leaf, branch, position_bitmask) == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::double_sha256;

    #[test]
    fn empty_branch_means_leaf_is_root() {
        let leaf = double_sha256(b"lonely-tx");
        assert!(verify(leaf, &[], 0, &leaf));
    }

    #[test]
    fn single_sibling_on_right() {
        let leaf = double_sha256(b"left-leaf");
        let mut sibling_internal = double_sha256(b"right-leaf");
        let mut expected_concat = Vec::new();
        expected_concat.extend_from_slice(&leaf);
        expected_concat.extend_from_slice(&sibling_internal);
        let expected_root = double_sha256(&expected_concat);

        // wire form is the sibling reversed into display order
        sibling_internal.reverse();
        let sibling_display = sibling_internal;

        assert!(verify(leaf, &[sibling_display], 0, &expected_root));
    }

    #[test]
    fn single_sibling_on_left() {
        let leaf = double_sha256(b"right-leaf");
        let mut sibling_internal = double_sha256(b"left-leaf");
        let mut expected_concat = Vec::new();
        expected_concat.extend_from_slice(&sibling_internal);
        expected_concat.extend_from_slice(&leaf);
        let expected_root = double_sha256(&expected_concat);

        sibling_internal.reverse();
        let sibling_display = sibling_internal;

        assert!(verify(leaf, &[sibling_display], 1, &expected_root));
    }

    #[test]
    fn wrong_root_fails() {
        let leaf = double_sha256(b"tx");
        let bogus_root = double_sha256(b"not-the-root");
        assert!(!verify(leaf, &[], 0, &bogus_root));
    }
}
