//! Sparse Merkle Tree exclusion-proof verification (`spec.md` §4.6), used to
//! check a commitment or agent id against a blacklist root without
//! materializing the whole set.
//!
//! A proof is a root, a leaf, and a path of up to 256 levels, each level
//! `direction_byte(1) | sibling(32)`. `direction_byte` is `0` (sibling is the
//! right child) or `1` (sibling is the left child); any other value is
//! malformed. Hashing at each level is `Poseidon(left, right)`.

use crate::error::WireError;
use crate::field::Fr;
use crate::poseidon;

pub const MAX_DEPTH: usize = 256;

/// One level of an SMT exclusion path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathNode {
    /// `false`: sibling is the right child. `true`: sibling is the left child.
    pub sibling_is_left: bool,
    pub sibling: Fr,
}

/// Parse a path of `direction(1) | sibling(32)` entries. `bytes.len()` must
/// be a multiple of 33 and the resulting depth must not exceed [`MAX_DEPTH`].
pub fn parse_path(bytes: &[u8]) -> Result<Vec<PathNode>, WireError> {
    if bytes.len() % 33 != 0 {
        return Err(WireError::TooShort {
            needed: ((bytes.len() / 33) + 1) * 33,
            got: bytes.len(),
        });
    }
    let depth = bytes.len() / 33;
    if depth > MAX_DEPTH {
        return Err(WireError::SmtDepthTooLarge(depth));
    }
    let mut path = Vec::with_capacity(depth);
    for i in 0..depth {
        let off = i * 33;
        let direction = bytes[off];
        let sibling_is_left = match direction {
            0 => false,
            1 => true,
            other => return Err(WireError::InvalidSmtDirection(other)),
        };
        let sibling_bytes: [u8; 32] = bytes[off + 1..off + 33].try_into().unwrap();
        let sibling = crate::field::FieldElement::<Fr>::from_bytes_be(&sibling_bytes).0;
        path.push(PathNode {
            sibling_is_left,
            sibling,
        });
    }
    Ok(path)
}

/// Recompute the root from `leaf` and `path`, applying `Poseidon(left,
/// right)` at each level in order (leaf-to-root).
pub fn compute_root(leaf: Fr, path: &[PathNode]) -> Fr {
    let mut current = leaf;
    for node in path {
        current = if node.sibling_is_left {
            poseidon::hash2(node.sibling, current)
        } else {
            poseidon::hash2(current, node.sibling)
        };
    }
    current
}

/// Verify that `leaf`, combined with `path`, reconstructs `root`. Used for
/// blacklist exclusion checks: a caller proves a leaf is absent from the set
/// committed to by `root` by exhibiting the path to an empty subtree,
/// `spec.md` leaves the empty-leaf encoding to the caller's tree convention.
pub fn verify(root: Fr, leaf: Fr, path: &[PathNode]) -> bool {
    compute_root(leaf, path) == root
}
