//! Merkle attestation tree.
//!
//! Leaves are kept in the order given; every node must build the same leaf
//! list for the roots to agree. At each level nodes are paired left to
//! right, and an odd trailing node is paired with itself. Inner nodes hash
//! the pair in sorted order:
//!
//! ```text
//! inner(a, b) = keccak256(min(a, b) || max(a, b))
//! ```
//!
//! so a proof is a plain list of sibling hashes, verifiable without
//! position bits (compatible with OpenZeppelin's `MerkleProof.verify`).

use alloy_primitives::B256;

use crate::hash::keccak256_concat;
use crate::{CryptoError, Result};

/// Hash two nodes in sorted order.
pub fn hash_pair(a: &B256, b: &B256) -> B256 {
    if a <= b {
        keccak256_concat(&[a.as_slice(), b.as_slice()])
    } else {
        keccak256_concat(&[b.as_slice(), a.as_slice()])
    }
}

/// A fully materialized Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` are the leaves, the last level holds the root.
    levels: Vec<Vec<B256>>,
}

impl MerkleTree {
    /// Build a tree over the given leaf hashes.
    pub fn new(leaves: Vec<B256>) -> Self {
        let mut levels = vec![leaves];

        loop {
            let current = match levels.last() {
                Some(level) if level.len() > 1 => level,
                _ => break,
            };

            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                // Duplicate the last node if odd number of nodes.
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }

        Self { levels }
    }

    /// Root of the tree.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::EmptyTree`] if the tree has no leaves
    pub fn root(&self) -> Result<B256> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .ok_or(CryptoError::EmptyTree)
    }

    /// Leaf hashes in insertion order.
    pub fn leaves(&self) -> &[B256] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves().len()
    }

    /// Whether the tree has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves().is_empty()
    }

    /// Sibling path from the first occurrence of `leaf` up to the root.
    ///
    /// Returns `None` if the leaf is not in the tree.
    pub fn proof(&self, leaf: &B256) -> Option<Vec<B256>> {
        let mut index = self.leaves().iter().position(|l| l == leaf)?;
        let mut siblings = Vec::with_capacity(self.levels.len().saturating_sub(1));

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if index % 2 == 0 {
                level.get(index + 1).unwrap_or(&level[index])
            } else {
                &level[index - 1]
            };
            siblings.push(*sibling);
            index /= 2;
        }

        Some(siblings)
    }
}

/// Verify a sibling path for `leaf` against `root`.
pub fn verify_proof(leaf: &B256, proof: &[B256], root: &B256) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |current, sibling| hash_pair(&current, sibling));
    computed == *root
}
