//! Sparse Merkle tree over the 256-bit key space.
//!
//! The tree is path-compressed: a subtree holding a single leaf is replaced by
//! that leaf, and an empty subtree by [`SPARSE_MERKLE_PLACEHOLDER_HASH`]. A
//! proof therefore carries only as many siblings as the path is deep.
//! `siblings[0]` is the bottom-most sibling; key bits are consumed MSB-first
//! from the root, so the bottom sibling pairs with bit `siblings.len() - 1`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::crypto::{hash_pair, tagged_hash, Hash, HashDomain, SPARSE_MERKLE_PLACEHOLDER_HASH};
use crate::proof::bits::{common_prefix_bits, key_bit, KeyBits, KEY_BITS};
use crate::proof::ProofError;
use crate::types::ExplicitLeafProof;

/// One level per key bit.
pub const MAX_SPARSE_MERKLE_PROOF_DEPTH: usize = KEY_BITS;

/// `H(LEAF, key, valueHash)`.
pub fn sparse_leaf_hash(key: &Hash, value_hash: &Hash) -> Hash {
    tagged_hash(HashDomain::SparseLeaf, &[key, value_hash])
}

fn internal(left: &Hash, right: &Hash) -> Hash {
    hash_pair(HashDomain::SparseInternal, left, right)
}

fn check_depth(siblings: &[Hash]) -> Result<(), ProofError> {
    if siblings.len() > MAX_SPARSE_MERKLE_PROOF_DEPTH {
        return Err(ProofError::ProofTooDeep {
            depth: siblings.len(),
            max: MAX_SPARSE_MERKLE_PROOF_DEPTH,
        });
    }
    Ok(())
}

/// Fold `start` up through `siblings` along the path of `key`.
fn compute_root(key: &Hash, start: Hash, siblings: &[Hash]) -> Hash {
    siblings
        .iter()
        .zip(KeyBits::new(key).rev().skip(KEY_BITS - siblings.len()))
        .fold(start, |current, (sibling, is_right)| {
            if is_right {
                internal(sibling, &current)
            } else {
                internal(&current, sibling)
            }
        })
}

fn check_root(computed: Hash, root: &Hash) -> Result<(), ProofError> {
    if computed != *root {
        return Err(ProofError::root_mismatch(&computed, root));
    }
    Ok(())
}

/// Verify that `key` maps to `value_hash` under `root`.
pub fn verify_inclusion(
    root: &Hash,
    key: &Hash,
    value_hash: &Hash,
    siblings: &[Hash],
) -> Result<(), ProofError> {
    check_depth(siblings)?;
    let computed = compute_root(key, sparse_leaf_hash(key, value_hash), siblings);
    check_root(computed, root).inspect_err(|_| {
        debug!(key = %hex::encode(key), depth = siblings.len(), "sparse inclusion proof failed");
    })
}

/// Verify that the subtree `key` falls into at depth `siblings.len()` is empty.
pub fn verify_non_inclusion(root: &Hash, key: &Hash, siblings: &[Hash]) -> Result<(), ProofError> {
    check_depth(siblings)?;
    let computed = compute_root(key, SPARSE_MERKLE_PLACEHOLDER_HASH, siblings);
    check_root(computed, root).inspect_err(|_| {
        debug!(key = %hex::encode(key), depth = siblings.len(), "sparse non-inclusion proof failed");
    })
}

/// Verify that `key` is absent because its path ends at a different leaf.
///
/// The leaf must share at least `siblings.len()` prefix bits with `key`,
/// otherwise it would not sit where the proof places it.
pub fn verify_with_explicit_leaf(
    root: &Hash,
    key: &Hash,
    leaf_key: &Hash,
    leaf_value_hash: &Hash,
    siblings: &[Hash],
) -> Result<(), ProofError> {
    check_depth(siblings)?;
    if leaf_key == key {
        return Err(ProofError::LeafKeyMatchesQuery);
    }
    let common = common_prefix_bits(key, leaf_key);
    if common < siblings.len() {
        return Err(ProofError::InsufficientCommonPrefix {
            common,
            required: siblings.len(),
        });
    }

    let computed = compute_root(key, sparse_leaf_hash(leaf_key, leaf_value_hash), siblings);
    check_root(computed, root)
}

/// What a [`SparseMerkleTree`] proves about a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SparseMerkleProof {
    /// The key is present with this value hash.
    Inclusion { value_hash: Hash, siblings: Vec<Hash> },
    /// The key's path ends in an empty subtree.
    EmptySubtree { siblings: Vec<Hash> },
    /// The key's path ends at a different leaf.
    OtherLeaf(ExplicitLeafProof),
}

impl SparseMerkleProof {
    pub fn siblings(&self) -> &[Hash] {
        match self {
            SparseMerkleProof::Inclusion { siblings, .. } => siblings,
            SparseMerkleProof::EmptySubtree { siblings } => siblings,
            SparseMerkleProof::OtherLeaf(proof) => &proof.siblings,
        }
    }

    /// Check this proof for `key` against `root` with the matching verifier.
    pub fn verify(&self, root: &Hash, key: &Hash) -> Result<(), ProofError> {
        match self {
            SparseMerkleProof::Inclusion { value_hash, siblings } => {
                verify_inclusion(root, key, value_hash, siblings)
            }
            SparseMerkleProof::EmptySubtree { siblings } => verify_non_inclusion(root, key, siblings),
            SparseMerkleProof::OtherLeaf(proof) => verify_with_explicit_leaf(
                root,
                key,
                &proof.leaf_key,
                &proof.leaf_value_hash,
                &proof.siblings,
            ),
        }
    }
}

/// A path-compressed sparse Merkle tree kept in memory.
#[derive(Clone, Debug, Default)]
pub struct SparseMerkleTree {
    leaves: BTreeMap<Hash, Hash>,
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key -> value_hash`.
    pub fn insert(&mut self, key: Hash, value_hash: Hash) -> Option<Hash> {
        self.leaves.insert(key, value_hash)
    }

    pub fn remove(&mut self, key: &Hash) -> Option<Hash> {
        self.leaves.remove(key)
    }

    pub fn get(&self, key: &Hash) -> Option<&Hash> {
        self.leaves.get(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> Hash {
        subtree_root(&self.entries(), 0)
    }

    /// Prove presence or absence of `key`.
    pub fn prove(&self, key: &Hash) -> SparseMerkleProof {
        let entries = self.entries();
        let mut subtree = entries.as_slice();
        let mut top_down = Vec::new();
        let mut depth = 0;

        while subtree.len() > 1 {
            let split = split_point(subtree, depth);
            let (left, right) = subtree.split_at(split);
            if key_bit(key, depth) {
                top_down.push(subtree_root(left, depth + 1));
                subtree = right;
            } else {
                top_down.push(subtree_root(right, depth + 1));
                subtree = left;
            }
            depth += 1;
        }

        top_down.reverse();
        let siblings = top_down;
        match subtree {
            [] => SparseMerkleProof::EmptySubtree { siblings },
            [(leaf_key, value_hash)] if leaf_key == key => SparseMerkleProof::Inclusion {
                value_hash: *value_hash,
                siblings,
            },
            [(leaf_key, leaf_value_hash), ..] => SparseMerkleProof::OtherLeaf(ExplicitLeafProof {
                leaf_key: *leaf_key,
                leaf_value_hash: *leaf_value_hash,
                siblings,
            }),
        }
    }

    fn entries(&self) -> Vec<(Hash, Hash)> {
        self.leaves.iter().map(|(k, v)| (*k, *v)).collect()
    }
}

/// Index of the first entry whose bit at `depth` is set. Entries are sorted,
/// and share every bit above `depth`, so they partition cleanly.
fn split_point(entries: &[(Hash, Hash)], depth: usize) -> usize {
    entries.partition_point(|(key, _)| !key_bit(key, depth))
}

fn subtree_root(entries: &[(Hash, Hash)], depth: usize) -> Hash {
    match entries {
        [] => SPARSE_MERKLE_PLACEHOLDER_HASH,
        [(key, value_hash)] => sparse_leaf_hash(key, value_hash),
        _ => {
            let (left, right) = entries.split_at(split_point(entries, depth));
            internal(&subtree_root(left, depth + 1), &subtree_root(right, depth + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    fn key(tag: &str) -> Hash {
        keccak256(tag.as_bytes())
    }

    fn sample_tree() -> SparseMerkleTree {
        let mut tree = SparseMerkleTree::new();
        for i in 0..16u8 {
            tree.insert(key(&format!("key-{i}")), [i; 32]);
        }
        tree
    }

    #[test]
    fn test_empty_tree() {
        let tree = SparseMerkleTree::new();
        assert_eq!(tree.root(), SPARSE_MERKLE_PLACEHOLDER_HASH);

        let proof = tree.prove(&key("missing"));
        assert_eq!(proof, SparseMerkleProof::EmptySubtree { siblings: vec![] });
        proof.verify(&tree.root(), &key("missing")).unwrap();
    }

    #[test]
    fn test_single_leaf_is_root() {
        let mut tree = SparseMerkleTree::new();
        tree.insert(key("a"), [7; 32]);
        assert_eq!(tree.root(), sparse_leaf_hash(&key("a"), &[7; 32]));
        verify_inclusion(&tree.root(), &key("a"), &[7; 32], &[]).unwrap();
    }

    #[test]
    fn test_inclusion_and_non_inclusion_share_a_root() {
        let tree = sample_tree();
        let root = tree.root();
        let k = key("key-5");

        let proof = tree.prove(&k);
        let siblings = match &proof {
            SparseMerkleProof::Inclusion { value_hash, siblings } => {
                assert_eq!(*value_hash, [5; 32]);
                siblings.clone()
            }
            other => panic!("expected inclusion, got {other:?}"),
        };
        verify_inclusion(&root, &k, &[5; 32], &siblings).unwrap();

        // An absent key also verifies against the same root.
        let absent = key("not-in-tree");
        let absence = tree.prove(&absent);
        assert!(!matches!(absence, SparseMerkleProof::Inclusion { .. }));
        absence.verify(&root, &absent).unwrap();

        // Flipping one bit of K with the original proof fails.
        let mut flipped = k;
        flipped[0] ^= 0x80;
        assert!(matches!(
            verify_inclusion(&root, &flipped, &[5; 32], &siblings),
            Err(ProofError::RootMismatch { .. })
        ));

        // So does a different value.
        assert!(verify_inclusion(&root, &k, &[6; 32], &siblings).is_err());
    }

    #[test]
    fn test_every_key_proves() {
        let tree = sample_tree();
        let root = tree.root();
        for i in 0..16u8 {
            let k = key(&format!("key-{i}"));
            tree.prove(&k).verify(&root, &k).unwrap();
        }
        for i in 0..32u8 {
            let k = key(&format!("absent-{i}"));
            let proof = tree.prove(&k);
            assert!(!matches!(proof, SparseMerkleProof::Inclusion { .. }));
            proof.verify(&root, &k).unwrap();
        }
    }

    #[test]
    fn test_empty_subtree_proof() {
        // Keys 0b00.. and 0b01.. leave the whole 1.. half empty.
        let mut tree = SparseMerkleTree::new();
        let mut a = [0u8; 32];
        a[31] = 1;
        let mut b = [0u8; 32];
        b[0] = 0x40;
        tree.insert(a, [1; 32]);
        tree.insert(b, [2; 32]);

        let mut absent = [0u8; 32];
        absent[0] = 0x80;
        let proof = tree.prove(&absent);
        let siblings = match proof {
            SparseMerkleProof::EmptySubtree { siblings } => siblings,
            other => panic!("expected empty subtree, got {other:?}"),
        };
        assert_eq!(siblings.len(), 1);
        verify_non_inclusion(&tree.root(), &absent, &siblings).unwrap();

        // The same proof cannot claim a key that is present is absent.
        assert!(verify_non_inclusion(&tree.root(), &a, &siblings).is_err());
    }

    #[test]
    fn test_explicit_leaf_proof() {
        let mut tree = SparseMerkleTree::new();
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        b[0] = 0x80;
        tree.insert(a, [1; 32]);
        tree.insert(b, [2; 32]);

        // Shares the first bit with `a`, so its path ends at `a`.
        let mut query = [0u8; 32];
        query[0] = 0x01;
        let proof = match tree.prove(&query) {
            SparseMerkleProof::OtherLeaf(proof) => proof,
            other => panic!("expected explicit leaf, got {other:?}"),
        };
        assert_eq!(proof.leaf_key, a);
        assert_eq!(proof.siblings.len(), 1);

        let root = tree.root();
        verify_with_explicit_leaf(&root, &query, &a, &[1; 32], &proof.siblings).unwrap();

        assert_eq!(
            verify_with_explicit_leaf(&root, &a, &a, &[1; 32], &proof.siblings),
            Err(ProofError::LeafKeyMatchesQuery)
        );

        // A query on the other side of the root split shares no prefix with `a`.
        let mut far = [0u8; 32];
        far[0] = 0xC0;
        assert_eq!(
            verify_with_explicit_leaf(&root, &far, &a, &[1; 32], &proof.siblings),
            Err(ProofError::InsufficientCommonPrefix { common: 0, required: 1 })
        );
    }

    #[test]
    fn test_proof_depth_limit() {
        let siblings = vec![[0u8; 32]; 257];
        assert_eq!(
            verify_non_inclusion(&[0; 32], &[0; 32], &siblings),
            Err(ProofError::ProofTooDeep { depth: 257, max: 256 })
        );
    }

    #[test]
    fn test_bottom_sibling_pairs_with_deepest_bit() {
        // Two keys differing only in bit 2 sit three levels down.
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        b[0] = 0x20;
        let mut tree = SparseMerkleTree::new();
        tree.insert(a, [1; 32]);
        tree.insert(b, [2; 32]);

        let siblings = tree.prove(&b).siblings().to_vec();
        assert_eq!(siblings.len(), 3);
        assert_eq!(siblings[0], sparse_leaf_hash(&a, &[1; 32]));
        assert_eq!(siblings[1], SPARSE_MERKLE_PLACEHOLDER_HASH);
        assert_eq!(siblings[2], SPARSE_MERKLE_PLACEHOLDER_HASH);

        let expected = internal(
            &internal(
                &internal(&sparse_leaf_hash(&a, &[1; 32]), &sparse_leaf_hash(&b, &[2; 32])),
                &SPARSE_MERKLE_PLACEHOLDER_HASH,
            ),
            &SPARSE_MERKLE_PLACEHOLDER_HASH,
        );
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_remove_restores_root() {
        let mut tree = sample_tree();
        let before = tree.root();
        tree.insert(key("extra"), [0xEE; 32]);
        assert_ne!(tree.root(), before);
        assert_eq!(tree.remove(&key("extra")), Some([0xEE; 32]));
        assert_eq!(tree.root(), before);
        assert_eq!(tree.len(), 16);
    }
}
