use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// A 32-byte digest. Every root, leaf, key and commitment in this crate is one.
pub type Hash = [u8; 32];

/// The all-zero digest. Used as the "no value" sentinel in sparse-tree proofs.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Root of an empty sparse Merkle subtree.
pub const SPARSE_MERKLE_PLACEHOLDER_HASH: Hash = *b"SPARSE_MERKLE_PLACEHOLDER_HASH__";

/// Stand-in for a missing right child when an accumulator level has odd length.
pub const ACCUMULATOR_PLACEHOLDER_HASH: Hash = *b"ACCUMULATOR_PLACEHOLDER_HASH____";

/// Domain separation for every tagged SHA256 in the protocol.
/// Two structures never share a tag, so a node of one can never be
/// reinterpreted as a node of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashDomain {
    AccumulatorInternal,
    SparseLeaf,
    SparseInternal,
    LedgerInfo,
    ValidatorSet,
    Waypoint,
}

impl HashDomain {
    pub const fn tag(self) -> &'static [u8] {
        match self {
            HashDomain::AccumulatorInternal => b"ATOMICA::AccumulatorInternal",
            HashDomain::SparseLeaf => b"ATOMICA::SparseMerkleLeaf",
            HashDomain::SparseInternal => b"ATOMICA::SparseMerkleInternal",
            HashDomain::LedgerInfo => b"ATOMICA::LedgerInfo",
            HashDomain::ValidatorSet => b"ATOMICA::ValidatorSet",
            HashDomain::Waypoint => b"ATOMICA::Waypoint",
        }
    }
}

/// SHA256 over `tag || parts[0] || parts[1] || ...`.
pub fn tagged_hash(domain: HashDomain, parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(domain.tag());
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash two children into their parent under the given domain.
pub fn hash_pair(domain: HashDomain, left: &Hash, right: &Hash) -> Hash {
    tagged_hash(domain, &[left, right])
}

/// Compute keccak256 hash of data.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// keccak256 over several slices without concatenating them first.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256(&[]),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_keccak256_concat_matches_single_pass() {
        assert_eq!(keccak256_concat(&[b"ab", b"cd"]), keccak256(b"abcd"));
    }

    #[test]
    fn test_hash_pair_order_and_domain() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let h1 = hash_pair(HashDomain::SparseInternal, &a, &b);
        assert_eq!(h1, hash_pair(HashDomain::SparseInternal, &a, &b));

        // Order matters
        assert_ne!(h1, hash_pair(HashDomain::SparseInternal, &b, &a));
        // Domain matters
        assert_ne!(h1, hash_pair(HashDomain::AccumulatorInternal, &a, &b));
    }

    #[test]
    fn test_placeholders_are_distinct() {
        assert_ne!(SPARSE_MERKLE_PLACEHOLDER_HASH, ACCUMULATOR_PLACEHOLDER_HASH);
        assert_ne!(SPARSE_MERKLE_PLACEHOLDER_HASH, ZERO_HASH);
    }
}
