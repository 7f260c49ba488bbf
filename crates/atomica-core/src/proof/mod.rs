//! Merkle proof verification for the two structures the source chain commits to:
//! the append-only transaction accumulator and the sparse Merkle state tree.
//!
//! Verifiers are pure functions of their inputs. The in-memory builders next
//! to them produce the same structures for tests and source-side tooling.

pub mod accumulator;
pub mod bits;
pub mod sparse_merkle;

pub use accumulator::*;
pub use bits::*;
pub use sparse_merkle::*;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors during accumulator or sparse Merkle proof verification.
/// Each variant is specific enough to diagnose exactly what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("Proof has {depth} siblings, maximum is {max}")]
    ProofTooDeep { depth: usize, max: usize },

    #[error("Proof verification failed: computed root {computed} does not match expected root {expected}")]
    RootMismatch { computed: String, expected: String },

    #[error("Leaf index {index} does not fit in a tree of depth {depth}")]
    IndexOutOfRange { index: u64, depth: usize },

    #[error("Proof has {depth} levels, an accumulator of {num_leaves} leaves has {expected}")]
    DepthMismatch { depth: usize, expected: usize, num_leaves: u64 },

    #[error("Leaves {first}..{end} are not all within an accumulator of {num_leaves} leaves")]
    LeavesOutOfBounds { first: u64, end: u64, num_leaves: u64 },

    #[error("Range proof covers no leaves")]
    EmptyRange,

    #[error("Range proof is missing a {side} sibling at level {level}")]
    MissingSibling { side: &'static str, level: usize },

    #[error("Explicit leaf key equals the queried key; this is an inclusion, not an absence")]
    LeafKeyMatchesQuery,

    #[error("Explicit leaf shares only {common} prefix bits with the queried key, proof needs {required}")]
    InsufficientCommonPrefix { common: usize, required: usize },
}

impl ProofError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidProof
    }

    pub(crate) fn root_mismatch(computed: &[u8; 32], expected: &[u8; 32]) -> Self {
        ProofError::RootMismatch {
            computed: hex::encode(computed),
            expected: hex::encode(expected),
        }
    }
}
