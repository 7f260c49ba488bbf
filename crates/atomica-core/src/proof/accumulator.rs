use tracing::debug;

use crate::crypto::{hash_pair, Hash, HashDomain, ACCUMULATOR_PLACEHOLDER_HASH};
use crate::proof::ProofError;

/// An accumulator holds at most 2^63 leaves.
pub const MAX_ACCUMULATOR_PROOF_DEPTH: usize = 63;

fn parent(left: &Hash, right: &Hash) -> Hash {
    hash_pair(HashDomain::AccumulatorInternal, left, right)
}

/// Verify that `leaf_hash` sits at `leaf_index` in the accumulator with root `root`.
///
/// `siblings[0]` is the leaf's sibling; each following entry is one level up.
/// The index must fit in `siblings.len()` bits so one proof can never be
/// replayed for another position.
pub fn verify_accumulator(
    root: &Hash,
    leaf_hash: &Hash,
    leaf_index: u64,
    siblings: &[Hash],
) -> Result<(), ProofError> {
    if siblings.len() > MAX_ACCUMULATOR_PROOF_DEPTH {
        return Err(ProofError::ProofTooDeep {
            depth: siblings.len(),
            max: MAX_ACCUMULATOR_PROOF_DEPTH,
        });
    }
    if leaf_index >> siblings.len() != 0 {
        return Err(ProofError::IndexOutOfRange {
            index: leaf_index,
            depth: siblings.len(),
        });
    }

    let mut current = *leaf_hash;
    let mut index = leaf_index;
    for sibling in siblings {
        current = if index & 1 == 0 {
            parent(&current, sibling)
        } else {
            parent(sibling, &current)
        };
        index >>= 1;
    }

    if current != *root {
        debug!(leaf_index, depth = siblings.len(), "accumulator proof root mismatch");
        return Err(ProofError::root_mismatch(&current, root));
    }
    Ok(())
}

/// Height of an accumulator holding `num_leaves` leaves, which is the length
/// of every leaf proof against its root. Zero for a single leaf.
pub fn accumulator_depth(num_leaves: u64) -> usize {
    match num_leaves {
        0 | 1 => 0,
        n => (u64::BITS - (n - 1).leading_zeros()) as usize,
    }
}

/// Verify `leaf_hash` at `leaf_index` in an accumulator of known size.
///
/// Leaves and internal nodes hash alike, so without the size an internal
/// node would pass as a leaf with a shorter proof. The proof must be exactly
/// [`accumulator_depth`] long and the index must be below `num_leaves`.
pub fn verify_accumulator_leaf(
    root: &Hash,
    leaf_hash: &Hash,
    leaf_index: u64,
    num_leaves: u64,
    siblings: &[Hash],
) -> Result<(), ProofError> {
    check_leaf_bounds(leaf_index, 1, num_leaves)?;
    check_depth(siblings.len(), num_leaves)?;
    verify_accumulator(root, leaf_hash, leaf_index, siblings)
}

fn check_leaf_bounds(first: u64, count: usize, num_leaves: u64) -> Result<(), ProofError> {
    let end = u64::try_from(count).ok().and_then(|count| first.checked_add(count));
    match end {
        Some(end) if end <= num_leaves => Ok(()),
        _ => Err(ProofError::LeavesOutOfBounds {
            first,
            end: end.unwrap_or(u64::MAX),
            num_leaves,
        }),
    }
}

fn check_depth(depth: usize, num_leaves: u64) -> Result<(), ProofError> {
    let expected = accumulator_depth(num_leaves);
    if depth != expected {
        debug!(depth, expected, num_leaves, "accumulator proof depth mismatch");
        return Err(ProofError::DepthMismatch {
            depth,
            expected,
            num_leaves,
        });
    }
    Ok(())
}

/// Verify a contiguous run of leaves starting at `first_leaf_index`.
///
/// `left_siblings` holds the left frontier and `right_siblings` the right
/// frontier, both bottom level first. Every frontier entry must be consumed.
pub fn verify_accumulator_range(
    root: &Hash,
    first_leaf_index: u64,
    leaf_hashes: &[Hash],
    left_siblings: &[Hash],
    right_siblings: &[Hash],
) -> Result<(), ProofError> {
    let (computed, _) = fold_range(first_leaf_index, leaf_hashes, left_siblings, right_siblings)?;
    if computed != *root {
        debug!(first_leaf_index, leaves = leaf_hashes.len(), "accumulator range proof root mismatch");
        return Err(ProofError::root_mismatch(&computed, root));
    }
    Ok(())
}

/// [`verify_accumulator_range`] for an accumulator of known size: the run
/// must lie within `num_leaves` and the fold must climb exactly
/// [`accumulator_depth`] levels.
pub fn verify_accumulator_range_leaves(
    root: &Hash,
    num_leaves: u64,
    first_leaf_index: u64,
    leaf_hashes: &[Hash],
    left_siblings: &[Hash],
    right_siblings: &[Hash],
) -> Result<(), ProofError> {
    check_leaf_bounds(first_leaf_index, leaf_hashes.len(), num_leaves)?;
    let (computed, levels) = fold_range(first_leaf_index, leaf_hashes, left_siblings, right_siblings)?;
    check_depth(levels, num_leaves)?;
    if computed != *root {
        debug!(first_leaf_index, leaves = leaf_hashes.len(), "accumulator range proof root mismatch");
        return Err(ProofError::root_mismatch(&computed, root));
    }
    Ok(())
}

/// Fold a run of leaves and its frontiers up to a single hash. Returns the
/// hash and the number of levels climbed.
fn fold_range(
    first_leaf_index: u64,
    leaf_hashes: &[Hash],
    left_siblings: &[Hash],
    right_siblings: &[Hash],
) -> Result<(Hash, usize), ProofError> {
    if leaf_hashes.is_empty() {
        return Err(ProofError::EmptyRange);
    }
    for frontier in [left_siblings, right_siblings] {
        if frontier.len() > MAX_ACCUMULATOR_PROOF_DEPTH {
            return Err(ProofError::ProofTooDeep {
                depth: frontier.len(),
                max: MAX_ACCUMULATOR_PROOF_DEPTH,
            });
        }
    }

    let mut left_iter = left_siblings.iter().peekable();
    let mut right_iter = right_siblings.iter().peekable();
    let mut first_position = first_leaf_index;
    let mut current: Vec<Hash> = leaf_hashes.to_vec();
    let mut level = 0usize;

    while current.len() > 1 || left_iter.peek().is_some() || right_iter.peek().is_some() {
        if level == MAX_ACCUMULATOR_PROOF_DEPTH {
            return Err(ProofError::ProofTooDeep {
                depth: level + 1,
                max: MAX_ACCUMULATOR_PROOF_DEPTH,
            });
        }

        let mut parents = Vec::with_capacity(current.len() / 2 + 1);
        let mut children = current.as_slice();

        if first_position & 1 == 1 {
            let left = left_iter
                .next()
                .ok_or(ProofError::MissingSibling { side: "left", level })?;
            parents.push(parent(left, &children[0]));
            children = &children[1..];
        }

        let mut pairs = children.chunks_exact(2);
        for pair in pairs.by_ref() {
            parents.push(parent(&pair[0], &pair[1]));
        }
        if let [last] = pairs.remainder() {
            let right = right_iter
                .next()
                .ok_or(ProofError::MissingSibling { side: "right", level })?;
            parents.push(parent(last, right));
        }

        current = parents;
        first_position >>= 1;
        level += 1;
    }

    if first_position != 0 {
        return Err(ProofError::IndexOutOfRange {
            index: first_leaf_index,
            depth: level,
        });
    }
    Ok((current[0], level))
}

/// Frontier siblings for a range proof, each bottom level first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccumulatorRangeProof {
    pub left_siblings: Vec<Hash>,
    pub right_siblings: Vec<Hash>,
}

/// An append-only accumulator kept fully in memory.
///
/// Odd levels are padded with [`ACCUMULATOR_PLACEHOLDER_HASH`], so the root of
/// `n` leaves matches the tree the verifiers above fold.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAccumulator {
    leaves: Vec<Hash>,
}

impl InMemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: impl IntoIterator<Item = Hash>) -> Self {
        Self {
            leaves: leaves.into_iter().collect(),
        }
    }

    /// Append a leaf and return its index.
    pub fn append(&mut self, leaf_hash: Hash) -> u64 {
        self.leaves.push(leaf_hash);
        (self.leaves.len() - 1) as u64
    }

    pub fn num_leaves(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn root(&self) -> Hash {
        match self.levels().last() {
            Some(top) => top[0],
            None => ACCUMULATOR_PLACEHOLDER_HASH,
        }
    }

    /// Sibling path for one leaf, bottom level first.
    pub fn proof(&self, leaf_index: u64) -> Option<Vec<Hash>> {
        let mut position = usize::try_from(leaf_index).ok()?;
        if position >= self.leaves.len() {
            return None;
        }

        let levels = self.levels();
        let mut siblings = Vec::with_capacity(levels.len() - 1);
        for level in &levels[..levels.len() - 1] {
            siblings.push(level[position ^ 1]);
            position >>= 1;
        }
        Some(siblings)
    }

    /// Frontier siblings for `count` leaves starting at `first_leaf_index`.
    pub fn range_proof(&self, first_leaf_index: u64, count: usize) -> Option<AccumulatorRangeProof> {
        let first = usize::try_from(first_leaf_index).ok()?;
        let end = first.checked_add(count)?;
        if count == 0 || end > self.leaves.len() {
            return None;
        }

        let levels = self.levels();
        let mut proof = AccumulatorRangeProof::default();
        let (mut lo, mut hi) = (first, end - 1);
        for level in &levels[..levels.len() - 1] {
            if lo & 1 == 1 {
                proof.left_siblings.push(level[lo - 1]);
            }
            if hi & 1 == 0 {
                proof.right_siblings.push(level[hi + 1]);
            }
            lo >>= 1;
            hi >>= 1;
        }
        Some(proof)
    }

    /// Every level from the leaves up to the root, odd levels padded.
    fn levels(&self) -> Vec<Vec<Hash>> {
        if self.leaves.is_empty() {
            return Vec::new();
        }

        let mut levels = Vec::new();
        let mut current = self.leaves.clone();
        while current.len() > 1 {
            if current.len() % 2 == 1 {
                current.push(ACCUMULATOR_PLACEHOLDER_HASH);
            }
            let next = current
                .chunks_exact(2)
                .map(|pair| parent(&pair[0], &pair[1]))
                .collect();
            levels.push(std::mem::replace(&mut current, next));
        }
        levels.push(current);
        levels
    }
}
