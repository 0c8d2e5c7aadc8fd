//! Binary Merkle tree over ledger entries.
//!
//! Leaves are SHA-256 digests of each entry's decimal text.  Parents hash the
//! concatenated hex of their two children.  When a level has an odd number of
//! nodes the last one is paired with itself; it is never promoted unchanged
//! and never padded with zeros, so roots stay interoperable with existing
//! proof strings.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::error::{LedgerError, Result};
use crate::hash::{digest_decimal, hash_pair};

#[cfg(not(target_arch = "wasm32"))]
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Fully materialised Merkle tree.  `levels[0]` holds the leaves and the last
/// level holds exactly one node, the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Builds the tree over `items` in order.
    pub fn build(items: &[u64]) -> Result<Self> {
        if items.is_empty() {
            return Err(LedgerError::EmptyInput);
        }
        let mut levels = vec![hash_leaves(items)];
        loop {
            let top = &levels[levels.len() - 1];
            if top.len() == 1 {
                break;
            }
            let next = combine_level(top);
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// Root hash of the tree.
    pub fn root(&self) -> &str {
        // `build` guarantees at least one level and a single-node top level.
        &self.levels[self.levels.len() - 1][0]
    }

    /// Consumes the tree and returns its root.
    pub fn into_root(mut self) -> String {
        let mut top = self.levels.pop().unwrap_or_default();
        top.pop().unwrap_or_default()
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Nodes at `index`, where level 0 is the leaf level.
    pub fn level(&self, index: usize) -> Option<&[String]> {
        self.levels.get(index).map(Vec::as_slice)
    }

    /// Number of levels including the leaf and root levels.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Number of leaves the tree commits to.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }
}

/// Convenience wrapper returning only the root of `items`.
pub fn merkle_root(items: &[u64]) -> Result<String> {
    MerkleTree::build(items).map(MerkleTree::into_root)
}

fn hash_leaves(items: &[u64]) -> Vec<String> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if items.len() >= PARALLEL_THRESHOLD && rayon::current_num_threads() > 1 {
            return items.par_iter().map(|item| digest_decimal(*item)).collect();
        }
    }
    items.iter().map(|item| digest_decimal(*item)).collect()
}

fn combine_level(level: &[String]) -> Vec<String> {
    let pair = |chunk: &[String]| match chunk {
        [left, right] => hash_pair(left, right),
        [single] => hash_pair(single, single),
        _ => unreachable!("chunks(2) yields one or two nodes"),
    };
    #[cfg(not(target_arch = "wasm32"))]
    {
        if level.len() >= PARALLEL_THRESHOLD && rayon::current_num_threads() > 1 {
            return level.par_chunks(2).map(pair).collect();
        }
    }
    level.chunks(2).map(pair).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest_decimal;
    use proptest::prelude::*;

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(MerkleTree::build(&[]), Err(LedgerError::EmptyInput)));
    }

    #[test]
    fn single_item_root_is_its_leaf() {
        let tree = MerkleTree::build(&[7]).unwrap();
        assert_eq!(tree.root(), digest_decimal(7));
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn dangling_node_pairs_with_itself() {
        let tree = MerkleTree::build(&[2, 3, 5]).unwrap();
        let (a, b, c) = (digest_decimal(2), digest_decimal(3), digest_decimal(5));
        let ab = hash_pair(&a, &b);
        let cc = hash_pair(&c, &c);
        assert_eq!(tree.level(1).unwrap(), &[ab.clone(), cc.clone()]);
        assert_eq!(tree.root(), hash_pair(&ab, &cc));
        assert_eq!(tree.height(), 3);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn five_leaves_build_four_levels() {
        let tree = MerkleTree::build(&[2, 3, 5, 7, 11]).unwrap();
        let widths: Vec<usize> = tree.levels().iter().map(Vec::len).collect();
        assert_eq!(widths, vec![5, 3, 2, 1]);
        assert_eq!(merkle_root(&[2, 3, 5, 7, 11]).unwrap(), tree.root());
    }

    #[test]
    fn parallel_path_matches_sequential_definition() {
        let items: Vec<u64> = (1..=(PARALLEL_THRESHOLD as u64 + 3)).collect();
        let tree = MerkleTree::build(&items).unwrap();
        let expected: Vec<String> = items.iter().map(|v| digest_decimal(*v)).collect();
        assert_eq!(tree.level(0).unwrap(), expected.as_slice());
        let manual: Vec<String> = expected
            .chunks(2)
            .map(|c| hash_pair(&c[0], c.get(1).unwrap_or(&c[0])))
            .collect();
        assert_eq!(tree.level(1).unwrap(), manual.as_slice());
    }

    proptest! {
        #[test]
        fn root_is_deterministic(items in proptest::collection::vec(any::<u64>(), 1..64)) {
            let first = merkle_root(&items).unwrap();
            let second = merkle_root(&items).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn swapping_distinct_items_changes_root(
            items in proptest::collection::vec(any::<u64>(), 2..64),
            i in any::<prop::sample::Index>(),
            j in any::<prop::sample::Index>(),
        ) {
            let (i, j) = (i.index(items.len()), j.index(items.len()));
            prop_assume!(items[i] != items[j]);
            let mut swapped = items.clone();
            swapped.swap(i, j);
            prop_assert_ne!(merkle_root(&items).unwrap(), merkle_root(&swapped).unwrap());
        }
    }
}
