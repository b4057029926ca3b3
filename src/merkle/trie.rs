//! In-memory reference Merkle Patricia Trie.
//!
//! Entries live in a hash map; the root is recomputed on demand by sorting
//! the nibble-expanded keys and building nodes recursively. This is the
//! oracle the streaming builder is checked against: it accepts any insert
//! order, overwrites, and keys of mixed lengths (values for keys ending at
//! a branch land in the branch's value slot).
//!
//! Uses hashbrown with FxHash for the entry map; keys are typically
//! keccak256 outputs already, so a fast non-cryptographic hasher is safe.

use hashbrown::HashMap;
use rayon::prelude::*;
use rustc_hash::FxBuildHasher;

use super::node::{ChildRef, Node, EMPTY_ROOT, HASH_SIZE};
use crate::data::key_to_nibbles;

type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// A simple in-memory Merkle Patricia Trie.
pub struct MerkleTrie {
    /// Key bytes to value bytes.
    data: FastHashMap<Vec<u8>, Vec<u8>>,
    /// Cached root hash, invalidated on changes.
    root_cache: Option<[u8; HASH_SIZE]>,
}

impl MerkleTrie {
    /// Creates a new empty trie.
    pub fn new() -> Self {
        Self {
            data: FastHashMap::with_hasher(FxBuildHasher),
            root_cache: Some(EMPTY_ROOT),
        }
    }

    /// Returns true if the trie holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Inserts or overwrites a key/value pair. An empty value removes the
    /// key.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            self.data.remove(key);
        } else {
            self.data.insert(key.to_vec(), value);
        }
        self.root_cache = None;
    }

    /// Gets a value by key.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(|v| v.as_slice())
    }

    /// Iterates over all key/value pairs, in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.data.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Computes and caches the root hash.
    pub fn root_hash(&mut self) -> [u8; HASH_SIZE] {
        if let Some(cached) = self.root_cache {
            return cached;
        }
        let hash = self.compute_root();
        self.root_cache = Some(hash);
        hash
    }

    fn compute_root(&self) -> [u8; HASH_SIZE] {
        if self.data.is_empty() {
            return EMPTY_ROOT;
        }
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .iter()
            .map(|(key, value)| {
                let mut nibbles = key_to_nibbles(key);
                nibbles.pop();
                (nibbles, value.clone())
            })
            .collect();
        entries.par_sort_unstable();
        build_node(&entries, 0).keccak()
    }
}

impl Default for MerkleTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the node covering `entries`, all of which share their first
/// `depth` nibbles. Entries must be sorted by nibble path.
fn build_node(entries: &[(Vec<u8>, Vec<u8>)], depth: usize) -> Node {
    if entries.is_empty() {
        return Node::Empty;
    }
    if entries.len() == 1 {
        let (nibbles, value) = &entries[0];
        return Node::leaf(nibbles[depth..].to_vec(), value.clone());
    }

    let common = common_prefix_len(entries, depth);
    if common > 0 {
        let prefix = entries[0].0[depth..depth + common].to_vec();
        let child = build_node(entries, depth + common);
        return Node::extension(prefix, ChildRef::from_encoded(child.encode()));
    }

    let mut children: Box<[ChildRef; 16]> = Box::new(std::array::from_fn(|_| ChildRef::Empty));
    let mut value = None;

    // A key ending exactly at this depth sorts first and becomes the
    // branch value.
    let mut rest = entries;
    if rest[0].0.len() == depth {
        value = Some(rest[0].1.clone());
        rest = &rest[1..];
    }

    let mut start = 0;
    while start < rest.len() {
        let nibble = rest[start].0[depth];
        let mut end = start + 1;
        while end < rest.len() && rest[end].0[depth] == nibble {
            end += 1;
        }
        let child = build_node(&rest[start..end], depth + 1);
        children[nibble as usize] = ChildRef::from_encoded(child.encode());
        start = end;
    }

    Node::Branch { children, value }
}

/// Length of the nibble prefix shared by every entry past `depth`. Zero if
/// any entry ends at `depth`.
fn common_prefix_len(entries: &[(Vec<u8>, Vec<u8>)], depth: usize) -> usize {
    let first = &entries[0].0;
    let mut common = first.len().saturating_sub(depth);
    for (nibbles, _) in &entries[1..] {
        let limit = common.min(nibbles.len().saturating_sub(depth));
        let mut shared = 0;
        while shared < limit && nibbles[depth + shared] == first[depth + shared] {
            shared += 1;
        }
        common = shared;
        if common == 0 {
            break;
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trie() {
        let mut trie = MerkleTrie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn single_entry() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"key", b"value".to_vec());

        assert_eq!(trie.get(b"key"), Some(b"value".as_slice()));
        assert_ne!(trie.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn mixed_length_keys() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"do", b"verb".to_vec());
        trie.insert(b"dog", b"puppy".to_vec());
        trie.insert(b"doge", b"coin".to_vec());
        trie.insert(b"horse", b"stallion".to_vec());

        assert_eq!(trie.len(), 4);
        assert_eq!(trie.get(b"dog"), Some(b"puppy".as_slice()));
        assert_ne!(trie.root_hash(), EMPTY_ROOT);
    }

    #[test]
    fn order_independent_root() {
        let mut forward = MerkleTrie::new();
        let mut backward = MerkleTrie::new();
        for i in 0..100u32 {
            forward.insert(&i.to_be_bytes(), format!("v{i}").into_bytes());
        }
        for i in (0..100u32).rev() {
            backward.insert(&i.to_be_bytes(), format!("v{i}").into_bytes());
        }
        assert_eq!(forward.root_hash(), backward.root_hash());
    }

    #[test]
    fn overwrite_changes_root() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"key", b"one".to_vec());
        let before = trie.root_hash();
        trie.insert(b"key", b"two".to_vec());
        assert_ne!(trie.root_hash(), before);
    }

    #[test]
    fn empty_value_removes() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"key", b"value".to_vec());
        trie.insert(b"key", Vec::new());
        assert!(trie.is_empty());
        assert_eq!(trie.root_hash(), EMPTY_ROOT);
    }
}
