//! Streaming Merkle Patricia Trie builder.
//!
//! Keys must be inserted in strictly increasing order. Whenever an insert
//! proves that a subtree can no longer be touched, the subtree is encoded,
//! hashed and handed to the configured writer, and its records return to
//! the node pool. The live tree is only ever the path from the root to the
//! most recently inserted key.

use thiserror::Error;

use super::node::{self, NodeKind, StNode};
use super::options::StackTrieOptions;
use crate::data::{hex_to_compact_in_place, key_to_nibbles, TERMINATOR};
use crate::merkle::{keccak256, RlpEncoder, EMPTY_ROOT, HASH_SIZE};

/// Errors surfaced by [`StackTrie::update`]. Any error leaves the builder
/// in an undefined state; only [`StackTrie::reset`] makes it usable again.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackTrieError {
    /// The key is already present; overwrites are not supported.
    #[error("key already inserted")]
    DuplicateKey,
    /// The key sorts before a previously inserted key.
    #[error("key is not in ascending order")]
    OutOfOrderKey,
    /// The value is empty; deletions are not supported.
    #[error("deletion not supported")]
    DeletionUnsupported,
    /// The insert descended into an already finalized subtree.
    #[error("insert reached a hashed subtree")]
    InvariantBroken,
}

/// An append-only trie builder for sorted key/value streams.
///
/// ```
/// use stacktrie::StackTrie;
///
/// let mut trie = StackTrie::new();
/// trie.update(&[0x10], &[0x01]).unwrap();
/// trie.update(&[0x12], &[0x02]).unwrap();
/// let root = trie.hash();
/// # let _ = root;
/// ```
pub struct StackTrie {
    options: StackTrieOptions,
    root: Option<Box<StNode>>,
    /// Scratch buffer reused for every node encoding.
    encoder: RlpEncoder,
    /// Nibble path of the first inserted key, the left boundary.
    first: Option<Vec<u8>>,
    /// Nibble path of the last inserted key, the right boundary.
    last: Option<Vec<u8>>,
}

impl StackTrie {
    /// Creates a builder with no sinks configured; it only computes the
    /// root.
    pub fn new() -> Self {
        Self::with_options(StackTrieOptions::new())
    }

    /// Creates a builder delivering finished nodes per `options`.
    pub fn with_options(options: StackTrieOptions) -> Self {
        Self {
            options,
            root: Some(node::acquire()),
            encoder: RlpEncoder::with_capacity(128),
            first: None,
            last: None,
        }
    }

    /// Inserts a key/value pair. Keys must arrive in strictly increasing
    /// byte order and values must be non-empty.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), StackTrieError> {
        if value.is_empty() {
            return Err(StackTrieError::DeletionUnsupported);
        }
        let mut k = key_to_nibbles(key);
        k.pop(); // navigation paths never carry the terminator
        if let Some(last) = &self.last {
            if k.as_slice() < last.as_slice() {
                return Err(StackTrieError::OutOfOrderKey);
            }
        }
        if self.first.is_none() {
            self.first = Some(k.clone());
        }
        match &mut self.last {
            Some(last) => {
                last.clear();
                last.extend_from_slice(&k);
            }
            None => self.last = Some(k.clone()),
        }

        let mut root = self.take_root();
        let mut path = Vec::with_capacity(k.len());
        let result = self.insert_node(&mut root, &k, value, &mut path);
        self.root = Some(root);
        result
    }

    /// Finalizes the remaining right-frontier nodes and returns the root
    /// digest. For an empty trie this is the canonical empty-root
    /// constant. Calling it again without intervening inserts returns the
    /// same digest.
    pub fn hash(&mut self) -> [u8; HASH_SIZE] {
        let mut root = self.take_root();
        let mut path = Vec::new();
        self.hash_node(&mut root, &mut path);
        let mut digest = [0u8; HASH_SIZE];
        digest.copy_from_slice(&root.val);
        self.root = Some(root);
        tracing::trace!(root = ?digest, "stack trie finalized");
        digest
    }

    /// Identical to [`hash`](StackTrie::hash): most nodes were already
    /// committed during inserts, so finalizing only flushes the right
    /// boundary.
    pub fn commit(&mut self) -> [u8; HASH_SIZE] {
        self.hash()
    }

    /// Returns every live node to the pool and clears options and
    /// boundary tracking, leaving the builder ready for a fresh run.
    pub fn reset(&mut self) {
        if let Some(root) = self.root.take() {
            node::release(root);
        }
        self.root = Some(node::acquire());
        self.options = StackTrieOptions::new();
        self.first = None;
        self.last = None;
    }

    fn take_root(&mut self) -> Box<StNode> {
        self.root.take().unwrap_or_else(node::acquire)
    }

    /// Descends to the insertion point for `key`, restructuring nodes on
    /// the way and finalizing every subtree that falls left of the new
    /// key. `path` holds the absolute nibble path of `st`.
    fn insert_node(
        &mut self,
        st: &mut StNode,
        key: &[u8],
        value: &[u8],
        path: &mut Vec<u8>,
    ) -> Result<(), StackTrieError> {
        match st.kind {
            NodeKind::Branch => {
                let idx = key[0] as usize;

                // The nearest elder sibling can no longer receive inserts;
                // finalize it and free its subtree.
                for i in (0..idx).rev() {
                    if let Some(child) = st.children[i].as_deref_mut() {
                        if child.kind != NodeKind::Hashed {
                            path.push(i as u8);
                            self.hash_node(child, path);
                            path.pop();
                        }
                        break;
                    }
                }

                match &mut st.children[idx] {
                    slot @ None => {
                        *slot = Some(StNode::leaf(&key[1..], value));
                        Ok(())
                    }
                    Some(child) => {
                        path.push(key[0]);
                        let result = self.insert_node(child, &key[1..], value, path);
                        path.pop();
                        result
                    }
                }
            }
            NodeKind::Extension => {
                let diff = st.diff_index(key);
                if diff == st.key.len() {
                    // Full prefix match, descend into the child.
                    path.extend_from_slice(&key[..diff]);
                    let child = st.children[0]
                        .as_deref_mut()
                        .expect("extension node has a child");
                    let result = self.insert_node(child, &key[diff..], value, path);
                    path.truncate(path.len() - diff);
                    return result;
                }

                // Split. The preserved tail of the original extension can
                // never be touched again, so it is hashed right away:
                // either wrapped in an intermediate extension when the
                // break leaves more than one nibble, or as the bare child.
                let child = st.children[0].take().expect("extension node has a child");
                let tail = if diff < st.key.len() - 1 {
                    let mut tail = StNode::extension(&st.key[diff + 1..], child);
                    path.extend_from_slice(&st.key[..diff + 1]);
                    self.hash_node(&mut tail, path);
                    path.truncate(path.len() - (diff + 1));
                    tail
                } else {
                    let mut tail = child;
                    path.extend_from_slice(&st.key);
                    self.hash_node(&mut tail, path);
                    path.truncate(path.len() - st.key.len());
                    tail
                };

                let orig_idx = st.key[diff] as usize;
                let new_idx = key[diff] as usize;
                let leaf = StNode::leaf(&key[diff + 1..], value);

                // The divergence lives in a branch: the node itself when
                // the break is on the first nibble, a fresh child branch
                // under the shortened extension otherwise.
                let branch: &mut StNode = if diff == 0 {
                    st.kind = NodeKind::Branch;
                    st.key.clear();
                    st
                } else {
                    st.key.truncate(diff);
                    st.children[0].insert(StNode::branch())
                };
                branch.children[orig_idx] = Some(tail);
                branch.children[new_idx] = Some(leaf);
                Ok(())
            }
            NodeKind::Leaf => {
                let diff = st.diff_index(key);
                if diff >= st.key.len() {
                    return Err(StackTrieError::DuplicateKey);
                }

                let orig_idx = st.key[diff] as usize;
                let new_idx = key[diff] as usize;

                // The displaced value is hashed immediately; this is the
                // moment it leaves live memory.
                let orig_val = std::mem::take(&mut st.val);
                let mut orig = StNode::leaf(&st.key[diff + 1..], &orig_val);
                path.extend_from_slice(&st.key[..diff + 1]);
                self.hash_node(&mut orig, path);
                path.truncate(path.len() - (diff + 1));

                let leaf = StNode::leaf(&key[diff + 1..], value);
                let branch: &mut StNode = if diff == 0 {
                    st.kind = NodeKind::Branch;
                    st.key.clear();
                    st
                } else {
                    st.kind = NodeKind::Extension;
                    st.key.truncate(diff);
                    st.children[0].insert(StNode::branch())
                };
                branch.children[orig_idx] = Some(orig);
                branch.children[new_idx] = Some(leaf);
                Ok(())
            }
            NodeKind::Empty => {
                st.kind = NodeKind::Leaf;
                st.key.extend_from_slice(key);
                st.val.extend_from_slice(value);
                Ok(())
            }
            NodeKind::Hashed => Err(StackTrieError::InvariantBroken),
        }
    }

    /// Encodes and finalizes `st`, turning it into a hashed record whose
    /// value is the 32-byte digest or, for sub-32-byte non-root nodes, the
    /// encoding itself. Children are finalized first and released to the
    /// pool; nodes hashed to a digest are offered to the sink.
    fn hash_node(&mut self, st: &mut StNode, path: &mut Vec<u8>) {
        if st.kind == NodeKind::Hashed {
            return;
        }
        // Former node locations covered by an extension, owed to the
        // cleaner before this node is written.
        let mut internal: Vec<Vec<u8>> = Vec::new();

        match st.kind {
            NodeKind::Branch => {
                // Finalize the children, keep only their references, and
                // return their records to the pool.
                let mut refs: [Option<Vec<u8>>; 16] = Default::default();
                for i in 0..16 {
                    let Some(mut child) = st.children[i].take() else {
                        continue;
                    };
                    path.push(i as u8);
                    self.hash_node(&mut child, path);
                    path.pop();
                    refs[i] = Some(std::mem::take(&mut child.val));
                    node::release(child);
                }

                self.encoder.clear();
                let list = self.encoder.start_list();
                for slot in &refs {
                    match slot {
                        Some(val) if val.len() < HASH_SIZE => self.encoder.encode_raw(val),
                        Some(val) => self.encoder.encode_bytes(val),
                        None => self.encoder.encode_empty(),
                    }
                }
                // The seventeenth entry is the value slot; this builder
                // never stores values inside branches.
                self.encoder.encode_empty();
                self.encoder.finish_list(list);
            }
            NodeKind::Extension => {
                let mut child = st.children[0].take().expect("extension node has a child");
                path.extend_from_slice(&st.key);
                self.hash_node(&mut child, path);
                path.truncate(path.len() - st.key.len());

                // The child landed on disk under its full path, so the
                // interior positions of this extension's path must not
                // survive in a path-indexed store.
                if child.val.len() >= HASH_SIZE && self.options.cleaner.is_some() {
                    for i in 1..st.key.len() {
                        let mut interior = Vec::with_capacity(path.len() + i);
                        interior.extend_from_slice(path);
                        interior.extend_from_slice(&st.key[..i]);
                        internal.push(interior);
                    }
                }
                let child_ref = std::mem::take(&mut child.val);
                node::release(child);

                let compact_len = hex_to_compact_in_place(&mut st.key);
                self.encoder.clear();
                let list = self.encoder.start_list();
                self.encoder.encode_bytes(&st.key[..compact_len]);
                if child_ref.len() < HASH_SIZE {
                    self.encoder.encode_raw(&child_ref);
                } else {
                    self.encoder.encode_bytes(&child_ref);
                }
                self.encoder.finish_list(list);
            }
            NodeKind::Leaf => {
                st.key.push(TERMINATOR);
                let compact_len = hex_to_compact_in_place(&mut st.key);
                self.encoder.clear();
                let list = self.encoder.start_list();
                self.encoder.encode_bytes(&st.key[..compact_len]);
                self.encoder.encode_bytes(&st.val);
                self.encoder.finish_list(list);
            }
            NodeKind::Empty => {
                st.key.clear();
                st.val.clear();
                st.val.extend_from_slice(&EMPTY_ROOT);
                st.kind = NodeKind::Hashed;
                return;
            }
            NodeKind::Hashed => return,
        }

        st.key.clear();
        st.kind = NodeKind::Hashed;

        let blob = self.encoder.as_bytes();
        // Sub-32-byte encodings embed in their parent instead of standing
        // alone; only the root is forced to a digest.
        if blob.len() < HASH_SIZE && !path.is_empty() {
            st.val.clear();
            st.val.extend_from_slice(blob);
            return;
        }
        let digest = keccak256(blob);
        st.val.clear();
        st.val.extend_from_slice(&digest);
        self.options.commit(
            self.first.as_deref(),
            self.last.as_deref(),
            path,
            &digest,
            blob,
            &internal,
        );
    }
}

impl Default for StackTrie {
    fn default() -> Self {
        Self::new()
    }
}
