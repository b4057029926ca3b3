//! Frontier node records and the shared node pool.

use parking_lot::Mutex;

/// Role of a frontier record. The other fields are interpreted per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Uninitialized; only the root starts out like this.
    Empty,
    /// Key remainder plus value.
    Leaf,
    /// Shared key chunk ahead of a single child, kept in `children[0]`.
    Extension,
    /// Sixteen-way fan-out.
    Branch,
    /// Finalized. `val` holds the digest, or the node's own encoding when
    /// it is short enough to embed in its parent.
    Hashed,
}

/// A node on the live frontier of the builder.
///
/// One record shape serves every kind so that cleared records can be
/// reused in any role.
pub(crate) struct StNode {
    pub(crate) kind: NodeKind,
    /// Key chunk covered by a leaf or extension.
    pub(crate) key: Vec<u8>,
    /// Leaf value, or the digest / inline encoding once hashed.
    pub(crate) val: Vec<u8>,
    pub(crate) children: [Option<Box<StNode>>; 16],
}

impl StNode {
    fn empty() -> Self {
        Self {
            kind: NodeKind::Empty,
            key: Vec::new(),
            val: Vec::new(),
            children: Default::default(),
        }
    }

    /// Builds a leaf over a pooled record. Key and value are copied.
    pub(crate) fn leaf(key: &[u8], val: &[u8]) -> Box<StNode> {
        let mut node = acquire();
        node.kind = NodeKind::Leaf;
        node.key.extend_from_slice(key);
        node.val.extend_from_slice(val);
        node
    }

    /// Builds an extension over a pooled record. The key is copied.
    pub(crate) fn extension(key: &[u8], child: Box<StNode>) -> Box<StNode> {
        let mut node = acquire();
        node.kind = NodeKind::Extension;
        node.key.extend_from_slice(key);
        node.children[0] = Some(child);
        node
    }

    /// Builds an empty branch over a pooled record.
    pub(crate) fn branch() -> Box<StNode> {
        let mut node = acquire();
        node.kind = NodeKind::Branch;
        node
    }

    /// Index of the first nibble where `key` departs from this node's key
    /// chunk; the chunk length when the chunk is a prefix of `key`.
    pub(crate) fn diff_index(&self, key: &[u8]) -> usize {
        self.key
            .iter()
            .zip(key)
            .take_while(|(ours, theirs)| ours == theirs)
            .count()
    }

    fn reset(&mut self) {
        self.kind = NodeKind::Empty;
        self.key.clear();
        self.val.clear();
    }
}

/// Free list of cleared records, shared by every builder in the process.
/// The frontier is bounded by the key length, so this stays small.
static POOL: Mutex<Vec<Box<StNode>>> = Mutex::new(Vec::new());

/// Takes a cleared record from the pool, allocating when it is empty.
pub(crate) fn acquire() -> Box<StNode> {
    POOL.lock().pop().unwrap_or_else(|| Box::new(StNode::empty()))
}

/// Clears a record and returns it to the pool together with any children
/// still attached. A released record is never reachable from a live tree.
pub(crate) fn release(mut node: Box<StNode>) {
    for slot in &mut node.children {
        if let Some(child) = slot.take() {
            release(child);
        }
    }
    node.reset();
    POOL.lock().push(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_records_come_back_cleared() {
        let leaf = StNode::leaf(&[1, 2, 3], b"value");
        release(leaf);

        let node = acquire();
        assert_eq!(node.kind, NodeKind::Empty);
        assert!(node.key.is_empty());
        assert!(node.val.is_empty());
        assert!(node.children.iter().all(|c| c.is_none()));
    }

    #[test]
    fn release_detaches_children() {
        let mut branch = StNode::branch();
        branch.children[3] = Some(StNode::leaf(&[4], b"a"));
        branch.children[9] = Some(StNode::leaf(&[5], b"b"));
        release(branch);

        let node = acquire();
        assert!(node.children.iter().all(|c| c.is_none()));
    }

    #[test]
    fn diff_index_finds_divergence() {
        let leaf = StNode::leaf(&[1, 2, 3, 4], b"v");
        assert_eq!(leaf.diff_index(&[1, 2, 9, 9]), 2);
        assert_eq!(leaf.diff_index(&[1, 2, 3, 4]), 4);
        assert_eq!(leaf.diff_index(&[1, 2, 3, 4, 5]), 4);
        assert_eq!(leaf.diff_index(&[7]), 0);
    }
}
