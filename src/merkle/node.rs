//! Merkle trie node types.

use tiny_keccak::{Hasher, Keccak};

use super::rlp_encode::RlpEncoder;
use crate::data::hex_to_compact;

/// Hash size (Keccak-256).
pub const HASH_SIZE: usize = 32;

/// Computes the Keccak-256 hash of `data`.
pub fn keccak256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; HASH_SIZE];
    hasher.finalize(&mut hash);
    hash
}

/// The empty trie root, Keccak-256 of the RLP empty string.
pub const EMPTY_ROOT: [u8; HASH_SIZE] = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6,
    0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0,
    0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Reference to a child node.
///
/// Per the MPT spec a child whose RLP encoding reaches 32 bytes is referred
/// to by its Keccak-256 digest; shorter encodings are embedded verbatim in
/// the parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildRef {
    /// No child in this slot.
    Empty,
    /// Child referred to by digest.
    Hash([u8; HASH_SIZE]),
    /// Child embedded inline; holds the child's own RLP encoding.
    Inline(Vec<u8>),
}

impl ChildRef {
    /// Builds a reference from an encoded node, hashing it when it is too
    /// large to embed.
    pub fn from_encoded(encoded: Vec<u8>) -> Self {
        if encoded.len() >= HASH_SIZE {
            ChildRef::Hash(keccak256(&encoded))
        } else {
            ChildRef::Inline(encoded)
        }
    }

    /// Returns true if no child is present.
    pub fn is_empty(&self) -> bool {
        matches!(self, ChildRef::Empty)
    }

    fn encode_to(&self, encoder: &mut RlpEncoder) {
        match self {
            ChildRef::Hash(hash) => encoder.encode_bytes(hash),
            ChildRef::Inline(encoded) => encoder.encode_raw(encoded),
            ChildRef::Empty => encoder.encode_empty(),
        }
    }
}

/// A node of the reference Merkle Patricia Trie.
#[derive(Clone, Debug)]
pub enum Node {
    /// Absent node.
    Empty,
    /// Remainder of a key plus its value.
    Leaf {
        /// Remaining nibbles below the parent.
        path: Vec<u8>,
        /// The stored value.
        value: Vec<u8>,
    },
    /// Shared path prefix ahead of a single child.
    Extension {
        /// Shared prefix nibbles.
        path: Vec<u8>,
        /// The child all covered keys continue into.
        child: ChildRef,
    },
    /// Sixteen-way fan-out with an optional value for a key ending here.
    Branch {
        /// One slot per nibble.
        children: Box<[ChildRef; 16]>,
        /// Value of a key that ends at this branch.
        value: Option<Vec<u8>>,
    },
}

impl Node {
    /// Creates a leaf node.
    pub fn leaf(path: Vec<u8>, value: Vec<u8>) -> Self {
        Node::Leaf { path, value }
    }

    /// Creates an extension node.
    pub fn extension(path: Vec<u8>, child: ChildRef) -> Self {
        Node::Extension { path, child }
    }

    /// Creates a branch node with no children.
    pub fn branch() -> Self {
        Node::Branch {
            children: Box::new(std::array::from_fn(|_| ChildRef::Empty)),
            value: None,
        }
    }

    /// RLP-encodes the node.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = RlpEncoder::new();
        self.encode_to(&mut encoder);
        encoder.into_bytes()
    }

    /// RLP-encodes the node into `encoder`.
    pub fn encode_to(&self, encoder: &mut RlpEncoder) {
        match self {
            Node::Empty => encoder.encode_empty(),
            Node::Leaf { path, value } => encoder.encode_list(|e| {
                e.encode_bytes(&hex_to_compact(path, true));
                e.encode_bytes(value);
            }),
            Node::Extension { path, child } => encoder.encode_list(|e| {
                e.encode_bytes(&hex_to_compact(path, false));
                child.encode_to(e);
            }),
            Node::Branch { children, value } => encoder.encode_list(|e| {
                for child in children.iter() {
                    child.encode_to(e);
                }
                match value {
                    Some(value) => e.encode_bytes(value),
                    None => e.encode_empty(),
                }
            }),
        }
    }

    /// Keccak-256 of the node's encoding, regardless of its size. Used for
    /// the root, which is always referred to by digest.
    pub fn keccak(&self) -> [u8; HASH_SIZE] {
        keccak256(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_root_constant() {
        // Keccak-256 of the RLP empty string.
        assert_eq!(keccak256(&[0x80]), EMPTY_ROOT);
    }

    #[test]
    fn short_leaf_stays_inline() {
        let node = Node::leaf(vec![1, 2], vec![0xAB]);
        let encoded = node.encode();
        assert!(encoded.len() < HASH_SIZE);
        assert_eq!(ChildRef::from_encoded(encoded.clone()), ChildRef::Inline(encoded));
    }

    #[test]
    fn large_leaf_is_hashed() {
        let node = Node::leaf(vec![1, 2, 3, 4], vec![0u8; 100]);
        let encoded = node.encode();
        assert_eq!(
            ChildRef::from_encoded(encoded.clone()),
            ChildRef::Hash(keccak256(&encoded))
        );
    }

    #[test]
    fn branch_encoding_has_seventeen_entries() {
        // An empty branch is seventeen empty strings in a list.
        let node = Node::branch();
        let mut expected: Vec<u8> = vec![0xC0 + 17];
        expected.extend(std::iter::repeat(0x80u8).take(17));
        assert_eq!(node.encode(), expected);
    }
}
