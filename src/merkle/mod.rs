//! Merkle trie primitives: Keccak hashing, RLP encoding and the in-memory
//! reference trie used as the oracle for the streaming builder.

mod node;
mod rlp_encode;
mod trie;


pub use node::{keccak256, ChildRef, Node, EMPTY_ROOT, HASH_SIZE};
pub use rlp_encode::RlpEncoder;
pub use trie::MerkleTrie;
