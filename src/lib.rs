//! # stacktrie
//!
//! A streaming Merkle Patricia Trie builder for sorted key/value streams.
//!
//! Keys inserted in strictly increasing order let the builder prove, at
//! each insert, that everything to the left of the current path is final.
//! Those subtrees are RLP-encoded, hashed, optionally handed to a writer
//! sink, and their records returned to a shared pool. Live memory stays
//! proportional to the key length instead of the entry count.
//!
//! ## Modules
//!
//! - `data` - nibble-path expansion and compact (hex-prefix) encoding
//! - `merkle` - Keccak-256, RLP encoding and the in-memory reference trie
//! - `stack` - the streaming builder, its node pool and sink options
//!
//! ## Example
//!
//! ```
//! use stacktrie::StackTrie;
//!
//! let mut trie = StackTrie::new();
//! trie.update(b"\x01", b"one").unwrap();
//! trie.update(b"\x02", b"two").unwrap();
//! let root = trie.hash();
//! assert_eq!(root.len(), 32);
//! ```

pub mod data;
pub mod merkle;
pub mod stack;

pub use stack::{StackTrie, StackTrieError, StackTrieOptions};
