//! Core data structures for trie navigation.

mod nibbles;

pub use nibbles::{hex_to_compact, hex_to_compact_in_place, key_to_nibbles, TERMINATOR};
