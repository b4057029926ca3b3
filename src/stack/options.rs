//! Sink configuration for the streaming builder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::merkle::HASH_SIZE;

/// Callback receiving finished nodes: trie path (nibbles from the root,
/// without terminator), digest, and RLP blob. The blob is borrowed from
/// the builder's scratch buffer and must be copied if retained.
pub type NodeWriter = Box<dyn FnMut(&[u8], [u8; HASH_SIZE], &[u8])>;

/// Callback receiving paths that lie in the interior of a committed
/// extension node and must not survive in any path-indexed store.
pub type PathCleaner = Box<dyn FnMut(&[u8])>;

/// Sinks and boundary filters for a [`StackTrie`](super::StackTrie).
///
/// All callbacks run synchronously on the caller's thread, inside
/// `update` or `hash`; a blocking callback blocks the builder.
#[derive(Default)]
pub struct StackTrieOptions {
    pub(crate) writer: Option<NodeWriter>,
    pub(crate) cleaner: Option<PathCleaner>,
    pub(crate) skip_left_boundary: bool,
    pub(crate) skip_right_boundary: bool,
    pub(crate) boundary_counter: Option<Arc<AtomicU64>>,
}

impl StackTrieOptions {
    /// Creates empty options: no sinks, no boundary filtering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the writer that commits finished nodes. Without a writer the
    /// builder only computes the root.
    pub fn with_writer(
        mut self,
        writer: impl FnMut(&[u8], [u8; HASH_SIZE], &[u8]) + 'static,
    ) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Sets the cleaner invoked for dangling paths covered by committed
    /// extension nodes.
    pub fn with_cleaner(mut self, cleaner: impl FnMut(&[u8]) + 'static) -> Self {
        self.cleaner = Some(Box::new(cleaner));
        self
    }

    /// Configures boundary filtering: nodes whose path is a prefix of the
    /// first (left) or last (right) inserted key are withheld from the
    /// writer. The counter, when present, tracks how many nodes were
    /// withheld.
    pub fn with_skip_boundary(
        mut self,
        skip_left: bool,
        skip_right: bool,
        counter: Option<Arc<AtomicU64>>,
    ) -> Self {
        self.skip_left_boundary = skip_left;
        self.skip_right_boundary = skip_right;
        self.boundary_counter = counter;
        self
    }

    /// Applies the boundary filters and delivers a finished node, flushing
    /// dangling-path cleanups first.
    pub(crate) fn commit(
        &mut self,
        first: Option<&[u8]>,
        last: Option<&[u8]>,
        path: &[u8],
        hash: &[u8; HASH_SIZE],
        blob: &[u8],
        internal: &[Vec<u8>],
    ) {
        if self.writer.is_none() {
            return;
        }
        if self.skip_left_boundary && first.is_some_and(|first| first.starts_with(path)) {
            self.count_boundary();
            return;
        }
        if self.skip_right_boundary && last.is_some_and(|last| last.starts_with(path)) {
            self.count_boundary();
            return;
        }
        // Dangling paths must be dropped before the node covering them is
        // written, keeping the stream bottom-up for the consumer.
        if let Some(cleaner) = &mut self.cleaner {
            for interior in internal {
                cleaner(interior);
            }
        }
        tracing::trace!(depth = path.len(), blob_len = blob.len(), "commit trie node");
        if let Some(writer) = &mut self.writer {
            writer(path, *hash, blob);
        }
    }

    fn count_boundary(&self) {
        if let Some(counter) = &self.boundary_counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
