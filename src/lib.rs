//! # art-cursor
//!
//! An Adaptive Radix Tree with callback traversal and seekable, bidirectional
//! cursors.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory Databases"
//! (ICDE 2013, Leis et al.)
//!
//! Nodes live in an arena and cursors hold node references instead of
//! borrows, so a tree may be mutated between two cursor steps. Each cursor
//! remembers the tree version it was created against and refuses to step once
//! that version is gone.
//!
//! ## Example
//!
//! ```rust
//! use art_cursor::{Tree, TraverseOptions, TreeCursor};
//!
//! let mut tree: Tree<u64> = Tree::new();
//! tree.insert(b"a", 1);
//! tree.insert(b"ab", 2);
//! tree.insert(b"ac", 3);
//! tree.insert(b"b", 4);
//!
//! let keys: Vec<&[u8]> = tree.iter().map(|(k, _)| k).collect();
//! let expected: [&[u8]; 4] = [b"a", b"ab", b"ac", b"b"];
//! assert_eq!(keys, expected);
//!
//! let mut cursor = tree.cursor(TraverseOptions::LEAF);
//! cursor.seek(&tree, b"aa");
//! assert_eq!(cursor.next(&tree).unwrap().key(), Some(&b"ab"[..]));
//! assert_eq!(cursor.value(&tree), Some(&2));
//!
//! tree.insert(b"c", 5);
//! assert!(cursor.next(&tree).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
mod debug;
pub mod error;
pub mod node;
mod shared;
pub mod traverse;
mod tree;

pub use cursor::{Cursor, FilteredCursor, Iter, RawCursor, TreeCursor};
pub use debug::TreeStats;
pub use error::{Error, Result};
pub use node::{Node, NodeKind, NodeRef, Prefix, MAX_PREFIX_LEN};
pub use shared::SharedTree;
pub use traverse::{traverse_filter, TraverseOptions};
pub use tree::Tree;

/// Configuration for a [`Tree`].
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Initial capacity hint for the node arena.
    pub initial_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { initial_capacity: 64 }
    }
}

#[cfg(test)]
mod proptests;
