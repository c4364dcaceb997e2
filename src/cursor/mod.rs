//! Stateful cursors over a [`Tree`].
//!
//! [`RawCursor`] yields every node, [`FilteredCursor`] only the kinds selected
//! by a [`TraverseOptions`] mask. [`Tree::cursor`] picks the right one and
//! [`Tree::iter`] wraps a leaves-only cursor in a standard [`Iterator`].

mod filtered;
mod raw;

pub use filtered::FilteredCursor;
pub use raw::RawCursor;

use crate::error::Result;
use crate::node::{Node, NodeRef};
use crate::traverse::TraverseOptions;
use crate::tree::Tree;

/// Operations shared by every cursor.
///
/// The tree is passed to every call; a cursor only stores node references and
/// a version snapshot.
pub trait TreeCursor {
    /// Whether a forward step would return a node.
    fn has_next<V>(&mut self, tree: &Tree<V>) -> bool;

    /// Step forward, returning the node's reference.
    fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef>;

    /// Whether a backward step would return a node.
    fn has_prev<V>(&mut self, tree: &Tree<V>) -> bool;

    /// Step backward, returning the node's reference.
    fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef>;

    /// Reposition before the first node ordered at or after `key`.
    fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]);

    /// Value of the leaf the cursor rests on.
    fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V>;

    /// Step forward and return the node.
    fn next<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.next_ref(tree).map(|r| tree.node(r))
    }

    /// Step backward and return the node.
    fn prev<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.prev_ref(tree).map(|r| tree.node(r))
    }
}

impl TreeCursor for RawCursor {
    fn has_next<V>(&mut self, _tree: &Tree<V>) -> bool {
        RawCursor::has_next(self)
    }

    fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        RawCursor::next_ref(self, tree)
    }

    fn has_prev<V>(&mut self, _tree: &Tree<V>) -> bool {
        RawCursor::has_prev(self)
    }

    fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        RawCursor::prev_ref(self, tree)
    }

    fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]) {
        RawCursor::seek(self, tree, key)
    }

    fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V> {
        RawCursor::value(self, tree)
    }
}

impl TreeCursor for FilteredCursor {
    fn has_next<V>(&mut self, tree: &Tree<V>) -> bool {
        FilteredCursor::has_next(self, tree)
    }

    fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        FilteredCursor::next_ref(self, tree)
    }

    fn has_prev<V>(&mut self, tree: &Tree<V>) -> bool {
        FilteredCursor::has_prev(self, tree)
    }

    fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        FilteredCursor::prev_ref(self, tree)
    }

    fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]) {
        FilteredCursor::seek(self, tree, key)
    }

    fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V> {
        FilteredCursor::value(self, tree)
    }
}

/// Cursor returned by [`Tree::cursor`].
#[derive(Clone, Debug)]
pub enum Cursor {
    /// Reports every node.
    Raw(RawCursor),
    /// Reports only the node kinds selected by its options.
    Filtered(FilteredCursor),
}

impl Cursor {
    /// Tree version captured when the cursor was created.
    pub fn version(&self) -> u64 {
        match self {
            Cursor::Raw(c) => c.version(),
            Cursor::Filtered(c) => c.version(),
        }
    }
}

impl TreeCursor for Cursor {
    fn has_next<V>(&mut self, tree: &Tree<V>) -> bool {
        match self {
            Cursor::Raw(c) => RawCursor::has_next(c),
            Cursor::Filtered(c) => c.has_next(tree),
        }
    }

    fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        match self {
            Cursor::Raw(c) => c.next_ref(tree),
            Cursor::Filtered(c) => c.next_ref(tree),
        }
    }

    fn has_prev<V>(&mut self, tree: &Tree<V>) -> bool {
        match self {
            Cursor::Raw(c) => RawCursor::has_prev(c),
            Cursor::Filtered(c) => c.has_prev(tree),
        }
    }

    fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        match self {
            Cursor::Raw(c) => c.prev_ref(tree),
            Cursor::Filtered(c) => c.prev_ref(tree),
        }
    }

    fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]) {
        match self {
            Cursor::Raw(c) => c.seek(tree, key),
            Cursor::Filtered(c) => c.seek(tree, key),
        }
    }

    fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V> {
        match self {
            Cursor::Raw(c) => c.value(tree),
            Cursor::Filtered(c) => c.value(tree),
        }
    }
}

/// Iterator over the entries of a tree in ascending key order.
pub struct Iter<'t, V> {
    tree: &'t Tree<V>,
    cursor: FilteredCursor,
}

impl<'t, V> Iterator for Iter<'t, V> {
    type Item = (&'t [u8], &'t V);

    fn next(&mut self) -> Option<Self::Item> {
        // The tree is borrowed for 't, so stepping can only run out.
        self.cursor.next(self.tree).ok()?.entry()
    }
}

impl<V> Tree<V> {
    /// Create a cursor reporting the node kinds in `options`.
    ///
    /// `ALL` gives a [`Cursor::Raw`]; anything else is filtered.
    pub fn cursor(&self, options: TraverseOptions) -> Cursor {
        let options = options.normalize();
        let raw = RawCursor::new(self);
        if options == TraverseOptions::ALL {
            Cursor::Raw(raw)
        } else {
            Cursor::Filtered(FilteredCursor::new(raw, options))
        }
    }

    /// Iterate over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            tree: self,
            cursor: FilteredCursor::new(RawCursor::new(self), TraverseOptions::LEAF),
        }
    }

    /// Iterate over the entries with keys `>= key`, in ascending order.
    pub fn iter_from(&self, key: &[u8]) -> Iter<'_, V> {
        let mut iter = self.iter();
        iter.cursor.seek(self, key);
        iter
    }
}

impl<'t, V> IntoIterator for &'t Tree<V> {
    type Item = (&'t [u8], &'t V);
    type IntoIter = Iter<'t, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
