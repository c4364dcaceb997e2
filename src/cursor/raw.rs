//! Bidirectional cursor over every node of a tree.
//!
//! The cursor keeps an explicit stack of frames from the root down to the node
//! it is anchored on. Frames hold [`NodeRef`]s rather than borrows, so the
//! tree is passed to every call and may be mutated in between; the version
//! captured at construction detects that before any frame is dereferenced.
//!
//! Nodes are produced in pre-order: an internal node, then its terminal leaf,
//! then its children by ascending key byte. Leaves therefore come out in key
//! order and `prev` produces the exact reverse.

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::node::{common_prefix_len, Node, NodeRef, SLOT_END};
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frame {
    node: NodeRef,
    /// Slot of the child the path continues through (unused on the top frame).
    slot: usize,
}

impl Frame {
    fn new(node: NodeRef) -> Self {
        Self { node, slot: 0 }
    }
}

/// Where the cursor sits relative to the top frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    /// Fresh cursor: the stack holds only the root.
    Unpositioned,
    /// In the gap just before the top node.
    Before,
    /// On the top node, the last one returned.
    On,
    /// In the gap just after the top node.
    After,
}

/// A seekable cursor yielding every node of a [`Tree`].
#[derive(Clone, Debug)]
pub struct RawCursor {
    version: u64,
    stack: SmallVec<[Frame; 16]>,
    anchor: Anchor,
    next_node: Option<NodeRef>,
    prev_node: Option<NodeRef>,
}

impl RawCursor {
    /// Create a cursor positioned before the first node of `tree`.
    ///
    /// Both ends are available: `next` starts at the root, `prev` at the
    /// maximum leaf.
    pub fn new<V>(tree: &Tree<V>) -> Self {
        let mut cursor = Self {
            version: tree.version(),
            stack: SmallVec::new(),
            anchor: Anchor::Unpositioned,
            next_node: None,
            prev_node: None,
        };
        if let Some(root) = tree.root() {
            cursor.stack.push(Frame::new(root));
        }
        cursor.refresh(tree);
        cursor
    }

    /// Tree version captured when the cursor was created.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether a forward step would return a node.
    #[inline]
    pub fn has_next(&self) -> bool {
        self.next_node.is_some()
    }

    /// Whether a backward step would return a node.
    #[inline]
    pub fn has_prev(&self) -> bool {
        self.prev_node.is_some()
    }

    /// Fail if `tree` changed structurally since this cursor was created.
    pub fn check_concurrent_modification<V>(&self, tree: &Tree<V>) -> Result<()> {
        let actual = tree.version();
        if actual == self.version {
            return Ok(());
        }
        debug!(expected = self.version, actual, "cursor detected concurrent modification");
        Err(Error::ConcurrentModification { expected: self.version, actual })
    }

    /// Step forward and return the node now under the cursor.
    ///
    /// # Panics
    ///
    /// The cursor does not record which tree it came from. Stepping it
    /// against a different tree that happens to share the version may panic
    /// on a dangling node reference.
    pub fn next<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.next_ref(tree).map(|r| tree.node(r))
    }

    /// Step backward and return the node now under the cursor.
    ///
    /// # Panics
    ///
    /// Same as [`RawCursor::next`].
    pub fn prev<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.prev_ref(tree).map(|r| tree.node(r))
    }

    /// Like [`RawCursor::next`], returning the node's reference.
    pub fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        if !self.has_next() {
            return Err(Error::NoMoreElements);
        }
        self.check_concurrent_modification(tree)?;

        match self.anchor {
            Anchor::On | Anchor::After => self.advance(tree),
            Anchor::Before | Anchor::Unpositioned => {}
        }
        self.settle(tree)
    }

    /// Like [`RawCursor::prev`], returning the node's reference.
    pub fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        if !self.has_prev() {
            return Err(Error::NoMoreElements);
        }
        self.check_concurrent_modification(tree)?;

        match self.anchor {
            Anchor::On | Anchor::Before => self.retreat(tree),
            Anchor::Unpositioned => self.descend_last(tree),
            Anchor::After => {}
        }
        self.settle(tree)
    }

    /// Position the cursor in the gap before the first node ordered at or
    /// after `key`.
    ///
    /// Leaves order by key; an internal node orders just before the key equal
    /// to its full path. Seeking never fails and keeps the version snapshot.
    pub fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]) {
        self.stack.clear();
        self.anchor = Anchor::Unpositioned;
        let Some(root) = tree.root() else {
            self.refresh(tree);
            return;
        };
        self.stack.push(Frame::new(root));

        let mut depth = 0;
        let anchor = loop {
            let Some(top) = self.stack.last().copied() else {
                break Anchor::Unpositioned;
            };
            let node = tree.node(top.node);

            if let Some(leaf_key) = node.key() {
                break if leaf_key >= key { Anchor::Before } else { Anchor::After };
            }

            let full = tree.prefix_bytes(top.node, depth);
            let rest = key.get(depth..).unwrap_or_default();
            let matched = common_prefix_len(full, rest);
            if matched < full.len() {
                if matched == rest.len() || rest[matched] < full[matched] {
                    break Anchor::Before;
                }
                // The whole subtree sorts below the key.
                self.descend_last(tree);
                break Anchor::After;
            }
            depth += full.len();

            let Some(&byte) = key.get(depth) else {
                break Anchor::After;
            };
            if let Some((slot, child)) = node.find_child_slot(byte) {
                self.descend(slot, child);
                depth += 1;
                continue;
            }
            match node.next_child(node.slot_bound(byte)) {
                Some((slot, child)) => {
                    self.descend(slot, child);
                    break Anchor::Before;
                }
                None => {
                    self.descend_last(tree);
                    break Anchor::After;
                }
            }
        };
        self.anchor = anchor;

        self.refresh(tree);
        trace!(anchor = ?self.anchor, depth = self.stack.len(), "cursor seek landed");
    }

    /// Value of the leaf the cursor rests on.
    ///
    /// `None` when the cursor rests on nothing or on an internal node.
    ///
    /// Unlike the stepping methods this never fails, but it still compares
    /// versions: once the tree changed structurally the arena slot under the
    /// cursor may hold another key, so a stale cursor reports `None` instead
    /// of a value it never visited.
    pub fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V> {
        if self.anchor != Anchor::On || tree.version() != self.version {
            return None;
        }
        tree.get_node(self.stack.last()?.node)?.value()
    }

    /// The node the cursor rests on, if any.
    pub fn current(&self) -> Option<NodeRef> {
        match self.anchor {
            Anchor::On => self.stack.last().map(|f| f.node),
            _ => None,
        }
    }

    fn settle<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        self.anchor = Anchor::On;
        self.refresh(tree);
        self.current().ok_or(Error::NoMoreElements)
    }

    fn descend(&mut self, slot: usize, child: NodeRef) {
        if let Some(top) = self.stack.last_mut() {
            top.slot = slot;
        }
        self.stack.push(Frame::new(child));
    }

    /// Pre-order successor of the top node: `(frame index, slot, child)`.
    fn successor<V>(&self, tree: &Tree<V>) -> Option<(usize, usize, NodeRef)> {
        let top = self.stack.last()?;
        if let Some((slot, child)) = tree.node(top.node).next_child(0) {
            return Some((self.stack.len() - 1, slot, child));
        }
        self.stack[..self.stack.len() - 1]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, frame)| {
                tree.node(frame.node)
                    .next_child(frame.slot + 1)
                    .map(|(slot, child)| (depth, slot, child))
            })
    }

    fn advance<V>(&mut self, tree: &Tree<V>) {
        if let Some((depth, slot, child)) = self.successor(tree) {
            self.stack.truncate(depth + 1);
            self.descend(slot, child);
        }
    }

    /// Move to the pre-order predecessor of the top node.
    fn retreat<V>(&mut self, tree: &Tree<V>) {
        if self.stack.len() < 2 {
            return;
        }
        self.stack.pop();
        let Some(parent) = self.stack.last().copied() else {
            return;
        };
        if let Some((slot, sibling)) = tree.node(parent.node).prev_child(parent.slot) {
            self.descend(slot, sibling);
            self.descend_last(tree);
        }
    }

    /// Follow last children from the top node down to its maximum leaf.
    fn descend_last<V>(&mut self, tree: &Tree<V>) {
        while let Some(top) = self.stack.last().copied() {
            match tree.node(top.node).prev_child(SLOT_END) {
                Some((slot, child)) => self.descend(slot, child),
                None => break,
            }
        }
    }

    fn peek_successor<V>(&self, tree: &Tree<V>) -> Option<NodeRef> {
        self.successor(tree).map(|(_, _, child)| child)
    }

    fn peek_predecessor<V>(&self, tree: &Tree<V>) -> Option<NodeRef> {
        let parent = self.stack.iter().rev().nth(1)?;
        match tree.node(parent.node).prev_child(parent.slot) {
            Some((_, sibling)) => tree.maximum(sibling),
            None => Some(parent.node),
        }
    }

    fn refresh<V>(&mut self, tree: &Tree<V>) {
        let top = self.stack.last().map(|f| f.node);
        let (next, prev) = match self.anchor {
            Anchor::Unpositioned => (top, top.and_then(|root| tree.maximum(root))),
            Anchor::Before => (top, self.peek_predecessor(tree)),
            Anchor::On => (self.peek_successor(tree), self.peek_predecessor(tree)),
            Anchor::After => (self.peek_successor(tree), top),
        };
        self.next_node = next;
        self.prev_node = prev;
    }
}
