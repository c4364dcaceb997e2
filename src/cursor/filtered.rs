//! Cursor that skips node kinds rejected by a [`TraverseOptions`] mask.

use crate::cursor::raw::RawCursor;
use crate::error::{Error, Result};
use crate::node::{Node, NodeRef};
use crate::traverse::TraverseOptions;
use crate::tree::Tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Outcome of a lookahead scan, kept until the matching step consumes it.
#[derive(Clone, Debug)]
struct Pending {
    direction: Direction,
    /// Inner cursor advanced onto `found`.
    scout: RawCursor,
    found: Result<Option<NodeRef>>,
}

/// A [`RawCursor`] that only stops on nodes accepted by its options.
#[derive(Clone, Debug)]
pub struct FilteredCursor {
    inner: RawCursor,
    options: TraverseOptions,
    pending: Option<Pending>,
}

impl FilteredCursor {
    /// Wrap `inner`, reporting only the node kinds in `options`.
    pub fn new(inner: RawCursor, options: TraverseOptions) -> Self {
        Self {
            inner,
            options: options.normalize(),
            pending: None,
        }
    }

    /// The normalized option mask.
    pub fn options(&self) -> TraverseOptions {
        self.options
    }

    /// Tree version captured by the inner cursor.
    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    /// Whether a forward step would return an accepted node.
    ///
    /// The lookahead is buffered, so repeated calls do no extra work. A scan
    /// that fails reports `true` so the following `next` surfaces the error.
    pub fn has_next<V>(&mut self, tree: &Tree<V>) -> bool {
        self.lookahead(tree, Direction::Forward)
    }

    /// Whether a backward step would return an accepted node.
    pub fn has_prev<V>(&mut self, tree: &Tree<V>) -> bool {
        self.lookahead(tree, Direction::Backward)
    }

    /// Step forward to the next accepted node.
    pub fn next<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.next_ref(tree).map(|r| tree.node(r))
    }

    /// Step backward to the previous accepted node.
    pub fn prev<'t, V>(&mut self, tree: &'t Tree<V>) -> Result<&'t Node<V>> {
        self.prev_ref(tree).map(|r| tree.node(r))
    }

    /// Like [`FilteredCursor::next`], returning the node's reference.
    pub fn next_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        self.step(tree, Direction::Forward)
    }

    /// Like [`FilteredCursor::prev`], returning the node's reference.
    pub fn prev_ref<V>(&mut self, tree: &Tree<V>) -> Result<NodeRef> {
        self.step(tree, Direction::Backward)
    }

    /// Reposition the inner cursor; see [`RawCursor::seek`].
    pub fn seek<V>(&mut self, tree: &Tree<V>, key: &[u8]) {
        self.pending = None;
        self.inner.seek(tree, key);
    }

    /// Value of the leaf the cursor rests on.
    pub fn value<'t, V>(&self, tree: &'t Tree<V>) -> Option<&'t V> {
        self.inner.value(tree)
    }

    /// Fail if `tree` changed structurally since this cursor was created.
    pub fn check_concurrent_modification<V>(&self, tree: &Tree<V>) -> Result<()> {
        self.inner.check_concurrent_modification(tree)
    }

    fn lookahead<V>(&mut self, tree: &Tree<V>, direction: Direction) -> bool {
        let pending = match self.pending.take() {
            Some(pending) if pending.direction == direction => pending,
            _ => self.scan(tree, direction),
        };
        let found = !matches!(pending.found, Ok(None));
        self.pending = Some(pending);
        found
    }

    fn step<V>(&mut self, tree: &Tree<V>, direction: Direction) -> Result<NodeRef> {
        let pending = match self.pending.take() {
            Some(pending) if pending.direction == direction => pending,
            _ => self.scan(tree, direction),
        };
        if let Ok(None) = pending.found {
            self.pending = Some(pending);
            return Err(Error::NoMoreElements);
        }
        self.inner.check_concurrent_modification(tree)?;
        match pending.found? {
            Some(r) => {
                self.inner = pending.scout;
                Ok(r)
            }
            None => Err(Error::NoMoreElements),
        }
    }

    fn scan<V>(&self, tree: &Tree<V>, direction: Direction) -> Pending {
        let mut scout = self.inner.clone();
        let found = loop {
            let step = match direction {
                Direction::Forward if scout.has_next() => scout.next_ref(tree),
                Direction::Backward if scout.has_prev() => scout.prev_ref(tree),
                _ => break Ok(None),
            };
            match step {
                Ok(r) if self.options.accepts(tree.node(r).kind()) => break Ok(Some(r)),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        Pending { direction, scout, found }
    }
}
