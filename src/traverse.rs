//! Callback-driven depth-first traversal.
//!
//! [`Tree::for_each`] walks the whole tree in pre-order and
//! [`Tree::for_each_prefix`] walks only the subtree under a key prefix. A
//! callback returning `false` prunes the subtree below the node it was given.

use bitflags::bitflags;

use crate::node::{Node, NodeKind, NodeRef};
use crate::tree::Tree;

bitflags! {
    /// Which node kinds a traversal or cursor reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct TraverseOptions: u8 {
        /// Report leaves.
        const LEAF = 1 << 0;
        /// Report internal nodes.
        const NODE = 1 << 1;
        /// Report every node.
        const ALL = Self::LEAF.bits() | Self::NODE.bits();
    }
}

impl TraverseOptions {
    /// Drop unknown bits and treat the empty set as [`TraverseOptions::LEAF`].
    pub fn normalize(self) -> Self {
        let masked = self & Self::ALL;
        if masked.is_empty() {
            Self::LEAF
        } else {
            masked
        }
    }

    /// Combine several option sets into one normalized set.
    pub fn from_flags<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = TraverseOptions>,
    {
        flags.into_iter().fold(Self::empty(), |acc, f| acc | f).normalize()
    }

    /// Whether a node of `kind` is reported under these options.
    #[inline]
    pub fn accepts(self, kind: NodeKind) -> bool {
        if kind.is_leaf() {
            self.contains(Self::LEAF)
        } else {
            self.contains(Self::NODE)
        }
    }
}

impl Default for TraverseOptions {
    fn default() -> Self {
        Self::LEAF
    }
}

/// Wrap `callback` so it only sees nodes accepted by `options`.
///
/// Rejected nodes answer `true`, so the walk still descends through them.
pub fn traverse_filter<'a, V, F>(options: TraverseOptions, mut callback: F) -> impl FnMut(&'a Node<V>) -> bool
where
    V: 'a,
    F: FnMut(&'a Node<V>) -> bool,
{
    let options = options.normalize();
    move |node: &'a Node<V>| {
        if options.accepts(node.kind()) {
            callback(node)
        } else {
            true
        }
    }
}

impl<V> Tree<V> {
    /// Visit every node accepted by `options` in pre-order.
    ///
    /// Internal nodes come before their terminal leaf, which comes before
    /// their children in ascending key-byte order. Returning `false` from the
    /// callback skips the descendants of that node only.
    pub fn for_each<'a, F>(&'a self, options: TraverseOptions, callback: F)
    where
        F: FnMut(&'a Node<V>) -> bool,
    {
        let Some(root) = self.root() else {
            return;
        };
        let mut callback = traverse_filter(options, callback);
        self.walk(root, &mut callback);
    }

    /// Visit the nodes accepted by `options` whose path begins with `prefix`,
    /// in pre-order.
    ///
    /// With the default [`TraverseOptions::LEAF`] this is every leaf whose key
    /// begins with `prefix`, in key order. Internal nodes are reported from the
    /// topmost node whose path covers `prefix` downwards; returning `false` for
    /// one skips its descendants.
    pub fn for_each_prefix<'a, F>(&'a self, prefix: &[u8], options: TraverseOptions, callback: F)
    where
        F: FnMut(&'a Node<V>) -> bool,
    {
        let Some(mut current) = self.root() else {
            return;
        };
        let mut callback = traverse_filter(options, callback);
        let mut depth = 0;

        loop {
            let node = self.node(current);
            if node.is_leaf() {
                if node.has_prefix(prefix) {
                    callback(node);
                }
                return;
            }

            if depth == prefix.len() {
                let covered = self
                    .minimum(current)
                    .is_some_and(|leaf| self.node(leaf).has_prefix(prefix));
                if covered {
                    self.walk(current, &mut callback);
                }
                return;
            }

            let prefix_len = node.prefix_len();
            let remaining = prefix.len() - depth;
            let matched = self.match_prefix_deep(current, prefix, depth);
            if remaining <= prefix_len && matched == remaining {
                // The search prefix ends inside this node's compressed path.
                self.walk(current, &mut callback);
                return;
            }
            if matched < prefix_len {
                return;
            }

            depth += prefix_len;
            let Some(child) = node.find_child(prefix[depth]) else {
                return;
            };
            current = child;
            depth += 1;
        }
    }

    /// Collect the entries whose key begins with `prefix`, in key order.
    pub fn prefix_scan(&self, prefix: &[u8]) -> Vec<(&[u8], &V)> {
        let mut out = Vec::new();
        self.for_each_prefix(prefix, TraverseOptions::LEAF, |node| {
            out.extend(node.entry());
            true
        });
        out
    }

    fn walk<'a, F>(&'a self, r: NodeRef, callback: &mut F)
    where
        F: FnMut(&'a Node<V>) -> bool,
    {
        let node = self.node(r);
        if !callback(node) {
            return;
        }
        for child in node.children() {
            self.walk(child, callback);
        }
    }
}
