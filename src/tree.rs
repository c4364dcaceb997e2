//! Arena-backed Adaptive Radix Tree.
//!
//! Based on "The Adaptive Radix Tree: ARTful Indexing for Main-Memory Databases"
//! by Leis et al., 2013.
//!
//! Nodes live in a `Vec` arena and refer to each other with 32-bit
//! [`NodeRef`]s, so cursors can hold positions without borrowing the tree.
//! Every structural change (a key added or removed) bumps [`Tree::version`],
//! which is what cursors compare against to detect modification.

use std::mem;

use crate::node::{common_prefix_len, Node, NodeRef, Prefix, SLOT_END};
use crate::TreeConfig;

/// An Adaptive Radix Tree mapping byte-string keys to values.
#[derive(Clone)]
pub struct Tree<V> {
    nodes: Vec<Option<Node<V>>>,
    free: Vec<NodeRef>,
    root: NodeRef,
    len: usize,
    version: u64,
}

impl<V> Tree<V> {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a new empty tree with the given configuration.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::with_capacity(config.initial_capacity),
            free: Vec::new(),
            root: NodeRef::NULL,
            len: 0,
            version: 0,
        }
    }

    /// Number of keys in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Structural version, bumped whenever a key is added or removed.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The root node, if the tree is not empty.
    #[inline]
    pub fn root(&self) -> Option<NodeRef> {
        (!self.root.is_null()).then_some(self.root)
    }

    /// Dereference a node.
    ///
    /// # Panics
    ///
    /// Panics if `r` does not refer to a live node of this tree.
    #[inline]
    pub fn node(&self, r: NodeRef) -> &Node<V> {
        match self.get_node(r) {
            Some(node) => node,
            None => panic!("dangling node reference {r:?}"),
        }
    }

    /// Dereference a node without panicking.
    #[inline]
    pub fn get_node(&self, r: NodeRef) -> Option<&Node<V>> {
        self.nodes.get(r.index())?.as_ref()
    }

    #[inline]
    fn node_mut(&mut self, r: NodeRef) -> &mut Node<V> {
        match self.nodes.get_mut(r.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("dangling node reference {r:?}"),
        }
    }

    /// Number of arena slots, live or free.
    #[cfg(test)]
    pub(crate) fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, node: Node<V>) -> NodeRef {
        match self.free.pop() {
            Some(r) => {
                self.nodes[r.index()] = Some(node);
                r
            }
            None => {
                self.nodes.push(Some(node));
                NodeRef::new(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, r: NodeRef) -> Option<Node<V>> {
        let node = self.nodes.get_mut(r.index())?.take()?;
        self.free.push(r);
        Some(node)
    }

    fn release_leaf(&mut self, leaf: NodeRef) -> Option<V> {
        match self.release(leaf)? {
            Node::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }

    #[inline]
    fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// The key of a leaf (empty for internal nodes).
    #[inline]
    pub fn leaf_key(&self, leaf: NodeRef) -> &[u8] {
        self.node(leaf).key().unwrap_or_default()
    }

    /// Get a reference to the value for a key.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let mut current = self.root()?;
        let mut depth = 0;

        loop {
            let node = self.node(current);
            if let Node::Leaf { key: leaf_key, value } = node {
                return (leaf_key.as_slice() == key).then_some(value);
            }

            // Optimistic: only the stored bytes are compared, the leaf check
            // settles the rest.
            let prefix = node.prefix()?;
            if prefix.matched(key, depth) < prefix.stored().len() {
                return None;
            }
            depth += prefix.len();

            current = match key.get(depth) {
                None => node.terminal()?,
                Some(&byte) => node.find_child(byte)?,
            };
            depth += 1;
        }
    }

    /// Whether the tree holds `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert a key-value pair, returning the previous value for the key.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let Some(root) = self.root() else {
            self.root = self.alloc(Node::new_leaf(key.to_vec(), value));
            self.len = 1;
            self.bump_version();
            return None;
        };

        let (new_root, old) = self.insert_at(root, key, 0, value);
        self.root = new_root;
        if old.is_none() {
            self.len += 1;
            self.bump_version();
        }
        old
    }

    /// Insert below `node`, whose path starts at `depth`. Returns the node
    /// that now occupies `node`'s position.
    fn insert_at(&mut self, node: NodeRef, key: &[u8], depth: usize, value: V) -> (NodeRef, Option<V>) {
        if self.node(node).is_leaf() {
            if self.leaf_key(node) == key {
                let old = self.node_mut(node).value_mut().map(|slot| mem::replace(slot, value));
                return (node, old);
            }
            return (self.split_leaf(node, key, depth, value), None);
        }

        let prefix_len = self.node(node).prefix_len();
        let matched = self.match_prefix_deep(node, key, depth);
        if matched < prefix_len {
            return (self.split_prefix(node, key, depth, matched, value), None);
        }

        let depth = depth + prefix_len;
        let Some(&byte) = key.get(depth) else {
            return (node, self.insert_terminal(node, key, value));
        };

        match self.node(node).find_child(byte) {
            Some(child) => {
                let (new_child, old) = self.insert_at(child, key, depth + 1, value);
                if new_child != child {
                    self.node_mut(node).replace_child(byte, new_child);
                }
                (node, old)
            }
            None => {
                let leaf = self.alloc(Node::new_leaf(key.to_vec(), value));
                let inner = self.node_mut(node);
                if inner.is_full() {
                    inner.grow();
                }
                inner.add_child(byte, leaf);
                (node, None)
            }
        }
    }

    /// Replace `leaf` with a Node4 holding both it and the new key.
    fn split_leaf(&mut self, leaf: NodeRef, key: &[u8], depth: usize, value: V) -> NodeRef {
        let (split, existing_byte) = {
            let existing = self.leaf_key(leaf);
            let common = common_prefix_len(
                existing.get(depth..).unwrap_or_default(),
                key.get(depth..).unwrap_or_default(),
            );
            (depth + common, existing.get(depth + common).copied())
        };

        let mut inner = Node::new_node4(Prefix::new(&key[depth..split]));
        let new_leaf = self.alloc(Node::new_leaf(key.to_vec(), value));
        match existing_byte {
            Some(byte) => inner.add_child(byte, leaf),
            None => inner.set_terminal(leaf),
        }
        match key.get(split) {
            Some(&byte) => inner.add_child(byte, new_leaf),
            None => inner.set_terminal(new_leaf),
        }
        self.alloc(inner)
    }

    /// Split the compressed prefix of `node` after `matched` bytes.
    fn split_prefix(&mut self, node: NodeRef, key: &[u8], depth: usize, matched: usize, value: V) -> NodeRef {
        let full = self.prefix_bytes(node, depth).to_vec();

        let mut inner = Node::new_node4(Prefix::new(&full[..matched]));
        self.node_mut(node).set_prefix(Prefix::new(&full[matched + 1..]));
        inner.add_child(full[matched], node);

        let leaf = self.alloc(Node::new_leaf(key.to_vec(), value));
        match key.get(depth + matched) {
            Some(&byte) => inner.add_child(byte, leaf),
            None => inner.set_terminal(leaf),
        }
        self.alloc(inner)
    }

    fn insert_terminal(&mut self, node: NodeRef, key: &[u8], value: V) -> Option<V> {
        match self.node(node).terminal() {
            Some(leaf) => self.node_mut(leaf).value_mut().map(|slot| mem::replace(slot, value)),
            None => {
                let leaf = self.alloc(Node::new_leaf(key.to_vec(), value));
                self.node_mut(node).set_terminal(leaf);
                None
            }
        }
    }

    /// Remove a key from the tree, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let root = self.root()?;
        let (new_root, value) = self.remove_at(root, key, 0)?;
        self.root = new_root;
        self.len -= 1;
        self.bump_version();
        Some(value)
    }

    /// Remove below `node`. Returns the node now occupying `node`'s position
    /// (`NULL` if the subtree is gone) and the removed value.
    fn remove_at(&mut self, node: NodeRef, key: &[u8], depth: usize) -> Option<(NodeRef, V)> {
        if self.node(node).is_leaf() {
            if self.leaf_key(node) != key {
                return None;
            }
            let value = self.release_leaf(node)?;
            return Some((NodeRef::NULL, value));
        }

        let prefix_len = self.node(node).prefix_len();
        if self.match_prefix_deep(node, key, depth) < prefix_len {
            return None;
        }
        let inner_depth = depth + prefix_len;

        let value = match key.get(inner_depth) {
            None => {
                let leaf = self.node(node).terminal()?;
                if self.leaf_key(leaf) != key {
                    return None;
                }
                self.node_mut(node).take_terminal();
                self.release_leaf(leaf)?
            }
            Some(&byte) => {
                let child = self.node(node).find_child(byte)?;
                let (replacement, value) = self.remove_at(child, key, inner_depth + 1)?;
                if replacement.is_null() {
                    self.node_mut(node).remove_child(byte);
                } else if replacement != child {
                    self.node_mut(node).replace_child(byte, replacement);
                }
                value
            }
        };

        Some((self.collapse(node, depth), value))
    }

    /// Drop an internal node that no longer branches.
    fn collapse(&mut self, node: NodeRef, depth: usize) -> NodeRef {
        let inner = self.node(node);
        let terminal = inner.terminal();
        match (inner.num_children(), terminal) {
            (0, None) => {
                self.release(node);
                NodeRef::NULL
            }
            (0, Some(leaf)) => {
                self.release(node);
                leaf
            }
            (1, None) => {
                let Some((slot, child)) = inner.next_child(1) else {
                    return node;
                };
                if !self.node(child).is_leaf() {
                    // Fold this node's path into the child's prefix.
                    let byte = inner.slot_key(slot).unwrap_or_default();
                    let child_depth = depth + inner.prefix_len() + 1;
                    let mut merged = self.prefix_bytes(node, depth).to_vec();
                    merged.push(byte);
                    merged.extend_from_slice(self.prefix_bytes(child, child_depth));
                    self.node_mut(child).set_prefix(Prefix::new(&merged));
                }
                self.release(node);
                child
            }
            _ => node,
        }
    }

    /// Leftmost leaf below `node` (the terminal leaf wins over children).
    pub fn minimum(&self, node: NodeRef) -> Option<NodeRef> {
        let mut current = node;
        loop {
            let n = self.get_node(current)?;
            if n.is_leaf() {
                return Some(current);
            }
            current = n.next_child(0)?.1;
        }
    }

    /// Rightmost leaf below `node`.
    pub fn maximum(&self, node: NodeRef) -> Option<NodeRef> {
        let mut current = node;
        loop {
            let n = self.get_node(current)?;
            if n.is_leaf() {
                return Some(current);
            }
            current = n.prev_child(SLOT_END)?.1;
        }
    }

    /// Full compressed prefix of an internal node whose path starts at `depth`.
    ///
    /// Bytes beyond [`crate::MAX_PREFIX_LEN`] are read from the minimum leaf.
    pub fn prefix_bytes(&self, node: NodeRef, depth: usize) -> &[u8] {
        let Some(prefix) = self.node(node).prefix() else {
            return &[];
        };
        if !prefix.is_truncated() {
            return prefix.stored();
        }
        let key = self.minimum(node).map_or(&[][..], |leaf| self.leaf_key(leaf));
        key.get(depth..depth + prefix.len()).unwrap_or_default()
    }

    /// Number of stored prefix bytes of `node` matching `key[depth..]`.
    pub fn match_prefix(&self, node: NodeRef, key: &[u8], depth: usize) -> usize {
        self.node(node).prefix().map_or(0, |prefix| prefix.matched(key, depth))
    }

    /// Number of full prefix bytes of `node` matching `key[depth..]`.
    pub fn match_prefix_deep(&self, node: NodeRef, key: &[u8], depth: usize) -> usize {
        let Some(prefix) = self.node(node).prefix() else {
            return 0;
        };
        let stored = prefix.matched(key, depth);
        if stored < prefix.stored().len() || !prefix.is_truncated() {
            return stored;
        }
        common_prefix_len(self.prefix_bytes(node, depth), key.get(depth..).unwrap_or_default())
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}
