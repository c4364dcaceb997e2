//! ART node types with adaptive sizing.
//!
//! Internal nodes pick their layout from the number of children they hold:
//!
//! - Node4: up to 4 children, sorted key bytes
//! - Node16: 5-16 children, sorted key bytes
//! - Node48: 17-48 children (256-byte index + 48 child slots)
//! - Node256: 49-256 children (direct indexing by byte)
//!
//! Nodes live in the tree arena and refer to each other through [`NodeRef`].
//!
//! Every internal node exposes the same *slot* space for ordered enumeration.
//! Slot 0 holds the terminal leaf (a key that ends exactly at this node). Node4
//! and Node16 use slots `1..=num_children` in key-byte order; Node48 and
//! Node256 use slot `byte + 1`. Scanning slots upwards therefore visits
//! children in ascending key order whatever the layout.

use std::fmt;
use std::mem;

use smallvec::SmallVec;

/// Maximum number of compressed prefix bytes stored inline in a node.
///
/// Longer prefixes keep their true length; the missing tail is recovered from
/// the subtree's minimum leaf when it is needed.
pub const MAX_PREFIX_LEN: usize = 10;

/// One past the highest slot of any node (terminal slot + 256 byte slots).
pub(crate) const SLOT_END: usize = 257;

/// Node48 index entry marking an absent byte.
pub(crate) const EMPTY: u8 = 255;

/// A 32-bit reference to a node in the tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    /// The absent reference.
    pub const NULL: NodeRef = NodeRef(u32::MAX);

    /// Whether this is [`NodeRef::NULL`].
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub(crate) fn new(idx: usize) -> Self {
        debug_assert!(idx < u32::MAX as usize);
        NodeRef(idx as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn get(self) -> Option<NodeRef> {
        (!self.is_null()).then_some(self)
    }
}

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A leaf node containing a key and value.
    Leaf,
    /// A node with up to 4 children.
    Node4,
    /// A node with 5-16 children.
    Node16,
    /// A node with 17-48 children.
    Node48,
    /// A node with 49-256 children.
    Node256,
}

impl NodeKind {
    /// Whether this is [`NodeKind::Leaf`].
    #[inline]
    pub fn is_leaf(self) -> bool {
        self == NodeKind::Leaf
    }
}

/// Compressed path segment of an internal node.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    len: usize,
    stored: SmallVec<[u8; MAX_PREFIX_LEN]>,
}

impl Prefix {
    /// Build a prefix from its full bytes, storing at most [`MAX_PREFIX_LEN`].
    pub fn new(bytes: &[u8]) -> Self {
        let kept = bytes.len().min(MAX_PREFIX_LEN);
        Self {
            len: bytes.len(),
            stored: SmallVec::from_slice(&bytes[..kept]),
        }
    }

    /// True length of the compressed path.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the compressed path is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The stored (possibly truncated) bytes.
    #[inline]
    pub fn stored(&self) -> &[u8] {
        &self.stored
    }

    /// Whether part of the path is not stored inline.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.len > self.stored.len()
    }

    /// Number of stored bytes that agree with `key[depth..]`.
    pub fn matched(&self, key: &[u8], depth: usize) -> usize {
        common_prefix_len(&self.stored, key.get(depth..).unwrap_or_default())
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.stored))?;
        if self.is_truncated() {
            write!(f, "..({})", self.len)?;
        }
        Ok(())
    }
}

/// Length of the longest common prefix of two byte strings.
#[inline]
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// A node in the Adaptive Radix Tree.
#[derive(Clone)]
pub enum Node<V> {
    /// A leaf node storing a key-value pair.
    Leaf {
        /// The full key.
        key: Vec<u8>,
        /// The value.
        value: V,
    },

    /// A node with up to 4 children.
    Node4 {
        /// Compressed path prefix.
        prefix: Prefix,
        /// Number of valid children.
        num_children: u8,
        /// Child key bytes, sorted.
        keys: [u8; 4],
        /// Child nodes, parallel to `keys`.
        children: [NodeRef; 4],
        /// Leaf for the key ending at this node.
        terminal: NodeRef,
    },

    /// A node with 5-16 children.
    Node16 {
        /// Compressed path prefix.
        prefix: Prefix,
        /// Number of valid children.
        num_children: u8,
        /// Child key bytes, sorted.
        keys: [u8; 16],
        /// Child nodes, parallel to `keys`.
        children: [NodeRef; 16],
        /// Leaf for the key ending at this node.
        terminal: NodeRef,
    },

    /// A node with 17-48 children.
    Node48 {
        /// Compressed path prefix.
        prefix: Prefix,
        /// Number of valid children.
        num_children: u8,
        /// Maps key bytes to positions in `children` (255 = empty).
        child_index: Box<[u8; 256]>,
        /// Child nodes.
        children: Box<[NodeRef; 48]>,
        /// Leaf for the key ending at this node.
        terminal: NodeRef,
    },

    /// A node with 49-256 children.
    Node256 {
        /// Compressed path prefix.
        prefix: Prefix,
        /// Number of valid children.
        num_children: u16,
        /// Child nodes, indexed by key byte.
        children: Box<[NodeRef; 256]>,
        /// Leaf for the key ending at this node.
        terminal: NodeRef,
    },
}

impl<V> Node<V> {
    /// Create a new leaf node.
    pub fn new_leaf(key: Vec<u8>, value: V) -> Self {
        Node::Leaf { key, value }
    }

    /// Create a new empty Node4.
    pub fn new_node4(prefix: Prefix) -> Self {
        Node::Node4 {
            prefix,
            num_children: 0,
            keys: [0; 4],
            children: [NodeRef::NULL; 4],
            terminal: NodeRef::NULL,
        }
    }

    /// Get the node kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf { .. } => NodeKind::Leaf,
            Node::Node4 { .. } => NodeKind::Node4,
            Node::Node16 { .. } => NodeKind::Node16,
            Node::Node48 { .. } => NodeKind::Node48,
            Node::Node256 { .. } => NodeKind::Node256,
        }
    }

    /// Whether this node is a leaf.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// The full key of a leaf.
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The value of a leaf.
    pub fn value(&self) -> Option<&V> {
        match self {
            Node::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn value_mut(&mut self) -> Option<&mut V> {
        match self {
            Node::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Key and value of a leaf.
    pub fn entry(&self) -> Option<(&[u8], &V)> {
        match self {
            Node::Leaf { key, value } => Some((key, value)),
            _ => None,
        }
    }

    /// Whether this is a leaf whose key begins with `prefix`.
    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.key().is_some_and(|key| key.starts_with(prefix))
    }

    /// The compressed prefix of an internal node.
    pub fn prefix(&self) -> Option<&Prefix> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { prefix, .. }
            | Node::Node16 { prefix, .. }
            | Node::Node48 { prefix, .. }
            | Node::Node256 { prefix, .. } => Some(prefix),
        }
    }

    /// True length of the compressed prefix (0 for leaves).
    pub fn prefix_len(&self) -> usize {
        self.prefix().map_or(0, Prefix::len)
    }

    pub(crate) fn set_prefix(&mut self, new_prefix: Prefix) {
        match self {
            Node::Leaf { .. } => {}
            Node::Node4 { prefix, .. }
            | Node::Node16 { prefix, .. }
            | Node::Node48 { prefix, .. }
            | Node::Node256 { prefix, .. } => *prefix = new_prefix,
        }
    }

    /// The leaf whose key ends at this node.
    pub fn terminal(&self) -> Option<NodeRef> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { terminal, .. }
            | Node::Node16 { terminal, .. }
            | Node::Node48 { terminal, .. }
            | Node::Node256 { terminal, .. } => terminal.get(),
        }
    }

    pub(crate) fn set_terminal(&mut self, leaf: NodeRef) {
        match self {
            Node::Leaf { .. } => {}
            Node::Node4 { terminal, .. }
            | Node::Node16 { terminal, .. }
            | Node::Node48 { terminal, .. }
            | Node::Node256 { terminal, .. } => *terminal = leaf,
        }
    }

    pub(crate) fn take_terminal(&mut self) -> Option<NodeRef> {
        let leaf = self.terminal();
        self.set_terminal(NodeRef::NULL);
        leaf
    }

    /// Number of byte-indexed children (the terminal leaf is not counted).
    pub fn num_children(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Node4 { num_children, .. }
            | Node::Node16 { num_children, .. }
            | Node::Node48 { num_children, .. } => *num_children as usize,
            Node::Node256 { num_children, .. } => *num_children as usize,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        match self {
            Node::Node4 { num_children, .. } => *num_children >= 4,
            Node::Node16 { num_children, .. } => *num_children >= 16,
            Node::Node48 { num_children, .. } => *num_children >= 48,
            Node::Leaf { .. } | Node::Node256 { .. } => false,
        }
    }

    /// One past the highest slot this node can occupy.
    pub fn slot_count(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Node4 { num_children, .. } | Node::Node16 { num_children, .. } => {
                1 + *num_children as usize
            }
            Node::Node48 { .. } | Node::Node256 { .. } => SLOT_END,
        }
    }

    /// The child stored at `slot`, if any.
    pub fn child_at(&self, slot: usize) -> Option<NodeRef> {
        if slot == 0 {
            return self.terminal();
        }
        let idx = slot - 1;
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { num_children, children, .. } => {
                children[..*num_children as usize].get(idx).copied()
            }
            Node::Node16 { num_children, children, .. } => {
                children[..*num_children as usize].get(idx).copied()
            }
            Node::Node48 { child_index, children, .. } => {
                let pos = *child_index.get(idx)?;
                if pos == EMPTY {
                    None
                } else {
                    children[pos as usize].get()
                }
            }
            Node::Node256 { children, .. } => children.get(idx).and_then(|c| c.get()),
        }
    }

    /// The key byte leading to the child at `slot` (`None` for the terminal slot).
    pub fn slot_key(&self, slot: usize) -> Option<u8> {
        let idx = slot.checked_sub(1)?;
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { num_children, keys, .. } => {
                keys[..*num_children as usize].get(idx).copied()
            }
            Node::Node16 { num_children, keys, .. } => {
                keys[..*num_children as usize].get(idx).copied()
            }
            Node::Node48 { .. } | Node::Node256 { .. } => u8::try_from(idx).ok(),
        }
    }

    /// First present child at a slot `>= from`.
    pub fn next_child(&self, from: usize) -> Option<(usize, NodeRef)> {
        (from..self.slot_count()).find_map(|slot| self.child_at(slot).map(|c| (slot, c)))
    }

    /// Last present child at a slot `< before`.
    pub fn prev_child(&self, before: usize) -> Option<(usize, NodeRef)> {
        (0..before.min(self.slot_count()))
            .rev()
            .find_map(|slot| self.child_at(slot).map(|c| (slot, c)))
    }

    /// All children in ascending key order, terminal leaf first.
    pub fn children(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.slot_count()).filter_map(move |slot| self.child_at(slot))
    }

    /// Find the child for a key byte.
    pub fn find_child(&self, byte: u8) -> Option<NodeRef> {
        self.find_child_slot(byte).map(|(_, child)| child)
    }

    /// Find the child for a key byte together with its slot.
    pub fn find_child_slot(&self, byte: u8) -> Option<(usize, NodeRef)> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { num_children, keys, children, .. } => keys[..*num_children as usize]
                .iter()
                .position(|&k| k == byte)
                .map(|i| (i + 1, children[i])),
            Node::Node16 { num_children, keys, children, .. } => keys[..*num_children as usize]
                .iter()
                .position(|&k| k == byte)
                .map(|i| (i + 1, children[i])),
            Node::Node48 { child_index, children, .. } => {
                let pos = child_index[byte as usize];
                if pos == EMPTY {
                    None
                } else {
                    children[pos as usize].get().map(|c| (byte as usize + 1, c))
                }
            }
            Node::Node256 { children, .. } => {
                children[byte as usize].get().map(|c| (byte as usize + 1, c))
            }
        }
    }

    /// First slot whose key byte is `>= byte`.
    pub fn slot_bound(&self, byte: u8) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Node4 { num_children, keys, .. } => {
                1 + keys[..*num_children as usize].iter().take_while(|&&k| k < byte).count()
            }
            Node::Node16 { num_children, keys, .. } => {
                1 + keys[..*num_children as usize].iter().take_while(|&&k| k < byte).count()
            }
            Node::Node48 { .. } | Node::Node256 { .. } => byte as usize + 1,
        }
    }

    /// Add a child. The node must have room and no child for `byte` yet.
    pub(crate) fn add_child(&mut self, byte: u8, child: NodeRef) {
        match self {
            Node::Leaf { .. } => {}
            Node::Node4 { num_children, keys, children, .. } => {
                insert_sorted(&mut keys[..], &mut children[..], num_children, byte, child);
            }
            Node::Node16 { num_children, keys, children, .. } => {
                insert_sorted(&mut keys[..], &mut children[..], num_children, byte, child);
            }
            Node::Node48 { num_children, child_index, children, .. } => {
                if let Some(pos) = children.iter().position(|c| c.is_null()) {
                    children[pos] = child;
                    child_index[byte as usize] = pos as u8;
                    *num_children += 1;
                }
            }
            Node::Node256 { num_children, children, .. } => {
                if children[byte as usize].is_null() {
                    *num_children += 1;
                }
                children[byte as usize] = child;
            }
        }
    }

    /// Point the existing child for `byte` at a different node.
    pub(crate) fn replace_child(&mut self, byte: u8, child: NodeRef) {
        match self {
            Node::Leaf { .. } => {}
            Node::Node4 { num_children, keys, children, .. } => {
                if let Some(i) = keys[..*num_children as usize].iter().position(|&k| k == byte) {
                    children[i] = child;
                }
            }
            Node::Node16 { num_children, keys, children, .. } => {
                if let Some(i) = keys[..*num_children as usize].iter().position(|&k| k == byte) {
                    children[i] = child;
                }
            }
            Node::Node48 { child_index, children, .. } => {
                let pos = child_index[byte as usize];
                if pos != EMPTY {
                    children[pos as usize] = child;
                }
            }
            Node::Node256 { children, .. } => {
                if !children[byte as usize].is_null() {
                    children[byte as usize] = child;
                }
            }
        }
    }

    /// Detach the child for `byte`.
    pub(crate) fn remove_child(&mut self, byte: u8) -> Option<NodeRef> {
        match self {
            Node::Leaf { .. } => None,
            Node::Node4 { num_children, keys, children, .. } => {
                remove_sorted(&mut keys[..], &mut children[..], num_children, byte)
            }
            Node::Node16 { num_children, keys, children, .. } => {
                remove_sorted(&mut keys[..], &mut children[..], num_children, byte)
            }
            Node::Node48 { num_children, child_index, children, .. } => {
                let pos = mem::replace(&mut child_index[byte as usize], EMPTY);
                if pos == EMPTY {
                    return None;
                }
                *num_children -= 1;
                mem::replace(&mut children[pos as usize], NodeRef::NULL).get()
            }
            Node::Node256 { num_children, children, .. } => {
                let child = mem::replace(&mut children[byte as usize], NodeRef::NULL).get();
                if child.is_some() {
                    *num_children -= 1;
                }
                child
            }
        }
    }

    /// Promote the node to the next size class. Node256 and leaves are unchanged.
    pub(crate) fn grow(&mut self) {
        let grown = match self {
            Node::Node4 { prefix, num_children, keys, children, terminal } => {
                let mut new_keys = [0u8; 16];
                new_keys[..4].copy_from_slice(keys);
                let mut new_children = [NodeRef::NULL; 16];
                new_children[..4].copy_from_slice(children);
                Node::Node16 {
                    prefix: mem::take(prefix),
                    num_children: *num_children,
                    keys: new_keys,
                    children: new_children,
                    terminal: *terminal,
                }
            }
            Node::Node16 { prefix, num_children, keys, children, terminal } => {
                let mut child_index = Box::new([EMPTY; 256]);
                let mut new_children = Box::new([NodeRef::NULL; 48]);
                for i in 0..*num_children as usize {
                    child_index[keys[i] as usize] = i as u8;
                    new_children[i] = children[i];
                }
                Node::Node48 {
                    prefix: mem::take(prefix),
                    num_children: *num_children,
                    child_index,
                    children: new_children,
                    terminal: *terminal,
                }
            }
            Node::Node48 { prefix, num_children, child_index, children, terminal } => {
                let mut new_children = Box::new([NodeRef::NULL; 256]);
                for (byte, &pos) in child_index.iter().enumerate() {
                    if pos != EMPTY {
                        new_children[byte] = children[pos as usize];
                    }
                }
                Node::Node256 {
                    prefix: mem::take(prefix),
                    num_children: u16::from(*num_children),
                    children: new_children,
                    terminal: *terminal,
                }
            }
            Node::Leaf { .. } | Node::Node256 { .. } => return,
        };
        tracing::trace!(from = ?self.kind(), to = ?grown.kind(), "growing node");
        *self = grown;
    }
}

fn insert_sorted(keys: &mut [u8], children: &mut [NodeRef], num_children: &mut u8, byte: u8, child: NodeRef) {
    let n = *num_children as usize;
    if n >= keys.len() {
        return;
    }
    let pos = keys[..n].iter().position(|&k| k > byte).unwrap_or(n);
    keys.copy_within(pos..n, pos + 1);
    children.copy_within(pos..n, pos + 1);
    keys[pos] = byte;
    children[pos] = child;
    *num_children += 1;
}

fn remove_sorted(keys: &mut [u8], children: &mut [NodeRef], num_children: &mut u8, byte: u8) -> Option<NodeRef> {
    let n = *num_children as usize;
    let pos = keys[..n].iter().position(|&k| k == byte)?;
    let child = children[pos];
    keys.copy_within(pos + 1..n, pos);
    children.copy_within(pos + 1..n, pos);
    children[n - 1] = NodeRef::NULL;
    *num_children -= 1;
    Some(child)
}

impl<V> fmt::Debug for Node<V>
where
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf { key, value } => f
                .debug_struct("Leaf")
                .field("key", &String::from_utf8_lossy(key))
                .field("value", value)
                .finish(),
            Node::Node4 { prefix, num_children, keys, .. } => f
                .debug_struct("Node4")
                .field("prefix", prefix)
                .field("keys", &String::from_utf8_lossy(&keys[..*num_children as usize]))
                .field("terminal", &self.terminal().is_some())
                .finish(),
            Node::Node16 { prefix, num_children, keys, .. } => f
                .debug_struct("Node16")
                .field("prefix", prefix)
                .field("keys", &String::from_utf8_lossy(&keys[..*num_children as usize]))
                .field("terminal", &self.terminal().is_some())
                .finish(),
            Node::Node48 { prefix, num_children, .. } => f
                .debug_struct("Node48")
                .field("prefix", prefix)
                .field("num_children", num_children)
                .field("terminal", &self.terminal().is_some())
                .finish(),
            Node::Node256 { prefix, num_children, .. } => f
                .debug_struct("Node256")
                .field("prefix", prefix)
                .field("num_children", num_children)
                .field("terminal", &self.terminal().is_some())
                .finish(),
        }
    }
}
