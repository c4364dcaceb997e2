//! Thread-safe tree wrapper.
//!
//! Writers take the write lock for a single `insert`/`remove`. Readers create
//! a cursor once and step it under short read-lock sections; a writer that
//! slips in between two steps makes the next step fail with
//! [`Error::ConcurrentModification`](crate::Error::ConcurrentModification).

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cursor::Cursor;
use crate::traverse::TraverseOptions;
use crate::tree::Tree;
use crate::TreeConfig;

/// A [`Tree`] behind a [`parking_lot::RwLock`].
pub struct SharedTree<V> {
    inner: RwLock<Tree<V>>,
}

impl<V> SharedTree<V> {
    /// Create a new empty shared tree.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a new empty shared tree with the given configuration.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            inner: RwLock::new(Tree::with_config(config)),
        }
    }

    /// Insert a key-value pair.
    ///
    /// Returns the previous value if the key already existed.
    pub fn insert(&self, key: impl AsRef<[u8]>, value: V) -> Option<V> {
        self.inner.write().insert(key.as_ref(), value)
    }

    /// Remove a key, returning its value.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> Option<V> {
        self.inner.write().remove(key.as_ref())
    }

    /// Whether the tree holds `key`.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.inner.read().contains_key(key.as_ref())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current structural version.
    pub fn version(&self) -> u64 {
        self.inner.read().version()
    }

    /// Create a cursor against the current version of the tree.
    pub fn cursor(&self, options: TraverseOptions) -> Cursor {
        self.inner.read().cursor(options)
    }

    /// Lock for reading; pass the guard to cursor calls.
    pub fn read(&self) -> RwLockReadGuard<'_, Tree<V>> {
        self.inner.read()
    }

    /// Lock for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Tree<V>> {
        self.inner.write()
    }

    /// Unwrap the inner tree.
    pub fn into_inner(self) -> Tree<V> {
        self.inner.into_inner()
    }
}

impl<V: Clone> SharedTree<V> {
    /// Get a copy of the value for a key.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<V> {
        self.inner.read().get(key.as_ref()).cloned()
    }
}

impl<V> Default for SharedTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<Tree<V>> for SharedTree<V> {
    fn from(tree: Tree<V>) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }
}
