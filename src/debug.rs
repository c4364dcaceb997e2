//! Debug utilities for tree troubleshooting.

use std::fmt;

use crate::node::{Node, NodeKind, NodeRef, EMPTY, MAX_PREFIX_LEN};
use crate::traverse::TraverseOptions;
use crate::tree::Tree;

/// Node counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of leaves.
    pub leaves: usize,
    /// Number of Node4 instances.
    pub node4: usize,
    /// Number of Node16 instances.
    pub node16: usize,
    /// Number of Node48 instances.
    pub node48: usize,
    /// Number of Node256 instances.
    pub node256: usize,
}

impl TreeStats {
    /// Number of internal nodes.
    pub fn internal(&self) -> usize {
        self.node4 + self.node16 + self.node48 + self.node256
    }
}

impl<V> Tree<V> {
    /// Count nodes by kind.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.for_each(TraverseOptions::ALL, |node| {
            match node.kind() {
                NodeKind::Leaf => stats.leaves += 1,
                NodeKind::Node4 => stats.node4 += 1,
                NodeKind::Node16 => stats.node16 += 1,
                NodeKind::Node48 => stats.node48 += 1,
                NodeKind::Node256 => stats.node256 += 1,
            }
            true
        });
        stats
    }

    /// Verify tree integrity - returns list of issues found.
    pub fn verify_integrity(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut leaves = 0;
        if let Some(root) = self.root() {
            self.verify_node(root, Vec::new(), &mut issues, &mut leaves);
        }
        if leaves != self.len() {
            issues.push(format!("found {} leaves but len={}", leaves, self.len()));
        }
        issues
    }

    fn verify_node(&self, r: NodeRef, path: Vec<u8>, issues: &mut Vec<String>, leaves: &mut usize) {
        let Some(node) = self.get_node(r) else {
            issues.push(format!("dangling reference {:?} at path {:?}", r, path));
            return;
        };

        let Some(prefix) = node.prefix() else {
            *leaves += 1;
            if !node.has_prefix(&path) {
                issues.push(format!("leaf {:?} does not start with its path {:?}", node.key(), path));
            }
            return;
        };

        if prefix.stored().len() > MAX_PREFIX_LEN {
            issues.push(format!("prefix stores {} bytes at path {:?}", prefix.stored().len(), path));
        }
        let mut node_path = path;
        let depth = node_path.len();
        node_path.extend_from_slice(self.prefix_bytes(r, depth));
        if node_path.len() != depth + prefix.len() {
            issues.push(format!("prefix of length {} cannot be recovered at path {:?}", prefix.len(), &node_path[..depth]));
        }
        if !node_path[depth..].starts_with(prefix.stored()) {
            issues.push(format!("stored prefix disagrees with leaves at path {:?}", node_path));
        }

        let branches = node.num_children() + usize::from(node.terminal().is_some());
        if branches < 2 {
            issues.push(format!("{:?} at path {:?} has {} branches", node.kind(), node_path, branches));
        }

        match node {
            Node::Node4 { num_children, keys, .. } => {
                check_sorted("Node4", &keys[..(*num_children as usize).min(4)], &node_path, issues);
            }
            Node::Node16 { num_children, keys, .. } => {
                check_sorted("Node16", &keys[..(*num_children as usize).min(16)], &node_path, issues);
            }
            Node::Node48 { num_children, child_index, children, .. } => {
                let used: Vec<u8> = child_index.iter().copied().filter(|&pos| pos != EMPTY).collect();
                if used.len() != *num_children as usize {
                    issues.push(format!("Node48 has {} valid indices but num_children={}", used.len(), num_children));
                }
                let live = children.iter().filter(|c| !c.is_null()).count();
                if live != used.len() {
                    issues.push(format!("Node48 has {} live children for {} indices", live, used.len()));
                }
                if used.iter().any(|&pos| pos as usize >= children.len()) {
                    issues.push(format!("Node48 index out of range at path {:?}", node_path));
                }
            }
            Node::Node256 { num_children, children, .. } => {
                let live = children.iter().filter(|c| !c.is_null()).count();
                if live != *num_children as usize {
                    issues.push(format!("Node256 has {} live children but num_children={}", live, num_children));
                }
            }
            Node::Leaf { .. } => {}
        }

        if let Some(leaf) = node.terminal() {
            match self.get_node(leaf) {
                Some(Node::Leaf { key, .. }) if *key == node_path => {}
                Some(Node::Leaf { key, .. }) => {
                    issues.push(format!("terminal leaf {:?} does not end at path {:?}", key, node_path));
                }
                _ => issues.push(format!("terminal at path {:?} is not a leaf", node_path)),
            }
            *leaves += 1;
        }

        for slot in 1..node.slot_count() {
            let (Some(child), Some(byte)) = (node.child_at(slot), node.slot_key(slot)) else {
                continue;
            };
            let mut child_path = node_path.clone();
            child_path.push(byte);
            self.verify_node(child, child_path, issues, leaves);
        }
    }
}

fn check_sorted(kind: &str, keys: &[u8], path: &[u8], issues: &mut Vec<String>) {
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        issues.push(format!("{} keys {:?} not strictly sorted at path {:?}", kind, keys, path));
    }
}

impl<V: fmt::Debug> fmt::Debug for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tree (len={}, version={})", self.len(), self.version())?;
        match self.root() {
            Some(root) => self.fmt_node(f, root, 1, "root"),
            None => writeln!(f, "  (empty)"),
        }
    }
}

impl<V: fmt::Debug> Tree<V> {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, r: NodeRef, depth: usize, label: &str) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let node = self.node(r);
        writeln!(f, "{}[{}] {:?}", indent, label, node)?;
        for slot in 0..node.slot_count() {
            let Some(child) = node.child_at(slot) else {
                continue;
            };
            let label = match node.slot_key(slot) {
                Some(byte) => format!("{:?}", byte as char),
                None => "terminal".to_string(),
            };
            self.fmt_node(f, child, depth + 1, &label)?;
        }
        Ok(())
    }
}
