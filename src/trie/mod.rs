//! In-memory path index.
//!
//! A [`PathTrie`] maps indexed filesystem paths to nodes keyed by path
//! segment. It is built fresh for every `index` request and reloaded from the
//! snapshot for every `search`; nothing is shared between requests.
//!
//! Removing a path only clears its terminal flag. Branches are never pruned,
//! so [`PathTrie::node_count`] only grows over the lifetime of a trie. Tries
//! live for a single request, which keeps that growth bounded.

mod node;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub use node::TrieNode;

use crate::error::TrieError;

/// Separator used to split indexed paths into segments.
pub const PATH_SEPARATOR: char = '/';

/// Directories with more children than this are collapsed by [`PathTrie::render`].
pub const DEFAULT_RENDER_LIMIT: usize = 25;

/// Segment-keyed trie of indexed paths.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTrie {
    root: TrieNode,
}

/// Normalize Windows separators so every path splits the same way.
fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

impl PathTrie {
    /// Create an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Root node of the trie.
    #[must_use]
    pub const fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Insert a path. Re-inserting an indexed path is a no-op.
    pub fn insert(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }

        let normalized = normalize(path);
        let mut node = &mut self.root;
        for segment in normalized.split(PATH_SEPARATOR) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.terminal = true;
    }

    /// Remove a path from the index.
    ///
    /// # Errors
    ///
    /// Returns [`TrieError::NotFound`] if any segment is missing or the final
    /// node is not terminal.
    pub fn remove(&mut self, path: &str) -> Result<(), TrieError> {
        let normalized = normalize(path);
        let mut node = &mut self.root;
        for segment in normalized.split(PATH_SEPARATOR) {
            node = node
                .children
                .get_mut(segment)
                .ok_or_else(|| TrieError::not_found(path))?;
        }

        if !node.terminal {
            return Err(TrieError::not_found(path));
        }
        node.terminal = false;
        Ok(())
    }

    /// Whether `path` is currently indexed.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let normalized = normalize(path);
        let mut node = &self.root;
        for segment in normalized.split(PATH_SEPARATOR) {
            match node.child(segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal
    }

    /// Find every indexed path whose final component equals `filename`.
    ///
    /// Matching is case-sensitive and compares the whole component. Results
    /// come back in traversal order.
    #[must_use]
    pub fn exact_search(&self, filename: &str) -> Vec<String> {
        let mut results = Vec::new();
        self.for_each_terminal(|segments| {
            if segments.last().is_some_and(|last| *last == filename) {
                results.push(segments.join("/"));
            }
        });
        results
    }

    /// Flatten every indexed path, in traversal order.
    #[must_use]
    pub fn all_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.for_each_terminal(|segments| paths.push(segments.join("/")));
        paths
    }

    /// Number of indexed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.for_each_terminal(|_| count += 1);
        count
    }

    /// Whether no path is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes below the root, terminal or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.subtree_size() - 1
    }

    /// Render the trie as an indented tree.
    ///
    /// Terminal nodes get a `└── *` marker line. Directories with more than
    /// `max_children` entries are collapsed to a single line.
    #[must_use]
    pub fn render(&self, max_children: usize) -> String {
        let mut out = String::new();
        render_node(&self.root, "", max_children, &mut out);
        out
    }

    fn for_each_terminal<'a>(&'a self, mut f: impl FnMut(&[&'a str])) {
        let mut stack = Vec::new();
        visit(&self.root, &mut stack, &mut f);
    }
}

fn visit<'a>(node: &'a TrieNode, stack: &mut Vec<&'a str>, f: &mut impl FnMut(&[&'a str])) {
    for (segment, child) in node.children() {
        stack.push(segment);
        if child.terminal {
            f(stack.as_slice());
        }
        visit(child, stack, f);
        stack.pop();
    }
}

fn render_node(node: &TrieNode, indent: &str, max_children: usize, out: &mut String) {
    if node.children.len() > max_children {
        let _ = writeln!(out, "{indent}large directory ({} entries)", node.children.len());
        return;
    }
    for (segment, child) in node.children() {
        let _ = writeln!(out, "{indent}{segment}");
        if child.terminal {
            let _ = writeln!(out, "{indent}└── *");
        }
        render_node(child, &format!("{indent}    "), max_children, out);
    }
}

impl<S: AsRef<str>> Extend<S> for PathTrie {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for path in iter {
            self.insert(path.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for PathTrie {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.extend(iter);
        trie
    }
}
