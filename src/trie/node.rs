//! Trie node storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node keyed implicitly by the path segment that leads to it.
///
/// Children are kept in an ordered map so traversal order is stable across
/// processes and snapshot round trips.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieNode {
    pub(crate) children: BTreeMap<String, TrieNode>,
    pub(crate) terminal: bool,
}

impl TrieNode {
    /// Whether an indexed path ends at this node.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Look up a direct child by segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&Self> {
        self.children.get(segment)
    }

    /// Iterate over `(segment, child)` pairs in segment order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Self)> {
        self.children.iter().map(|(segment, node)| (segment.as_str(), node))
    }

    /// Number of nodes in this subtree, this node included.
    #[must_use]
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .values()
            .map(Self::subtree_size)
            .sum::<usize>()
    }
}
