//! Query evaluation over an indexed [`PathTrie`](crate::trie::PathTrie).
//!
//! Exact filename lookup lives on the trie itself; this module ranks the
//! flattened path list for fuzzy queries.

mod fuzzy;

pub use fuzzy::{rank, FuzzyMatch, FuzzyRanker};
