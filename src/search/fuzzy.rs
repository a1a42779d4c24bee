//! Subsequence ranking of indexed paths.
//!
//! A candidate matches when every query character appears in it, in order,
//! ignoring case. Matched positions are found by a forward scan for the
//! earliest complete match followed by a backward scan that shrinks the window
//! to the tightest one ending at the same place.
//!
//! Scoring per matched character:
//! - `MATCH_SCORE` base
//! - `CONSECUTIVE_BONUS` when it directly follows the previous match
//! - `BOUNDARY_BONUS` at the start of the path or after a separator
//! - a gap penalty for skipped characters since the previous match, capped so
//!   that every matched character still contributes positively
//! - a leading penalty for characters before the first match, also capped
//!
//! Every match therefore scores at least 1.

use serde::{Deserialize, Serialize};

const MATCH_SCORE: i64 = 16;
const CONSECUTIVE_BONUS: i64 = 24;
const BOUNDARY_BONUS: i64 = 12;
const GAP_PENALTY: i64 = 3;
const MAX_GAP_PENALTY: i64 = 12;
const MAX_LEADING_PENALTY: i64 = 15;

/// One ranked candidate.
///
/// Serializes as `{"Path", "Indexes", "Score"}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FuzzyMatch {
    /// Candidate path.
    pub path: String,
    /// Character indexes of the matched query characters in `path`.
    pub indexes: Vec<usize>,
    /// Match quality, higher is better.
    pub score: i64,
}

/// Ranks candidate paths against a query.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyRanker {
    min_score: i64,
}

impl FuzzyRanker {
    /// Create a ranker that keeps every match.
    #[must_use]
    pub const fn new() -> Self {
        Self { min_score: 0 }
    }

    /// Drop matches scoring below `min_score`.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: i64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score and order every matching candidate.
    ///
    /// Results are sorted by descending score. Equal scores are ordered by
    /// shorter path first, then by position in `candidates`, so the order is
    /// fully determined by the candidate list.
    pub fn rank<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> Vec<FuzzyMatch> {
        let query: Vec<char> = query.chars().map(fold).collect();
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<FuzzyMatch> = candidates
            .iter()
            .filter_map(|candidate| score_candidate(&query, candidate.as_ref()))
            .filter(|m| m.score >= self.min_score)
            .collect();

        // sort_by is stable, ties keep candidate order
        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.path.chars().count().cmp(&b.path.chars().count()))
        });
        matches
    }
}

/// Rank `candidates` against `query` with no minimum score.
pub fn rank<S: AsRef<str>>(query: &str, candidates: &[S]) -> Vec<FuzzyMatch> {
    FuzzyRanker::new().rank(query, candidates)
}

/// Score a single candidate against an already case-folded query.
fn score_candidate(query: &[char], candidate: &str) -> Option<FuzzyMatch> {
    let target: Vec<char> = candidate.chars().collect();
    let folded: Vec<char> = target.iter().copied().map(fold).collect();
    let positions = match_positions(query, &folded)?;
    let score = score_positions(&positions, &target);

    Some(FuzzyMatch {
        path: candidate.to_string(),
        indexes: positions,
        score,
    })
}

fn fold(c: char) -> char {
    if c.is_ascii() {
        c.to_ascii_lowercase()
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

const fn is_boundary(c: char) -> bool {
    matches!(c, '/' | '\\' | '_' | '-' | '.' | ' ')
}

fn match_positions(query: &[char], target: &[char]) -> Option<Vec<usize>> {
    let mut qi = 0;
    let mut end = None;
    for (ti, &tc) in target.iter().enumerate() {
        if tc == query[qi] {
            qi += 1;
            if qi == query.len() {
                end = Some(ti);
                break;
            }
        }
    }
    let end = end?;

    let mut qi = query.len();
    let mut start = 0;
    for (ti, &tc) in target[..=end].iter().enumerate().rev() {
        if tc == query[qi - 1] {
            qi -= 1;
            if qi == 0 {
                start = ti;
                break;
            }
        }
    }

    let mut positions = Vec::with_capacity(query.len());
    for (offset, &tc) in target[start..=end].iter().enumerate() {
        if positions.len() < query.len() && tc == query[positions.len()] {
            positions.push(start + offset);
        }
    }
    Some(positions)
}

fn capped(n: usize, per_char: i64, cap: i64) -> i64 {
    i64::try_from(n).map_or(cap, |n| n.saturating_mul(per_char).min(cap))
}

fn score_positions(positions: &[usize], target: &[char]) -> i64 {
    let mut score = 0;
    let mut prev: Option<usize> = None;

    for &pos in positions {
        score += MATCH_SCORE;
        if pos == 0 || is_boundary(target[pos - 1]) {
            score += BOUNDARY_BONUS;
        }
        score += match prev {
            Some(p) if pos == p + 1 => CONSECUTIVE_BONUS,
            Some(p) => -capped(pos - p - 1, GAP_PENALTY, MAX_GAP_PENALTY),
            None => -capped(pos, 1, MAX_LEADING_PENALTY),
        };
        prev = Some(pos);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_example() {
        let candidates = ["/a/readme.md", "/a/readme_old.md", "/a/xyz.md"];
        let first = rank("readme", &candidates);
        let second = rank("readme", &candidates);

        let paths: Vec<&str> = first.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["/a/readme.md", "/a/readme_old.md"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_matching_candidates_excluded() {
        let results = rank("zzz", &["/a/readme.md", "/b/main.rs"]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_order_matters() {
        // "mr" is a subsequence of main.rs, "rm" is not
        assert_eq!(rank("mr", &["main.rs"]).len(), 1);
        assert!(rank("rm", &["main.rs"]).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let results = rank("README", &["/a/readme.md"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].indexes, vec![3, 4, 5, 6, 7, 8]);

        let results = rank("buf", &["/src/TextBuffer.rs"]);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_indexes_use_tightest_window() {
        // Greedy forward matching alone would pick the 'a' in "/a/"
        let results = rank("abc", &["/a/x/abc"]);
        assert_eq!(results[0].indexes, vec![5, 6, 7]);
    }

    #[test]
    fn test_contiguous_beats_scattered() {
        let results = rank("abc", &["/x/a_b_c.txt", "/x/abc.txt"]);
        assert_eq!(results[0].path, "/x/abc.txt");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_early_beats_late() {
        let results = rank("readme", &["/very/long/prefix/readme.md", "/a/readme.md"]);
        assert_eq!(results[0].path, "/a/readme.md");
    }

    #[test]
    fn test_scores_are_positive() {
        let results = rank("aaaa", &["a/////////////////////a//////////////a///////////a"]);
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0);
    }

    #[test]
    fn test_min_score_filters() {
        let candidates = ["/x/abc.txt", "/x/a_b_c.txt"];
        let all = rank("abc", &candidates);
        let threshold = all[0].score;

        let filtered = FuzzyRanker::new()
            .with_min_score(threshold)
            .rank("abc", &candidates);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].path, "/x/abc.txt");
    }

    #[test]
    fn test_truncation_after_ranking() {
        let mut candidates: Vec<String> = (0..20).map(|i| format!("/deep/dir/{i}/r_e_a_d_m_e")).collect();
        candidates.push("/readme".to_string());

        let mut results = rank("readme", &candidates);
        results.truncate(1);
        assert_eq!(results[0].path, "/readme");
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        assert!(rank("", &["/a/readme.md"]).is_empty());
    }

    #[test]
    fn test_unicode_candidates() {
        let results = rank("über", &["/docs/Über.txt"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].indexes, vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_serializes_with_wire_field_names() {
        let m = FuzzyMatch {
            path: "/a".to_string(),
            indexes: vec![1],
            score: 29,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"Path":"/a","Indexes":[1],"Score":29}"#);
    }
}
