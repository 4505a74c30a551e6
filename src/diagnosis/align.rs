//! Minimum-edit-distance alignment over phoneme tokens.
//!
//! [`align`] fills the classic Levenshtein table (unit cost for substitution,
//! insertion and deletion) and backtraces one optimal path.  When several
//! paths share the minimal cost the backtrace prefers, in order:
//! match/substitution, deletion, insertion, which makes the output fully
//! deterministic for identical inputs.
//!
//! Terminology is from the target's point of view:
//!
//! * **Deletion**: a target phoneme the learner did not produce.
//! * **Insertion**: an extra phoneme the learner produced.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EditOp
// ---------------------------------------------------------------------------

/// Operation at one position of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOp {
    Match,
    Substitution,
    Insertion,
    Deletion,
}

impl EditOp {
    pub fn is_error(self) -> bool {
        self != EditOp::Match
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// One optimal alignment of a target sequence against a user sequence.
///
/// `target`, `user` and `ops` always have the same length; a `None` in
/// `target` marks an insertion, a `None` in `user` marks a deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub target: Vec<Option<String>>,
    pub user: Vec<Option<String>>,
    pub ops: Vec<EditOp>,
    /// Total edit cost (number of non-match ops).
    pub cost: usize,
    /// Length of the target sequence this alignment was computed against.
    pub target_len: usize,
}

impl Alignment {
    /// Cost divided by target length.  An empty target normalises to the raw
    /// cost so it never looks better than a real candidate.
    pub fn normalized_cost(&self) -> f64 {
        self.cost as f64 / self.target_len.max(1) as f64
    }

    /// Compare normalised costs exactly (cross-multiplied integers) so that
    /// ties are detected without floating-point noise.
    pub fn cmp_normalized(&self, other: &Alignment) -> Ordering {
        let lhs = self.cost * other.target_len.max(1);
        let rhs = other.cost * self.target_len.max(1);
        lhs.cmp(&rhs)
    }
}

// ---------------------------------------------------------------------------
// align
// ---------------------------------------------------------------------------

/// Align `user` against `target` with unit edit costs.
pub fn align(target: &[String], user: &[String]) -> Alignment {
    let n = target.len();
    let m = user.len();

    // dist[i][j] = edit distance between target[..i] and user[..j]
    let mut dist = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in dist.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        dist[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let sub = usize::from(target[i - 1] != user[j - 1]);
            dist[i][j] = (dist[i - 1][j - 1] + sub)
                .min(dist[i - 1][j] + 1)
                .min(dist[i][j - 1] + 1);
        }
    }

    // Backtrace from the bottom-right corner.
    let mut t_out = Vec::with_capacity(n + m);
    let mut u_out = Vec::with_capacity(n + m);
    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);

    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let same = target[i - 1] == user[j - 1];
            if dist[i][j] == dist[i - 1][j - 1] + usize::from(!same) {
                t_out.push(Some(target[i - 1].clone()));
                u_out.push(Some(user[j - 1].clone()));
                ops.push(if same { EditOp::Match } else { EditOp::Substitution });
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && dist[i][j] == dist[i - 1][j] + 1 {
            t_out.push(Some(target[i - 1].clone()));
            u_out.push(None);
            ops.push(EditOp::Deletion);
            i -= 1;
        } else {
            t_out.push(None);
            u_out.push(Some(user[j - 1].clone()));
            ops.push(EditOp::Insertion);
            j -= 1;
        }
    }

    t_out.reverse();
    u_out.reverse();
    ops.reverse();

    Alignment {
        target: t_out,
        user: u_out,
        ops,
        cost: dist[n][m],
        target_len: n,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_sequences_are_all_matches() {
        let a = align(&seq(&["k", "æ", "t"]), &seq(&["k", "æ", "t"]));
        assert_eq!(a.cost, 0);
        assert!(a.ops.iter().all(|op| *op == EditOp::Match));
        assert_eq!(a.target.len(), 3);
    }

    #[test]
    fn single_substitution() {
        let a = align(&seq(&["k", "æ", "t"]), &seq(&["k", "a", "t"]));
        assert_eq!(a.cost, 1);
        assert_eq!(a.ops, vec![EditOp::Match, EditOp::Substitution, EditOp::Match]);
        assert_eq!(a.user[1].as_deref(), Some("a"));
    }

    #[test]
    fn missing_phoneme_is_a_deletion() {
        let a = align(&seq(&["s", "t", "ɒ", "p"]), &seq(&["s", "ɒ", "p"]));
        assert_eq!(a.cost, 1);
        assert_eq!(a.ops[1], EditOp::Deletion);
        assert_eq!(a.target[1].as_deref(), Some("t"));
        assert_eq!(a.user[1], None);
    }

    #[test]
    fn extra_phoneme_is_an_insertion() {
        let a = align(&seq(&["k", "æ", "t"]), &seq(&["k", "æ", "t", "ə"]));
        assert_eq!(a.cost, 1);
        assert_eq!(a.ops.last(), Some(&EditOp::Insertion));
        assert_eq!(a.target.last(), Some(&None));
    }

    #[test]
    fn empty_user_is_all_deletions() {
        let a = align(&seq(&["k", "æ", "t"]), &[]);
        assert_eq!(a.cost, 3);
        assert!(a.ops.iter().all(|op| *op == EditOp::Deletion));
    }

    #[test]
    fn empty_target_is_all_insertions() {
        let a = align(&[], &seq(&["a", "b"]));
        assert_eq!(a.cost, 2);
        assert!(a.ops.iter().all(|op| *op == EditOp::Insertion));
        assert_eq!(a.target_len, 0);
    }

    #[test]
    fn aligned_sequences_have_equal_length() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["a", "b", "c"], &["x"]),
            (&["a"], &["x", "y", "z", "w"]),
            (&[], &[]),
            (&["θ", "ɪ", "ŋ", "k"], &["s", "ɪ", "ŋ"]),
        ];
        for (t, u) in cases {
            let a = align(&seq(t), &seq(u));
            assert_eq!(a.target.len(), a.user.len());
            assert_eq!(a.target.len(), a.ops.len());
            assert_eq!(a.ops.iter().filter(|op| op.is_error()).count(), a.cost);
        }
    }

    #[test]
    fn backtrace_is_deterministic() {
        let t = seq(&["a", "b", "a"]);
        let u = seq(&["a", "a"]);
        assert_eq!(align(&t, &u), align(&t, &u));
    }

    #[test]
    fn normalized_comparison_detects_exact_ties() {
        // 1/2 vs 2/4
        let a = align(&seq(&["a", "b"]), &seq(&["a", "x"]));
        let b = align(&seq(&["a", "b", "c", "d"]), &seq(&["a", "x", "c", "y"]));
        assert_eq!(a.cmp_normalized(&b), Ordering::Equal);
        assert!((a.normalized_cost() - 0.5).abs() < f64::EPSILON);
    }
}
