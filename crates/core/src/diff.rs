//! Diff primitives used when reconstructing a revision timeline.
//!
//! Text diffing is a collaborator: anything implementing [`TextDiffer`] can be
//! plugged into the reconstructor. [`LineDiffer`] is the built-in LCS
//! line-level implementation.

use serde::{Deserialize, Serialize};

/// The status of an item in a diff comparison.
///
/// - `Added`     -- present only in the incoming/new side.
/// - `Removed`   -- present only in the current/old side.
/// - `Changed`   -- present in both sides but with different values.
/// - `Unchanged` -- present in both sides with identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl DiffStatus {
    /// String representation for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Attribute diffs
// ---------------------------------------------------------------------------

/// Scalar attributes compared between versions besides the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Title,
    Tags,
}

/// Old and new value of one attribute. An empty value counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub status: DiffStatus,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl AttributeDiff {
    /// Compare two attribute values; `None` when they are equal.
    pub fn between(old: Option<&str>, new: Option<&str>) -> Option<Self> {
        let old = old.filter(|s| !s.is_empty());
        let new = new.filter(|s| !s.is_empty());
        let status = match (old, new) {
            (a, b) if a == b => return None,
            (None, Some(_)) => DiffStatus::Added,
            (Some(_), None) => DiffStatus::Removed,
            _ => DiffStatus::Changed,
        };
        Some(Self {
            status,
            old: old.map(str::to_string),
            new: new.map(str::to_string),
        })
    }
}

// ---------------------------------------------------------------------------
// Text diff collaborator
// ---------------------------------------------------------------------------

/// Computes a diff between two texts. Must be pure.
pub trait TextDiffer {
    type Output;

    fn diff(&self, old: &str, new: &str) -> Self::Output;
}

/// A single line in a diff result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub status: DiffStatus,
    pub content: String,
}

/// Line-level diff using a longest-common-subsequence table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDiffer;

impl TextDiffer for LineDiffer {
    type Output = Vec<DiffLine>;

    fn diff(&self, old: &str, new: &str) -> Vec<DiffLine> {
        compute_line_diff(old, new)
    }
}

/// Largest LCS table (in cells) built for one pair of texts. Past it the
/// differing middle is reported as a block removal followed by an addition.
pub const MAX_LCS_CELLS: usize = 4_000_000;

/// Compute a line diff. Lines are tagged `Added`, `Removed` or `Unchanged`.
///
/// The common leading and trailing lines are matched directly; only the
/// differing middle goes through the LCS table.
pub fn compute_line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_lines[prefix..]
        .iter()
        .rev()
        .zip(new_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old_lines[prefix..old_lines.len() - suffix];
    let new_mid = &new_lines[prefix..new_lines.len() - suffix];

    let mut out = Vec::with_capacity(old_lines.len().max(new_lines.len()));
    out.extend(old_lines[..prefix].iter().map(|l| diff_line(DiffStatus::Unchanged, l)));
    if old_mid.len().saturating_mul(new_mid.len()) > MAX_LCS_CELLS {
        out.extend(old_mid.iter().map(|l| diff_line(DiffStatus::Removed, l)));
        out.extend(new_mid.iter().map(|l| diff_line(DiffStatus::Added, l)));
    } else {
        out.extend(lcs_diff(old_mid, new_mid));
    }
    out.extend(
        old_lines[old_lines.len() - suffix..]
            .iter()
            .map(|l| diff_line(DiffStatus::Unchanged, l)),
    );
    out
}

fn diff_line(status: DiffStatus, content: &str) -> DiffLine {
    DiffLine {
        status,
        content: content.to_string(),
    }
}

/// LCS diff over a flat `(m + 1) x (n + 1)` table.
fn lcs_diff(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let (m, n) = (old.len(), new.len());
    let width = n + 1;
    let mut table = vec![0u32; (m + 1) * width];
    for i in 1..=m {
        for j in 1..=n {
            table[i * width + j] = if old[i - 1] == new[j - 1] {
                table[(i - 1) * width + j - 1] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + j - 1])
            };
        }
    }

    let mut out = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            out.push(diff_line(DiffStatus::Unchanged, old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * width + j - 1] >= table[(i - 1) * width + j]) {
            out.push(diff_line(DiffStatus::Added, new[j - 1]));
            j -= 1;
        } else {
            out.push(diff_line(DiffStatus::Removed, old[i - 1]));
            i -= 1;
        }
    }
    out.reverse();
    out
}
