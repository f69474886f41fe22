use serde::{Deserialize, Serialize};
use streaming::VoteCounts;

/// A cast vote. The absence of a vote is `None` in an `Option<VoteKind>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn other(self) -> Self {
        match self {
            VoteKind::Like => VoteKind::Dislike,
            VoteKind::Dislike => VoteKind::Like,
        }
    }

    /// URL path segment of the vote endpoint.
    pub fn path_segment(self) -> &'static str {
        match self {
            VoteKind::Like => "like",
            VoteKind::Dislike => "dislike",
        }
    }
}

/// Voting for what is already set un-votes; anything else replaces it.
pub fn toggle(current: Option<VoteKind>, target: VoteKind) -> Option<VoteKind> {
    if current == Some(target) {
        None
    } else {
        Some(target)
    }
}

/// Counts as they should read after moving from `from` to `to`, before the
/// server confirms.
pub fn optimistic_counts(
    counts: VoteCounts,
    from: Option<VoteKind>,
    to: Option<VoteKind>,
) -> VoteCounts {
    if from == to {
        return counts;
    }
    let mut out = counts;
    match from {
        Some(VoteKind::Like) => out.likes = out.likes.saturating_sub(1),
        Some(VoteKind::Dislike) => out.dislikes = out.dislikes.saturating_sub(1),
        None => {}
    }
    match to {
        Some(VoteKind::Like) => out.likes = out.likes.saturating_add(1),
        Some(VoteKind::Dislike) => out.dislikes = out.dislikes.saturating_add(1),
        None => {}
    }
    out
}
