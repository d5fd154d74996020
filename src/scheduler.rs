use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Order in which queued requests are considered for issue.
#[derive(
    strum::EnumString, strum::Display, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Policy {
    /// Only the oldest request
    Fcfs,
    /// All requests in arrival order
    FrFcfs,
    /// Row buffer hits first, then arrival order
    #[default]
    FrFcfsPriorHit,
}

/// A queued request as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Position in the queue (arrival order)
    pub idx: usize,
    /// Target row is latched in its bank
    pub row_hit: bool,
}

pub type Candidates = SmallVec<[usize; 32]>;

pub fn prior_hit_ordering(lhs: &Candidate, rhs: &Candidate) -> std::cmp::Ordering {
    match (lhs.row_hit, rhs.row_hit) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => lhs.idx.cmp(&rhs.idx),
    }
}

impl Policy {
    /// Whether the policy looks at the row buffer at all.
    #[must_use]
    pub fn needs_row_hits(self) -> bool {
        self == Self::FrFcfsPriorHit
    }

    /// Queue positions in the order they should be tried.
    pub fn order(self, candidates: impl IntoIterator<Item = Candidate>) -> Candidates {
        use itertools::Itertools;
        let candidates = candidates.into_iter();
        match self {
            Self::Fcfs => candidates.take(1).map(|c| c.idx).collect(),
            Self::FrFcfs => candidates.map(|c| c.idx).collect(),
            Self::FrFcfsPriorHit => candidates
                .sorted_by(prior_hit_ordering)
                .map(|c| c.idx)
                .collect(),
        }
    }
}
