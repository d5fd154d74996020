use crate::spec::Command;
use smallvec::SmallVec;
use strum::EnumCount;

/// Issue history of a node.
///
/// The scoreboard keeps, per command, the cycles at which the command was
/// issued on the node or one of its descendants (most recent first), and the
/// last cycle at which it was issued on one of the node's siblings.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    depth: usize,
    history: [SmallVec<[u64; 4]>; Command::COUNT],
    sibling_last: [Option<u64>; Command::COUNT],
}

impl Scoreboard {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            history: std::array::from_fn(|_| SmallVec::new()),
            sibling_last: [None; Command::COUNT],
        }
    }

    /// Cycle of the `dist`-th most recent issue of `cmd` (1 = most recent).
    #[must_use]
    pub fn past(&self, cmd: Command, dist: usize) -> Option<u64> {
        let idx = dist.checked_sub(1)?;
        self.history[cmd as usize].get(idx).copied()
    }

    /// Last cycle `cmd` was issued on a sibling.
    #[must_use]
    pub fn sibling_past(&self, cmd: Command) -> Option<u64> {
        self.sibling_last[cmd as usize]
    }

    pub fn record(&mut self, cmd: Command, cycle: u64) {
        let history = &mut self.history[cmd as usize];
        debug_assert!(history.first().map_or(true, |last| *last <= cycle));
        history.insert(0, cycle);
        history.truncate(self.depth);
    }

    pub fn record_sibling(&mut self, cmd: Command, cycle: u64) {
        self.sibling_last[cmd as usize] = Some(cycle);
    }
}
