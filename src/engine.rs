//! Interpreter of the standard tables over a channel [`Tree`].

use crate::{
    node::{NodeId, Tree},
    request::AddrVec,
    spec::{Clause, Command, Effect, Level, Outcome, RowPredicate, StandardSpec, State},
};
use console::style;
use smallvec::SmallVec;
use std::sync::Arc;

/// Longest chain of commands needed to issue any command.
pub const MAX_PREREQ_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// The command can be issued this cycle.
    Ready,
    /// The given command has to be issued first.
    NeedsPrereq(Command),
    /// Timing is not satisfied for the given number of cycles.
    NotYet(u64),
}

/// The command that has to be issued next to make progress on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub cmd: Command,
    pub node: NodeId,
    /// Either [`Check::Ready`] or [`Check::NotYet`].
    pub check: Check,
}

impl Resolution {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.check == Check::Ready
    }
}

#[derive(Debug, Clone)]
pub struct ConstraintEngine {
    spec: Arc<StandardSpec>,
}

impl ConstraintEngine {
    #[must_use]
    pub fn new(spec: Arc<StandardSpec>) -> Self {
        Self { spec }
    }

    #[must_use]
    pub fn spec(&self) -> &StandardSpec {
        &self.spec
    }

    fn prereq_outcome(&self, tree: &Tree, node: NodeId, clause: &Clause, addr: &AddrVec) -> Outcome {
        let n = tree.get(node);
        match clause {
            Clause::Pass => Outcome::Pass,
            Clause::ByState(states) => match states.iter().find(|(state, _)| *state == n.state) {
                Some((_, outcome)) => *outcome,
                None => panic!(
                    "{} has no prerequisite for state {} of {} {}",
                    style("contract violation").red(),
                    n.state,
                    n.level,
                    n.id
                ),
            },
            Clause::RowBuffer { open, close } => {
                let row = addr[Level::Row as usize];
                match (n.state, n.open_row) {
                    (State::Opened, Some(open_row)) if open_row == row => Outcome::Ready,
                    (State::Opened, _) => Outcome::Issue(*close),
                    _ => Outcome::Issue(*open),
                }
            }
            Clause::ChildrenClosed { otherwise } => {
                let any_open = n
                    .children
                    .iter()
                    .any(|child| tree.get(*child).state == State::Opened);
                if any_open {
                    Outcome::Issue(*otherwise)
                } else {
                    Outcome::Ready
                }
            }
        }
    }

    /// Check whether `cmd` can be issued on `node` at cycle `now`.
    ///
    /// # Panics
    /// If `node` is not at the issue level of the command.
    #[must_use]
    pub fn check(&self, tree: &Tree, node: NodeId, cmd: Command, addr: &AddrVec, now: u64) -> Check {
        let level = tree.get(node).level;
        let issue_level = self.spec.scope(cmd).issue_level();
        assert_eq!(
            level, issue_level,
            "{cmd} is issued at {issue_level}, not at {level}"
        );

        let path = tree.path(node);
        'walk: for &id in &path {
            let level = tree.get(id).level;
            for clause in &self.spec.prereq(level, cmd).0 {
                match self.prereq_outcome(tree, id, clause, addr) {
                    Outcome::Pass => {}
                    Outcome::Ready => break 'walk,
                    Outcome::Issue(prereq) if prereq == cmd => break 'walk,
                    Outcome::Issue(prereq) => return Check::NeedsPrereq(prereq),
                }
            }
        }

        let mut wait = 0;
        for &id in &path {
            let n = tree.get(id);
            for constraint in self.spec.constraints(n.level, cmd) {
                let past = if constraint.sibling {
                    n.scoreboard.sibling_past(constraint.prior)
                } else {
                    n.scoreboard.past(constraint.prior, constraint.dist)
                };
                if let Some(past) = past {
                    let earliest = past + constraint.gap;
                    wait = wait.max(earliest.saturating_sub(now));
                }
            }
        }
        if wait > 0 {
            Check::NotYet(wait)
        } else {
            Check::Ready
        }
    }

    /// Issue `cmd` on `node`, updating issue history and state.
    pub fn issue(&self, tree: &mut Tree, node: NodeId, cmd: Command, addr: &AddrVec, now: u64) {
        let path = tree.path(node);
        for &id in &path {
            tree.get_mut(id).scoreboard.record(cmd, now);
            let siblings: SmallVec<[NodeId; 8]> = tree.siblings(id).collect();
            for sibling in siblings {
                tree.get_mut(sibling).scoreboard.record_sibling(cmd, now);
            }
        }

        for &id in &path {
            let level = tree.get(id).level;
            match self.spec.effect(level, cmd) {
                Effect::None => {}
                Effect::OpenRow => {
                    let n = tree.get_mut(id);
                    n.state = State::Opened;
                    n.open_row = Some(addr[Level::Row as usize]);
                }
                Effect::CloseRow => {
                    let n = tree.get_mut(id);
                    n.state = State::Closed;
                    n.open_row = None;
                }
                Effect::CloseChildren => {
                    let children = tree.get(id).children.clone();
                    for child in children {
                        let n = tree.get_mut(child);
                        n.state = State::Closed;
                        n.open_row = None;
                    }
                }
                Effect::SetState(state) => tree.get_mut(id).state = state,
                Effect::PowerDown => {
                    let any_open = tree
                        .get(id)
                        .children
                        .iter()
                        .any(|child| tree.get(*child).state == State::Opened);
                    tree.get_mut(id).state = if any_open {
                        State::ActPowerDown
                    } else {
                        State::PrePowerDown
                    };
                }
            }
        }

        if log::log_enabled!(log::Level::Trace) {
            let n = tree.get(node);
            log::trace!(
                "{}: issued {} on {} {} for {:?}",
                now,
                style(cmd).cyan(),
                n.level,
                n.id,
                addr
            );
        }
    }

    /// Find the next command on the prerequisite chain of `cmd`.
    ///
    /// # Panics
    /// If the chain revisits a command or exceeds [`MAX_PREREQ_DEPTH`].
    #[must_use]
    pub fn resolve(&self, tree: &Tree, addr: &AddrVec, cmd: Command, now: u64) -> Resolution {
        let mut visited: SmallVec<[Command; MAX_PREREQ_DEPTH]> = SmallVec::new();
        let mut cmd = cmd;
        loop {
            assert!(
                !visited.contains(&cmd) && visited.len() < MAX_PREREQ_DEPTH,
                "prerequisite chain {visited:?} does not terminate at {cmd}"
            );
            visited.push(cmd);
            let node = tree.resolve(addr, self.spec.scope(cmd));
            match self.check(tree, node, cmd, addr, now) {
                Check::NeedsPrereq(prereq) => cmd = prereq,
                check => return Resolution { cmd, node, check },
            }
        }
    }

    fn row_predicate(&self, tree: &Tree, addr: &AddrVec, predicate: RowPredicate) -> bool {
        let bank = tree.get(tree.resolve(addr, Level::Bank));
        match predicate {
            RowPredicate::TargetRowOpen => {
                bank.state == State::Opened && bank.open_row == Some(addr[Level::Row as usize])
            }
            RowPredicate::AnyRowOpen => bank.state == State::Opened,
        }
    }

    /// The target row of `cmd` is latched in its bank.
    ///
    /// # Panics
    /// If `cmd` is not an accessing command.
    #[must_use]
    pub fn row_hit(&self, tree: &Tree, addr: &AddrVec, cmd: Command) -> bool {
        let predicate = self
            .spec
            .rowhit(Level::Bank, cmd)
            .unwrap_or_else(|| panic!("row hit is undefined for {cmd}"));
        self.row_predicate(tree, addr, predicate)
    }

    /// The bank of `cmd` has any row latched.
    ///
    /// # Panics
    /// If `cmd` is not an accessing command.
    #[must_use]
    pub fn row_open(&self, tree: &Tree, addr: &AddrVec, cmd: Command) -> bool {
        let predicate = self
            .spec
            .rowopen(Level::Bank, cmd)
            .unwrap_or_else(|| panic!("row open is undefined for {cmd}"));
        self.row_predicate(tree, addr, predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::{Check, ConstraintEngine};
    use crate::{
        node::Tree,
        spec::{self, Command, Definition, Level, StandardSpec, State},
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    fn setup(spec: StandardSpec) -> (ConstraintEngine, Tree) {
        let mut spec = spec;
        spec.set_channel_number(1).unwrap();
        let tree = Tree::new(&spec, 0);
        (ConstraintEngine::new(Arc::new(spec)), tree)
    }

    fn wide_io() -> (ConstraintEngine, Tree) {
        setup(StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200").unwrap())
    }

    fn with_tables(speed: spec::SpeedEntry, tables: spec::Tables) -> StandardSpec {
        use spec::wide_io::{Org, WideIO};
        StandardSpec::from_tables(
            WideIO::STANDARD,
            WideIO::org_entry(Org::WideIO_1Gb),
            speed,
            tables,
            WideIO::PREFETCH_SIZE,
            WideIO::CHANNEL_WIDTH,
        )
        .unwrap()
    }

    fn with_speed(speed: spec::SpeedEntry) -> StandardSpec {
        with_tables(speed, spec::wide_io::WideIO::tables(&speed))
    }

    fn base_speed() -> spec::SpeedEntry {
        use spec::wide_io::{Org, Speed, WideIO};
        WideIO::speed_entry(Speed::WideIO_200, Org::WideIO_1Gb)
    }

    #[test]
    fn test_activate_then_read_same_row() {
        crate::testing::init_logging();
        let (engine, mut tree) = wide_io();
        let n_rcd = engine.spec().speed_entry.n_rcd;
        let addr = [0, 0, 1, 42, 0];

        let res = engine.resolve(&tree, &addr, Command::RD, 0);
        assert_eq!(res.cmd, Command::ACT);
        assert!(res.is_ready());
        engine.issue(&mut tree, res.node, Command::ACT, &addr, 0);
        assert!(engine.row_hit(&tree, &addr, Command::RD));

        let bank = tree.resolve(&addr, Level::Bank);
        assert_eq!(
            engine.check(&tree, bank, Command::RD, &addr, n_rcd - 1),
            Check::NotYet(1)
        );
        assert_eq!(
            engine.check(&tree, bank, Command::RD, &addr, n_rcd),
            Check::Ready
        );
    }

    #[test]
    fn test_access_to_other_row_needs_precharge_then_activate() {
        let (engine, mut tree) = wide_io();
        let s = engine.spec().speed_entry;
        let a = [0, 0, 1, 42, 0];
        let b = [0, 0, 1, 7, 0];

        let act = engine.resolve(&tree, &a, Command::WR, 0);
        engine.issue(&mut tree, act.node, act.cmd, &a, 0);
        assert!(engine.row_open(&tree, &b, Command::WR));
        assert!(!engine.row_hit(&tree, &b, Command::WR));

        let bank = tree.resolve(&b, Level::Bank);
        assert_eq!(
            engine.check(&tree, bank, Command::WR, &b, 100),
            Check::NeedsPrereq(Command::PRE)
        );
        let pre = engine.resolve(&tree, &b, Command::WR, s.n_ras);
        assert_eq!(pre.cmd, Command::PRE);
        assert!(pre.is_ready());
        engine.issue(&mut tree, pre.node, pre.cmd, &b, s.n_ras);
        assert_eq!(tree.get(bank).state, State::Closed);

        let act = engine.resolve(&tree, &b, Command::WR, s.n_ras + 1);
        assert_eq!(act.cmd, Command::ACT);
        assert_eq!(
            act.check,
            Check::NotYet((s.n_ras + s.n_rp).max(s.n_rc) - (s.n_ras + 1))
        );
    }

    #[test]
    fn test_power_down_exit_is_a_prerequisite() {
        let (engine, mut tree) = wide_io();
        let s = engine.spec().speed_entry;
        let addr = [0, 0, 0, 3, 0];
        let rank = tree.resolve(&addr, Level::Rank);

        assert_eq!(engine.check(&tree, rank, Command::PD, &addr, 0), Check::Ready);
        engine.issue(&mut tree, rank, Command::PD, &addr, 0);
        assert_eq!(tree.get(rank).state, State::PrePowerDown);

        let res = engine.resolve(&tree, &addr, Command::RD, 1);
        assert_eq!(res.cmd, Command::PDX);
        assert_eq!(res.check, Check::NotYet(s.n_cke - 1));

        engine.issue(&mut tree, rank, Command::PDX, &addr, s.n_cke);
        assert_eq!(tree.get(rank).state, State::PowerUp);
        let res = engine.resolve(&tree, &addr, Command::RD, s.n_cke);
        assert_eq!(res.cmd, Command::ACT);
        assert_eq!(res.check, Check::NotYet(s.n_xp));
    }

    #[test]
    fn test_refresh_closes_open_banks_first() {
        let (engine, mut tree) = wide_io();
        let addr = [0, 0, 2, 3, 0];
        let act = engine.resolve(&tree, &addr, Command::RD, 0);
        engine.issue(&mut tree, act.node, act.cmd, &addr, 0);

        let res = engine.resolve(&tree, &addr, Command::REF, 1);
        assert_eq!(res.cmd, Command::PRA);
        let ras = engine.spec().speed_entry.n_ras;
        engine.issue(&mut tree, res.node, Command::PRA, &addr, ras);
        assert!(tree
            .get(res.node)
            .children
            .iter()
            .all(|bank| tree.get(*bank).state == State::Closed));
        assert_eq!(engine.resolve(&tree, &addr, Command::REF, ras).cmd, Command::REF);
    }

    #[test]
    fn test_sibling_ranks_share_the_data_bus() {
        let mut spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200").unwrap();
        spec.set_rank_number(2).unwrap();
        let (engine, mut tree) = setup(spec);
        let s = engine.spec().speed_entry;
        let r0 = [0, 0, 0, 1, 0];
        let r1 = [0, 1, 0, 1, 0];
        for addr in [&r0, &r1] {
            let act = engine.resolve(&tree, addr, Command::RD, 0);
            engine.issue(&mut tree, act.node, act.cmd, addr, 0);
        }
        let t = 100;
        let res = engine.resolve(&tree, &r0, Command::RD, t);
        engine.issue(&mut tree, res.node, res.cmd, &r0, t);

        let res = engine.resolve(&tree, &r1, Command::RD, t + 1);
        let expected = (s.n_bl + s.n_dqsck).max(s.n_bl) - 1;
        assert_eq!(res.check, Check::NotYet(expected));
    }

    #[test]
    #[should_panic(expected = "is issued at")]
    fn test_check_at_wrong_level_panics() {
        let (engine, tree) = wide_io();
        let addr = [0; 5];
        let _ = engine.check(&tree, Tree::ROOT, Command::ACT, &addr, 0);
    }

    #[test]
    #[should_panic(expected = "does not terminate")]
    fn test_overlong_prerequisite_chain_panics() {
        use spec::{Clause, Outcome, PrereqRule};
        let speed = base_speed();
        let mut tables = spec::wide_io::WideIO::tables(&speed);
        // acyclic, but five commands long: RD, REF, PRA, SREFX, PDX
        for (cmd, prereq) in [
            (Command::RD, Outcome::Issue(Command::REF)),
            (Command::REF, Outcome::Issue(Command::PRA)),
            (Command::PRA, Outcome::Issue(Command::SREFX)),
            (Command::SREFX, Outcome::Issue(Command::PDX)),
            (Command::PDX, Outcome::Ready),
        ] {
            tables.prereq.set(
                Level::Rank,
                cmd,
                PrereqRule(vec![Clause::ByState(vec![(State::PowerUp, prereq)])]),
            );
        }
        let (engine, tree) = setup(with_tables(speed, tables));
        let _ = engine.resolve(&tree, &[0, 0, 0, 1, 0], Command::RD, 0);
    }

    const PRIORS: [Command; 6] = [
        Command::ACT,
        Command::PRE,
        Command::RD,
        Command::WR,
        Command::RDA,
        Command::WRA,
    ];

    proptest! {
        #[test]
        fn read_after_activate_respects_rcd(n_rcd in 1u64..64, delay in 0u64..128) {
            let speed = spec::SpeedEntry { n_rcd, ..base_speed() };
            let (engine, mut tree) = setup(with_speed(speed));
            let addr = [0, 0, 3, 9, 0];
            let bank = tree.resolve(&addr, Level::Bank);
            engine.issue(&mut tree, bank, Command::ACT, &addr, 10);

            let check = engine.check(&tree, bank, Command::RD, &addr, 10 + delay);
            if delay >= n_rcd {
                prop_assert_eq!(check, Check::Ready);
            } else {
                prop_assert_eq!(check, Check::NotYet(n_rcd - delay));
            }
        }

        #[test]
        fn activate_respects_all_recorded_constraints(
            n_rrd in 1u64..16,
            n_taw in 1u64..64,
            n_rc in 1u64..64,
            gaps in proptest::collection::vec(0u64..20, 4),
            delay in 0u64..80,
        ) {
            let speed = spec::SpeedEntry { n_rrd, n_taw, n_rc, ..base_speed() };
            let (engine, mut tree) = setup(with_speed(speed));

            // activate banks 0..4 with arbitrary gaps, then close bank 0
            let mut now = 0;
            let mut issued = Vec::new();
            for (bank, gap) in gaps.iter().enumerate() {
                now += gap;
                let addr = [0, 0, bank, 1, 0];
                let node = tree.resolve(&addr, Level::Bank);
                engine.issue(&mut tree, node, Command::ACT, &addr, now);
                issued.push(now);
            }
            let addr = [0, 0, 0, 2, 0];
            let bank = tree.resolve(&addr, Level::Bank);
            tree.get_mut(bank).state = State::Closed;
            tree.get_mut(bank).open_row = None;

            let now = now + delay;
            let earliest = [
                issued[3] + n_rrd,
                issued[0] + n_taw,
                issued[0] + n_rc,
            ]
            .into_iter()
            .max()
            .unwrap();
            let check = engine.check(&tree, bank, Command::ACT, &addr, now);
            if now >= earliest {
                prop_assert_eq!(check, Check::Ready);
            } else {
                prop_assert_eq!(check, Check::NotYet(earliest - now));
            }
        }

        #[test]
        fn activate_waits_for_the_latest_constraint(
            entries in proptest::collection::vec(
                (0usize..3, 0..PRIORS.len(), 1usize..=4, 0u64..40, any::<bool>()),
                0..12,
            ),
            history in proptest::collection::vec(proptest::collection::vec(0u64..50, 0..5), 3 * PRIORS.len()),
            siblings in proptest::collection::vec(proptest::option::of(0u64..200), 3 * PRIORS.len()),
            now in 0u64..250,
        ) {
            use spec::TimingEntry;
            let speed = base_speed();
            let mut tables = spec::wide_io::WideIO::tables(&speed);
            let reachable: Vec<_> = tables.reachable().collect();
            for (level, cmd) in reachable {
                tables.timing.set(level, cmd, Vec::new());
            }
            for &(level, prior, dist, val, sibling) in &entries {
                tables.timing.push(
                    Level::from_repr(level).unwrap(),
                    PRIORS[prior],
                    TimingEntry {
                        cmd: Command::ACT,
                        dist: if sibling { 1 } else { dist },
                        val,
                        sibling,
                    },
                );
            }
            let (engine, mut tree) = setup(with_tables(speed, tables));
            let addr = [0, 0, 0, 1, 0];
            let bank = tree.resolve(&addr, Level::Bank);
            let path = tree.path(bank);

            // fill channel, rank and bank scoreboards and track the expected wait
            let mut wait = 0;
            for (level, &node) in path.iter().enumerate() {
                for (prior, &cmd) in PRIORS.iter().enumerate() {
                    let slot = level * PRIORS.len() + prior;
                    let mut cycle = 0;
                    let mut issued = Vec::new();
                    for gap in &history[slot] {
                        cycle += gap;
                        tree.get_mut(node).scoreboard.record(cmd, cycle);
                        issued.insert(0, cycle);
                    }
                    if let Some(cycle) = siblings[slot] {
                        tree.get_mut(node).scoreboard.record_sibling(cmd, cycle);
                    }
                    let relevant = entries
                        .iter()
                        .filter(|entry| entry.0 == level && entry.1 == prior);
                    for &(_, _, dist, val, sibling) in relevant {
                        let past = if sibling {
                            siblings[slot]
                        } else {
                            issued.get(dist - 1).copied()
                        };
                        if let Some(past) = past {
                            wait = wait.max((past + val).saturating_sub(now));
                        }
                    }
                }
            }

            let check = engine.check(&tree, bank, Command::ACT, &addr, now);
            if wait == 0 {
                prop_assert_eq!(check, Check::Ready);
            } else {
                prop_assert_eq!(check, Check::NotYet(wait));
            }
        }
    }
}
