//! Tables shared by the wide, stacked standards (WideIO and SMLA).

use super::{
    Class, Clause, Command, Effect, Level, Outcome, PrereqRule, RowPredicate, SpeedEntry, State,
    Tables, TimingEntry,
};
use strum::{EnumCount, IntoEnumIterator};

use Command::{ACT, PD, PDX, PRA, PRE, RD, RDA, REF, SREF, SREFX, WR, WRA};

const READS: &[Command] = &[RD, RDA];
const WRITES: &[Command] = &[WR, WRA];
const ACCESSES: &[Command] = &[RD, WR, RDA, WRA];

fn scope(cmd: Command) -> Level {
    match cmd {
        ACT => Level::Row,
        PRE => Level::Bank,
        RD | WR | RDA | WRA => Level::Column,
        PRA | REF | PD | PDX | SREF | SREFX => Level::Rank,
    }
}

fn class(cmd: Command) -> Class {
    Class {
        opening: cmd == ACT,
        accessing: ACCESSES.contains(&cmd),
        closing: matches!(cmd, RDA | WRA | PRE | PRA),
        refreshing: cmd == REF,
    }
}

/// Leave power-down or self-refresh before touching the rank.
fn power_gate() -> Clause {
    Clause::ByState(vec![
        (State::PowerUp, Outcome::Pass),
        (State::ActPowerDown, Outcome::Issue(PDX)),
        (State::PrePowerDown, Outcome::Issue(PDX)),
        (State::SelfRefresh, Outcome::Issue(SREFX)),
    ])
}

fn rank_prereq(cmd: Command) -> PrereqRule {
    let pd_states = |outcome| {
        vec![
            (State::ActPowerDown, outcome),
            (State::PrePowerDown, outcome),
        ]
    };
    match cmd {
        ACT | PRE | PRA | RD | WR | RDA | WRA => PrereqRule(vec![power_gate()]),
        REF => PrereqRule(vec![power_gate(), Clause::ChildrenClosed { otherwise: PRA }]),
        PD => {
            let mut states = vec![(State::PowerUp, Outcome::Ready)];
            states.extend(pd_states(Outcome::Ready));
            states.push((State::SelfRefresh, Outcome::Issue(SREFX)));
            PrereqRule(vec![Clause::ByState(states)])
        }
        PDX => PrereqRule(vec![Clause::ByState(pd_states(Outcome::Ready))]),
        SREF => {
            let mut states = vec![(State::PowerUp, Outcome::Pass)];
            states.extend(pd_states(Outcome::Issue(PDX)));
            states.push((State::SelfRefresh, Outcome::Ready));
            PrereqRule(vec![
                Clause::ByState(states),
                Clause::ChildrenClosed { otherwise: PRA },
            ])
        }
        SREFX => PrereqRule(vec![Clause::ByState(vec![(
            State::SelfRefresh,
            Outcome::Ready,
        )])]),
    }
}

fn bank_prereq(cmd: Command) -> PrereqRule {
    if ACCESSES.contains(&cmd) {
        PrereqRule(vec![Clause::RowBuffer {
            open: ACT,
            close: PRE,
        }])
    } else {
        PrereqRule::pass()
    }
}

fn rank_effect(cmd: Command) -> Effect {
    match cmd {
        PRA => Effect::CloseChildren,
        PD => Effect::PowerDown,
        PDX | SREFX => Effect::SetState(State::PowerUp),
        SREF => Effect::SetState(State::SelfRefresh),
        _ => Effect::None,
    }
}

fn bank_effect(cmd: Command) -> Effect {
    match cmd {
        ACT => Effect::OpenRow,
        PRE | RDA | WRA => Effect::CloseRow,
        _ => Effect::None,
    }
}

struct TimingBuilder<'a> {
    tables: &'a mut Tables,
    level: Level,
}

impl TimingBuilder<'_> {
    fn entry(&mut self, from: &[Command], to: &[Command], dist: usize, val: u64, sibling: bool) {
        for &prior in from {
            for &cmd in to {
                self.tables.timing.push(
                    self.level,
                    prior,
                    TimingEntry {
                        cmd,
                        dist,
                        val,
                        sibling,
                    },
                );
            }
        }
    }

    fn add(&mut self, from: &[Command], to: &[Command], val: u64) {
        self.entry(from, to, 1, val, false);
    }

    fn sibling(&mut self, from: &[Command], to: &[Command], val: u64) {
        self.entry(from, to, 1, val, true);
    }
}

fn populate_timing(tables: &mut Tables, s: &SpeedEntry) {
    // every reachable pair is declared, most without constraints
    let reachable: Vec<_> = tables.reachable().collect();
    for (level, cmd) in reachable {
        tables.timing.set(level, cmd, Vec::new());
    }

    let mut channel = TimingBuilder {
        tables: &mut *tables,
        level: Level::Channel,
    };
    // data bus occupancy
    channel.add(READS, READS, s.n_bl);
    channel.add(WRITES, WRITES, s.n_bl);

    let mut rank = TimingBuilder {
        tables: &mut *tables,
        level: Level::Rank,
    };
    // column to column
    rank.add(READS, READS, s.n_ccd);
    rank.add(WRITES, WRITES, s.n_ccd);
    rank.add(READS, WRITES, s.n_rtw);
    rank.add(WRITES, READS, s.n_cwl + s.n_bl + s.n_wtr);

    // rank to rank
    rank.sibling(READS, READS, s.n_bl + s.n_dqsck);
    rank.sibling(
        READS,
        WRITES,
        (s.n_cl + s.n_bl + s.n_dqsck + 1).saturating_sub(s.n_cwl),
    );
    rank.sibling(
        WRITES,
        READS,
        (s.n_cwl + s.n_bl + s.n_dqsck).saturating_sub(s.n_cl),
    );

    // column to power-down
    rank.add(READS, &[PD], s.n_cl + s.n_bl + 1);
    rank.add(&[WR], &[PD], s.n_cwl + s.n_bl + s.n_wr);
    rank.add(&[WRA], &[PD], s.n_cwl + s.n_bl + s.n_wr + 1);
    rank.add(&[PDX], ACCESSES, s.n_xp);

    // activation window
    rank.add(&[ACT], &[ACT], s.n_rrd);
    rank.entry(&[ACT], &[ACT], 4, s.n_taw, false);

    // precharge all
    rank.add(&[ACT], &[PRA], s.n_ras);
    rank.add(READS, &[PRA], s.n_rtp);
    rank.add(WRITES, &[PRA], s.n_cwl + s.n_bl + s.n_wr);
    rank.add(&[PRA], &[ACT], s.n_rp);

    // refresh
    rank.add(&[PRE, PRA], &[REF], s.n_rp);
    rank.add(&[REF], &[ACT], s.n_rfc);
    rank.add(&[REF], &[REF], s.n_rfc);
    rank.add(&[REF], &[PD], 1);
    rank.add(&[PDX], &[REF], s.n_xp);
    rank.add(&[SREFX], &[REF], s.n_xsr);

    // power-down
    rank.add(&[ACT], &[PD], 1);
    rank.add(&[PDX], &[ACT, PRE, PRA], s.n_xp);
    rank.add(&[PD], &[PDX], s.n_cke);
    rank.add(&[PDX], &[PD], s.n_xp);
    rank.add(&[PDX], &[SREF], s.n_xp);

    // self-refresh
    rank.add(&[PRE, PRA], &[SREF], s.n_rp);
    rank.add(&[SREFX], &[ACT], s.n_xsr);
    rank.add(&[SREFX], &[PD], s.n_xsr);
    rank.add(&[SREF], &[SREFX], s.n_ckesr);
    rank.add(&[SREFX], &[SREF], s.n_xsr);

    let mut bank = TimingBuilder {
        tables: &mut *tables,
        level: Level::Bank,
    };
    bank.add(&[ACT], ACCESSES, s.n_rcd);
    bank.add(&[RD], &[PRE], s.n_rtp);
    bank.add(&[WR], &[PRE], s.n_cwl + s.n_bl + s.n_wr);
    bank.add(&[RDA], &[ACT], s.n_rtp + s.n_rp);
    bank.add(&[WRA], &[ACT], s.n_cwl + s.n_bl + s.n_wr + s.n_rp);
    bank.add(&[ACT], &[ACT], s.n_rc);
    bank.add(&[ACT], &[PRE], s.n_ras);
    bank.add(&[PRE], &[ACT], s.n_rp);
}

/// Tables of the WideIO family, parameterized by a speed bin.
#[must_use]
pub fn wide_io_family(speed: &SpeedEntry) -> Tables {
    let mut scopes = [Level::Channel; Command::COUNT];
    let mut classes = [Class::default(); Command::COUNT];
    for cmd in Command::iter() {
        scopes[cmd as usize] = scope(cmd);
        classes[cmd as usize] = class(cmd);
    }
    let start = [
        State::NotApplicable,
        State::PowerUp,
        State::Closed,
        State::Closed,
        State::NotApplicable,
    ];
    let translate = [RD, WR, REF, PD, SREF];
    let mut tables = Tables::new(scopes, classes, start, translate);

    for cmd in Command::iter() {
        tables.prereq.set(Level::Channel, cmd, PrereqRule::pass());
        tables.effect.set(Level::Channel, cmd, Effect::None);

        tables.prereq.set(Level::Rank, cmd, rank_prereq(cmd));
        tables.effect.set(Level::Rank, cmd, rank_effect(cmd));

        if scope(cmd).issue_level() == Level::Bank {
            tables.prereq.set(Level::Bank, cmd, bank_prereq(cmd));
            tables.effect.set(Level::Bank, cmd, bank_effect(cmd));
        }
    }

    for &cmd in ACCESSES {
        tables
            .rowhit
            .set(Level::Bank, cmd, RowPredicate::TargetRowOpen);
        tables.rowopen.set(Level::Bank, cmd, RowPredicate::AnyRowOpen);
    }

    populate_timing(&mut tables, speed);
    tables
}
