//! Memory standard specification.
//!
//! A [`StandardSpec`] is the immutable description of a DRAM standard: which
//! level every command is scoped at, what must be issued before a command,
//! the minimum gaps between commands and how issuing a command changes the
//! state of the device hierarchy.
//!
//! All per-(level, command) behaviour is plain data held in [`Table`]s and
//! interpreted by the [`crate::engine::ConstraintEngine`]. Adding a standard
//! means implementing [`Definition`], never touching the scheduler.

pub mod smla;
pub mod tables;
pub mod wide_io;

use crate::request;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{EnumCount, IntoEnumIterator};

/// Level of the DRAM hierarchy.
#[derive(
    strum::EnumIter,
    strum::EnumCount,
    strum::FromRepr,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Level {
    Channel,
    Rank,
    Bank,
    Row,
    Column,
}

impl Level {
    /// Deepest level that is materialized as a node.
    ///
    /// Rows and columns are coordinates inside a bank, which owns the row buffer.
    pub const LEAF: Level = Level::Bank;

    /// Level of the node on which a command scoped at `self` is issued.
    #[must_use]
    pub fn issue_level(self) -> Level {
        self.min(Self::LEAF)
    }

    #[must_use]
    pub fn parent(self) -> Option<Level> {
        Self::from_repr((self as usize).checked_sub(1)?)
    }

    #[must_use]
    pub fn child(self) -> Option<Level> {
        Self::from_repr(self as usize + 1)
    }

    /// All levels from the channel down to `self` (inclusive).
    pub fn path(self) -> impl Iterator<Item = Level> {
        Self::iter().take_while(move |level| *level <= self)
    }
}

/// DRAM command.
#[derive(
    strum::EnumIter,
    strum::EnumCount,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Command {
    /// Activate a row
    ACT,
    /// Precharge a bank
    PRE,
    /// Precharge all banks of a rank
    PRA,
    RD,
    WR,
    /// Read with auto-precharge
    RDA,
    /// Write with auto-precharge
    WRA,
    REF,
    /// Power-down entry
    PD,
    /// Power-down exit
    PDX,
    /// Self-refresh entry
    SREF,
    /// Self-refresh exit
    SREFX,
}

impl Command {
    /// Command names in discriminant order.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        Self::iter().map(Into::into).collect()
    }
}

/// State of a node.
#[derive(
    strum::EnumIter,
    strum::EnumCount,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum State {
    Opened,
    Closed,
    PowerUp,
    ActPowerDown,
    PrePowerDown,
    SelfRefresh,
    NotApplicable,
}

/// Classification of a command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Class {
    pub opening: bool,
    pub accessing: bool,
    pub closing: bool,
    pub refreshing: bool,
}

/// Outcome of a prerequisite clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Nothing to satisfy here, continue with the next clause or level.
    Pass,
    /// The requested command can be issued as is.
    Ready,
    /// The given command must be issued first.
    Issue(Command),
}

/// A single prerequisite clause, interpreted against a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// No requirement at this level.
    Pass,
    /// Outcome depends on the node state.
    ///
    /// A state without a mapping is not legal for the command.
    ByState(Vec<(State, Outcome)>),
    /// Bank row buffer: `open` when closed, `Ready` when the target row is
    /// latched and `close` when a different row is latched.
    RowBuffer { open: Command, close: Command },
    /// `Ready` when all children are closed, `otherwise` is issued first.
    ChildrenClosed { otherwise: Command },
}

/// Prerequisite rule for a (level, command) pair.
///
/// Clauses are evaluated in order, the first outcome other than
/// [`Outcome::Pass`] decides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrereqRule(pub Vec<Clause>);

impl PrereqRule {
    #[must_use]
    pub fn pass() -> Self {
        Self(vec![Clause::Pass])
    }

    /// Commands this rule can ask for.
    #[must_use]
    pub fn requested(&self) -> Vec<Command> {
        self.0
            .iter()
            .flat_map(|clause| match clause {
                Clause::Pass => vec![],
                Clause::ByState(states) => states
                    .iter()
                    .filter_map(|(_, outcome)| match outcome {
                        Outcome::Issue(cmd) => Some(*cmd),
                        Outcome::Pass | Outcome::Ready => None,
                    })
                    .collect(),
                Clause::RowBuffer { open, close } => vec![*open, *close],
                Clause::ChildrenClosed { otherwise } => vec![*otherwise],
            })
            .collect()
    }
}

/// Row buffer predicate of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowPredicate {
    /// The bank is open and the target row is latched.
    TargetRowOpen,
    /// The bank is open on any row.
    AnyRowOpen,
}

/// State change applied to a node when a command is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    None,
    /// Open the bank and latch the target row.
    OpenRow,
    /// Close the bank.
    CloseRow,
    /// Close every child bank.
    CloseChildren,
    SetState(State),
    /// Enter active or precharge power-down depending on open children.
    PowerDown,
}

/// After the keyed command, `cmd` must wait `val` cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimingEntry {
    pub cmd: Command,
    /// Issue history depth of the keyed command (1 = most recent issue).
    pub dist: usize,
    pub val: u64,
    /// Applies to the siblings of the issuing node instead of the node itself.
    pub sibling: bool,
}

/// Inverted [`TimingEntry`]: the candidate command must be issued at least
/// `gap` cycles after the `dist`-th most recent `prior`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub prior: Command,
    pub dist: usize,
    pub gap: u64,
    pub sibling: bool,
}

/// Dense lookup over (level, command).
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    name: &'static str,
    slots: Box<[Option<T>]>,
}

impl<T> Table<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: (0..Level::COUNT * Command::COUNT).map(|_| None).collect(),
        }
    }

    fn index(level: Level, cmd: Command) -> usize {
        level as usize * Command::COUNT + cmd as usize
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn get(&self, level: Level, cmd: Command) -> Option<&T> {
        self.slots[Self::index(level, cmd)].as_ref()
    }

    /// Entry for a pair that must exist.
    ///
    /// # Panics
    /// If the entry is missing, which is a defect of the standard definition.
    #[must_use]
    pub fn expect(&self, level: Level, cmd: Command) -> &T {
        match self.get(level, cmd) {
            Some(entry) => entry,
            None => panic!("{} table has no entry for {cmd} at {level}", self.name),
        }
    }

    pub fn set(&mut self, level: Level, cmd: Command, value: T) {
        self.slots[Self::index(level, cmd)] = Some(value);
    }

    pub fn clear(&mut self, level: Level, cmd: Command) {
        self.slots[Self::index(level, cmd)] = None;
    }

    pub fn get_or_insert_with(&mut self, level: Level, cmd: Command, f: impl FnOnce() -> T) -> &mut T {
        self.slots[Self::index(level, cmd)].get_or_insert_with(f)
    }

    /// All defined entries.
    pub fn iter(&self) -> impl Iterator<Item = (Level, Command, &T)> {
        Level::iter()
            .flat_map(|level| Command::iter().map(move |cmd| (level, cmd)))
            .filter_map(|(level, cmd)| Some((level, cmd, self.get(level, cmd)?)))
    }
}

impl Table<Vec<TimingEntry>> {
    /// Declare a timing constraint: after `cmd` at `level`, `other` waits `val` cycles.
    pub fn push(&mut self, level: Level, cmd: Command, entry: TimingEntry) {
        self.get_or_insert_with(level, cmd, Vec::new).push(entry);
    }
}

/// Device organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgEntry {
    /// Density in Mb
    pub size: u64,
    /// Data width
    pub dq: u64,
    /// Number of instances per level
    pub count: [usize; Level::COUNT],
}

/// Speed bin. All `n_*` values are in memory clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedEntry {
    pub rate: u64,
    pub freq: f64,
    pub tck: f64,
    pub n_bl: u64,
    pub n_ccd: u64,
    pub n_dqsck: u64,
    pub n_cl: u64,
    pub n_rcd: u64,
    pub n_rp: u64,
    pub n_cwl: u64,
    pub n_ras: u64,
    pub n_rc: u64,
    pub n_rtp: u64,
    pub n_rtw: u64,
    pub n_wtr: u64,
    pub n_wr: u64,
    pub n_rrd: u64,
    pub n_taw: u64,
    pub n_rfc: u64,
    pub n_refi: u64,
    pub n_cke: u64,
    pub n_xp: u64,
    pub n_ckesr: u64,
    pub n_xsr: u64,
}

impl SpeedEntry {
    /// Upper bound on the cycles needed to get a rank from any non
    /// self-refresh state to an issuable refresh.
    ///
    /// Every rank chain has at most [`crate::engine::MAX_PREREQ_DEPTH`]
    /// commands competing for the shared command bus.
    #[must_use]
    pub fn refresh_lead(&self, num_ranks: usize) -> u64 {
        let recovery = self
            .n_ras
            .max(self.n_cwl + self.n_bl + self.n_wr)
            .max(self.n_rtp);
        self.n_cke
            + self.n_xp
            + recovery
            + self.n_rp
            + (crate::engine::MAX_PREREQ_DEPTH * num_ranks) as u64
    }

    /// Refresh lead for `num_ranks`, which must leave room before the
    /// refresh interval expires.
    ///
    /// # Errors
    /// If the lead reaches the refresh interval of a refreshing standard.
    pub fn checked_refresh_lead(&self, num_ranks: usize) -> Result<u64, Error> {
        let lead = self.refresh_lead(num_ranks);
        if self.n_refi > 0 && lead >= self.n_refi {
            return Err(Error::RefreshLead {
                ranks: num_ranks,
                lead,
                interval: self.n_refi,
            });
        }
        Ok(lead)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown standard {0:?}")]
    UnknownStandard(String),
    #[error("unknown organization {org:?} for standard {standard}")]
    UnknownOrganization { standard: Standard, org: String },
    #[error("unknown speed {speed:?} for standard {standard}")]
    UnknownSpeed { standard: Standard, speed: String },
    #[error("{table} table has no entry for {command} at {level}")]
    MissingEntry {
        table: &'static str,
        level: Level,
        command: Command,
    },
    #[error("{table} entry for {command} at {level} is not applicable: {reason}")]
    NotApplicable {
        table: &'static str,
        level: Level,
        command: Command,
        reason: &'static str,
    },
    #[error("timing entry {entry:?} of {command} at {level} is invalid: {reason}")]
    InvalidTiming {
        level: Level,
        command: Command,
        entry: TimingEntry,
        reason: &'static str,
    },
    #[error("prerequisite cycle {0:?}")]
    PrerequisiteCycle(Vec<Command>),
    #[error("invalid {level} count {count}")]
    InvalidCount { level: Level, count: usize },
    #[error("refresh lead of {lead} cycles for {ranks} ranks exceeds the refresh interval of {interval} cycles")]
    RefreshLead {
        ranks: usize,
        lead: u64,
        interval: u64,
    },
}

/// A memory standard definition.
pub trait Definition {
    const STANDARD: Standard;
    /// Prefetch width in bursts
    const PREFETCH_SIZE: u64;
    /// Channel data width in bits
    const CHANNEL_WIDTH: u64;

    type Org: std::str::FromStr + Copy;
    type Speed: std::str::FromStr + Copy;

    fn org_entry(org: Self::Org) -> OrgEntry;

    /// Speed bin including the density dependent refresh parameters.
    fn speed_entry(speed: Self::Speed, org: Self::Org) -> SpeedEntry;

    fn tables(speed: &SpeedEntry) -> Tables;
}

/// Supported standards.
#[derive(
    strum::EnumString,
    strum::EnumIter,
    strum::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum Standard {
    WideIO,
    SMLA_CIO,
}

/// The raw, unvalidated tables of a standard.
#[derive(Debug, Clone)]
pub struct Tables {
    pub scope: [Level; Command::COUNT],
    pub class: [Class; Command::COUNT],
    pub start: [State; Level::COUNT],
    pub translate: [Command; request::Kind::COUNT],
    pub prereq: Table<PrereqRule>,
    pub rowhit: Table<RowPredicate>,
    pub rowopen: Table<RowPredicate>,
    pub timing: Table<Vec<TimingEntry>>,
    pub effect: Table<Effect>,
}

impl Tables {
    #[must_use]
    pub fn new(
        scope: [Level; Command::COUNT],
        class: [Class; Command::COUNT],
        start: [State; Level::COUNT],
        translate: [Command; request::Kind::COUNT],
    ) -> Self {
        Self {
            scope,
            class,
            start,
            translate,
            prereq: Table::new("prereq"),
            rowhit: Table::new("rowhit"),
            rowopen: Table::new("rowopen"),
            timing: Table::new("timing"),
            effect: Table::new("effect"),
        }
    }

    /// (level, command) pairs that are visited when `cmd` is checked or issued.
    pub fn reachable(&self) -> impl Iterator<Item = (Level, Command)> + '_ {
        Command::iter().flat_map(move |cmd| {
            self.scope[cmd as usize]
                .issue_level()
                .path()
                .map(move |level| (level, cmd))
        })
    }

    fn issue_level(&self, cmd: Command) -> Level {
        self.scope[cmd as usize].issue_level()
    }

    fn validate(&self) -> Result<(), Error> {
        let reachable: HashSet<(Level, Command)> = self.reachable().collect();

        for &(level, command) in &reachable {
            let missing = |table: &'static str| Error::MissingEntry {
                table,
                level,
                command,
            };
            self.prereq
                .get(level, command)
                .ok_or_else(|| missing(self.prereq.name()))?;
            self.timing
                .get(level, command)
                .ok_or_else(|| missing(self.timing.name()))?;
            self.effect
                .get(level, command)
                .ok_or_else(|| missing(self.effect.name()))?;
        }

        for table in [&self.rowhit, &self.rowopen] {
            for (level, command, _) in table.iter() {
                if level != Level::Bank {
                    return Err(Error::NotApplicable {
                        table: table.name(),
                        level,
                        command,
                        reason: "row predicates are defined on banks only",
                    });
                }
                if !self.class[command as usize].accessing {
                    return Err(Error::NotApplicable {
                        table: table.name(),
                        level,
                        command,
                        reason: "row predicates are defined for accessing commands only",
                    });
                }
            }
            for command in Command::iter().filter(|cmd| self.class[*cmd as usize].accessing) {
                if table.get(Level::Bank, command).is_none() {
                    return Err(Error::MissingEntry {
                        table: table.name(),
                        level: Level::Bank,
                        command,
                    });
                }
            }
        }

        for (level, command, entries) in self.timing.iter() {
            for entry in entries {
                let invalid = |reason| Error::InvalidTiming {
                    level,
                    command,
                    entry: *entry,
                    reason,
                };
                if entry.dist == 0 {
                    return Err(invalid("history distance must be at least one"));
                }
                if entry.sibling && entry.dist != 1 {
                    return Err(invalid("sibling constraints only relate to the last issue"));
                }
                if level > self.issue_level(command) {
                    return Err(invalid("command is never recorded at this level"));
                }
                if level > self.issue_level(entry.cmd) {
                    return Err(invalid("constrained command is never checked at this level"));
                }
            }
        }

        self.check_prereq_cycles()
    }

    fn check_prereq_cycles(&self) -> Result<(), Error> {
        // edges of the prerequisite graph
        let requested = |cmd: Command| -> Vec<Command> {
            let mut out: Vec<Command> = self
                .issue_level(cmd)
                .path()
                .filter_map(|level| self.prereq.get(level, cmd))
                .flat_map(|rule| rule.requested())
                .filter(|prereq| *prereq != cmd)
                .collect();
            out.sort();
            out.dedup();
            out
        };

        fn visit(
            cmd: Command,
            requested: &dyn Fn(Command) -> Vec<Command>,
            stack: &mut Vec<Command>,
            done: &mut HashSet<Command>,
        ) -> Result<(), Error> {
            if done.contains(&cmd) {
                return Ok(());
            }
            if let Some(pos) = stack.iter().position(|c| *c == cmd) {
                let mut cycle = stack[pos..].to_vec();
                cycle.push(cmd);
                return Err(Error::PrerequisiteCycle(cycle));
            }
            stack.push(cmd);
            for prereq in requested(cmd) {
                visit(prereq, requested, stack, done)?;
            }
            stack.pop();
            done.insert(cmd);
            Ok(())
        }

        let mut done = HashSet::new();
        for cmd in Command::iter() {
            visit(cmd, &requested, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }
}

/// Validated, immutable specification of a memory standard.
#[derive(Debug, Clone)]
pub struct StandardSpec {
    pub standard: Standard,
    pub org_entry: OrgEntry,
    pub speed_entry: SpeedEntry,
    pub prefetch_size: u64,
    pub channel_width: u64,
    /// Column access latency plus burst
    pub read_latency: u64,
    /// Cycles before the refresh interval expires at which a refresh is forced
    pub refresh_lead: u64,
    /// Deepest issue history any timing entry refers to
    pub history_depth: usize,
    tables: Tables,
    constraints: Table<Vec<Constraint>>,
}

impl StandardSpec {
    /// Build the specification of a standard by name.
    ///
    /// # Errors
    /// If the standard, organization or speed is unknown, or the standard
    /// tables are inconsistent.
    pub fn new(standard: &str, org: &str, speed: &str) -> Result<Self, Error> {
        let standard: Standard = standard
            .parse()
            .map_err(|_| Error::UnknownStandard(standard.to_string()))?;
        match standard {
            Standard::WideIO => Self::build::<wide_io::WideIO>(org, speed),
            Standard::SMLA_CIO => Self::build::<smla::SmlaCio>(org, speed),
        }
    }

    /// Build the specification of a [`Definition`].
    ///
    /// # Errors
    /// If the organization or speed is unknown, or the tables are inconsistent.
    pub fn build<D: Definition>(org: &str, speed: &str) -> Result<Self, Error> {
        let org_name = org;
        let org: D::Org = org.parse().map_err(|_| Error::UnknownOrganization {
            standard: D::STANDARD,
            org: org_name.to_string(),
        })?;
        let speed: D::Speed = speed.parse().map_err(|_| Error::UnknownSpeed {
            standard: D::STANDARD,
            speed: speed.to_string(),
        })?;
        let org_entry = D::org_entry(org);
        let speed_entry = D::speed_entry(speed, org);
        let tables = D::tables(&speed_entry);
        Self::from_tables(
            D::STANDARD,
            org_entry,
            speed_entry,
            tables,
            D::PREFETCH_SIZE,
            D::CHANNEL_WIDTH,
        )
    }

    /// Validate raw tables and derive all constants.
    ///
    /// # Errors
    /// If the tables are incomplete or inconsistent.
    pub fn from_tables(
        standard: Standard,
        org_entry: OrgEntry,
        speed_entry: SpeedEntry,
        tables: Tables,
        prefetch_size: u64,
        channel_width: u64,
    ) -> Result<Self, Error> {
        tables.validate()?;

        let mut constraints: Table<Vec<Constraint>> = Table::new("constraints");
        for (level, cmd) in tables.reachable() {
            constraints.set(level, cmd, Vec::new());
        }
        let mut history_depth = 1;
        for (level, prior, entries) in tables.timing.iter() {
            for entry in entries {
                history_depth = history_depth.max(entry.dist);
                constraints
                    .get_or_insert_with(level, entry.cmd, Vec::new)
                    .push(Constraint {
                        prior,
                        dist: entry.dist,
                        gap: entry.val,
                        sibling: entry.sibling,
                    });
            }
        }

        let num_ranks = org_entry.count[Level::Rank as usize];
        let refresh_lead = speed_entry.checked_refresh_lead(num_ranks)?;
        Ok(Self {
            standard,
            org_entry,
            speed_entry,
            prefetch_size,
            channel_width,
            read_latency: speed_entry.n_cl + speed_entry.n_bl,
            refresh_lead,
            history_depth,
            tables,
            constraints,
        })
    }

    /// # Errors
    /// If `channels` is zero.
    pub fn set_channel_number(&mut self, channels: usize) -> Result<(), Error> {
        if channels == 0 {
            return Err(Error::InvalidCount {
                level: Level::Channel,
                count: channels,
            });
        }
        self.org_entry.count[Level::Channel as usize] = channels;
        Ok(())
    }

    /// # Errors
    /// If `ranks` is zero or so large that a forced refresh cannot be
    /// scheduled within the refresh interval.
    pub fn set_rank_number(&mut self, ranks: usize) -> Result<(), Error> {
        if ranks == 0 {
            return Err(Error::InvalidCount {
                level: Level::Rank,
                count: ranks,
            });
        }
        self.refresh_lead = self.speed_entry.checked_refresh_lead(ranks)?;
        self.org_entry.count[Level::Rank as usize] = ranks;
        Ok(())
    }

    #[must_use]
    pub fn count(&self, level: Level) -> usize {
        self.org_entry.count[level as usize]
    }

    /// Bytes moved by one column access.
    #[must_use]
    pub fn transaction_bytes(&self) -> u64 {
        self.prefetch_size * self.channel_width / 8
    }

    /// Memory clock period in ns.
    #[must_use]
    pub fn clk_ns(&self) -> f64 {
        self.speed_entry.tck
    }

    /// Refresh interval in cycles, zero if the standard does not refresh.
    #[must_use]
    pub fn refresh_interval(&self) -> u64 {
        self.speed_entry.n_refi
    }

    #[must_use]
    pub fn scope(&self, cmd: Command) -> Level {
        self.tables.scope[cmd as usize]
    }

    #[must_use]
    pub fn start(&self, level: Level) -> State {
        self.tables.start[level as usize]
    }

    #[must_use]
    pub fn translate(&self, kind: request::Kind) -> Command {
        self.tables.translate[kind as usize]
    }

    #[must_use]
    pub fn is_opening(&self, cmd: Command) -> bool {
        self.tables.class[cmd as usize].opening
    }

    #[must_use]
    pub fn is_accessing(&self, cmd: Command) -> bool {
        self.tables.class[cmd as usize].accessing
    }

    #[must_use]
    pub fn is_closing(&self, cmd: Command) -> bool {
        self.tables.class[cmd as usize].closing
    }

    #[must_use]
    pub fn is_refreshing(&self, cmd: Command) -> bool {
        self.tables.class[cmd as usize].refreshing
    }

    #[must_use]
    pub fn prereq(&self, level: Level, cmd: Command) -> &PrereqRule {
        self.tables.prereq.expect(level, cmd)
    }

    #[must_use]
    pub fn rowhit(&self, level: Level, cmd: Command) -> Option<RowPredicate> {
        self.tables.rowhit.get(level, cmd).copied()
    }

    #[must_use]
    pub fn rowopen(&self, level: Level, cmd: Command) -> Option<RowPredicate> {
        self.tables.rowopen.get(level, cmd).copied()
    }

    #[must_use]
    pub fn timing(&self, level: Level, cmd: Command) -> &[TimingEntry] {
        self.tables.timing.expect(level, cmd)
    }

    /// Constraints a candidate command has to satisfy at `level`.
    #[must_use]
    pub fn constraints(&self, level: Level, cmd: Command) -> &[Constraint] {
        self.constraints.expect(level, cmd)
    }

    #[must_use]
    pub fn effect(&self, level: Level, cmd: Command) -> Effect {
        *self.tables.effect.expect(level, cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Error, Level, StandardSpec};

    #[test]
    fn test_level_path() {
        assert_eq!(
            Level::Row.issue_level().path().collect::<Vec<_>>(),
            vec![Level::Channel, Level::Rank, Level::Bank]
        );
        assert_eq!(Level::Channel.parent(), None);
        assert_eq!(Level::Bank.child(), Some(Level::Row));
        assert_eq!(Level::Column.child(), None);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert_eq!(
            StandardSpec::new("DDR9", "WideIO_1Gb", "WideIO_200").unwrap_err(),
            Error::UnknownStandard("DDR9".to_string())
        );
        assert!(matches!(
            StandardSpec::new("WideIO", "WideIO_3Gb", "WideIO_200"),
            Err(Error::UnknownOrganization { .. })
        ));
        assert!(matches!(
            StandardSpec::new("WideIO", "SMLA_CIO_1Gb", "WideIO_200"),
            Err(Error::UnknownOrganization { .. })
        ));
        assert!(matches!(
            StandardSpec::new("SMLA_CIO", "SMLA_CIO_1Gb", "SMLA_CIO_400"),
            Err(Error::UnknownSpeed { .. })
        ));
    }

    #[test]
    fn test_derived_constants() -> color_eyre::eyre::Result<()> {
        let spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        let s = spec.speed_entry;
        assert_eq!(spec.read_latency, s.n_cl + s.n_bl);
        assert_eq!(spec.transaction_bytes(), 64);
        assert_eq!(spec.history_depth, 4);
        assert!(spec.refresh_lead < spec.refresh_interval());
        assert_eq!(spec.scope(Command::ACT), Level::Row);
        assert_eq!(spec.scope(Command::RD), Level::Column);
        assert!(spec.is_closing(Command::RDA));
        assert!(!spec.is_opening(Command::RD));
        Ok(())
    }

    #[test]
    fn test_refresh_lead_must_fit_the_interval() -> color_eyre::eyre::Result<()> {
        let mut spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        let s = spec.speed_entry;
        // nCKE + nXP + max(nRAS, nCWL + nBL + nWR, nRTP) + nRP
        let base = s.n_cke + s.n_xp + s.n_ras + s.n_rp;
        assert_eq!(base, 18);

        assert_eq!(
            spec.set_rank_number(256),
            Err(Error::RefreshLead {
                ranks: 256,
                lead: base + 4 * 256,
                interval: 780,
            })
        );
        // rejected geometry leaves the spec untouched
        assert_eq!(spec.count(Level::Rank), 1);
        assert_eq!(spec.refresh_lead, base + 4);

        spec.set_rank_number(128)?;
        assert_eq!(spec.count(Level::Rank), 128);
        assert_eq!(spec.refresh_lead, base + 4 * 128);
        assert!(spec.refresh_lead < spec.refresh_interval());
        Ok(())
    }

    #[test]
    fn test_missing_entry_is_a_construction_error() -> color_eyre::eyre::Result<()> {
        let spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        let mut tables = spec.tables.clone();
        tables.effect.clear(Level::Bank, Command::ACT);
        let err = StandardSpec::from_tables(
            spec.standard,
            spec.org_entry,
            spec.speed_entry,
            tables,
            spec.prefetch_size,
            spec.channel_width,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::MissingEntry {
                table: "effect",
                level: Level::Bank,
                command: Command::ACT,
            }
        );
        Ok(())
    }

    #[test]
    fn test_prerequisite_cycle_is_a_construction_error() -> color_eyre::eyre::Result<()> {
        use super::{Clause, PrereqRule};
        let spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        let mut tables = spec.tables.clone();
        // ACT requires PRE, PRE requires ACT
        tables.prereq.set(
            Level::Bank,
            Command::ACT,
            PrereqRule(vec![Clause::ChildrenClosed {
                otherwise: Command::PRE,
            }]),
        );
        tables.prereq.set(
            Level::Bank,
            Command::PRE,
            PrereqRule(vec![Clause::ChildrenClosed {
                otherwise: Command::ACT,
            }]),
        );
        let err = StandardSpec::from_tables(
            spec.standard,
            spec.org_entry,
            spec.speed_entry,
            tables,
            spec.prefetch_size,
            spec.channel_width,
        )
        .unwrap_err();
        assert!(matches!(err, Error::PrerequisiteCycle(_)), "{err}");
        Ok(())
    }

    #[test]
    fn test_unreachable_timing_entry_is_rejected() -> color_eyre::eyre::Result<()> {
        use super::TimingEntry;
        let spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        let mut tables = spec.tables.clone();
        // REF is issued on the rank and never recorded on a bank
        tables.timing.push(
            Level::Bank,
            Command::REF,
            TimingEntry {
                cmd: Command::ACT,
                dist: 1,
                val: 10,
                sibling: false,
            },
        );
        let err = StandardSpec::from_tables(
            spec.standard,
            spec.org_entry,
            spec.speed_entry,
            tables,
            spec.prefetch_size,
            spec.channel_width,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTiming { .. }), "{err}");
        Ok(())
    }
}
