//! Per-channel command scheduler.

use crate::{
    config::Config,
    engine::{ConstraintEngine, Resolution},
    fifo::Fifo,
    node::{NodeId, Tree},
    refresh::Refresh,
    request::{AddrVec, Kind, Request},
    scheduler::Candidate,
    spec::{Command, Level, StandardSpec, State},
};
use console::style;
use std::sync::Arc;
use strum::EnumCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Queue {
    /// Requests whose row has been activated
    Activated,
    Read,
    Write,
    Other,
}

/// Outcome of the row buffer for the first command of an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowBufferOutcome {
    Hit,
    Miss,
    Conflict,
}

pub struct Controller {
    pub channel_id: usize,
    spec: Arc<StandardSpec>,
    config: Arc<Config>,
    engine: ConstraintEngine,
    tree: Tree,

    readq: Fifo<Request>,
    writeq: Fifo<Request>,
    otherq: Fifo<Request>,
    actq: Fifo<Request>,
    /// Reads waiting for their data
    pending: Vec<Request>,

    refresh: Refresh,
    /// Consecutive cycles without queued traffic per rank
    idle: Vec<u64>,
    write_mode: bool,

    stats: stats::Stats,
    finished: bool,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("channel_id", &self.channel_id)
            .field("readq", &self.readq.len())
            .field("writeq", &self.writeq.len())
            .field("otherq", &self.otherq.len())
            .field("actq", &self.actq.len())
            .field("pending", &self.pending.len())
            .field("write_mode", &self.write_mode)
            .finish_non_exhaustive()
    }
}

impl Controller {
    #[must_use]
    pub fn new(channel_id: usize, spec: Arc<StandardSpec>, config: Arc<Config>) -> Self {
        let num_ranks = spec.count(Level::Rank);
        let tree = Tree::new(&spec, channel_id);
        let refresh = Refresh::new(&spec, num_ranks);
        let stats = stats::Stats::new(spec.count(Level::Channel), num_ranks, &Command::names());
        Self {
            channel_id,
            engine: ConstraintEngine::new(Arc::clone(&spec)),
            tree,
            readq: Fifo::new(Some(config.read_queue_size)),
            writeq: Fifo::new(Some(config.write_queue_size)),
            otherq: Fifo::new(Some(config.other_queue_size)),
            // only holds requests moved from the bounded queues
            actq: Fifo::new(None),
            pending: Vec::new(),
            refresh,
            idle: vec![0; num_ranks],
            write_mode: false,
            stats,
            finished: false,
            spec,
            config,
        }
    }

    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    #[must_use]
    pub fn stats(&self) -> &stats::Stats {
        &self.stats
    }

    #[must_use]
    pub fn rank_state(&self, rank: usize) -> State {
        self.tree.get(self.tree.ranks()[rank]).state
    }

    #[must_use]
    pub fn queue(&self, queue: Queue) -> &Fifo<Request> {
        match queue {
            Queue::Activated => &self.actq,
            Queue::Read => &self.readq,
            Queue::Write => &self.writeq,
            Queue::Other => &self.otherq,
        }
    }

    fn queue_mut(&mut self, queue: Queue) -> &mut Fifo<Request> {
        match queue {
            Queue::Activated => &mut self.actq,
            Queue::Read => &mut self.readq,
            Queue::Write => &mut self.writeq,
            Queue::Other => &mut self.otherq,
        }
    }

    /// Queued and in-flight requests.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.readq.len() + self.writeq.len() + self.otherq.len() + self.actq.len() + self.pending.len()
    }

    /// Accept a request, or hand it back if its queue is full.
    ///
    /// # Errors
    /// The request is returned unchanged when the queue is at capacity.
    pub fn send(&mut self, mut req: Request, now: u64) -> Result<(), Request> {
        let queue = match req.kind {
            Kind::Read => Queue::Read,
            Kind::Write => Queue::Write,
            Kind::Refresh | Kind::PowerDown | Kind::SelfRefresh => Queue::Other,
        };
        if self.queue(queue).full() {
            return Err(req);
        }

        req.arrive = now;
        req.depart = None;
        req.is_first_command = true;
        self.stats.sim.requests += 1;
        match req.kind {
            Kind::Read => self.stats.dram.incoming_reads += 1,
            Kind::Write => self.stats.dram.incoming_writes += 1,
            _ => self.stats.dram.incoming_other += 1,
        }

        // serve reads from queued writes to the same address
        if req.kind == Kind::Read && self.writeq.iter().any(|write| write.addr == req.addr) {
            log::debug!("channel {}: forwarding {} from write queue", self.channel_id, req);
            req.depart = Some(now + 1);
            self.stats.dram.forwarded_reads += 1;
            self.pending.push(req);
            return Ok(());
        }

        log::trace!("channel {}: accepted {} into {} queue", self.channel_id, req, queue);
        self.queue_mut(queue).enqueue(req)
    }

    fn complete(&mut self, req: &Request) {
        self.stats.sim.completed += 1;
        if req.kind == Kind::Read {
            if let Some(latency) = req.latency() {
                self.stats.dram.record_read_latency(latency);
            }
        }
        log::trace!(
            "channel {}: completed {} (latency {:?})",
            self.channel_id,
            req,
            req.latency()
        );
        req.complete();
    }

    fn complete_pending(&mut self, now: u64) {
        if self.pending.is_empty() {
            return;
        }
        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|req| req.depart.is_some_and(|depart| depart <= now));
        self.pending = pending;
        for req in &done {
            self.complete(req);
        }
    }

    fn update_idle(&mut self) {
        let mut busy = vec![false; self.idle.len()];
        for queue in [&self.readq, &self.writeq, &self.otherq, &self.actq] {
            for req in queue.iter() {
                busy[req.rank()] = true;
            }
        }
        for (idle, busy) in self.idle.iter_mut().zip(busy) {
            *idle = if busy { 0 } else { *idle + 1 };
        }
    }

    fn update_write_mode(&mut self) {
        let capacity = self.writeq.capacity().unwrap_or(0) as f64;
        let writes = self.writeq.len() as f64;
        if self.write_mode {
            if writes < self.config.write_low_watermark * capacity && !self.readq.is_empty() {
                self.write_mode = false;
            }
        } else if writes > self.config.write_high_watermark * capacity || self.readq.is_empty() {
            self.write_mode = true;
        }
    }

    fn record_cycle_stats(&mut self) {
        let dram = &mut self.stats.dram;
        dram.read_queue.length_sum += self.readq.len() as u64;
        dram.write_queue.length_sum += self.writeq.len() as u64;
        dram.other_queue.length_sum += self.otherq.len() as u64;
        let low_power = self.tree.ranks().iter().any(|rank| {
            matches!(
                self.tree.get(*rank).state,
                State::ActPowerDown | State::PrePowerDown | State::SelfRefresh
            )
        });
        if low_power {
            dram.low_power_cycles += 1;
        }
    }

    /// Issue a command and account for it.
    fn issue_cmd(&mut self, cmd: Command, node: NodeId, addr: &AddrVec, now: u64) {
        self.engine.issue(&mut self.tree, node, cmd, addr, now);
        let rank = addr[Level::Rank as usize];
        self.stats
            .dram
            .record_command(self.channel_id, rank, cmd as usize);
        self.stats.dram.busy_cycles += 1;
        if self.spec.is_refreshing(cmd) {
            self.refresh.refreshed(rank, now);
        }
        log::debug!(
            "{}: channel {} rank {} issued {}",
            now,
            self.channel_id,
            rank,
            style(cmd).yellow()
        );
    }

    fn rank_addr(&self, rank: usize) -> AddrVec {
        let mut addr = [0; Level::COUNT];
        addr[Level::Channel as usize] = self.channel_id;
        addr[Level::Rank as usize] = rank;
        addr
    }

    /// Try to issue the next command of a forced refresh.
    fn schedule_refresh(&mut self, due: &[usize], now: u64) -> bool {
        for &rank in due {
            let addr = self.rank_addr(rank);
            let res = self.engine.resolve(&self.tree, &addr, Command::REF, now);
            if res.is_ready() {
                self.issue_cmd(res.cmd, res.node, &addr, now);
                return true;
            }
        }
        false
    }

    fn candidates(&self, queue: Queue) -> crate::scheduler::Candidates {
        let policy = self.config.scheduler;
        let candidates = self.queue(queue).iter().enumerate().map(|(idx, req)| {
            let cmd = self.spec.translate(req.kind);
            let row_hit = policy.needs_row_hits()
                && self.spec.is_accessing(cmd)
                && self.engine.row_hit(&self.tree, &req.addr_vec, cmd);
            Candidate { idx, row_hit }
        });
        policy.order(candidates)
    }

    fn schedule_traffic(&mut self, now: u64) -> bool {
        let primary = if !self.otherq.is_empty() {
            Queue::Other
        } else if self.write_mode {
            Queue::Write
        } else {
            Queue::Read
        };
        for queue in [Queue::Activated, primary] {
            for idx in self.candidates(queue) {
                let Some(req) = self.queue(queue).get(idx) else {
                    continue;
                };
                let target = self.spec.translate(req.kind);
                let res = self.engine.resolve(&self.tree, &req.addr_vec, target, now);
                if res.is_ready() {
                    self.issue_request(queue, idx, target, res, now);
                    return true;
                }
            }
        }
        false
    }

    #[must_use]
    pub fn row_buffer_outcome(&self, addr: &AddrVec, cmd: Command) -> RowBufferOutcome {
        if self.engine.row_hit(&self.tree, addr, cmd) {
            RowBufferOutcome::Hit
        } else if self.engine.row_open(&self.tree, addr, cmd) {
            RowBufferOutcome::Conflict
        } else {
            RowBufferOutcome::Miss
        }
    }

    fn issue_request(&mut self, queue: Queue, idx: usize, target: Command, res: Resolution, now: u64) {
        let Some(req) = self.queue_mut(queue).get_mut(idx) else {
            return;
        };
        let first = std::mem::replace(&mut req.is_first_command, false);
        let (kind, addr) = (req.kind, req.addr_vec);

        if first && self.spec.is_accessing(target) {
            let outcome = self.row_buffer_outcome(&addr, target);
            let row_buffer = match kind {
                Kind::Read => &mut self.stats.dram.read_row_buffer,
                _ => &mut self.stats.dram.write_row_buffer,
            };
            match outcome {
                RowBufferOutcome::Hit => row_buffer.hits += 1,
                RowBufferOutcome::Miss => row_buffer.misses += 1,
                RowBufferOutcome::Conflict => row_buffer.conflicts += 1,
            }
        }

        self.issue_cmd(res.cmd, res.node, &addr, now);

        if res.cmd != target {
            if self.spec.is_opening(res.cmd) && queue != Queue::Activated {
                if let Some(req) = self.queue_mut(queue).remove(idx) {
                    let promoted = self.actq.enqueue(req);
                    debug_assert!(promoted.is_ok());
                }
            }
            return;
        }

        let Some(mut req) = self.queue_mut(queue).remove(idx) else {
            return;
        };
        let tx_bytes = self.spec.transaction_bytes();
        match req.kind {
            Kind::Read => {
                self.stats.dram.read_transaction_bytes += tx_bytes;
                req.depart = Some(now + self.spec.read_latency);
                self.pending.push(req);
            }
            kind => {
                if kind == Kind::Write {
                    self.stats.dram.write_transaction_bytes += tx_bytes;
                }
                req.depart = Some(now);
                self.complete(&req);
            }
        }
    }

    /// Put idle ranks into power-down or self-refresh.
    fn schedule_power(&mut self, now: u64) -> bool {
        if self.config.power_down_threshold.is_none() && self.config.self_refresh_threshold.is_none() {
            return false;
        }
        for rank in 0..self.idle.len() {
            let idle = self.idle[rank];
            if idle == 0 {
                continue;
            }
            let state = self.rank_state(rank);
            let target = if self
                .config
                .self_refresh_threshold
                .is_some_and(|threshold| idle >= threshold)
                && state != State::SelfRefresh
            {
                Command::SREF
            } else if self
                .config
                .power_down_threshold
                .is_some_and(|threshold| idle >= threshold)
                && state == State::PowerUp
            {
                Command::PD
            } else {
                continue;
            };
            let addr = self.rank_addr(rank);
            let res = self.engine.resolve(&self.tree, &addr, target, now);
            if res.is_ready() {
                self.issue_cmd(res.cmd, res.node, &addr, now);
                return true;
            }
        }
        false
    }

    /// Advance the channel by one cycle, issuing at most one command.
    pub fn tick(&mut self, now: u64) {
        self.record_cycle_stats();
        self.complete_pending(now);
        self.update_idle();

        // self-refreshing ranks accrue no refresh debt
        for rank in 0..self.idle.len() {
            if self.rank_state(rank) == State::SelfRefresh {
                self.refresh.hold(rank, now);
            }
        }

        let due: Vec<usize> = self.refresh.due_ranks(now).collect();
        if !due.is_empty() {
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("{}: channel {} refresh due for ranks {:?}", now, self.channel_id, due);
            }
            self.schedule_refresh(&due, now);
            return;
        }

        self.update_write_mode();
        if self.schedule_traffic(now) {
            return;
        }
        self.schedule_power(now);
    }

    /// Snapshot end of run statistics.
    pub fn finish(&mut self, now: u64) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stats.sim.cycles = now;
        log::debug!(
            "channel {} finished after {} cycles with {} pending requests",
            self.channel_id,
            now,
            self.pending_requests()
        );
    }
}
