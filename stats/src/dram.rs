use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCountsCsvRow {
    /// Channel ID
    pub channel_id: usize,
    /// Rank ID
    pub rank_id: usize,
    /// Command name
    pub command: String,
    /// Number of issued commands
    pub num_commands: u64,
}

/// Row buffer outcome of the first command issued for an access.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowBuffer {
    pub hits: u64,
    pub misses: u64,
    pub conflicts: u64,
}

impl std::ops::AddAssign for RowBuffer {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.conflicts += other.conflicts;
    }
}

impl RowBuffer {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.conflicts
    }
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    /// Sum of the queue length over all cycles
    pub length_sum: u64,
}

impl std::ops::AddAssign for Queue {
    fn add_assign(&mut self, other: Self) {
        self.length_sum += other.length_sum;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DRAM {
    /// Command names, in the order of the command axis of `commands`
    pub command_names: Vec<String>,
    /// Issued commands per (channel, rank, command)
    pub commands: ndarray::Array3<u64>,
    /// Number of channels
    pub num_channels: usize,
    /// Number of ranks per channel
    pub num_ranks: usize,

    pub read_row_buffer: RowBuffer,
    pub write_row_buffer: RowBuffer,

    pub incoming_reads: u64,
    pub incoming_writes: u64,
    pub incoming_other: u64,
    /// Reads served from a queued write to the same address
    pub forwarded_reads: u64,

    pub read_transaction_bytes: u64,
    pub write_transaction_bytes: u64,

    /// Sum of read latencies (departure - arrival) in cycles
    pub read_latency_sum: u64,
    /// Read latency histogram (latency in cycles -> number of reads)
    pub read_latencies: BTreeMap<u64, u64>,

    pub read_queue: Queue,
    pub write_queue: Queue,
    pub other_queue: Queue,

    /// Cycles in which a command was issued on the command bus
    pub busy_cycles: u64,
    /// Cycles spent with at least one rank in a low power state
    pub low_power_cycles: u64,
}

impl std::ops::AddAssign for DRAM {
    fn add_assign(&mut self, other: Self) {
        assert_eq!(self.num_channels, other.num_channels);
        assert_eq!(self.num_ranks, other.num_ranks);
        assert_eq!(self.command_names, other.command_names);

        self.commands = other.commands + self.commands.view();
        self.read_row_buffer += other.read_row_buffer;
        self.write_row_buffer += other.write_row_buffer;
        self.incoming_reads += other.incoming_reads;
        self.incoming_writes += other.incoming_writes;
        self.incoming_other += other.incoming_other;
        self.forwarded_reads += other.forwarded_reads;
        self.read_transaction_bytes += other.read_transaction_bytes;
        self.write_transaction_bytes += other.write_transaction_bytes;
        self.read_latency_sum += other.read_latency_sum;
        for (latency, count) in other.read_latencies {
            *self.read_latencies.entry(latency).or_insert(0) += count;
        }
        self.read_queue += other.read_queue;
        self.write_queue += other.write_queue;
        self.other_queue += other.other_queue;
        self.busy_cycles += other.busy_cycles;
        self.low_power_cycles += other.low_power_cycles;
    }
}

impl DRAM {
    #[must_use]
    pub fn new(num_channels: usize, num_ranks: usize, command_names: &[&str]) -> Self {
        Self {
            command_names: command_names.iter().map(ToString::to_string).collect(),
            commands: ndarray::Array3::zeros((num_channels, num_ranks, command_names.len())),
            num_channels,
            num_ranks,
            read_row_buffer: RowBuffer::default(),
            write_row_buffer: RowBuffer::default(),
            incoming_reads: 0,
            incoming_writes: 0,
            incoming_other: 0,
            forwarded_reads: 0,
            read_transaction_bytes: 0,
            write_transaction_bytes: 0,
            read_latency_sum: 0,
            read_latencies: BTreeMap::new(),
            read_queue: Queue::default(),
            write_queue: Queue::default(),
            other_queue: Queue::default(),
            busy_cycles: 0,
            low_power_cycles: 0,
        }
    }

    pub fn record_command(&mut self, channel_id: usize, rank_id: usize, command: usize) {
        self.commands[[channel_id, rank_id, command]] += 1;
    }

    pub fn record_read_latency(&mut self, latency: u64) {
        self.read_latency_sum += latency;
        *self.read_latencies.entry(latency).or_insert(0) += 1;
    }

    /// Total number of times a command was issued across all channels and ranks.
    #[must_use]
    pub fn num_commands(&self, command: &str) -> u64 {
        self.command_names
            .iter()
            .position(|name| name == command)
            .map_or(0, |idx| {
                self.commands
                    .slice(ndarray::s![.., .., idx])
                    .sum()
            })
    }

    #[must_use]
    pub fn num_reads(&self) -> u64 {
        self.read_latencies.values().sum()
    }

    #[must_use]
    pub fn mean_read_latency(&self) -> Option<f64> {
        let reads = self.num_reads();
        if reads == 0 {
            return None;
        }
        Some(self.read_latency_sum as f64 / reads as f64)
    }

    #[must_use]
    pub fn command_counts_csv(&self, full: bool) -> Vec<CommandCountsCsvRow> {
        let mut out = Vec::new();
        for ((channel_id, rank_id, command), num_commands) in self.commands.indexed_iter() {
            // add single row to prevent empty data frame
            let need_row = out.is_empty();
            if !full && !need_row && *num_commands < 1 {
                continue;
            }
            out.push(CommandCountsCsvRow {
                channel_id,
                rank_id,
                command: self.command_names[command].clone(),
                num_commands: *num_commands,
            });
        }
        out
    }
}
