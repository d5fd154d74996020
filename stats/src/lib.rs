#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

pub mod dram;
pub mod sim;

pub use dram::DRAM;
pub use sim::Sim;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub sim: Sim,
    pub dram: DRAM,
}

impl Stats {
    #[must_use]
    pub fn new(num_channels: usize, num_ranks: usize, command_names: &[&str]) -> Self {
        Self {
            sim: Sim::default(),
            dram: DRAM::new(num_channels, num_ranks, command_names),
        }
    }
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.sim += other.sim;
        self.dram += other.dram;
    }
}
