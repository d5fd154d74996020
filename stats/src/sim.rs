use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sim {
    /// Memory clock cycles simulated
    pub cycles: u64,
    /// Requests accepted by the memory
    pub requests: u64,
    /// Requests that completed
    pub completed: u64,
}

impl std::ops::AddAssign for Sim {
    fn add_assign(&mut self, other: Self) {
        // all channels share the same clock
        self.cycles = self.cycles.max(other.cycles);
        self.requests += other.requests;
        self.completed += other.completed;
    }
}
