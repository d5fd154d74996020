use crate::{
    addrdec::{self, Decoder},
    config::{self, Config, Parallelization},
    controller::Controller,
    request::Request,
    spec::{self, Command, Level, StandardSpec},
};
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Spec(#[from] spec::Error),
    #[error(transparent)]
    AddressDecoding(#[from] addrdec::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
}

/// Interface of a cycle driven memory system.
///
/// Host simulators only forward requests and ticks through this interface.
pub trait MemorySystem {
    /// Hand a request to the memory system.
    ///
    /// # Errors
    /// The request is handed back when it cannot be accepted this cycle.
    fn send(&mut self, req: Request) -> Result<(), Request>;

    /// Advance the memory clock by one cycle.
    fn tick(&mut self);

    /// Number of accepted requests that have not completed.
    #[must_use]
    fn pending_requests(&self) -> usize;

    /// Finalize statistics.
    fn finish(&mut self);
}

/// Multi-channel memory.
#[derive(Debug)]
pub struct Memory {
    config: Arc<Config>,
    spec: Arc<StandardSpec>,
    decoder: Decoder,
    controllers: Vec<Controller>,
    cycle: u64,
}

impl Memory {
    /// # Errors
    /// If the standard, organization or speed is unknown or the geometry is invalid.
    pub fn create(
        standard: &str,
        org: &str,
        speed: &str,
        channels: usize,
        ranks: usize,
    ) -> Result<Self, Error> {
        Self::new(Config {
            standard: standard.to_string(),
            org: org.to_string(),
            speed: speed.to_string(),
            channels,
            ranks,
            ..Config::default()
        })
    }

    /// # Errors
    /// If the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let mut spec = StandardSpec::new(&config.standard, &config.org, &config.speed)?;
        spec.set_channel_number(config.channels)?;
        spec.set_rank_number(config.ranks)?;
        let decoder = Decoder::new(&spec, config.mapping)?;

        log::debug!(
            "{} {} {}: {} channels, {} ranks, {} banks, tCK={}ns",
            spec.standard,
            config.org,
            config.speed,
            spec.count(Level::Channel),
            spec.count(Level::Rank),
            spec.count(Level::Bank),
            spec.clk_ns(),
        );

        let spec = Arc::new(spec);
        let config = Arc::new(config);
        let controllers = (0..config.channels)
            .map(|channel_id| Controller::new(channel_id, Arc::clone(&spec), Arc::clone(&config)))
            .collect();
        Ok(Self {
            config,
            spec,
            decoder,
            controllers,
            cycle: 0,
        })
    }

    #[must_use]
    pub fn spec(&self) -> &StandardSpec {
        &self.spec
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    #[must_use]
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Current memory cycle.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Aggregated statistics of all channels.
    #[must_use]
    pub fn stats(&self) -> stats::Stats {
        let mut stats = stats::Stats::new(
            self.spec.count(Level::Channel),
            self.spec.count(Level::Rank),
            &Command::names(),
        );
        for controller in &self.controllers {
            stats += controller.stats().clone();
        }
        stats.sim.cycles = self.cycle;
        stats
    }

    fn tick_controllers(&mut self) {
        let cycle = self.cycle;
        match self.config.parallelization {
            Parallelization::Serial => {
                for controller in &mut self.controllers {
                    controller.tick(cycle);
                }
            }
            #[cfg(feature = "parallel")]
            Parallelization::Deterministic => {
                use rayon::prelude::*;
                self.controllers
                    .par_iter_mut()
                    .for_each(|controller| controller.tick(cycle));
            }
        }
    }
}

impl MemorySystem for Memory {
    fn send(&mut self, mut req: Request) -> Result<(), Request> {
        req.addr_vec = self.decoder.decode(req.addr);
        let channel = req.channel();
        self.controllers[channel].send(req, self.cycle)
    }

    fn tick(&mut self) {
        self.tick_controllers();
        self.cycle += 1;
    }

    fn pending_requests(&self) -> usize {
        self.controllers
            .iter()
            .map(Controller::pending_requests)
            .sum()
    }

    fn finish(&mut self) {
        let cycle = self.cycle;
        for controller in &mut self.controllers {
            controller.finish(cycle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, Memory, MemorySystem};
    use crate::{
        config::Config,
        request::{Kind, Request},
        spec,
    };
    use pretty_assertions_sorted as diff;

    #[test]
    fn test_unknown_names_fail_construction() {
        assert!(matches!(
            Memory::create("HBM9", "WideIO_1Gb", "WideIO_200", 1, 1),
            Err(Error::Spec(spec::Error::UnknownStandard(_)))
        ));
        assert!(matches!(
            Memory::create("WideIO", "WideIO_1Gb", "WideIO_999", 1, 1),
            Err(Error::Spec(spec::Error::UnknownSpeed { .. }))
        ));
        assert!(matches!(
            Memory::create("WideIO", "WideIO_1Gb", "WideIO_200", 3, 1),
            Err(Error::AddressDecoding(_))
        ));
    }

    #[test]
    fn test_too_many_ranks_to_refresh_in_time() -> color_eyre::eyre::Result<()> {
        assert!(matches!(
            Memory::create("WideIO", "WideIO_1Gb", "WideIO_200", 1, 256),
            Err(Error::Spec(spec::Error::RefreshLead { ranks: 256, .. }))
        ));

        // the largest accepted rank count still serves traffic
        let mut memory = Memory::create("WideIO", "WideIO_1Gb", "WideIO_200", 1, 128)?;
        let addr = memory.decoder().encode(&[0, 3, 0, 1, 0]);
        memory.send(Request::new(addr, Kind::Read)).unwrap();
        while memory.pending_requests() > 0 {
            memory.tick();
            assert!(memory.cycle() < 1_000);
        }
        memory.finish();
        assert_eq!(memory.stats().sim.completed, 1);
        Ok(())
    }

    #[test]
    fn test_requests_are_routed_by_channel() -> color_eyre::eyre::Result<()> {
        let mut memory = Memory::create("WideIO", "WideIO_2Gb", "WideIO_266", 4, 1)?;
        let decoder = memory.decoder().clone();
        for channel in 0..4 {
            let addr = decoder.encode(&[channel, 0, 1, 2, 3]);
            memory.send(Request::new(addr, Kind::Read)).unwrap();
        }
        for (channel, controller) in memory.controllers().iter().enumerate() {
            assert_eq!(controller.channel_id, channel);
            assert_eq!(controller.pending_requests(), 1);
        }
        assert_eq!(memory.pending_requests(), 4);

        while memory.pending_requests() > 0 {
            memory.tick();
            assert!(memory.cycle() < 200);
        }
        memory.finish();
        let stats = memory.stats();
        assert_eq!(stats.dram.num_commands("RD"), 4);
        assert_eq!(stats.dram.num_commands("ACT"), 4);
        assert_eq!(stats.sim.completed, 4);
        // identical channels see identical latencies
        diff::assert_eq!(stats.dram.read_latencies.len(), 1);
        Ok(())
    }

    #[test]
    fn test_finish_twice_equals_once() -> color_eyre::eyre::Result<()> {
        let mut memory = Memory::create("SMLA_CIO", "SMLA_CIO_1Gb", "SMLA_CIO_200", 2, 2)?;
        for i in 0..16u64 {
            let kind = if i % 3 == 0 { Kind::Write } else { Kind::Read };
            memory.send(Request::new(i * 0x1_0000, kind)).unwrap();
        }
        while memory.pending_requests() > 0 {
            memory.tick();
            assert!(memory.cycle() < 10_000);
        }
        memory.finish();
        let once = memory.stats();
        memory.finish();
        diff::assert_eq!(memory.stats(), once);
        assert_eq!(once.sim.cycles, memory.cycle());
        assert_eq!(once.sim.completed, 16);
        Ok(())
    }

    #[test]
    fn test_configured_memory() -> color_eyre::eyre::Result<()> {
        let config = Config {
            channels: 2,
            ranks: 2,
            mapping: crate::addrdec::Mapping::RoBaRaCoCh,
            ..Config::default()
        };
        let mut memory = Memory::new(config)?;
        // consecutive transactions alternate channels
        memory.send(Request::new(0x00, Kind::Write)).unwrap();
        memory.send(Request::new(0x40, Kind::Write)).unwrap();
        assert_eq!(memory.controllers()[0].pending_requests(), 1);
        assert_eq!(memory.controllers()[1].pending_requests(), 1);
        Ok(())
    }
}
