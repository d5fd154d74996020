use crate::{
    address,
    request::AddrVec,
    spec::{Level, StandardSpec},
};
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};

/// Order in which the levels are sliced from the address, highest bits first.
#[derive(
    strum::EnumString, strum::Display, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Mapping {
    /// Channel in the highest, column in the lowest bits
    #[default]
    ChRaBaRoCo,
    /// Row in the highest, channel in the lowest bits
    RoBaRaCoCh,
}

impl Mapping {
    /// Levels from the lowest to the highest address bits.
    #[must_use]
    pub fn slice_order(self) -> [Level; Level::COUNT] {
        match self {
            Self::ChRaBaRoCo => [
                Level::Column,
                Level::Row,
                Level::Bank,
                Level::Rank,
                Level::Channel,
            ],
            Self::RoBaRaCoCh => [
                Level::Channel,
                Level::Column,
                Level::Rank,
                Level::Bank,
                Level::Row,
            ],
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{level} count {count} is not a power of two")]
    NotPowerOfTwo { level: Level, count: u64 },
}

#[must_use]
pub fn is_power_of_two(n: u64) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

fn log2(level: Level, n: u64) -> Result<u32, Error> {
    if is_power_of_two(n) {
        Ok(n.ilog2())
    } else {
        Err(Error::NotPowerOfTwo { level, count: n })
    }
}

/// Maps flat addresses to per-level coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoder {
    pub mapping: Mapping,
    /// Bits of the byte offset within one transaction
    pub tx_bits: u32,
    /// Address bits per level
    pub bits: [u32; Level::COUNT],
}

impl Decoder {
    /// # Errors
    /// If a level count or the transaction size is not a power of two.
    pub fn new(spec: &StandardSpec, mapping: Mapping) -> Result<Self, Error> {
        let tx_bits = log2(Level::Column, spec.transaction_bytes())?;
        let mut bits = [0; Level::COUNT];
        for level in Level::iter() {
            bits[level as usize] = log2(level, spec.count(level) as u64)?;
        }
        // a transaction covers prefetch_size columns
        let prefetch_bits = log2(Level::Column, spec.prefetch_size)?;
        bits[Level::Column as usize] = bits[Level::Column as usize].saturating_sub(prefetch_bits);
        Ok(Self {
            mapping,
            tx_bits,
            bits,
        })
    }

    #[must_use]
    pub fn decode(&self, addr: address) -> AddrVec {
        let mut addr = addr >> self.tx_bits;
        let mut addr_vec = [0; Level::COUNT];
        for level in self.mapping.slice_order() {
            let bits = self.bits[level as usize];
            addr_vec[level as usize] = (addr & ((1 << bits) - 1)) as usize;
            addr >>= bits;
        }
        addr_vec
    }

    /// Lowest address that decodes to `addr_vec`.
    #[must_use]
    pub fn encode(&self, addr_vec: &AddrVec) -> address {
        let mut addr: address = 0;
        for level in self.mapping.slice_order().into_iter().rev() {
            let bits = self.bits[level as usize];
            addr = (addr << bits) | (addr_vec[level as usize] as address & ((1 << bits) - 1));
        }
        addr << self.tx_bits
    }
}
