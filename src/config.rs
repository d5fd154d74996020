use crate::{addrdec::Mapping, scheduler::Policy};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Parallelization {
    #[default]
    Serial,
    /// Tick channels on the rayon thread pool
    #[cfg(feature = "parallel")]
    Deterministic,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read config {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Memory system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Memory standard (e.g. `WideIO`)
    pub standard: String,
    /// Organization (e.g. `WideIO_1Gb`)
    pub org: String,
    /// Speed bin (e.g. `WideIO_200`)
    pub speed: String,
    pub channels: usize,
    pub ranks: usize,

    pub mapping: Mapping,
    pub scheduler: Policy,
    pub parallelization: Parallelization,

    pub read_queue_size: usize,
    pub write_queue_size: usize,
    pub other_queue_size: usize,
    /// Fraction of the write queue at which writes are drained
    pub write_high_watermark: f64,
    /// Fraction of the write queue below which reads are served again
    pub write_low_watermark: f64,

    /// Idle cycles after which a rank is powered down
    pub power_down_threshold: Option<u64>,
    /// Idle cycles after which a rank enters self-refresh
    pub self_refresh_threshold: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            standard: "WideIO".to_string(),
            org: "WideIO_1Gb".to_string(),
            speed: "WideIO_200".to_string(),
            channels: 1,
            ranks: 1,
            mapping: Mapping::default(),
            scheduler: Policy::default(),
            parallelization: Parallelization::default(),
            read_queue_size: 32,
            write_queue_size: 32,
            other_queue_size: 32,
            write_high_watermark: 0.8,
            write_low_watermark: 0.2,
            power_down_threshold: None,
            self_refresh_threshold: None,
        }
    }
}

impl Config {
    /// # Errors
    /// If the yaml is malformed or the config is invalid.
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// If the file cannot be read or the config is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// # Errors
    /// If a queue size is zero or the watermarks are inconsistent.
    pub fn validate(&self) -> Result<(), Error> {
        if self.channels == 0 || self.ranks == 0 {
            return Err(Error::Invalid(
                "need at least one channel and one rank".to_string(),
            ));
        }
        if self.read_queue_size == 0 || self.write_queue_size == 0 || self.other_queue_size == 0 {
            return Err(Error::Invalid("queue sizes must be non-zero".to_string()));
        }
        let valid = 0.0..=1.0;
        if !valid.contains(&self.write_low_watermark)
            || !valid.contains(&self.write_high_watermark)
            || self.write_low_watermark > self.write_high_watermark
        {
            return Err(Error::Invalid(format!(
                "write watermarks {} and {} must satisfy 0 <= low <= high <= 1",
                self.write_low_watermark, self.write_high_watermark
            )));
        }
        if let (Some(pd), Some(sref)) = (self.power_down_threshold, self.self_refresh_threshold) {
            if sref < pd {
                return Err(Error::Invalid(format!(
                    "self-refresh threshold {sref} is below power-down threshold {pd}"
                )));
            }
        }
        Ok(())
    }
}
