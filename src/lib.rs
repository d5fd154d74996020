#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::too_many_arguments,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

pub mod addrdec;
pub mod config;
pub mod controller;
pub mod engine;
pub mod fifo;
pub mod memory;
pub mod node;
pub mod refresh;
pub mod request;
pub mod scheduler;
pub mod scoreboard;
pub mod spec;
pub mod trace;

#[cfg(test)]
pub mod testing;

pub use config::Config;
pub use memory::{Memory, MemorySystem};
pub use request::{Kind, Request};
pub use spec::StandardSpec;

pub type address = u64;
