//! DRAM command traces.
//!
//! Each line holds an address (hex with `0x` prefix or decimal) and the
//! request kind (`R` or `W`). Blank lines and `#` comments are skipped.

use crate::{
    address,
    memory::MemorySystem,
    request::{Kind, Request},
};
use std::io::BufRead;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("line {line}: {reason}: {content:?}")]
    Malformed {
        line: usize,
        content: String,
        reason: &'static str,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_address(addr: &str) -> Option<address> {
    match addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")) {
        Some(hex) => address::from_str_radix(hex, 16).ok(),
        None => addr.parse().ok(),
    }
}

/// Parse a single trace line, `None` for lines without a request.
pub fn parse_line(line: &str) -> Result<Option<(address, Kind)>, &'static str> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let addr = parts.next().ok_or("missing address")?;
    let addr = parse_address(addr).ok_or("invalid address")?;
    let kind = match parts.next() {
        Some("R" | "r") => Kind::Read,
        Some("W" | "w") => Kind::Write,
        Some(_) => return Err("invalid request kind"),
        None => return Err("missing request kind"),
    };
    if parts.next().is_some() {
        return Err("trailing fields");
    }
    Ok(Some((addr, kind)))
}

/// Iterator over the requests of a trace.
#[derive(Debug)]
pub struct Reader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> Reader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for Reader<R> {
    type Item = Result<(address, Kind), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let content = match self.lines.next()? {
                Ok(content) => content,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;
            match parse_line(&content) {
                Ok(None) => continue,
                Ok(Some(request)) => return Some(Ok(request)),
                Err(reason) => {
                    return Some(Err(Error::Malformed {
                        line: self.line,
                        content,
                        reason,
                    }))
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub reads: u64,
    pub writes: u64,
    /// Cycles in which the memory rejected the next request
    pub stalls: u64,
}

/// Feed a trace into a memory system until all requests have completed.
///
/// # Errors
/// If the trace cannot be read.
pub fn run<M, T>(memory: &mut M, trace: T) -> Result<Summary, Error>
where
    M: MemorySystem,
    T: IntoIterator<Item = Result<(address, Kind), Error>>,
{
    let mut trace = trace.into_iter();
    let mut summary = Summary::default();
    let mut stalled: Option<Request> = None;
    loop {
        let req = match stalled.take() {
            Some(req) => Some(req),
            None => trace
                .next()
                .transpose()?
                .map(|(addr, kind)| Request::new(addr, kind)),
        };
        let Some(req) = req else {
            break;
        };
        let kind = req.kind;
        match memory.send(req) {
            Ok(()) => match kind {
                Kind::Read => summary.reads += 1,
                Kind::Write => summary.writes += 1,
                _ => {}
            },
            Err(req) => {
                summary.stalls += 1;
                stalled = Some(req);
            }
        }
        memory.tick();
    }
    while memory.pending_requests() > 0 {
        memory.tick();
    }
    memory.finish();
    Ok(summary)
}
