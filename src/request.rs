use crate::{address, spec::Level};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::EnumCount;

/// Decoded coordinates, indexed by [`Level`].
pub type AddrVec = [usize; Level::COUNT];

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
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Kind {
    Read,
    Write,
    Refresh,
    PowerDown,
    SelfRefresh,
}

/// Completion callback, invoked once when the request completes.
pub type Callback = Arc<dyn Fn(&Request) + Send + Sync>;

#[derive(Clone)]
pub struct Request {
    pub addr: address,
    pub kind: Kind,
    pub addr_vec: AddrVec,
    /// Cycle at which the request was accepted
    pub arrive: u64,
    /// Cycle at which the request completes
    pub depart: Option<u64>,
    /// No command has been issued for the request yet
    pub is_first_command: bool,
    pub callback: Option<Callback>,
}

impl Request {
    #[must_use]
    pub fn new(addr: address, kind: Kind) -> Self {
        Self {
            addr,
            kind,
            addr_vec: [0; Level::COUNT],
            arrive: 0,
            depart: None,
            is_first_command: true,
            callback: None,
        }
    }

    #[must_use]
    pub fn with_callback(mut self, callback: impl Fn(&Request) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Request targeting a rank rather than an address.
    #[must_use]
    pub fn for_rank(kind: Kind, channel: usize, rank: usize) -> Self {
        let mut req = Self::new(0, kind);
        req.addr_vec[Level::Channel as usize] = channel;
        req.addr_vec[Level::Rank as usize] = rank;
        req
    }

    #[must_use]
    pub fn channel(&self) -> usize {
        self.addr_vec[Level::Channel as usize]
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.addr_vec[Level::Rank as usize]
    }

    #[must_use]
    pub fn latency(&self) -> Option<u64> {
        self.depart.map(|depart| depart.saturating_sub(self.arrive))
    }

    pub(crate) fn complete(&self) {
        if let Some(callback) = &self.callback {
            callback(self);
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("addr", &self.addr)
            .field("kind", &self.kind)
            .field("addr_vec", &self.addr_vec)
            .field("arrive", &self.arrive)
            .field("depart", &self.depart)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}({:#x}@{:?})", self.kind, self.addr, self.addr_vec)
    }
}
