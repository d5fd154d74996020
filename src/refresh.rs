use crate::spec::StandardSpec;

/// Per-rank refresh bookkeeping of a channel.
#[derive(Debug, Clone)]
pub struct Refresh {
    interval: u64,
    lead: u64,
    last_refresh: Vec<u64>,
}

impl Refresh {
    #[must_use]
    pub fn new(spec: &StandardSpec, num_ranks: usize) -> Self {
        Self {
            interval: spec.refresh_interval(),
            lead: spec.refresh_lead,
            last_refresh: vec![0; num_ranks],
        }
    }

    /// Cycles after the last refresh at which a refresh is forced.
    #[must_use]
    pub fn deadline(&self) -> u64 {
        self.interval.saturating_sub(self.lead)
    }

    #[must_use]
    pub fn is_due(&self, rank: usize, now: u64) -> bool {
        self.interval > 0 && now.saturating_sub(self.last_refresh[rank]) >= self.deadline()
    }

    pub fn due_ranks(&self, now: u64) -> impl Iterator<Item = usize> + '_ {
        (0..self.last_refresh.len()).filter(move |rank| self.is_due(*rank, now))
    }

    pub fn refreshed(&mut self, rank: usize, now: u64) {
        self.last_refresh[rank] = now;
    }

    /// The rank refreshes itself, no refresh debt accrues.
    pub fn hold(&mut self, rank: usize, now: u64) {
        self.last_refresh[rank] = now;
    }
}

#[cfg(test)]
mod tests {
    use super::Refresh;
    use crate::spec::StandardSpec;

    #[test]
    fn test_due_after_deadline() -> color_eyre::eyre::Result<()> {
        let mut spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        spec.set_rank_number(2)?;
        let mut refresh = Refresh::new(&spec, 2);
        let deadline = refresh.deadline();
        assert_eq!(deadline, spec.refresh_interval() - spec.refresh_lead);

        assert_eq!(refresh.due_ranks(deadline - 1).count(), 0);
        refresh.refreshed(1, 10);
        assert_eq!(refresh.due_ranks(deadline).collect::<Vec<_>>(), vec![0]);
        refresh.hold(0, deadline);
        assert!(!refresh.is_due(0, deadline + 5));
        assert!(refresh.is_due(1, deadline + 10));
        Ok(())
    }
}
