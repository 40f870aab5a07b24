use ferrous_resolv_domain::ResolverConfig;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Per-attempt timeout with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    cap: Duration,
    tries: u32,
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration, tries: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            tries: tries.max(1),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.timeout(), config.max_timeout(), config.tries)
    }

    /// `base * 2^attempt`, never above the cap.
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(20);
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn tries(&self) -> u32 {
        self.tries
    }
}

/// Deadlines ordered by `(instant, id)`; equal instants expire in ascending id order.
#[derive(Debug, Default)]
pub struct TimeoutScheduler {
    deadlines: BTreeSet<(Instant, u16)>,
    by_id: FxHashMap<u16, Instant>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline for `id`, replacing any earlier one.
    pub fn schedule(&mut self, id: u16, deadline: Instant) {
        if let Some(old) = self.by_id.insert(id, deadline) {
            self.deadlines.remove(&(old, id));
        }
        self.deadlines.insert((deadline, id));
    }

    pub fn cancel(&mut self, id: u16) -> bool {
        match self.by_id.remove(&id) {
            Some(deadline) => self.deadlines.remove(&(deadline, id)),
            None => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.first().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every id whose deadline is at or before `now`.
    pub fn expired(&mut self, now: Instant) -> Vec<u16> {
        let mut fired = Vec::new();
        while let Some(&(deadline, id)) = self.deadlines.first() {
            if deadline > now {
                break;
            }
            self.deadlines.pop_first();
            self.by_id.remove(&id);
            fired.push(id);
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
