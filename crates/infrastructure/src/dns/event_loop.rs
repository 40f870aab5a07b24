//! Single-threaded driver for [`Resolver`]: poll sockets, fire deadlines,
//! dispatch completions.

use super::resolver::Resolver;
use super::transport::Readiness;
use ferrous_resolv_domain::DomainError;
use std::time::{Duration, Instant};
use tracing::trace;

impl Resolver {
    /// True when no lookup is outstanding and no completion awaits dispatch.
    pub fn is_idle(&self) -> bool {
        self.pending_lookups() == 0
    }

    /// How long a host loop may sleep before calling [`Resolver::run_once`].
    /// `None` means there is nothing to wait for and no cap was given.
    pub fn next_timeout(&self, max: Option<Duration>) -> Option<Duration> {
        if !self.ready.is_empty() {
            return Some(Duration::ZERO);
        }
        let until_deadline = self
            .scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        match (until_deadline, max) {
            (Some(deadline), Some(max)) => Some(deadline.min(max)),
            (deadline, None) => deadline,
            (None, max) => max,
        }
    }

    /// One loop turn: dispatch, wait for at most `max_wait` (or the next
    /// deadline), handle socket readiness and expired deadlines, dispatch again.
    /// Returns the number of callbacks invoked.
    pub fn run_once(&mut self, max_wait: Option<Duration>) -> Result<usize, DomainError> {
        let mut dispatched = self.dispatch_ready();
        if self.is_idle() {
            return Ok(dispatched);
        }

        let wait = if self.ready.is_empty() {
            self.next_timeout(max_wait)
        } else {
            Some(Duration::ZERO)
        };
        let readiness = self.transport.poll(wait)?;
        trace!(events = readiness.len(), ?wait, "Poll returned");

        for ready in readiness {
            self.process_readiness(ready);
        }
        for id in self.scheduler.expired(Instant::now()) {
            self.handle_timeout(id);
        }

        dispatched += self.dispatch_ready();
        Ok(dispatched)
    }

    /// Runs the loop until every lookup, including ones started by callbacks,
    /// has been delivered.
    pub fn run_until_idle(&mut self) -> Result<(), DomainError> {
        while !self.is_idle() {
            self.run_once(None)?;
        }
        Ok(())
    }

    fn process_readiness(&mut self, ready: Readiness) {
        if ready.writable {
            if let Err(e) = self.transport.handle_writable(ready.server, ready.protocol) {
                self.handle_transport_error(ready.server, ready.protocol, e);
                return;
            }
        }
        if ready.readable {
            let received = self.transport.receive(ready.server, ready.protocol);
            for datagram in &received.datagrams {
                self.handle_response(ready.server, ready.protocol, &datagram.bytes);
            }
            if let Some(e) = received.error {
                self.handle_transport_error(ready.server, ready.protocol, e);
            }
        }
    }

    /// Invokes callbacks queued before this call; ones queued by those
    /// callbacks wait for the next turn.
    fn dispatch_ready(&mut self) -> usize {
        let limit = self.next_seq;
        let mut count = 0;
        while self.ready.front().is_some_and(|item| item.seq < limit) {
            let Some(item) = self.ready.pop_front() else {
                break;
            };
            trace!(lookup = %item.lookup, "Dispatching completion");
            (item.callback)(self, item.completion);
            count += 1;
        }
        count
    }
}
