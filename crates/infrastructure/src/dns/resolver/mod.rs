//! Callback-driven resolver: public lookups, query dispatch and response handling.
//!
//! Every public call returns a [`LookupId`] immediately. Results are queued and
//! handed to the callback by the event loop, never from inside the call that
//! started the lookup.

mod addr;
mod answer;
mod host;
mod nameinfo;

use super::nameservers::NameserverSet;
use super::query::{LookupId, Protocol, Query};
use super::scheduler::{RetryPolicy, TimeoutScheduler};
use super::tracker::QueryTracker;
use super::transport::{Multiplexer, SocketEvent};
use addr::AddrLookup;
use ferrous_resolv_domain::wire::{encode_query, QueryOptions};
use ferrous_resolv_domain::{
    AddressFamily, Completion, DomainError, HostAliases, HostsFile, Message, NameInfoRequest, Question,
    ResolverConfig, ResponseCode, ServiceTable,
};
use host::HostLookup;
use nameinfo::NameInfoLookup;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Completion handler; receives the resolver so it can start follow-up lookups.
pub type Callback = Box<dyn FnOnce(&mut Resolver, Completion)>;

/// Where a lookup looks for an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Files,
    Dns,
}

impl Source {
    /// `f` is the hosts file and `b` is DNS, in the order given.
    pub(crate) fn parse_order(lookups: &str) -> VecDeque<Source> {
        let mut order = VecDeque::new();
        for c in lookups.chars() {
            let source = match c {
                'f' => Source::Files,
                'b' => Source::Dns,
                _ => continue,
            };
            if !order.contains(&source) {
                order.push_back(source);
            }
        }
        order
    }
}

/// Read-only state the lookup state machines consult.
pub(crate) struct LookupContext<'a> {
    pub config: &'a ResolverConfig,
    pub hosts: &'a HostsFile,
    pub aliases: &'a HostAliases,
    pub services: &'a ServiceTable,
}

/// What a lookup wants next.
#[derive(Debug)]
pub(crate) enum Step {
    Wait,
    Send(Vec<Question>),
    Complete(Completion),
}

#[derive(Debug)]
enum LookupState {
    Host(HostLookup),
    Addr(AddrLookup),
    NameInfo(NameInfoLookup),
}

impl LookupState {
    fn start(&mut self, ctx: &LookupContext<'_>) -> Step {
        match self {
            LookupState::Host(l) => l.start(ctx),
            LookupState::Addr(l) => l.start(ctx),
            LookupState::NameInfo(l) => l.start(ctx),
        }
    }

    fn on_answer(
        &mut self,
        ctx: &LookupContext<'_>,
        question: &Question,
        result: Result<Message, DomainError>,
    ) -> Step {
        match self {
            LookupState::Host(l) => l.on_answer(ctx, question, result),
            LookupState::Addr(l) => l.on_answer(ctx, question, result),
            LookupState::NameInfo(l) => l.on_answer(ctx, question, result),
        }
    }
}

struct LookupEntry {
    callback: Callback,
    state: LookupState,
}

pub(crate) struct ReadyCompletion {
    pub seq: u64,
    pub lookup: LookupId,
    pub callback: Callback,
    pub completion: Completion,
}

pub struct Resolver {
    pub(crate) config: ResolverConfig,
    pub(crate) nameservers: NameserverSet,
    pub(crate) tracker: QueryTracker,
    pub(crate) scheduler: TimeoutScheduler,
    pub(crate) policy: RetryPolicy,
    pub(crate) transport: Multiplexer,
    lookups: FxHashMap<LookupId, LookupEntry>,
    pub(crate) ready: VecDeque<ReadyCompletion>,
    hosts: HostsFile,
    aliases: HostAliases,
    services: ServiceTable,
    next_lookup: u64,
    pub(crate) next_seq: u64,
    closing: bool,
}

impl Resolver {
    /// Builds a resolver from `config`. Servers missing from the configuration
    /// are taken from the system resolver configuration.
    pub fn new(config: ResolverConfig) -> Result<Self, DomainError> {
        let config = config.with_system_defaults();
        config
            .validate()
            .map_err(|e| DomainError::Config(e.to_string()))?;
        let addrs = config
            .nameserver_addrs()
            .map_err(|e| DomainError::Config(e.to_string()))?;

        let hosts = match config.hosts_path.as_deref() {
            Some(path) if config.uses_hosts_file() => HostsFile::load(path).unwrap_or_else(|e| {
                debug!(error = %e, "Hosts file unavailable");
                HostsFile::new()
            }),
            _ => HostsFile::new(),
        };
        let aliases = match config.aliases_path.as_deref() {
            Some(path) if !config.flags.no_aliases => HostAliases::load(path).unwrap_or_else(|e| {
                warn!(error = %e, "Host aliases file unavailable");
                HostAliases::new()
            }),
            _ => HostAliases::new(),
        };
        let services = match config.services_path.as_deref() {
            Some(path) => ServiceTable::load(path).unwrap_or_else(|e| {
                warn!(error = %e, "Services file unavailable, using built-in table");
                ServiceTable::builtin()
            }),
            None => ServiceTable::builtin(),
        };

        let transport = Multiplexer::new(&addrs, config.recv_buffer_size)?;
        info!(
            servers = addrs.len(),
            tries = config.tries,
            timeout_ms = config.timeout_ms,
            "Resolver initialized"
        );

        Ok(Self {
            nameservers: NameserverSet::new(&addrs, config.failure_threshold),
            tracker: QueryTracker::new(),
            scheduler: TimeoutScheduler::new(),
            policy: RetryPolicy::from_config(&config),
            transport,
            lookups: FxHashMap::default(),
            ready: VecDeque::new(),
            hosts,
            aliases,
            services,
            next_lookup: 1,
            next_seq: 0,
            closing: false,
            config,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn nameservers(&self) -> &NameserverSet {
        &self.nameservers
    }

    /// Queries currently waiting for an answer.
    pub fn pending_queries(&self) -> usize {
        self.tracker.len()
    }

    /// Lookups started and not yet delivered.
    pub fn pending_lookups(&self) -> usize {
        self.lookups.len() + self.ready.len()
    }

    pub fn hosts_mut(&mut self) -> &mut HostsFile {
        &mut self.hosts
    }

    pub fn aliases_mut(&mut self) -> &mut HostAliases {
        &mut self.aliases
    }

    pub fn set_socket_state_callback<F>(&mut self, callback: F)
    where
        F: FnMut(SocketEvent) + 'static,
    {
        self.transport.set_socket_state_callback(Some(Box::new(callback)));
    }

    pub fn clear_socket_state_callback(&mut self) {
        self.transport.set_socket_state_callback(None);
    }

    /// Resolves `name` to addresses of `family`.
    pub fn resolve_by_name<F>(&mut self, name: &str, family: AddressFamily, callback: F) -> LookupId
    where
        F: FnOnce(&mut Resolver, Completion) + 'static,
    {
        self.start_lookup(
            LookupState::Host(HostLookup::new(name, family)),
            Box::new(callback),
        )
    }

    /// Resolves `addr` to its host name through PTR records.
    pub fn resolve_by_address<F>(&mut self, addr: IpAddr, callback: F) -> LookupId
    where
        F: FnOnce(&mut Resolver, Completion) + 'static,
    {
        self.start_lookup(LookupState::Addr(AddrLookup::new(addr)), Box::new(callback))
    }

    /// Resolves an address and port to host and service names.
    pub fn resolve_service<F>(&mut self, request: NameInfoRequest, callback: F) -> LookupId
    where
        F: FnOnce(&mut Resolver, Completion) + 'static,
    {
        self.start_lookup(
            LookupState::NameInfo(NameInfoLookup::new(request)),
            Box::new(callback),
        )
    }

    /// Stops a lookup. Its callback is dropped without being called.
    pub fn cancel(&mut self, lookup: LookupId) -> bool {
        if self.lookups.remove(&lookup).is_some() {
            self.drop_queries(lookup);
            debug!(%lookup, "Lookup cancelled");
            return true;
        }
        let before = self.ready.len();
        self.ready.retain(|item| item.lookup != lookup);
        before != self.ready.len()
    }

    fn start_lookup(&mut self, state: LookupState, callback: Callback) -> LookupId {
        let lookup = LookupId(self.next_lookup);
        self.next_lookup += 1;
        if self.closing {
            debug!(%lookup, "Resolver closing, lookup discarded");
            return lookup;
        }

        self.lookups.insert(lookup, LookupEntry { callback, state });
        let ctx = LookupContext {
            config: &self.config,
            hosts: &self.hosts,
            aliases: &self.aliases,
            services: &self.services,
        };
        let step = match self.lookups.get_mut(&lookup) {
            Some(entry) => entry.state.start(&ctx),
            None => Step::Wait,
        };
        self.drive(lookup, step);
        lookup
    }

    fn advance(
        &mut self,
        lookup: LookupId,
        question: &Question,
        result: Result<Message, DomainError>,
    ) -> Step {
        let ctx = LookupContext {
            config: &self.config,
            hosts: &self.hosts,
            aliases: &self.aliases,
            services: &self.services,
        };
        match self.lookups.get_mut(&lookup) {
            Some(entry) => entry.state.on_answer(&ctx, question, result),
            None => Step::Wait,
        }
    }

    /// Acts on a lookup's step until it waits on the network or completes.
    fn drive(&mut self, lookup: LookupId, step: Step) {
        let mut steps = VecDeque::from([step]);
        while let Some(step) = steps.pop_front() {
            if !self.lookups.contains_key(&lookup) {
                return;
            }
            match step {
                Step::Wait => {}
                Step::Complete(completion) => self.finish(lookup, completion),
                Step::Send(questions) => {
                    for question in questions {
                        if !self.lookups.contains_key(&lookup) {
                            return;
                        }
                        if let Err(e) = self.start_query(lookup, question.clone()) {
                            debug!(%lookup, question = %question, error = %e, "Query not started");
                            steps.push_back(self.advance(lookup, &question, Err(e)));
                        }
                    }
                }
            }
        }
    }

    fn start_query(&mut self, lookup: LookupId, question: Question) -> Result<(), DomainError> {
        let edns = self.config.edns_payload();
        let options = QueryOptions {
            recursion_desired: !self.config.flags.no_recurse,
            edns_payload_size: edns,
        };
        let request = encode_query(0, &question, &options)
            .map_err(|e| DomainError::BadName(format!("{}: {}", question.name, e)))?;
        let protocol = if self.config.flags.use_tcp {
            Protocol::Tcp
        } else {
            Protocol::Udp
        };
        let rotation = self.nameservers.rotation(self.config.flags.primary_only);

        let query = Query::new(lookup, question, rotation, protocol, edns.is_some(), request);
        let id = self.tracker.register(query)?;
        self.transmit(id);
        Ok(())
    }

    /// Sends the query to its current server, rotating past servers that fail to send.
    fn transmit(&mut self, id: u16) {
        loop {
            let Some(query) = self.tracker.get_mut(id) else {
                return;
            };
            let Some(server) = query.server() else {
                self.fail_query(id);
                return;
            };

            let protocol = query.protocol;
            let now = Instant::now();
            match self.transport.send(server, protocol, &query.request) {
                Ok(()) => {
                    let deadline = now + self.policy.attempt_timeout(query.attempt);
                    query.sent_at = Some(now);
                    query.deadline = Some(deadline);
                    debug!(
                        id,
                        server,
                        %protocol,
                        attempt = query.attempt,
                        question = %query.question,
                        "Query sent"
                    );
                    self.nameservers.mark_sent(server);
                    self.scheduler.schedule(id, deadline);
                    return;
                }
                Err(e) => {
                    query.last_error = Some(e);
                    query.rotate();
                    self.nameservers.mark_failed(server, "send");
                    self.close_idle_tcp();
                }
            }
        }
    }

    fn fail_query(&mut self, id: u16) {
        let Some(query) = self.tracker.remove(id) else {
            return;
        };
        self.scheduler.cancel(id);
        self.close_idle_tcp();

        let error = query.exhausted_error();
        debug!(id, question = %query.question, error = %error, "Query failed");
        let step = self.advance(query.lookup, &query.question, Err(error));
        self.drive(query.lookup, step);
    }

    fn complete_query(&mut self, id: u16, result: Result<Message, DomainError>) {
        let Some(query) = self.tracker.remove(id) else {
            return;
        };
        self.scheduler.cancel(id);
        self.close_idle_tcp();

        let step = self.advance(query.lookup, &query.question, result);
        self.drive(query.lookup, step);
    }

    /// Parses a message read from `server` and routes it to its query.
    pub(crate) fn handle_response(&mut self, server: usize, protocol: Protocol, bytes: &[u8]) {
        let msg = match Message::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(server, %protocol, error = %e, "Dropping malformed response");
                return;
            }
        };
        if !msg.header.response {
            debug!(server, id = msg.header.id, "Dropping message without QR bit");
            return;
        }
        let Some(question) = msg.question().cloned() else {
            debug!(server, id = msg.header.id, "Dropping response without question");
            return;
        };

        let id = msg.header.id;
        let Some(query) = self.tracker.match_response(id, &question) else {
            debug!(server, id, "Dropping unmatched response");
            return;
        };
        if query.server() != Some(server) || query.protocol != protocol {
            debug!(id, server, %protocol, "Dropping response from unexpected server");
            return;
        }
        let rtt = query.sent_at.map(|sent| sent.elapsed());

        if msg.header.truncated && protocol == Protocol::Udp && !self.config.flags.ignore_truncation {
            debug!(id, server, "Truncated response, retrying over TCP");
            query.protocol = Protocol::Tcp;
            query.attempt = 0;
            self.scheduler.cancel(id);
            self.transmit(id);
            return;
        }

        let rcode = msg.rcode();
        if rcode == ResponseCode::FormErr && query.edns {
            let options = QueryOptions {
                recursion_desired: !self.config.flags.no_recurse,
                edns_payload_size: None,
            };
            if let Ok(request) = encode_query(id, &query.question, &options) {
                debug!(id, server, "FORMERR to EDNS query, resending without OPT");
                query.edns = false;
                query.request = request;
                self.scheduler.cancel(id);
                self.transmit(id);
                return;
            }
        }

        match rcode {
            ResponseCode::NoError | ResponseCode::NXDomain => {
                self.nameservers.mark_healthy(server, rtt);
                self.complete_query(id, Ok(msg));
            }
            rcode if rcode.is_server_failure() && !self.config.flags.no_check_response => {
                debug!(id, server, %rcode, "Server failure, trying next nameserver");
                query.last_error = Some(DomainError::ServerFailure { rcode });
                query.rotate();
                self.nameservers.mark_failed(server, "rcode");
                self.scheduler.cancel(id);
                self.close_idle_tcp();
                self.transmit(id);
            }
            rcode => {
                self.nameservers.mark_healthy(server, rtt);
                self.complete_query(id, Err(DomainError::ServerFailure { rcode }));
            }
        }
    }

    /// Retries an expired query, rotating once its attempts on the server are spent.
    pub(crate) fn handle_timeout(&mut self, id: u16) {
        let Some(query) = self.tracker.get_mut(id) else {
            return;
        };
        let Some(server) = query.server() else {
            self.fail_query(id);
            return;
        };

        query.attempt += 1;
        query.timed_out = true;
        debug!(id, server, attempt = query.attempt, question = %query.question, "Query timed out");
        let rotated = query.attempt >= self.policy.tries();
        if rotated {
            query.rotate();
        }
        self.nameservers.mark_failed(server, "timeout");
        if rotated {
            self.close_idle_tcp();
        }
        self.transmit(id);
    }

    /// Moves every query riding a broken socket to its next server.
    pub(crate) fn handle_transport_error(
        &mut self,
        server: usize,
        protocol: Protocol,
        error: DomainError,
    ) {
        let ids = self.tracker.ids_on(server, protocol);
        if ids.is_empty() {
            return;
        }
        warn!(server, %protocol, error = %error, queries = ids.len(), "Transport failure");
        self.nameservers.mark_failed(server, "transport");
        for &id in &ids {
            if let Some(query) = self.tracker.get_mut(id) {
                query.last_error = Some(error.clone());
                query.rotate();
                self.scheduler.cancel(id);
            }
        }
        self.close_idle_tcp();
        for id in ids {
            self.transmit(id);
        }
    }

    /// Closes TCP connections no pending query is waiting on.
    fn close_idle_tcp(&mut self) {
        if self.config.flags.stay_open {
            return;
        }
        for server in 0..self.nameservers.len() {
            if self.transport.has_tcp(server) && !self.tracker.uses(server, Protocol::Tcp) {
                self.transport.close(server, Protocol::Tcp);
            }
        }
    }

    fn drop_queries(&mut self, lookup: LookupId) {
        for id in self.tracker.ids_for_lookup(lookup) {
            self.tracker.remove(id);
            self.scheduler.cancel(id);
        }
        self.close_idle_tcp();
    }

    fn finish(&mut self, lookup: LookupId, completion: Completion) {
        let Some(entry) = self.lookups.remove(&lookup) else {
            return;
        };
        self.drop_queries(lookup);

        match &completion {
            Completion::Error(e) => debug!(%lookup, error = %e, "Lookup failed"),
            _ => debug!(%lookup, "Lookup complete"),
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ready.push_back(ReadyCompletion {
            seq,
            lookup,
            callback: entry.callback,
            completion,
        });
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Resolver {
    /// Readiness fd of the internal poller, for embedding in another event loop.
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        std::os::fd::AsRawFd::as_raw_fd(&self.transport)
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.closing = true;

        let mut outstanding: Vec<LookupId> = self.lookups.keys().copied().collect();
        outstanding.sort_unstable();
        for lookup in outstanding {
            self.finish(lookup, Completion::Error(DomainError::Destroyed));
        }
        while let Some(item) = self.ready.pop_front() {
            (item.callback)(self, item.completion);
        }
        self.transport.close_all();
    }
}
