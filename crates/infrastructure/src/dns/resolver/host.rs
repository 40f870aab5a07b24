use super::answer::{addresses, follow_chain, Chase};
use super::{LookupContext, Source, Step};
use ferrous_resolv_domain::wire::name::{canonical_name, parse_labels, trim_root};
use ferrous_resolv_domain::{
    AddressFamily, Completion, DomainError, HostEntry, Message, Question, RecordType,
};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::net::IpAddr;
use tracing::debug;

/// One address type being resolved for the current candidate name.
#[derive(Debug)]
struct TypeQuery {
    qtype: RecordType,
    depth: usize,
    aliases: Vec<String>,
    outcome: Option<Result<(String, Vec<IpAddr>), DomainError>>,
}

impl TypeQuery {
    fn new(qtype: RecordType) -> Self {
        Self {
            qtype,
            depth: 0,
            aliases: Vec::new(),
            outcome: None,
        }
    }
}

/// Forward lookup: sources in configured order, search list, A and AAAA.
#[derive(Debug)]
pub(crate) struct HostLookup {
    name: String,
    family: AddressFamily,
    sources: VecDeque<Source>,
    candidates: VecDeque<String>,
    queries: SmallVec<[TypeQuery; 2]>,
    best_error: Option<DomainError>,
}

impl HostLookup {
    pub(crate) fn new(name: &str, family: AddressFamily) -> Self {
        Self {
            name: name.trim().to_string(),
            family,
            sources: VecDeque::new(),
            candidates: VecDeque::new(),
            queries: SmallVec::new(),
            best_error: None,
        }
    }

    pub(crate) fn start(&mut self, ctx: &LookupContext<'_>) -> Step {
        if let Ok(addr) = self.name.parse::<IpAddr>() {
            return Step::Complete(self.literal(addr));
        }
        if self.name.is_empty() || trim_root(&self.name).is_empty() {
            return Step::Complete(Completion::Error(DomainError::BadName(self.name.clone())));
        }
        if let Err(e) = canonical_name(&self.name) {
            return Step::Complete(Completion::Error(DomainError::BadName(format!(
                "{}: {}",
                self.name, e
            ))));
        }

        self.sources = Source::parse_order(&ctx.config.lookups);
        self.next_source(ctx)
    }

    fn literal(&self, addr: IpAddr) -> Completion {
        if !self.family.admits(&addr) {
            return Completion::Error(DomainError::BadFamily(format!(
                "{} is not an {} address",
                addr, self.family
            )));
        }
        let mut entry = HostEntry::new(self.name.clone(), AddressFamily::of(&addr));
        entry.addresses.push(addr);
        Completion::Name(entry)
    }

    fn next_source(&mut self, ctx: &LookupContext<'_>) -> Step {
        while let Some(source) = self.sources.pop_front() {
            match source {
                Source::Files => {
                    if let Some(entry) = ctx.hosts.lookup_name(&self.name, self.family) {
                        debug!(name = %self.name, "Answered from hosts file");
                        return Step::Complete(Completion::Name(entry));
                    }
                }
                Source::Dns => {
                    self.candidates = search_candidates(&self.name, ctx);
                    return self.next_candidate(ctx);
                }
            }
        }
        Step::Complete(Completion::Error(
            self.best_error.take().unwrap_or(DomainError::NameError),
        ))
    }

    fn next_candidate(&mut self, ctx: &LookupContext<'_>) -> Step {
        let Some(candidate) = self.candidates.pop_front() else {
            return self.next_source(ctx);
        };

        let types: &[RecordType] = match self.family {
            AddressFamily::Inet => &[RecordType::A],
            AddressFamily::Inet6 => &[RecordType::AAAA],
            AddressFamily::Unspec => &[RecordType::A, RecordType::AAAA],
        };
        self.queries = types.iter().copied().map(TypeQuery::new).collect();
        Step::Send(
            types
                .iter()
                .map(|&qtype| Question::new(candidate.clone(), qtype))
                .collect(),
        )
    }

    pub(crate) fn on_answer(
        &mut self,
        ctx: &LookupContext<'_>,
        question: &Question,
        result: Result<Message, DomainError>,
    ) -> Step {
        let Some(query) = self
            .queries
            .iter_mut()
            .find(|q| q.qtype == question.qtype && q.outcome.is_none())
        else {
            return Step::Wait;
        };

        let outcome = result.and_then(|msg| {
            follow_chain(&msg, question, query.depth, ctx.config.max_cname_depth)
        });
        match outcome {
            Ok(Chase::Found {
                canonical,
                aliases,
                records,
            }) => {
                query.aliases.extend(aliases);
                query.outcome = Some(Ok((canonical, addresses(&records))));
            }
            Ok(Chase::Follow {
                aliases,
                target,
                depth,
            }) => {
                query.aliases.extend(aliases);
                query.depth = depth;
                return Step::Send(vec![Question::new(target, query.qtype)]);
            }
            Err(e) => query.outcome = Some(Err(e)),
        }

        if self.queries.iter().all(|q| q.outcome.is_some()) {
            self.evaluate(ctx)
        } else {
            Step::Wait
        }
    }

    fn evaluate(&mut self, ctx: &LookupContext<'_>) -> Step {
        let queries = std::mem::take(&mut self.queries);

        let mut entry: Option<HostEntry> = None;
        let mut hard_error = None;
        let mut negative = None;
        for query in queries {
            match query.outcome {
                Some(Ok((canonical, addrs))) => {
                    let entry = entry.get_or_insert_with(|| {
                        let mut e = HostEntry::new(canonical, self.family);
                        e.aliases = query.aliases.clone();
                        e
                    });
                    for alias in query.aliases {
                        if !entry.aliases.contains(&alias) {
                            entry.aliases.push(alias);
                        }
                    }
                    entry.addresses.extend(addrs);
                }
                Some(Err(e)) if e.is_negative_answer() => negative = merge_negative(negative, e),
                Some(Err(e)) => {
                    hard_error.get_or_insert(e);
                }
                None => {}
            }
        }

        if let Some(mut entry) = entry {
            entry.family = AddressFamily::of_all(&entry.addresses);
            return Step::Complete(Completion::Name(entry));
        }
        if let Some(e) = hard_error {
            return Step::Complete(Completion::Error(e));
        }
        if let Some(e) = negative {
            self.best_error = merge_negative(self.best_error.take(), e);
        }
        self.next_candidate(ctx)
    }
}

/// NoData wins over NameError: some candidate existed.
fn merge_negative(current: Option<DomainError>, new: DomainError) -> Option<DomainError> {
    match current {
        Some(DomainError::NoData) => Some(DomainError::NoData),
        _ => Some(new),
    }
}

/// Names to try, in order, for a relative or absolute `name`, in the text form
/// the decoder produces. Candidates too long to encode are skipped.
pub(crate) fn search_candidates(name: &str, ctx: &LookupContext<'_>) -> VecDeque<String> {
    let config = ctx.config;
    let canonical = |names: Vec<String>| -> VecDeque<String> {
        names
            .iter()
            .filter_map(|n| canonical_name(n).ok())
            .filter(|n| !n.is_empty())
            .collect()
    };

    if name.ends_with('.') && !name.ends_with("\\.") {
        return canonical(vec![name.to_string()]);
    }

    let labels = parse_labels(name).map(|l| l.len()).unwrap_or(0);
    if labels == 1 && !config.flags.no_aliases {
        if let Some(target) = ctx.aliases.lookup(name) {
            debug!(name, target, "Name rewritten by host alias");
            return canonical(vec![target.to_string()]);
        }
    }

    if config.flags.no_search || config.domains.is_empty() {
        return canonical(vec![name.to_string()]);
    }

    let dots = labels.saturating_sub(1);
    let expanded = config
        .domains
        .iter()
        .map(|domain| trim_root(domain))
        .filter(|domain| !domain.is_empty())
        .map(|domain| format!("{}.{}", name, domain));

    let mut candidates = Vec::new();
    if dots >= config.ndots {
        candidates.push(name.to_string());
        candidates.extend(expanded);
    } else {
        candidates.extend(expanded);
        candidates.push(name.to_string());
    }
    canonical(candidates)
}
