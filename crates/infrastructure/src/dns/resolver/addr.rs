use super::answer::{follow_chain, pointer_names, Chase};
use super::{LookupContext, Source, Step};
use ferrous_resolv_domain::{
    reverse_name, AddressFamily, Completion, DomainError, HostEntry, Message, Question,
    RecordType,
};
use std::collections::VecDeque;
use std::net::IpAddr;
use tracing::debug;

/// Reverse lookup of one address through the hosts file and PTR records.
#[derive(Debug)]
pub(crate) struct AddrLookup {
    addr: IpAddr,
    sources: VecDeque<Source>,
    depth: usize,
    aliases: Vec<String>,
    best_error: Option<DomainError>,
}

impl AddrLookup {
    pub(crate) fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            sources: VecDeque::new(),
            depth: 0,
            aliases: Vec::new(),
            best_error: None,
        }
    }

    pub(crate) fn start(&mut self, ctx: &LookupContext<'_>) -> Step {
        self.sources = Source::parse_order(&ctx.config.lookups);
        self.next_source(ctx)
    }

    fn next_source(&mut self, ctx: &LookupContext<'_>) -> Step {
        while let Some(source) = self.sources.pop_front() {
            match source {
                Source::Files => {
                    if let Some(entry) = ctx.hosts.lookup_addr(&self.addr) {
                        debug!(addr = %self.addr, "Answered from hosts file");
                        return Step::Complete(Completion::Address(entry));
                    }
                }
                Source::Dns => {
                    self.depth = 0;
                    self.aliases.clear();
                    return Step::Send(vec![Question::new(
                        reverse_name(&self.addr),
                        RecordType::PTR,
                    )]);
                }
            }
        }
        Step::Complete(Completion::Error(
            self.best_error.take().unwrap_or(DomainError::NameError),
        ))
    }

    pub(crate) fn on_answer(
        &mut self,
        ctx: &LookupContext<'_>,
        question: &Question,
        result: Result<Message, DomainError>,
    ) -> Step {
        if question.qtype != RecordType::PTR {
            return Step::Wait;
        }

        let outcome = result
            .and_then(|msg| follow_chain(&msg, question, self.depth, ctx.config.max_cname_depth));
        match outcome {
            Ok(Chase::Found { aliases, records, .. }) => {
                self.aliases.extend(aliases);
                let mut names = pointer_names(&records).into_iter();
                let Some(name) = names.next() else {
                    return self.negative(ctx, DomainError::NoData);
                };
                let mut entry = HostEntry::new(name, AddressFamily::of(&self.addr));
                entry.aliases = std::mem::take(&mut self.aliases);
                entry.aliases.extend(names);
                entry.addresses.push(self.addr);
                Step::Complete(Completion::Address(entry))
            }
            Ok(Chase::Follow {
                aliases,
                target,
                depth,
            }) => {
                self.aliases.extend(aliases);
                self.depth = depth;
                Step::Send(vec![Question::new(target, RecordType::PTR)])
            }
            Err(e) if e.is_negative_answer() => self.negative(ctx, e),
            Err(e) => Step::Complete(Completion::Error(e)),
        }
    }

    fn negative(&mut self, ctx: &LookupContext<'_>, error: DomainError) -> Step {
        if !matches!(self.best_error, Some(DomainError::NoData)) {
            self.best_error = Some(error);
        }
        self.next_source(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrous_resolv_domain::wire::{QueryOptions, RecordData, ResourceRecord};
    use ferrous_resolv_domain::{HostAliases, HostsFile, ResolverConfig, ServiceTable};

    fn ptr_answer(question: &Question, targets: &[&str]) -> Message {
        let query = Message::query(1, question.clone(), &QueryOptions::default());
        let mut msg = Message::response_to(&query);
        msg.answers = targets
            .iter()
            .map(|t| ResourceRecord::new(question.name.clone(), 60, RecordData::PTR(t.to_string())))
            .collect();
        msg
    }

    #[test]
    fn test_ptr_answer_builds_entry() {
        let config = ResolverConfig {
            lookups: "b".to_string(),
            ..ResolverConfig::default()
        };
        let hosts = HostsFile::new();
        let services = ServiceTable::builtin();
        let aliases = HostAliases::new();
        let ctx = LookupContext {
            config: &config,
            hosts: &hosts,
            aliases: &aliases,
            services: &services,
        };

        let addr: IpAddr = "8.8.8.8".parse().unwrap();
        let mut lookup = AddrLookup::new(addr);
        let Step::Send(questions) = lookup.start(&ctx) else {
            panic!("expected a PTR query");
        };
        assert_eq!(questions[0].name, "8.8.8.8.in-addr.arpa");

        let msg = ptr_answer(&questions[0], &["dns.google.", "alias.google"]);
        let Step::Complete(Completion::Address(entry)) = lookup.on_answer(&ctx, &questions[0], Ok(msg))
        else {
            panic!("expected an entry");
        };
        assert_eq!(entry.name, "dns.google");
        assert_eq!(entry.aliases, vec!["alias.google"]);
        assert_eq!(entry.addresses, vec![addr]);
    }

    #[test]
    fn test_classless_delegation_cname_becomes_alias() {
        let config = ResolverConfig {
            lookups: "b".to_string(),
            ..ResolverConfig::default()
        };
        let hosts = HostsFile::new();
        let services = ServiceTable::builtin();
        let aliases = HostAliases::new();
        let ctx = LookupContext {
            config: &config,
            hosts: &hosts,
            aliases: &aliases,
            services: &services,
        };

        let addr: IpAddr = "192.0.2.5".parse().unwrap();
        let mut lookup = AddrLookup::new(addr);
        let Step::Send(questions) = lookup.start(&ctx) else {
            panic!("expected a PTR query");
        };

        let query = Message::query(1, questions[0].clone(), &QueryOptions::default());
        let mut hop = Message::response_to(&query);
        hop.answers.push(ResourceRecord::new(
            questions[0].name.clone(),
            60,
            RecordData::CNAME("5.0-63.2.0.192.in-addr.arpa".to_string()),
        ));
        let Step::Send(next) = lookup.on_answer(&ctx, &questions[0], Ok(hop)) else {
            panic!("expected the CNAME target to be queried");
        };
        assert_eq!(next[0].name, "5.0-63.2.0.192.in-addr.arpa");

        let msg = ptr_answer(&next[0], &["web.example.net"]);
        let Step::Complete(Completion::Address(entry)) = lookup.on_answer(&ctx, &next[0], Ok(msg))
        else {
            panic!("expected an entry");
        };
        assert_eq!(entry.name, "web.example.net");
        assert_eq!(entry.aliases, vec!["5.2.0.192.in-addr.arpa"]);
    }

    #[test]
    fn test_hosts_file_then_nxdomain() {
        let config = ResolverConfig::default();
        let mut hosts = HostsFile::new();
        let known: IpAddr = "10.1.1.1".parse().unwrap();
        hosts.add(known, "router.lan");
        let services = ServiceTable::builtin();
        let aliases = HostAliases::new();
        let ctx = LookupContext {
            config: &config,
            hosts: &hosts,
            aliases: &aliases,
            services: &services,
        };

        let mut lookup = AddrLookup::new(known);
        assert!(matches!(lookup.start(&ctx), Step::Complete(Completion::Address(_))));

        let mut lookup = AddrLookup::new("10.9.9.9".parse().unwrap());
        let Step::Send(questions) = lookup.start(&ctx) else {
            panic!("expected a PTR query");
        };
        let step = lookup.on_answer(&ctx, &questions[0], Err(DomainError::NameError));
        assert!(matches!(step, Step::Complete(Completion::Error(DomainError::NameError))));
    }
}
