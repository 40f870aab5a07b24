use super::addr::AddrLookup;
use super::{LookupContext, Step};
use ferrous_resolv_domain::wire::name::trim_root;
use ferrous_resolv_domain::{
    Completion, DomainError, Message, NameInfo, NameInfoFlags, NameInfoRequest, Question,
};
use std::net::SocketAddr;

/// Address and port to host and service names.
#[derive(Debug)]
pub(crate) struct NameInfoLookup {
    request: NameInfoRequest,
    service: Option<String>,
    inner: Option<AddrLookup>,
}

impl NameInfoLookup {
    pub(crate) fn new(request: NameInfoRequest) -> Self {
        Self {
            request,
            service: None,
            inner: None,
        }
    }

    pub(crate) fn start(&mut self, ctx: &LookupContext<'_>) -> Step {
        let flags = self.request.flags;
        if let Err(e) = flags.validate() {
            return Step::Complete(Completion::Error(e));
        }

        if flags.contains(NameInfoFlags::LOOKUPSERVICE) {
            self.service = Some(service_name(self.request.address.port(), flags, ctx));
        }
        if !flags.contains(NameInfoFlags::LOOKUPHOST) {
            return self.done(None);
        }
        if flags.contains(NameInfoFlags::NUMERICHOST) {
            return self.done(Some(numeric_host(&self.request.address)));
        }

        let mut inner = AddrLookup::new(self.request.address.ip());
        let step = inner.start(ctx);
        self.inner = Some(inner);
        self.map(ctx, step)
    }

    pub(crate) fn on_answer(
        &mut self,
        ctx: &LookupContext<'_>,
        question: &Question,
        result: Result<Message, DomainError>,
    ) -> Step {
        let Some(inner) = self.inner.as_mut() else {
            return Step::Wait;
        };
        let step = inner.on_answer(ctx, question, result);
        self.map(ctx, step)
    }

    fn map(&mut self, ctx: &LookupContext<'_>, step: Step) -> Step {
        let flags = self.request.flags;
        match step {
            Step::Complete(Completion::Address(entry)) => {
                let mut node = entry.name;
                if flags.contains(NameInfoFlags::NOFQDN) {
                    node = strip_local_domain(&node, &ctx.config.domains);
                }
                self.done(Some(node))
            }
            Step::Complete(Completion::Error(e))
                if e.is_negative_answer() && !flags.contains(NameInfoFlags::NAMEREQD) =>
            {
                self.done(Some(numeric_host(&self.request.address)))
            }
            other => other,
        }
    }

    fn done(&mut self, node: Option<String>) -> Step {
        Step::Complete(Completion::Service(NameInfo {
            node,
            service: self.service.take(),
        }))
    }
}

fn service_name(port: u16, flags: NameInfoFlags, ctx: &LookupContext<'_>) -> String {
    if flags.contains(NameInfoFlags::NUMERICSERV) {
        return port.to_string();
    }
    ctx.services
        .lookup(port, flags.protocol())
        .map(str::to_string)
        .unwrap_or_else(|| port.to_string())
}

/// Textual address; IPv6 scope ids are appended numerically.
pub(crate) fn numeric_host(addr: &SocketAddr) -> String {
    match addr {
        SocketAddr::V4(v4) => v4.ip().to_string(),
        SocketAddr::V6(v6) if v6.scope_id() != 0 => format!("{}%{}", v6.ip(), v6.scope_id()),
        SocketAddr::V6(v6) => v6.ip().to_string(),
    }
}

/// Drops the first search domain that is a suffix of `name`.
fn strip_local_domain(name: &str, domains: &[String]) -> String {
    for domain in domains {
        let domain = trim_root(domain);
        if domain.is_empty() || name.len() <= domain.len() + 1 {
            continue;
        }
        let split = name.len() - domain.len();
        if name.is_char_boundary(split)
            && name[split..].eq_ignore_ascii_case(domain)
            && name[..split].ends_with('.')
        {
            return name[..split - 1].to_string();
        }
    }
    name.to_string()
}
