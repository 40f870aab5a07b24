use ferrous_resolv_domain::wire::name::{names_eq, trim_root};
use ferrous_resolv_domain::wire::RecordData;
use ferrous_resolv_domain::{DomainError, Message, Question, ResponseCode};
use std::net::IpAddr;

/// Where a response leaves the question after walking its CNAME records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Chase {
    /// Records of the asked type owned by `canonical`.
    Found {
        canonical: String,
        aliases: Vec<String>,
        records: Vec<RecordData>,
    },
    /// The chain leaves this response; `target` has to be asked next.
    Follow {
        aliases: Vec<String>,
        target: String,
        depth: usize,
    },
}

/// Walks the answer section from the question name. `depth` counts CNAME hops
/// already taken by earlier responses of the same lookup.
pub(crate) fn follow_chain(
    msg: &Message,
    question: &Question,
    depth: usize,
    max_depth: usize,
) -> Result<Chase, DomainError> {
    if msg.rcode() == ResponseCode::NXDomain {
        return Err(DomainError::NameError);
    }

    let mut current = trim_root(&question.name).to_string();
    let mut aliases = Vec::new();
    let mut depth = depth;

    for _ in 0..=msg.answers.len() {
        let records: Vec<RecordData> = msg
            .answers
            .iter()
            .filter(|rr| {
                rr.rtype == question.qtype
                    && rr.class == question.qclass
                    && names_eq(&rr.name, &current)
            })
            .map(|rr| rr.data.clone())
            .collect();
        if !records.is_empty() {
            return Ok(Chase::Found {
                canonical: current,
                aliases,
                records,
            });
        }

        let next = msg.answers.iter().find_map(|rr| match &rr.data {
            RecordData::CNAME(target) if names_eq(&rr.name, &current) => Some(target.clone()),
            _ => None,
        });
        let Some(target) = next else {
            break;
        };

        depth += 1;
        if depth > max_depth {
            return Err(DomainError::CnameChainTooLong { max: max_depth });
        }
        aliases.push(std::mem::replace(&mut current, target));
    }

    if aliases.is_empty() {
        Err(DomainError::NoData)
    } else {
        Ok(Chase::Follow {
            aliases,
            target: current,
            depth,
        })
    }
}

pub(crate) fn addresses(records: &[RecordData]) -> Vec<IpAddr> {
    records
        .iter()
        .filter_map(|data| match data {
            RecordData::A(v4) => Some(IpAddr::V4(*v4)),
            RecordData::AAAA(v6) => Some(IpAddr::V6(*v6)),
            _ => None,
        })
        .collect()
}

pub(crate) fn pointer_names(records: &[RecordData]) -> Vec<String> {
    records
        .iter()
        .filter_map(|data| match data {
            RecordData::PTR(name) => Some(trim_root(name).to_string()),
            _ => None,
        })
        .collect()
}
