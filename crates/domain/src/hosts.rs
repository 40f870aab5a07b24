//! Static host table in `/etc/hosts` format.

use crate::errors::DomainError;
use crate::lookup::{AddressFamily, HostEntry};
use crate::wire::name::names_eq;
use std::net::IpAddr;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HostLine {
    address: IpAddr,
    /// Canonical name first, then aliases.
    names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HostsFile {
    lines: Vec<HostLine>,
}

impl HostsFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Lines with an unparsable address or no names are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut lines = Vec::new();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("");
            let mut words = line.split_whitespace();
            let Some(Ok(address)) = words.next().map(str::parse::<IpAddr>) else {
                continue;
            };
            let names: Vec<String> = words.map(|w| w.trim_end_matches('.').to_string()).collect();
            if names.is_empty() {
                continue;
            }
            lines.push(HostLine { address, names });
        }

        Self { lines }
    }

    pub fn add(&mut self, address: IpAddr, name: impl Into<String>) {
        self.lines.push(HostLine {
            address,
            names: vec![name.into()],
        });
    }

    /// Collects every address of `family` listed for `name` (canonical or alias).
    pub fn lookup_name(&self, name: &str, family: AddressFamily) -> Option<HostEntry> {
        let mut entry: Option<HostEntry> = None;

        for line in &self.lines {
            if !family.admits(&line.address) || !line.names.iter().any(|n| names_eq(n, name)) {
                continue;
            }
            let entry = entry.get_or_insert_with(|| {
                let mut e = HostEntry::new(line.names[0].clone(), family);
                e.aliases = line.names[1..].to_vec();
                e
            });
            if !entry.addresses.contains(&line.address) {
                entry.addresses.push(line.address);
            }
        }

        entry.map(|mut entry| {
            entry.family = AddressFamily::of_all(&entry.addresses);
            entry
        })
    }

    pub fn lookup_addr(&self, address: &IpAddr) -> Option<HostEntry> {
        self.lines.iter().find(|l| l.address == *address).map(|line| {
            let mut entry = HostEntry::new(line.names[0].clone(), AddressFamily::of(address));
            entry.aliases = line.names[1..].to_vec();
            entry.addresses.push(*address);
            entry
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
