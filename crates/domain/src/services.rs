//! Port to service-name table, in the format of `/etc/services`.

use crate::errors::DomainError;
use rustc_hash::FxHashMap;
use std::path::Path;

const BUILTIN: &[(u16, &str, &str)] = &[
    (7, "tcp", "echo"),
    (7, "udp", "echo"),
    (20, "tcp", "ftp-data"),
    (21, "tcp", "ftp"),
    (22, "tcp", "ssh"),
    (23, "tcp", "telnet"),
    (25, "tcp", "smtp"),
    (53, "tcp", "domain"),
    (53, "udp", "domain"),
    (67, "udp", "bootps"),
    (68, "udp", "bootpc"),
    (69, "udp", "tftp"),
    (80, "tcp", "http"),
    (88, "tcp", "kerberos"),
    (88, "udp", "kerberos"),
    (110, "tcp", "pop3"),
    (119, "tcp", "nntp"),
    (123, "udp", "ntp"),
    (143, "tcp", "imap2"),
    (161, "udp", "snmp"),
    (162, "udp", "snmp-trap"),
    (179, "tcp", "bgp"),
    (389, "tcp", "ldap"),
    (443, "tcp", "https"),
    (443, "udp", "https"),
    (465, "tcp", "submissions"),
    (514, "tcp", "shell"),
    (514, "udp", "syslog"),
    (587, "tcp", "submission"),
    (636, "tcp", "ldaps"),
    (853, "tcp", "domain-s"),
    (853, "udp", "domain-s"),
    (873, "tcp", "rsync"),
    (993, "tcp", "imaps"),
    (995, "tcp", "pop3s"),
    (1812, "udp", "radius"),
    (3306, "tcp", "mysql"),
    (5060, "tcp", "sip"),
    (5060, "udp", "sip"),
    (5353, "udp", "mdns"),
    (5432, "tcp", "postgresql"),
    (6379, "tcp", "redis"),
    (8080, "tcp", "http-alt"),
];

#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    by_port: FxHashMap<(u16, String), String>,
}

impl ServiceTable {
    pub fn builtin() -> Self {
        let by_port = BUILTIN
            .iter()
            .map(|(port, proto, name)| ((*port, proto.to_string()), name.to_string()))
            .collect();
        Self { by_port }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Parses `name port/proto [aliases...]` lines; the first entry for a port wins.
    pub fn parse(contents: &str) -> Self {
        let mut by_port = FxHashMap::default();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut words = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (words.next(), words.next()) else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                continue;
            };
            by_port
                .entry((port, proto.to_ascii_lowercase()))
                .or_insert_with(|| name.to_string());
        }

        Self { by_port }
    }

    pub fn lookup(&self, port: u16, protocol: &str) -> Option<&str> {
        self.by_port
            .get(&(port, protocol.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_port.is_empty()
    }
}
