//! System resolver configuration (`/etc/resolv.conf`).

use crate::errors::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvConf {
    pub servers: Vec<SocketAddr>,
    pub search: Vec<String>,
    pub ndots: usize,
    pub timeout: Option<Duration>,
    pub attempts: Option<u32>,
    pub use_vc: bool,
    pub edns0: bool,
}

impl Default for ResolvConf {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            search: Vec::new(),
            ndots: 1,
            timeout: None,
            attempts: None,
            use_vc: false,
            edns0: false,
        }
    }
}

impl ResolvConf {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Lenient parser: unknown keywords, options and malformed addresses are ignored.
    pub fn parse(contents: &str) -> Self {
        let mut conf = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let mut words = line.split_whitespace();
            match words.next() {
                Some("nameserver") => {
                    if let Some(addr) = words.next().and_then(parse_nameserver) {
                        conf.servers.push(addr);
                    }
                }
                Some("domain") => {
                    if let Some(domain) = words.next() {
                        conf.search = vec![domain.trim_end_matches('.').to_string()];
                    }
                }
                Some("search") => {
                    conf.search = words.map(|w| w.trim_end_matches('.').to_string()).collect();
                }
                Some("options") => conf.parse_options(words),
                _ => {}
            }
        }

        conf
    }

    fn parse_options<'a>(&mut self, words: impl Iterator<Item = &'a str>) {
        for word in words {
            let (name, value) = match word.split_once(':') {
                Some((name, value)) => (name, value.parse::<u32>().ok()),
                None => (word, None),
            };
            match (name, value) {
                ("ndots", Some(n)) => self.ndots = n.min(15) as usize,
                ("timeout", Some(n)) => self.timeout = Some(Duration::from_secs(n as u64)),
                ("attempts", Some(n)) => self.attempts = Some(n.max(1)),
                ("use-vc", None) => self.use_vc = true,
                ("edns0", None) => self.edns0 = true,
                _ => {}
            }
        }
    }
}

fn parse_nameserver(word: &str) -> Option<SocketAddr> {
    // Link-local scope suffixes such as `fe80::1%eth0` are not supported.
    word.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, 53))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let conf = ResolvConf::parse(
            "# generated\n\
             nameserver 192.0.2.53\n\
             nameserver 2001:db8::53\n\
             nameserver bogus\n\
             search corp.example.com example.com.\n\
             options ndots:2 timeout:3 attempts:4 rotate edns0\n",
        );

        assert_eq!(conf.servers.len(), 2);
        assert_eq!(conf.servers[0], "192.0.2.53:53".parse().unwrap());
        assert_eq!(conf.search, vec!["corp.example.com", "example.com"]);
        assert_eq!(conf.ndots, 2);
        assert_eq!(conf.timeout, Some(Duration::from_secs(3)));
        assert_eq!(conf.attempts, Some(4));
        assert!(conf.edns0);
        assert!(!conf.use_vc);
    }

    #[test]
    fn test_domain_replaces_search() {
        let conf = ResolvConf::parse("search a.example b.example\ndomain c.example\n");
        assert_eq!(conf.search, vec!["c.example"]);
    }

    #[test]
    fn test_empty_file_defaults() {
        let conf = ResolvConf::parse("");
        assert!(conf.servers.is_empty());
        assert_eq!(conf.ndots, 1);
    }
}
