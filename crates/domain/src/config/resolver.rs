use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::errors::ConfigError;
use crate::aliases::HOSTALIASES_ENV;
use crate::resolv_conf::{ResolvConf, DEFAULT_RESOLV_CONF};

/// Behaviour switches, one per resolver init flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverFlags {
    /// Send every query over TCP.
    #[serde(default)]
    pub use_tcp: bool,

    /// Only ever query the first nameserver.
    #[serde(default)]
    pub primary_only: bool,

    /// Accept truncated UDP answers instead of retrying over TCP.
    #[serde(default)]
    pub ignore_truncation: bool,

    /// Clear the RD bit on outgoing queries.
    #[serde(default)]
    pub no_recurse: bool,

    /// Keep TCP connections open after their last query finishes.
    #[serde(default)]
    pub stay_open: bool,

    /// Never expand names with the search list.
    #[serde(default)]
    pub no_search: bool,

    /// Report SERVFAIL, NOTIMP and REFUSED instead of trying the next server.
    #[serde(default)]
    pub no_check_response: bool,

    /// Ignore the `HOSTALIASES` file.
    #[serde(default)]
    pub no_aliases: bool,
}

/// UDP and TCP endpoints of one nameserver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameserverAddr {
    pub udp: SocketAddr,
    pub tcp: SocketAddr,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// `ip`, `ip:port` or `[ipv6]:port`. Empty means use the system configuration.
    #[serde(default)]
    pub servers: Vec<String>,

    #[serde(default = "default_port")]
    pub udp_port: u16,

    #[serde(default = "default_port")]
    pub tcp_port: u16,

    /// First attempt timeout; doubles per attempt up to `max_timeout_ms`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Attempts per nameserver.
    #[serde(default = "default_tries")]
    pub tries: u32,

    #[serde(default = "default_ndots")]
    pub ndots: usize,

    /// Search list.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Source order: `f` hosts file, `b` DNS.
    #[serde(default = "default_lookups")]
    pub lookups: String,

    #[serde(default = "default_hosts_path")]
    pub hosts_path: Option<String>,

    /// Falls back to the built-in table when unset or unreadable.
    #[serde(default)]
    pub services_path: Option<String>,

    #[serde(default = "default_resolv_conf_path")]
    pub resolv_conf_path: String,

    /// Alias file for single-label names; taken from `HOSTALIASES` when unset.
    #[serde(default)]
    pub aliases_path: Option<String>,

    /// Advertised EDNS(0) payload size; 0 disables EDNS.
    #[serde(default = "default_edns_payload_size")]
    pub edns_payload_size: u16,

    /// Consecutive failures before a nameserver is moved to the back.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_max_cname_depth")]
    pub max_cname_depth: usize,

    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    #[serde(default)]
    pub flags: ResolverFlags,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            udp_port: default_port(),
            tcp_port: default_port(),
            timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            tries: default_tries(),
            ndots: default_ndots(),
            domains: Vec::new(),
            lookups: default_lookups(),
            hosts_path: default_hosts_path(),
            services_path: None,
            resolv_conf_path: default_resolv_conf_path(),
            aliases_path: None,
            edns_payload_size: default_edns_payload_size(),
            failure_threshold: default_failure_threshold(),
            max_cname_depth: default_max_cname_depth(),
            recv_buffer_size: default_recv_buffer_size(),
            flags: ResolverFlags::default(),
        }
    }
}

impl ResolverConfig {
    pub fn with_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    pub fn edns_payload(&self) -> Option<u16> {
        (self.edns_payload_size > 0).then_some(self.edns_payload_size.max(512))
    }

    pub fn uses_hosts_file(&self) -> bool {
        self.lookups.contains('f')
    }

    pub fn uses_dns(&self) -> bool {
        self.lookups.contains('b')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tries == 0 {
            return Err(ConfigError::Validation("tries must be at least 1".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation("timeout_ms cannot be 0".to_string()));
        }
        if self.max_timeout_ms < self.timeout_ms {
            return Err(ConfigError::Validation(
                "max_timeout_ms must not be below timeout_ms".to_string(),
            ));
        }
        if self.lookups.is_empty() || self.lookups.chars().any(|c| c != 'f' && c != 'b') {
            return Err(ConfigError::Validation(format!(
                "lookups '{}' must be a non-empty combination of 'f' and 'b'",
                self.lookups
            )));
        }
        if self.max_cname_depth == 0 {
            return Err(ConfigError::Validation(
                "max_cname_depth must be at least 1".to_string(),
            ));
        }
        if self.udp_port == 0 || self.tcp_port == 0 {
            return Err(ConfigError::Validation("ports cannot be 0".to_string()));
        }
        for server in &self.servers {
            parse_server_addr(server, self.udp_port, self.tcp_port)?;
        }
        Ok(())
    }

    /// Fills servers, search list and options from the system resolver configuration
    /// when no servers are configured explicitly. A missing file is not an error.
    pub fn with_system_defaults(mut self) -> Self {
        if self.aliases_path.is_none() && !self.flags.no_aliases {
            self.aliases_path = std::env::var(HOSTALIASES_ENV).ok().filter(|p| !p.is_empty());
        }
        if self.servers.is_empty() {
            if let Ok(conf) = ResolvConf::load(&self.resolv_conf_path) {
                self.apply_resolv_conf(&conf);
            }
        }
        self
    }

    pub fn apply_resolv_conf(&mut self, conf: &ResolvConf) {
        if !self.servers.is_empty() {
            return;
        }
        self.servers = conf.servers.iter().map(|s| s.ip().to_string()).collect();
        if self.domains.is_empty() {
            self.domains = conf.search.clone();
        }
        self.ndots = conf.ndots;
        if let Some(timeout) = conf.timeout {
            self.timeout_ms = timeout.as_millis() as u64;
            self.max_timeout_ms = self.max_timeout_ms.max(self.timeout_ms);
        }
        if let Some(attempts) = conf.attempts {
            self.tries = attempts;
        }
        if conf.use_vc {
            self.flags.use_tcp = true;
        }
    }

    /// Parsed nameserver endpoints; `127.0.0.1` when nothing is configured.
    pub fn nameserver_addrs(&self) -> Result<Vec<NameserverAddr>, ConfigError> {
        if self.servers.is_empty() {
            let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
            return Ok(vec![NameserverAddr {
                udp: SocketAddr::new(ip, self.udp_port),
                tcp: SocketAddr::new(ip, self.tcp_port),
            }]);
        }

        self.servers
            .iter()
            .map(|s| parse_server_addr(s, self.udp_port, self.tcp_port))
            .collect()
    }
}

/// Parses a server entry. An explicit port applies to both protocols.
pub fn parse_server_addr(
    s: &str,
    udp_port: u16,
    tcp_port: u16,
) -> Result<NameserverAddr, ConfigError> {
    let s = s.trim();

    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok(NameserverAddr {
            udp: SocketAddr::new(ip, udp_port),
            tcp: SocketAddr::new(ip, tcp_port),
        });
    }

    let (host, port) = parse_host_port(s).ok_or_else(|| ConfigError::InvalidServer(s.to_string()))?;
    let ip = host
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidServer(s.to_string()))?;
    let addr = SocketAddr::new(ip, port);
    Ok(NameserverAddr { udp: addr, tcp: addr })
}

fn parse_host_port(s: &str) -> Option<(&str, u16)> {
    if s.starts_with('[') {
        let end = s.find(']')?;
        let host = &s[1..end];
        let rest = &s[end + 1..];
        let port = match rest.strip_prefix(':') {
            Some(port_str) => port_str.parse::<u16>().ok()?,
            None if rest.is_empty() => 53,
            None => return None,
        };
        Some((host, port))
    } else {
        let (host, port_str) = s.rsplit_once(':')?;
        let port = port_str.parse::<u16>().ok()?;
        Some((host, port))
    }
}

fn default_port() -> u16 {
    53
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_max_timeout_ms() -> u64 {
    10_000
}

fn default_tries() -> u32 {
    3
}

fn default_ndots() -> usize {
    1
}

fn default_lookups() -> String {
    "fb".to_string()
}

fn default_hosts_path() -> Option<String> {
    Some("/etc/hosts".to_string())
}

fn default_resolv_conf_path() -> String {
    DEFAULT_RESOLV_CONF.to_string()
}

fn default_edns_payload_size() -> u16 {
    1232
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_max_cname_depth() -> usize {
    8
}

fn default_recv_buffer_size() -> usize {
    256 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_forms() {
        let plain = parse_server_addr("192.0.2.1", 53, 5353).unwrap();
        assert_eq!(plain.udp, "192.0.2.1:53".parse().unwrap());
        assert_eq!(plain.tcp, "192.0.2.1:5353".parse().unwrap());

        let with_port = parse_server_addr("192.0.2.1:1053", 53, 53).unwrap();
        assert_eq!(with_port.udp.port(), 1053);
        assert_eq!(with_port.tcp.port(), 1053);

        let v6 = parse_server_addr("[2001:db8::1]:5300", 53, 53).unwrap();
        assert_eq!(v6.udp, "[2001:db8::1]:5300".parse().unwrap());

        let bare_v6 = parse_server_addr("2001:db8::1", 53, 53).unwrap();
        assert_eq!(bare_v6.udp.port(), 53);

        assert!(parse_server_addr("dns.example.com:53", 53, 53).is_err());
        assert!(parse_server_addr("192.0.2.1:notaport", 53, 53).is_err());
    }

    #[test]
    fn test_default_nameserver_is_localhost() {
        let config = ResolverConfig::default();
        let addrs = config.nameserver_addrs().unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].udp, "127.0.0.1:53".parse().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ResolverConfig::default();
        assert!(config.validate().is_ok());

        config.lookups = "fx".to_string();
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.max_timeout_ms = 100;
        assert!(config.validate().is_err());

        let config = ResolverConfig::with_servers(["not an address"]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidServer(_))));
    }

    #[test]
    fn test_edns_payload_floor() {
        let mut config = ResolverConfig::default();
        assert_eq!(config.edns_payload(), Some(1232));
        config.edns_payload_size = 100;
        assert_eq!(config.edns_payload(), Some(512));
        config.edns_payload_size = 0;
        assert_eq!(config.edns_payload(), None);
    }

    #[test]
    fn test_resolv_conf_only_fills_when_no_servers() {
        let conf = ResolvConf::parse("nameserver 192.0.2.53\nsearch example.com\noptions ndots:3\n");

        let mut system = ResolverConfig::default();
        system.apply_resolv_conf(&conf);
        assert_eq!(system.servers, vec!["192.0.2.53"]);
        assert_eq!(system.domains, vec!["example.com"]);
        assert_eq!(system.ndots, 3);

        let mut explicit = ResolverConfig::with_servers(["198.51.100.1"]);
        explicit.apply_resolv_conf(&conf);
        assert_eq!(explicit.servers, vec!["198.51.100.1"]);
        assert_eq!(explicit.ndots, 1);
    }
}
