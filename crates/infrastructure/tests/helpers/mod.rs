#![allow(dead_code)]
mod dns_server_mock;

pub use dns_server_mock::*;

use ferrous_resolv_domain::ResolverConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Short timeouts, DNS only, no system files.
pub fn test_config(servers: &[SocketAddr]) -> ResolverConfig {
    ResolverConfig {
        servers: servers.iter().map(|s| s.to_string()).collect(),
        timeout_ms: 100,
        max_timeout_ms: 400,
        tries: 1,
        lookups: "b".to_string(),
        hosts_path: None,
        resolv_conf_path: "/nonexistent/resolv.conf".to_string(),
        ..ResolverConfig::default()
    }
}

/// A local port nothing listens on.
pub fn closed_port() -> SocketAddr {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

pub const SLOW_TEST_LIMIT: Duration = Duration::from_secs(5);
