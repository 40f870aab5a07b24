use super::query::Rotation;
use ferrous_resolv_domain::NameserverAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

const RTT_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Healthy,
    Demoted,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Nameserver {
    pub addr: NameserverAddr,
    pub status: ServerStatus,
    /// Smoothed round-trip time in milliseconds.
    pub rtt_ms: Option<f64>,
    pub consecutive_failures: u32,
    pub total_queries: u64,
    pub total_failures: u64,
}

impl Nameserver {
    fn penalty(&self) -> (bool, bool) {
        (self.status == ServerStatus::Demoted, self.consecutive_failures > 0)
    }

    fn rtt_rank(&self) -> f64 {
        self.rtt_ms.unwrap_or(f64::INFINITY)
    }

    fn new(addr: NameserverAddr) -> Self {
        Self {
            addr,
            status: ServerStatus::Unknown,
            rtt_ms: None,
            consecutive_failures: 0,
            total_queries: 0,
            total_failures: 0,
        }
    }
}

/// Configured servers plus the order new queries try them in.
#[derive(Debug)]
pub struct NameserverSet {
    servers: Vec<Nameserver>,
    order: Vec<usize>,
    failure_threshold: u32,
}

impl NameserverSet {
    pub fn new(addrs: &[NameserverAddr], failure_threshold: u32) -> Self {
        Self {
            servers: addrs.iter().copied().map(Nameserver::new).collect(),
            order: (0..addrs.len()).collect(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Nameserver> {
        self.servers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nameserver> {
        self.servers.iter()
    }

    /// Servers for a new query. Demoted servers go last, then servers with
    /// failures since their last answer; the rest are ordered by smoothed RTT,
    /// with unmeasured servers after measured ones. Ties keep the current order.
    /// `primary_only` pins the first configured server.
    pub fn rotation(&self, primary_only: bool) -> Rotation {
        if primary_only {
            return self.order.iter().copied().filter(|&i| i == 0).collect();
        }
        let mut rotation: Rotation = self.order.iter().copied().collect();
        rotation.sort_by(|&a, &b| {
            let (a, b) = (&self.servers[a], &self.servers[b]);
            a.penalty()
                .cmp(&b.penalty())
                .then_with(|| a.rtt_rank().total_cmp(&b.rtt_rank()))
        });
        rotation
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn mark_sent(&mut self, index: usize) {
        if let Some(server) = self.servers.get_mut(index) {
            server.total_queries += 1;
        }
    }

    pub fn mark_healthy(&mut self, index: usize, rtt: Option<Duration>) {
        let Some(server) = self.servers.get_mut(index) else {
            return;
        };
        server.consecutive_failures = 0;
        if let Some(rtt) = rtt {
            let sample = rtt.as_secs_f64() * 1000.0;
            server.rtt_ms = Some(match server.rtt_ms {
                Some(prev) => prev * (1.0 - RTT_WEIGHT) + sample * RTT_WEIGHT,
                None => sample,
            });
        }
        if server.status != ServerStatus::Healthy {
            debug!(server = %server.addr.udp, rtt_ms = ?server.rtt_ms, "Nameserver answering");
        }
        server.status = ServerStatus::Healthy;
    }

    /// Counts a failure; at the threshold the server moves to the back of the order.
    pub fn mark_failed(&mut self, index: usize, reason: &str) {
        let Some(server) = self.servers.get_mut(index) else {
            return;
        };
        server.consecutive_failures = server.consecutive_failures.saturating_add(1);
        server.total_failures += 1;
        debug!(
            server = %server.addr.udp,
            failures = server.consecutive_failures,
            reason,
            "Nameserver failure"
        );

        if server.consecutive_failures >= self.failure_threshold
            && server.status != ServerStatus::Demoted
        {
            warn!(server = %server.addr.udp, "Nameserver demoted");
            server.status = ServerStatus::Demoted;
            self.order.retain(|&i| i != index);
            self.order.push(index);
        }
    }

    /// Restores the configured order, e.g. after the network changed.
    pub fn reset(&mut self) {
        info!("Nameserver order reset");
        self.order = (0..self.servers.len()).collect();
        for server in &mut self.servers {
            server.status = ServerStatus::Unknown;
            server.consecutive_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<NameserverAddr> {
        (0..n)
            .map(|i| {
                let addr = format!("192.0.2.{}:53", i + 1).parse().unwrap();
                NameserverAddr { udp: addr, tcp: addr }
            })
            .collect()
    }

    #[test]
    fn test_rotation_starts_in_config_order() {
        let set = NameserverSet::new(&addrs(3), 3);
        assert_eq!(set.rotation(false).as_slice(), &[0, 1, 2]);
        assert_eq!(set.rotation(true).as_slice(), &[0]);
    }

    #[test]
    fn test_failing_server_moves_to_back() {
        let mut set = NameserverSet::new(&addrs(3), 2);
        set.mark_failed(0, "timeout");
        assert_eq!(set.order(), &[0, 1, 2]);
        set.mark_failed(0, "timeout");
        assert_eq!(set.order(), &[1, 2, 0]);
        assert_eq!(set.get(0).unwrap().status, ServerStatus::Demoted);

        // primary_only still targets the first configured server.
        assert_eq!(set.rotation(true).as_slice(), &[0]);
    }

    #[test]
    fn test_success_resets_failures_and_smooths_rtt() {
        let mut set = NameserverSet::new(&addrs(1), 3);
        set.mark_failed(0, "timeout");
        set.mark_healthy(0, Some(Duration::from_millis(100)));
        set.mark_healthy(0, Some(Duration::from_millis(200)));

        let server = set.get(0).unwrap();
        assert_eq!(server.consecutive_failures, 0);
        assert_eq!(server.total_failures, 1);
        let rtt = server.rtt_ms.unwrap();
        assert!((rtt - 130.0).abs() < 1e-6, "rtt {}", rtt);
    }

    #[test]
    fn test_rotation_prefers_lower_rtt() {
        let mut set = NameserverSet::new(&addrs(3), 3);
        set.mark_healthy(0, Some(Duration::from_millis(80)));
        set.mark_healthy(2, Some(Duration::from_millis(5)));
        assert_eq!(set.rotation(false).as_slice(), &[2, 0, 1]);

        // A failure since the last answer outweighs a fast history.
        set.mark_failed(2, "timeout");
        assert_eq!(set.rotation(false).as_slice(), &[0, 1, 2]);

        set.mark_healthy(2, Some(Duration::from_millis(5)));
        assert_eq!(set.rotation(false).as_slice(), &[2, 0, 1]);
        assert_eq!(set.rotation(true).as_slice(), &[0]);
    }

    #[test]
    fn test_reset_restores_order() {
        let mut set = NameserverSet::new(&addrs(2), 1);
        set.mark_failed(0, "refused");
        assert_eq!(set.order(), &[1, 0]);
        set.reset();
        assert_eq!(set.order(), &[0, 1]);
    }
}
