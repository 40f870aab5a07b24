use std::fmt::Write as _;
use std::net::IpAddr;

/// PTR owner name for an address: reversed octets under `in-addr.arpa`, or reversed
/// nibbles under `ip6.arpa`.
pub fn reverse_name(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                let _ = write!(name, "{:x}.{:x}.", byte & 0x0F, byte >> 4);
            }
            name.push_str("ip6.arpa");
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_reverse() {
        let addr: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(reverse_name(&addr), "8.8.8.8.in-addr.arpa");

        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        assert_eq!(reverse_name(&addr), "1.2.0.192.in-addr.arpa");
    }

    #[test]
    fn test_ipv6_reverse() {
        let addr: IpAddr = "2001:db8::567:89ab".parse().unwrap();
        assert_eq!(
            reverse_name(&addr),
            "b.a.9.8.7.6.5.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa"
        );
    }
}
