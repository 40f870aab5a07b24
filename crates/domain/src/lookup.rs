use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::BitOr;
use std::str::FromStr;

/// Address family requested by a forward lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
    #[default]
    Unspec,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Shared family of `addrs`; `Unspec` when they mix families or are empty.
    pub fn of_all(addrs: &[IpAddr]) -> Self {
        let mut families = addrs.iter().map(Self::of);
        match families.next() {
            Some(first) if families.all(|f| f == first) => first,
            _ => AddressFamily::Unspec,
        }
    }

    pub fn admits(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Unspec => true,
            family => *family == Self::of(addr),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressFamily::Inet => "inet",
            AddressFamily::Inet6 => "inet6",
            AddressFamily::Unspec => "unspec",
        };
        f.write_str(s)
    }
}

impl FromStr for AddressFamily {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inet" | "ipv4" | "4" => Ok(AddressFamily::Inet),
            "inet6" | "ipv6" | "6" => Ok(AddressFamily::Inet6),
            "unspec" | "any" => Ok(AddressFamily::Unspec),
            other => Err(DomainError::BadFamily(other.to_string())),
        }
    }
}

/// Result of a forward or reverse host lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Canonical name, the end of any CNAME chain.
    pub name: String,
    /// Names traversed on the way to `name`, in query order.
    pub aliases: Vec<String>,
    /// Family of `addresses`; `Unspec` only when both families are present.
    pub family: AddressFamily,
    pub addresses: Vec<IpAddr>,
}

impl HostEntry {
    pub fn new(name: impl Into<String>, family: AddressFamily) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            family,
            addresses: Vec::new(),
        }
    }
}

/// Result of a service-name lookup. Either half is absent when not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameInfo {
    pub node: Option<String>,
    pub service: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NameInfoFlags(u16);

impl NameInfoFlags {
    pub const NOFQDN: Self = Self(1 << 0);
    pub const NUMERICHOST: Self = Self(1 << 1);
    pub const NAMEREQD: Self = Self(1 << 2);
    pub const NUMERICSERV: Self = Self(1 << 3);
    pub const TCP: Self = Self(1 << 4);
    pub const UDP: Self = Self(1 << 5);
    pub const SCTP: Self = Self(1 << 6);
    pub const DCCP: Self = Self(1 << 7);
    pub const NUMERICSCOPE: Self = Self(1 << 8);
    pub const LOOKUPHOST: Self = Self(1 << 9);
    pub const LOOKUPSERVICE: Self = Self(1 << 10);

    const PROTOCOLS: u16 = Self::TCP.0 | Self::UDP.0 | Self::SCTP.0 | Self::DCCP.0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, DomainError> {
        if bits >> 11 != 0 {
            return Err(DomainError::BadFlags(format!("unknown bits {:#x}", bits)));
        }
        Ok(Self(bits))
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Rejects contradictory or empty requests.
    pub fn validate(self) -> Result<(), DomainError> {
        if !self.contains(Self::LOOKUPHOST) && !self.contains(Self::LOOKUPSERVICE) {
            return Err(DomainError::BadFlags(
                "neither LOOKUPHOST nor LOOKUPSERVICE set".to_string(),
            ));
        }
        if self.contains(Self::NUMERICHOST) && self.contains(Self::NAMEREQD) {
            return Err(DomainError::BadFlags(
                "NUMERICHOST and NAMEREQD are mutually exclusive".to_string(),
            ));
        }
        if (self.0 & Self::PROTOCOLS).count_ones() > 1 {
            return Err(DomainError::BadFlags(
                "more than one protocol flag set".to_string(),
            ));
        }
        Ok(())
    }

    /// Protocol column used for the services table; TCP unless another is set.
    pub fn protocol(self) -> &'static str {
        if self.contains(Self::UDP) {
            "udp"
        } else if self.contains(Self::SCTP) {
            "sctp"
        } else if self.contains(Self::DCCP) {
            "dccp"
        } else {
            "tcp"
        }
    }
}

impl BitOr for NameInfoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameInfoRequest {
    pub address: SocketAddr,
    pub flags: NameInfoFlags,
}

impl NameInfoRequest {
    pub fn new(address: SocketAddr, flags: NameInfoFlags) -> Self {
        Self { address, flags }
    }
}

/// Terminal outcome of a lookup, handed to its callback exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Name(HostEntry),
    Address(HostEntry),
    Service(NameInfo),
    Error(DomainError),
}

impl Completion {
    pub fn is_error(&self) -> bool {
        matches!(self, Completion::Error(_))
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Completion::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn host_entry(&self) -> Option<&HostEntry> {
        match self {
            Completion::Name(entry) | Completion::Address(entry) => Some(entry),
            _ => None,
        }
    }
}
