use super::{RecordData, ResourceRecord};
use crate::dns_record::{RecordClass, RecordType};

/// Payload size advertised when none is configured.
pub const DEFAULT_EDNS_PAYLOAD: u16 = 1232;

/// EDNS(0) pseudo-record (RFC 6891). Options are not interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edns {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub dnssec_ok: bool,
}

impl Edns {
    pub fn new(udp_payload_size: u16) -> Self {
        Self {
            udp_payload_size,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
        }
    }

    pub fn to_record(&self) -> ResourceRecord {
        let mut ttl = (self.extended_rcode as u32) << 24 | (self.version as u32) << 16;
        if self.dnssec_ok {
            ttl |= 0x8000;
        }
        ResourceRecord {
            name: String::new(),
            rtype: RecordType::OPT,
            class: RecordClass::from_u16(self.udp_payload_size),
            ttl,
            data: RecordData::Other(Vec::new()),
        }
    }

    pub fn from_record(record: &ResourceRecord) -> Option<Self> {
        if record.rtype != RecordType::OPT {
            return None;
        }
        Some(Self {
            udp_payload_size: record.class.to_u16(),
            extended_rcode: (record.ttl >> 24) as u8,
            version: (record.ttl >> 16) as u8,
            dnssec_ok: record.ttl & 0x8000 != 0,
        })
    }
}
