use super::{DecodeError, EncodeError, PacketReader, PacketWriter};
use crate::dns_record::{RecordClass, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    NS(String),
    PTR(String),
    MX {
        preference: u16,
        exchange: String,
    },
    TXT(Vec<Vec<u8>>),
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// Opaque RDATA for types without a dedicated parser, OPT included.
    Other(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: RecordType,
    pub class: RecordClass,
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn new(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        let rtype = match &data {
            RecordData::A(_) => RecordType::A,
            RecordData::AAAA(_) => RecordType::AAAA,
            RecordData::CNAME(_) => RecordType::CNAME,
            RecordData::NS(_) => RecordType::NS,
            RecordData::PTR(_) => RecordType::PTR,
            RecordData::MX { .. } => RecordType::MX,
            RecordData::TXT(_) => RecordType::TXT,
            RecordData::SOA { .. } => RecordType::SOA,
            RecordData::SRV { .. } => RecordType::SRV,
            RecordData::Other(_) => RecordType::Unknown(0),
        };
        Self {
            name: name.into(),
            rtype,
            class: RecordClass::IN,
            ttl,
            data,
        }
    }

    pub fn read(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_name()?;
        let rtype = RecordType::from_u16(reader.read_u16()?);
        let class = RecordClass::from_u16(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let rdlength = reader.read_u16()? as usize;

        let start = reader.pos();
        let end = start + rdlength;
        if end > reader.len() {
            return Err(DecodeError::Truncated);
        }

        let data = read_rdata(reader, rtype, rdlength, end)?;
        if reader.pos() != end {
            return Err(DecodeError::BadRdata);
        }

        Ok(Self {
            name,
            rtype,
            class,
            ttl,
            data,
        })
    }

    pub fn write(&self, writer: &mut PacketWriter) -> Result<(), EncodeError> {
        writer.write_name(&self.name, true)?;
        writer.write_u16(self.rtype.to_u16());
        writer.write_u16(self.class.to_u16());
        writer.write_u32(self.ttl);

        let len_pos = writer.len();
        writer.write_u16(0);
        let start = writer.len();

        match &self.data {
            RecordData::A(addr) => writer.write_bytes(&addr.octets()),
            RecordData::AAAA(addr) => writer.write_bytes(&addr.octets()),
            RecordData::CNAME(target) | RecordData::NS(target) | RecordData::PTR(target) => {
                writer.write_name(target, true)?
            }
            RecordData::MX {
                preference,
                exchange,
            } => {
                writer.write_u16(*preference);
                writer.write_name(exchange, true)?;
            }
            RecordData::TXT(strings) => {
                for s in strings {
                    let s = &s[..s.len().min(255)];
                    writer.write_u8(s.len() as u8);
                    writer.write_bytes(s);
                }
            }
            RecordData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                writer.write_name(mname, true)?;
                writer.write_name(rname, true)?;
                for v in [serial, refresh, retry, expire, minimum] {
                    writer.write_u32(*v);
                }
            }
            RecordData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                writer.write_u16(*priority);
                writer.write_u16(*weight);
                writer.write_u16(*port);
                writer.write_name(target, false)?;
            }
            RecordData::Other(bytes) => writer.write_bytes(bytes),
        }

        let rdlength = writer.len() - start;
        if rdlength > u16::MAX as usize {
            return Err(EncodeError::MessageTooLarge);
        }
        writer.set_u16(len_pos, rdlength as u16);
        Ok(())
    }
}

fn read_rdata(
    reader: &mut PacketReader<'_>,
    rtype: RecordType,
    rdlength: usize,
    end: usize,
) -> Result<RecordData, DecodeError> {
    let data = match rtype {
        RecordType::A => {
            if rdlength != 4 {
                return Err(DecodeError::BadRdata);
            }
            let b = reader.read_bytes(4)?;
            RecordData::A(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        }
        RecordType::AAAA => {
            if rdlength != 16 {
                return Err(DecodeError::BadRdata);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(reader.read_bytes(16)?);
            RecordData::AAAA(Ipv6Addr::from(octets))
        }
        RecordType::CNAME => RecordData::CNAME(reader.read_name()?),
        RecordType::NS => RecordData::NS(reader.read_name()?),
        RecordType::PTR => RecordData::PTR(reader.read_name()?),
        RecordType::MX => RecordData::MX {
            preference: reader.read_u16()?,
            exchange: reader.read_name()?,
        },
        RecordType::TXT => {
            let mut strings = Vec::new();
            while reader.pos() < end {
                let len = reader.read_u8()? as usize;
                if reader.pos() + len > end {
                    return Err(DecodeError::BadRdata);
                }
                strings.push(reader.read_bytes(len)?.to_vec());
            }
            RecordData::TXT(strings)
        }
        RecordType::SOA => RecordData::SOA {
            mname: reader.read_name()?,
            rname: reader.read_name()?,
            serial: reader.read_u32()?,
            refresh: reader.read_u32()?,
            retry: reader.read_u32()?,
            expire: reader.read_u32()?,
            minimum: reader.read_u32()?,
        },
        RecordType::SRV => RecordData::SRV {
            priority: reader.read_u16()?,
            weight: reader.read_u16()?,
            port: reader.read_u16()?,
            target: reader.read_name()?,
        },
        _ => RecordData::Other(reader.read_bytes(rdlength)?.to_vec()),
    };

    if reader.pos() > end {
        return Err(DecodeError::BadRdata);
    }
    Ok(data)
}
