use super::{DecodeError, PacketReader, PacketWriter};
use std::fmt;

pub const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Query,
    IQuery,
    Status,
    Notify,
    Update,
    Unknown(u8),
}

impl Opcode {
    pub fn to_u8(self) -> u8 {
        match self {
            Opcode::Query => 0,
            Opcode::IQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Unknown(code) => code & 0x0F,
        }
    }

    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Opcode::Query,
            1 => Opcode::IQuery,
            2 => Opcode::Status,
            4 => Opcode::Notify,
            5 => Opcode::Update,
            other => Opcode::Unknown(other),
        }
    }
}

/// Response code, including the EDNS extended bits when an OPT record was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    NoError,
    FormErr,
    ServFail,
    NXDomain,
    NotImp,
    Refused,
    Unknown(u16),
}

impl ResponseCode {
    pub fn to_u16(self) -> u16 {
        match self {
            ResponseCode::NoError => 0,
            ResponseCode::FormErr => 1,
            ResponseCode::ServFail => 2,
            ResponseCode::NXDomain => 3,
            ResponseCode::NotImp => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Unknown(code) => code,
        }
    }

    pub fn from_u16(code: u16) -> Self {
        match code {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NXDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            other => ResponseCode::Unknown(other),
        }
    }

    /// Codes that say the server could not or would not answer, as opposed to an
    /// authoritative statement about the name.
    pub fn is_server_failure(self) -> bool {
        matches!(
            self,
            ResponseCode::ServFail | ResponseCode::NotImp | ResponseCode::Refused
        )
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "NOERROR"),
            ResponseCode::FormErr => write!(f, "FORMERR"),
            ResponseCode::ServFail => write!(f, "SERVFAIL"),
            ResponseCode::NXDomain => write!(f, "NXDOMAIN"),
            ResponseCode::NotImp => write!(f, "NOTIMP"),
            ResponseCode::Refused => write!(f, "REFUSED"),
            ResponseCode::Unknown(code) => write!(f, "RCODE{}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub response: bool,
    pub opcode: Opcode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    /// Low four bits only; see [`super::Message::rcode`] for the full value.
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            response: false,
            opcode: Opcode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: true,
            recursion_available: false,
            authentic_data: false,
            checking_disabled: false,
            rcode: 0,
            qdcount: 0,
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }

    pub fn read(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let id = reader.read_u16()?;
        let flags = reader.read_u16()?;

        Ok(Self {
            id,
            response: flags & 0x8000 != 0,
            opcode: Opcode::from_u8(((flags >> 11) & 0x0F) as u8),
            authoritative: flags & 0x0400 != 0,
            truncated: flags & 0x0200 != 0,
            recursion_desired: flags & 0x0100 != 0,
            recursion_available: flags & 0x0080 != 0,
            authentic_data: flags & 0x0020 != 0,
            checking_disabled: flags & 0x0010 != 0,
            rcode: (flags & 0x000F) as u8,
            qdcount: reader.read_u16()?,
            ancount: reader.read_u16()?,
            nscount: reader.read_u16()?,
            arcount: reader.read_u16()?,
        })
    }

    pub fn flags(&self) -> u16 {
        let mut flags = (self.opcode.to_u8() as u16) << 11 | (self.rcode & 0x0F) as u16;
        if self.response {
            flags |= 0x8000;
        }
        if self.authoritative {
            flags |= 0x0400;
        }
        if self.truncated {
            flags |= 0x0200;
        }
        if self.recursion_desired {
            flags |= 0x0100;
        }
        if self.recursion_available {
            flags |= 0x0080;
        }
        if self.authentic_data {
            flags |= 0x0020;
        }
        if self.checking_disabled {
            flags |= 0x0010;
        }
        flags
    }

    pub fn write(&self, writer: &mut PacketWriter) {
        writer.write_u16(self.id);
        writer.write_u16(self.flags());
        writer.write_u16(self.qdcount);
        writer.write_u16(self.ancount);
        writer.write_u16(self.nscount);
        writer.write_u16(self.arcount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_layout() {
        let mut header = Header::new(0xbeef);
        header.response = true;
        header.truncated = true;
        header.rcode = 3;
        assert_eq!(header.flags(), 0x8000 | 0x0200 | 0x0100 | 3);

        let mut writer = PacketWriter::new();
        header.write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);

        let parsed = Header::read(&mut PacketReader::new(&bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_short_header_is_truncated() {
        let bytes = [0u8; 11];
        assert_eq!(
            Header::read(&mut PacketReader::new(&bytes)),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_server_failure_codes() {
        assert!(ResponseCode::ServFail.is_server_failure());
        assert!(ResponseCode::Refused.is_server_failure());
        assert!(!ResponseCode::NXDomain.is_server_failure());
        assert_eq!(ResponseCode::from_u16(16).to_string(), "RCODE16");
    }
}
