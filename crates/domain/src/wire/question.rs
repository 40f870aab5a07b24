use super::name::names_eq;
use super::{DecodeError, EncodeError, PacketReader, PacketWriter};
use crate::dns_record::{RecordClass, RecordType};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl Question {
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            name: name.into(),
            qtype,
            qclass: RecordClass::IN,
        }
    }

    pub fn read(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_name()?;
        let qtype = RecordType::from_u16(reader.read_u16()?);
        let qclass = RecordClass::from_u16(reader.read_u16()?);
        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }

    pub fn write(&self, writer: &mut PacketWriter) -> Result<(), EncodeError> {
        writer.write_name(&self.name, true)?;
        writer.write_u16(self.qtype.to_u16());
        writer.write_u16(self.qclass.to_u16());
        Ok(())
    }

    /// Same name (case-insensitive), type and class.
    pub fn matches(&self, other: &Question) -> bool {
        self.qtype == other.qtype && self.qclass == other.qclass && names_eq(&self.name, &other.name)
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}
