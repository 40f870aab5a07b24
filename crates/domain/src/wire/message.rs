use super::header::HEADER_LEN;
use super::{
    DecodeError, Edns, EncodeError, Header, PacketReader, PacketWriter, Question, ResourceRecord,
    ResponseCode,
};

/// Largest message that fits a TCP length prefix.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

/// How an outgoing query is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub recursion_desired: bool,
    /// `Some` attaches an OPT record advertising that payload size.
    pub edns_payload_size: Option<u16>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            recursion_desired: true,
            edns_payload_size: None,
        }
    }
}

impl Message {
    pub fn query(id: u16, question: Question, options: &QueryOptions) -> Self {
        let mut header = Header::new(id);
        header.recursion_desired = options.recursion_desired;

        let mut message = Self {
            header,
            questions: vec![question],
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        };
        if let Some(size) = options.edns_payload_size {
            message.additionals.push(Edns::new(size).to_record());
        }
        message
    }

    /// Empty response echoing the id, question and RD bit of `query`.
    pub fn response_to(query: &Message) -> Self {
        let mut header = Header::new(query.header.id);
        header.response = true;
        header.recursion_desired = query.header.recursion_desired;
        header.recursion_available = true;
        Self {
            header,
            questions: query.questions.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn edns(&self) -> Option<Edns> {
        self.additionals.iter().find_map(Edns::from_record)
    }

    /// Full response code, merging the OPT extended bits when present.
    pub fn rcode(&self) -> ResponseCode {
        let high = self.edns().map(|e| e.extended_rcode as u16).unwrap_or(0);
        ResponseCode::from_u16(high << 4 | self.header.rcode as u16)
    }

    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = (rcode.to_u16() & 0x0F) as u8;
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut header = self.header;
        header.qdcount = section_len(self.questions.len())?;
        header.ancount = section_len(self.answers.len())?;
        header.nscount = section_len(self.authorities.len())?;
        header.arcount = section_len(self.additionals.len())?;

        let mut writer = PacketWriter::new();
        header.write(&mut writer);
        for q in &self.questions {
            q.write(&mut writer)?;
        }
        for rr in self
            .answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
        {
            rr.write(&mut writer)?;
        }

        if writer.len() > MAX_MESSAGE_LEN {
            return Err(EncodeError::MessageTooLarge);
        }
        Ok(writer.into_bytes())
    }

    /// Parses a complete message. Never panics on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated);
        }

        let mut reader = PacketReader::new(bytes);
        let header = Header::read(&mut reader)?;

        let mut questions = Vec::with_capacity((header.qdcount as usize).min(4));
        for _ in 0..header.qdcount {
            ensure_more(&reader)?;
            questions.push(Question::read(&mut reader)?);
        }

        let answers = read_section(&mut reader, header.ancount)?;
        let authorities = read_section(&mut reader, header.nscount)?;
        let additionals = read_section(&mut reader, header.arcount)?;

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

/// Encodes a standard single-question query.
pub fn encode_query(
    id: u16,
    question: &Question,
    options: &QueryOptions,
) -> Result<Vec<u8>, EncodeError> {
    Message::query(id, question.clone(), options).encode()
}

fn section_len(len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::MessageTooLarge)
}

fn ensure_more(reader: &PacketReader<'_>) -> Result<(), DecodeError> {
    if reader.remaining() == 0 {
        Err(DecodeError::CountMismatch)
    } else {
        Ok(())
    }
}

fn read_section(
    reader: &mut PacketReader<'_>,
    count: u16,
) -> Result<Vec<ResourceRecord>, DecodeError> {
    let mut records = Vec::with_capacity((count as usize).min(16));
    for _ in 0..count {
        ensure_more(reader)?;
        records.push(ResourceRecord::read(reader)?);
    }
    Ok(records)
}
