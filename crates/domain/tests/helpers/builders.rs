use ferrous_resolv_domain::wire::{Message, QueryOptions, RecordData, ResourceRecord};
use ferrous_resolv_domain::{Question, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Builds response messages for decoder tests.
pub struct ResponseBuilder {
    message: Message,
}

impl ResponseBuilder {
    pub fn new(id: u16, name: &str, qtype: RecordType) -> Self {
        let query = Message::query(id, Question::new(name, qtype), &QueryOptions::default());
        Self {
            message: Message::response_to(&query),
        }
    }

    pub fn a(mut self, name: &str, addr: Ipv4Addr) -> Self {
        self.message
            .answers
            .push(ResourceRecord::new(name, 300, RecordData::A(addr)));
        self
    }

    pub fn aaaa(mut self, name: &str, addr: Ipv6Addr) -> Self {
        self.message
            .answers
            .push(ResourceRecord::new(name, 300, RecordData::AAAA(addr)));
        self
    }

    pub fn cname(mut self, name: &str, target: &str) -> Self {
        self.message
            .answers
            .push(ResourceRecord::new(name, 300, RecordData::CNAME(target.into())));
        self
    }

    pub fn txt(mut self, name: &str, text: &str) -> Self {
        self.message.answers.push(ResourceRecord::new(
            name,
            300,
            RecordData::TXT(vec![text.as_bytes().to_vec()]),
        ));
        self
    }

    pub fn truncated(mut self) -> Self {
        self.message.header.truncated = true;
        self
    }

    pub fn build(self) -> Message {
        self.message
    }

    pub fn bytes(self) -> Vec<u8> {
        self.message.encode().unwrap()
    }
}
