use ferrous_resolv_domain::wire::{
    encode_query, DecodeError, Message, QueryOptions, RecordData, MAX_POINTER_HOPS,
};
use ferrous_resolv_domain::{Question, RecordType, ResponseCode};
use std::net::{Ipv4Addr, Ipv6Addr};

mod helpers;
use helpers::ResponseBuilder;

#[test]
fn test_query_roundtrip_preserves_question() {
    for (name, qtype) in [
        ("www.Example.COM", RecordType::A),
        ("ipv6.example.org", RecordType::AAAA),
        ("8.8.8.8.in-addr.arpa", RecordType::PTR),
        ("a\\.dotted\\032label.example", RecordType::TXT),
        ("\\119ww.Example.com", RecordType::A),
        ("\\097\\098c.\\101xample.", RecordType::AAAA),
    ] {
        let question = Question::new(name, qtype);
        let bytes = encode_query(0x4242, &question, &QueryOptions::default()).unwrap();
        let decoded = Message::decode(&bytes).unwrap();

        assert_eq!(decoded.header.id, 0x4242);
        assert!(!decoded.header.response);
        assert!(decoded.header.recursion_desired);
        assert!(decoded.question().unwrap().matches(&question), "{}", name);
    }
}

#[test]
fn test_escaped_name_decodes_to_canonical_text() {
    let question = Question::new("\\119ww.example.com", RecordType::A);
    let bytes = encode_query(9, &question, &QueryOptions::default()).unwrap();
    let decoded = Message::decode(&bytes).unwrap();

    assert_eq!(decoded.question().unwrap().name, "www.example.com");
    assert!(question.matches(decoded.question().unwrap()));
}

#[test]
fn test_no_recurse_clears_rd() {
    let question = Question::new("example.com", RecordType::A);
    let options = QueryOptions {
        recursion_desired: false,
        edns_payload_size: None,
    };
    let bytes = encode_query(1, &question, &options).unwrap();
    assert_eq!(bytes[2] & 0x01, 0);
}

#[test]
fn test_response_with_cname_and_addresses() {
    let bytes = ResponseBuilder::new(7, "www.example.com", RecordType::A)
        .cname("www.example.com", "edge.example.net")
        .a("edge.example.net", Ipv4Addr::new(192, 0, 2, 1))
        .a("edge.example.net", Ipv4Addr::new(192, 0, 2, 2))
        .bytes();

    let msg = Message::decode(&bytes).unwrap();
    assert_eq!(msg.rcode(), ResponseCode::NoError);
    assert_eq!(msg.answers.len(), 3);
    assert_eq!(
        msg.answers[0].data,
        RecordData::CNAME("edge.example.net".to_string())
    );
    assert_eq!(msg.answers[2].data, RecordData::A(Ipv4Addr::new(192, 0, 2, 2)));
}

#[test]
fn test_compression_shrinks_repeated_names() {
    let msg = ResponseBuilder::new(7, "host.example.com", RecordType::AAAA)
        .aaaa("host.example.com", Ipv6Addr::LOCALHOST)
        .aaaa("host.example.com", Ipv6Addr::UNSPECIFIED)
        .build();
    let bytes = msg.encode().unwrap();

    // header + question (18 + 4) + two answers each with a 2 byte pointer owner.
    assert_eq!(bytes.len(), 12 + 22 + 2 * (2 + 10 + 16));
}

#[test]
fn test_truncated_flag_survives() {
    let msg = Message::decode(
        &ResponseBuilder::new(9, "big.example", RecordType::TXT)
            .txt("big.example", "x")
            .truncated()
            .bytes(),
    )
    .unwrap();
    assert!(msg.header.truncated);
}

#[test]
fn test_every_prefix_of_a_response_fails_cleanly() {
    let bytes = ResponseBuilder::new(3, "www.example.com", RecordType::A)
        .cname("www.example.com", "example.com")
        .a("example.com", Ipv4Addr::new(10, 1, 2, 3))
        .bytes();

    for len in 0..bytes.len() {
        assert!(Message::decode(&bytes[..len]).is_err(), "prefix {}", len);
    }
    assert!(Message::decode(&bytes).is_ok());
}

#[test]
fn test_pointer_cycle_in_question() {
    let mut bytes = vec![0, 1, 0x81, 0x80, 0, 1, 0, 0, 0, 0, 0, 0];
    // Label "a" at offset 12 followed by a pointer back to offset 12.
    bytes.extend_from_slice(&[1, b'a', 0xC0, 12, 0, 1, 0, 1]);

    let err = Message::decode(&bytes).unwrap_err();
    assert!(matches!(err, DecodeError::BadPointer | DecodeError::NameTooLong));
}

#[test]
fn test_long_pointer_chain_is_bounded() {
    // No questions, two answers.
    let mut bytes = vec![0, 1, 0x81, 0x80, 0, 0, 0, 2, 0, 0, 0, 0];

    // First answer: root owner, opaque type 99 whose RDATA is a chain of pointers,
    // each one referring to the pointer before it.
    let chain_len = MAX_POINTER_HOPS + 10;
    bytes.extend_from_slice(&[0, 0, 99, 0, 1, 0, 0, 0, 0]);
    bytes.extend_from_slice(&((chain_len * 2) as u16).to_be_bytes());
    let mut prev = 12u16;
    for _ in 0..chain_len {
        let here = bytes.len() as u16;
        bytes.extend_from_slice(&(0xC000 | prev).to_be_bytes());
        prev = here;
    }

    // Second answer owned by the end of the chain.
    bytes.extend_from_slice(&(0xC000 | prev).to_be_bytes());
    bytes.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 0, 0, 4, 1, 2, 3, 4]);

    assert_eq!(Message::decode(&bytes), Err(DecodeError::BadPointer));
}

#[test]
fn test_decoder_never_panics_on_random_input() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let template = ResponseBuilder::new(1, "fuzz.example.com", RecordType::A)
        .a("fuzz.example.com", Ipv4Addr::new(1, 2, 3, 4))
        .bytes();

    for round in 0..4000 {
        let len = rng.usize(0..4096);
        let mut bytes: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();

        // Half the inputs start from a valid header so the body parsers get exercised.
        if round % 2 == 0 && bytes.len() >= template.len() {
            bytes[..template.len()].copy_from_slice(&template);
            let flips = rng.usize(1..8);
            for _ in 0..flips {
                let at = rng.usize(0..template.len());
                bytes[at] = rng.u8(..);
            }
        }

        let _ = Message::decode(&bytes);
    }
}
