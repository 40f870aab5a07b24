use ferrous_resolv_domain::NameserverAddr;
use ferrous_resolv_infrastructure::dns::{Multiplexer, Protocol};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

fn nameserver(addr: SocketAddr) -> NameserverAddr {
    NameserverAddr { udp: addr, tcp: addr }
}

/// Polls until `server` has produced `count` messages or the deadline passes.
fn collect(mux: &mut Multiplexer, server: usize, protocol: Protocol, count: usize) -> Vec<Vec<u8>> {
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut messages = Vec::new();
    while messages.len() < count && Instant::now() < deadline {
        for ready in mux.poll(Some(Duration::from_millis(50))).unwrap() {
            if ready.writable {
                mux.handle_writable(ready.server, ready.protocol).unwrap();
            }
            if ready.readable && ready.server == server && ready.protocol == protocol {
                let received = mux.receive(server, protocol);
                messages.extend(received.datagrams.into_iter().map(|d| d.bytes));
            }
        }
    }
    messages
}

#[test]
fn test_tcp_frames_reassembled_from_partial_reads() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut mux = Multiplexer::new(&[nameserver(addr)], 0).unwrap();

    mux.send(0, Protocol::Tcp, b"query-one").unwrap();
    mux.send(0, Protocol::Tcp, b"query-two").unwrap();
    assert!(mux.has_tcp(0));

    let peer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut framed = [0u8; 22];
        stream.read_exact(&mut framed).unwrap();

        let mut reply = Vec::new();
        for msg in [&b"answer-one"[..], &b"answer-two!"[..]] {
            reply.extend_from_slice(&(msg.len() as u16).to_be_bytes());
            reply.extend_from_slice(msg);
        }
        // Split inside the length prefix and inside the second payload.
        for chunk in [&reply[..1], &reply[1..15], &reply[15..]] {
            stream.write_all(chunk).unwrap();
            stream.flush().unwrap();
            std::thread::sleep(Duration::from_millis(30));
        }
        framed
    });

    let messages = collect(&mut mux, 0, Protocol::Tcp, 2);
    let framed = peer.join().unwrap();

    assert_eq!(&framed[..2], &[0, 9]);
    assert_eq!(&framed[2..11], b"query-one");
    assert_eq!(&framed[13..], b"query-two");
    assert_eq!(messages, vec![b"answer-one".to_vec(), b"answer-two!".to_vec()]);
}

#[test]
fn test_tcp_eof_reports_error_and_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut mux = Multiplexer::new(&[nameserver(addr)], 0).unwrap();
    mux.send(0, Protocol::Tcp, b"hello").unwrap();

    let peer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 7];
        stream.read_exact(&mut buf).unwrap();
        stream.write_all(&[0, 2, b'o', b'k']).unwrap();
    });

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut messages = Vec::new();
    let mut error = None;
    while error.is_none() && Instant::now() < deadline {
        for ready in mux.poll(Some(Duration::from_millis(50))).unwrap() {
            if ready.writable {
                mux.handle_writable(0, Protocol::Tcp).unwrap();
            }
            if ready.readable {
                let received = mux.receive(0, Protocol::Tcp);
                messages.extend(received.datagrams.into_iter().map(|d| d.bytes));
                error = error.or(received.error);
            }
        }
    }
    peer.join().unwrap();

    assert_eq!(messages, vec![b"ok".to_vec()]);
    assert!(error.is_some());
    assert!(!mux.has_tcp(0));
}

#[test]
fn test_udp_datagrams_from_other_sources_are_ignored() {
    let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let stranger = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut mux = Multiplexer::new(&[nameserver(server.local_addr().unwrap())], 64 * 1024).unwrap();

    mux.send(0, Protocol::Udp, b"q").unwrap();
    let mut buf = [0u8; 8];
    let (_, client) = server.recv_from(&mut buf).unwrap();

    // A connected socket filters foreign senders in the kernel; either way
    // nothing but the server's reply may come back.
    let _ = stranger.send_to(b"spoof", client);
    server.send_to(b"real", client).unwrap();

    let messages = collect(&mut mux, 0, Protocol::Udp, 1);
    assert_eq!(messages, vec![b"real".to_vec()]);
}
