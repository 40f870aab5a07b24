use ferrous_resolv_domain::wire::{RecordData, ResourceRecord};
use ferrous_resolv_domain::{Message, Question, ResponseCode};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

/// What the mock does with one query.
pub enum Reply {
    Message(Message),
    /// Sends the same response several times.
    Repeat(Message, usize),
    Raw(Vec<u8>),
    Silent,
    /// Drops the TCP connection without answering.
    Close,
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub transport: Transport,
    pub question: Question,
    pub edns: bool,
}

type Handler = Arc<dyn Fn(Transport, &Message) -> Reply + Send + Sync>;

/// UDP and TCP DNS server on one loopback port, running a current-thread
/// tokio runtime on its own thread.
pub struct MockDnsServer {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockDnsServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(Transport, &Message) -> Reply + Send + Sync + 'static,
    {
        let (udp, tcp) = bind_pair();
        let addr = udp.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let log = seen.clone();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(serve(udp, tcp, handler, log, shutdown_rx));
        });

        Self {
            addr,
            seen,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    /// Answers every A and AAAA query with the given addresses.
    pub fn answering(v4: Ipv4Addr, v6: Ipv6Addr) -> Self {
        Self::start(move |_, query| {
            let question = query.question().unwrap();
            let data = match question.qtype {
                ferrous_resolv_domain::RecordType::A => RecordData::A(v4),
                ferrous_resolv_domain::RecordType::AAAA => RecordData::AAAA(v6),
                _ => return Reply::Message(reply_rcode(query, ResponseCode::NXDomain)),
            };
            Reply::Message(reply_with(query, vec![data]))
        })
    }

    pub fn silent() -> Self {
        Self::start(|_, _| Reply::Silent)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Response to `query` whose answers are owned by the question name.
pub fn reply_with(query: &Message, data: Vec<RecordData>) -> Message {
    let mut msg = Message::response_to(query);
    let name = query.question().map(|q| q.name.clone()).unwrap_or_default();
    msg.answers = data
        .into_iter()
        .map(|d| ResourceRecord::new(name.clone(), 300, d))
        .collect();
    msg
}

pub fn reply_rcode(query: &Message, rcode: ResponseCode) -> Message {
    let mut msg = Message::response_to(query);
    msg.set_rcode(rcode);
    msg
}

fn bind_pair() -> (std::net::UdpSocket, std::net::TcpListener) {
    for _ in 0..20 {
        let udp = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = udp.local_addr().unwrap();
        if let Ok(tcp) = std::net::TcpListener::bind(addr) {
            udp.set_nonblocking(true).unwrap();
            tcp.set_nonblocking(true).unwrap();
            return (udp, tcp);
        }
    }
    panic!("no free port for UDP and TCP");
}

async fn serve(
    udp: std::net::UdpSocket,
    tcp: std::net::TcpListener,
    handler: Handler,
    seen: Arc<Mutex<Vec<Seen>>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let udp = UdpSocket::from_std(udp).unwrap();
    let tcp = TcpListener::from_std(tcp).unwrap();
    let mut buf = vec![0u8; 65535];

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            result = udp.recv_from(&mut buf) => {
                let Ok((len, peer)) = result else { continue };
                let Some(query) = record(&seen, Transport::Udp, &buf[..len]) else { continue };
                for bytes in outgoing(handler(Transport::Udp, &query)) {
                    let _ = udp.send_to(&bytes, peer).await;
                }
            }
            result = tcp.accept() => {
                let Ok((stream, _)) = result else { continue };
                tokio::spawn(serve_tcp(stream, handler.clone(), seen.clone()));
            }
        }
    }
}

async fn serve_tcp(mut stream: TcpStream, handler: Handler, seen: Arc<Mutex<Vec<Seen>>>) {
    loop {
        let Ok(len) = stream.read_u16().await else { return };
        let mut msg = vec![0u8; len as usize];
        if stream.read_exact(&mut msg).await.is_err() {
            return;
        }
        let Some(query) = record(&seen, Transport::Tcp, &msg) else { continue };

        let reply = handler(Transport::Tcp, &query);
        if matches!(reply, Reply::Close) {
            return;
        }
        for bytes in outgoing(reply) {
            let mut framed = (bytes.len() as u16).to_be_bytes().to_vec();
            framed.extend_from_slice(&bytes);
            if stream.write_all(&framed).await.is_err() {
                return;
            }
        }
    }
}

fn record(seen: &Mutex<Vec<Seen>>, transport: Transport, bytes: &[u8]) -> Option<Message> {
    let query = Message::decode(bytes).ok()?;
    let question = query.question()?.clone();
    seen.lock().unwrap().push(Seen {
        transport,
        question,
        edns: query.edns().is_some(),
    });
    Some(query)
}

fn outgoing(reply: Reply) -> Vec<Vec<u8>> {
    match reply {
        Reply::Message(msg) => vec![msg.encode().unwrap()],
        Reply::Repeat(msg, times) => vec![msg.encode().unwrap(); times],
        Reply::Raw(bytes) => vec![bytes],
        Reply::Silent | Reply::Close => Vec::new(),
    }
}
