//! Socket multiplexer: one lazily opened UDP socket and TCP connection per
//! nameserver, all registered with a single `mio::Poll`.

pub mod tcp;
pub mod udp;

use super::query::Protocol;
use ferrous_resolv_domain::{DomainError, NameserverAddr};
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tcp::TcpChannel;
use tracing::{debug, warn};
use udp::UdpChannel;

pub use tcp::{frame, FrameDecoder, MAX_TCP_MESSAGE_SIZE};

const EVENT_CAPACITY: usize = 128;
const RECV_BUF_LEN: usize = 65535;

/// A socket became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub server: usize,
    pub protocol: Protocol,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub source: SocketAddr,
}

/// Socket lifecycle notifications for callers that drive their own poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketEvent {
    Opened {
        server: SocketAddr,
        protocol: Protocol,
    },
    Interest {
        server: SocketAddr,
        protocol: Protocol,
        readable: bool,
        writable: bool,
    },
    Closed {
        server: SocketAddr,
        protocol: Protocol,
    },
}

pub type SocketStateCallback = Box<dyn FnMut(SocketEvent)>;

/// Messages read from one socket, plus the error that ended the read if any.
#[derive(Debug, Default)]
pub struct Received {
    pub datagrams: Vec<Datagram>,
    pub error: Option<DomainError>,
}

struct ServerSockets {
    addr: NameserverAddr,
    udp: Option<UdpChannel>,
    tcp: Option<TcpChannel>,
}

pub struct Multiplexer {
    poll: Poll,
    events: Events,
    servers: Vec<ServerSockets>,
    recv_buf: Vec<u8>,
    recv_buffer_size: usize,
    socket_state: Option<SocketStateCallback>,
}

fn token(server: usize, protocol: Protocol) -> Token {
    Token(server * 2 + usize::from(protocol == Protocol::Tcp))
}

fn from_token(token: Token) -> (usize, Protocol) {
    let protocol = if token.0 % 2 == 1 {
        Protocol::Tcp
    } else {
        Protocol::Udp
    };
    (token.0 / 2, protocol)
}

impl Multiplexer {
    pub fn new(servers: &[NameserverAddr], recv_buffer_size: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENT_CAPACITY),
            servers: servers
                .iter()
                .map(|&addr| ServerSockets {
                    addr,
                    udp: None,
                    tcp: None,
                })
                .collect(),
            recv_buf: vec![0; RECV_BUF_LEN],
            recv_buffer_size,
            socket_state: None,
        })
    }

    pub fn set_socket_state_callback(&mut self, callback: Option<SocketStateCallback>) {
        self.socket_state = callback;
    }

    pub fn server_addr(&self, server: usize, protocol: Protocol) -> Option<SocketAddr> {
        self.servers.get(server).map(|s| match protocol {
            Protocol::Udp => s.addr.udp,
            Protocol::Tcp => s.addr.tcp,
        })
    }

    pub fn has_tcp(&self, server: usize) -> bool {
        self.servers.get(server).is_some_and(|s| s.tcp.is_some())
    }

    /// Number of open sockets across all servers.
    pub fn open_sockets(&self) -> usize {
        self.servers
            .iter()
            .map(|s| usize::from(s.udp.is_some()) + usize::from(s.tcp.is_some()))
            .sum()
    }

    /// Sends `msg`, opening the socket first if needed.
    pub fn send(&mut self, server: usize, protocol: Protocol, msg: &[u8]) -> Result<(), DomainError> {
        let peer = self
            .server_addr(server, protocol)
            .ok_or_else(|| DomainError::transport(format!("server#{}", server), "unknown nameserver"))?;
        let result = self.send_inner(server, protocol, peer, msg);
        if let Err(e) = &result {
            debug!(server = %peer, %protocol, error = %e, "Send failed");
            if protocol == Protocol::Tcp {
                self.close(server, Protocol::Tcp);
            }
        }
        result.map_err(|e| DomainError::transport(peer, e))
    }

    fn send_inner(
        &mut self,
        server: usize,
        protocol: Protocol,
        peer: SocketAddr,
        msg: &[u8],
    ) -> io::Result<()> {
        let tok = token(server, protocol);
        let registry = self.poll.registry();
        let sockets = &mut self.servers[server];
        let mut opened = false;

        let interest = match protocol {
            Protocol::Udp => {
                if sockets.udp.is_none() {
                    sockets.udp = Some(UdpChannel::open(registry, tok, peer, self.recv_buffer_size)?);
                    opened = true;
                }
                let Some(channel) = sockets.udp.as_mut() else {
                    return Ok(());
                };
                let before = channel.interest();
                channel.send(registry, tok, msg)?;
                (opened || before != channel.interest()).then(|| channel.interest())
            }
            Protocol::Tcp => {
                if sockets.tcp.is_none() {
                    sockets.tcp = Some(TcpChannel::connect(registry, tok, peer)?);
                    opened = true;
                }
                let Some(channel) = sockets.tcp.as_mut() else {
                    return Ok(());
                };
                let before = channel.interest();
                channel.send(registry, tok, msg)?;
                (opened || before != channel.interest()).then(|| channel.interest())
            }
        };

        if opened {
            self.notify(SocketEvent::Opened {
                server: peer,
                protocol,
            });
        }
        if let Some(interest) = interest {
            self.notify_interest(peer, protocol, interest);
        }
        Ok(())
    }

    /// Waits for readiness. An interrupted wait returns no events.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Readiness>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        Ok(self
            .events
            .iter()
            .map(|event| {
                let (server, protocol) = from_token(event.token());
                Readiness {
                    server,
                    protocol,
                    readable: event.is_readable() || event.is_read_closed() || event.is_error(),
                    writable: event.is_writable() || event.is_write_closed(),
                }
            })
            .collect())
    }

    /// Completes connects and drains send queues. Errors close TCP connections.
    pub fn handle_writable(&mut self, server: usize, protocol: Protocol) -> Result<(), DomainError> {
        let Some(peer) = self.server_addr(server, protocol) else {
            return Ok(());
        };
        let tok = token(server, protocol);
        let registry = self.poll.registry();
        let sockets = &mut self.servers[server];

        let outcome = match protocol {
            Protocol::Udp => sockets.udp.as_mut().map(|c| {
                let before = c.interest();
                c.flush(registry, tok).map(|()| (before, c.interest()))
            }),
            Protocol::Tcp => sockets.tcp.as_mut().map(|c| {
                let before = c.interest();
                c.on_writable(registry, tok).map(|()| (before, c.interest()))
            }),
        };

        match outcome {
            None => Ok(()),
            Some(Ok((before, after))) => {
                if before != after {
                    self.notify_interest(peer, protocol, after);
                }
                Ok(())
            }
            Some(Err(e)) => {
                warn!(server = %peer, %protocol, error = %e, "Socket write failed");
                if protocol == Protocol::Tcp {
                    self.close(server, Protocol::Tcp);
                }
                Err(DomainError::transport(peer, e))
            }
        }
    }

    /// Reads every available message from one socket.
    pub fn receive(&mut self, server: usize, protocol: Protocol) -> Received {
        let mut received = Received::default();
        let Some(peer) = self.server_addr(server, protocol) else {
            return received;
        };
        let sockets = &mut self.servers[server];

        let result = match protocol {
            Protocol::Udp => match sockets.udp.as_mut() {
                Some(channel) => channel.receive(&mut self.recv_buf, &mut received.datagrams),
                None => Ok(()),
            },
            Protocol::Tcp => match sockets.tcp.as_mut() {
                Some(channel) => {
                    let mut frames = Vec::new();
                    let result = channel.receive(&mut frames);
                    received.datagrams.extend(frames.into_iter().map(|bytes| Datagram {
                        bytes,
                        source: peer,
                    }));
                    result
                }
                None => Ok(()),
            },
        };

        if let Err(e) = result {
            debug!(server = %peer, %protocol, error = %e, "Socket read failed");
            if protocol == Protocol::Tcp {
                self.close(server, Protocol::Tcp);
            }
            received.error = Some(DomainError::transport(peer, e));
        }
        received
    }

    pub fn close(&mut self, server: usize, protocol: Protocol) {
        let Some(peer) = self.server_addr(server, protocol) else {
            return;
        };
        let registry = self.poll.registry();
        let sockets = &mut self.servers[server];
        let closed = match protocol {
            Protocol::Udp => sockets.udp.take().map(|mut c| c.deregister(registry)),
            Protocol::Tcp => sockets.tcp.take().map(|mut c| c.deregister(registry)),
        };
        if closed.is_some() {
            debug!(server = %peer, %protocol, "Socket closed");
            self.notify(SocketEvent::Closed {
                server: peer,
                protocol,
            });
        }
    }

    pub fn close_all(&mut self) {
        for server in 0..self.servers.len() {
            self.close(server, Protocol::Udp);
            self.close(server, Protocol::Tcp);
        }
    }

    fn notify_interest(&mut self, server: SocketAddr, protocol: Protocol, interest: Interest) {
        self.notify(SocketEvent::Interest {
            server,
            protocol,
            readable: interest.is_readable(),
            writable: interest.is_writable(),
        });
    }

    fn notify(&mut self, event: SocketEvent) {
        if let Some(callback) = self.socket_state.as_mut() {
            callback(event);
        }
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Multiplexer {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        std::os::fd::AsRawFd::as_raw_fd(&self.poll)
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.close_all();
    }
}
