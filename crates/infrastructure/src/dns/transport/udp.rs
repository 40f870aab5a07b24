use super::Datagram;
use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

/// Connected, non-blocking UDP socket to one nameserver.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
    queue: VecDeque<Vec<u8>>,
    interest: Interest,
}

impl UdpChannel {
    pub fn open(
        registry: &Registry,
        token: Token,
        peer: SocketAddr,
        recv_buffer_size: usize,
    ) -> io::Result<Self> {
        let mut socket = UdpSocket::from_std(create_socket(peer, recv_buffer_size)?);
        registry.register(&mut socket, token, Interest::READABLE)?;
        debug!(server = %peer, "UDP socket opened");

        Ok(Self {
            socket,
            peer,
            queue: VecDeque::new(),
            interest: Interest::READABLE,
        })
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Sends now or queues behind earlier datagrams; a full socket buffer arms WRITABLE.
    pub fn send(&mut self, registry: &Registry, token: Token, msg: &[u8]) -> io::Result<()> {
        if self.queue.is_empty() {
            match self.socket.send(msg) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        self.queue.push_back(msg.to_vec());
        self.set_interest(registry, token, Interest::READABLE | Interest::WRITABLE)
    }

    pub fn flush(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        while let Some(msg) = self.queue.front() {
            match self.socket.send(msg) {
                Ok(_) => {
                    self.queue.pop_front();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        self.set_interest(registry, token, Interest::READABLE)
    }

    /// Drains every pending datagram. A refused port surfaces as an error.
    pub fn receive(&mut self, buf: &mut [u8], out: &mut Vec<Datagram>) -> io::Result<()> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((len, source)) => {
                    if source != self.peer {
                        debug!(server = %self.peer, %source, "Datagram from unexpected source");
                        continue;
                    }
                    out.push(Datagram {
                        bytes: buf[..len].to_vec(),
                        source,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.socket);
    }

    fn set_interest(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        if self.interest != interest {
            registry.reregister(&mut self.socket, token, interest)?;
            self.interest = interest;
        }
        Ok(())
    }
}

fn create_socket(peer: SocketAddr, recv_buffer_size: usize) -> io::Result<std::net::UdpSocket> {
    let (domain, bind_addr) = if peer.is_ipv4() {
        (Domain::IPV4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    } else {
        (Domain::IPV6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)))
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if recv_buffer_size > 0 {
        socket.set_recv_buffer_size(recv_buffer_size)?;
    }
    socket.bind(&bind_addr.into())?;
    socket.connect(&peer.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}
