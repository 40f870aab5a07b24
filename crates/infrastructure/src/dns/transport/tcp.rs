use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::debug;

pub const MAX_TCP_MESSAGE_SIZE: usize = 65535;
const READ_CHUNK: usize = 4096;

/// Prefixes `msg` with its two-byte length.
pub fn frame(msg: &[u8]) -> io::Result<Vec<u8>> {
    if msg.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("DNS message too large for TCP: {} bytes", msg.len()),
        ));
    }
    let mut out = Vec::with_capacity(msg.len() + 2);
    out.extend_from_slice(&(msg.len() as u16).to_be_bytes());
    out.extend_from_slice(msg);
    Ok(out)
}

/// Reassembles length-prefixed messages from a byte stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < 2 {
            return None;
        }
        let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if self.buf.len() < 2 + len {
            return None;
        }
        let msg = self.buf[2..2 + len].to_vec();
        self.buf.drain(..2 + len);
        Some(msg)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Non-blocking TCP connection to one nameserver; queries share it.
pub struct TcpChannel {
    stream: TcpStream,
    peer: SocketAddr,
    connected: bool,
    write_buf: Vec<u8>,
    decoder: FrameDecoder,
    interest: Interest,
}

impl TcpChannel {
    pub fn connect(registry: &Registry, token: Token, peer: SocketAddr) -> io::Result<Self> {
        let mut stream = TcpStream::connect(peer)?;
        let interest = Interest::READABLE | Interest::WRITABLE;
        registry.register(&mut stream, token, interest)?;
        debug!(server = %peer, "TCP connect started");

        Ok(Self {
            stream,
            peer,
            connected: false,
            write_buf: Vec::new(),
            decoder: FrameDecoder::default(),
            interest,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    pub fn send(&mut self, registry: &Registry, token: Token, msg: &[u8]) -> io::Result<()> {
        self.write_buf.extend_from_slice(&frame(msg)?);
        if self.connected {
            self.flush(registry, token)?;
        }
        Ok(())
    }

    /// Completes a pending connect, then writes out queued frames.
    pub fn on_writable(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        if !self.connected {
            if let Some(e) = self.stream.take_error()? {
                return Err(e);
            }
            match self.stream.peer_addr() {
                Ok(_) => {
                    self.connected = true;
                    let _ = self.stream.set_nodelay(true);
                    debug!(server = %self.peer, "TCP connected");
                }
                Err(e) if e.kind() == io::ErrorKind::NotConnected => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        self.flush(registry, token)
    }

    fn flush(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        let mut written = 0;
        while written < self.write_buf.len() {
            match self.stream.write(&self.write_buf[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.write_buf.drain(..written);

        let interest = if self.write_buf.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };
        if interest != self.interest {
            registry.reregister(&mut self.stream, token, interest)?;
            self.interest = interest;
        }
        Ok(())
    }

    /// Reads everything available into `out`. EOF and errors are returned after
    /// the complete frames received before them.
    pub fn receive(&mut self, out: &mut Vec<Vec<u8>>) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let result = loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
                Ok(n) => self.decoder.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        while let Some(msg) = self.decoder.next_frame() {
            out.push(msg);
        }
        result
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prefixes_length() {
        let framed = frame(&[0xaa; 300]).unwrap();
        assert_eq!(&framed[..2], &[0x01, 0x2c]);
        assert_eq!(framed.len(), 302);
    }

    #[test]
    fn test_frame_rejects_oversized() {
        assert!(frame(&vec![0; MAX_TCP_MESSAGE_SIZE + 1]).is_err());
    }

    #[test]
    fn test_decoder_handles_split_and_coalesced_frames() {
        let mut stream = frame(b"first").unwrap();
        stream.extend(frame(b"second!").unwrap());

        let mut decoder = FrameDecoder::default();
        decoder.push(&stream[..1]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&stream[1..6]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&stream[6..]);

        assert_eq!(decoder.next_frame().unwrap(), b"first");
        assert_eq!(decoder.next_frame().unwrap(), b"second!");
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.buffered(), 0);
    }
}
