//! Native resolver engine: query tracking, retry scheduling, a `mio` socket
//! multiplexer and the callback-driven [`dns::Resolver`].
pub mod dns;

pub use dns::{LookupId, Resolver, SocketEvent};
