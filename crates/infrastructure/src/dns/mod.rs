pub mod event_loop;
pub mod nameservers;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod tracker;
pub mod transport;

pub use nameservers::{Nameserver, NameserverSet, ServerStatus};
pub use query::{LookupId, Protocol, Query, Rotation};
pub use resolver::{Callback, Resolver};
pub use scheduler::{RetryPolicy, TimeoutScheduler};
pub use tracker::QueryTracker;
pub use transport::{Datagram, Multiplexer, Readiness, Received, SocketEvent, SocketStateCallback};
