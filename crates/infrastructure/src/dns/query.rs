use ferrous_resolv_domain::{DomainError, Question};
use smallvec::SmallVec;
use std::fmt;
use std::time::Instant;

/// Handle returned by every public lookup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupId(pub(crate) u64);

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lookup#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server indices in the order this query will try them.
pub type Rotation = SmallVec<[usize; 4]>;

/// One in-flight question.
#[derive(Debug)]
pub struct Query {
    pub id: u16,
    pub lookup: LookupId,
    pub question: Question,
    pub rotation: Rotation,
    pub position: usize,
    /// Attempts made on the current server.
    pub attempt: u32,
    pub protocol: Protocol,
    pub edns: bool,
    pub deadline: Option<Instant>,
    pub sent_at: Option<Instant>,
    pub request: Vec<u8>,
    pub last_error: Option<DomainError>,
    pub timed_out: bool,
}

impl Query {
    pub fn new(
        lookup: LookupId,
        question: Question,
        rotation: Rotation,
        protocol: Protocol,
        edns: bool,
        request: Vec<u8>,
    ) -> Self {
        Self {
            id: 0,
            lookup,
            question,
            rotation,
            position: 0,
            attempt: 0,
            protocol,
            edns,
            deadline: None,
            sent_at: None,
            request,
            last_error: None,
            timed_out: false,
        }
    }

    /// Current server index, `None` once the rotation is exhausted.
    pub fn server(&self) -> Option<usize> {
        self.rotation.get(self.position).copied()
    }

    /// Stores the id and patches it into the serialized request.
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
        if let Some(head) = self.request.get_mut(..2) {
            head.copy_from_slice(&id.to_be_bytes());
        }
    }

    /// Moves to the next server in the rotation with a fresh attempt budget.
    pub fn rotate(&mut self) -> Option<usize> {
        self.position += 1;
        self.attempt = 0;
        self.server()
    }

    /// Error reported when every server has been tried.
    pub fn exhausted_error(&self) -> DomainError {
        match &self.last_error {
            Some(e) if !self.timed_out => e.clone(),
            _ => DomainError::Timeout,
        }
    }
}
