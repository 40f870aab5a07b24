use crate::wire::{DecodeError, EncodeError, ResponseCode};
use thiserror::Error;

/// Coarse classification of a failed lookup, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    Timeout,
    NameError,
    NoData,
    ResourceExhausted,
    Transport,
    ServerFailure,
    BadName,
    BadFamily,
    BadFlags,
    Destroyed,
    Io,
    Config,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Malformed DNS message: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cannot encode DNS message: {0}")]
    Encode(#[from] EncodeError),

    #[error("Query timeout: no nameserver answered")]
    Timeout,

    #[error("Domain not found (NXDOMAIN)")]
    NameError,

    #[error("Domain exists but has no records of the requested type")]
    NoData,

    #[error("CNAME chain longer than {max} hops")]
    CnameChainTooLong { max: usize },

    #[error("Query id space exhausted, retry later")]
    ResourceExhausted,

    #[error("Transport failure talking to {server}: {message}")]
    Transport { server: String, message: String },

    #[error("Nameserver failure: {rcode}")]
    ServerFailure { rcode: ResponseCode },

    #[error("Invalid domain name: {0}")]
    BadName(String),

    #[error("Unsupported address family: {0}")]
    BadFamily(String),

    #[error("Invalid flags: {0}")]
    BadFlags(String),

    #[error("Resolver destroyed before the lookup completed")]
    Destroyed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Decode(_) | DomainError::Encode(_) => ErrorKind::Decode,
            DomainError::Timeout => ErrorKind::Timeout,
            DomainError::NameError | DomainError::CnameChainTooLong { .. } => ErrorKind::NameError,
            DomainError::NoData => ErrorKind::NoData,
            DomainError::ResourceExhausted => ErrorKind::ResourceExhausted,
            DomainError::Transport { .. } => ErrorKind::Transport,
            DomainError::ServerFailure { .. } => ErrorKind::ServerFailure,
            DomainError::BadName(_) => ErrorKind::BadName,
            DomainError::BadFamily(_) => ErrorKind::BadFamily,
            DomainError::BadFlags(_) => ErrorKind::BadFlags,
            DomainError::Destroyed => ErrorKind::Destroyed,
            DomainError::Io(_) => ErrorKind::Io,
            DomainError::Config(_) => ErrorKind::Config,
        }
    }

    /// Authoritative negative answers: the search list moves on to the next candidate.
    pub fn is_negative_answer(&self) -> bool {
        matches!(self, DomainError::NameError | DomainError::NoData)
    }

    pub fn transport(server: impl ToString, message: impl ToString) -> Self {
        DomainError::Transport {
            server: server.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}
