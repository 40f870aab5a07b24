use thiserror::Error;

/// Failure to parse a message received from the network.
///
/// Always recoverable: the resolver drops the offending packet and keeps going.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeError {
    #[error("message truncated")]
    Truncated,

    #[error("invalid compression pointer")]
    BadPointer,

    #[error("label longer than 63 octets or unsupported label type")]
    LabelTooLong,

    #[error("section counts do not match message contents")]
    CountMismatch,

    #[error("name longer than 255 octets")]
    NameTooLong,

    #[error("record data does not match its declared length or type")]
    BadRdata,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeError {
    #[error("label longer than 63 octets")]
    LabelTooLong,

    #[error("name longer than 255 octets")]
    NameTooLong,

    #[error("empty label inside name")]
    EmptyLabel,

    #[error("message larger than 65535 octets")]
    MessageTooLarge,
}
