//! DNS message wire format (RFC 1035 section 4, RFC 6891 OPT).

mod buffer;
mod edns;
mod error;
mod header;
mod message;
pub mod name;
mod question;
mod record;

pub use buffer::{PacketReader, PacketWriter, MAX_POINTER_HOPS};
pub use edns::{Edns, DEFAULT_EDNS_PAYLOAD};
pub use error::{DecodeError, EncodeError};
pub use header::{Header, Opcode, ResponseCode, HEADER_LEN};
pub use message::{encode_query, Message, QueryOptions, MAX_MESSAGE_LEN};
pub use question::Question;
pub use record::{RecordData, ResourceRecord};
