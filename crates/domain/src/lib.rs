//! ferrous-resolv domain layer: wire codec, lookup types, configuration and the
//! static tables (hosts, services, resolv.conf) the resolver consults.
pub mod aliases;
pub mod config;
pub mod dns_record;
pub mod errors;
pub mod hosts;
pub mod lookup;
pub mod resolv_conf;
pub mod reverse;
pub mod services;
pub mod wire;

pub use aliases::{HostAliases, HOSTALIASES_ENV};
pub use config::{
    CliOverrides, Config, ConfigError, LoggingConfig, NameserverAddr, ResolverConfig,
    ResolverFlags,
};
pub use dns_record::{RecordClass, RecordType};
pub use errors::{DomainError, ErrorKind};
pub use hosts::HostsFile;
pub use lookup::{
    AddressFamily, Completion, HostEntry, NameInfo, NameInfoFlags, NameInfoRequest,
};
pub use resolv_conf::ResolvConf;
pub use reverse::reverse_name;
pub use services::ServiceTable;
pub use wire::{DecodeError, EncodeError, Message, Question, ResponseCode};
