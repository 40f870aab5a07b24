mod errors;
mod logging;
mod resolver;
mod root;

pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use resolver::{parse_server_addr, NameserverAddr, ResolverConfig, ResolverFlags};
pub use root::{CliOverrides, Config};
