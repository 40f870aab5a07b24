use clap::{Args, Parser, Subcommand};
use ferrous_resolv_domain::{
    AddressFamily, CliOverrides, Completion, NameInfoFlags, NameInfoRequest,
};
use ferrous_resolv_infrastructure::Resolver;
use std::cell::RefCell;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;
use tracing::info;

mod bootstrap;

#[derive(Parser)]
#[command(name = "ferrous-resolv")]
#[command(version)]
#[command(about = "Ferrous Resolv - asynchronous stub DNS resolver")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Nameserver (ip, ip:port or [ipv6]:port); repeat for several
    #[arg(short = 's', long = "server", value_name = "ADDR")]
    servers: Vec<String>,

    /// First attempt timeout in milliseconds
    #[arg(short = 't', long, value_name = "MS")]
    timeout: Option<u64>,

    /// Attempts per nameserver
    #[arg(long)]
    tries: Option<u32>,

    /// Query over TCP only
    #[arg(long)]
    tcp: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve host names to addresses
    Host {
        #[arg(required = true)]
        names: Vec<String>,

        /// inet, inet6 or unspec
        #[arg(short = 'f', long, default_value = "unspec")]
        family: AddressFamily,
    },
    /// Resolve addresses to host names
    Addr {
        #[arg(required = true)]
        addresses: Vec<IpAddr>,
    },
    /// Resolve an address and port to host and service names
    Nameinfo(NameinfoArgs),
}

#[derive(Args)]
struct NameinfoArgs {
    /// ip:port or [ipv6%scope]:port
    address: SocketAddr,

    #[arg(long)]
    numeric_host: bool,

    #[arg(long)]
    numeric_service: bool,

    /// Fail instead of falling back to the numeric host
    #[arg(long)]
    name_required: bool,

    /// Strip the local domain from the host name
    #[arg(long)]
    no_fqdn: bool,

    /// Look the service up as UDP instead of TCP
    #[arg(long)]
    udp: bool,

    #[arg(long)]
    no_host: bool,

    #[arg(long)]
    no_service: bool,
}

impl NameinfoArgs {
    fn flags(&self) -> NameInfoFlags {
        let mut flags = NameInfoFlags::empty();
        for (set, flag) in [
            (!self.no_host, NameInfoFlags::LOOKUPHOST),
            (!self.no_service, NameInfoFlags::LOOKUPSERVICE),
            (self.numeric_host, NameInfoFlags::NUMERICHOST),
            (self.numeric_service, NameInfoFlags::NUMERICSERV),
            (self.name_required, NameInfoFlags::NAMEREQD),
            (self.no_fqdn, NameInfoFlags::NOFQDN),
            (self.udp, NameInfoFlags::UDP),
        ] {
            if set {
                flags = flags | flag;
            }
        }
        flags
    }
}

type Slots = Rc<RefCell<Vec<Option<Completion>>>>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        servers: cli.servers.clone(),
        timeout_ms: cli.timeout,
        tries: cli.tries,
        use_tcp: cli.tcp,
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;
    bootstrap::init_logging(&config);

    info!("Starting Ferrous Resolv v{}", env!("CARGO_PKG_VERSION"));

    let mut resolver = Resolver::new(config.resolver)?;
    let (labels, slots) = submit(&mut resolver, &cli.command);
    resolver.run_until_idle()?;
    drop(resolver);

    let mut failures = 0;
    for (label, slot) in labels.iter().zip(slots.borrow_mut().drain(..)) {
        match slot {
            Some(completion) => {
                if completion.is_error() {
                    failures += 1;
                }
                print_completion(label, &completion);
            }
            None => {
                failures += 1;
                println!("{}: no answer", label);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} lookups failed", failures, labels.len());
    }
    Ok(())
}

fn submit(resolver: &mut Resolver, command: &Command) -> (Vec<String>, Slots) {
    let labels: Vec<String> = match command {
        Command::Host { names, .. } => names.clone(),
        Command::Addr { addresses } => addresses.iter().map(ToString::to_string).collect(),
        Command::Nameinfo(args) => vec![args.address.to_string()],
    };
    let slots: Slots = Rc::new(RefCell::new(vec![None; labels.len()]));

    let store = |index: usize| {
        let slots = slots.clone();
        move |_: &mut Resolver, completion: Completion| {
            if let Some(slot) = slots.borrow_mut().get_mut(index) {
                *slot = Some(completion);
            }
        }
    };

    match command {
        Command::Host { names, family } => {
            for (i, name) in names.iter().enumerate() {
                resolver.resolve_by_name(name, *family, store(i));
            }
        }
        Command::Addr { addresses } => {
            for (i, addr) in addresses.iter().enumerate() {
                resolver.resolve_by_address(*addr, store(i));
            }
        }
        Command::Nameinfo(args) => {
            resolver.resolve_service(NameInfoRequest::new(args.address, args.flags()), store(0));
        }
    }

    (labels, slots)
}

fn print_completion(label: &str, completion: &Completion) {
    match completion {
        Completion::Name(entry) => {
            for alias in &entry.aliases {
                println!("{} is an alias for {}", alias, entry.name);
            }
            for addr in &entry.addresses {
                println!("{} has address {}", entry.name, addr);
            }
        }
        Completion::Address(entry) => {
            println!("{} domain name pointer {}", label, entry.name);
            for alias in &entry.aliases {
                println!("{} domain name pointer {}", label, alias);
            }
        }
        Completion::Service(info) => {
            println!(
                "{} is {} service {}",
                label,
                info.node.as_deref().unwrap_or("-"),
                info.service.as_deref().unwrap_or("-")
            );
        }
        Completion::Error(e) => println!("{}: {}", label, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_command_with_family() {
        let cli = Cli::try_parse_from([
            "ferrous-resolv",
            "--server",
            "192.0.2.1",
            "-s",
            "192.0.2.2:5353",
            "host",
            "-f",
            "inet6",
            "example.com",
        ])
        .unwrap();

        assert_eq!(cli.servers, vec!["192.0.2.1", "192.0.2.2:5353"]);
        match cli.command {
            Command::Host { names, family } => {
                assert_eq!(names, vec!["example.com"]);
                assert_eq!(family, AddressFamily::Inet6);
            }
            _ => panic!("expected host command"),
        }
    }

    #[test]
    fn test_nameinfo_flags() {
        let cli = Cli::try_parse_from([
            "ferrous-resolv",
            "nameinfo",
            "192.0.2.1:53",
            "--numeric-service",
            "--udp",
        ])
        .unwrap();

        let Command::Nameinfo(args) = cli.command else {
            panic!("expected nameinfo command");
        };
        let flags = args.flags();
        assert!(flags.contains(NameInfoFlags::LOOKUPHOST));
        assert!(flags.contains(NameInfoFlags::LOOKUPSERVICE));
        assert!(flags.contains(NameInfoFlags::NUMERICSERV | NameInfoFlags::UDP));
        assert!(!flags.contains(NameInfoFlags::NUMERICHOST));
    }

    #[test]
    fn test_rejects_bad_family() {
        assert!(Cli::try_parse_from(["ferrous-resolv", "host", "-f", "ipx", "a"]).is_err());
    }
}
