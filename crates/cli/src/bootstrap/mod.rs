use ferrous_resolv_domain::{CliOverrides, Config};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn load_config(path: Option<&str>, cli_overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, cli_overrides)?;
    config.validate()?;
    Ok(config)
}

/// Logs go to stderr so lookup output stays clean. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    debug!(level = %config.logging.level, json = config.logging.json, "Logging initialized");
}
