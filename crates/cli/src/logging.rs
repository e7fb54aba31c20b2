use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter directive for `-v` count, falling back to the configured level.
pub fn filter_directive(verbose: u8, config_level: &str) -> &str {
	match verbose {
		0 => config_level,
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Installs the stderr subscriber. `RUST_LOG` overrides both `-v` and the config.
pub fn init_logging(verbose: u8, config_level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, config_level)));

	let _ = tracing_subscriber::registry()
		.with(fmt::layer().with_writer(std::io::stderr))
		.with(filter)
		.try_init();
}
