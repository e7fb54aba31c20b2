use bonsai::config::DEFAULT_LOG_LEVEL;
use bonsai_cli::{cli::Cli, commands, logging};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let loaded = commands::load_config(cli.config.as_deref());

	let level = loaded.as_ref().map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());
	logging::init_logging(cli.verbose, level);

	let result = match loaded {
		Ok(config) => commands::dispatch(cli.command, config.normalize()).await,
		Err(err) => Err(err.into()),
	};

	if let Err(err) = result {
		error!(target = "bonsai", error = %err, "command failed");
		std::process::exit(1);
	}
}
