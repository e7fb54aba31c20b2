use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bonsai-auth")]
#[command(about = "Drive Bonsai NTLM authentication from the command line")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file (ntlmHelper, helperTimeoutMs, maxSessions, ...)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Launch the configured helper once and shut it down
	CheckHelper,

	/// Negotiate with tokens read from stdin, one per line (empty line = no token)
	Negotiate {
		/// Session id the rounds belong to
		#[arg(long)]
		session: String,
		/// Authentication scope
		#[arg(long, default_value = "default")]
		scope: String,
	},

	/// Print the effective configuration as JSON
	ShowConfig,
}
