mod check_helper;
pub mod negotiate;
mod show_config;

use std::path::Path;

use bonsai::{AuthConfig, ConfigError};

use crate::cli::Commands;
use crate::error::Result;

/// Loads `path`, or the built-in defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> std::result::Result<AuthConfig, ConfigError> {
	match path {
		Some(path) => AuthConfig::load(path),
		None => Ok(AuthConfig::default()),
	}
}

pub async fn dispatch(command: Commands, config: AuthConfig) -> Result<()> {
	match command {
		Commands::CheckHelper => check_helper::execute(&config).await,
		Commands::Negotiate { session, scope } => negotiate::execute(&config, &session, &scope).await,
		Commands::ShowConfig => show_config::execute(&config),
	}
}
