use bonsai::{AuthError, ConfigError, SessionError};
use bonsai_runtime::HelperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Helper(#[from] HelperError),

	#[error(transparent)]
	Session(#[from] SessionError),

	#[error("failed to read tokens: {0}")]
	Input(#[source] std::io::Error),

	#[error("failed to write output: {0}")]
	Output(#[source] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
