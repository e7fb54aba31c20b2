//! Error types for the authentication core.

use std::path::PathBuf;
use std::sync::Arc;

use bonsai_runtime::HelperError;
use thiserror::Error;

use crate::ntlm::AuthContext;

/// Session registry and binding failures.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("no session slots available (capacity {capacity})")]
	CapacityExceeded { capacity: usize },

	#[error("session handle for {id} is stale")]
	StaleHandle { id: String },

	/// The scope already has a context; `rejected` is the caller's context, handed back unlinked.
	#[error("an authentication context is already bound for scope {scope}")]
	AlreadyBound { scope: String, rejected: Arc<AuthContext> },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

#[derive(Debug, Error)]
pub enum AuthError {
	#[error(transparent)]
	Helper(#[from] HelperError),

	#[error(transparent)]
	Session(#[from] SessionError),

	#[error(transparent)]
	Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
