//! Helper transport errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures opening or talking to an NTLM helper.
#[derive(Debug, Error)]
pub enum HelperError {
	#[error("missing helper application path")]
	MissingPath,

	#[error("permission check failed for helper {}", path.display())]
	NotExecutable { path: PathBuf },

	#[error("failed to spawn helper {}: {source}", path.display())]
	Spawn {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("helper {0} pipe was not created")]
	PipeUnavailable(&'static str),

	#[error("helper I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("helper did not respond within {0:?}")]
	Timeout(Duration),

	#[error("helper channel is closed")]
	Closed,
}

impl HelperError {
	/// Returns `true` for errors raised while opening a channel.
	pub fn is_init(&self) -> bool {
		matches!(
			self,
			HelperError::MissingPath | HelperError::NotExecutable { .. } | HelperError::Spawn { .. } | HelperError::PipeUnavailable(_)
		)
	}
}

pub type Result<T> = std::result::Result<T, HelperError>;
