//! JSON configuration file.
//!
//! ```json
//! {
//!   "ntlmHelper": "/usr/bin/ntlm_auth",
//!   "helperTimeoutMs": 30000,
//!   "maxSessions": 10240,
//!   "sessionIdleTtlSecs": 3600,
//!   "logLevel": "warn"
//! }
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bonsai_runtime::{DEFAULT_HELPER_TIMEOUT, ProcessLauncher};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::session::{DEFAULT_CAPACITY, EvictionPolicy, SessionRegistry};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
	/// Path to the Squid `ntlmssp` helper executable.
	pub ntlm_helper: Option<PathBuf>,
	/// Bound on each helper send and receive, in milliseconds.
	pub helper_timeout_ms: u64,
	pub max_sessions: usize,
	/// Selects [`EvictionPolicy::Idle`] when set.
	pub session_idle_ttl_secs: Option<u64>,
	pub log_level: String,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			ntlm_helper: None,
			helper_timeout_ms: DEFAULT_HELPER_TIMEOUT.as_millis() as u64,
			max_sessions: DEFAULT_CAPACITY,
			session_idle_ttl_secs: None,
			log_level: DEFAULT_LOG_LEVEL.to_string(),
		}
	}
}

impl AuthConfig {
	/// Reads and parses the config file at `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(target = "bonsai", path = %path.display(), "loaded config");
		Ok(config)
	}

	/// Replaces out-of-range values with defaults, logging a warning for each.
	///
	/// Call after logging is initialised so the warnings are visible.
	pub fn normalize(mut self) -> Self {
		if self.ntlm_helper.as_ref().is_none_or(|path| path.as_os_str().is_empty()) {
			warn!(target = "bonsai", "ntlmHelper is not set; NTLM authentication will fail");
			self.ntlm_helper = None;
		}
		if self.helper_timeout_ms == 0 {
			warn!(target = "bonsai", "helperTimeoutMs must be positive; using the default");
			self.helper_timeout_ms = Self::default().helper_timeout_ms;
		}
		if self.max_sessions < 1 {
			warn!(target = "bonsai", "maxSessions must be at least 1; using the default");
			self.max_sessions = DEFAULT_CAPACITY;
		}
		self
	}

	pub fn helper_timeout(&self) -> Duration {
		Duration::from_millis(self.helper_timeout_ms)
	}

	pub fn eviction_policy(&self) -> EvictionPolicy {
		match self.session_idle_ttl_secs {
			Some(secs) => EvictionPolicy::Idle {
				ttl: Duration::from_secs(secs),
			},
			None => EvictionPolicy::Never,
		}
	}

	pub fn launcher(&self) -> ProcessLauncher {
		ProcessLauncher::new(self.ntlm_helper.clone(), self.helper_timeout())
	}

	pub fn registry(&self) -> SessionRegistry {
		SessionRegistry::new(self.max_sessions, self.eviction_policy())
	}
}
