//! Per-request authentication flow.

use std::sync::Arc;

use bonsai_runtime::HelperLauncher;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::Result;
use crate::ntlm::{AuthContext, Challenge};
use crate::session::{SessionHandle, SessionRegistry};

/// What the transport layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
	/// The session is authenticated as `principal`; serve the request.
	Authenticated { principal: String },
	/// Answer with a challenge. `None` means the round failed and the client
	/// should start over without a token.
	Continue { token: Option<String> },
}

/// Ties the registry, per-scope contexts, and the helper launcher together.
pub struct AuthService {
	registry: Arc<SessionRegistry>,
	launcher: Arc<dyn HelperLauncher>,
}

impl AuthService {
	pub fn new(registry: Arc<SessionRegistry>, launcher: Arc<dyn HelperLauncher>) -> Self {
		Self { registry, launcher }
	}

	/// Builds a registry and process launcher from `config`.
	pub fn from_config(config: &AuthConfig) -> Self {
		Self::new(Arc::new(config.registry()), Arc::new(config.launcher()))
	}

	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	/// Runs one round for `scope` on `session` with the client's token.
	///
	/// The scope's context is created and attached on first use, so every
	/// round of a handshake reaches the same negotiation. On success the
	/// principal is bound to the session as its user.
	pub async fn authenticate(&self, session: &SessionHandle, scope: &str, token: Option<&str>) -> Result<AuthOutcome> {
		let context = self
			.registry
			.context_or_attach(session, scope, || AuthContext::new(scope, Arc::clone(&self.launcher)))?;

		match context.challenge(token).await? {
			Challenge {
				authenticated: true,
				token: Some(principal),
			} => {
				if self.registry.bind_user(session, &principal)? {
					debug!(target = "bonsai", id = session.id(), scope, %principal, "session authenticated");
				}
				Ok(AuthOutcome::Authenticated { principal })
			}
			Challenge { token, .. } => Ok(AuthOutcome::Continue { token }),
		}
	}
}
