use std::fmt;
use std::sync::{Arc, OnceLock};

use bonsai_runtime::{HelperError, HelperLauncher, HelperTransport};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::engine::{Challenge, Negotiation, Round};
use super::state::NegotiationState;

/// Negotiation plus the helper channel it is talking to.
#[derive(Default)]
struct Exchange {
	negotiation: Negotiation,
	helper: Option<Box<dyn HelperTransport>>,
}

/// NTLM authentication context for one scope of one session.
///
/// The helper is launched on the first round that has to talk to it, and dropped once
/// the negotiation succeeds or the helper faults. After success the context
/// is frozen: the principal cannot change, and later rounds return it without
/// touching a helper.
pub struct AuthContext {
	scope: String,
	launcher: Arc<dyn HelperLauncher>,
	principal: OnceLock<String>,
	exchange: Mutex<Exchange>,
}

impl AuthContext {
	pub fn new(scope: impl Into<String>, launcher: Arc<dyn HelperLauncher>) -> Self {
		Self {
			scope: scope.into(),
			launcher,
			principal: OnceLock::new(),
			exchange: Mutex::new(Exchange::default()),
		}
	}

	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Case-insensitive scope comparison.
	pub fn matches_scope(&self, scope: &str) -> bool {
		self.scope.eq_ignore_ascii_case(scope)
	}

	/// Principal accepted by the helper, once authenticated.
	pub fn principal(&self) -> Option<&str> {
		self.principal.get().map(String::as_str)
	}

	pub fn is_authenticated(&self) -> bool {
		self.principal.get().is_some()
	}

	pub async fn state(&self) -> NegotiationState {
		if self.is_authenticated() {
			return NegotiationState::Success;
		}
		self.exchange.lock().await.negotiation.state()
	}

	/// Runs one negotiation round with the client's token.
	///
	/// Rounds on one context are serialized. Only a failure to launch the
	/// helper is returned as an error; protocol trouble comes back as an
	/// unauthenticated [`Challenge`].
	pub async fn challenge(&self, token: Option<&str>) -> Result<Challenge, HelperError> {
		if let Some(principal) = self.principal.get() {
			return Ok(Challenge::authenticated(principal.clone()));
		}

		let mut exchange = self.exchange.lock().await;
		if let Some(principal) = self.principal.get() {
			return Ok(Challenge::authenticated(principal.clone()));
		}

		let Exchange { negotiation, helper } = &mut *exchange;
		let request = match negotiation.begin(token) {
			Round::Finished(outcome) => return Ok(outcome),
			Round::Converse(request) => request,
		};

		let channel = match helper.take() {
			Some(channel) => channel,
			None => {
				debug!(target = "bonsai.ntlm", scope = %self.scope, "launching helper for negotiation");
				self.launcher.launch().await?
			}
		};
		let channel = helper.insert(channel);

		let outcome = negotiation.converse(&mut **channel, request).await;

		if let Some(principal) = outcome.principal() {
			info!(target = "bonsai.ntlm", scope = %self.scope, %principal, "authentication context established");
			let _ = self.principal.set(principal.to_string());
			retire(helper);
		} else if let Some(fault) = negotiation.take_fault() {
			warn!(target = "bonsai.ntlm", scope = %self.scope, %fault, "discarding faulted helper");
			retire(helper);
		}

		Ok(outcome)
	}

	/// Closes the helper, if one is running.
	pub async fn close(&self) {
		retire(&mut self.exchange.lock().await.helper);
	}
}

fn retire(helper: &mut Option<Box<dyn HelperTransport>>) {
	if let Some(mut channel) = helper.take() {
		channel.close();
	}
}

impl fmt::Debug for AuthContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthContext")
			.field("scope", &self.scope)
			.field("principal", &self.principal.get())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use bonsai_runtime::{FakeHelperBuilder, ScriptedLauncher};

	use super::*;

	const TYPE1: &str = "NTLM TlRMTVNTUAABAAAAB4IIogAAAAAAAAAAAAAAAAAAAAAGAbEdAAAADw==";

	#[tokio::test]
	async fn success_freezes_context_and_closes_helper() {
		let (helper, controller) = FakeHelperBuilder::new().reply("TT SGVsbG8=\n").reply("AF alice\n").build();
		let launcher = Arc::new(ScriptedLauncher::new([helper]));
		let context = AuthContext::new("tfs", launcher.clone());

		assert_eq!(context.challenge(None).await.unwrap().token.as_deref(), Some("NTLM"));
		assert_eq!(context.challenge(Some(TYPE1)).await.unwrap().token.as_deref(), Some("NTLM SGVsbG8="));
		let done = context.challenge(Some("NTLM SGVsbG8=")).await.unwrap();

		assert_eq!(done.principal(), Some("alice"));
		assert_eq!(context.principal(), Some("alice"));
		assert_eq!(context.state().await, NegotiationState::Success);
		assert!(controller.is_closed());

		let again = context.challenge(None).await.unwrap();
		assert_eq!(again.principal(), Some("alice"));
		assert_eq!(launcher.launches(), 1);
	}

	#[tokio::test]
	async fn launch_failure_is_returned() {
		let context = AuthContext::new("tfs", Arc::new(ScriptedLauncher::default()));
		assert_eq!(context.challenge(None).await.unwrap().token.as_deref(), Some("NTLM"));
		assert!(matches!(context.challenge(Some(TYPE1)).await, Err(HelperError::MissingPath)));
		assert!(!context.is_authenticated());
	}

	#[tokio::test]
	async fn rounds_without_client_data_do_not_launch_helper() {
		let launcher = Arc::new(ScriptedLauncher::default());
		let context = AuthContext::new("tfs", launcher.clone());

		for token in [Some(TYPE1), None, Some("bad"), Some("NTLM"), Some("NTLM TlRM\nKK SGVsbG8=")] {
			let out = context.challenge(token).await.unwrap();
			assert_eq!(out.token.as_deref(), Some("NTLM"), "token {token:?}");
		}
		assert_eq!(launcher.launches(), 0);
	}

	#[tokio::test]
	async fn faulted_helper_is_replaced_next_round() {
		let (first, first_ctl) = FakeHelperBuilder::new().reply("BH oops\n").build();
		let (second, second_ctl) = FakeHelperBuilder::new().reply("TT SGVsbG8=\n").build();
		let launcher = Arc::new(ScriptedLauncher::new([first, second]));
		let context = AuthContext::new("tfs", launcher.clone());

		context.challenge(None).await.unwrap();
		let out = context.challenge(Some(TYPE1)).await.unwrap();
		assert_eq!(out.token, None);
		assert!(first_ctl.is_closed());

		context.challenge(None).await.unwrap();
		let out = context.challenge(Some(TYPE1)).await.unwrap();
		assert_eq!(out.token.as_deref(), Some("NTLM SGVsbG8="));
		assert_eq!(launcher.launches(), 2);
		assert_eq!(second_ctl.take_sent().len(), 1);
	}

	#[tokio::test]
	async fn denial_keeps_helper_for_retry() {
		let (helper, controller) = FakeHelperBuilder::new().reply("TT SGVsbG8=\n").reply("NA Auth failed\n").build();
		let launcher = Arc::new(ScriptedLauncher::new([helper]));
		let context = AuthContext::new("tfs", launcher.clone());

		context.challenge(None).await.unwrap();
		context.challenge(Some(TYPE1)).await.unwrap();
		let out = context.challenge(Some("NTLM d3Jvbmc=")).await.unwrap();

		assert_eq!(out.token, None);
		assert_eq!(context.state().await, NegotiationState::Reset);
		assert!(!controller.is_closed());
		assert_eq!(launcher.launches(), 1);

		context.close().await;
		assert!(controller.is_closed());
	}

	#[test]
	fn scope_matching_ignores_case() {
		let context = AuthContext::new("TFS", Arc::new(ScriptedLauncher::default()));
		assert!(context.matches_scope("tfs"));
		assert!(!context.matches_scope("tfs2"));
	}
}
