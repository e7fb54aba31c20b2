//! One negotiation's state machine.
//!
//! A round takes the client's token (or nothing), possibly exchanges one line
//! with the helper, and yields the token to send back. Failures never escape
//! a round: the state resets and the caller may inspect [`HelperFault`] to
//! decide whether the helper should be replaced.

use bonsai_protocol::{
	HelperReply, HelperRequest, MAX_REPLY_BYTES, MessageType, NTLM_SCHEME, ReplyError, client_payload, sniff_message_type,
};
use bonsai_runtime::{HelperError, HelperTransport};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use super::state::{NegotiationState, Transition};

/// Result of one negotiation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
	/// Token for the client, or the principal once authenticated.
	pub token: Option<String>,
	pub authenticated: bool,
}

impl Challenge {
	pub(crate) fn pending(token: Option<String>) -> Self {
		Self {
			token,
			authenticated: false,
		}
	}

	pub(crate) fn authenticated(principal: String) -> Self {
		Self {
			token: Some(principal),
			authenticated: true,
		}
	}

	/// Principal accepted by the helper, if this round authenticated.
	pub fn principal(&self) -> Option<&str> {
		self.token.as_deref().filter(|_| self.authenticated)
	}
}

/// Something went wrong on the helper side during the last round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HelperFault {
	#[error("helper reported an internal error: {0}")]
	Broken(String),

	#[error("helper reply is malformed: {0}")]
	MalformedReply(ReplyError),

	#[error("helper exchange failed: {0}")]
	Transport(String),
}

/// How a round proceeds after the client token is checked.
#[derive(Debug)]
pub(crate) enum Round<'a> {
	/// Answered without the helper.
	Finished(Challenge),
	/// The helper must see this request.
	Converse(HelperRequest<'a>),
}

/// State machine for a single NTLM negotiation.
#[derive(Debug, Default)]
pub struct Negotiation {
	state: NegotiationState,
	fault: Option<HelperFault>,
}

impl Negotiation {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn state(&self) -> NegotiationState {
		self.state
	}

	/// Takes the helper fault recorded by the most recent round.
	pub fn take_fault(&mut self) -> Option<HelperFault> {
		self.fault.take()
	}

	/// Runs one round with the client's `input` token.
	///
	/// `None`, or a token without an `NTLM <data>` payload, restarts the
	/// negotiation and asks the client for a type 1 message with a bare
	/// `NTLM` token. Otherwise the payload goes to `helper` as `YR` or `KK`
	/// depending on the state, and the reply decides the outcome.
	pub async fn challenge(&mut self, helper: &mut dyn HelperTransport, input: Option<&str>) -> Challenge {
		match self.begin(input) {
			Round::Finished(outcome) => outcome,
			Round::Converse(request) => self.converse(helper, request).await,
		}
	}

	/// Settles every round that does not need the helper.
	///
	/// Returns [`Round::Converse`] only when the payload must go to the helper.
	pub(crate) fn begin<'a>(&mut self, input: Option<&'a str>) -> Round<'a> {
		self.fault = None;

		let data = match input {
			None => {
				debug!(target = "bonsai.ntlm", "empty challenge received, starting NTLM negotiation");
				None
			}
			Some(token) => {
				let data = client_payload(token);
				if data.is_none() {
					warn!(target = "bonsai.ntlm", len = token.len(), "NTLM challenge is malformed");
				}
				data
			}
		};

		let Some(data) = data.filter(|_| self.state != NegotiationState::Reset) else {
			self.state = NegotiationState::Negotiate;
			return Round::Finished(Challenge::pending(Some(NTLM_SCHEME.to_string())));
		};

		trace!(target = "bonsai.ntlm", state = %self.state, %data, "NTLM challenge data");
		match self.state.request(data) {
			Some(request) => Round::Converse(request),
			None => {
				warn!(target = "bonsai.ntlm", state = %self.state, "client token received after negotiation finished");
				self.state = NegotiationState::Reset;
				Round::Finished(Challenge::pending(None))
			}
		}
	}

	/// Sends `request` to the helper and applies its reply.
	pub(crate) async fn converse(&mut self, helper: &mut dyn HelperTransport, request: HelperRequest<'_>) -> Challenge {
		log_client_message(&request);

		let raw = match exchange(helper, &request).await {
			Ok(raw) => raw,
			Err(err) => {
				error!(target = "bonsai.ntlm", error = %err, verb = request.verb(), "helper exchange failed");
				self.fault = Some(HelperFault::Transport(err.to_string()));
				self.state = NegotiationState::Reset;
				return Challenge::pending(None);
			}
		};

		let reply = match HelperReply::parse(&raw) {
			Ok(reply) => reply,
			Err(err) => {
				error!(target = "bonsai.ntlm", error = %err, len = raw.len(), "response from helper is malformed");
				self.fault = Some(HelperFault::MalformedReply(err));
				self.state = NegotiationState::Reset;
				return Challenge::pending(None);
			}
		};

		let transition = self.state.on_reply(&reply);
		self.state = transition.next_state();

		match transition {
			Transition::Relay(token) => {
				debug!(target = "bonsai.ntlm", "relaying helper challenge to client");
				Challenge::pending(Some(token))
			}
			Transition::Accept(principal) => {
				info!(target = "bonsai.ntlm", %principal, "NTLM authentication succeeded");
				Challenge::authenticated(principal)
			}
			Transition::Deny(message) => {
				warn!(target = "bonsai.ntlm", %message, "NTLM authentication failed");
				Challenge::pending(None)
			}
			Transition::Broken(message) => {
				error!(target = "bonsai.ntlm", %message, "helper reported an internal error");
				self.fault = Some(HelperFault::Broken(message));
				Challenge::pending(None)
			}
			Transition::Unexpected(code) => {
				warn!(target = "bonsai.ntlm", %code, verb = request.verb(), "unexpected helper reply");
				Challenge::pending(None)
			}
		}
	}
}

async fn exchange(helper: &mut dyn HelperTransport, request: &HelperRequest<'_>) -> Result<Vec<u8>, HelperError> {
	helper.send_line(&request.to_string()).await?;
	helper.recv_line(MAX_REPLY_BYTES).await
}

fn log_client_message(request: &HelperRequest<'_>) {
	let expected = match request {
		HelperRequest::Negotiate(_) => MessageType::Negotiate,
		HelperRequest::Respond(_) => MessageType::Authenticate,
	};
	match sniff_message_type(request.payload()) {
		Some(kind) if kind == expected => trace!(target = "bonsai.ntlm", %kind, "client NTLMSSP message"),
		Some(kind) => debug!(target = "bonsai.ntlm", %kind, %expected, "client sent an out-of-order NTLMSSP message"),
		None => debug!(target = "bonsai.ntlm", "client payload is not an NTLMSSP message"),
	}
}

#[cfg(test)]
mod tests {
	use bonsai_runtime::{FakeHelper, FakeHelperBuilder, FakeHelperController};

	use super::*;

	const TYPE1: &str = "NTLM TlRMTVNTUAABAAAAB4IIogAAAAAAAAAAAAAAAAAAAAAGAbEdAAAADw==";

	fn helper() -> (FakeHelper, FakeHelperController) {
		FakeHelperBuilder::new().build()
	}

	/// Drives a negotiation from Reset to Response.
	async fn challenged(helper: &mut FakeHelper, controller: &FakeHelperController) -> Negotiation {
		let mut negotiation = Negotiation::new();
		negotiation.challenge(&mut *helper, None).await;
		controller.push_reply("TT SGVsbG8=\n");
		negotiation.challenge(&mut *helper, Some(TYPE1)).await;
		assert_eq!(negotiation.state(), NegotiationState::Response);
		controller.take_sent();
		negotiation
	}

	#[tokio::test]
	async fn absent_token_starts_negotiation() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();

		let out = negotiation.challenge(&mut helper, None).await;
		assert_eq!(out, Challenge::pending(Some("NTLM".into())));
		assert_eq!(negotiation.state(), NegotiationState::Negotiate);
		assert!(controller.take_sent().is_empty());
	}

	#[tokio::test]
	async fn full_handshake_authenticates() {
		let (mut helper, controller) = helper();
		let mut negotiation = challenged(&mut helper, &controller).await;

		controller.push_reply("AF alice\n");
		let out = negotiation.challenge(&mut helper, Some("NTLM SGVsbG8=")).await;

		assert_eq!(out, Challenge::authenticated("alice".into()));
		assert_eq!(out.principal(), Some("alice"));
		assert_eq!(negotiation.state(), NegotiationState::Success);
		assert_eq!(controller.take_sent(), vec!["KK SGVsbG8=".to_string()]);
	}

	#[tokio::test]
	async fn type1_is_sent_as_yr_and_challenge_relayed() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();
		negotiation.challenge(&mut helper, None).await;

		controller.push_reply("TT SGVsbG8=\n");
		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

		assert_eq!(out, Challenge::pending(Some("NTLM SGVsbG8=".into())));
		assert_eq!(out.principal(), None);
		assert_eq!(
			controller.take_sent(),
			vec!["YR TlRMTVNTUAABAAAAB4IIogAAAAAAAAAAAAAAAAAAAAAGAbEdAAAADw==".to_string()]
		);
	}

	#[tokio::test]
	async fn denial_resets_without_token() {
		let (mut helper, controller) = helper();
		let mut negotiation = challenged(&mut helper, &controller).await;

		controller.push_reply("NA Auth failed\n");
		let out = negotiation.challenge(&mut helper, Some("NTLM d3Jvbmc=")).await;

		assert_eq!(out, Challenge::pending(None));
		assert_eq!(negotiation.state(), NegotiationState::Reset);
		assert_eq!(negotiation.take_fault(), None);
	}

	#[tokio::test]
	async fn broken_helper_resets_and_records_fault() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();
		negotiation.challenge(&mut helper, None).await;

		controller.push_reply("BH oops\n");
		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

		assert_eq!(out, Challenge::pending(None));
		assert_eq!(negotiation.state(), NegotiationState::Reset);
		assert_eq!(negotiation.take_fault(), Some(HelperFault::Broken("oops".into())));
		assert_eq!(negotiation.take_fault(), None);
	}

	#[tokio::test]
	async fn unexpected_code_resets() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();
		negotiation.challenge(&mut helper, None).await;

		controller.push_reply("AF alice\n");
		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

		assert_eq!(out, Challenge::pending(None));
		assert_eq!(negotiation.state(), NegotiationState::Reset);
		assert_eq!(negotiation.take_fault(), None);
	}

	#[tokio::test]
	async fn malformed_replies_reset() {
		let replies: [&[u8]; 5] = [b"TT\n", b"TTxabc\n", b"TT abc", b"", b"TT ab\xffc\n"];
		for raw in replies {
			let (mut helper, controller) = helper();
			let mut negotiation = Negotiation::new();
			negotiation.challenge(&mut helper, None).await;

			if !raw.is_empty() {
				controller.push_reply(raw);
			}
			let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

			assert_eq!(out, Challenge::pending(None), "reply {raw:?}");
			assert_eq!(negotiation.state(), NegotiationState::Reset, "reply {raw:?}");
			assert!(matches!(negotiation.take_fault(), Some(HelperFault::MalformedReply(_))), "reply {raw:?}");
		}
	}

	#[tokio::test]
	async fn helper_timeout_resets_and_records_fault() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();
		negotiation.challenge(&mut helper, None).await;

		controller.push_timeout();
		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

		assert_eq!(out, Challenge::pending(None));
		assert_eq!(negotiation.state(), NegotiationState::Reset);
		assert!(matches!(negotiation.take_fault(), Some(HelperFault::Transport(_))));
	}

	#[tokio::test]
	async fn malformed_client_token_restarts() {
		let (mut helper, controller) = helper();
		let mut negotiation = challenged(&mut helper, &controller).await;

		let out = negotiation.challenge(&mut helper, Some("bad")).await;

		assert_eq!(out, Challenge::pending(Some("NTLM".into())));
		assert_eq!(negotiation.state(), NegotiationState::Negotiate);
		assert!(controller.take_sent().is_empty());
	}

	#[tokio::test]
	async fn token_with_line_break_is_malformed() {
		let (mut helper, controller) = helper();
		let mut negotiation = challenged(&mut helper, &controller).await;

		let out = negotiation.challenge(&mut helper, Some("NTLM SGVsbG8=\nKK SGVsbG8=")).await;

		assert_eq!(out, Challenge::pending(Some("NTLM".into())));
		assert_eq!(negotiation.state(), NegotiationState::Negotiate);
		assert!(controller.take_sent().is_empty());
	}

	#[tokio::test]
	async fn data_in_reset_state_restarts_without_helper() {
		let (mut helper, controller) = helper();
		let mut negotiation = Negotiation::new();

		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;

		assert_eq!(out, Challenge::pending(Some("NTLM".into())));
		assert_eq!(negotiation.state(), NegotiationState::Negotiate);
		assert!(controller.take_sent().is_empty());
	}

	#[tokio::test]
	async fn negotiation_recovers_after_denial() {
		let (mut helper, controller) = helper();
		let mut negotiation = challenged(&mut helper, &controller).await;
		controller.push_reply("NA Auth failed\n");
		negotiation.challenge(&mut helper, Some("NTLM d3Jvbmc=")).await;

		let out = negotiation.challenge(&mut helper, None).await;
		assert_eq!(out, Challenge::pending(Some("NTLM".into())));

		controller.push_reply("TT SGVsbG8=\n");
		let out = negotiation.challenge(&mut helper, Some(TYPE1)).await;
		assert_eq!(out.token.as_deref(), Some("NTLM SGVsbG8="));
	}
}
