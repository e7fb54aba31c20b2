use std::fmt;

use bonsai_protocol::{HelperCode, HelperReply, HelperRequest, challenge_token};

/// Where a negotiation stands between client rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
	/// Nothing in flight; the next round starts over.
	#[default]
	Reset,
	/// The client was asked for a type 1 message.
	Negotiate,
	/// A challenge was relayed; the client owes a type 3 response.
	Response,
	/// The helper accepted the client.
	Success,
}

impl NegotiationState {
	/// Helper request for client `data` in this state.
	///
	/// Only [`Negotiate`](Self::Negotiate) and [`Response`](Self::Response)
	/// talk to the helper.
	pub(crate) fn request<'a>(self, data: &'a str) -> Option<HelperRequest<'a>> {
		match self {
			NegotiationState::Negotiate => Some(HelperRequest::Negotiate(data)),
			NegotiationState::Response => Some(HelperRequest::Respond(data)),
			NegotiationState::Reset | NegotiationState::Success => None,
		}
	}

	/// Applies a validated helper reply received in this state.
	pub(crate) fn on_reply(self, reply: &HelperReply) -> Transition {
		match (self, &reply.code) {
			(NegotiationState::Negotiate, HelperCode::Challenge) => Transition::Relay(challenge_token(&reply.message)),
			(NegotiationState::Response, HelperCode::Authenticated) => Transition::Accept(reply.message.clone()),
			(NegotiationState::Response, HelperCode::Denied) => Transition::Deny(reply.message.clone()),
			(_, HelperCode::BrokenHelper) => Transition::Broken(reply.message.clone()),
			(_, code) => Transition::Unexpected(code.clone()),
		}
	}
}

impl fmt::Display for NegotiationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			NegotiationState::Reset => "reset",
			NegotiationState::Negotiate => "negotiate",
			NegotiationState::Response => "response",
			NegotiationState::Success => "success",
		})
	}
}

/// Outcome of one helper reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
	/// `TT` while negotiating: relay this client token.
	Relay(String),
	/// `AF` while awaiting a response: the principal.
	Accept(String),
	/// `NA` while awaiting a response.
	Deny(String),
	/// `BH` in any state.
	Broken(String),
	/// A code the current state does not expect.
	Unexpected(HelperCode),
}

impl Transition {
	pub(crate) fn next_state(&self) -> NegotiationState {
		match self {
			Transition::Relay(_) => NegotiationState::Response,
			Transition::Accept(_) => NegotiationState::Success,
			Transition::Deny(_) | Transition::Broken(_) | Transition::Unexpected(_) => NegotiationState::Reset,
		}
	}
}
