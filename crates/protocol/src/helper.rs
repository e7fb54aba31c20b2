//! Squid `ntlmssp` helper line protocol.
//!
//! Requests are single lines written to the helper's stdin:
//!
//! ```text
//! YR <base64-type1-or-blob>
//! KK <base64-blob>
//! ```
//!
//! Replies are single lines read from the helper's stdout, framed as
//! `<CODE> <payload>\n` with a two-byte code.

use std::fmt;

use thiserror::Error;

/// Argument passed to the helper executable to select the line protocol.
pub const HELPER_PROTOCOL_ARG: &str = "--helper-protocol=squid-2.5-ntlmssp";

/// Largest reply the server reads from the helper in one round.
pub const MAX_REPLY_BYTES: usize = 1023;

/// Shortest well-formed reply: two code bytes, a space, one payload byte, newline.
const MIN_REPLY_BYTES: usize = 5;

/// A request line sent to the helper, without the trailing newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperRequest<'a> {
	/// `YR`: start or continue a negotiation with client data.
	Negotiate(&'a str),
	/// `KK`: submit the client's response to a challenge.
	Respond(&'a str),
}

impl HelperRequest<'_> {
	/// Two-letter verb for this request.
	pub fn verb(&self) -> &'static str {
		match self {
			HelperRequest::Negotiate(_) => "YR",
			HelperRequest::Respond(_) => "KK",
		}
	}

	/// Client payload carried by this request.
	pub fn payload(&self) -> &str {
		match self {
			HelperRequest::Negotiate(data) | HelperRequest::Respond(data) => data,
		}
	}
}

impl fmt::Display for HelperRequest<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.verb(), self.payload())
	}
}

/// Status code at the head of a helper reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperCode {
	/// `TT`: challenge to relay to the client.
	Challenge,
	/// `AF`: authentication succeeded; payload is the principal.
	Authenticated,
	/// `NA`: authentication failed.
	Denied,
	/// `BH`: the helper hit an internal error.
	BrokenHelper,
	/// Any code this server does not understand.
	Unknown(String),
}

impl HelperCode {
	fn from_bytes(code: &[u8]) -> Self {
		match code {
			b"TT" => HelperCode::Challenge,
			b"AF" => HelperCode::Authenticated,
			b"NA" => HelperCode::Denied,
			b"BH" => HelperCode::BrokenHelper,
			other => HelperCode::Unknown(String::from_utf8_lossy(other).into_owned()),
		}
	}

	/// Wire spelling of the code.
	pub fn as_str(&self) -> &str {
		match self {
			HelperCode::Challenge => "TT",
			HelperCode::Authenticated => "AF",
			HelperCode::Denied => "NA",
			HelperCode::BrokenHelper => "BH",
			HelperCode::Unknown(code) => code,
		}
	}
}

impl fmt::Display for HelperCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Framing failures in a raw helper reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
	#[error("helper reply too short ({len} bytes)")]
	TooShort { len: usize },

	#[error("helper reply has no separator after the status code")]
	MissingSeparator,

	#[error("helper reply is not newline terminated")]
	Unterminated,

	#[error("helper reply message is not valid UTF-8")]
	InvalidUtf8,
}

/// A validated helper reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperReply {
	pub code: HelperCode,
	/// Payload between the separator and the trailing newline.
	pub message: String,
}

impl HelperReply {
	/// Validates and splits a raw reply as read from the helper's stdout.
	///
	/// The reply must be at least five bytes, carry a space at index 2, and end
	/// with a newline. Bytes 0-1 are the code; bytes 3 up to the newline are
	/// the message, which must be valid UTF-8.
	pub fn parse(raw: &[u8]) -> Result<Self, ReplyError> {
		if raw.len() < MIN_REPLY_BYTES {
			return Err(ReplyError::TooShort { len: raw.len() });
		}
		if raw[2] != b' ' {
			return Err(ReplyError::MissingSeparator);
		}
		let Some((&b'\n', body)) = raw.split_last() else {
			return Err(ReplyError::Unterminated);
		};

		let message = std::str::from_utf8(&body[3..]).map_err(|_| ReplyError::InvalidUtf8)?;

		Ok(Self {
			code: HelperCode::from_bytes(&body[..2]),
			message: message.to_string(),
		})
	}
}
